//! UPnP device and service data model for control points.
//!
//! A root [`DeviceData`] owns its services and its embedded device tree;
//! embedded devices carry only their parent's identifier, never a pointer
//! back. Description documents and per-service SCPD documents are parsed
//! here; fetching them over the network is the caller's concern.

mod description;
mod device;
mod error;
mod scpd;
mod service;

pub use description::parse_description;
pub use device::DeviceData;
pub use error::{DeviceError, Result};
pub use scpd::{ActionDesc, ArgumentDesc, Direction, Scpd, StateVariable};
pub use service::Service;

/// Maximum depth of embedded-device nesting tolerated in a description
/// document before the tree is rejected as malformed or malicious.
pub const MAX_EMBEDDED_DEPTH: usize = 5;
