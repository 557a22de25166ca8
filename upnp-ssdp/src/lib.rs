//! SSDP (Simple Service Discovery Protocol) message parsing for UPnP control points.
//!
//! This crate models the discovery traffic a control point consumes: NOTIFY
//! announcements and byebyes received over multicast, unicast M-SEARCH
//! responses, and the M-SEARCH requests the control point itself emits.
//! It performs no network I/O; transports hand raw datagram text in and get
//! typed messages back.

mod error;
mod message;
mod search;
mod usn;

pub use error::{Result, SsdpError};
pub use message::{NotifySubType, SsdpNotify, SsdpSearchResponse};
pub use search::{search_repeat_interval, SearchRequest, SSDP_MULTICAST_ADDR, SSDP_PORT};
pub use usn::UniqueServiceName;

/// The notification-type value advertised by every UPnP root device.
pub const ROOT_DEVICE_TARGET: &str = "upnp:rootdevice";
