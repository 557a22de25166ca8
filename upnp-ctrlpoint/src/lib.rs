//! UPnP control-point engine.
//!
//! [`ControlPoint`] discovers devices over SSDP, fetches their description
//! and SCPD documents, tracks their lifecycle, subscribes to service events,
//! keeps subscriptions renewed and invokes SOAP actions. Results and
//! notifications reach registered [`CtrlPointListener`]s.
//!
//! ```no_run
//! use std::sync::Arc;
//! use upnp_ctrlpoint::{ControlPoint, CtrlPointConfig, CtrlPointListener};
//! use upnp_device::DeviceData;
//!
//! struct Printer;
//! impl CtrlPointListener for Printer {
//!     fn on_device_added(&self, device: &DeviceData) {
//!         println!("found {} ({})", device.friendly_name, device.uuid);
//!     }
//! }
//!
//! # async fn run() -> upnp_ctrlpoint::Result<()> {
//! let engine = ControlPoint::new(CtrlPointConfig::default())?;
//! engine.add_listener(Arc::new(Printer));
//! engine.start().await?;
//! # Ok(())
//! # }
//! ```

mod callback;
mod config;
mod engine;
mod error;
mod http;
mod listener;
mod registry;
mod subscribers;
mod tasks;
mod transport;

pub use callback::{EventCallbackServer, NotifyHandler};
pub use config::{
    CtrlPointConfig, DESCRIPTION_FETCH_DELAY, RENEWAL_HEADROOM, SCPD_FETCH_DELAY,
    SCPD_FETCH_DELAY_EMBEDDED,
};
pub use engine::ControlPoint;
pub use error::{CtrlPointError, Result};
pub use http::{HttpExchange, HttpRequest, HttpResponse, ReqwestExchange};
pub use listener::{
    ActionOutcome, CtrlPointListener, ServiceKey, StateVariableChange, UserToken,
};
pub use subscribers::Subscriber;
pub use transport::{default_local_address, SsdpTransport, UdpSsdpTransport};
