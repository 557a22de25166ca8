//! Error types for the upnp-ctrlpoint crate.

use upnp_device::DeviceError;
use upnp_soap::SoapError;
use upnp_ssdp::SsdpError;

/// Errors surfaced by the control-point engine.
#[derive(Debug, thiserror::Error)]
pub enum CtrlPointError {
    /// A discovery datagram was rejected
    #[error(transparent)]
    Ssdp(#[from] SsdpError),

    /// A description or SCPD document was rejected
    #[error(transparent)]
    Device(#[from] DeviceError),

    /// A SOAP request could not be built or its response was rejected
    #[error(transparent)]
    Soap(#[from] SoapError),

    /// No device with this identifier is in the registry
    #[error("Device not found: {0}")]
    DeviceNotFound(String),

    /// The device does not own a service with this identifier
    #[error("Service not found: {0}")]
    ServiceNotFound(String),

    /// The service does not advertise event support
    #[error("Service is not eventable: {0}")]
    ServiceNotEventable(String),

    /// Cancel was requested but no subscription exists for the service
    #[error("No subscription for service: {0}")]
    NoSubscription(String),

    /// The service does not declare this action (or its SCPD is not loaded)
    #[error("Action not found: {0}")]
    ActionNotFound(String),

    /// The exchange never produced a response
    #[error("Transport failure: {0}")]
    Transport(String),

    /// The exchange produced a non-success HTTP status
    #[error("HTTP status {status}")]
    Http {
        /// Status code of the response
        status: u16,
    },

    /// The response arrived but is unusable
    #[error("Invalid response: {0}")]
    InvalidResponse(&'static str),

    /// The engine has not been started (no event callback endpoint yet)
    #[error("Control point is not started")]
    NotStarted,

    /// No port in the configured range could be bound for the callback server
    #[error("No free callback port in {0}..={1}")]
    NoCallbackPort(u16, u16),

    /// Socket-level failure in the discovery transport
    #[error("Socket error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience type alias for Results using CtrlPointError.
pub type Result<T> = std::result::Result<T, CtrlPointError>;
