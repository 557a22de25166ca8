//! SOAP request formatting and response parsing for UPnP actions.
//!
//! An [`Action`] is created from a service's descriptor, populated with
//! input arguments, serialized with [`format_request`], and filled back in
//! from the device's reply by [`parse_response`]. Faults are surfaced as
//! [`SoapError::Fault`] and recorded on the action.

mod action;
mod envelope;
mod error;

pub use action::{Action, ActionFault};
pub use envelope::{format_request, parse_response};
pub use error::{Result, SoapError};

/// SOAP envelope namespace.
pub const SOAP_ENVELOPE_NS: &str = "http://schemas.xmlsoap.org/soap/envelope/";
/// SOAP encoding style required on action envelopes.
pub const SOAP_ENCODING_NS: &str = "http://schemas.xmlsoap.org/soap/encoding/";
