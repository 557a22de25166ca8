//! Error types for the upnp-soap crate.

/// Errors raised while building actions or interpreting responses.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SoapError {
    /// The response body is not parseable XML
    #[error("Failed to parse SOAP XML: {0}")]
    Parse(String),

    /// The response violates the expected envelope shape
    #[error("Malformed SOAP response: {0}")]
    InvalidFormat(&'static str),

    /// The device answered with a SOAP fault
    #[error("SOAP fault {code}: {description}")]
    Fault {
        /// UPnP error code; 501 when the fault carries none
        code: u32,
        /// Human-readable description; empty when the fault carries none
        description: String,
    },

    /// The action does not declare an argument with this name
    #[error("Unknown argument: {0}")]
    UnknownArgument(String),

    /// An argument value falls outside its allowed-value list
    #[error("Value {value:?} not allowed for argument {name}")]
    InvalidArgumentValue {
        /// Argument name
        name: String,
        /// Rejected value
        value: String,
    },

    /// A declared output argument is missing from the response
    #[error("Missing output argument: {0}")]
    MissingArgument(String),
}

/// Convenience type alias for Results using SoapError.
pub type Result<T> = std::result::Result<T, SoapError>;
