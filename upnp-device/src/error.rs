//! Error types for the upnp-device crate.

/// Errors raised while parsing descriptions or resolving device URLs.
#[derive(Debug, thiserror::Error)]
pub enum DeviceError {
    /// The XML document could not be parsed at all
    #[error("Failed to parse XML: {0}")]
    Parse(String),

    /// A required element is missing from the document
    #[error("Missing element: {0}")]
    MissingElement(&'static str),

    /// Embedded-device nesting exceeds the tolerated depth
    #[error("Embedded device tree exceeds maximum depth")]
    TooDeep,

    /// A URL in the document (or a relative URL being resolved) is invalid
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),
}

/// Convenience type alias for Results using DeviceError.
pub type Result<T> = std::result::Result<T, DeviceError>;
