//! Error types for the upnp-ssdp crate.

/// Errors produced while parsing SSDP traffic.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum SsdpError {
    /// The datagram is not an SSDP message this crate understands
    #[error("Not an SSDP message: {0}")]
    NotSsdp(String),

    /// A required header is missing or empty
    #[error("Missing header: {0}")]
    MissingHeader(&'static str),

    /// The USN header does not follow `uuid:<id>[::<type>]`
    #[error("Malformed USN: {0}")]
    MalformedUsn(String),

    /// The type token embedded in the USN disagrees with the declared NT/ST
    #[error("USN type token {usn_target:?} does not match declared target {declared:?}")]
    TargetMismatch {
        /// Type token carried inside the USN
        usn_target: String,
        /// NT (notify) or ST (search response) header value
        declared: String,
    },

    /// The NTS header carries a subtype other than alive/byebye
    #[error("Unknown notification subtype: {0}")]
    UnknownSubType(String),
}

/// Convenience type alias for Results using SsdpError.
pub type Result<T> = std::result::Result<T, SsdpError>;
