//! Structured parsing of the USN (unique service name) header.

use crate::error::{Result, SsdpError};

/// A parsed USN header, `uuid:<id>[::<type>]`.
///
/// The embedded type token, when present, must agree with the advertisement's
/// declared NT/ST header; [`UniqueServiceName::device_uuid`] performs that
/// cross-check and yields the bare device identifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UniqueServiceName {
    /// Bare device identifier, without the `uuid:` prefix
    pub uuid: String,
    /// Type token following `::`, if any
    pub target: Option<String>,
}

impl UniqueServiceName {
    /// Parse a raw USN header value.
    pub fn parse(usn: &str) -> Result<Self> {
        let rest = usn
            .strip_prefix("uuid:")
            .ok_or_else(|| SsdpError::MalformedUsn(usn.to_string()))?;

        let (uuid, target) = match rest.split_once("::") {
            Some((uuid, target)) => (uuid, Some(target)),
            None => (rest, None),
        };

        if uuid.is_empty() {
            return Err(SsdpError::MalformedUsn(usn.to_string()));
        }
        if let Some(target) = target {
            if target.is_empty() {
                return Err(SsdpError::MalformedUsn(usn.to_string()));
            }
        }

        Ok(Self {
            uuid: uuid.to_string(),
            target: target.map(str::to_string),
        })
    }

    /// Extract the device identifier, verifying the embedded type token
    /// against the advertisement's declared NT or ST value.
    ///
    /// An advertisement whose USN embeds a type token that differs from the
    /// declared target is malformed and rejected rather than silently
    /// accepted.
    pub fn device_uuid(usn: &str, declared_target: &str) -> Result<String> {
        let parsed = Self::parse(usn)?;
        if let Some(target) = &parsed.target {
            if !target.eq_ignore_ascii_case(declared_target) {
                return Err(SsdpError::TargetMismatch {
                    usn_target: target.clone(),
                    declared: declared_target.to_string(),
                });
            }
        }
        Ok(parsed.uuid)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn test_parse_uuid_only() {
        let usn = UniqueServiceName::parse("uuid:abc-123").unwrap();
        assert_eq!(usn.uuid, "abc-123");
        assert_eq!(usn.target, None);
    }

    #[test]
    fn test_parse_with_target() {
        let usn =
            UniqueServiceName::parse("uuid:abc-123::urn:schemas-upnp-org:device:MediaRenderer:1")
                .unwrap();
        assert_eq!(usn.uuid, "abc-123");
        assert_eq!(
            usn.target.as_deref(),
            Some("urn:schemas-upnp-org:device:MediaRenderer:1")
        );
    }

    #[test]
    fn test_parse_root_device_target() {
        let usn = UniqueServiceName::parse("uuid:abc::upnp:rootdevice").unwrap();
        assert_eq!(usn.uuid, "abc");
        assert_eq!(usn.target.as_deref(), Some("upnp:rootdevice"));
    }

    #[rstest]
    #[case("abc-123")]
    #[case("")]
    #[case("uuid:")]
    #[case("uuid:::upnp:rootdevice")]
    #[case("uuid:abc::")]
    #[case("urn:schemas-upnp-org:device:MediaRenderer:1")]
    fn test_parse_malformed(#[case] raw: &str) {
        assert!(matches!(
            UniqueServiceName::parse(raw),
            Err(SsdpError::MalformedUsn(_))
        ));
    }

    #[test]
    fn test_device_uuid_matching_target() {
        let uuid =
            UniqueServiceName::device_uuid("uuid:abc::upnp:rootdevice", "upnp:rootdevice").unwrap();
        assert_eq!(uuid, "abc");
    }

    #[test]
    fn test_device_uuid_target_case_insensitive() {
        let uuid =
            UniqueServiceName::device_uuid("uuid:abc::UPNP:ROOTDEVICE", "upnp:rootdevice").unwrap();
        assert_eq!(uuid, "abc");
    }

    #[test]
    fn test_device_uuid_mismatch_rejected() {
        let err = UniqueServiceName::device_uuid(
            "uuid:abc::urn:schemas-upnp-org:device:Basic:1",
            "upnp:rootdevice",
        )
        .unwrap_err();
        assert!(matches!(err, SsdpError::TargetMismatch { .. }));
    }

    #[test]
    fn test_device_uuid_bare_uuid_skips_check() {
        // A USN without an embedded type token has nothing to cross-check.
        let uuid = UniqueServiceName::device_uuid("uuid:abc", "upnp:rootdevice").unwrap();
        assert_eq!(uuid, "abc");
    }
}
