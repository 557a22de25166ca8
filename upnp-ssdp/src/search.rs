//! M-SEARCH request construction and repeat policy.

use std::time::Duration;

/// The SSDP multicast group address.
pub const SSDP_MULTICAST_ADDR: &str = "239.255.255.250";

/// The SSDP multicast port.
pub const SSDP_PORT: u16 = 1900;

/// An outbound M-SEARCH request.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchRequest {
    /// Search target (e.g. `upnp:rootdevice`, `ssdp:all`)
    pub target: String,
    /// MX header — maximum response delay in seconds, clamped to at least 1
    pub mx: u32,
    /// User-Agent header value
    pub user_agent: String,
}

impl SearchRequest {
    /// Create a search request; `mx` is clamped to at least 1 second.
    pub fn new(target: impl Into<String>, mx: u32, user_agent: impl Into<String>) -> Self {
        Self {
            target: target.into(),
            mx: mx.max(1),
            user_agent: user_agent.into(),
        }
    }

    /// Format the request as an HTTP-over-UDP datagram.
    ///
    /// The HOST header is always the regular multicast address:port; some
    /// devices refuse to answer otherwise.
    pub fn format(&self) -> String {
        format!(
            "M-SEARCH * HTTP/1.1\r\n\
             HOST: {SSDP_MULTICAST_ADDR}:{SSDP_PORT}\r\n\
             MAN: \"ssdp:discover\"\r\n\
             MX: {mx}\r\n\
             ST: {st}\r\n\
             USER-AGENT: {ua}\r\n\
             \r\n",
            mx = self.mx,
            st = self.target,
            ua = self.user_agent,
        )
    }
}

/// How often a repeating search task may re-send its M-SEARCH.
///
/// Repeats are bounded below by five times the MX window to keep a busy
/// control point from contributing to a multicast storm.
pub fn search_repeat_interval(mx: u32, requested: Duration) -> Duration {
    let floor = Duration::from_secs(u64::from(mx.max(1)) * 5);
    requested.max(floor)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_search_request() {
        let request = SearchRequest::new("upnp:rootdevice", 5, "test-agent UPnP/1.0");
        let text = request.format();

        assert!(text.starts_with("M-SEARCH * HTTP/1.1\r\n"));
        assert!(text.contains("HOST: 239.255.255.250:1900\r\n"));
        assert!(text.contains("MAN: \"ssdp:discover\"\r\n"));
        assert!(text.contains("MX: 5\r\n"));
        assert!(text.contains("ST: upnp:rootdevice\r\n"));
        assert!(text.contains("USER-AGENT: test-agent UPnP/1.0\r\n"));
        assert!(text.ends_with("\r\n\r\n"));
    }

    #[test]
    fn test_mx_clamped_to_one() {
        let request = SearchRequest::new("ssdp:all", 0, "agent");
        assert_eq!(request.mx, 1);
    }

    #[test]
    fn test_repeat_interval_floor() {
        // 5 x mx seconds wins over a shorter requested frequency
        assert_eq!(
            search_repeat_interval(5, Duration::from_secs(10)),
            Duration::from_secs(25)
        );
        // a longer requested frequency wins over the floor
        assert_eq!(
            search_repeat_interval(2, Duration::from_secs(50)),
            Duration::from_secs(50)
        );
        // mx of zero is treated as 1
        assert_eq!(
            search_repeat_interval(0, Duration::from_secs(1)),
            Duration::from_secs(5)
        );
    }
}
