//! Parsing of inbound SSDP datagrams.
//!
//! Two message shapes reach a control point: multicast NOTIFY requests
//! (alive announcements and byebyes) and unicast HTTP responses to its own
//! M-SEARCH requests. Both are HTTP-over-UDP text; parsing is line-based.

use tracing::debug;

use crate::error::{Result, SsdpError};

/// Subtype of an SSDP NOTIFY advertisement, from the NTS header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotifySubType {
    /// `ssdp:alive` — the device is present; renew or create it
    Alive,
    /// `ssdp:byebye` — the device is leaving; remove it
    ByeBye,
}

/// A parsed SSDP NOTIFY advertisement.
#[derive(Debug, Clone, PartialEq)]
pub struct SsdpNotify {
    /// Notification type (e.g. `upnp:rootdevice`)
    pub nt: String,
    /// Alive or byebye
    pub nts: NotifySubType,
    /// Raw USN header value
    pub usn: String,
    /// Description-document URL, present on alive announcements
    pub location: Option<String>,
    /// Lease duration from `Cache-Control: max-age=N`
    pub lease_seconds: Option<u64>,
}

impl SsdpNotify {
    /// Parse a NOTIFY datagram.
    ///
    /// The request line must be exactly `NOTIFY * HTTP/1.1`; anything else is
    /// rejected as not-SSDP.
    pub fn parse(datagram: &str) -> Result<Self> {
        let mut lines = datagram.lines();
        let request_line = lines.next().unwrap_or("").trim();
        let mut parts = request_line.split_whitespace();
        let method = parts.next().unwrap_or("");
        let uri = parts.next().unwrap_or("");
        let protocol = parts.next().unwrap_or("");
        if method != "NOTIFY" || uri != "*" || protocol != "HTTP/1.1" {
            debug!(line = request_line, "discarding datagram, not a NOTIFY");
            return Err(SsdpError::NotSsdp(request_line.to_string()));
        }

        let mut nt = None;
        let mut nts = None;
        let mut usn = None;
        let mut location = None;
        let mut cache_control = None;

        for line in lines {
            let line = line.trim();
            if let Some(value) = extract_header_value(line, "NT:") {
                nt = Some(value);
            } else if let Some(value) = extract_header_value(line, "NTS:") {
                nts = Some(value);
            } else if let Some(value) = extract_header_value(line, "USN:") {
                usn = Some(value);
            } else if let Some(value) = extract_header_value(line, "LOCATION:") {
                location = Some(value);
            } else if let Some(value) = extract_header_value(line, "CACHE-CONTROL:") {
                cache_control = Some(value);
            }
        }

        let nt = require(nt, "NT")?;
        let nts = require(nts, "NTS")?;
        let usn = require(usn, "USN")?;

        let nts = if nts.eq_ignore_ascii_case("ssdp:alive") {
            NotifySubType::Alive
        } else if nts.eq_ignore_ascii_case("ssdp:byebye") {
            NotifySubType::ByeBye
        } else {
            return Err(SsdpError::UnknownSubType(nts));
        };

        Ok(Self {
            nt,
            nts,
            usn,
            location,
            lease_seconds: cache_control.as_deref().and_then(parse_max_age),
        })
    }

    /// Cross-check the USN against the NT header and extract the device uuid.
    pub fn device_uuid(&self) -> Result<String> {
        crate::UniqueServiceName::device_uuid(&self.usn, &self.nt)
    }
}

/// A parsed unicast response to an M-SEARCH request.
#[derive(Debug, Clone, PartialEq)]
pub struct SsdpSearchResponse {
    /// HTTP status code of the response
    pub status: u16,
    /// Search target echoed back by the device
    pub st: String,
    /// Raw USN header value
    pub usn: String,
    /// Description-document URL
    pub location: Option<String>,
    /// Lease duration from `Cache-Control: max-age=N`
    pub lease_seconds: Option<u64>,
    /// Whether the mandatory EXT header was present
    pub ext_present: bool,
}

impl SsdpSearchResponse {
    /// Parse an M-SEARCH response datagram.
    pub fn parse(datagram: &str) -> Result<Self> {
        let mut lines = datagram.lines();
        let status_line = lines.next().unwrap_or("").trim();
        let mut parts = status_line.split_whitespace();
        let protocol = parts.next().unwrap_or("");
        let status: u16 = parts.next().unwrap_or("").parse().unwrap_or(0);
        if !protocol.starts_with("HTTP/") || status == 0 {
            debug!(line = status_line, "discarding datagram, not an HTTP response");
            return Err(SsdpError::NotSsdp(status_line.to_string()));
        }

        let mut st = None;
        let mut usn = None;
        let mut location = None;
        let mut cache_control = None;
        let mut ext_present = false;

        for line in lines {
            let line = line.trim();
            if let Some(value) = extract_header_value(line, "ST:") {
                st = Some(value);
            } else if let Some(value) = extract_header_value(line, "USN:") {
                usn = Some(value);
            } else if let Some(value) = extract_header_value(line, "LOCATION:") {
                location = Some(value);
            } else if let Some(value) = extract_header_value(line, "CACHE-CONTROL:") {
                cache_control = Some(value);
            } else if line.len() >= 4 && line[..4].eq_ignore_ascii_case("EXT:") {
                ext_present = true;
            }
        }

        Ok(Self {
            status,
            st: require(st, "ST")?,
            usn: require(usn, "USN")?,
            location,
            lease_seconds: cache_control.as_deref().and_then(parse_max_age),
            ext_present,
        })
    }

    /// True for any 2xx status; only those carry a usable advertisement.
    pub fn is_success(&self) -> bool {
        self.status / 100 == 2
    }

    /// Cross-check the USN against the ST header and extract the device uuid.
    pub fn device_uuid(&self) -> Result<String> {
        crate::UniqueServiceName::device_uuid(&self.usn, &self.st)
    }
}

/// Extract header value from a line like "HEADER: value"
fn extract_header_value(line: &str, header: &str) -> Option<String> {
    if line.len() > header.len() && line[..header.len()].eq_ignore_ascii_case(header) {
        Some(line[header.len()..].trim().to_string())
    } else {
        None
    }
}

fn require(value: Option<String>, name: &'static str) -> Result<String> {
    match value {
        Some(v) if !v.is_empty() => Ok(v),
        _ => Err(SsdpError::MissingHeader(name)),
    }
}

/// Parse `max-age=N` out of a Cache-Control header value.
fn parse_max_age(value: &str) -> Option<u64> {
    for directive in value.split(',') {
        let directive = directive.trim();
        if let Some(age) = directive
            .strip_prefix("max-age")
            .and_then(|rest| rest.trim_start().strip_prefix('='))
        {
            return age.trim().parse().ok();
        }
    }
    None
}
