//! Engine configuration and timing constants.

use std::ops::RangeInclusive;
use std::time::Duration;

/// Delay between registering an announced device and fetching its
/// description, so an out-of-order byebye for the same identifier can land
/// first.
pub const DESCRIPTION_FETCH_DELAY: Duration = Duration::from_secs(1);

/// Delay before the batched SCPD fetches for a described device.
pub const SCPD_FETCH_DELAY: Duration = Duration::from_millis(100);

/// SCPD batch delay when the root owns embedded devices; some peers are
/// slow to serve SCPDs right after a large description.
pub const SCPD_FETCH_DELAY_EMBEDDED: Duration = Duration::from_secs(1);

/// Subscriptions are renewed this far ahead of their expiration.
pub const RENEWAL_HEADROOM: Duration = Duration::from_secs(5);

/// Process-wide configuration consumed by the engine.
#[derive(Debug, Clone)]
pub struct CtrlPointConfig {
    /// Discovery target searched for (`upnp:rootdevice` by default)
    pub search_target: String,
    /// MX value of outgoing searches, in seconds
    pub search_mx: u32,
    /// Requested interval between repeated searches; the effective interval
    /// is never shorter than five times the MX value
    pub search_frequency: Duration,
    /// Lease requested on subscriptions and assumed when an announcement
    /// carries no lease header
    pub default_lease: Duration,
    /// User-Agent sent on every outgoing request
    pub user_agent: String,
    /// Ports probed for the event callback server
    pub callback_ports: RangeInclusive<u16>,
    /// Cadence of the expiry/renewal housekeeping pass
    pub housekeeping_interval: Duration,
}

impl Default for CtrlPointConfig {
    fn default() -> Self {
        Self {
            search_target: upnp_ssdp::ROOT_DEVICE_TARGET.to_string(),
            search_mx: 5,
            search_frequency: Duration::from_secs(50),
            default_lease: Duration::from_secs(1800),
            user_agent: concat!("upnp-ctrlpoint/", env!("CARGO_PKG_VERSION")).to_string(),
            callback_ports: 52000..=52009,
            housekeeping_interval: Duration::from_secs(1),
        }
    }
}
