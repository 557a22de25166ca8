//! The subscriber table: one entry per active event subscription.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use upnp_device::StateVariable;
use url::Url;

/// One active event subscription.
///
/// Carries its own copy of the service's evented state-variable table so
/// inbound notifications are validated and applied entirely under the
/// subscriber-table lock, without touching the device registry.
#[derive(Debug, Clone)]
pub struct Subscriber {
    /// Subscription identifier with any `uuid:` prefix stripped (table key)
    pub sid: String,
    /// Identifier exactly as the device returned it, echoed on renewals
    pub sid_header: String,
    /// Device owning the subscribed service (may be embedded)
    pub device_uuid: String,
    /// Subscribed service identifier
    pub service_id: String,
    /// Subscribed service type URN
    pub service_type: String,
    /// Resolved event subscription endpoint
    pub event_url: Url,
    /// Last accepted event sequence number; `None` until the first
    /// notification, which is always accepted
    pub seq: Option<u32>,
    /// When the subscription lapses unless renewed
    pub expiration: Instant,
    /// The service's declared state variables, copied at subscribe time
    pub state_variables: Vec<StateVariable>,
    /// Current values of evented variables, updated by notifications
    pub values: HashMap<String, String>,
}

impl Subscriber {
    pub fn knows_variable(&self, name: &str) -> bool {
        self.state_variables.iter().any(|var| var.name == name)
    }
}

/// The subscriber table, keyed by subscription identifier and by service.
pub struct SubscriberTable {
    entries: Vec<Subscriber>,
}

impl SubscriberTable {
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn find_by_sid(&self, sid: &str) -> Option<&Subscriber> {
        self.entries.iter().find(|sub| sub.sid == sid)
    }

    pub fn find_by_sid_mut(&mut self, sid: &str) -> Option<&mut Subscriber> {
        self.entries.iter_mut().find(|sub| sub.sid == sid)
    }

    pub fn find_by_service(&self, device_uuid: &str, service_id: &str) -> Option<&Subscriber> {
        self.entries
            .iter()
            .find(|sub| sub.device_uuid == device_uuid && sub.service_id == service_id)
    }

    pub fn insert(&mut self, subscriber: Subscriber) {
        self.entries.push(subscriber);
    }

    pub fn remove_by_sid(&mut self, sid: &str) -> Option<Subscriber> {
        let pos = self.entries.iter().position(|sub| sub.sid == sid)?;
        Some(self.entries.swap_remove(pos))
    }

    pub fn remove_for_service(&mut self, device_uuid: &str, service_id: &str) -> Option<Subscriber> {
        let pos = self
            .entries
            .iter()
            .position(|sub| sub.device_uuid == device_uuid && sub.service_id == service_id)?;
        Some(self.entries.swap_remove(pos))
    }

    /// Drop every subscription bound to any of the given devices.
    pub fn remove_for_devices(&mut self, uuids: &[String]) -> Vec<Subscriber> {
        let mut removed = Vec::new();
        self.entries.retain(|sub| {
            if uuids.iter().any(|uuid| *uuid == sub.device_uuid) {
                removed.push(sub.clone());
                false
            } else {
                true
            }
        });
        removed
    }

    /// Subscriptions expiring within `headroom` of `now`, cloned out for
    /// renewal outside the lock.
    pub fn due_for_renewal(&self, now: Instant, headroom: Duration) -> Vec<Subscriber> {
        self.entries
            .iter()
            .filter(|sub| sub.expiration <= now + headroom)
            .cloned()
            .collect()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

impl Default for SubscriberTable {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn subscriber(sid: &str, device: &str, service: &str) -> Subscriber {
        Subscriber {
            sid: sid.to_string(),
            sid_header: format!("uuid:{sid}"),
            device_uuid: device.to_string(),
            service_id: service.to_string(),
            service_type: "urn:schemas-upnp-org:service:SwitchPower:1".into(),
            event_url: Url::parse("http://10.0.0.5/event").unwrap(),
            seq: None,
            expiration: Instant::now() + Duration::from_secs(1800),
            state_variables: Vec::new(),
            values: HashMap::new(),
        }
    }

    #[test]
    fn test_lookup_by_sid_and_service() {
        let mut table = SubscriberTable::new();
        table.insert(subscriber("sub1", "abc", "svc1"));
        table.insert(subscriber("sub2", "abc", "svc2"));

        assert_eq!(table.find_by_sid("sub2").unwrap().service_id, "svc2");
        assert_eq!(table.find_by_service("abc", "svc1").unwrap().sid, "sub1");
        assert!(table.find_by_sid("sub3").is_none());
        assert!(table.find_by_service("abc", "svc3").is_none());
    }

    #[test]
    fn test_remove_for_devices() {
        let mut table = SubscriberTable::new();
        table.insert(subscriber("sub1", "abc", "svc1"));
        table.insert(subscriber("sub2", "child", "svc2"));
        table.insert(subscriber("sub3", "other", "svc3"));

        let removed = table.remove_for_devices(&["abc".into(), "child".into()]);
        assert_eq!(removed.len(), 2);
        assert_eq!(table.len(), 1);
        assert!(table.find_by_sid("sub3").is_some());
    }

    #[test]
    fn test_due_for_renewal() {
        let now = Instant::now();
        let mut table = SubscriberTable::new();
        let mut near = subscriber("near", "abc", "svc1");
        near.expiration = now + Duration::from_secs(3);
        let mut far = subscriber("far", "abc", "svc2");
        far.expiration = now + Duration::from_secs(600);
        table.insert(near);
        table.insert(far);

        let due = table.due_for_renewal(now, Duration::from_secs(5));
        assert_eq!(due.len(), 1);
        assert_eq!(due[0].sid, "near");
    }
}
