//! Observer interface and fan-out registry.

use std::any::Any;
use std::sync::{Arc, Mutex};

use tracing::warn;
use upnp_device::DeviceData;
use upnp_soap::Action;

use crate::error::CtrlPointError;

/// Opaque caller token carried through an action invocation.
pub type UserToken = Option<Arc<dyn Any + Send + Sync>>;

/// Identifies the service an event notification belongs to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceKey {
    /// Owning device identifier
    pub device_uuid: String,
    /// Service identifier URN
    pub service_id: String,
    /// Service type URN
    pub service_type: String,
}

/// One state-variable change carried by an event notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StateVariableChange {
    /// Variable name
    pub name: String,
    /// New value
    pub value: String,
}

/// Completed action invocation delivered to listeners.
#[derive(Debug)]
pub struct ActionOutcome {
    /// The invocation, carrying output arguments and any fault
    pub action: Action,
    /// `Ok` on full success; failures include transport errors, malformed
    /// responses and faults
    pub result: Result<(), CtrlPointError>,
}

/// Typed observer over engine events. All methods default to no-ops so
/// implementors override only what they care about.
pub trait CtrlPointListener: Send + Sync {
    /// A root or embedded device became ready.
    fn on_device_added(&self, device: &DeviceData) {
        let _ = device;
    }

    /// A device left the registry (byebye, fetch failure or lease expiry).
    fn on_device_removed(&self, device: &DeviceData) {
        let _ = device;
    }

    /// An action invocation completed, successfully or not.
    fn on_action_response(&self, outcome: &ActionOutcome, token: &UserToken) {
        let _ = (outcome, token);
    }

    /// An event notification was accepted with a non-empty change set.
    fn on_event_notify(&self, service: &ServiceKey, changes: &[StateVariableChange]) {
        let _ = (service, changes);
    }
}

/// Listener set with snapshot fan-out.
///
/// The lock is held only to copy the set; callbacks run after release so a
/// listener can re-enter the engine without deadlocking.
pub struct ListenerRegistry {
    listeners: Mutex<Vec<Arc<dyn CtrlPointListener>>>,
}

impl ListenerRegistry {
    pub fn new() -> Self {
        Self {
            listeners: Mutex::new(Vec::new()),
        }
    }

    pub fn add(&self, listener: Arc<dyn CtrlPointListener>) {
        if let Ok(mut listeners) = self.listeners.lock() {
            listeners.push(listener);
        }
    }

    pub fn remove(&self, listener: &Arc<dyn CtrlPointListener>) {
        if let Ok(mut listeners) = self.listeners.lock() {
            listeners.retain(|l| !Arc::ptr_eq(l, listener));
        }
    }

    fn snapshot(&self) -> Vec<Arc<dyn CtrlPointListener>> {
        match self.listeners.lock() {
            Ok(listeners) => listeners.clone(),
            Err(poisoned) => {
                warn!("listener registry lock poisoned");
                poisoned.into_inner().clone()
            }
        }
    }

    pub fn device_added(&self, device: &DeviceData) {
        for listener in self.snapshot() {
            listener.on_device_added(device);
        }
    }

    pub fn device_removed(&self, device: &DeviceData) {
        for listener in self.snapshot() {
            listener.on_device_removed(device);
        }
    }

    pub fn action_response(&self, outcome: &ActionOutcome, token: &UserToken) {
        for listener in self.snapshot() {
            listener.on_action_response(outcome, token);
        }
    }

    pub fn event_notify(&self, service: &ServiceKey, changes: &[StateVariableChange]) {
        for listener in self.snapshot() {
            listener.on_event_notify(service, changes);
        }
    }
}

impl Default for ListenerRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;
    use url::Url;

    #[derive(Default)]
    struct Counting {
        added: AtomicUsize,
        removed: AtomicUsize,
    }

    impl CtrlPointListener for Counting {
        fn on_device_added(&self, _device: &DeviceData) {
            self.added.fetch_add(1, Ordering::SeqCst);
        }
        fn on_device_removed(&self, _device: &DeviceData) {
            self.removed.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn device() -> DeviceData {
        DeviceData::new_shell(
            "abc",
            Url::parse("http://10.0.0.5/desc.xml").unwrap(),
            Duration::from_secs(1800),
        )
    }

    #[test]
    fn test_fan_out_and_remove() {
        let registry = ListenerRegistry::new();
        let listener = Arc::new(Counting::default());
        let as_dyn: Arc<dyn CtrlPointListener> = listener.clone();
        registry.add(as_dyn.clone());

        registry.device_added(&device());
        registry.device_removed(&device());
        assert_eq!(listener.added.load(Ordering::SeqCst), 1);
        assert_eq!(listener.removed.load(Ordering::SeqCst), 1);

        registry.remove(&as_dyn);
        registry.device_added(&device());
        assert_eq!(listener.added.load(Ordering::SeqCst), 1);
    }
}
