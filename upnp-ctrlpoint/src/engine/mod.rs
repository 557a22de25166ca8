//! The control-point engine.
//!
//! [`ControlPoint`] ties the registries, the transports and the background
//! tasks together. Three independent locks guard the device registry, the
//! subscriber table and the listener set; no code path holds more than one
//! at a time — cross-domain reads copy values out before the next lock is
//! taken. Public operations enqueue work and return; only background tasks
//! await network I/O.

mod action;
mod description;
mod discovery;
mod housekeeping;
mod notify;
mod subscription;

use std::collections::HashSet;
use std::net::{IpAddr, Ipv4Addr};
use std::sync::{Arc, Mutex, MutexGuard};

use tracing::info;
use upnp_device::DeviceData;

use crate::callback::{EventCallbackServer, NotifyHandler};
use crate::config::CtrlPointConfig;
use crate::error::Result;
use crate::http::{HttpExchange, ReqwestExchange};
use crate::listener::{CtrlPointListener, ListenerRegistry};
use crate::registry::DeviceRegistry;
use crate::subscribers::{Subscriber, SubscriberTable};
use crate::tasks::TaskManager;
use crate::transport::{SsdpTransport, UdpSsdpTransport};

/// Lock acquisition that survives poisoning; the registries stay usable
/// even if a listener panicked during an earlier engine call.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

pub(crate) struct Inner {
    pub(crate) config: CtrlPointConfig,
    pub(crate) devices: Mutex<DeviceRegistry>,
    pub(crate) subscribers: Mutex<SubscriberTable>,
    pub(crate) listeners: ListenerRegistry,
    pub(crate) ignored: Mutex<HashSet<String>>,
    pub(crate) tasks: TaskManager,
    pub(crate) http: Arc<dyn HttpExchange>,
    pub(crate) ssdp: Arc<dyn SsdpTransport>,
    pub(crate) event_endpoint: Mutex<Option<(IpAddr, u16)>>,
    pub(crate) callback: Mutex<Option<EventCallbackServer>>,
}

/// The UPnP control point. Cheap to clone; all clones share one engine.
#[derive(Clone)]
pub struct ControlPoint {
    pub(crate) inner: Arc<Inner>,
}

impl ControlPoint {
    /// Create an engine with the production transports.
    pub fn new(config: CtrlPointConfig) -> Result<Self> {
        let http = ReqwestExchange::new(&config.user_agent)?;
        Ok(Self::with_transports(config, http, Arc::new(UdpSsdpTransport)))
    }

    /// Create an engine over caller-supplied transports.
    pub fn with_transports(
        config: CtrlPointConfig,
        http: Arc<dyn HttpExchange>,
        ssdp: Arc<dyn SsdpTransport>,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                config,
                devices: Mutex::new(DeviceRegistry::new()),
                subscribers: Mutex::new(SubscriberTable::new()),
                listeners: ListenerRegistry::new(),
                ignored: Mutex::new(HashSet::new()),
                tasks: TaskManager::new(),
                http,
                ssdp,
                event_endpoint: Mutex::new(None),
                callback: Mutex::new(None),
            }),
        }
    }

    /// Start the callback server, the housekeeper and one repeating search
    /// task per usable local address.
    pub async fn start(&self) -> Result<()> {
        let handler: Arc<dyn NotifyHandler> = Arc::new(self.clone());
        let server =
            EventCallbackServer::start(self.inner.config.callback_ports.clone(), handler).await?;
        let port = server.port();
        let fallback_addr = self
            .inner
            .ssdp
            .local_addresses()
            .into_iter()
            .next()
            .unwrap_or(IpAddr::V4(Ipv4Addr::LOCALHOST));
        self.set_event_endpoint(fallback_addr, port);
        *lock(&self.inner.callback) = Some(server);

        let engine = self.clone();
        self.inner.tasks.spawn(engine.housekeeping_loop());

        for addr in self.inner.ssdp.local_addresses() {
            let engine = self.clone();
            self.inner.tasks.spawn(engine.search_loop(addr));
        }

        info!(port, "control point started");
        Ok(())
    }

    /// Stop the engine: cancel all outstanding work, shut the callback
    /// server down, then clear the registries. The ordering matters — the
    /// registries must not be mutated concurrently with in-flight callbacks
    /// once cancellation begins.
    pub async fn stop(&self) {
        self.inner.tasks.abort_all();
        let server = lock(&self.inner.callback).take();
        if let Some(mut server) = server {
            server.stop().await;
        }
        lock(&self.inner.devices).clear();
        lock(&self.inner.subscribers).clear();
        *lock(&self.inner.event_endpoint) = None;
        info!("control point stopped");
    }

    pub fn add_listener(&self, listener: Arc<dyn CtrlPointListener>) {
        self.inner.listeners.add(listener);
    }

    pub fn remove_listener(&self, listener: &Arc<dyn CtrlPointListener>) {
        self.inner.listeners.remove(listener);
    }

    /// Ignore future advertisements carrying this identifier (used for
    /// devices this process itself hosts). Any `uuid:` prefix is stripped.
    pub fn ignore_uuid(&self, uuid: &str) {
        let uuid = uuid.strip_prefix("uuid:").unwrap_or(uuid);
        lock(&self.inner.ignored).insert(uuid.to_string());
    }

    /// Snapshot of one device by identifier (root or embedded).
    pub fn device(&self, uuid: &str) -> Option<DeviceData> {
        lock(&self.inner.devices).find(uuid, false).cloned()
    }

    /// Snapshot of every known root device.
    pub fn devices(&self) -> Vec<DeviceData> {
        lock(&self.inner.devices).roots().to_vec()
    }

    /// Snapshot of one subscription by identifier.
    pub fn subscriber_by_sid(&self, sid: &str) -> Option<Subscriber> {
        lock(&self.inner.subscribers).find_by_sid(sid).cloned()
    }

    /// Snapshot of the subscription for one service, if any.
    pub fn subscriber_for_service(&self, device_uuid: &str, service_id: &str) -> Option<Subscriber> {
        lock(&self.inner.subscribers)
            .find_by_service(device_uuid, service_id)
            .cloned()
    }

    /// Number of active subscriptions.
    pub fn subscriber_count(&self) -> usize {
        lock(&self.inner.subscribers).len()
    }

    /// Where NOTIFY callbacks reach this engine. Normally set by
    /// [`ControlPoint::start`]; callers running their own endpoint can set
    /// it directly.
    pub fn set_event_endpoint(&self, addr: IpAddr, port: u16) {
        *lock(&self.inner.event_endpoint) = Some((addr, port));
    }

    pub(crate) fn event_endpoint(&self) -> Option<(IpAddr, u16)> {
        *lock(&self.inner.event_endpoint)
    }
}
