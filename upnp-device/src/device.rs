//! The device tree: one root device owning services and embedded devices.

use std::net::IpAddr;
use std::time::{Duration, Instant};

use url::Url;

use crate::service::Service;

/// A UPnP device, root or embedded.
///
/// Root devices are owned by the registry; embedded devices are owned by
/// their parent's `embedded` list and carry only the parent's identifier,
/// never a pointer back up the tree.
#[derive(Debug, Clone)]
pub struct DeviceData {
    /// Bare device identifier (without the `uuid:` prefix)
    pub uuid: String,
    /// Parent device identifier; empty for a root device
    pub parent_uuid: String,
    /// Friendly name from the description document
    pub friendly_name: String,
    /// Device type URN from the description document
    pub device_type: String,
    /// Where the description document was announced
    pub description_url: Url,
    /// Base for resolving relative service URLs (URLBase or the description URL)
    pub url_base: Url,
    /// Local interface address used when the description was fetched
    pub local_address: Option<IpAddr>,
    /// Advertised lease duration
    pub lease: Duration,
    /// When the lease was last renewed by an announcement
    pub last_renewed: Instant,
    /// Services owned directly by this device
    pub services: Vec<Service>,
    /// Embedded child devices
    pub embedded: Vec<DeviceData>,
}

impl DeviceData {
    /// Create the registry shell for a newly announced device.
    ///
    /// Everything beyond identity, location and lease is filled in once the
    /// description document has been fetched and parsed.
    pub fn new_shell(uuid: impl Into<String>, description_url: Url, lease: Duration) -> Self {
        Self {
            uuid: uuid.into(),
            parent_uuid: String::new(),
            friendly_name: String::new(),
            device_type: String::new(),
            url_base: description_url.clone(),
            description_url,
            local_address: None,
            lease,
            last_renewed: Instant::now(),
            services: Vec::new(),
            embedded: Vec::new(),
        }
    }

    /// Whether this device (and recursively its embedded devices) is ready.
    ///
    /// Ready means every service has its capability document loaded, every
    /// embedded device is itself ready, and the device has at least one
    /// service or one embedded device. Recomputed on every call, never
    /// cached.
    pub fn is_ready(&self) -> bool {
        if self.services.iter().any(|svc| !svc.is_loaded()) {
            return false;
        }
        if self.embedded.iter().any(|child| !child.is_ready()) {
            return false;
        }
        !self.services.is_empty() || !self.embedded.is_empty()
    }

    /// Recursive search of the embedded-device tree by identifier.
    pub fn find_embedded(&self, uuid: &str) -> Option<&DeviceData> {
        for child in &self.embedded {
            if child.uuid == uuid {
                return Some(child);
            }
            if let Some(found) = child.find_embedded(uuid) {
                return Some(found);
            }
        }
        None
    }

    /// Mutable variant of [`DeviceData::find_embedded`].
    pub fn find_embedded_mut(&mut self, uuid: &str) -> Option<&mut DeviceData> {
        for child in &mut self.embedded {
            if child.uuid == uuid {
                return Some(child);
            }
            if let Some(found) = child.find_embedded_mut(uuid) {
                return Some(found);
            }
        }
        None
    }

    /// Find a service on this device (not embedded devices) by identifier.
    pub fn find_service(&self, service_id: &str) -> Option<&Service> {
        self.services.iter().find(|svc| svc.service_id == service_id)
    }

    /// Mutable variant of [`DeviceData::find_service`].
    pub fn find_service_mut(&mut self, service_id: &str) -> Option<&mut Service> {
        self.services
            .iter_mut()
            .find(|svc| svc.service_id == service_id)
    }

    /// Find a service on this device by type URN.
    pub fn find_service_by_type(&self, service_type: &str) -> Option<&Service> {
        self.services
            .iter()
            .find(|svc| svc.service_type == service_type)
    }

    /// Reset the lease clock, optionally updating the advertised duration.
    pub fn renew_lease(&mut self, lease: Duration) {
        self.lease = lease;
        self.last_renewed = Instant::now();
    }

    /// Whether the lease has expired twice over without renewal.
    pub fn lease_expired(&self, now: Instant) -> bool {
        now.duration_since(self.last_renewed) > self.lease * 2
    }

    /// Resolve an announced (usually relative) URL against this device's base.
    pub fn absolute_url(&self, announced: &str) -> crate::Result<Url> {
        Service::resolve_url(&self.url_base, announced)
    }

    /// Visit this device and every embedded device, innermost first.
    ///
    /// This is the removal order: notifications fired during removal must
    /// mirror it.
    pub fn visit_innermost_first<'a>(&'a self, out: &mut Vec<&'a DeviceData>) {
        for child in &self.embedded {
            child.visit_innermost_first(out);
        }
        out.push(self);
    }

    /// Visit this device and every embedded device, root first.
    pub fn visit_root_first<'a>(&'a self, out: &mut Vec<&'a DeviceData>) {
        out.push(self);
        for child in &self.embedded {
            child.visit_root_first(out);
        }
    }
}
