//! The per-device service record.

use url::Url;

use crate::error::{DeviceError, Result};
use crate::scpd::{ActionDesc, Scpd, StateVariable};

/// A service owned by a device.
///
/// The URLs are stored as announced in the description document (usually
/// relative); [`Service::resolve_url`] joins them against the device's base.
/// The SCPD is absent until the capability document has been fetched and
/// applied with [`Service::set_scpd`].
#[derive(Debug, Clone, PartialEq)]
pub struct Service {
    /// Service type URN (e.g. `urn:schemas-upnp-org:service:AVTransport:1`)
    pub service_type: String,
    /// Service identifier URN (e.g. `urn:upnp-org:serviceId:AVTransport`)
    pub service_id: String,
    /// SCPD document URL as announced
    pub scpd_url: String,
    /// Control endpoint URL as announced
    pub control_url: String,
    /// Event subscription URL as announced; empty means no event support
    pub event_sub_url: String,
    scpd: Option<Scpd>,
}

impl Service {
    pub(crate) fn new(
        service_type: String,
        service_id: String,
        scpd_url: String,
        control_url: String,
        event_sub_url: String,
    ) -> Self {
        Self {
            service_type,
            service_id,
            scpd_url,
            control_url,
            event_sub_url,
            scpd: None,
        }
    }

    /// Whether the capability document has been loaded.
    pub fn is_loaded(&self) -> bool {
        self.scpd.is_some()
    }

    /// Whether the service advertises event support.
    pub fn is_subscribable(&self) -> bool {
        !self.event_sub_url.is_empty()
    }

    /// Apply a fetched capability document.
    pub fn set_scpd(&mut self, scpd: Scpd) {
        self.scpd = Some(scpd);
    }

    /// Declared state variables; empty before the SCPD is loaded.
    pub fn state_variables(&self) -> &[StateVariable] {
        self.scpd
            .as_ref()
            .map(|scpd| scpd.state_variables.as_slice())
            .unwrap_or_default()
    }

    /// Declared actions; empty before the SCPD is loaded.
    pub fn actions(&self) -> &[ActionDesc] {
        self.scpd
            .as_ref()
            .map(|scpd| scpd.actions.as_slice())
            .unwrap_or_default()
    }

    /// Look up a state variable by name.
    pub fn find_state_variable(&self, name: &str) -> Option<&StateVariable> {
        self.state_variables().iter().find(|var| var.name == name)
    }

    /// Look up an action descriptor by name.
    pub fn find_action(&self, name: &str) -> Option<&ActionDesc> {
        self.actions().iter().find(|action| action.name == name)
    }

    /// Resolve one of this service's announced URLs against a base URL.
    pub fn resolve_url(base: &Url, announced: &str) -> Result<Url> {
        base.join(announced)
            .map_err(|e| DeviceError::InvalidUrl(format!("{announced}: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn service() -> Service {
        Service::new(
            "urn:schemas-upnp-org:service:SwitchPower:1".into(),
            "urn:upnp-org:serviceId:SwitchPower".into(),
            "/switch/scpd.xml".into(),
            "/switch/control".into(),
            "/switch/event".into(),
        )
    }

    #[test]
    fn test_loaded_flag() {
        let mut svc = service();
        assert!(!svc.is_loaded());
        assert!(svc.state_variables().is_empty());
        assert!(svc.actions().is_empty());

        svc.set_scpd(Scpd::default());
        assert!(svc.is_loaded());
    }

    #[test]
    fn test_subscribable() {
        let mut svc = service();
        assert!(svc.is_subscribable());
        svc.event_sub_url.clear();
        assert!(!svc.is_subscribable());
    }

    #[test]
    fn test_resolve_url() {
        let base = Url::parse("http://10.0.0.5:80/desc.xml").unwrap();
        let resolved = Service::resolve_url(&base, "/switch/control").unwrap();
        assert_eq!(resolved.as_str(), "http://10.0.0.5/switch/control");

        let relative = Service::resolve_url(&base, "scpd.xml").unwrap();
        assert_eq!(relative.as_str(), "http://10.0.0.5/scpd.xml");
    }
}
