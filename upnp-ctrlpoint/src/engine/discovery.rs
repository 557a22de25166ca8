//! Discovery processing: announcements, byebyes, search responses and the
//! repeating search task.

use std::net::IpAddr;
use std::time::Duration;

use tracing::{debug, info, warn};
use upnp_device::DeviceData;
use upnp_ssdp::{
    search_repeat_interval, NotifySubType, SearchRequest, SsdpNotify, SsdpSearchResponse,
    ROOT_DEVICE_TARGET,
};
use url::Url;

use super::{lock, ControlPoint};
use crate::config::DESCRIPTION_FETCH_DELAY;
use crate::error::{CtrlPointError, Result};

impl ControlPoint {
    /// Process one inbound NOTIFY datagram (alive or byebye).
    ///
    /// Byebye removal is synchronous: it must win the race against the
    /// delayed description fetch of a device that announced and vanished in
    /// quick succession.
    pub fn process_ssdp_datagram(&self, datagram: &str) -> Result<()> {
        let notify = SsdpNotify::parse(datagram)?;
        let uuid = notify.device_uuid()?;
        if self.is_ignored(&uuid) {
            return Ok(());
        }

        match notify.nts {
            NotifySubType::ByeBye => {
                debug!(%uuid, "byebye");
                self.remove_device_by_uuid(&uuid);
                Ok(())
            }
            NotifySubType::Alive => {
                self.process_alive(uuid, &notify.nt, notify.location, notify.lease_seconds)
            }
        }
    }

    /// Process one unicast M-SEARCH response. Non-2xx responses are
    /// discarded without effect; a response lacking the mandatory EXT
    /// header is rejected.
    pub fn process_search_response(&self, datagram: &str) -> Result<()> {
        let response = SsdpSearchResponse::parse(datagram)?;
        if !response.is_success() {
            return Ok(());
        }
        if !response.ext_present {
            return Err(upnp_ssdp::SsdpError::MissingHeader("EXT").into());
        }
        let uuid = response.device_uuid()?;
        if self.is_ignored(&uuid) {
            return Ok(());
        }
        self.process_alive(uuid, &response.st, response.location, response.lease_seconds)
    }

    fn process_alive(
        &self,
        uuid: String,
        target: &str,
        location: Option<String>,
        lease_seconds: Option<u64>,
    ) -> Result<()> {
        let lease = lease_seconds
            .map(Duration::from_secs)
            .unwrap_or(self.inner.config.default_lease);

        // Known identifier, whatever the target: just renew.
        if lock(&self.inner.devices).renew_lease(&uuid, lease) {
            debug!(%uuid, "lease renewed");
            return Ok(());
        }

        // Unknown devices are only created from root-device advertisements;
        // per-service and per-device-type targets for them are ignored.
        if target != ROOT_DEVICE_TARGET {
            return Ok(());
        }
        let location =
            location.ok_or(CtrlPointError::Ssdp(upnp_ssdp::SsdpError::MissingHeader(
                "LOCATION",
            )))?;
        let description_url = Url::parse(&location)
            .map_err(|e| CtrlPointError::Device(upnp_device::DeviceError::InvalidUrl(format!(
                "{location}: {e}"
            ))))?;

        let added = {
            let mut devices = lock(&self.inner.devices);
            // Re-check under the lock; a concurrent datagram may have won.
            if devices.renew_lease(&uuid, lease) {
                false
            } else {
                devices.add(DeviceData::new_shell(uuid.clone(), description_url, lease))
            }
        };

        if added {
            info!(%uuid, "device announced, scheduling description fetch");
            let engine = self.clone();
            let pending = uuid;
            self.inner
                .tasks
                .spawn_after(DESCRIPTION_FETCH_DELAY, async move {
                    engine.fetch_description(pending).await;
                });
        }
        Ok(())
    }

    /// Remove the device tree containing `uuid` (always the whole root tree
    /// for discovery-driven removals), drop every subscription bound to any
    /// removed device, and notify listeners in removal order, innermost
    /// first.
    pub(crate) fn remove_device_by_uuid(&self, uuid: &str) {
        let detached = {
            let mut devices = lock(&self.inner.devices);
            devices
                .find(uuid, true)
                .map(|root| root.uuid.clone())
                .and_then(|root_uuid| devices.remove(&root_uuid))
        };
        let Some(tree) = detached else {
            return;
        };

        let mut order = Vec::new();
        tree.visit_innermost_first(&mut order);
        let uuids: Vec<String> = order.iter().map(|d| d.uuid.clone()).collect();

        let dropped = lock(&self.inner.subscribers).remove_for_devices(&uuids);
        if !dropped.is_empty() {
            debug!(device = %tree.uuid, count = dropped.len(), "dropped subscriptions");
        }

        info!(device = %tree.uuid, "device removed");
        for device in order {
            self.inner.listeners.device_removed(device);
        }
    }

    fn is_ignored(&self, uuid: &str) -> bool {
        lock(&self.inner.ignored).contains(uuid)
    }

    pub(crate) async fn search_loop(self, from: IpAddr) {
        let request = SearchRequest::new(
            self.inner.config.search_target.clone(),
            self.inner.config.search_mx,
            self.inner.config.user_agent.clone(),
        );
        let payload = request.format();
        let period = search_repeat_interval(request.mx, self.inner.config.search_frequency);

        loop {
            match self.inner.ssdp.search(from, &payload, request.mx).await {
                Ok(datagrams) => {
                    for datagram in datagrams {
                        if let Err(e) = self.process_search_response(&datagram) {
                            debug!(error = %e, "discarding search response");
                        }
                    }
                }
                Err(e) => warn!(%from, error = %e, "search round failed"),
            }
            tokio::time::sleep(period).await;
        }
    }
}
