//! The description pipeline: description fetch, then batched SCPD fetches,
//! then the readiness transition.

use tracing::{debug, info, warn};
use upnp_device::{parse_description, DeviceData, Scpd};
use url::Url;

use super::{lock, ControlPoint};
use crate::config::{SCPD_FETCH_DELAY, SCPD_FETCH_DELAY_EMBEDDED};
use crate::http::HttpRequest;

/// One pending SCPD fetch.
pub(crate) struct ScpdTarget {
    device_uuid: String,
    service_id: String,
    url: Url,
}

impl ControlPoint {
    /// Fetch and apply a device's description document, then schedule the
    /// SCPD batch. Any failure removes the device; a device that vanished
    /// while the fetch was pending is left alone.
    pub(crate) async fn fetch_description(self, uuid: String) {
        let url = {
            let devices = lock(&self.inner.devices);
            match devices.find(&uuid, false) {
                Some(device) => device.description_url.clone(),
                // a byebye won the race during the disambiguation delay
                None => return,
            }
        };

        debug!(%uuid, %url, "fetching description");
        let request =
            HttpRequest::get(url).header("User-Agent", self.inner.config.user_agent.clone());
        let fetched = match self.inner.http.send(request).await {
            Ok(response) if response.is_success() => {
                response.body.clone().map(|body| (body, response.local_addr))
            }
            _ => None,
        };
        let Some((body, local_addr)) = fetched else {
            warn!(%uuid, "description fetch failed, removing device");
            self.remove_device_by_uuid(&uuid);
            return;
        };

        let mut targets = Vec::new();
        let mut has_embedded = false;
        let mut failed = false;
        {
            let mut devices = lock(&self.inner.devices);
            let Some(root) = devices.find_root_mut(&uuid) else {
                return;
            };
            root.local_address = local_addr;
            match parse_description(root, &body).and_then(|()| collect_scpd_targets(root)) {
                Ok(list) => {
                    has_embedded = !root.embedded.is_empty();
                    targets = list;
                }
                Err(e) => {
                    warn!(%uuid, error = %e, "rejecting description");
                    failed = true;
                }
            }
        }
        if failed {
            self.remove_device_by_uuid(&uuid);
            return;
        }

        let delay = if has_embedded {
            SCPD_FETCH_DELAY_EMBEDDED
        } else {
            SCPD_FETCH_DELAY
        };
        let engine = self.clone();
        self.inner.tasks.spawn_after(delay, async move {
            engine.fetch_scpds(uuid, targets).await;
        });
    }

    /// Fetch every service's SCPD in one sequential batch. Each applied
    /// document triggers a readiness recheck; the first time the root is
    /// ready, added-notifications fire for the whole tree, root first.
    pub(crate) async fn fetch_scpds(self, root_uuid: String, targets: Vec<ScpdTarget>) {
        for target in targets {
            let request = HttpRequest::get(target.url.clone())
                .header("User-Agent", self.inner.config.user_agent.clone());
            let body = match self.inner.http.send(request).await {
                Ok(response) if response.is_success() => response.body,
                _ => None,
            };
            let Some(body) = body else {
                warn!(device = %root_uuid, service = %target.service_id, "SCPD fetch failed, removing device");
                self.remove_device_by_uuid(&root_uuid);
                return;
            };
            let scpd = match Scpd::parse(&body) {
                Ok(scpd) => scpd,
                Err(e) => {
                    warn!(device = %root_uuid, service = %target.service_id, error = %e, "rejecting SCPD, removing device");
                    self.remove_device_by_uuid(&root_uuid);
                    return;
                }
            };

            let became_ready = {
                let mut devices = lock(&self.inner.devices);
                let snapshot = {
                    let Some(root) = devices.find_root_mut(&root_uuid) else {
                        return;
                    };
                    let device = if target.device_uuid == root_uuid {
                        root
                    } else {
                        match root.find_embedded_mut(&target.device_uuid) {
                            Some(embedded) => embedded,
                            // subtree detached since the batch was planned
                            None => continue,
                        }
                    };
                    match device.find_service_mut(&target.service_id) {
                        Some(service) => service.set_scpd(scpd),
                        None => continue,
                    }

                    let Some(root) = devices.find_root_mut(&root_uuid) else {
                        return;
                    };
                    if root.is_ready() {
                        Some(root.clone())
                    } else {
                        None
                    }
                };
                match snapshot {
                    Some(root) if devices.mark_announced(&root_uuid) => Some(root),
                    _ => None,
                }
            };

            if let Some(root) = became_ready {
                info!(device = %root.uuid, "device ready");
                let mut order = Vec::new();
                root.visit_root_first(&mut order);
                for device in order {
                    self.inner.listeners.device_added(device);
                }
            }
        }
    }
}

/// Resolve the SCPD URL of every service in the tree, root first.
fn collect_scpd_targets(root: &DeviceData) -> upnp_device::Result<Vec<ScpdTarget>> {
    let mut order = Vec::new();
    root.visit_root_first(&mut order);

    let mut targets = Vec::new();
    for device in order {
        for service in &device.services {
            targets.push(ScpdTarget {
                device_uuid: device.uuid.clone(),
                service_id: service.service_id.clone(),
                url: device.absolute_url(&service.scpd_url)?,
            });
        }
    }
    Ok(targets)
}
