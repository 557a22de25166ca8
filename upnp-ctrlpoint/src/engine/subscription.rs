//! The subscription engine: SUBSCRIBE/UNSUBSCRIBE exchanges and their
//! response processing.

use std::collections::HashMap;
use std::net::IpAddr;
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};
use upnp_device::StateVariable;
use url::Url;

use super::{lock, ControlPoint};
use crate::error::{CtrlPointError, Result};
use crate::http::{HttpRequest, HttpResponse};
use crate::subscribers::Subscriber;

/// Lease applied when a device answers `Second-infinite`.
const INFINITE_LEASE: Duration = Duration::from_secs(365 * 24 * 3600);

/// Everything the response handler needs to know about the subscribed
/// service, copied out of the device registry before the exchange goes out.
#[derive(Clone)]
pub(crate) struct ServiceContext {
    device_uuid: String,
    service_id: String,
    service_type: String,
    event_url: Url,
    state_variables: Vec<StateVariable>,
}

impl ControlPoint {
    /// Subscribe to (or, with `cancel`, unsubscribe from) a service's
    /// events. Returns once the exchange is queued, not once answered.
    ///
    /// A subscribe against a service that already has a subscription turns
    /// into a renewal. An unsubscribe removes the table entry immediately,
    /// without waiting for the device's answer.
    pub fn subscribe(&self, device_uuid: &str, service_id: &str, cancel: bool) -> Result<()> {
        let (service_type, event_url, state_variables, local_address) = {
            let devices = lock(&self.inner.devices);
            let device = devices
                .find(device_uuid, false)
                .ok_or_else(|| CtrlPointError::DeviceNotFound(device_uuid.to_string()))?;
            let service = device
                .find_service(service_id)
                .ok_or_else(|| CtrlPointError::ServiceNotFound(service_id.to_string()))?;
            if !service.is_subscribable() {
                return Err(CtrlPointError::ServiceNotEventable(service_id.to_string()));
            }
            (
                service.service_type.clone(),
                device.absolute_url(&service.event_sub_url)?,
                service.state_variables().to_vec(),
                device.local_address,
            )
        };

        let existing = lock(&self.inner.subscribers)
            .find_by_service(device_uuid, service_id)
            .map(|sub| (sub.sid.clone(), sub.sid_header.clone()));

        if cancel {
            let Some((sid, sid_header)) = existing else {
                return Err(CtrlPointError::NoSubscription(service_id.to_string()));
            };
            // Eager removal; the device's answer carries no information we
            // still need.
            lock(&self.inner.subscribers).remove_by_sid(&sid);
            info!(%sid, service = %service_id, "unsubscribing");
            let request = HttpRequest::new("UNSUBSCRIBE", event_url)
                .header("SID", sid_header)
                .header("User-Agent", self.inner.config.user_agent.clone());
            let engine = self.clone();
            self.inner.tasks.spawn(async move {
                if let Err(e) = engine.inner.http.send(request).await {
                    debug!(error = %e, "unsubscribe exchange failed");
                }
            });
            return Ok(());
        }

        let ctx = ServiceContext {
            device_uuid: device_uuid.to_string(),
            service_id: service_id.to_string(),
            service_type,
            event_url,
            state_variables,
        };
        let request = match existing {
            Some((_, sid_header)) => self.renewal_request(&ctx, &sid_header),
            None => {
                let (endpoint_addr, port) =
                    self.event_endpoint().ok_or(CtrlPointError::NotStarted)?;
                // Reach the callback server over the interface the device
                // was described through, falling back to the endpoint's own
                // address.
                let callback_addr = local_address.unwrap_or(endpoint_addr);
                let callback = format!(
                    "<http://{}:{}/{}/{}>",
                    host_literal(callback_addr),
                    port,
                    ctx.device_uuid,
                    ctx.service_id
                );
                debug!(service = %service_id, %callback, "subscribing");
                HttpRequest::new("SUBSCRIBE", ctx.event_url.clone())
                    .header("NT", "upnp:event")
                    .header("CALLBACK", callback)
                    .header("TIMEOUT", self.requested_timeout())
                    .header("User-Agent", self.inner.config.user_agent.clone())
            }
        };
        self.enqueue_subscribe(request, ctx);
        Ok(())
    }

    /// Re-issue a SUBSCRIBE for an existing subscription. Servers treat a
    /// SUBSCRIBE carrying a SID as a renewal.
    pub(crate) fn renew_subscriber(&self, subscriber: Subscriber) {
        debug!(sid = %subscriber.sid, "renewing subscription");
        let ctx = ServiceContext {
            device_uuid: subscriber.device_uuid,
            service_id: subscriber.service_id,
            service_type: subscriber.service_type,
            event_url: subscriber.event_url,
            state_variables: subscriber.state_variables,
        };
        let request = self.renewal_request(&ctx, &subscriber.sid_header);
        self.enqueue_subscribe(request, ctx);
    }

    fn renewal_request(&self, ctx: &ServiceContext, sid_header: &str) -> HttpRequest {
        HttpRequest::new("SUBSCRIBE", ctx.event_url.clone())
            .header("SID", sid_header)
            .header("TIMEOUT", self.requested_timeout())
            .header("User-Agent", self.inner.config.user_agent.clone())
    }

    fn requested_timeout(&self) -> String {
        format!("Second-{}", self.inner.config.default_lease.as_secs())
    }

    fn enqueue_subscribe(&self, request: HttpRequest, ctx: ServiceContext) {
        let engine = self.clone();
        self.inner.tasks.spawn(async move {
            let outcome = engine.inner.http.send(request).await;
            engine.process_subscribe_response(outcome, ctx);
        });
    }

    /// Apply the outcome of a SUBSCRIBE exchange.
    ///
    /// Failure (transport error, non-2xx, missing SID or TIMEOUT) drops any
    /// existing subscription for the service; there is no automatic retry
    /// here. Success creates the entry keyed by the returned SID, or
    /// refreshes its expiration when it already exists.
    pub(crate) fn process_subscribe_response(
        &self,
        outcome: Result<HttpResponse>,
        ctx: ServiceContext,
    ) {
        let accepted = match &outcome {
            Ok(response) if response.is_success() => {
                let sid = response.header("SID");
                let timeout = response.header("TIMEOUT").and_then(parse_timeout);
                match (sid, timeout) {
                    (Some(sid), Some(lease)) => Some((sid.to_string(), lease)),
                    _ => None,
                }
            }
            _ => None,
        };

        let Some((sid_header, lease)) = accepted else {
            warn!(service = %ctx.service_id, "subscription failed, dropping entry");
            lock(&self.inner.subscribers).remove_for_service(&ctx.device_uuid, &ctx.service_id);
            return;
        };

        let sid = sid_header
            .strip_prefix("uuid:")
            .unwrap_or(&sid_header)
            .to_string();
        let expiration = Instant::now() + lease;

        // The device may have been removed while the exchange was in flight;
        // a subscriber must never outlive its device.
        if !lock(&self.inner.devices).contains(&ctx.device_uuid) {
            debug!(%sid, device = %ctx.device_uuid, "device vanished before subscribe response");
            return;
        }

        let mut subscribers = lock(&self.inner.subscribers);
        match subscribers.find_by_sid_mut(&sid) {
            Some(subscriber) => {
                debug!(%sid, "subscription renewed");
                subscriber.expiration = expiration;
            }
            None => {
                info!(%sid, service = %ctx.service_id, "subscribed");
                subscribers.insert(Subscriber {
                    sid,
                    sid_header,
                    device_uuid: ctx.device_uuid,
                    service_id: ctx.service_id,
                    service_type: ctx.service_type,
                    event_url: ctx.event_url,
                    seq: None,
                    expiration,
                    state_variables: ctx.state_variables,
                    values: HashMap::new(),
                });
            }
        }
    }
}

fn host_literal(addr: IpAddr) -> String {
    match addr {
        IpAddr::V4(v4) => v4.to_string(),
        IpAddr::V6(v6) => format!("[{v6}]"),
    }
}

/// Parse a `TIMEOUT: Second-N` header value into a lease duration.
fn parse_timeout(value: &str) -> Option<Duration> {
    let value = value.trim();
    if value.len() < 7 || !value[..7].eq_ignore_ascii_case("Second-") {
        return None;
    }
    let rest = value[7..].trim();
    if rest.eq_ignore_ascii_case("infinite") {
        return Some(INFINITE_LEASE);
    }
    rest.parse().ok().map(Duration::from_secs)
}
