//! The action engine: SOAP invocation and response fan-out.

use tracing::debug;
use upnp_soap::{format_request, parse_response, Action};

use super::{lock, ControlPoint};
use crate::error::{CtrlPointError, Result};
use crate::http::{HttpRequest, HttpResponse};
use crate::listener::{ActionOutcome, UserToken};

impl ControlPoint {
    /// Build an invocation for an action on a known service. The returned
    /// [`Action`] is detached from the registry; populate its input
    /// arguments and hand it to [`ControlPoint::invoke_action`].
    pub fn create_action(
        &self,
        device_uuid: &str,
        service_id: &str,
        action_name: &str,
    ) -> Result<Action> {
        let devices = lock(&self.inner.devices);
        let device = devices
            .find(device_uuid, false)
            .ok_or_else(|| CtrlPointError::DeviceNotFound(device_uuid.to_string()))?;
        let service = device
            .find_service(service_id)
            .ok_or_else(|| CtrlPointError::ServiceNotFound(service_id.to_string()))?;
        let control_url = device.absolute_url(&service.control_url)?;
        Action::from_service(service, control_url, action_name)
            .ok_or_else(|| CtrlPointError::ActionNotFound(action_name.to_string()))
    }

    /// Enqueue the POST exchange for an action and return immediately. The
    /// result, success or failure, reaches listeners through
    /// `on_action_response` together with the caller's token.
    pub fn invoke_action(&self, action: Action, token: UserToken) {
        let body = format_request(&action);
        let request = HttpRequest::new("POST", action.control_url().clone())
            .header("SOAPAction", action.soap_action_header())
            .header("Content-Type", "text/xml; charset=\"utf-8\"")
            .header("User-Agent", self.inner.config.user_agent.clone())
            .body(body);

        let engine = self.clone();
        self.inner.tasks.spawn(async move {
            let outcome = engine.inner.http.send(request).await;
            engine.process_action_response(outcome, action, token);
        });
    }

    /// Interpret the exchange outcome and fan it out.
    ///
    /// A body is parsed whatever the HTTP status, because fault responses
    /// arrive with 500; fault parsing takes precedence over the generic
    /// invalid-format outcome.
    pub(crate) fn process_action_response(
        &self,
        outcome: Result<HttpResponse>,
        mut action: Action,
        token: UserToken,
    ) {
        let result: Result<()> = match outcome {
            Err(e) => Err(e),
            Ok(response) => match response.body {
                Some(body) => parse_response(&mut action, &body).map_err(CtrlPointError::from),
                None if !response.is_success() => Err(CtrlPointError::Http {
                    status: response.status,
                }),
                None => Err(CtrlPointError::InvalidResponse("missing response body")),
            },
        };
        if let Err(e) = &result {
            debug!(action = action.name(), error = %e, "action failed");
        }
        self.inner
            .listeners
            .action_response(&ActionOutcome { action, result }, &token);
    }
}
