//! An in-flight action invocation.

use upnp_device::{ActionDesc, Service, StateVariable};
use url::Url;

use crate::error::{Result, SoapError};

/// A fault returned by the device for an action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionFault {
    /// UPnP error code
    pub code: u32,
    /// Error description, possibly empty
    pub description: String,
}

/// One action invocation against a service.
///
/// Carries its own copies of the action descriptor and the state-variable
/// table so validation needs no access to the device registry while the
/// request is in flight.
#[derive(Debug, Clone)]
pub struct Action {
    desc: ActionDesc,
    service_type: String,
    control_url: Url,
    state_variables: Vec<StateVariable>,
    args: Vec<(String, String)>,
    fault: Option<ActionFault>,
}

impl Action {
    /// Build an invocation for a named action on a service.
    ///
    /// `control_url` must already be resolved against the device's base.
    /// Returns `None` when the service does not declare the action or its
    /// SCPD is not yet loaded.
    pub fn from_service(service: &Service, control_url: Url, action_name: &str) -> Option<Self> {
        let desc = service.find_action(action_name)?.clone();
        Some(Self {
            desc,
            service_type: service.service_type.clone(),
            control_url,
            state_variables: service.state_variables().to_vec(),
            args: Vec::new(),
            fault: None,
        })
    }

    /// Action name.
    pub fn name(&self) -> &str {
        &self.desc.name
    }

    /// Service type URN the action belongs to.
    pub fn service_type(&self) -> &str {
        &self.service_type
    }

    /// Resolved control endpoint.
    pub fn control_url(&self) -> &Url {
        &self.control_url
    }

    /// The action descriptor this invocation was built from.
    pub fn desc(&self) -> &ActionDesc {
        &self.desc
    }

    /// Value of the `SOAPAction` request header, including the quotes.
    pub fn soap_action_header(&self) -> String {
        format!("\"{}#{}\"", self.service_type, self.desc.name)
    }

    /// Set an argument value, validating it against the declared arguments
    /// and the related state variable's allowed values.
    pub fn set_argument(&mut self, name: &str, value: &str) -> Result<()> {
        let arg = self
            .desc
            .arguments
            .iter()
            .find(|arg| arg.name == name)
            .ok_or_else(|| SoapError::UnknownArgument(name.to_string()))?;

        if let Some(var) = self
            .state_variables
            .iter()
            .find(|var| var.name == arg.related_state_variable)
        {
            if !var.accepts(value) {
                return Err(SoapError::InvalidArgumentValue {
                    name: name.to_string(),
                    value: value.to_string(),
                });
            }
        }

        match self.args.iter_mut().find(|(n, _)| n == name) {
            Some(slot) => slot.1 = value.to_string(),
            None => self.args.push((name.to_string(), value.to_string())),
        }
        Ok(())
    }

    /// Value of an argument, input or output.
    pub fn argument(&self, name: &str) -> Option<&str> {
        self.args
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }

    /// All argument values set so far, in insertion order.
    pub fn arguments(&self) -> &[(String, String)] {
        &self.args
    }

    /// The fault returned by the device, if any.
    pub fn fault(&self) -> Option<&ActionFault> {
        self.fault.as_ref()
    }

    pub(crate) fn set_fault(&mut self, fault: ActionFault) {
        self.fault = Some(fault);
    }
}
