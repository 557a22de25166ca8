//! SCPD (service control protocol description) parsing.
//!
//! The SCPD document lists a service's state variables and action
//! descriptors; a control point needs both to validate action responses and
//! to interpret event notifications.

use xmltree::Element;

use crate::error::{DeviceError, Result};

/// A state variable declared by a service.
#[derive(Debug, Clone, PartialEq)]
pub struct StateVariable {
    /// Variable name
    pub name: String,
    /// Declared data type (e.g. `string`, `ui4`)
    pub data_type: String,
    /// Default value, if declared
    pub default_value: Option<String>,
    /// Allowed values, empty when unrestricted
    pub allowed_values: Vec<String>,
    /// Whether the service events this variable
    pub send_events: bool,
}

impl StateVariable {
    /// Whether `value` is acceptable for this variable.
    ///
    /// Only the allowed-value list is enforced; data-type range validation is
    /// out of scope.
    pub fn accepts(&self, value: &str) -> bool {
        self.allowed_values.is_empty() || self.allowed_values.iter().any(|v| v == value)
    }
}

/// Direction of an action argument.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Sent with the request
    In,
    /// Returned in the response
    Out,
}

/// An argument declared on an action.
#[derive(Debug, Clone, PartialEq)]
pub struct ArgumentDesc {
    /// Argument name
    pub name: String,
    /// In or out
    pub direction: Direction,
    /// Name of the state variable constraining this argument
    pub related_state_variable: String,
}

/// An action descriptor.
#[derive(Debug, Clone, PartialEq)]
pub struct ActionDesc {
    /// Action name
    pub name: String,
    /// Declared arguments, in document order
    pub arguments: Vec<ArgumentDesc>,
}

impl ActionDesc {
    /// Iterate the declared output arguments.
    pub fn output_arguments(&self) -> impl Iterator<Item = &ArgumentDesc> {
        self.arguments
            .iter()
            .filter(|arg| arg.direction == Direction::Out)
    }
}

/// A parsed SCPD document.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Scpd {
    /// Declared state variables
    pub state_variables: Vec<StateVariable>,
    /// Declared actions
    pub actions: Vec<ActionDesc>,
}

impl Scpd {
    /// Parse an SCPD XML document.
    pub fn parse(xml: &str) -> Result<Self> {
        let root = Element::parse(xml.as_bytes()).map_err(|e| DeviceError::Parse(e.to_string()))?;
        if !root.name.eq_ignore_ascii_case("scpd") {
            return Err(DeviceError::MissingElement("scpd"));
        }

        let mut state_variables = Vec::new();
        if let Some(table) = root.get_child("serviceStateTable") {
            for var in children_named(table, "stateVariable") {
                state_variables.push(parse_state_variable(var)?);
            }
        }

        let mut actions = Vec::new();
        if let Some(list) = root.get_child("actionList") {
            for action in children_named(list, "action") {
                actions.push(parse_action(action)?);
            }
        }

        Ok(Self {
            state_variables,
            actions,
        })
    }
}

fn parse_state_variable(el: &Element) -> Result<StateVariable> {
    let name = child_text(el, "name").ok_or(DeviceError::MissingElement("stateVariable/name"))?;
    let data_type = child_text(el, "dataType").unwrap_or_default();
    let default_value = child_text(el, "defaultValue");
    let send_events = el
        .attributes
        .get("sendEvents")
        .map(|v| v.eq_ignore_ascii_case("yes"))
        .unwrap_or(true);

    let allowed_values = el
        .get_child("allowedValueList")
        .map(|list| {
            children_named(list, "allowedValue")
                .filter_map(|v| v.get_text().map(|t| t.into_owned()))
                .collect()
        })
        .unwrap_or_default();

    Ok(StateVariable {
        name,
        data_type,
        default_value,
        allowed_values,
        send_events,
    })
}

fn parse_action(el: &Element) -> Result<ActionDesc> {
    let name = child_text(el, "name").ok_or(DeviceError::MissingElement("action/name"))?;
    let mut arguments = Vec::new();
    if let Some(list) = el.get_child("argumentList") {
        for arg in children_named(list, "argument") {
            let arg_name =
                child_text(arg, "name").ok_or(DeviceError::MissingElement("argument/name"))?;
            let direction = match child_text(arg, "direction").as_deref() {
                Some(d) if d.eq_ignore_ascii_case("out") => Direction::Out,
                _ => Direction::In,
            };
            arguments.push(ArgumentDesc {
                name: arg_name,
                direction,
                related_state_variable: child_text(arg, "relatedStateVariable")
                    .unwrap_or_default(),
            });
        }
    }
    Ok(ActionDesc { name, arguments })
}

/// Iterate child elements with the given (local) name.
pub(crate) fn children_named<'a>(
    el: &'a Element,
    name: &'a str,
) -> impl Iterator<Item = &'a Element> {
    el.children
        .iter()
        .filter_map(|node| node.as_element())
        .filter(move |child| child.name == name)
}

/// Text content of the named child, trimmed.
pub(crate) fn child_text(el: &Element, name: &str) -> Option<String> {
    el.get_child(name)
        .and_then(|child| child.get_text())
        .map(|text| text.trim().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    const SCPD: &str = r#"<?xml version="1.0"?>
<scpd xmlns="urn:schemas-upnp-org:service-1-0">
  <specVersion><major>1</major><minor>0</minor></specVersion>
  <actionList>
    <action>
      <name>GetTarget</name>
      <argumentList>
        <argument>
          <name>RetTargetValue</name>
          <direction>out</direction>
          <relatedStateVariable>Target</relatedStateVariable>
        </argument>
      </argumentList>
    </action>
    <action>
      <name>SetTarget</name>
      <argumentList>
        <argument>
          <name>newTargetValue</name>
          <direction>in</direction>
          <relatedStateVariable>Target</relatedStateVariable>
        </argument>
      </argumentList>
    </action>
  </actionList>
  <serviceStateTable>
    <stateVariable sendEvents="no">
      <name>Target</name>
      <dataType>boolean</dataType>
      <defaultValue>0</defaultValue>
    </stateVariable>
    <stateVariable sendEvents="yes">
      <name>Status</name>
      <dataType>string</dataType>
      <allowedValueList>
        <allowedValue>ON</allowedValue>
        <allowedValue>OFF</allowedValue>
      </allowedValueList>
    </stateVariable>
  </serviceStateTable>
</scpd>"#;

    #[test]
    fn test_parse_scpd() {
        let scpd = Scpd::parse(SCPD).unwrap();

        assert_eq!(scpd.actions.len(), 2);
        let get = &scpd.actions[0];
        assert_eq!(get.name, "GetTarget");
        assert_eq!(get.arguments.len(), 1);
        assert_eq!(get.arguments[0].direction, Direction::Out);
        assert_eq!(get.arguments[0].related_state_variable, "Target");
        assert_eq!(get.output_arguments().count(), 1);

        let set = &scpd.actions[1];
        assert_eq!(set.arguments[0].direction, Direction::In);
        assert_eq!(set.output_arguments().count(), 0);

        assert_eq!(scpd.state_variables.len(), 2);
        let target = &scpd.state_variables[0];
        assert_eq!(target.name, "Target");
        assert!(!target.send_events);
        assert_eq!(target.default_value.as_deref(), Some("0"));

        let status = &scpd.state_variables[1];
        assert!(status.send_events);
        assert_eq!(status.allowed_values, vec!["ON", "OFF"]);
    }

    #[test]
    fn test_allowed_values_enforced() {
        let scpd = Scpd::parse(SCPD).unwrap();
        let status = &scpd.state_variables[1];
        assert!(status.accepts("ON"));
        assert!(!status.accepts("HALF"));

        // unrestricted variables accept anything
        let target = &scpd.state_variables[0];
        assert!(target.accepts("whatever"));
    }

    #[test]
    fn test_parse_rejects_non_scpd() {
        assert!(Scpd::parse("<root/>").is_err());
        assert!(Scpd::parse("not xml").is_err());
    }

    #[test]
    fn test_empty_scpd_parses() {
        let scpd = Scpd::parse(r#"<scpd xmlns="urn:schemas-upnp-org:service-1-0"/>"#).unwrap();
        assert!(scpd.actions.is_empty());
        assert!(scpd.state_variables.is_empty());
    }
}
