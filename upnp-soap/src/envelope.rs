//! SOAP envelope formatting and parsing.

use upnp_device::Direction;
use xmltree::Element;

use crate::action::{Action, ActionFault};
use crate::error::{Result, SoapError};
use crate::{SOAP_ENCODING_NS, SOAP_ENVELOPE_NS};

/// Serialize the request envelope for an action.
///
/// Input arguments are emitted in declared order; arguments never set are
/// sent empty.
pub fn format_request(action: &Action) -> String {
    let mut body = String::new();
    for arg in &action.desc().arguments {
        if arg.direction != Direction::In {
            continue;
        }
        let value = action.argument(&arg.name).unwrap_or("");
        body.push_str(&format!(
            "<{name}>{value}</{name}>",
            name = arg.name,
            value = escape_xml(value)
        ));
    }

    format!(
        concat!(
            "<?xml version=\"1.0\" encoding=\"utf-8\"?>",
            "<s:Envelope xmlns:s=\"{env}\" s:encodingStyle=\"{enc}\">",
            "<s:Body>",
            "<u:{name} xmlns:u=\"{service}\">{body}</u:{name}>",
            "</s:Body>",
            "</s:Envelope>"
        ),
        env = SOAP_ENVELOPE_NS,
        enc = SOAP_ENCODING_NS,
        name = action.name(),
        service = escape_xml(action.service_type()),
        body = body,
    )
}

/// Parse a response envelope into the action's output arguments.
///
/// A SOAP fault is recorded on the action and returned as
/// [`SoapError::Fault`]. Any shape violation yields
/// [`SoapError::InvalidFormat`]: wrong envelope namespace, wrong encoding
/// style, a response element that does not match the action, or an argument
/// the action does not declare as output.
pub fn parse_response(action: &mut Action, body: &str) -> Result<()> {
    let root = Element::parse(body.as_bytes()).map_err(|e| SoapError::Parse(e.to_string()))?;
    if !root.name.eq_ignore_ascii_case("Envelope") {
        return Err(SoapError::InvalidFormat("root element is not an envelope"));
    }
    if root.namespace.as_deref() != Some(SOAP_ENVELOPE_NS) {
        return Err(SoapError::InvalidFormat("wrong envelope namespace"));
    }
    if let Some(style) = root.attributes.get("encodingStyle") {
        if style != SOAP_ENCODING_NS {
            return Err(SoapError::InvalidFormat("wrong encoding style"));
        }
    }

    let soap_body = child_by_local_name(&root, "Body")
        .ok_or(SoapError::InvalidFormat("missing body"))?;
    let payload = element_children(soap_body)
        .next()
        .ok_or(SoapError::InvalidFormat("empty body"))?;

    if payload.name.eq_ignore_ascii_case("Fault") {
        let fault = parse_fault(payload);
        action.set_fault(fault.clone());
        return Err(SoapError::Fault {
            code: fault.code,
            description: fault.description,
        });
    }

    let expected = format!("{}Response", action.name());
    if payload.name != expected {
        return Err(SoapError::InvalidFormat("unexpected response element"));
    }
    if payload.namespace.as_deref() != Some(action.service_type()) {
        return Err(SoapError::InvalidFormat("wrong response namespace"));
    }

    for child in element_children(payload) {
        let declared_out = action
            .desc()
            .arguments
            .iter()
            .any(|arg| arg.direction == Direction::Out && arg.name == child.name);
        if !declared_out {
            return Err(SoapError::InvalidFormat("undeclared response argument"));
        }
        let value = child
            .get_text()
            .map(|text| text.into_owned())
            .unwrap_or_default();
        action.set_argument(&child.name, &value)?;
    }

    for arg in action.desc().output_arguments() {
        if action.argument(&arg.name).is_none() {
            return Err(SoapError::MissingArgument(arg.name.clone()));
        }
    }
    Ok(())
}

/// Extract the fault code and description.
///
/// The code lives at `detail/UPnPError/errorCode` (the error element is
/// matched by local name in any namespace, `upnp_error` accepted as well);
/// anything missing or unparseable falls back to 501 with an empty
/// description.
fn parse_fault(fault: &Element) -> ActionFault {
    let error = child_by_local_name(fault, "detail").and_then(|detail| {
        element_children(detail).find(|el| {
            el.name.eq_ignore_ascii_case("UPnPError") || el.name.eq_ignore_ascii_case("upnp_error")
        })
    });

    let code = error
        .and_then(|el| child_by_local_name(el, "errorCode"))
        .and_then(|el| el.get_text())
        .and_then(|text| text.trim().parse().ok())
        .unwrap_or(501);
    let description = error
        .and_then(|el| child_by_local_name(el, "errorDescription"))
        .and_then(|el| el.get_text())
        .map(|text| text.trim().to_string())
        .unwrap_or_default();

    ActionFault { code, description }
}

fn element_children(el: &Element) -> impl Iterator<Item = &Element> {
    el.children.iter().filter_map(|node| node.as_element())
}

fn child_by_local_name<'a>(el: &'a Element, name: &str) -> Option<&'a Element> {
    element_children(el).find(|child| child.name.eq_ignore_ascii_case(name))
}

fn escape_xml(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for ch in value.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            _ => out.push(ch),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use upnp_device::{parse_description, DeviceData, Scpd, Service};
    use url::Url;

    const SCPD: &str = r#"<scpd xmlns="urn:schemas-upnp-org:service-1-0">
  <actionList>
    <action>
      <name>GetValues</name>
      <argumentList>
        <argument>
          <name>Which</name>
          <direction>in</direction>
          <relatedStateVariable>Which</relatedStateVariable>
        </argument>
        <argument>
          <name>A</name>
          <direction>out</direction>
          <relatedStateVariable>A</relatedStateVariable>
        </argument>
        <argument>
          <name>B</name>
          <direction>out</direction>
          <relatedStateVariable>B</relatedStateVariable>
        </argument>
      </argumentList>
    </action>
  </actionList>
  <serviceStateTable>
    <stateVariable sendEvents="no"><name>Which</name><dataType>string</dataType></stateVariable>
    <stateVariable sendEvents="no"><name>A</name><dataType>ui4</dataType></stateVariable>
    <stateVariable sendEvents="no"><name>B</name><dataType>ui4</dataType></stateVariable>
  </serviceStateTable>
</scpd>"#;

    const SERVICE_TYPE: &str = "urn:schemas-upnp-org:service:TestService:1";

    fn service() -> Service {
        let mut device = DeviceData::new_shell(
            "abc",
            Url::parse("http://10.0.0.5/desc.xml").unwrap(),
            std::time::Duration::from_secs(1800),
        );
        let xml = format!(
            r#"<root><device>
              <deviceType>urn:schemas-upnp-org:device:Test:1</deviceType>
              <friendlyName>Test</friendlyName>
              <UDN>uuid:abc</UDN>
              <serviceList><service>
                <serviceType>{SERVICE_TYPE}</serviceType>
                <serviceId>urn:upnp-org:serviceId:Test</serviceId>
                <SCPDURL>/scpd.xml</SCPDURL>
                <controlURL>/control</controlURL>
                <eventSubURL>/event</eventSubURL>
              </service></serviceList>
            </device></root>"#
        );
        parse_description(&mut device, &xml).unwrap();
        let mut svc = device.services.remove(0);
        svc.set_scpd(Scpd::parse(SCPD).unwrap());
        svc
    }

    fn action() -> Action {
        let svc = service();
        let url = Url::parse("http://10.0.0.5/control").unwrap();
        Action::from_service(&svc, url, "GetValues").unwrap()
    }

    fn envelope(body: &str) -> String {
        format!(
            r#"<?xml version="1.0"?>
<s:Envelope xmlns:s="http://schemas.xmlsoap.org/soap/envelope/"
            s:encodingStyle="http://schemas.xmlsoap.org/soap/encoding/">
  <s:Body>{body}</s:Body>
</s:Envelope>"#
        )
    }

    #[test]
    fn test_format_request() {
        let mut action = action();
        action.set_argument("Which", "a<b").unwrap();
        let xml = format_request(&action);

        assert!(xml.contains("<u:GetValues xmlns:u=\"urn:schemas-upnp-org:service:TestService:1\">"));
        // in arguments only, escaped
        assert!(xml.contains("<Which>a&lt;b</Which>"));
        assert!(!xml.contains("<A>"));
        assert!(xml.contains("s:encodingStyle=\"http://schemas.xmlsoap.org/soap/encoding/\""));
    }

    #[test]
    fn test_parse_success_response() {
        let mut action = action();
        let body = envelope(&format!(
            r#"<u:GetValuesResponse xmlns:u="{SERVICE_TYPE}"><A>1</A><B>2</B></u:GetValuesResponse>"#
        ));
        parse_response(&mut action, &body).unwrap();
        assert_eq!(action.argument("A"), Some("1"));
        assert_eq!(action.argument("B"), Some("2"));
        assert!(action.fault().is_none());
    }

    #[test]
    fn test_empty_output_argument() {
        let mut action = action();
        let body = envelope(&format!(
            r#"<u:GetValuesResponse xmlns:u="{SERVICE_TYPE}"><A>1</A><B/></u:GetValuesResponse>"#
        ));
        parse_response(&mut action, &body).unwrap();
        assert_eq!(action.argument("B"), Some(""));
    }

    #[test]
    fn test_missing_output_argument() {
        let mut action = action();
        let body = envelope(&format!(
            r#"<u:GetValuesResponse xmlns:u="{SERVICE_TYPE}"><A>1</A></u:GetValuesResponse>"#
        ));
        let err = parse_response(&mut action, &body).unwrap_err();
        assert_eq!(err, SoapError::MissingArgument("B".into()));
    }

    #[test]
    fn test_undeclared_response_argument() {
        let mut action = action();
        let body = envelope(&format!(
            r#"<u:GetValuesResponse xmlns:u="{SERVICE_TYPE}"><A>1</A><B>2</B><C>3</C></u:GetValuesResponse>"#
        ));
        let err = parse_response(&mut action, &body).unwrap_err();
        assert!(matches!(err, SoapError::InvalidFormat(_)));
    }

    #[test]
    fn test_wrong_response_namespace() {
        let mut action = action();
        let body = envelope(
            r#"<u:GetValuesResponse xmlns:u="urn:other"><A>1</A><B>2</B></u:GetValuesResponse>"#,
        );
        let err = parse_response(&mut action, &body).unwrap_err();
        assert!(matches!(err, SoapError::InvalidFormat(_)));
    }

    #[test]
    fn test_wrong_envelope_namespace() {
        let mut action = action();
        let body = r#"<s:Envelope xmlns:s="urn:not-soap"><s:Body/></s:Envelope>"#;
        let err = parse_response(&mut action, body).unwrap_err();
        assert!(matches!(err, SoapError::InvalidFormat(_)));
    }

    #[rstest]
    #[case::upnp_error_with_description(
        r#"<detail>
             <UPnPError xmlns="urn:schemas-upnp-org:control-1-0">
               <errorCode>714</errorCode>
               <errorDescription>No such entry</errorDescription>
             </UPnPError>
           </detail>"#,
        714,
        "No such entry"
    )]
    #[case::missing_detail_defaults("", 501, "")]
    #[case::snake_case_error_element(
        "<detail><upnp_error><errorCode>401</errorCode></upnp_error></detail>",
        401,
        ""
    )]
    fn test_fault_variants(#[case] detail: &str, #[case] code: u32, #[case] description: &str) {
        let mut action = action();
        let body = envelope(&format!(
            r#"<s:Fault xmlns:s="http://schemas.xmlsoap.org/soap/envelope/">
                 <faultcode>s:Client</faultcode>
                 {detail}
               </s:Fault>"#
        ));
        let err = parse_response(&mut action, &body).unwrap_err();
        assert_eq!(
            err,
            SoapError::Fault {
                code,
                description: description.into()
            }
        );
        // the fault is also recorded on the action itself
        assert_eq!(
            action.fault(),
            Some(&ActionFault {
                code,
                description: description.into()
            })
        );
    }

    #[test]
    fn test_not_xml() {
        let mut action = action();
        assert!(matches!(
            parse_response(&mut action, "garbage").unwrap_err(),
            SoapError::Parse(_)
        ));
    }
}
