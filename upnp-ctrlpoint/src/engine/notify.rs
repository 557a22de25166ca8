//! The event notification processor.

use tracing::debug;
use xmltree::Element;

use super::{lock, ControlPoint};
use crate::callback::NotifyHandler;
use crate::listener::{ServiceKey, StateVariableChange};

impl NotifyHandler for ControlPoint {
    fn handle_notify(&self, path: &str, headers: &[(String, String)], body: &str) -> u16 {
        self.process_notify(path, headers, body)
    }
}

impl ControlPoint {
    /// Validate and apply one inbound NOTIFY.
    ///
    /// Rejections mutate nothing: 400 when NT or NTS is missing, 412 for
    /// everything else (unknown SID, path mismatch, wrong type constants,
    /// sequence regression, unparseable body). On acceptance the matched
    /// subscriber's variables and sequence number are updated under the
    /// subscriber-table lock; listeners are notified after release, and only
    /// when the change set is non-empty.
    pub fn process_notify(&self, path: &str, headers: &[(String, String)], body: &str) -> u16 {
        let header = |name: &str| {
            headers
                .iter()
                .find(|(n, _)| n.eq_ignore_ascii_case(name))
                .map(|(_, v)| v.as_str())
        };

        let (Some(nt), Some(nts)) = (header("NT"), header("NTS")) else {
            return 400;
        };
        if !nt.eq_ignore_ascii_case("upnp:event") || !nts.eq_ignore_ascii_case("upnp:propchange") {
            return 412;
        }
        let Some(sid) = header("SID") else {
            return 412;
        };
        let sid = sid.strip_prefix("uuid:").unwrap_or(sid);
        let seq: u32 = match header("SEQ") {
            Some(value) => match value.trim().parse() {
                Ok(n) => n,
                Err(_) => return 412,
            },
            None => 0,
        };
        let Ok(properties) = parse_propertyset(body) else {
            debug!(%sid, "rejecting notification with malformed body");
            return 412;
        };

        let notification = {
            let mut subscribers = lock(&self.inner.subscribers);
            let Some(subscriber) = subscribers.find_by_sid_mut(sid) else {
                debug!(%sid, "notification for unknown subscription");
                return 412;
            };
            let expected = format!("/{}/{}", subscriber.device_uuid, subscriber.service_id);
            if path != expected {
                debug!(%sid, path, "notification path mismatch");
                return 412;
            }
            if let Some(last) = subscriber.seq {
                if seq < last {
                    debug!(%sid, seq, last, "sequence regression");
                    return 412;
                }
            }

            let mut changes = Vec::new();
            for (name, value) in properties {
                // properties without a matching state variable are skipped
                if subscriber.knows_variable(&name) {
                    subscriber.values.insert(name.clone(), value.clone());
                    changes.push(StateVariableChange { name, value });
                }
            }
            subscriber.seq = Some(seq);

            if changes.is_empty() {
                None
            } else {
                Some((
                    ServiceKey {
                        device_uuid: subscriber.device_uuid.clone(),
                        service_id: subscriber.service_id.clone(),
                        service_type: subscriber.service_type.clone(),
                    },
                    changes,
                ))
            }
        };

        if let Some((service, changes)) = notification {
            self.inner.listeners.event_notify(&service, &changes);
        }
        200
    }
}

/// Parse a property-change document into (variable, value) pairs.
///
/// The root must be a `propertyset`; each `property` wraps exactly one
/// variable element. A property without a variable element makes the whole
/// document malformed.
fn parse_propertyset(body: &str) -> Result<Vec<(String, String)>, ()> {
    let root = Element::parse(body.as_bytes()).map_err(|_| ())?;
    if !root.name.eq_ignore_ascii_case("propertyset") {
        return Err(());
    }

    let mut properties = Vec::new();
    for property in root
        .children
        .iter()
        .filter_map(|node| node.as_element())
        .filter(|el| el.name.eq_ignore_ascii_case("property"))
    {
        let variable = property
            .children
            .iter()
            .filter_map(|node| node.as_element())
            .next()
            .ok_or(())?;
        let value = variable
            .get_text()
            .map(|text| text.into_owned())
            .unwrap_or_default();
        properties.push((variable.name.clone(), value));
    }
    Ok(properties)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_propertyset() {
        let body = r#"<e:propertyset xmlns:e="urn:schemas-upnp-org:event-1-0">
          <e:property><Status>ON</Status></e:property>
          <e:property><Target>1</Target></e:property>
        </e:propertyset>"#;
        let properties = parse_propertyset(body).unwrap();
        assert_eq!(
            properties,
            vec![
                ("Status".to_string(), "ON".to_string()),
                ("Target".to_string(), "1".to_string()),
            ]
        );
    }

    #[test]
    fn test_parse_propertyset_empty_value() {
        let body = r#"<e:propertyset xmlns:e="urn:schemas-upnp-org:event-1-0">
          <e:property><Status/></e:property>
        </e:propertyset>"#;
        let properties = parse_propertyset(body).unwrap();
        assert_eq!(properties, vec![("Status".to_string(), String::new())]);
    }

    #[test]
    fn test_parse_propertyset_rejects_malformed() {
        assert!(parse_propertyset("not xml").is_err());
        assert!(parse_propertyset("<wrongroot/>").is_err());
        // a property without a variable element poisons the document
        let body = r#"<e:propertyset xmlns:e="urn:schemas-upnp-org:event-1-0">
          <e:property>loose text</e:property>
        </e:propertyset>"#;
        assert!(parse_propertyset(body).is_err());
    }
}
