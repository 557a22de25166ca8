//! Device description document parsing.

use tracing::warn;
use url::Url;
use xmltree::Element;

use crate::device::DeviceData;
use crate::error::{DeviceError, Result};
use crate::scpd::{child_text, children_named};
use crate::service::Service;
use crate::MAX_EMBEDDED_DEPTH;

/// Parse a description document into a registry shell.
///
/// The shell keeps the identity, location and lease it was created with;
/// this fills in friendly name, device type, URL base, services and the
/// embedded device tree. Nesting deeper than [`MAX_EMBEDDED_DEPTH`] is
/// rejected and leaves the shell untouched.
pub fn parse_description(shell: &mut DeviceData, xml: &str) -> Result<()> {
    let root = Element::parse(xml.as_bytes()).map_err(|e| DeviceError::Parse(e.to_string()))?;
    if !root.name.eq_ignore_ascii_case("root") {
        return Err(DeviceError::MissingElement("root"));
    }

    let url_base = match child_text(&root, "URLBase") {
        Some(base) if !base.is_empty() => {
            Url::parse(&base).map_err(|e| DeviceError::InvalidUrl(format!("{base}: {e}")))?
        }
        _ => shell.description_url.clone(),
    };

    let device_el = root
        .get_child("device")
        .ok_or(DeviceError::MissingElement("device"))?;

    // Parse the whole tree before touching the shell so a deep or malformed
    // document cannot leave it half-filled.
    let parsed = parse_device(device_el, &url_base, shell, 0)?;

    if let Some(udn) = child_text(device_el, "UDN") {
        let declared = strip_uuid_prefix(&udn);
        if !declared.eq_ignore_ascii_case(&shell.uuid) {
            // The registry is keyed by the announced identifier; keep it.
            warn!(
                announced = %shell.uuid,
                declared = %declared,
                "description UDN does not match announcement"
            );
        }
    }

    shell.url_base = url_base;
    shell.friendly_name = parsed.friendly_name;
    shell.device_type = parsed.device_type;
    shell.services = parsed.services;
    shell.embedded = parsed.embedded;
    Ok(())
}

struct ParsedDevice {
    friendly_name: String,
    device_type: String,
    services: Vec<Service>,
    embedded: Vec<DeviceData>,
}

fn parse_device(
    el: &Element,
    url_base: &Url,
    shell: &DeviceData,
    depth: usize,
) -> Result<ParsedDevice> {
    if depth > MAX_EMBEDDED_DEPTH {
        return Err(DeviceError::TooDeep);
    }

    let friendly_name = child_text(el, "friendlyName").unwrap_or_default();
    let device_type = child_text(el, "deviceType").unwrap_or_default();

    let mut services = Vec::new();
    if let Some(list) = el.get_child("serviceList") {
        for svc in children_named(list, "service") {
            services.push(parse_service(svc)?);
        }
    }

    let parent_uuid = if depth == 0 {
        None
    } else {
        Some(
            child_text(el, "UDN")
                .map(|udn| strip_uuid_prefix(&udn).to_string())
                .ok_or(DeviceError::MissingElement("device/UDN"))?,
        )
    };

    let mut embedded = Vec::new();
    if let Some(list) = el.get_child("deviceList") {
        for child_el in children_named(list, "device") {
            let udn =
                child_text(child_el, "UDN").ok_or(DeviceError::MissingElement("device/UDN"))?;
            let child_parsed = parse_device(child_el, url_base, shell, depth + 1)?;

            let mut child =
                DeviceData::new_shell(strip_uuid_prefix(&udn), shell.description_url.clone(), shell.lease);
            child.parent_uuid = match &parent_uuid {
                Some(uuid) => uuid.clone(),
                None => shell.uuid.clone(),
            };
            child.url_base = url_base.clone();
            child.local_address = shell.local_address;
            child.friendly_name = child_parsed.friendly_name;
            child.device_type = child_parsed.device_type;
            child.services = child_parsed.services;
            child.embedded = child_parsed.embedded;
            embedded.push(child);
        }
    }

    Ok(ParsedDevice {
        friendly_name,
        device_type,
        services,
        embedded,
    })
}

fn parse_service(el: &Element) -> Result<Service> {
    let service_type =
        child_text(el, "serviceType").ok_or(DeviceError::MissingElement("serviceType"))?;
    let service_id =
        child_text(el, "serviceId").ok_or(DeviceError::MissingElement("serviceId"))?;
    Ok(Service::new(
        service_type,
        service_id,
        child_text(el, "SCPDURL").unwrap_or_default(),
        child_text(el, "controlURL").unwrap_or_default(),
        child_text(el, "eventSubURL").unwrap_or_default(),
    ))
}

fn strip_uuid_prefix(udn: &str) -> &str {
    let udn = udn.trim();
    if udn.len() >= 5 && udn[..5].eq_ignore_ascii_case("uuid:") {
        &udn[5..]
    } else {
        udn
    }
}
