// file: src/seed/network.rs
// version: 1.1.0
// guid: 7d11a1ad-c360-4031-8e2a-e25a34128475

//! Network config injection for the NoCloud seed

use crate::error::OvaDeployError;
use crate::Result;
use regex::{NoExpand, Regex};
use serde_yaml::Value;
use std::net::Ipv4Addr;

/// Replace the first line-anchored `key:` line, keeping its indentation
fn replace_key_line(document: &str, key: &str, value: &str) -> Result<String> {
    let pattern = format!(r"(?m)^([ \t]*){}:[^\r\n]*", regex::escape(key));
    let re = Regex::new(&pattern)
        .map_err(|e| OvaDeployError::injection(format!("Invalid regex pattern: {}", e)))?;

    let caps = re.captures(document).ok_or_else(|| {
        OvaDeployError::injection(format!("Network template has no `{}:` line", key))
    })?;
    let indent = caps.get(1).map(|m| m.as_str()).unwrap_or_default();
    let line = format!("{}{}: {}", indent, key, value);
    let line = line.trim_end();

    Ok(re.replace(document, NoExpand(line)).into_owned())
}

/// Set the interface address list and default gateway of a netplan-style
/// template. Every other line is preserved byte for byte.
pub fn inject_network(template: &str, ip: &str, gateway: &str) -> Result<String> {
    let with_address = replace_key_line(template, "addresses", &format!("[{}]", ip))?;
    replace_key_line(&with_address, "gateway4", gateway)
}

/// Check that a rendered document assigns `ip` (and `gateway`, when set) to
/// one ethernet interface
pub fn verify_network(rendered: &str, ip: &str, gateway: &str) -> Result<String> {
    let document: Value = serde_yaml::from_str(rendered)?;
    let root = document.get("network").unwrap_or(&document);
    let ethernets = root
        .get("ethernets")
        .and_then(Value::as_mapping)
        .ok_or_else(|| OvaDeployError::injection("Network config has no `ethernets` section"))?;

    for (name, interface) in ethernets {
        let has_address = match interface.get("addresses") {
            Some(Value::Sequence(items)) => items.iter().any(|a| a.as_str() == Some(ip)),
            Some(Value::String(single)) => single == ip,
            _ => false,
        };
        if !has_address {
            continue;
        }

        let name = name.as_str().unwrap_or("?").to_string();
        if gateway.is_empty() {
            return Ok(name);
        }
        return match interface.get("gateway4").and_then(Value::as_str) {
            Some(gw) if gw == gateway => Ok(name),
            other => Err(OvaDeployError::injection(format!(
                "Interface {} has gateway4 {:?}, expected {}",
                name, other, gateway
            ))),
        };
    }

    Err(OvaDeployError::injection(format!(
        "No ethernet interface is assigned {}",
        ip
    )))
}

/// Format problems in the address parameters. They are reported, not
/// enforced; the values are injected verbatim.
pub fn address_warnings(ip: &str, gateway: &str) -> Vec<String> {
    let mut warnings = Vec::new();

    match ip.split_once('/') {
        Some((addr, prefix)) => {
            if addr.parse::<Ipv4Addr>().is_err() {
                warnings.push(format!("'{}' is not an IPv4 address", addr));
            }
            if !matches!(prefix.parse::<u8>(), Ok(p) if p <= 32) {
                warnings.push(format!("'{}' is not a valid prefix length", prefix));
            }
        }
        None => warnings.push(format!("'{}' is not in address/prefix form", ip)),
    }

    if !gateway.is_empty() && gateway.parse::<Ipv4Addr>().is_err() {
        warnings.push(format!("'{}' is not an IPv4 gateway address", gateway));
    }

    warnings
}
