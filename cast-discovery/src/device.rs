//! Service record parsing and validation.
//!
//! This module turns the raw fields of a resolved `_googlecast._tcp` service
//! (instance name, addresses, SRV port, TXT properties) into a [`Device`].

use std::collections::HashMap;
use std::net::IpAddr;

use crate::error::{DiscoveryError, Result};
use crate::{Device, CAST_SERVICE_TYPE, DEFAULT_CAST_PORT};

/// Raw record of a resolved Cast service.
#[derive(Debug, Clone, Default)]
pub struct DeviceRecord {
    /// Full service instance name, e.g. "Google-Home-Mini-4c4b...._googlecast._tcp.local."
    pub fullname: String,
    /// All addresses announced for the host
    pub addresses: Vec<IpAddr>,
    /// SRV port (0 when missing)
    pub port: u16,
    /// TXT properties (`id`, `fn`, `md`, `ca`, ...)
    pub txt: HashMap<String, String>,
}

impl DeviceRecord {
    /// Build a record from its raw parts.
    pub fn from_txt(
        fullname: impl Into<String>,
        addresses: Vec<IpAddr>,
        port: u16,
        txt: HashMap<String, String>,
    ) -> Self {
        Self {
            fullname: fullname.into(),
            addresses,
            port,
            txt,
        }
    }

    /// Check if this record describes a Cast receiver.
    ///
    /// Every Cast receiver publishes an `id` TXT property and advertises under
    /// the `_googlecast._tcp` service type.
    pub fn is_cast_device(&self) -> bool {
        self.fullname.ends_with(CAST_SERVICE_TYPE) || self.txt.contains_key("id")
    }

    /// Preferred address: the lowest IPv4 address, else the first address.
    pub fn preferred_address(&self) -> Option<IpAddr> {
        let mut v4: Vec<IpAddr> = self
            .addresses
            .iter()
            .copied()
            .filter(IpAddr::is_ipv4)
            .collect();
        v4.sort();
        v4.first().copied().or_else(|| self.addresses.first().copied())
    }

    fn txt_value(&self, key: &str) -> Option<&str> {
        self.txt
            .get(key)
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
    }

    /// Convert the record to the public Device type.
    ///
    /// # Errors
    ///
    /// Returns `DiscoveryError::NoAddress` if the record has no address.
    pub fn to_device(&self) -> Result<Device> {
        let ip = self
            .preferred_address()
            .ok_or_else(|| DiscoveryError::NoAddress(self.fullname.clone()))?;

        let instance = instance_name_from_fullname(&self.fullname);
        let name = self
            .txt_value("fn")
            .map(str::to_string)
            .unwrap_or_else(|| instance.clone());
        let id = self
            .txt_value("id")
            .map(str::to_string)
            .unwrap_or_else(|| format!("{}-{}", instance, ip));
        let port = if self.port == 0 { DEFAULT_CAST_PORT } else { self.port };

        Ok(Device {
            id,
            name,
            ip_address: ip.to_string(),
            port,
            model_name: self.txt_value("md").unwrap_or("Chromecast").to_string(),
        })
    }
}

/// Derive a readable name from an mDNS instance name.
///
/// Strips the `._googlecast._tcp.local.` suffix and the trailing 32 character
/// hex UUID that Cast receivers append, e.g.
/// `Google-Home-Mini-4c4b8a3f0b2e4d6c9a1b2c3d4e5f6a7b._googlecast._tcp.local.`
/// becomes `Google-Home-Mini`.
pub fn instance_name_from_fullname(fullname: &str) -> String {
    let instance = fullname
        .trim()
        .strip_suffix(CAST_SERVICE_TYPE)
        .or_else(|| fullname.trim().strip_suffix("._googlecast._tcp.local"))
        .unwrap_or(fullname)
        .trim_matches('.');

    let kept: Vec<&str> = instance
        .split('-')
        .filter(|part| !is_hex_uuid(part))
        .collect();
    let joined = kept.join("-");

    if joined.trim().is_empty() {
        instance.to_string()
    } else {
        joined.trim().to_string()
    }
}

fn is_hex_uuid(part: &str) -> bool {
    part.len() == 32 && part.chars().all(|c| c.is_ascii_hexdigit())
}
