//! Thin wrapper around the `mdns-sd` service daemon.
//!
//! This module is internal: it owns the daemon, starts a browse for the Cast
//! service type and converts resolved services into [`DeviceRecord`]s.

use std::time::Instant;

use mdns_sd::{Receiver, ServiceDaemon, ServiceEvent, ServiceInfo};

use crate::device::DeviceRecord;
use crate::error::{DiscoveryError, Result};
use crate::CAST_SERVICE_TYPE;

/// mDNS browser for `_googlecast._tcp.local.`
pub(crate) struct MdnsBrowser {
    daemon: ServiceDaemon,
    receiver: Receiver<ServiceEvent>,
}

impl MdnsBrowser {
    /// Start the daemon and begin browsing.
    pub fn new() -> Result<Self> {
        let daemon = ServiceDaemon::new()
            .map_err(|e| DiscoveryError::Daemon(e.to_string()))?;

        let receiver = daemon
            .browse(CAST_SERVICE_TYPE)
            .map_err(|e| DiscoveryError::Browse(e.to_string()))?;

        Ok(Self { daemon, receiver })
    }

    /// Wait for the next resolved service until `deadline`.
    ///
    /// Returns `None` once the deadline has passed or the daemon hung up.
    pub fn next_resolved(&self, deadline: Instant) -> Option<DeviceRecord> {
        loop {
            let remaining = deadline.checked_duration_since(Instant::now())?;
            match self.receiver.recv_timeout(remaining) {
                Ok(ServiceEvent::ServiceResolved(info)) => return Some(record_from_info(&info)),
                Ok(other) => {
                    tracing::trace!("mDNS event: {:?}", other);
                }
                Err(_) => return None,
            }
        }
    }
}

impl Drop for MdnsBrowser {
    fn drop(&mut self) {
        let _ = self.daemon.stop_browse(CAST_SERVICE_TYPE);
        let _ = self.daemon.shutdown();
    }
}

fn record_from_info(info: &ServiceInfo) -> DeviceRecord {
    let txt = info
        .get_properties()
        .iter()
        .map(|prop| (prop.key().to_ascii_lowercase(), prop.val_str().to_string()))
        .collect();

    DeviceRecord::from_txt(
        info.get_fullname(),
        info.get_addresses().iter().copied().collect(),
        info.get_port(),
        txt,
    )
}
