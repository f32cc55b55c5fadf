//! Core discovery logic and iterator implementation.
//!
//! This module implements the discovery algorithm that:
//! 1. Browses mDNS for `_googlecast._tcp.local.` services
//! 2. Receives resolved service records until the timeout elapses
//! 3. Filters non-Cast records and records without an address
//! 4. Deduplicates devices (receivers re-announce periodically)
//! 5. Yields discovered devices as events

use std::collections::HashSet;
use std::time::{Duration, Instant};

use crate::error::Result;
use crate::mdns::MdnsBrowser;
use crate::DeviceEvent;

/// Iterator that discovers Cast devices on the local network.
///
/// This iterator performs network discovery using mDNS and yields `DeviceEvent::Found`
/// for each discovered Cast device. The iterator automatically handles deduplication,
/// filtering of non-Cast services, and resource cleanup.
///
/// # Examples
///
/// ```no_run
/// use cast_discovery::{get_iter, DeviceEvent};
///
/// for event in get_iter() {
///     match event {
///         DeviceEvent::Found(device) => {
///             println!("Found: {}", device.name);
///         }
///     }
/// }
/// ```
pub struct DiscoveryIterator {
    browser: Option<MdnsBrowser>,
    deadline: Instant,
    seen_ids: HashSet<String>,
}

impl DiscoveryIterator {
    /// Create a new discovery iterator with the specified timeout
    pub fn new(timeout: Duration) -> Result<Self> {
        let browser = MdnsBrowser::new()?;

        Ok(Self {
            browser: Some(browser),
            deadline: Instant::now() + timeout,
            seen_ids: HashSet::new(),
        })
    }

    /// Create an empty iterator that yields no results
    /// Used as a fallback when initialization fails
    pub(crate) fn empty() -> Self {
        Self {
            browser: None,
            deadline: Instant::now(),
            seen_ids: HashSet::new(),
        }
    }
}

impl Iterator for DiscoveryIterator {
    type Item = DeviceEvent;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let record = match self.browser.as_ref()?.next_resolved(self.deadline) {
                Some(record) => record,
                None => {
                    // Timeout reached: release the daemon right away
                    self.browser = None;
                    return None;
                }
            };

            if !record.is_cast_device() {
                continue;
            }

            let device = match record.to_device() {
                Ok(device) => device,
                Err(e) => {
                    tracing::debug!("Skipping {}: {}", record.fullname, e);
                    continue;
                }
            };

            if !self.seen_ids.insert(device.id.clone()) {
                continue;
            }

            tracing::debug!(
                "Discovered Cast device: {} at {}:{}",
                device.name,
                device.ip_address,
                device.port
            );
            return Some(DeviceEvent::Found(device));
        }
    }
}
