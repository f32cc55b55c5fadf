//! Chromecast device discovery library
//!
//! This crate provides a simple API for discovering Cast receivers (Chromecast,
//! Chromecast Audio, Google Home / Nest speakers) on a local network using
//! mDNS service browsing of `_googlecast._tcp.local.`.
//!
//! # Quick Start
//!
//! ```no_run
//! use cast_discovery::get;
//!
//! // Discover all Cast devices on the network
//! let devices = get();
//! for device in devices {
//!     println!("Found {} at {}", device.name, device.ip_address);
//! }
//! ```
//!
//! # Iterator-based Discovery
//!
//! For more control, use the iterator API:
//!
//! ```no_run
//! use cast_discovery::{get_iter, DeviceEvent};
//!
//! for event in get_iter() {
//!     match event {
//!         DeviceEvent::Found(device) => {
//!             println!("Found: {}", device.name);
//!             // Can break early if needed
//!         }
//!     }
//! }
//! ```

mod error;
mod mdns;
pub mod device;
mod discovery;

pub use error::{DiscoveryError, Result};
pub use discovery::DiscoveryIterator;

use std::time::Duration;

/// mDNS service type advertised by Cast receivers.
pub const CAST_SERVICE_TYPE: &str = "_googlecast._tcp.local.";

/// Port used by the Cast v2 control channel when the SRV record is missing.
pub const DEFAULT_CAST_PORT: u16 = 8009;

/// Browse duration used by [`get`] and [`get_iter`].
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(3);

/// Information about a discovered Cast device.
///
/// Contains all relevant metadata needed to identify and connect to a receiver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Device {
    /// Unique device identifier (TXT `id`), e.g. "4c4b8a3f0b2e4d6c9a1b2c3d4e5f6a7b"
    pub id: String,
    /// Friendly name of the device (TXT `fn`), e.g. "Kitchen speaker"
    pub name: String,
    /// IP address of the device
    pub ip_address: String,
    /// Port of the Cast control channel (typically 8009)
    pub port: u16,
    /// Model name (TXT `md`), e.g. "Google Home Mini"
    pub model_name: String,
}

/// Events emitted during device discovery.
///
/// Currently only supports device found events. Future versions may add additional
/// event types (e.g., device lost, device updated).
#[derive(Debug, Clone)]
pub enum DeviceEvent {
    /// A Cast device was found on the network
    Found(Device),
}

/// Discover all Cast devices on the local network with a default 3-second timeout.
///
/// This is a convenience function that collects all discovered devices into a Vec.
/// For more control over the discovery process, use `get_iter()` instead.
///
/// # Examples
///
/// ```no_run
/// use cast_discovery::get;
///
/// let devices = get();
/// for device in devices {
///     println!("Found: {} at {}", device.name, device.ip_address);
/// }
/// ```
pub fn get() -> Vec<Device> {
    get_with_timeout(DEFAULT_TIMEOUT)
}

/// Discover all Cast devices on the local network with a custom timeout.
///
/// Browsing always runs for the full timeout because mDNS has no notion of
/// "all answers received".
///
/// # Examples
///
/// ```no_run
/// use cast_discovery::get_with_timeout;
/// use std::time::Duration;
///
/// let devices = get_with_timeout(Duration::from_secs(5));
/// for device in devices {
///     println!("Found: {} at {}", device.name, device.ip_address);
/// }
/// ```
pub fn get_with_timeout(timeout: Duration) -> Vec<Device> {
    try_get_with_timeout(timeout).unwrap_or_else(|e| {
        tracing::warn!("mDNS discovery unavailable: {}", e);
        Vec::new()
    })
}

/// Discover Cast devices, reporting why discovery could not run at all.
///
/// Unlike [`get_with_timeout`], a daemon or browse failure is returned as an
/// error instead of an empty list, so callers can tell "nothing found" apart
/// from "could not look".
pub fn try_get_with_timeout(timeout: Duration) -> Result<Vec<Device>> {
    Ok(DiscoveryIterator::new(timeout)?
        .filter_map(|event| match event {
            DeviceEvent::Found(device) => Some(device),
        })
        .collect())
}

/// Get an iterator for discovering Cast devices with a default 3-second timeout.
///
/// # Examples
///
/// ```no_run
/// use cast_discovery::{get_iter, DeviceEvent};
///
/// for event in get_iter() {
///     match event {
///         DeviceEvent::Found(device) => {
///             println!("Found: {} at {}", device.name, device.ip_address);
///             break;
///         }
///     }
/// }
/// ```
pub fn get_iter() -> DiscoveryIterator {
    get_iter_with_timeout(DEFAULT_TIMEOUT)
}

/// Get an iterator for discovering Cast devices with a custom timeout.
///
/// If the mDNS daemon cannot be started (no multicast-capable interface,
/// sandboxed environment, ...) the returned iterator is empty.
pub fn get_iter_with_timeout(timeout: Duration) -> DiscoveryIterator {
    DiscoveryIterator::new(timeout).unwrap_or_else(|e| {
        tracing::warn!("mDNS discovery unavailable: {}", e);
        DiscoveryIterator::empty()
    })
}
