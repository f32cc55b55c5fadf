use thiserror::Error;

/// Failures while browsing for Cast receivers.
#[derive(Error, Debug)]
pub enum DiscoveryError {
    /// The mDNS daemon could not be started (no multicast-capable interface,
    /// sandboxed process, ...)
    #[error("Failed to start mDNS daemon: {0}")]
    Daemon(String),

    /// The daemon refused the browse request for the Cast service type
    #[error("Failed to browse for Cast devices: {0}")]
    Browse(String),

    /// A resolved service announced no address to connect to
    #[error("No address announced for {0}")]
    NoAddress(String),
}

pub type Result<T> = std::result::Result<T, DiscoveryError>;
