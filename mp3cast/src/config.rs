//! Player configuration

use std::time::Duration;

use cast_client::Volume;

use crate::error::{PlayerError, Result};

/// Tunables for the media server, discovery and the playback driver.
#[derive(Debug, Clone)]
pub struct PlayerConfig {
    /// Ports tried in order for the media server
    pub port_range: (u16, u16),
    /// How long an mDNS browse runs
    pub discovery_timeout: Duration,
    /// Interval between receiver status polls
    pub poll_interval: Duration,
    /// How long a loaded track may take to start playing
    pub load_timeout: Duration,
    /// Load attempts per track
    pub load_retries: u32,
    /// Pause between load attempts
    pub retry_delay: Duration,
    /// Volume pushed to the device on connect; `None` keeps the device volume
    pub initial_volume: Option<Volume>,
    /// Percent added or removed by volume up/down
    pub volume_step: u8,
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            port_range: media_server::DEFAULT_PORT_RANGE,
            discovery_timeout: cast_discovery::DEFAULT_TIMEOUT,
            poll_interval: Duration::from_secs(1),
            load_timeout: Duration::from_secs(20),
            load_retries: 3,
            retry_delay: Duration::from_secs(2),
            initial_volume: None,
            volume_step: 5,
        }
    }
}

impl PlayerConfig {
    /// Check the configuration for values the player cannot work with.
    pub fn validate(&self) -> Result<()> {
        let (start, end) = self.port_range;
        if start > end {
            return Err(PlayerError::InvalidConfig(format!(
                "Invalid port range: start ({}) > end ({})",
                start, end
            )));
        }

        if self.discovery_timeout.is_zero() {
            return Err(PlayerError::InvalidConfig(
                "Discovery timeout must be positive".to_string(),
            ));
        }

        if self.poll_interval.is_zero() {
            return Err(PlayerError::InvalidConfig(
                "Poll interval must be positive".to_string(),
            ));
        }

        if self.load_timeout.is_zero() {
            return Err(PlayerError::InvalidConfig(
                "Load timeout must be positive".to_string(),
            ));
        }

        if self.load_retries == 0 {
            return Err(PlayerError::InvalidConfig(
                "Load retries must be at least 1".to_string(),
            ));
        }

        if self.volume_step == 0 || self.volume_step > 100 {
            return Err(PlayerError::InvalidConfig(format!(
                "Volume step must be between 1 and 100, got {}",
                self.volume_step
            )));
        }

        Ok(())
    }
}
