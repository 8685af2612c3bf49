//! Configuration types for GCS service discovery

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// DNS-SD registration type advertised by ground control stations.
pub const GCS_REG_TYPE: &str = "_gcs._udp.";

/// Rate handed to the transport for every discovered GCS stream.
pub const GCS_BAUD: u32 = 115_200;

/// Configuration for the discovery pipeline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiscoveryConfig {
    /// Enable automatic GCS discovery
    #[serde(default = "default_enabled")]
    pub enabled: bool,

    /// Registration type to browse for
    #[serde(default = "default_reg_type")]
    pub reg_type: String,

    /// Rate parameter passed when opening an outbound stream
    #[serde(default = "default_baud")]
    pub baud: u32,

    /// How often the host loop polls registered sources (milliseconds)
    #[serde(default = "default_poll_interval")]
    pub poll_interval_ms: u64,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            reg_type: default_reg_type(),
            baud: default_baud(),
            poll_interval_ms: default_poll_interval(),
        }
    }
}

impl DiscoveryConfig {
    /// Returns the poll interval as a Duration
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// Validates the configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.reg_type.is_empty() {
            return Err("reg_type cannot be empty".to_string());
        }

        if !self.reg_type.starts_with('_') {
            return Err(format!(
                "reg_type '{}' must start with an underscore",
                self.reg_type
            ));
        }

        if self.baud == 0 {
            return Err("baud cannot be 0".to_string());
        }

        if self.poll_interval_ms == 0 {
            return Err("poll_interval_ms cannot be 0".to_string());
        }

        Ok(())
    }
}

fn default_enabled() -> bool {
    true
}

fn default_reg_type() -> String {
    GCS_REG_TYPE.to_string()
}

fn default_baud() -> u32 {
    GCS_BAUD
}

fn default_poll_interval() -> u64 {
    50
}
