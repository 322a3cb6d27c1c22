//! Suite configuration file support.
//!
//! Loads device deviations and timing from a TOML file. Missing files and
//! missing keys fall back to defaults.

use gribi_common::DEFAULT_NETWORK_INSTANCE;
use log::warn;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;

use crate::error::{Result, SuiteError};

/// Known differences between a device and the reference behavior.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Deviations {
    /// Name of the default network instance on the device
    #[serde(default = "default_network_instance")]
    pub default_network_instance: String,

    /// Device only acknowledges RIB programming
    #[serde(default)]
    pub gribi_rib_ack_only: bool,

    /// Device only supports the PRESERVE persistence mode
    #[serde(default)]
    pub gribi_preserve_only: bool,

    /// Interfaces must be explicitly enabled
    #[serde(default)]
    pub interface_enabled: bool,
}

/// Timing configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimingConfig {
    /// Bound on every wait for acknowledgments, in seconds
    #[serde(default = "default_await_timeout")]
    pub await_timeout_secs: u64,
}

/// Traffic generator configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrafficConfig {
    /// How long each flow runs, in milliseconds
    #[serde(default = "default_traffic_duration")]
    pub duration_ms: u64,

    /// Frames per second per flow
    #[serde(default = "default_rate_pps")]
    pub rate_pps: u64,
}

/// Complete suite configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SuiteConfig {
    #[serde(default)]
    pub deviations: Deviations,

    #[serde(default)]
    pub timing: TimingConfig,

    #[serde(default)]
    pub traffic: TrafficConfig,
}

fn default_network_instance() -> String {
    DEFAULT_NETWORK_INSTANCE.to_string()
}

fn default_await_timeout() -> u64 {
    120
}

fn default_traffic_duration() -> u64 {
    15_000
}

fn default_rate_pps() -> u64 {
    1_000
}

impl Default for Deviations {
    fn default() -> Self {
        Self {
            default_network_instance: default_network_instance(),
            gribi_rib_ack_only: false,
            gribi_preserve_only: false,
            interface_enabled: false,
        }
    }
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            await_timeout_secs: default_await_timeout(),
        }
    }
}

impl Default for TrafficConfig {
    fn default() -> Self {
        Self {
            duration_ms: default_traffic_duration(),
            rate_pps: default_rate_pps(),
        }
    }
}

impl SuiteConfig {
    /// Parses a TOML document.
    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content)
            .map_err(|e| SuiteError::Configuration(format!("Failed to parse config: {}", e)))
    }

    /// Load configuration from file, falling back to defaults if file not found
    pub fn load_or_default(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        match fs::read_to_string(path) {
            Ok(content) => toml::from_str(&content).map_err(|e| {
                SuiteError::Configuration(format!(
                    "Failed to parse config file {}: {}",
                    path.display(),
                    e
                ))
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                warn!(
                    "ordering-ack: Config file {} not found, using defaults",
                    path.display()
                );
                Ok(Self::default())
            }
            Err(e) => Err(SuiteError::Io(e)),
        }
    }

    /// Save configuration to file
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let content = toml::to_string_pretty(self).map_err(|e| {
            SuiteError::Configuration(format!("Failed to serialize config: {}", e))
        })?;
        fs::write(path, content)?;
        Ok(())
    }

    pub fn await_timeout(&self) -> Duration {
        Duration::from_secs(self.timing.await_timeout_secs)
    }

    pub fn traffic_duration(&self) -> Duration {
        Duration::from_millis(self.traffic.duration_ms)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.deviations.default_network_instance.is_empty() {
            return Err(SuiteError::Configuration(
                "default_network_instance must not be empty".to_string(),
            ));
        }

        if self.timing.await_timeout_secs == 0 {
            return Err(SuiteError::Configuration(
                "await_timeout_secs must be > 0".to_string(),
            ));
        }

        if self.traffic.rate_pps == 0 {
            return Err(SuiteError::Configuration(
                "rate_pps must be > 0".to_string(),
            ));
        }

        Ok(())
    }
}
