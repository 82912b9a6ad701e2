//! Network settings

use crate::core::protocol::framing::DEFAULT_MAX_FRAMES_PER_PASS;
use crate::core::transport::SerialConfig;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

/// File name used under the configuration directory
pub const CONFIG_FILE_NAME: &str = "rfidnet.toml";

/// Configuration error types
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Reading or writing the file failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// File contents are not valid TOML for this schema
    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    /// Serialization failed
    #[error("Serialize error: {0}")]
    Serialize(#[from] toml::ser::Error),

    /// No configuration directory on this platform
    #[error("Could not determine config directory")]
    NoConfigDir,
}

/// Reader network configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    /// Network id placed in broadcast commands
    pub network_id: u8,
    /// Serial link settings
    pub serial: SerialConfig,
    /// Reply timeouts
    pub timeouts: TimeoutConfig,
    /// Reader task sleep when no bytes are pending
    pub poll_interval_ms: u64,
    /// Frames completed per decode pass before yielding
    pub max_frames_per_pass: usize,
    /// Number of `[0xFF, '*']` pairs sent to break auto-polling
    pub break_filler_pairs: usize,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            network_id: 0,
            serial: SerialConfig::default(),
            timeouts: TimeoutConfig::default(),
            poll_interval_ms: 10,
            max_frames_per_pass: DEFAULT_MAX_FRAMES_PER_PASS,
            break_filler_pairs: 400,
        }
    }
}

impl NetworkConfig {
    /// Load config from the default location, or defaults if there is none
    pub fn load() -> Result<Self, ConfigError> {
        let path = super::config_path().ok_or(ConfigError::NoConfigDir)?;
        if path.exists() {
            Self::load_from(&path)
        } else {
            Ok(Self::default())
        }
    }

    /// Save config to the default location
    pub fn save(&self) -> Result<(), ConfigError> {
        let path = super::config_path().ok_or(ConfigError::NoConfigDir)?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        self.save_to(&path)
    }

    /// Load config from a file
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    /// Save config to a file
    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Poll interval as a duration
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

/// Reply timeouts, in milliseconds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Default `ask` timeout
    pub ask_ms: u64,
    /// Network reset
    pub reset_ms: u64,
    /// Single ping during a rescan
    pub ping_ms: u64,
    /// Pause between rescan probes
    pub probe_delay_ms: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            ask_ms: 1000,
            reset_ms: 30_000,
            ping_ms: 100,
            probe_delay_ms: 500,
        }
    }
}

impl TimeoutConfig {
    /// Default `ask` timeout
    pub fn ask(&self) -> Duration {
        Duration::from_millis(self.ask_ms)
    }

    /// Reset timeout
    pub fn reset(&self) -> Duration {
        Duration::from_millis(self.reset_ms)
    }

    /// Ping timeout
    pub fn ping(&self) -> Duration {
        Duration::from_millis(self.ping_ms)
    }

    /// Delay between rescan probes
    pub fn probe_delay(&self) -> Duration {
        Duration::from_millis(self.probe_delay_ms)
    }
}
