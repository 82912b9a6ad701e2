//! Configuration module
//!
//! Handles network settings and their TOML persistence

mod settings;

pub use settings::{ConfigError, NetworkConfig, TimeoutConfig, CONFIG_FILE_NAME};

use directories::ProjectDirs;
use std::path::PathBuf;

/// Get the application configuration directory
pub fn config_dir() -> Option<PathBuf> {
    ProjectDirs::from("org", "rfidnet", "rfidnet").map(|dirs| dirs.config_dir().to_path_buf())
}

/// Default location of the configuration file
pub fn config_path() -> Option<PathBuf> {
    config_dir().map(|d| d.join(CONFIG_FILE_NAME))
}
