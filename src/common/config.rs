//! Configuration file handling
//!
//! The config file is optional; every field has a sensible default so the
//! CLI works with nothing but a host argument.

use serde::Deserialize;

use super::paths::config_path;
use super::{Error, Result};

/// Main configuration structure
#[derive(Debug, Deserialize, Default)]
pub struct Config {
    /// Device settings
    #[serde(default)]
    pub device: DeviceConfig,

    /// Logging settings
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Settings for the target Roku device
#[derive(Debug, Deserialize, Default)]
pub struct DeviceConfig {
    /// Default device hostname or IP, used when the CLI gets no host argument
    pub host: Option<String>,
}

/// Logging settings
#[derive(Debug, Deserialize, Default)]
pub struct LoggingConfig {
    /// Tracing filter directive, e.g. `roku_debugger=debug`
    pub filter: Option<String>,
}

impl Config {
    /// Load the configuration from the platform config path
    ///
    /// A missing file yields the defaults; a malformed file is an error.
    pub fn load() -> Result<Self> {
        let Some(path) = config_path() else {
            return Ok(Self::default());
        };

        if !path.exists() {
            return Ok(Self::default());
        }

        let contents = std::fs::read_to_string(&path).map_err(|e| {
            Error::Config(format!("failed to read {}: {}", path.display(), e))
        })?;

        toml::from_str(&contents).map_err(|e| Error::ConfigParse(e.to_string()))
    }
}
