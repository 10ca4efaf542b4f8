//! Configuration for the meter poller.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::codec::WordOrder;
use crate::error::ConfigError;
use crate::poller::PollerSettings;

/// Complete poller configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MeterPollerConfig {
    /// Meter connection and polling settings
    pub meter: MeterConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Configuration for a single meter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MeterConfig {
    /// Display name used in logs
    #[serde(default = "default_name")]
    pub name: String,

    /// Host address (IP or hostname)
    pub host: String,

    /// TCP port (default: 502)
    #[serde(default = "default_modbus_port")]
    pub port: u16,

    /// Modbus unit/slave ID (0-247)
    #[serde(default = "default_unit_id")]
    pub unit_id: u8,

    /// Poll interval in seconds
    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,

    /// Connect and per-request timeout in milliseconds
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// Word order of 32-bit values
    #[serde(default)]
    pub word_order: WordOrder,
}

fn default_name() -> String {
    "SELogic Power Meter".to_string()
}

fn default_modbus_port() -> u16 {
    502
}

fn default_unit_id() -> u8 {
    1
}

fn default_poll_interval() -> u64 {
    30
}

fn default_timeout_ms() -> u64 {
    10_000
}

impl MeterConfig {
    /// Settings for a meter at `host` with every other value defaulted.
    pub fn with_host(host: impl Into<String>) -> Self {
        Self {
            name: default_name(),
            host: host.into(),
            port: default_modbus_port(),
            unit_id: default_unit_id(),
            poll_interval_secs: default_poll_interval(),
            timeout_ms: default_timeout_ms(),
            word_order: WordOrder::default(),
        }
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn poller_settings(&self) -> PollerSettings {
        PollerSettings {
            name: self.name.clone(),
            unit_id: self.unit_id,
            request_timeout: self.timeout(),
            word_order: self.word_order,
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.host.trim().is_empty() {
            return Err(ConfigError::Validation("meter host must not be empty".into()));
        }
        if self.unit_id > 247 {
            return Err(ConfigError::Validation(format!(
                "unit id {} out of range (0-247)",
                self.unit_id
            )));
        }
        if self.poll_interval_secs == 0 {
            return Err(ConfigError::Validation(
                "poll interval must be at least 1 second".into(),
            ));
        }
        if self.timeout_ms == 0 {
            return Err(ConfigError::Validation("timeout must be positive".into()));
        }
        Ok(())
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level filter, e.g. "info" or "selogic_meter=debug"
    #[serde(default = "default_log_level")]
    pub level: String,

    #[serde(default)]
    pub format: LogFormat,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: LogFormat::default(),
        }
    }
}

impl MeterPollerConfig {
    /// Load and validate configuration from a JSON5 file.
    pub fn load_from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::parse(&content)
    }

    /// Parse and validate configuration from a JSON5 string.
    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        let config: Self = json5::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.meter.validate()
    }
}
