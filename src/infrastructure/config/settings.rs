//! Application configuration loading and validation.
//!
//! # Example
//!
//! ```no_run
//! use tradesync::infrastructure::config::Config;
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::load("config.toml")?;
//!     config.init_logging();
//!     Ok(())
//! }
//! ```

use std::path::Path;

use serde::Deserialize;

use super::database::DatabaseConfig;
use super::logging::LoggingConfig;
use super::replication::ReplicationConfig;
use crate::error::{ConfigError, Result};

/// Main application configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub logging: LoggingConfig,

    #[serde(default)]
    pub database: DatabaseConfig,

    #[serde(default)]
    pub replication: ReplicationConfig,
}

impl Config {
    /// Parse configuration from TOML text and validate it.
    ///
    /// # Errors
    ///
    /// Returns an error if the TOML is malformed or validation fails.
    pub fn parse_toml(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content).map_err(ConfigError::Parse)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, the TOML is malformed or
    /// validation fails.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(ConfigError::ReadFile)?;
        Self::parse_toml(&content)
    }

    pub fn init_logging(&self) {
        self.logging.init();
    }

    fn validate(&self) -> Result<()> {
        if self.database.url.trim().is_empty() {
            return Err(ConfigError::MissingField { field: "url" }.into());
        }

        let replication = &self.replication;
        let positive = [
            ("persist_interval_ms", replication.persist_interval_ms),
            ("poll_timeout_ms", replication.poll_timeout_ms),
            ("mailbox_capacity", replication.mailbox_capacity as u64),
            ("broadcast_capacity", replication.broadcast_capacity as u64),
            ("load_retry_attempts", u64::from(replication.load_retry_attempts)),
        ];
        for (field, value) in positive {
            if value == 0 {
                return Err(ConfigError::InvalidValue {
                    field,
                    reason: "must be greater than 0".to_string(),
                }
                .into());
            }
        }

        let retry = &replication.retry;
        if retry.backoff_multiplier < 1.0 {
            return Err(ConfigError::InvalidValue {
                field: "backoff_multiplier",
                reason: "must be at least 1.0".to_string(),
            }
            .into());
        }
        if retry.initial_delay_ms > retry.max_delay_ms {
            return Err(ConfigError::InvalidValue {
                field: "initial_delay_ms",
                reason: "must not exceed max_delay_ms".to_string(),
            }
            .into());
        }

        Ok(())
    }
}
