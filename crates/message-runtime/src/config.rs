//! Runtime configuration for the broker, interceptors and helpers.
//!
//! Every field carries a serde default so an absent file or an entirely
//! unconfigured environment yields a usable configuration.
//!
//! Sources are applied in order, later sources overriding earlier ones:
//!  1. `config/messaging.{toml,yaml,json}` relative to the working directory
//!  2. an explicit file passed to [`MessagingConfig::load`]
//!  3. environment variables prefixed `MESSAGING__` with `__` as separator,
//!     e.g. `MESSAGING__BROKER__MAX_BATCH_SIZE=64`

use crate::error::ConfigurationError;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;

/// Environment variable prefix for configuration overrides
pub const ENV_PREFIX: &str = "MESSAGING";

/// Top-level runtime configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MessagingConfig {
    pub broker: BrokerConfig,
    pub listen_retry: ListenRetryConfig,
    pub compression: CompressionConfig,
    pub offload: OffloadConfig,
    pub partition: PartitionConfig,
}

impl MessagingConfig {
    /// Load configuration from the standard sources plus an optional explicit file.
    ///
    /// A missing default file is not an error; a missing explicit file, a
    /// malformed file or an environment value of the wrong type is.
    pub fn load(explicit_file: Option<&Path>) -> Result<Self, ConfigurationError> {
        let mut builder = config::Config::builder()
            .add_source(config::File::with_name("config/messaging").required(false));

        if let Some(path) = explicit_file {
            builder = builder.add_source(config::File::from(path).required(true));
        }

        let settings = builder
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .map_err(|e| ConfigurationError::Parsing {
                message: e.to_string(),
            })?;

        let loaded: Self = settings
            .try_deserialize()
            .map_err(|e| ConfigurationError::Parsing {
                message: e.to_string(),
            })?;

        loaded.validate()?;
        Ok(loaded)
    }

    /// Check value ranges that serde cannot express
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        if self.broker.max_batch_size == 0 {
            return Err(ConfigurationError::Invalid {
                message: "broker.max_batch_size must be greater than zero".to_string(),
            });
        }

        if self.partition.parallelization == 0 {
            return Err(ConfigurationError::Invalid {
                message: "partition.parallelization must be greater than zero".to_string(),
            });
        }

        if self.compression.level > 9 {
            return Err(ConfigurationError::Invalid {
                message: format!(
                    "compression.level must be between 0 and 9, got {}",
                    self.compression.level
                ),
            });
        }

        Ok(())
    }
}

/// In-memory broker configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BrokerConfig {
    /// Maximum number of messages handed to listeners per dispatch
    pub max_batch_size: usize,
    /// Delay before a rejected message is put back on the queue
    pub reject_delay_ms: u64,
}

impl BrokerConfig {
    pub fn reject_delay(&self) -> Duration {
        Duration::from_millis(self.reject_delay_ms)
    }
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            max_batch_size: 32,
            reject_delay_ms: 1000,
        }
    }
}

/// Listen-with-retry configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ListenRetryConfig {
    /// Fixed delay between a failed listen and the next attempt
    pub backoff_ms: u64,
}

impl ListenRetryConfig {
    pub fn backoff(&self) -> Duration {
        Duration::from_millis(self.backoff_ms)
    }
}

impl Default for ListenRetryConfig {
    fn default() -> Self {
        Self { backoff_ms: 5000 }
    }
}

/// Gzip interceptor configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompressionConfig {
    /// Gzip level, 0 (store) to 9 (best)
    pub level: u32,
}

impl Default for CompressionConfig {
    fn default() -> Self {
        Self { level: 6 }
    }
}

/// Large-payload offload configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OffloadConfig {
    /// Content larger than this is moved to the blob container
    pub threshold_bytes: usize,
}

impl Default for OffloadConfig {
    fn default() -> Self {
        Self {
            threshold_bytes: 64 * 1024,
        }
    }
}

/// Partition processor configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PartitionConfig {
    /// Number of concurrent partition workers
    pub parallelization: usize,
}

impl Default for PartitionConfig {
    fn default() -> Self {
        Self { parallelization: 4 }
    }
}
