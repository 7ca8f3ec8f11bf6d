//! Configuration file loading.

use crate::config::{Config, validate_config};
use std::path::Path;
use thiserror::Error;

/// Errors that can occur while loading a configuration or building the
/// selector from it. All of them are fatal at startup.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read configuration file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("failed to parse configuration: {0}")]
    ParseError(#[from] serde_yaml::Error),

    #[error("configuration validation failed: {0}")]
    ValidationError(String),

    #[error("at least one backend must be configured")]
    EmptyBackends,

    #[error("invalid backend '{backend}': {reason}")]
    InvalidBackend { backend: String, reason: String },

    #[error("{weights} weights configured for {backends} backends")]
    WeightCountMismatch { weights: usize, backends: usize },

    #[error("weight {weight} at index {index} is invalid (must be >= 1)")]
    InvalidWeight { index: usize, weight: i64 },

    #[error("total weight {total} exceeds the maximum cycle length {max}")]
    CycleTooLong { total: u64, max: u64 },
}

/// Load configuration from a file.
///
/// The file is parsed as YAML, which also accepts the JSON configuration
/// files used by earlier deployments, and then validated.
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<Config, ConfigError> {
    let path = path.as_ref();

    let contents = std::fs::read_to_string(path)?;

    let config: Config = serde_yaml::from_str(&contents)?;

    validate_config(&config).map_err(ConfigError::ValidationError)?;

    Ok(config)
}
