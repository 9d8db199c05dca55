//! Error types for the no-water-sleep plugin.

use game_host::{ConfigStoreError, PluginError};
use thiserror::Error;

/// Failures while loading, migrating or validating the plugin configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Config store error: {0}")]
    Store(#[from] ConfigStoreError),

    #[error("Config file is malformed: {0}")]
    Malformed(serde_json::Error),

    #[error("Failed to serialize config: {0}")]
    Serialization(serde_json::Error),

    #[error("Invalid config value for {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}

impl From<ConfigError> for PluginError {
    fn from(e: ConfigError) -> Self {
        PluginError::InitializationFailed(e.to_string())
    }
}

pub type ConfigResult<T> = Result<T, ConfigError>;
