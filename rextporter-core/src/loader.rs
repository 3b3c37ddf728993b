//! TOML configuration loading.

use crate::error::ConfigError;
use crate::service::RootConfig;
use std::fs;
use std::path::Path;

/// Decode and validate a configuration from TOML text.
pub fn load_config_str(content: &str) -> Result<RootConfig, ConfigError> {
    let config: RootConfig = toml::from_str(content).map_err(|e| ConfigError::Parse {
        reason: e.to_string(),
    })?;
    config.validate()?;
    tracing::info!(services = config.services.len(), "configuration loaded");
    Ok(config)
}

/// Load and validate a configuration from a TOML file.
pub fn load_config(path: impl AsRef<Path>) -> Result<RootConfig, ConfigError> {
    let path = path.as_ref();
    let content = fs::read_to_string(path).map_err(|e| ConfigError::Read {
        path: path.display().to_string(),
        reason: e.to_string(),
    })?;
    load_config_str(&content)
}
