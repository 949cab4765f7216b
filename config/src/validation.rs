//! # Configuration Validation
//!
//! Validates the merged configuration and runs the full load pipeline.

use crate::config::EngineConfig;
use crate::file_loader::{ConfigFileError, load_from_file};
use crate::loader::load_from_env;
use crate::precedence::merge_configs;
use std::path::Path;
use validator::Validate;

/// Errors raised while assembling the engine configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error(transparent)]
    File(#[from] ConfigFileError),

    #[error("Failed to read configuration from environment: {0}")]
    Env(String),

    #[error("Invalid configuration: {0}")]
    Invalid(#[from] validator::ValidationErrors)
}

/// Validate configuration structure.
///
/// # M-CANONICAL-DOCS
///
/// ## Validation Rules
/// ### Store
/// - `backend`: must be "memory" or "postgres"
///
/// ### PostgreSQL
/// - `host`: 1-255 characters
/// - `port`: 1-65535
/// - `database`: 1-63 characters
/// - `username`: 1-63 characters
/// - `pool_size`: 1-100
/// - `timeout_seconds`: 1-300
///
/// ### Resolver
/// - `batch_chunk_size`: 1-10000
///
/// ### Observability
/// - `logging_level`: must be "trace", "debug", "info", "warn", or "error"
pub fn validate(config: &EngineConfig) -> Result<(), validator::ValidationErrors> {
    config.validate()
}

/// Load the engine configuration from every source and validate it.
///
/// Layers are applied as `defaults < file < env < explicit`. A missing
/// `path` skips the file layer.
///
/// ## Usage
/// ```rust,no_run
/// use config::load_config;
/// use std::path::Path;
///
/// fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let config = load_config(Some(Path::new("engine.toml")), None)?;
///     println!("Store backend: {}", config.store.backend);
///     Ok(())
/// }
/// ```
pub fn load_config(
    path: Option<&Path>,
    explicit: Option<EngineConfig>
) -> Result<EngineConfig, ConfigError> {
    let file_config = match path {
        Some(path) => load_from_file(path)?,
        None => EngineConfig::default()
    };
    let env_config = load_from_env().map_err(|e| ConfigError::Env(e.to_string()))?;

    let config = merge_configs(
        EngineConfig::default(),
        file_config,
        "file",
        env_config,
        "env",
        explicit,
        "explicit"
    );

    validate(&config)?;
    Ok(config)
}
