//! # Configuration Structures
//!
//! Configuration structures for the context resolution engine.
//!
//! All configuration structures:
//! - Use `serde` for serialization/deserialization with per-field defaults
//! - Use `validator` for input validation

use serde::{Deserialize, Serialize};
use validator::Validate;

/// Top-level engine configuration.
///
/// ## Fields
/// - `store`: which Document Store backend to use and how to reach it
/// - `resolver`: batch resolution tuning
/// - `observability`: metrics and logging settings
///
/// ## Usage
/// ```rust,no_run
/// use config::EngineConfig;
///
/// let config = EngineConfig::default();
/// println!("Store backend: {}", config.store.backend);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, Validate, Default, PartialEq)]
pub struct EngineConfig {
    /// Document Store backend configuration
    #[serde(default)]
    #[validate(nested)]
    pub store: StoreConfig,

    /// Resolver configuration
    #[serde(default)]
    #[validate(nested)]
    pub resolver: ResolverConfig,

    /// Observability configuration (metrics, logging)
    #[serde(default)]
    #[validate(nested)]
    pub observability: ObservabilityConfig
}

/// Document Store backend selection.
#[derive(Debug, Clone, Serialize, Deserialize, Validate, PartialEq)]
pub struct StoreConfig {
    /// Backend kind: "memory" or "postgres"
    #[serde(default = "default_store_backend")]
    #[validate(custom(function = "validate_store_backend"))]
    pub backend: String,

    /// PostgreSQL connection settings, used when `backend = "postgres"`
    #[serde(default)]
    #[validate(nested)]
    pub postgres: PostgresConfig
}

fn default_store_backend() -> String {
    "memory".to_string()
}

fn validate_store_backend(value: &str) -> Result<(), validator::ValidationError> {
    match value {
        "memory" | "postgres" => Ok(()),
        _ => Err(validator::ValidationError::new("Invalid store backend"))
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: default_store_backend(),
            postgres: PostgresConfig::default()
        }
    }
}

impl StoreConfig {
    pub fn is_postgres(&self) -> bool {
        self.backend == "postgres"
    }
}

/// PostgreSQL connection settings.
#[derive(Debug, Clone, Serialize, Deserialize, Validate, PartialEq)]
pub struct PostgresConfig {
    /// Database server hostname
    #[serde(default = "default_postgres_host")]
    #[validate(length(min = 1, max = 255))]
    pub host: String,

    /// Database server port
    #[serde(default = "default_postgres_port")]
    #[validate(range(min = 1, max = 65535))]
    pub port: u16,

    /// Database name
    #[serde(default = "default_postgres_database")]
    #[validate(length(min = 1, max = 63))]
    pub database: String,

    /// Database username
    #[serde(default = "default_postgres_username")]
    #[validate(length(min = 1, max = 63))]
    pub username: String,

    /// Database password
    #[serde(default)]
    pub password: String,

    /// Maximum connections in pool
    #[serde(default = "default_postgres_pool_size")]
    #[validate(range(min = 1, max = 100))]
    pub pool_size: u32,

    /// Connection timeout in seconds
    #[serde(default = "default_postgres_timeout")]
    #[validate(range(min = 1, max = 300))]
    pub timeout_seconds: u64
}

fn default_postgres_host() -> String {
    "localhost".to_string()
}

fn default_postgres_port() -> u16 {
    5432
}

fn default_postgres_database() -> String {
    "config_contexts".to_string()
}

fn default_postgres_username() -> String {
    "postgres".to_string()
}

fn default_postgres_pool_size() -> u32 {
    10
}

fn default_postgres_timeout() -> u64 {
    30
}

impl Default for PostgresConfig {
    fn default() -> Self {
        Self {
            host: default_postgres_host(),
            port: default_postgres_port(),
            database: default_postgres_database(),
            username: default_postgres_username(),
            password: String::new(),
            pool_size: default_postgres_pool_size(),
            timeout_seconds: default_postgres_timeout()
        }
    }
}

impl PostgresConfig {
    pub fn connection_url(&self) -> String {
        if self.password.is_empty() {
            format!(
                "postgres://{}@{}:{}/{}",
                self.username, self.host, self.port, self.database
            )
        } else {
            format!(
                "postgres://{}:{}@{}:{}/{}",
                self.username, self.password, self.host, self.port, self.database
            )
        }
    }
}

/// Resolver tuning.
#[derive(Debug, Clone, Serialize, Deserialize, Validate, PartialEq)]
pub struct ResolverConfig {
    /// Maximum number of targets sent to the store in one batch query
    #[serde(default = "default_batch_chunk_size")]
    #[validate(range(min = 1, max = 10000))]
    pub batch_chunk_size: usize
}

fn default_batch_chunk_size() -> usize {
    500
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            batch_chunk_size: default_batch_chunk_size()
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Validate, PartialEq)]
pub struct ObservabilityConfig {
    /// Enable metrics collection
    #[serde(default = "default_observability_metrics_enabled")]
    pub metrics_enabled: bool,

    /// Logging level
    #[serde(default = "default_observability_logging_level")]
    #[validate(custom(function = "validate_logging_level"))]
    pub logging_level: String
}

fn default_observability_metrics_enabled() -> bool {
    true
}

fn default_observability_logging_level() -> String {
    "info".to_string()
}

fn validate_logging_level(value: &str) -> Result<(), validator::ValidationError> {
    match value {
        "trace" | "debug" | "info" | "warn" | "error" => Ok(()),
        _ => Err(validator::ValidationError::new("Invalid logging level"))
    }
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            metrics_enabled: default_observability_metrics_enabled(),
            logging_level: default_observability_logging_level()
        }
    }
}
