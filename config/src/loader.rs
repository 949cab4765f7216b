//! # Environment Variable Loader
//!
//! Loads configuration from environment variables following 12-factor app
//! principles.
//!
//! # Naming Convention
//! - `CTX_*`: Engine settings (store backend, resolver, observability)
//! - `PG_*`: PostgreSQL settings

use crate::config::{
    EngineConfig, ObservabilityConfig, PostgresConfig, ResolverConfig, StoreConfig
};
use std::env;

/// Load configuration from environment variables.
///
/// # M-CANONICAL-DOCS
///
/// ## Purpose
/// Loads configuration from environment variables. Unset or unparseable
/// variables fall back to the default value of the field.
///
/// ## Usage
/// ```rust,no_run
/// use config::load_from_env;
///
/// fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let config = load_from_env()?;
///     println!("PostgreSQL host: {}", config.store.postgres.host);
///     Ok(())
/// }
/// ```
///
/// ## Environment Variables
/// ### Engine Settings (`CTX_*`)
/// - `CTX_STORE_BACKEND`: Document Store backend (memory/postgres, default: "memory")
/// - `CTX_BATCH_CHUNK_SIZE`: Targets per batch query (default: 500)
/// - `CTX_METRICS_ENABLED`: Enable metrics (true/false, default: true)
/// - `CTX_LOG_LEVEL`: Logging level (trace/debug/info/warn/error, default: "info")
///
/// ### PostgreSQL Settings (`PG_*`)
/// - `PG_HOST`: Database host (default: "localhost")
/// - `PG_PORT`: Database port (default: 5432)
/// - `PG_DATABASE`: Database name (default: "config_contexts")
/// - `PG_USERNAME`: Database user (default: "postgres")
/// - `PG_PASSWORD`: Database password (default: "")
/// - `PG_POOL_SIZE`: Connection pool size (default: 10)
/// - `PG_TIMEOUT_SECONDS`: Connection timeout in seconds (default: 30)
pub fn load_from_env() -> Result<EngineConfig, Box<dyn std::error::Error>> {
    let config = EngineConfig {
        store: load_store_from_env()?,
        resolver: load_resolver_from_env()?,
        observability: load_observability_from_env()?
    };

    Ok(config)
}

fn load_store_from_env() -> Result<StoreConfig, Box<dyn std::error::Error>> {
    let defaults = StoreConfig::default();
    Ok(StoreConfig {
        backend: env::var("CTX_STORE_BACKEND").unwrap_or(defaults.backend),
        postgres: load_postgres_from_env()?
    })
}

fn load_postgres_from_env() -> Result<PostgresConfig, Box<dyn std::error::Error>> {
    let defaults = PostgresConfig::default();
    Ok(PostgresConfig {
        host: env::var("PG_HOST").unwrap_or(defaults.host),
        port: parse_env("PG_PORT").unwrap_or(defaults.port),
        database: env::var("PG_DATABASE").unwrap_or(defaults.database),
        username: env::var("PG_USERNAME").unwrap_or(defaults.username),
        password: env::var("PG_PASSWORD").unwrap_or_default(),
        pool_size: parse_env("PG_POOL_SIZE").unwrap_or(defaults.pool_size),
        timeout_seconds: parse_env("PG_TIMEOUT_SECONDS").unwrap_or(defaults.timeout_seconds)
    })
}

fn load_resolver_from_env() -> Result<ResolverConfig, Box<dyn std::error::Error>> {
    let defaults = ResolverConfig::default();
    Ok(ResolverConfig {
        batch_chunk_size: parse_env("CTX_BATCH_CHUNK_SIZE").unwrap_or(defaults.batch_chunk_size)
    })
}

fn load_observability_from_env() -> Result<ObservabilityConfig, Box<dyn std::error::Error>> {
    let defaults = ObservabilityConfig::default();
    Ok(ObservabilityConfig {
        metrics_enabled: parse_env("CTX_METRICS_ENABLED").unwrap_or(defaults.metrics_enabled),
        logging_level: env::var("CTX_LOG_LEVEL").unwrap_or(defaults.logging_level)
    })
}

fn parse_env<T>(key: &str) -> Result<T, Box<dyn std::error::Error>>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static
{
    match env::var(key) {
        Ok(s) => s
            .parse::<T>()
            .map_err(|e| Box::new(e) as Box<dyn std::error::Error>),
        Err(e) => Err(Box::new(e) as Box<dyn std::error::Error>)
    }
}
