//! # Configuration Precedence
//!
//! Merges configuration from multiple sources with precedence rules.
//!
//! # Precedence Order
//! 1. Explicit overrides (highest priority)
//! 2. Environment variables
//! 3. Configuration file
//! 4. Default values (lowest priority)

use crate::config::{
    EngineConfig, ObservabilityConfig, PostgresConfig, ResolverConfig, StoreConfig
};

/// Merge multiple configuration sources with precedence.
///
/// # M-CANONICAL-DOCS
///
/// ## Purpose
/// Merges configuration from multiple sources following precedence rules:
/// explicit overrides > environment variables > config file > defaults.
///
/// ## Usage
/// ```rust,no_run
/// use config::{EngineConfig, merge_configs, load_from_file, load_from_env};
/// use std::path::Path;
///
/// fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let defaults = EngineConfig::default();
///     let from_file = load_from_file(Path::new("engine.toml"))?;
///     let from_env = load_from_env()?;
///
///     let _config = merge_configs(
///         defaults,
///         from_file,
///         "file",
///         from_env,
///         "env",
///         None,
///         "explicit",
///     );
///     Ok(())
/// }
/// ```
///
/// ## Field Semantics
/// A source only overrides a field when its value differs from the field's
/// default, so a source that leaves a field unset never masks a lower layer.
/// Every applied change is logged at `info` with secrets masked.
pub fn merge_configs(
    defaults: EngineConfig,
    file_config: EngineConfig,
    file_source_name: &str,
    env_config: EngineConfig,
    env_source_name: &str,
    explicit_config: Option<EngineConfig>,
    explicit_source_name: &str
) -> EngineConfig {
    let mut config = defaults;

    config = merge_with_logging(config, file_config, file_source_name);
    config = merge_with_logging(config, env_config, env_source_name);

    if let Some(explicit) = explicit_config {
        config = merge_with_logging(config, explicit, explicit_source_name);
    }

    config
}

fn merge_with_logging(
    mut base: EngineConfig,
    override_config: EngineConfig,
    source_name: &str
) -> EngineConfig {
    let mut changes = Vec::new();

    merge_store(&mut base.store, &override_config.store, &mut changes);
    merge_resolver(&mut base.resolver, &override_config.resolver, &mut changes);
    merge_observability(
        &mut base.observability,
        &override_config.observability,
        &mut changes
    );

    if !changes.is_empty() {
        tracing::info!("Configuration from {}: {:?}", source_name, changes);
    }

    base
}

fn merge_store(base: &mut StoreConfig, override_config: &StoreConfig, changes: &mut Vec<String>) {
    let defaults = StoreConfig::default();
    if override_config.backend != defaults.backend && override_config.backend != base.backend {
        changes.push(format!("store.backend = {}", override_config.backend));
        base.backend.clone_from(&override_config.backend);
    }
    merge_postgres(&mut base.postgres, &override_config.postgres, changes);
}

fn merge_postgres(
    base: &mut PostgresConfig,
    override_config: &PostgresConfig,
    changes: &mut Vec<String>
) {
    let defaults = PostgresConfig::default();
    if override_config.host != defaults.host && override_config.host != base.host {
        changes.push(format!("store.postgres.host = {}", override_config.host));
        base.host.clone_from(&override_config.host);
    }
    if override_config.port != defaults.port && override_config.port != base.port {
        changes.push(format!("store.postgres.port = {}", override_config.port));
        base.port = override_config.port;
    }
    if override_config.database != defaults.database && override_config.database != base.database
    {
        changes.push(format!(
            "store.postgres.database = {}",
            override_config.database
        ));
        base.database.clone_from(&override_config.database);
    }
    if override_config.username != defaults.username && override_config.username != base.username
    {
        changes.push(format!(
            "store.postgres.username = {}",
            override_config.username
        ));
        base.username.clone_from(&override_config.username);
    }
    if !override_config.password.is_empty() && override_config.password != base.password {
        changes.push("store.postgres.password = ***".to_string());
        base.password.clone_from(&override_config.password);
    }
    if override_config.pool_size != defaults.pool_size
        && override_config.pool_size != base.pool_size
    {
        changes.push(format!(
            "store.postgres.pool_size = {}",
            override_config.pool_size
        ));
        base.pool_size = override_config.pool_size;
    }
    if override_config.timeout_seconds != defaults.timeout_seconds
        && override_config.timeout_seconds != base.timeout_seconds
    {
        changes.push(format!(
            "store.postgres.timeout_seconds = {}",
            override_config.timeout_seconds
        ));
        base.timeout_seconds = override_config.timeout_seconds;
    }
}

fn merge_resolver(
    base: &mut ResolverConfig,
    override_config: &ResolverConfig,
    changes: &mut Vec<String>
) {
    let defaults = ResolverConfig::default();
    if override_config.batch_chunk_size != defaults.batch_chunk_size
        && override_config.batch_chunk_size != base.batch_chunk_size
    {
        changes.push(format!(
            "resolver.batch_chunk_size = {}",
            override_config.batch_chunk_size
        ));
        base.batch_chunk_size = override_config.batch_chunk_size;
    }
}

fn merge_observability(
    base: &mut ObservabilityConfig,
    override_config: &ObservabilityConfig,
    changes: &mut Vec<String>
) {
    let defaults = ObservabilityConfig::default();
    if override_config.metrics_enabled != defaults.metrics_enabled
        && override_config.metrics_enabled != base.metrics_enabled
    {
        changes.push(format!(
            "observability.metrics_enabled = {}",
            override_config.metrics_enabled
        ));
        base.metrics_enabled = override_config.metrics_enabled;
    }
    if override_config.logging_level != defaults.logging_level
        && override_config.logging_level != base.logging_level
    {
        changes.push(format!(
            "observability.logging_level = {}",
            override_config.logging_level
        ));
        base.logging_level
            .clone_from(&override_config.logging_level);
    }
}
