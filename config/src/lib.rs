//! # Configuration System
//!
//! Configuration management for the context resolution engine.
//!
//! This crate provides:
//! - Configuration structures for the store, resolver and observability
//! - Environment variable loading (12-factor app principles)
//! - Configuration file loading (TOML/YAML)
//! - Configuration precedence (explicit > env > file > defaults)
//! - Configuration validation

pub mod config;
pub mod file_loader;
pub mod loader;
pub mod precedence;
pub mod validation;

pub use config::{EngineConfig, ObservabilityConfig, PostgresConfig, ResolverConfig, StoreConfig};
pub use file_loader::{ConfigFileError, load_from_file, load_from_toml, load_from_yaml};
pub use loader::load_from_env;
pub use precedence::merge_configs;
pub use validation::{ConfigError, load_config, validate};
pub use validator::Validate;
