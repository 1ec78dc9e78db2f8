//! Configuration management for leadflow
//!
//! This module provides a layered configuration system that loads settings from:
//! 1. Default values (embedded in structs)
//! 2. TOML configuration file
//! 3. Environment variables (highest priority)
//!
//! # Usage
//!
//! ```no_run
//! use leadflow::config::Config;
//!
//! let config = Config::load().expect("Failed to load configuration");
//! println!("Server listening on: {}", config.server.bind_addr);
//! ```
//!
//! # Environment Variables
//!
//! Configuration can be overridden using environment variables with the pattern:
//! `LEADFLOW__<section>__<key>`
//!
//! Examples:
//! - `LEADFLOW__SERVER__BIND_ADDR=0.0.0.0:9000`
//! - `LEADFLOW__DISTRIBUTION__MAX_CONFLICT_RETRIES=5`
//! - `LEADFLOW__NOTIFICATIONS__WEBHOOK_URL=https://push.example.com/send`
//!
//! # Configuration File
//!
//! By default, the configuration is loaded from `config/leadflow.toml`.
//! This can be overridden using the `LEADFLOW_CONFIG` environment variable.

mod models;
mod sources;
mod validation;

pub use models::{
    Config, DistributionConfig, ExportConfig, NotificationConfig, ServerConfig, TelemetryConfig,
};
pub use validation::ValidationError;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to load configuration: {0}")]
    LoadError(#[from] config::ConfigError),

    #[error("Configuration validation failed: {0}")]
    ValidationError(#[from] ValidationError),
}

impl Config {
    /// Load configuration from all sources (file + environment)
    ///
    /// Configuration is loaded with the following priority (highest to lowest):
    /// 1. Environment variables (`LEADFLOW__*`)
    /// 2. TOML file (default: `config/leadflow.toml`)
    /// 3. Default values
    pub fn load() -> Result<Self, ConfigError> {
        let config = sources::load()?;
        validation::validate(&config)?;
        Ok(config)
    }

    /// Load configuration from a specific path
    pub fn load_from_path(path: std::path::PathBuf) -> Result<Self, ConfigError> {
        let config = sources::load_from_sources(path)?;
        validation::validate(&config)?;
        Ok(config)
    }
}
