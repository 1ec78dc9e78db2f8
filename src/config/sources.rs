use super::models::Config;
use config::{ConfigError, Environment, File};
use std::env;
use std::path::PathBuf;

const CONFIG_ENV_VAR: &str = "LEADFLOW_CONFIG";
const DEFAULT_CONFIG_PATH: &str = "config/leadflow.toml";
const ENV_PREFIX: &str = "LEADFLOW";
const ENV_SEPARATOR: &str = "__";

/// Load configuration from multiple sources with priority:
/// 1. Defaults (embedded in structs)
/// 2. TOML file (if exists)
/// 3. Environment variables from .env file (via dotenvy)
/// 4. System environment variables (highest priority)
pub fn load() -> Result<Config, ConfigError> {
    // A missing .env file is fine
    let _ = dotenvy::dotenv();

    let config_path = env::var(CONFIG_ENV_VAR)
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from(DEFAULT_CONFIG_PATH));

    load_from_sources(config_path)
}

/// Load configuration from a specific path and environment
pub fn load_from_sources(config_path: PathBuf) -> Result<Config, ConfigError> {
    let mut builder = config::Config::builder();

    if config_path.exists() {
        tracing::info!("Loading configuration from: {}", config_path.display());
        builder = builder.add_source(File::from(config_path).required(false));
    } else {
        tracing::warn!(
            "Configuration file not found at {}, using defaults and environment overrides",
            config_path.display()
        );
    }

    // LEADFLOW__SERVER__BIND_ADDR -> server.bind_addr
    builder = builder.add_source(
        Environment::with_prefix(ENV_PREFIX)
            .separator(ENV_SEPARATOR)
            .try_parsing(true),
    );

    let config = builder.build()?;
    config.try_deserialize()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_load_defaults_only() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("nonexistent.toml");

        let config = load_from_sources(config_path).unwrap();
        assert_eq!(config.server.bind_addr.to_string(), "0.0.0.0:8080");
        assert_eq!(config.server.max_batch_size, 500);
        assert_eq!(config.distribution.max_conflict_retries, 3);
        assert!(config.notifications.enabled);
        assert_eq!(config.export.bucket, "leadflow-exports");
    }

    #[test]
    fn test_load_from_toml() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("test.toml");

        let toml_content = r#"
[server]
bind_addr = "127.0.0.1:9000"
data_path = "/var/lib/leadflow"
max_batch_size = 50

[distribution]
max_conflict_retries = 5
default_reason = "nightly batch"

[notifications]
enabled = false
webhook_url = "https://push.example.com/send"

[export]
bucket = "ops-exports"
key_prefix = "leads/"

[telemetry]
log_level = "debug"
        "#;

        fs::write(&config_path, toml_content).unwrap();

        let config = load_from_sources(config_path).unwrap();
        assert_eq!(config.server.bind_addr.to_string(), "127.0.0.1:9000");
        assert_eq!(config.server.data_path, PathBuf::from("/var/lib/leadflow"));
        assert_eq!(config.server.max_batch_size, 50);
        assert_eq!(config.distribution.max_conflict_retries, 5);
        assert_eq!(config.distribution.default_reason, "nightly batch");
        assert!(!config.notifications.enabled);
        assert_eq!(config.notifications.channel_size, 256);
        assert_eq!(
            config.notifications.webhook_url.as_deref(),
            Some("https://push.example.com/send")
        );
        assert_eq!(config.export.key_prefix, "leads/");
        assert_eq!(config.telemetry.log_level, "debug");
    }
}
