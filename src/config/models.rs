use serde::{Deserialize, Serialize};
use std::net::{Ipv4Addr, SocketAddr};
use std::path::PathBuf;
use std::time::Duration;

use crate::engine::EngineSettings;
use crate::notify::DispatcherSettings;

/// Top-level configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub distribution: DistributionConfig,
    #[serde(default)]
    pub notifications: NotificationConfig,
    #[serde(default)]
    pub export: ExportConfig,
    #[serde(default)]
    pub telemetry: TelemetryConfig,
}

impl Config {
    pub fn engine_settings(&self) -> EngineSettings {
        EngineSettings {
            max_batch_size: self.server.max_batch_size,
            max_conflict_retries: self.distribution.max_conflict_retries,
            default_reason: self.distribution.default_reason.clone(),
        }
    }
}

/// Server configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_bind_addr")]
    pub bind_addr: SocketAddr,
    /// Fjall keyspace directory
    #[serde(default = "default_data_path")]
    pub data_path: PathBuf,
    /// Most lead ids accepted by one assign or bulk call
    #[serde(default = "default_max_batch_size")]
    pub max_batch_size: usize,
    /// Requests served concurrently before new ones queue
    #[serde(default = "default_max_concurrent_requests")]
    pub max_concurrent_requests: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: default_bind_addr(),
            data_path: default_data_path(),
            max_batch_size: default_max_batch_size(),
            max_concurrent_requests: default_max_concurrent_requests(),
        }
    }
}

fn default_bind_addr() -> SocketAddr {
    SocketAddr::from((Ipv4Addr::UNSPECIFIED, 8080))
}

fn default_data_path() -> PathBuf {
    PathBuf::from("data/leadflow")
}

fn default_max_batch_size() -> usize {
    500
}

fn default_max_concurrent_requests() -> usize {
    256
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DistributionConfig {
    /// Re-reads after a lost quota race before the pair counts as over capacity
    #[serde(default = "default_max_conflict_retries")]
    pub max_conflict_retries: u32,
    /// History reason used when the caller gives none
    #[serde(default = "default_reason")]
    pub default_reason: String,
}

impl Default for DistributionConfig {
    fn default() -> Self {
        Self {
            max_conflict_retries: default_max_conflict_retries(),
            default_reason: default_reason(),
        }
    }
}

fn default_max_conflict_retries() -> u32 {
    3
}

fn default_reason() -> String {
    "lead distribution".to_string()
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct NotificationConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_channel_size")]
    pub channel_size: usize,
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_retry_backoff_ms")]
    pub retry_backoff_ms: u64,
    /// Push gateway endpoint. Without one, notifications are only logged.
    #[serde(default)]
    pub webhook_url: Option<String>,
    #[serde(default = "default_webhook_timeout_ms")]
    pub webhook_timeout_ms: u64,
}

impl NotificationConfig {
    pub fn dispatcher_settings(&self) -> DispatcherSettings {
        DispatcherSettings {
            channel_size: self.channel_size,
            max_attempts: self.max_attempts,
            retry_backoff: Duration::from_millis(self.retry_backoff_ms),
        }
    }
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            channel_size: default_channel_size(),
            max_attempts: default_max_attempts(),
            retry_backoff_ms: default_retry_backoff_ms(),
            webhook_url: None,
            webhook_timeout_ms: default_webhook_timeout_ms(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_channel_size() -> usize {
    256
}

fn default_max_attempts() -> u32 {
    3
}

fn default_retry_backoff_ms() -> u64 {
    200
}

fn default_webhook_timeout_ms() -> u64 {
    5000
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ExportConfig {
    #[serde(default = "default_bucket")]
    pub bucket: String,
    #[serde(default = "default_key_prefix")]
    pub key_prefix: String,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            bucket: default_bucket(),
            key_prefix: default_key_prefix(),
        }
    }
}

fn default_bucket() -> String {
    "leadflow-exports".to_string()
}

fn default_key_prefix() -> String {
    "exports/".to_string()
}

/// Telemetry configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TelemetryConfig {
    /// Filter directive used when `RUST_LOG` is unset
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}
