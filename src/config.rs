//! Configuration management
//!
//! Handles loading and validating exporter configuration from TOML files.
//! Every section is optional; command-line flags override individual fields.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Root configuration structure
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub refresh: RefreshConfig,
    #[serde(default)]
    pub http: HttpConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Database connection configuration
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_db_host")]
    pub host: String,
    #[serde(default = "default_db_port")]
    pub port: u16,
    #[serde(default = "default_db_user")]
    pub user: String,
    #[serde(default = "default_db_password")]
    pub password: String,
    #[serde(default = "default_db_name")]
    pub dbname: String,
    /// Connect timeout in seconds (0 = driver default)
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,
    /// Per-table count query timeout in seconds (0 = unbounded)
    #[serde(default = "default_query_timeout")]
    pub query_timeout_secs: u64,
}

impl DatabaseConfig {
    pub fn query_timeout(&self) -> Option<Duration> {
        (self.query_timeout_secs > 0).then(|| Duration::from_secs(self.query_timeout_secs))
    }

    pub fn connect_timeout(&self) -> Option<Duration> {
        (self.connect_timeout_secs > 0).then(|| Duration::from_secs(self.connect_timeout_secs))
    }
}

/// What the refresh loop does when a count query fails
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QueryErrorPolicy {
    /// Log the failure, keep the last known value
    Retain,
    /// Stop the loop and let the process exit
    Abort,
}

/// What the refresh loop does when the snapshot file cannot be published
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PublishErrorPolicy {
    /// Log the failure, skip this cycle's file publish
    Skip,
    /// Stop the loop and let the process exit
    Abort,
}

/// Refresh loop configuration
#[derive(Debug, Clone, Deserialize)]
pub struct RefreshConfig {
    /// Seconds to sleep between cycles
    #[serde(default = "default_interval")]
    pub interval_secs: u64,
    /// Directory for the snapshot file; file output is disabled when unset
    #[serde(default)]
    pub output_dir: Option<PathBuf>,
    #[serde(default = "default_query_policy")]
    pub on_query_error: QueryErrorPolicy,
    #[serde(default = "default_publish_policy")]
    pub on_publish_error: PublishErrorPolicy,
}

impl RefreshConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }
}

/// HTTP endpoint configuration
#[derive(Debug, Clone, Deserialize)]
pub struct HttpConfig {
    /// Address to bind the metrics endpoint
    #[serde(default = "default_http_addr")]
    pub bind_addr: SocketAddr,
    /// Append the exporter's own metrics to /metrics
    #[serde(default = "default_true")]
    pub self_metrics: bool,
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Output format: "json" or "pretty"
    #[serde(default = "default_log_format")]
    pub format: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            host: default_db_host(),
            port: default_db_port(),
            user: default_db_user(),
            password: default_db_password(),
            dbname: default_db_name(),
            connect_timeout_secs: default_connect_timeout(),
            query_timeout_secs: default_query_timeout(),
        }
    }
}

impl Default for RefreshConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_interval(),
            output_dir: None,
            on_query_error: default_query_policy(),
            on_publish_error: default_publish_policy(),
        }
    }
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            bind_addr: default_http_addr(),
            self_metrics: default_true(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

// Default value functions
fn default_db_host() -> String { "localhost".to_string() }
fn default_db_port() -> u16 { 5432 }
fn default_db_user() -> String { "sormas_user".to_string() }
fn default_db_password() -> String { "password".to_string() }
fn default_db_name() -> String { "sormas".to_string() }
fn default_connect_timeout() -> u64 { 10 }
fn default_query_timeout() -> u64 { 10 }
fn default_interval() -> u64 { 30 }
fn default_query_policy() -> QueryErrorPolicy { QueryErrorPolicy::Retain }
fn default_publish_policy() -> PublishErrorPolicy { PublishErrorPolicy::Abort }
fn default_http_addr() -> SocketAddr { SocketAddr::from(([0, 0, 0, 0], 3014)) }
fn default_true() -> bool { true }
fn default_log_level() -> String { "info".to_string() }
fn default_log_format() -> String { "pretty".to_string() }

impl Config {
    /// Load configuration from a TOML file.
    ///
    /// Values are not validated here; call [`Config::validate`] once any
    /// command-line overrides have been applied.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;

        let config: Config = toml::from_str(&contents)
            .with_context(|| "Failed to parse config file")?;

        Ok(config)
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        if self.refresh.interval_secs == 0 {
            anyhow::bail!("interval_secs must be > 0");
        }
        if self.database.port == 0 {
            anyhow::bail!("database port must be > 0");
        }
        if self.database.host.is_empty() {
            anyhow::bail!("database host must not be empty");
        }
        if let Some(dir) = &self.refresh.output_dir {
            if dir.as_os_str().is_empty() {
                anyhow::bail!("output_dir must not be empty when set");
            }
        }
        Ok(())
    }
}
