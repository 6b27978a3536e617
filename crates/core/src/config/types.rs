use serde::{Deserialize, Serialize};
use std::net::IpAddr;
use std::path::PathBuf;

use crate::ots::TargetOperation;

/// Root configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    pub auth: AuthConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub ots: Option<OtsConfig>,
    #[serde(default)]
    pub batch: BatchSectionConfig,
}

/// Server configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: IpAddr,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

fn default_host() -> IpAddr {
    "0.0.0.0".parse().unwrap()
}

fn default_port() -> u16 {
    8080
}

/// Authentication configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AuthConfig {
    pub method: AuthMethod,
    /// API key for method = "api_key".
    #[serde(default)]
    pub api_key: Option<String>,
    /// Shared access key required to trigger batch runs, compared
    /// independently of the transport-level authenticator.
    #[serde(default)]
    pub batch_access_key: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AuthMethod {
    None,
    ApiKey,
}

/// Database configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_db_path")]
    pub path: PathBuf,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

fn default_db_path() -> PathBuf {
    PathBuf::from("galleyforge.db")
}

/// Conversion service (OTS) connection configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct OtsConfig {
    /// Service base URL (e.g., "http://localhost:8180")
    pub url: String,
    /// Account email used for login
    pub username: String,
    /// Account password
    pub password: String,
    /// Request timeout in seconds (default: 30)
    #[serde(default = "default_timeout")]
    pub timeout_secs: u32,
}

fn default_timeout() -> u32 {
    30
}

/// Batch runner configuration section
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BatchSectionConfig {
    /// Directory holding per-submission source files and galleys.
    #[serde(default = "default_spool_dir")]
    pub spool_dir: PathBuf,
    /// Path of the durable progress snapshot file.
    #[serde(default = "default_progress_path")]
    pub progress_path: PathBuf,
    /// How often to poll the conversion service (milliseconds).
    #[serde(default = "default_poll_interval")]
    pub poll_interval_ms: u64,
    /// Give up polling a single job after this long (milliseconds).
    #[serde(default = "default_poll_timeout")]
    pub poll_timeout_ms: u64,
    /// Pause after a failed item before starting the next (milliseconds).
    #[serde(default = "default_failure_pause")]
    pub failure_pause_ms: u64,
    /// Conversion target for batch items. Batch runs regenerate full
    /// galleys; interactive triggers pick their own target per request.
    #[serde(default = "default_batch_target")]
    pub batch_target: TargetOperation,
}

impl Default for BatchSectionConfig {
    fn default() -> Self {
        Self {
            spool_dir: default_spool_dir(),
            progress_path: default_progress_path(),
            poll_interval_ms: default_poll_interval(),
            poll_timeout_ms: default_poll_timeout(),
            failure_pause_ms: default_failure_pause(),
            batch_target: default_batch_target(),
        }
    }
}

fn default_spool_dir() -> PathBuf {
    PathBuf::from("spool")
}

fn default_progress_path() -> PathBuf {
    PathBuf::from("batch-progress.json")
}

fn default_poll_interval() -> u64 {
    3000 // 3 seconds
}

fn default_poll_timeout() -> u64 {
    600_000 // 10 minutes
}

fn default_failure_pause() -> u64 {
    5000 // 5 seconds
}

fn default_batch_target() -> TargetOperation {
    TargetOperation::GalleyGenerate
}

/// Sanitized config for API responses (secrets redacted)
#[derive(Debug, Clone, Serialize)]
pub struct SanitizedConfig {
    pub auth: SanitizedAuthConfig,
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ots: Option<SanitizedOtsConfig>,
    pub batch: BatchSectionConfig,
}

#[derive(Debug, Clone, Serialize)]
pub struct SanitizedAuthConfig {
    pub method: String,
    pub api_key_configured: bool,
    pub batch_access_key_configured: bool,
}

/// Sanitized OTS config (credentials hidden)
#[derive(Debug, Clone, Serialize)]
pub struct SanitizedOtsConfig {
    pub url: String,
    pub username: String,
    pub password_configured: bool,
    pub timeout_secs: u32,
}

impl From<&Config> for SanitizedConfig {
    fn from(config: &Config) -> Self {
        Self {
            auth: SanitizedAuthConfig {
                method: match config.auth.method {
                    AuthMethod::None => "none".to_string(),
                    AuthMethod::ApiKey => "api_key".to_string(),
                },
                api_key_configured: config
                    .auth
                    .api_key
                    .as_ref()
                    .is_some_and(|k| !k.is_empty()),
                batch_access_key_configured: config
                    .auth
                    .batch_access_key
                    .as_ref()
                    .is_some_and(|k| !k.is_empty()),
            },
            server: config.server.clone(),
            database: config.database.clone(),
            ots: config.ots.as_ref().map(|o| SanitizedOtsConfig {
                url: o.url.clone(),
                username: o.username.clone(),
                password_configured: !o.password.is_empty(),
                timeout_secs: o.timeout_secs,
            }),
            batch: config.batch.clone(),
        }
    }
}
