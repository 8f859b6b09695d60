use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

const APP_DIR: &str = ".itemcat";

/// Upper bound for password reset tokens: 30 days.
pub const MAX_RESET_TTL_SECS: u64 = 30 * 24 * 3600;

fn app_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_DIR)
}

/// Default location of the daemon's config file, `~/.itemcat/config.json`.
pub fn default_config_path() -> PathBuf {
    app_dir().join("config.json")
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub version: String,
    #[serde(default = "default_database_path")]
    pub database_path: String,
    /// Where queued upload files wait until the pipeline picks them up.
    #[serde(default = "default_upload_directory")]
    pub upload_directory: String,
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    #[serde(default = "default_password_reset_ttl_secs")]
    pub password_reset_ttl_secs: u64,
    /// Seed the default categories and sample items on startup.
    #[serde(default = "default_true")]
    pub seed_defaults: bool,
    #[serde(default = "default_page_size")]
    pub default_page_size: u64,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn password_reset_ttl(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.password_reset_ttl_secs.min(MAX_RESET_TTL_SECS) as i64)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            version: "1.0".to_string(),
            database_path: default_database_path(),
            upload_directory: default_upload_directory(),
            poll_interval_ms: default_poll_interval_ms(),
            password_reset_ttl_secs: default_password_reset_ttl_secs(),
            seed_defaults: true,
            default_page_size: default_page_size(),
            logging: LoggingConfig::default(),
        }
    }
}

fn default_database_path() -> String {
    app_dir()
        .join("data")
        .join("itemcat.db")
        .to_string_lossy()
        .into_owned()
}

fn default_upload_directory() -> String {
    app_dir().join("uploads").to_string_lossy().into_owned()
}

fn default_poll_interval_ms() -> u64 {
    2000
}

fn default_password_reset_ttl_secs() -> u64 {
    3600
}

fn default_true() -> bool {
    true
}

fn default_page_size() -> u64 {
    20
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Filter directive, e.g. `info` or `itemcat=debug,warn`.
    #[serde(default = "default_level")]
    pub level: String,
    #[serde(default)]
    pub format: LogFormat,
}

fn default_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_level(),
            format: LogFormat::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}
