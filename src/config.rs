use crate::domain::MatchType;
use clap::{Args, Parser, ValueEnum};
use serde::{Deserialize, Serialize};
use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Clone, Debug, Parser)]
#[command(version, about, long_about = None)]
pub struct Config {
    /// JSON settings file (receiver, message expiry, sweep interval)
    #[arg(long, env = "SHADOW_RELAY_SETTINGS_PATH", default_value = "config.json")]
    pub settings_path: PathBuf,

    /// Directory media payloads are materialized into. Cleared on startup.
    #[arg(long, env = "SHADOW_RELAY_DOWNLOAD_DIR", default_value = "downloads")]
    pub download_dir: PathBuf,

    /// JSON contact list served by the local transport
    #[arg(long, env = "SHADOW_RELAY_CONTACTS_PATH")]
    pub contacts_path: Option<PathBuf>,

    /// How long to wait for background tasks on shutdown
    #[arg(long, env = "SHADOW_RELAY_SHUTDOWN_TIMEOUT_SECS", default_value_t = 5)]
    pub shutdown_timeout_secs: u64,

    #[command(flatten)]
    pub telemetry: TelemetryConfig,
}

#[derive(Clone, Debug, Args)]
pub struct TelemetryConfig {
    /// Log output format
    #[arg(long, env = "SHADOW_RELAY_LOG_FORMAT", value_enum, default_value_t = LogFormat::Text)]
    pub log_format: LogFormat,

    /// OTLP collector endpoint; traces and metrics are exported only when set
    #[arg(long, env = "SHADOW_RELAY_OTLP_ENDPOINT")]
    pub otlp_endpoint: Option<String>,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

impl Config {
    #[must_use]
    pub fn load() -> Self {
        Self::parse()
    }
}

const DEFAULT_MESSAGE_EXPIRE_SECS: u64 = 120;
const DEFAULT_CLEANUP_INTERVAL_SECS: u64 = 2;
const DEFAULT_RECEIVER_NAME: &str = "文件传输助手";

#[derive(Error, Debug)]
pub enum SettingsError {
    #[error("Settings file I/O failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("Settings file is not valid JSON: {0}")]
    Parse(#[from] serde_json::Error),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReceiverSettings {
    #[serde(rename = "type", default)]
    pub match_type: MatchType,
    #[serde(default = "default_receiver_name")]
    pub name: String,
}

impl Default for ReceiverSettings {
    fn default() -> Self {
        Self { match_type: MatchType::default(), name: default_receiver_name() }
    }
}

/// Plugin settings as stored in the JSON settings file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub receiver: ReceiverSettings,

    /// Seconds a shadow record is kept before the sweeper evicts it
    #[serde(rename = "message_expire_time", default = "default_message_expire_secs")]
    pub message_expire_secs: u64,

    /// Seconds between the end of one sweep and the start of the next
    #[serde(rename = "cleanup_interval", default = "default_cleanup_interval_secs")]
    pub cleanup_interval_secs: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            receiver: ReceiverSettings::default(),
            message_expire_secs: DEFAULT_MESSAGE_EXPIRE_SECS,
            cleanup_interval_secs: DEFAULT_CLEANUP_INTERVAL_SECS,
        }
    }
}

fn default_receiver_name() -> String {
    DEFAULT_RECEIVER_NAME.to_string()
}

const fn default_message_expire_secs() -> u64 {
    DEFAULT_MESSAGE_EXPIRE_SECS
}

const fn default_cleanup_interval_secs() -> u64 {
    DEFAULT_CLEANUP_INTERVAL_SECS
}

impl Settings {
    #[must_use]
    pub fn message_ttl(&self) -> time::Duration {
        time::Duration::seconds(i64::try_from(self.message_expire_secs).unwrap_or(i64::MAX))
    }

    #[must_use]
    pub fn cleanup_interval(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.cleanup_interval_secs.max(1))
    }

    /// Loads settings, falling back to defaults on any failure.
    #[must_use]
    pub fn load_or_init(path: &Path) -> Self {
        match Self::try_load(path) {
            Ok(settings) => {
                tracing::info!(path = %path.display(), settings = ?settings, "Loaded settings");
                settings
            }
            Err(e) => {
                tracing::error!(error = %e, path = %path.display(), "Failed to load settings, using defaults");
                Self::default()
            }
        }
    }

    /// Reads `path`; if it does not exist, reads `<path>.template`; if neither
    /// exists, writes the defaults to `path` and returns them.
    ///
    /// # Errors
    /// Returns an error if a file exists but cannot be read or parsed, or if
    /// the defaults cannot be written.
    pub fn try_load(path: &Path) -> Result<Self, SettingsError> {
        if path.exists() {
            return Self::read(path);
        }

        let template = template_path(path);
        if template.exists() {
            tracing::debug!(path = %template.display(), "No settings file, using template");
            return Self::read(&template);
        }

        let defaults = Self::default();
        defaults.save(path)?;
        tracing::info!(path = %path.display(), "Wrote default settings");
        Ok(defaults)
    }

    /// # Errors
    /// Returns an error if the file cannot be written.
    pub fn save(&self, path: &Path) -> Result<(), SettingsError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)?;
        Ok(())
    }

    fn read(path: &Path) -> Result<Self, SettingsError> {
        let content = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }
}

fn template_path(path: &Path) -> PathBuf {
    let mut name = OsString::from(path.as_os_str());
    name.push(".template");
    PathBuf::from(name)
}
