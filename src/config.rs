//! Service configuration.
//!
//! Configuration can be loaded from:
//! 1. TOML file (`reminders.toml`, or the path passed on the command line)
//! 2. Environment variables (with `REMINDERS_` prefix)
//!
//! Environment variables override TOML configuration.
//!
//! # Example TOML Configuration
//!
//! ```toml
//! [reminders]
//! interval_secs = 120
//! concurrency_limit = 8
//! single_reminder = false
//!
//! [reminders.storage]
//! backend = "fs"
//! path = "./data"
//!
//! [reminders.fcm]
//! project_id = "my-todo-app"
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::constants::{
    DEFAULT_CONCURRENCY_LIMIT, DEFAULT_INTERVAL_SECS, DEFAULT_PAGE_SIZE, DEFAULT_SEND_TIMEOUT_MS,
};
use crate::dispatcher::DispatchConfig;
use crate::transport::fcm::DEFAULT_FCM_ENDPOINT;

/// Default configuration file name.
pub const DEFAULT_CONFIG_FILE: &str = "reminders.toml";

/// Top-level reminder service configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReminderConfig {
    /// Seconds between scheduled runs.
    pub interval_secs: u64,

    /// Maximum concurrent lookups + sends per run.
    pub concurrency_limit: usize,

    /// Due tasks requested per query page.
    pub page_size: usize,

    /// Per-send deadline in milliseconds.
    pub send_timeout_ms: u64,

    /// Remind once per `remindAt` instead of every run.
    pub single_reminder: bool,

    /// Reject overlapping runs.
    pub serialize_runs: bool,

    /// Log notifications instead of sending them.
    pub dry_run: bool,

    /// Document storage settings.
    pub storage: StorageConfig,

    /// Firebase Cloud Messaging settings.
    pub fcm: FcmConfig,
}

impl Default for ReminderConfig {
    fn default() -> Self {
        Self {
            interval_secs: DEFAULT_INTERVAL_SECS,
            concurrency_limit: DEFAULT_CONCURRENCY_LIMIT,
            page_size: DEFAULT_PAGE_SIZE,
            send_timeout_ms: DEFAULT_SEND_TIMEOUT_MS,
            single_reminder: false,
            serialize_runs: true,
            dry_run: false,
            storage: StorageConfig::default(),
            fcm: FcmConfig::default(),
        }
    }
}

/// Which document backend to use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageKind {
    /// Process-local; contents are lost on exit.
    Memory,
    /// One JSON file per document under [`StorageConfig::path`].
    Fs,
}

/// Storage configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Backend selection.
    pub backend: StorageKind,

    /// Root directory for the `fs` backend.
    pub path: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageKind::Fs,
            path: PathBuf::from("./data"),
        }
    }
}

/// FCM HTTP v1 configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FcmConfig {
    /// Base URL of the FCM API.
    pub endpoint: String,

    /// Firebase project id.
    pub project_id: String,

    /// OAuth2 bearer token. Prefer `REMINDERS_FCM_ACCESS_TOKEN` over the file.
    ///
    /// FCM HTTP v1 only accepts short-lived OAuth2 access tokens (about one
    /// hour). The token is read once at startup and never refreshed, so a
    /// long-running `serve` gets `401` rejections once it expires; restart
    /// the service with a fresh token, or run `run-once` from an external
    /// scheduler that mints a token per invocation.
    #[serde(skip_serializing)]
    pub access_token: Option<String>,

    /// HTTP request timeout in milliseconds.
    pub request_timeout_ms: u64,
}

impl Default for FcmConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_FCM_ENDPOINT.to_string(),
            project_id: String::new(),
            access_token: None,
            request_timeout_ms: DEFAULT_SEND_TIMEOUT_MS,
        }
    }
}

impl ReminderConfig {
    /// Load configuration from environment and the default file.
    ///
    /// Priority (highest to lowest):
    /// 1. Environment variables
    /// 2. TOML configuration file
    /// 3. Default values
    pub fn load() -> Result<Self, ConfigError> {
        let mut config = match std::fs::read_to_string(DEFAULT_CONFIG_FILE) {
            Ok(contents) => Self::from_toml(&contents)?,
            Err(_) => Self::default(),
        };
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a specific file path.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let mut config = Self::from_toml(&contents)?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Parse configuration from TOML content.
    ///
    /// A missing `[reminders]` table yields the defaults.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        #[derive(Deserialize)]
        struct FullConfig {
            #[serde(default)]
            reminders: ReminderConfig,
        }

        let full: FullConfig =
            toml::from_str(content).map_err(|e| ConfigError::Parse(e.to_string()))?;
        Ok(full.reminders)
    }

    fn apply_env_overrides(&mut self) {
        self.apply_overrides(|name| std::env::var(name).ok());
    }

    /// Applies `REMINDERS_*` overrides read through `lookup`.
    ///
    /// Values that fail to parse are ignored.
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        fn parsed<T: std::str::FromStr>(value: Option<String>) -> Option<T> {
            value.and_then(|v| v.trim().parse().ok())
        }

        if let Some(v) = parsed(lookup("REMINDERS_INTERVAL_SECS")) {
            self.interval_secs = v;
        }
        if let Some(v) = parsed(lookup("REMINDERS_CONCURRENCY_LIMIT")) {
            self.concurrency_limit = v;
        }
        if let Some(v) = parsed(lookup("REMINDERS_PAGE_SIZE")) {
            self.page_size = v;
        }
        if let Some(v) = parsed(lookup("REMINDERS_SEND_TIMEOUT_MS")) {
            self.send_timeout_ms = v;
        }
        if let Some(v) = parsed(lookup("REMINDERS_SINGLE_REMINDER")) {
            self.single_reminder = v;
        }
        if let Some(v) = parsed(lookup("REMINDERS_SERIALIZE_RUNS")) {
            self.serialize_runs = v;
        }
        if let Some(v) = parsed(lookup("REMINDERS_DRY_RUN")) {
            self.dry_run = v;
        }

        // Storage
        match lookup("REMINDERS_STORAGE_BACKEND").as_deref().map(str::trim) {
            Some("memory") => self.storage.backend = StorageKind::Memory,
            Some("fs") => self.storage.backend = StorageKind::Fs,
            _ => {},
        }
        if let Some(path) = lookup("REMINDERS_STORAGE_PATH") {
            self.storage.path = PathBuf::from(path);
        }

        // FCM
        if let Some(endpoint) = lookup("REMINDERS_FCM_ENDPOINT") {
            self.fcm.endpoint = endpoint;
        }
        if let Some(project_id) = lookup("REMINDERS_FCM_PROJECT_ID") {
            self.fcm.project_id = project_id;
        }
        if let Some(token) = lookup("REMINDERS_FCM_ACCESS_TOKEN") {
            self.fcm.access_token = Some(token);
        }
        if let Some(v) = parsed(lookup("REMINDERS_FCM_REQUEST_TIMEOUT_MS")) {
            self.fcm.request_timeout_ms = v;
        }
    }

    /// Rejects settings the service cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.interval_secs == 0 {
            return Err(ConfigError::Invalid {
                field: "interval_secs",
                reason: "must be greater than zero".to_string(),
            });
        }
        if self.concurrency_limit == 0 {
            return Err(ConfigError::Invalid {
                field: "concurrency_limit",
                reason: "must be greater than zero".to_string(),
            });
        }
        if self.page_size == 0 {
            return Err(ConfigError::Invalid {
                field: "page_size",
                reason: "must be greater than zero".to_string(),
            });
        }
        if self.send_timeout_ms == 0 {
            return Err(ConfigError::Invalid {
                field: "send_timeout_ms",
                reason: "must be greater than zero".to_string(),
            });
        }
        Ok(())
    }

    /// Scheduler period.
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    /// Dispatcher settings derived from this configuration.
    pub fn dispatch_config(&self) -> DispatchConfig {
        DispatchConfig {
            concurrency_limit: self.concurrency_limit,
            page_size: self.page_size,
            send_timeout: Duration::from_millis(self.send_timeout_ms),
            single_reminder: self.single_reminder,
            serialize_runs: self.serialize_runs,
        }
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// IO error reading the configuration file.
    #[error("failed to read config file '{path}': {source}")]
    Io {
        /// Path to the configuration file.
        path: String,
        /// Underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// The file is not valid TOML for this schema.
    #[error("failed to parse config: {0}")]
    Parse(String),

    /// A setting is out of range.
    #[error("invalid config value for {field}: {reason}")]
    Invalid {
        /// Offending field.
        field: &'static str,
        /// What is wrong with it.
        reason: String,
    },
}
