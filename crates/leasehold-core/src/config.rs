//! Configuration module for leasehold.
//!
//! Provides typed configuration structs that map to the YAML configuration file,
//! with loading, validation, defaults, and a builder pattern for programmatic use.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::domain::newtypes::DEFAULT_TTL_SECS;

/// Environment variable that overrides `storage.path`
pub const DB_PATH_ENV: &str = "DB_PATH";

// ---------------------------------------------------------------------------
// Config struct with sub-sections
// ---------------------------------------------------------------------------

/// Top-level configuration for leasehold.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub storage: StorageConfig,
    pub server: ServerConfig,
    pub reaper: ReaperConfig,
    pub audit: AuditConfig,
    pub logging: LoggingConfig,
}

/// Durable store settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Path of the SQLite database file.
    pub path: PathBuf,
}

/// HTTP API settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Socket address to bind, e.g. `127.0.0.1:8000`.
    pub listen: String,
    /// TTL in seconds used when a request omits `ttl`.
    pub default_ttl: i64,
}

/// Background expiry reaper settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReaperConfig {
    /// Seconds between reaper passes.
    pub interval_secs: u64,
}

/// What the audit worker does when persisting an event fails.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PersistFailurePolicy {
    /// Log a warning, drop the event, keep consuming.
    #[default]
    Drop,
    /// Log an error and stop the worker.
    Halt,
}

/// Audit trail settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuditConfig {
    /// Maximum number of events retained in the store.
    pub max_log_entries: u64,
    /// Milliseconds the worker waits on an empty queue before re-checking
    /// for shutdown.
    pub poll_interval_ms: u64,
    /// Number of events returned by the log view.
    pub log_page_size: u32,
    /// Behaviour on a failed event insert.
    pub on_persist_error: PersistFailurePolicy,
}

/// Logging / tracing settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level: `trace`, `debug`, `info`, `warn`, or `error`.
    pub level: String,
    /// Emit JSON lines instead of human-readable output.
    pub json: bool,
}

// ---------------------------------------------------------------------------
// Config::load()
// ---------------------------------------------------------------------------

impl Config {
    /// Load configuration from a YAML file at `path`.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = serde_yaml::from_str(&content)?;
        Ok(config)
    }

    /// Try to load from `path`; fall back to [`Config::default`] on any error.
    pub fn load_or_default(path: &Path) -> Self {
        match Self::load(path) {
            Ok(config) => config,
            Err(e) => {
                tracing::debug!(path = %path.display(), error = %e, "Using default configuration");
                Self::default()
            }
        }
    }

    /// Platform-appropriate default path for the configuration file.
    ///
    /// Typically `$XDG_CONFIG_HOME/leasehold/config.yaml` on Linux.
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("~/.config"))
            .join("leasehold")
            .join("config.yaml")
    }

    /// Applies environment overrides (`DB_PATH`) on top of the loaded values.
    pub fn with_env_overrides(mut self) -> Self {
        if let Some(path) = std::env::var_os(DB_PATH_ENV).filter(|p| !p.is_empty()) {
            self.storage.path = PathBuf::from(path);
        }
        self
    }

    /// Serialize back to YAML.
    pub fn to_yaml(&self) -> anyhow::Result<String> {
        Ok(serde_yaml::to_string(self)?)
    }
}

// ---------------------------------------------------------------------------
// Defaults
// ---------------------------------------------------------------------------

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            path: dirs::data_local_dir()
                .unwrap_or_else(|| PathBuf::from("~/.local/share"))
                .join("leasehold")
                .join("locks.db"),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen: "127.0.0.1:8000".to_string(),
            default_ttl: DEFAULT_TTL_SECS,
        }
    }
}

impl Default for ReaperConfig {
    fn default() -> Self {
        Self { interval_secs: 10 }
    }
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            max_log_entries: 1000,
            poll_interval_ms: 1000,
            log_page_size: 100,
            on_persist_error: PersistFailurePolicy::Drop,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

// ---------------------------------------------------------------------------
// Config::validate()
// ---------------------------------------------------------------------------

/// A single validation error found in the configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// Dotted path to the offending field, e.g. `"reaper.interval_secs"`.
    pub field: String,
    /// Human-readable explanation.
    pub message: String,
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Valid values for `logging.level`.
const VALID_LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

impl Config {
    /// Validate the configuration and return all errors found.
    ///
    /// An empty vector means the configuration is valid.
    pub fn validate(&self) -> Vec<ValidationError> {
        let mut errors = Vec::new();

        // --- storage ---
        if self.storage.path.as_os_str().is_empty() {
            errors.push(ValidationError {
                field: "storage.path".into(),
                message: "must not be empty".into(),
            });
        }

        // --- server ---
        if self.server.listen.parse::<std::net::SocketAddr>().is_err() {
            errors.push(ValidationError {
                field: "server.listen".into(),
                message: format!("not a socket address: '{}'", self.server.listen),
            });
        }
        if self.server.default_ttl < 1 {
            errors.push(ValidationError {
                field: "server.default_ttl".into(),
                message: "must be at least 1".into(),
            });
        }

        // --- reaper ---
        if self.reaper.interval_secs == 0 {
            errors.push(ValidationError {
                field: "reaper.interval_secs".into(),
                message: "must be greater than 0".into(),
            });
        }

        // --- audit ---
        if self.audit.max_log_entries == 0 {
            errors.push(ValidationError {
                field: "audit.max_log_entries".into(),
                message: "must be greater than 0".into(),
            });
        }
        if self.audit.poll_interval_ms == 0 {
            errors.push(ValidationError {
                field: "audit.poll_interval_ms".into(),
                message: "must be greater than 0".into(),
            });
        }
        if self.audit.log_page_size == 0 {
            errors.push(ValidationError {
                field: "audit.log_page_size".into(),
                message: "must be greater than 0".into(),
            });
        }

        // --- logging ---
        if !VALID_LOG_LEVELS.contains(&self.logging.level.as_str()) {
            errors.push(ValidationError {
                field: "logging.level".into(),
                message: format!(
                    "invalid level '{}'; valid options: {}",
                    self.logging.level,
                    VALID_LOG_LEVELS.join(", ")
                ),
            });
        }

        errors
    }
}

// ---------------------------------------------------------------------------
// ConfigBuilder
// ---------------------------------------------------------------------------

/// Builder for constructing a [`Config`] programmatically.
///
/// Starts from [`Config::default`] and allows selective overrides.
///
/// # Example
///
/// ```rust
/// use leasehold_core::config::ConfigBuilder;
/// use std::path::PathBuf;
///
/// let config = ConfigBuilder::new()
///     .storage_path(PathBuf::from("/var/lib/leasehold/locks.db"))
///     .audit_max_log_entries(500)
///     .logging_level("debug")
///     .build();
/// assert_eq!(config.audit.max_log_entries, 500);
/// ```
#[derive(Debug, Clone)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Create a new builder initialised with [`Config::default`] values.
    pub fn new() -> Self {
        Self {
            config: Config::default(),
        }
    }

    // --- storage ---

    pub fn storage_path(mut self, path: PathBuf) -> Self {
        self.config.storage.path = path;
        self
    }

    // --- server ---

    pub fn server_listen(mut self, listen: impl Into<String>) -> Self {
        self.config.server.listen = listen.into();
        self
    }

    pub fn server_default_ttl(mut self, seconds: i64) -> Self {
        self.config.server.default_ttl = seconds;
        self
    }

    // --- reaper ---

    pub fn reaper_interval_secs(mut self, seconds: u64) -> Self {
        self.config.reaper.interval_secs = seconds;
        self
    }

    // --- audit ---

    pub fn audit_max_log_entries(mut self, n: u64) -> Self {
        self.config.audit.max_log_entries = n;
        self
    }

    pub fn audit_poll_interval_ms(mut self, ms: u64) -> Self {
        self.config.audit.poll_interval_ms = ms;
        self
    }

    pub fn audit_log_page_size(mut self, n: u32) -> Self {
        self.config.audit.log_page_size = n;
        self
    }

    pub fn audit_on_persist_error(mut self, policy: PersistFailurePolicy) -> Self {
        self.config.audit.on_persist_error = policy;
        self
    }

    // --- logging ---

    pub fn logging_level(mut self, level: impl Into<String>) -> Self {
        self.config.logging.level = level.into();
        self
    }

    pub fn logging_json(mut self, json: bool) -> Self {
        self.config.logging.json = json;
        self
    }

    // --- build ---

    /// Consume the builder and return the finished [`Config`].
    pub fn build(self) -> Config {
        self.config
    }
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
