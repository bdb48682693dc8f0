//! Configuration loading
//!
//! Settings are resolved in priority order:
//! 1. Command-line argument (highest priority)
//! 2. Environment variable
//! 3. TOML config file
//! 4. Compiled default (fallback)
//!
//! A missing or unreadable config file never aborts startup; a warning is
//! logged and compiled defaults are used.

use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};

use crate::{Error, Result};

/// Environment variable naming an explicit config file
pub const ENV_CONFIG: &str = "ISA_CONFIG";
/// Environment variable overriding the backend base URL
pub const ENV_BACKEND_URL: &str = "ISA_BACKEND_URL";
/// Environment variable carrying the bearer token
pub const ENV_AUTH_TOKEN: &str = "ISA_AUTH_TOKEN";

/// Configuration loaded from TOML
///
/// Every field has a default so an empty file (or no file) is valid.
#[derive(Debug, Clone, Deserialize)]
pub struct TomlConfig {
    /// Base URL of the inventory-reconciliation service
    #[serde(default = "default_backend_url")]
    pub backend_url: String,

    /// Bearer token (usually supplied through the environment instead)
    #[serde(default)]
    pub auth_token: Option<String>,

    /// Per-request timeout for backend calls
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,

    #[serde(default)]
    pub logging: LoggingConfig,

    #[serde(default)]
    pub scanner: ScannerConfig,

    #[serde(default)]
    pub dashboard: DashboardConfig,
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log file path (optional, logs to stderr if not specified)
    #[serde(default)]
    pub file: Option<PathBuf>,
}

/// Capture pipeline tuning
#[derive(Debug, Clone, Deserialize)]
pub struct ScannerConfig {
    /// Minimum interval between recognized-text frames that reach extraction
    #[serde(default = "default_throttle_interval_ms")]
    pub throttle_interval_ms: u64,

    /// Maximum identifiers per captured batch
    #[serde(default = "default_batch_cap")]
    pub batch_cap: usize,
}

/// Dashboard synchronizer tuning
#[derive(Debug, Clone, Deserialize)]
pub struct DashboardConfig {
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// Number of records kept in the live feed
    #[serde(default = "default_feed_capacity")]
    pub feed_capacity: usize,

    #[serde(default = "default_reconnect_initial_ms")]
    pub reconnect_initial_ms: u64,

    #[serde(default = "default_reconnect_max_ms")]
    pub reconnect_max_ms: u64,
}

fn default_backend_url() -> String {
    "http://127.0.0.1:8000".to_string()
}

fn default_request_timeout_ms() -> u64 {
    15_000
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_throttle_interval_ms() -> u64 {
    2_000
}

fn default_batch_cap() -> usize {
    5
}

fn default_poll_interval_ms() -> u64 {
    3_000
}

fn default_feed_capacity() -> usize {
    50
}

fn default_reconnect_initial_ms() -> u64 {
    1_000
}

fn default_reconnect_max_ms() -> u64 {
    30_000
}

impl Default for TomlConfig {
    fn default() -> Self {
        Self {
            backend_url: default_backend_url(),
            auth_token: None,
            request_timeout_ms: default_request_timeout_ms(),
            logging: LoggingConfig::default(),
            scanner: ScannerConfig::default(),
            dashboard: DashboardConfig::default(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            file: None,
        }
    }
}

impl Default for ScannerConfig {
    fn default() -> Self {
        Self {
            throttle_interval_ms: default_throttle_interval_ms(),
            batch_cap: default_batch_cap(),
        }
    }
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: default_poll_interval_ms(),
            feed_capacity: default_feed_capacity(),
            reconnect_initial_ms: default_reconnect_initial_ms(),
            reconnect_max_ms: default_reconnect_max_ms(),
        }
    }
}

impl ScannerConfig {
    pub fn throttle_interval(&self) -> Duration {
        Duration::from_millis(self.throttle_interval_ms)
    }
}

impl DashboardConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

impl TomlConfig {
    /// Parse and validate a TOML document
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: TomlConfig =
            toml::from_str(content).map_err(|e| Error::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a TOML file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Reject values that would stall the pipeline
    pub fn validate(&self) -> Result<()> {
        if self.backend_url.trim().is_empty() {
            return Err(Error::Config("backend_url must not be empty".to_string()));
        }
        if self.scanner.batch_cap == 0 {
            return Err(Error::Config("scanner.batch_cap must be at least 1".to_string()));
        }
        if self.dashboard.poll_interval_ms == 0 {
            return Err(Error::Config("dashboard.poll_interval_ms must be positive".to_string()));
        }
        if self.dashboard.feed_capacity == 0 {
            return Err(Error::Config("dashboard.feed_capacity must be at least 1".to_string()));
        }
        if self.dashboard.reconnect_initial_ms == 0
            || self.dashboard.reconnect_initial_ms > self.dashboard.reconnect_max_ms
        {
            return Err(Error::Config(
                "dashboard.reconnect_initial_ms must be positive and not exceed reconnect_max_ms"
                    .to_string(),
            ));
        }
        Ok(())
    }
}

/// Command-line overrides collected by the binaries
#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
    pub config_path: Option<PathBuf>,
    pub backend_url: Option<String>,
    pub auth_token: Option<String>,
    pub log_level: Option<String>,
}

/// Where the file layer of a resolved configuration came from
///
/// Resolution runs before the subscriber is installed, so the outcome is
/// kept here and logged with [`ConfigSource::report`] afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigSource {
    /// Values read from this file
    File(PathBuf),
    /// The file could not be used; compiled defaults were taken instead
    Fallback { path: PathBuf, reason: String },
    /// No config file was found
    Defaults,
}

impl ConfigSource {
    pub fn is_fallback(&self) -> bool {
        matches!(self, ConfigSource::Fallback { .. })
    }

    /// Log the outcome of the file lookup
    pub fn report(&self) {
        match self {
            ConfigSource::File(path) => info!("Loaded configuration from {}", path.display()),
            ConfigSource::Fallback { path, reason } => warn!(
                "Could not load config file {}: {}. Using defaults.",
                path.display(),
                reason
            ),
            ConfigSource::Defaults => info!("No config file found, using compiled defaults"),
        }
    }
}

/// Effective configuration plus the outcome of the file lookup
#[derive(Debug, Clone)]
pub struct Resolved {
    pub config: TomlConfig,
    pub source: ConfigSource,
}

/// Resolve the effective configuration
///
/// Config file: CLI path → `ISA_CONFIG` → platform locations.
/// Backend URL and token: CLI → environment → file → default.
pub fn resolve(cli: &CliOverrides) -> Resolved {
    let file_path = cli
        .config_path
        .clone()
        .or_else(|| std::env::var(ENV_CONFIG).ok().map(PathBuf::from))
        .or_else(default_config_path);

    let (mut config, source) = match file_path {
        Some(path) => match TomlConfig::load(&path) {
            Ok(config) => (config, ConfigSource::File(path)),
            Err(e) => (
                TomlConfig::default(),
                ConfigSource::Fallback {
                    path,
                    reason: e.to_string(),
                },
            ),
        },
        None => (TomlConfig::default(), ConfigSource::Defaults),
    };

    if let Some(url) = cli
        .backend_url
        .clone()
        .or_else(|| non_empty_env(ENV_BACKEND_URL))
    {
        config.backend_url = url;
    }

    if let Some(token) = cli
        .auth_token
        .clone()
        .or_else(|| non_empty_env(ENV_AUTH_TOKEN))
    {
        config.auth_token = Some(token);
    }

    if let Some(level) = &cli.log_level {
        config.logging.level = level.clone();
    }

    Resolved { config, source }
}

fn non_empty_env(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

/// First existing config file among the platform locations
///
/// Linux checks `~/.config/isa/config.toml` then `/etc/isa/config.toml`;
/// other platforms only check the user config directory.
pub fn default_config_path() -> Option<PathBuf> {
    let user_config = dirs::config_dir().map(|d| d.join("isa").join("config.toml"));
    if let Some(path) = user_config {
        if path.exists() {
            return Some(path);
        }
    }

    if cfg!(target_os = "linux") {
        let system_config = PathBuf::from("/etc/isa/config.toml");
        if system_config.exists() {
            return Some(system_config);
        }
    }

    None
}
