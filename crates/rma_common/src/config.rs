//! Engine configuration v0.6.0 - rmad runtime settings
//!
//! Configuration lives in /etc/rma/config.toml. Every section and every
//! field has a default, so a missing or partial file always yields a
//! runnable daemon. The assignment and SLA rules live in their own file
//! (see `rules`), reloadable without touching daemon settings.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// System configuration directory
pub const SYSTEM_CONFIG_DIR: &str = "/etc/rma";
const CONFIG_FILE: &str = "config.toml";
const RULES_FILE: &str = "rules.toml";

/// Engine data directory (case database)
pub const DATA_DIR: &str = "/var/lib/rma";

/// HTTP server settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Bind address for the HTTP API
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,
}

fn default_bind_addr() -> String {
    "127.0.0.1:7171".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: default_bind_addr(),
        }
    }
}

/// Case store settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// SQLite database file
    #[serde(default = "default_database_path")]
    pub database: PathBuf,

    /// Keep all cases in memory instead of SQLite. Nothing survives a
    /// restart; meant for tests and local experiments.
    #[serde(default)]
    pub in_memory: bool,
}

fn default_database_path() -> PathBuf {
    PathBuf::from(DATA_DIR).join("cases.db")
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            database: default_database_path(),
            in_memory: false,
        }
    }
}

/// Deadline sweep settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SweepConfig {
    /// Whether the background deadline sweep runs at all
    #[serde(default = "default_sweep_enabled")]
    pub enabled: bool,

    /// Seconds between sweep cycles (valid: 10-3600)
    #[serde(default = "default_sweep_interval")]
    pub interval_secs: u64,

    /// Per-case escalation budget in milliseconds (valid: 100-30000).
    /// A case that exceeds it is skipped until the next cycle.
    #[serde(default = "default_case_timeout_ms")]
    pub case_timeout_ms: u64,
}

fn default_sweep_enabled() -> bool {
    true
}

fn default_sweep_interval() -> u64 {
    300 // 5 minutes
}

fn default_case_timeout_ms() -> u64 {
    2000 // 2 seconds
}

impl SweepConfig {
    /// Validate and clamp interval_secs to valid range (10-3600)
    pub fn effective_interval_secs(&self) -> u64 {
        self.interval_secs.clamp(10, 3600)
    }

    /// Validate and clamp case_timeout_ms to valid range (100-30000)
    pub fn effective_case_timeout_ms(&self) -> u64 {
        self.case_timeout_ms.clamp(100, 30_000)
    }
}

impl Default for SweepConfig {
    fn default() -> Self {
        Self {
            enabled: default_sweep_enabled(),
            interval_secs: default_sweep_interval(),
            case_timeout_ms: default_case_timeout_ms(),
        }
    }
}

/// Where workflow events get delivered
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum NotifierMode {
    /// Structured log lines only
    #[default]
    Log,
    /// POST each event to `webhook_url` as JSON
    Webhook,
}

impl NotifierMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotifierMode::Log => "log",
            NotifierMode::Webhook => "webhook",
        }
    }
}

/// Notification settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotifierConfig {
    #[serde(default)]
    pub mode: NotifierMode,

    /// Target for webhook mode; ignored in log mode
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub webhook_url: Option<String>,

    /// Delivery attempts per event (valid: 1-10)
    #[serde(default = "default_retry_limit")]
    pub retry_limit: u32,

    /// Per-attempt HTTP timeout in seconds (valid: 1-60)
    #[serde(default = "default_notify_timeout")]
    pub timeout_secs: u64,
}

fn default_retry_limit() -> u32 {
    3
}

fn default_notify_timeout() -> u64 {
    5
}

impl NotifierConfig {
    /// Validate and clamp retry_limit to valid range (1-10)
    pub fn effective_retry_limit(&self) -> u32 {
        self.retry_limit.clamp(1, 10)
    }

    /// Validate and clamp timeout_secs to valid range (1-60)
    pub fn effective_timeout_secs(&self) -> u64 {
        self.timeout_secs.clamp(1, 60)
    }
}

impl Default for NotifierConfig {
    fn default() -> Self {
        Self {
            mode: NotifierMode::Log,
            webhook_url: None,
            retry_limit: default_retry_limit(),
            timeout_secs: default_notify_timeout(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

/// Complete engine configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct EngineConfig {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub store: StoreConfig,

    #[serde(default)]
    pub sweep: SweepConfig,

    #[serde(default)]
    pub notifier: NotifierConfig,

    #[serde(default)]
    pub log: LogConfig,

    /// Assignment and SLA rules file; built-in defaults apply when the
    /// file does not exist
    #[serde(default = "default_rules_path")]
    pub rules_path: PathBuf,
}

fn default_rules_path() -> PathBuf {
    PathBuf::from(SYSTEM_CONFIG_DIR).join(RULES_FILE)
}

impl EngineConfig {
    /// Load from the system config path, falling back to defaults when the
    /// file is missing or unreadable
    pub fn load() -> Self {
        let system_path = config_path();
        if system_path.exists() {
            if let Ok(content) = fs::read_to_string(&system_path) {
                if let Ok(config) = toml::from_str(&content) {
                    return config;
                }
            }
        }
        Self::default()
    }

    /// Load from an explicit path; errors are reported rather than masked
    pub fn load_path(path: &Path) -> anyhow::Result<Self> {
        use anyhow::Context;
        let content = fs::read_to_string(path)
            .with_context(|| format!("failed to read config {}", path.display()))?;
        let config: Self = toml::from_str(&content)
            .with_context(|| format!("failed to parse config {}", path.display()))?;
        Ok(config)
    }

    /// Write the config as TOML, creating parent directories as needed
    pub fn save(&self, path: &Path) -> anyhow::Result<()> {
        use anyhow::Context;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }
        let content = toml::to_string_pretty(self).context("failed to serialize config")?;
        fs::write(path, content)
            .with_context(|| format!("failed to write config {}", path.display()))?;
        Ok(())
    }
}

/// Get the config file path
pub fn config_path() -> PathBuf {
    PathBuf::from(SYSTEM_CONFIG_DIR).join(CONFIG_FILE)
}

/// Get the data directory
pub fn data_dir() -> PathBuf {
    PathBuf::from(DATA_DIR)
}
