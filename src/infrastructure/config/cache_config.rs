//! Cache configuration.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::infrastructure::image::disk_cache::default_cache_dir;
use crate::infrastructure::image::memory_cache::DEFAULT_MEMORY_FRACTION;

pub(crate) const APP_NAME: &str = "imgcache";
pub(crate) const APP_QUALIFIER: &str = "com";
pub(crate) const APP_ORGANIZATION: &str = "linuxmobile";

/// Log level configuration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Trace level.
    Trace,
    /// Debug level.
    Debug,
    /// Info level.
    #[default]
    Info,
    /// Warning level.
    Warn,
    /// Error level.
    Error,
}

impl LogLevel {
    /// Converts to tracing level.
    #[must_use]
    pub const fn to_tracing_level(self) -> tracing::Level {
        match self {
            Self::Trace => tracing::Level::TRACE,
            Self::Debug => tracing::Level::DEBUG,
            Self::Info => tracing::Level::INFO,
            Self::Warn => tracing::Level::WARN,
            Self::Error => tracing::Level::ERROR,
        }
    }
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Trace => write!(f, "trace"),
            Self::Debug => write!(f, "debug"),
            Self::Info => write!(f, "info"),
            Self::Warn => write!(f, "warn"),
            Self::Error => write!(f, "error"),
        }
    }
}

/// What gets written to the disk tier after a download.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PersistFormat {
    /// The bytes exactly as downloaded.
    #[default]
    Original,
    /// The decoded image re-encoded as PNG.
    Png,
}

/// Cache configuration, usually loaded from `config.toml`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Disk cache directory. Defaults to the platform cache directory.
    #[serde(default)]
    pub cache_dir: Option<PathBuf>,

    /// Fraction of available memory given to decoded images.
    #[serde(default = "default_memory_fraction")]
    pub memory_fraction: f64,

    /// Explicit memory budget in bytes; overrides `memory_fraction`.
    #[serde(default)]
    pub memory_budget_bytes: Option<u64>,

    /// TCP connect timeout for downloads, in milliseconds.
    #[serde(default = "default_timeout_ms")]
    pub connect_timeout_ms: u64,

    /// Per-read timeout for downloads, in milliseconds.
    #[serde(default = "default_timeout_ms")]
    pub read_timeout_ms: u64,

    /// User agent sent with downloads.
    #[serde(default)]
    pub user_agent: Option<String>,

    /// What to store on disk after a download.
    #[serde(default)]
    pub persist_format: PersistFormat,

    /// Log verbosity level.
    #[serde(default)]
    pub log_level: LogLevel,

    /// Log file path. Logs go to stderr when unset.
    #[serde(default)]
    pub log_path: Option<PathBuf>,
}

impl CacheConfig {
    /// Returns the effective disk cache directory.
    #[must_use]
    pub fn effective_cache_dir(&self) -> PathBuf {
        self.cache_dir.clone().unwrap_or_else(default_cache_dir)
    }

    /// Returns the connect timeout.
    #[must_use]
    pub const fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    /// Returns the read timeout.
    #[must_use]
    pub const fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms)
    }

    /// Sets the disk cache directory.
    #[must_use]
    pub fn with_cache_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cache_dir = Some(dir.into());
        self
    }

    /// Sets an explicit memory budget.
    #[must_use]
    pub const fn with_memory_budget(mut self, bytes: u64) -> Self {
        self.memory_budget_bytes = Some(bytes);
        self
    }

    /// Sets the disk persistence format.
    #[must_use]
    pub const fn with_persist_format(mut self, format: PersistFormat) -> Self {
        self.persist_format = format;
        self
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            cache_dir: None,
            memory_fraction: DEFAULT_MEMORY_FRACTION,
            memory_budget_bytes: None,
            connect_timeout_ms: default_timeout_ms(),
            read_timeout_ms: default_timeout_ms(),
            user_agent: None,
            persist_format: PersistFormat::default(),
            log_level: LogLevel::Info,
            log_path: None,
        }
    }
}

const fn default_memory_fraction() -> f64 {
    DEFAULT_MEMORY_FRACTION
}

const fn default_timeout_ms() -> u64 {
    5_000
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_partial_config() {
        let toml_content = r#"
            cache_dir = "/var/cache/imgs"
            memory_budget_bytes = 1048576
            read_timeout_ms = 2500
            persist_format = "png"
            log_level = "debug"
        "#;

        let config: CacheConfig = toml::from_str(toml_content).expect("Failed to parse config");

        assert_eq!(config.cache_dir, Some(PathBuf::from("/var/cache/imgs")));
        assert_eq!(config.memory_budget_bytes, Some(1_048_576));
        assert_eq!(config.read_timeout(), Duration::from_millis(2500));
        assert_eq!(config.connect_timeout(), Duration::from_secs(5));
        assert_eq!(config.persist_format, PersistFormat::Png);
        assert_eq!(config.log_level, LogLevel::Debug);
        assert!((config.memory_fraction - 0.2).abs() < f64::EPSILON);
    }

    #[test]
    fn test_default_config() {
        let config = CacheConfig::default();

        assert_eq!(config.cache_dir, None);
        assert_eq!(config.persist_format, PersistFormat::Original);
        assert_eq!(config.connect_timeout(), Duration::from_secs(5));
        assert_eq!(config.read_timeout(), Duration::from_secs(5));
        assert!(config.effective_cache_dir().ends_with("images"));
    }

    #[test]
    fn test_empty_file_is_default() {
        let config: CacheConfig = toml::from_str("").unwrap();
        assert_eq!(config, CacheConfig::default());
    }

    #[test]
    fn test_log_level_to_tracing() {
        assert_eq!(LogLevel::Warn.to_tracing_level(), tracing::Level::WARN);
        assert_eq!(LogLevel::Trace.to_string(), "trace");
    }
}
