//! Cache configuration.

/// Configuration model.
pub mod cache_config;
/// Configuration file persistence.
pub mod storage;

pub use cache_config::{CacheConfig, LogLevel, PersistFormat};
pub use storage::{ConfigError, ConfigStore};
