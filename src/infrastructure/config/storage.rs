//! Loading and saving `config.toml`.

use super::cache_config::{APP_NAME, APP_ORGANIZATION, APP_QUALIFIER, CacheConfig};
use directories::ProjectDirs;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{info, warn};

const CONFIG_FILE_NAME: &str = "config.toml";

/// Errors reading or writing the configuration file.
#[derive(Debug, Error)]
#[allow(missing_docs)]
pub enum ConfigError {
    #[error("failed to determine config directory")]
    ConfigDirNotFound,
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("toml serialization error: {0}")]
    TomlSer(#[from] toml::ser::Error),
    #[error("toml deserialization error: {0}")]
    TomlDe(#[from] toml::de::Error),
}

/// Reads and writes `config.toml` in the configuration directory.
pub struct ConfigStore {
    config_dir: PathBuf,
}

impl ConfigStore {
    /// Create a new `ConfigStore` for the platform config directory.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if the configuration directory cannot be determined.
    pub fn new() -> Result<Self, ConfigError> {
        let config_dir = ProjectDirs::from(APP_QUALIFIER, APP_ORGANIZATION, APP_NAME)
            .map(|dirs| dirs.config_dir().to_path_buf())
            .ok_or(ConfigError::ConfigDirNotFound)?;

        Ok(Self { config_dir })
    }

    /// Creates a new `ConfigStore` with a specific directory (useful for testing).
    #[must_use]
    pub fn with_dir(path: PathBuf) -> Self {
        Self { config_dir: path }
    }

    /// Returns the configuration directory path.
    #[must_use]
    pub fn config_dir(&self) -> &Path {
        &self.config_dir
    }

    /// Returns the path of the configuration file.
    #[must_use]
    pub fn config_path(&self) -> PathBuf {
        self.config_dir.join(CONFIG_FILE_NAME)
    }

    /// Ensures the configuration directory exists.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if the directory cannot be created.
    pub fn ensure_config_dir(&self) -> Result<(), ConfigError> {
        if !self.config_dir.exists() {
            info!("Creating configuration directory at {:?}", self.config_dir);
            fs::create_dir_all(&self.config_dir)?;
        }
        Ok(())
    }

    /// Loads the cache configuration, writing a default file if none exists.
    ///
    /// A file that does not parse is reported and replaced by defaults in
    /// memory; it is not overwritten.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if the file cannot be read or created.
    pub fn load(&self, path_override: Option<&Path>) -> Result<CacheConfig, ConfigError> {
        let config_path = path_override.map_or_else(|| self.config_path(), Path::to_path_buf);

        if !config_path.exists() {
            info!(
                "Config file not found at {:?}, creating default.",
                config_path
            );
            let default_config = CacheConfig::default();
            if let Some(parent) = config_path.parent() {
                fs::create_dir_all(parent)?;
            }
            Self::save_to_file(&config_path, &default_config)?;
            return Ok(default_config);
        }

        let content = fs::read_to_string(&config_path)?;
        match toml::from_str::<CacheConfig>(&content) {
            Ok(config) => Ok(config),
            Err(e) => {
                warn!("Failed to parse config file: {}. Using defaults.", e);
                Ok(CacheConfig::default())
            }
        }
    }

    /// Saves the cache configuration.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if the file cannot be written.
    pub fn save(&self, config: &CacheConfig) -> Result<(), ConfigError> {
        self.ensure_config_dir()?;
        Self::save_to_file(&self.config_path(), config)
    }

    fn save_to_file(path: &Path, config: &CacheConfig) -> Result<(), ConfigError> {
        let content = toml::to_string_pretty(config)?;

        let parent = path
            .parent()
            .ok_or_else(|| std::io::Error::other("Invalid path"))?;
        let mut temp_file = tempfile::NamedTempFile::new_in(parent)?;
        temp_file.write_all(content.as_bytes())?;
        temp_file.persist(path).map_err(|e| e.error)?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::config::PersistFormat;
    use tempfile::TempDir;

    #[test]
    fn test_load_creates_default_file() {
        let temp = TempDir::new().unwrap();
        let store = ConfigStore::with_dir(temp.path().join("conf"));

        let config = store.load(None).unwrap();

        assert_eq!(config, CacheConfig::default());
        assert!(store.config_path().exists());
    }

    #[test]
    fn test_save_then_load() {
        let temp = TempDir::new().unwrap();
        let store = ConfigStore::with_dir(temp.path().to_path_buf());
        let config = CacheConfig::default()
            .with_cache_dir(temp.path().join("images"))
            .with_memory_budget(4096)
            .with_persist_format(PersistFormat::Png);

        store.save(&config).unwrap();

        assert_eq!(store.load(None).unwrap(), config);
    }

    #[test]
    fn test_save_replaces_file_without_leftovers() {
        let temp = TempDir::new().unwrap();
        let store = ConfigStore::with_dir(temp.path().to_path_buf());

        store.save(&CacheConfig::default()).unwrap();
        store
            .save(&CacheConfig::default().with_memory_budget(1024))
            .unwrap();

        let names: Vec<_> = fs::read_dir(temp.path())
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .collect();
        assert_eq!(names, vec![std::ffi::OsString::from(CONFIG_FILE_NAME)]);
        assert_eq!(
            store.load(None).unwrap().memory_budget_bytes,
            Some(1024)
        );
    }

    #[test]
    fn test_invalid_file_falls_back_to_defaults() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("broken.toml");
        fs::write(&path, "memory_fraction = \"lots\"").unwrap();

        let store = ConfigStore::with_dir(temp.path().to_path_buf());
        let config = store.load(Some(&path)).unwrap();

        assert_eq!(config, CacheConfig::default());
        assert_eq!(fs::read_to_string(&path).unwrap(), "memory_fraction = \"lots\"");
    }
}
