//! Disk-based image cache for persistence across sessions.
//!
//! One flat directory, one file per cache key, file content is the encoded
//! image exactly as it will be decoded again. Writes go through a temp file in
//! the same directory that is renamed into place, so a reader sees either the
//! previous file or the complete new one.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

use bytes::Bytes;
use parking_lot::Mutex;
use tokio::fs;
use tracing::{debug, trace, warn};

use crate::domain::entities::CacheKey;
use crate::domain::errors::DiskError;
use crate::infrastructure::config::cache_config::{APP_NAME, APP_ORGANIZATION, APP_QUALIFIER};

const TEMP_PREFIX: &str = ".tmp";

/// Disk-based image cache that persists raw image bytes.
pub struct DiskImageCache {
    cache_dir: PathBuf,
    current_size: AtomicU64,
    item_count: AtomicUsize,
    /// Serializes the stat-then-replace and stat-then-remove steps so the
    /// counters see every entry change exactly once.
    write_lock: Arc<Mutex<()>>,
}

impl DiskImageCache {
    /// Opens a disk cache in the specified directory, creating it if missing.
    ///
    /// # Errors
    /// Returns error if cache directory cannot be created or listed.
    pub async fn new(cache_dir: PathBuf) -> Result<Self, DiskError> {
        fs::create_dir_all(&cache_dir)
            .await
            .map_err(|source| DiskError::CreateDir {
                path: cache_dir.display().to_string(),
                source,
            })?;

        let mut total_size = 0u64;
        let mut count = 0usize;
        let mut stale = 0usize;

        let mut entries = fs::read_dir(&cache_dir).await.map_err(DiskError::ReadDir)?;
        while let Ok(Some(entry)) = entries.next_entry().await {
            let name = entry.file_name();
            let Some(name) = name.to_str() else {
                continue;
            };

            if name.starts_with(TEMP_PREFIX) {
                // Left behind by an interrupted write.
                if fs::remove_file(entry.path()).await.is_ok() {
                    stale += 1;
                }
                continue;
            }

            if CacheKey::parse(name).is_some()
                && let Ok(meta) = entry.metadata().await
                && meta.is_file()
            {
                total_size += meta.len();
                count += 1;
            }
        }

        debug!(
            path = %cache_dir.display(),
            entries = count,
            size = total_size,
            stale_temp_files = stale,
            "Opened disk image cache"
        );

        Ok(Self {
            cache_dir,
            current_size: AtomicU64::new(total_size),
            item_count: AtomicUsize::new(count),
            write_lock: Arc::new(Mutex::new(())),
        })
    }

    /// Opens a cache in the default location (the platform cache dir + `images`).
    ///
    /// # Errors
    /// Returns error if cache directory cannot be created.
    pub async fn default_location() -> Result<Self, DiskError> {
        Self::new(default_cache_dir()).await
    }

    /// Returns the directory backing this cache.
    #[must_use]
    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }

    /// Returns the path for a cached image.
    fn cache_path(&self, key: &CacheKey) -> PathBuf {
        self.cache_dir.join(key.as_str())
    }

    /// Reads the bytes stored under `key`.
    ///
    /// Only a regular, non-empty file counts as a hit. Read errors are logged
    /// and reported as a miss.
    pub async fn get(&self, key: &CacheKey) -> Option<Vec<u8>> {
        let path = self.cache_path(key);

        match fs::metadata(&path).await {
            Ok(meta) if meta.is_file() && meta.len() > 0 => {}
            Ok(_) => {
                trace!(key = %key, "Disk cache miss (not a regular non-empty file)");
                return None;
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                trace!(key = %key, "Disk cache miss");
                return None;
            }
            Err(e) => {
                warn!(key = %key, error = %e, "Failed to stat cache file, treating as miss");
                return None;
            }
        }

        match fs::read(&path).await {
            Ok(bytes) if !bytes.is_empty() => {
                trace!(key = %key, path = %path.display(), "Disk cache hit");
                Some(bytes)
            }
            Ok(_) => None,
            Err(e) => {
                if e.kind() != std::io::ErrorKind::NotFound {
                    warn!(key = %key, error = %e, "Failed to read cache file, treating as miss");
                }
                None
            }
        }
    }

    /// Stores bytes under `key`, replacing any previous content.
    ///
    /// # Errors
    /// Returns error if the temp file cannot be written or renamed into place.
    pub async fn put(&self, key: &CacheKey, bytes: Bytes) -> Result<(), DiskError> {
        let path = self.cache_path(key);
        let dir = self.cache_dir.clone();
        let new_size = bytes.len() as u64;
        let lock = Arc::clone(&self.write_lock);

        let old_size =
            tokio::task::spawn_blocking(move || write_atomically(&lock, &dir, &path, &bytes))
                .await
                .map_err(|e| DiskError::task(format!("Disk write task panicked: {e}")))?
                .map_err(|e| DiskError::write(key.as_str(), e))?;

        if let Some(old) = old_size {
            if new_size > old {
                self.current_size
                    .fetch_add(new_size - old, Ordering::Relaxed);
            } else {
                self.current_size
                    .fetch_sub(old - new_size, Ordering::Relaxed);
            }
        } else {
            self.current_size.fetch_add(new_size, Ordering::Relaxed);
            self.item_count.fetch_add(1, Ordering::Relaxed);
        }

        debug!(key = %key, size = new_size, "Stored image in disk cache");
        Ok(())
    }

    /// Removes an image from disk cache.
    pub async fn evict(&self, key: &CacheKey) {
        let path = self.cache_path(key);
        let lock = Arc::clone(&self.write_lock);

        match tokio::task::spawn_blocking(move || remove_locked(&lock, &path)).await {
            Ok(Ok(Some(size))) => {
                self.forget(1, size);
                debug!(key = %key, "Evicted from disk cache");
            }
            Ok(Ok(None)) => {}
            Ok(Err(e)) => warn!(key = %key, error = %e, "Failed to evict from disk cache"),
            Err(e) => warn!(key = %key, error = %e, "Disk evict task panicked"),
        }
    }

    /// Removes every cached file. Files that are not cache entries are left alone.
    ///
    /// # Errors
    /// Returns error if cache directory cannot be read.
    pub async fn clear(&self) -> Result<(), DiskError> {
        let dir = self.cache_dir.clone();
        let lock = Arc::clone(&self.write_lock);

        let (removed, freed) = tokio::task::spawn_blocking(move || clear_locked(&lock, &dir))
            .await
            .map_err(|e| DiskError::task(format!("Disk clear task panicked: {e}")))?
            .map_err(DiskError::ReadDir)?;

        self.forget(removed, freed);
        debug!(removed, freed, "Cleared disk cache");
        Ok(())
    }

    /// Subtracts removed entries from the counters. Files added behind the
    /// cache's back are not counted, so the counters saturate at zero.
    fn forget(&self, count: usize, bytes: u64) {
        let _ = self
            .current_size
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |v| {
                Some(v.saturating_sub(bytes))
            });
        let _ = self
            .item_count
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |v| {
                Some(v.saturating_sub(count))
            });
    }

    /// Checks if an image is cached.
    pub async fn contains(&self, key: &CacheKey) -> bool {
        fs::metadata(self.cache_path(key))
            .await
            .is_ok_and(|meta| meta.is_file() && meta.len() > 0)
    }

    /// Returns the current cache size in bytes.
    pub fn current_size(&self) -> u64 {
        self.current_size.load(Ordering::Relaxed)
    }

    /// Returns the number of cached files.
    pub fn len(&self) -> usize {
        self.item_count.load(Ordering::Relaxed)
    }

    /// Returns true if the cache is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl std::fmt::Debug for DiskImageCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DiskImageCache")
            .field("cache_dir", &self.cache_dir)
            .finish_non_exhaustive()
    }
}

fn file_size(path: &Path) -> Option<u64> {
    std::fs::metadata(path)
        .ok()
        .filter(std::fs::Metadata::is_file)
        .map(|m| m.len())
}

/// Writes `bytes` to a temp file in `dir` and renames it over `path`.
/// Returns the size of the file that was replaced, if any.
fn write_atomically(
    lock: &Mutex<()>,
    dir: &Path,
    path: &Path,
    bytes: &[u8],
) -> std::io::Result<Option<u64>> {
    let mut temp_file = tempfile::Builder::new()
        .prefix(TEMP_PREFIX)
        .tempfile_in(dir)?;
    temp_file.write_all(bytes)?;
    temp_file.flush()?;

    let _guard = lock.lock();
    let old_size = file_size(path);
    temp_file.persist(path).map_err(|e| e.error)?;

    Ok(old_size)
}

/// Removes the entry at `path`, returning its size if it existed.
fn remove_locked(lock: &Mutex<()>, path: &Path) -> std::io::Result<Option<u64>> {
    let _guard = lock.lock();
    let Some(size) = file_size(path) else {
        return Ok(None);
    };
    match std::fs::remove_file(path) {
        Ok(()) => Ok(Some(size)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e),
    }
}

/// Removes every key-shaped file in `dir`.
/// Returns the number of files removed and the bytes freed.
fn clear_locked(lock: &Mutex<()>, dir: &Path) -> std::io::Result<(usize, u64)> {
    let _guard = lock.lock();
    let mut removed = 0;
    let mut freed = 0;

    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let is_entry = entry
            .file_name()
            .to_str()
            .is_some_and(|name| CacheKey::parse(name).is_some());
        if !is_entry {
            continue;
        }
        let path = entry.path();
        let Some(size) = file_size(&path) else {
            continue;
        };
        match std::fs::remove_file(&path) {
            Ok(()) => {
                removed += 1;
                freed += size;
            }
            Err(e) => warn!(path = %path.display(), error = %e, "Failed to remove cache file"),
        }
    }

    Ok((removed, freed))
}

/// Returns the default cache directory path.
#[must_use]
pub fn default_cache_dir() -> PathBuf {
    directories::ProjectDirs::from(APP_QUALIFIER, APP_ORGANIZATION, APP_NAME).map_or_else(
        || {
            std::env::temp_dir()
                .join(APP_NAME)
                .join("cache")
                .join("images")
        },
        |dirs| dirs.cache_dir().join("images"),
    )
}
