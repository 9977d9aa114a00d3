//! In-memory LRU image cache bounded by a byte budget.

use std::sync::atomic::{AtomicU64, Ordering};

use lru::LruCache;
use parking_lot::Mutex;
use tracing::{debug, trace};

use crate::domain::entities::{CacheKey, ImageEntry};
use crate::infrastructure::system;

/// Fraction of available memory used when no explicit budget is configured.
pub const DEFAULT_MEMORY_FRACTION: f64 = 0.2;

/// In-memory LRU cache for decoded images.
///
/// Every entry is weighted by its accounted size. Inserting past the budget
/// evicts least-recently-used entries, never the one just inserted, so a
/// single oversized image stays resident until something else is stored.
pub struct MemoryImageCache {
    inner: Mutex<Resident>,
    budget_bytes: usize,
    hits: AtomicU64,
    misses: AtomicU64,
    evictions: AtomicU64,
}

struct Resident {
    entries: LruCache<CacheKey, ImageEntry>,
    used_bytes: usize,
}

impl MemoryImageCache {
    /// Creates a new cache holding at most `budget_bytes` of decoded images.
    #[must_use]
    pub fn new(budget_bytes: usize) -> Self {
        Self {
            inner: Mutex::new(Resident {
                entries: LruCache::unbounded(),
                used_bytes: 0,
            }),
            budget_bytes: budget_bytes.max(1),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            evictions: AtomicU64::new(0),
        }
    }

    /// Creates a cache sized to `fraction` of the memory available right now.
    /// The budget is computed once and never re-evaluated.
    #[must_use]
    pub fn from_available_memory(fraction: f64) -> Self {
        let budget = system::memory_budget(system::available_memory(), fraction);
        debug!(budget_bytes = budget, fraction, "Sized memory image cache");
        Self::new(budget)
    }

    /// Gets an image and marks it most recently used.
    pub fn get(&self, key: &CacheKey) -> Option<ImageEntry> {
        let mut inner = self.inner.lock();
        if let Some(entry) = inner.entries.get(key) {
            self.hits.fetch_add(1, Ordering::Relaxed);
            trace!(key = %key, "Memory cache hit");
            Some(entry.clone())
        } else {
            self.misses.fetch_add(1, Ordering::Relaxed);
            trace!(key = %key, "Memory cache miss");
            None
        }
    }

    /// Peeks at an image without promoting it in the LRU.
    pub fn peek(&self, key: &CacheKey) -> Option<ImageEntry> {
        self.inner.lock().entries.peek(key).cloned()
    }

    /// Inserts or replaces an image, then evicts down to the budget.
    pub fn put(&self, key: CacheKey, entry: ImageEntry) {
        let mut guard = self.inner.lock();
        let inner = &mut *guard;

        let size = entry.size_bytes();
        if let Some(old) = inner.entries.put(key.clone(), entry) {
            inner.used_bytes -= old.size_bytes();
        }
        inner.used_bytes += size;
        debug!(key = %key, size, used = inner.used_bytes, "Storing image in memory cache");

        // The new entry is most recently used, so pop_lru never returns it
        // while another entry remains.
        while inner.used_bytes > self.budget_bytes && inner.entries.len() > 1 {
            let Some((evicted, old)) = inner.entries.pop_lru() else {
                break;
            };
            inner.used_bytes -= old.size_bytes();
            self.evictions.fetch_add(1, Ordering::Relaxed);
            debug!(key = %evicted, size = old.size_bytes(), "Evicted image from memory cache");
        }
    }

    /// Removes an image from the cache.
    pub fn evict(&self, key: &CacheKey) {
        let mut guard = self.inner.lock();
        let inner = &mut *guard;
        if let Some(old) = inner.entries.pop(key) {
            inner.used_bytes -= old.size_bytes();
            debug!(key = %key, "Evicted image from memory cache");
        }
    }

    /// Clears all images from the cache.
    pub fn clear(&self) {
        let mut inner = self.inner.lock();
        inner.entries.clear();
        inner.used_bytes = 0;
        debug!("Cleared memory image cache");
    }

    /// Returns the current number of cached images.
    pub fn len(&self) -> usize {
        self.inner.lock().entries.len()
    }

    /// Returns true if the cache is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns the bytes currently accounted against the budget.
    pub fn used_bytes(&self) -> usize {
        self.inner.lock().used_bytes
    }

    /// Returns the configured budget in bytes.
    #[must_use]
    pub const fn budget_bytes(&self) -> usize {
        self.budget_bytes
    }

    /// Returns cache statistics.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn stats(&self) -> CacheStats {
        let hits = self.hits.load(Ordering::Relaxed);
        let misses = self.misses.load(Ordering::Relaxed);
        let total = hits + misses;
        let hit_rate = if total > 0 {
            (hits as f64 / total as f64) * 100.0
        } else {
            0.0
        };
        let inner = self.inner.lock();
        CacheStats {
            hits,
            misses,
            evictions: self.evictions.load(Ordering::Relaxed),
            hit_rate,
            size: inner.entries.len(),
            used_bytes: inner.used_bytes,
            budget_bytes: self.budget_bytes,
        }
    }
}

impl std::fmt::Debug for MemoryImageCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryImageCache")
            .field("budget_bytes", &self.budget_bytes)
            .finish_non_exhaustive()
    }
}

/// Statistics about cache performance.
#[derive(Debug, Clone)]
pub struct CacheStats {
    /// Number of cache hits.
    pub hits: u64,
    /// Number of cache misses.
    pub misses: u64,
    /// Number of entries evicted to stay under budget.
    pub evictions: u64,
    /// Hit rate as a percentage.
    pub hit_rate: f64,
    /// Current number of cached images.
    pub size: usize,
    /// Bytes accounted against the budget.
    pub used_bytes: usize,
    /// Configured budget in bytes.
    pub budget_bytes: usize,
}

impl std::fmt::Display for CacheStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Cache: {} images ({}/{} bytes), {:.1}% hit rate ({} hits, {} misses, {} evictions)",
            self.size,
            self.used_bytes,
            self.budget_bytes,
            self.hit_rate,
            self.hits,
            self.misses,
            self.evictions
        )
    }
}
