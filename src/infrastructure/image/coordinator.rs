//! Tier fallthrough: memory -> disk -> network.
//!
//! Only the memory probe runs on the caller. A miss registers with the
//! in-flight table, and the single task owning that key reads the disk and
//! downloads if needed, so every caller waiting on a key shares one decoded
//! image. Network results are written back into both faster tiers before any
//! waiter is released.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use bytes::Bytes;
use tracing::{debug, error, warn};

use crate::domain::entities::{CacheKey, ImageEntry, ImageSource, LoadedImage};
use crate::domain::errors::{FetchError, FetchResult};
use crate::domain::ports::{HttpFetcher, ImageCodec};
use crate::infrastructure::config::PersistFormat;

use super::disk_cache::DiskImageCache;
use super::in_flight::{InFlightTable, Registration};
use super::memory_cache::MemoryImageCache;

/// Resolves resource identifiers to decoded images through the cache tiers.
///
/// Cloning is cheap; clones share all tiers and the in-flight table.
#[derive(Clone)]
pub struct FetchCoordinator {
    shared: Arc<Shared>,
}

struct Shared {
    memory: Arc<MemoryImageCache>,
    disk: Arc<DiskImageCache>,
    fetcher: Arc<dyn HttpFetcher>,
    codec: Arc<dyn ImageCodec>,
    in_flight: Arc<InFlightTable>,
    persist_format: PersistFormat,
    counters: Counters,
}

#[derive(Default)]
struct Counters {
    memory_hits: AtomicU64,
    disk_hits: AtomicU64,
    network_fetches: AtomicU64,
    failures: AtomicU64,
}

/// Where lookups were satisfied since the coordinator was created.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CoordinatorStats {
    /// Lookups answered from memory.
    pub memory_hits: u64,
    /// Lookups answered from disk.
    pub disk_hits: u64,
    /// Downloads started.
    pub network_fetches: u64,
    /// Lookups that joined a disk read or download already in flight.
    pub coalesced: u64,
    /// Downloads that ended in a network or decode failure.
    pub failures: u64,
}

impl std::fmt::Display for CoordinatorStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "memory hits: {}, disk hits: {}, downloads: {} ({} coalesced, {} failed)",
            self.memory_hits, self.disk_hits, self.network_fetches, self.coalesced, self.failures
        )
    }
}

impl std::fmt::Debug for FetchCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FetchCoordinator")
            .field("memory", &self.shared.memory)
            .field("disk", &self.shared.disk)
            .field("persist_format", &self.shared.persist_format)
            .finish_non_exhaustive()
    }
}

impl FetchCoordinator {
    /// Creates a coordinator over the given tiers and capabilities.
    #[must_use]
    pub fn new(
        memory: Arc<MemoryImageCache>,
        disk: Arc<DiskImageCache>,
        fetcher: Arc<dyn HttpFetcher>,
        codec: Arc<dyn ImageCodec>,
    ) -> Self {
        Self::with_persist_format(memory, disk, fetcher, codec, PersistFormat::default())
    }

    /// Creates a coordinator that stores downloads on disk in `persist_format`.
    #[must_use]
    pub fn with_persist_format(
        memory: Arc<MemoryImageCache>,
        disk: Arc<DiskImageCache>,
        fetcher: Arc<dyn HttpFetcher>,
        codec: Arc<dyn ImageCodec>,
        persist_format: PersistFormat,
    ) -> Self {
        Self {
            shared: Arc::new(Shared {
                memory,
                disk,
                fetcher,
                codec,
                in_flight: Arc::new(InFlightTable::new()),
                persist_format,
                counters: Counters::default(),
            }),
        }
    }

    /// Looks `identifier` up in memory, then on disk, then downloads it.
    ///
    /// Concurrent calls for the same identifier share one disk read or
    /// download and all receive the same image. Dropping the returned future
    /// does not cancel a load other callers may be waiting on.
    ///
    /// # Errors
    /// Returns `MalformedIdentifier` for anything but an absolute http(s) URL,
    /// `NetworkFailure` if the download fails, `DecodeFailure` if the body is
    /// not an image.
    pub async fn resolve(&self, identifier: &str) -> FetchResult<LoadedImage> {
        let url = parse_identifier(identifier)?;
        let key = CacheKey::derive(identifier);
        let shared = &self.shared;

        if let Some(entry) = shared.memory.get(&key) {
            shared.counters.memory_hits.fetch_add(1, Ordering::Relaxed);
            debug!(key = %key, source = %ImageSource::MemoryCache, "Image resolved");
            return Ok(loaded(key, &entry, ImageSource::MemoryCache));
        }

        let waiter = match shared.in_flight.register(&key) {
            Registration::Follower(waiter) => waiter,
            Registration::Leader { waiter, completion } => {
                let shared = Arc::clone(shared);
                let key = key.clone();
                tokio::spawn(async move {
                    let outcome = shared.load(&key, url.as_str()).await;
                    completion.complete(outcome);
                });
                waiter
            }
        };

        waiter.wait().await
    }

    /// Returns true if a disk read or download for `identifier` is running.
    #[must_use]
    pub fn is_loading(&self, identifier: &str) -> bool {
        self.shared
            .in_flight
            .contains(&CacheKey::derive(identifier))
    }

    /// Returns the number of downloads running.
    #[must_use]
    pub fn in_flight_count(&self) -> usize {
        self.shared.in_flight.len()
    }

    /// Returns the memory tier.
    #[must_use]
    pub fn memory(&self) -> &Arc<MemoryImageCache> {
        &self.shared.memory
    }

    /// Returns the disk tier.
    #[must_use]
    pub fn disk(&self) -> &Arc<DiskImageCache> {
        &self.shared.disk
    }

    /// Returns lookup statistics.
    #[must_use]
    pub fn stats(&self) -> CoordinatorStats {
        let counters = &self.shared.counters;
        CoordinatorStats {
            memory_hits: counters.memory_hits.load(Ordering::Relaxed),
            disk_hits: counters.disk_hits.load(Ordering::Relaxed),
            network_fetches: counters.network_fetches.load(Ordering::Relaxed),
            coalesced: self.shared.in_flight.coalesced_requests(),
            failures: counters.failures.load(Ordering::Relaxed),
        }
    }

    /// Drops every decoded image; the disk tier is untouched.
    pub fn clear_memory(&self) {
        self.shared.memory.clear();
    }

    /// Clears memory and disk tiers.
    pub async fn clear_all(&self) {
        self.shared.memory.clear();
        if let Err(e) = self.shared.disk.clear().await {
            warn!(error = %e, "Failed to clear disk cache");
        }
        debug!("Cleared all image caches");
    }
}

impl Shared {
    /// Resolves a memory miss. Runs once per in-flight key.
    async fn load(&self, key: &CacheKey, url: &str) -> FetchResult<LoadedImage> {
        // A load that finished after the caller's memory miss but before it
        // registered has already populated memory.
        if let Some(entry) = self.memory.peek(key) {
            self.counters.memory_hits.fetch_add(1, Ordering::Relaxed);
            return Ok(loaded(key.clone(), &entry, ImageSource::MemoryCache));
        }

        if let Some(image) = self.load_from_disk(key).await {
            debug!(key = %key, source = %ImageSource::DiskCache, "Image resolved");
            return Ok(image);
        }

        self.download(key, url).await
    }

    /// Decodes a disk entry and promotes it into memory.
    /// Undecodable entries are removed so the network copy replaces them;
    /// no other writer for this key can be running at that point.
    async fn load_from_disk(&self, key: &CacheKey) -> Option<LoadedImage> {
        let bytes = self.disk.get(key).await?;

        let codec = Arc::clone(&self.codec);
        match tokio::task::spawn_blocking(move || codec.decode(&bytes)).await {
            Ok(Ok(image)) => {
                let entry = ImageEntry::new(Arc::new(image));
                self.memory.put(key.clone(), entry.clone());
                self.counters.disk_hits.fetch_add(1, Ordering::Relaxed);
                Some(loaded(key.clone(), &entry, ImageSource::DiskCache))
            }
            Ok(Err(e)) => {
                warn!(key = %key, error = %e, "Failed to decode cached image, discarding it");
                self.disk.evict(key).await;
                None
            }
            Err(e) => {
                error!(key = %key, error = %e, "Decode task panicked");
                None
            }
        }
    }

    /// Downloads, decodes and stores an image.
    async fn download(&self, key: &CacheKey, url: &str) -> FetchResult<LoadedImage> {
        self.counters.network_fetches.fetch_add(1, Ordering::Relaxed);
        let result = self.fetch_and_store(key, url).await;
        match &result {
            Ok(_) => debug!(key = %key, source = %ImageSource::Network, "Image resolved"),
            Err(e) => {
                self.counters.failures.fetch_add(1, Ordering::Relaxed);
                warn!(key = %key, url = %url, error = %e, "Image download failed");
            }
        }
        result
    }

    async fn fetch_and_store(&self, key: &CacheKey, url: &str) -> FetchResult<LoadedImage> {
        let bytes = self.fetcher.fetch(url).await?;

        let codec = Arc::clone(&self.codec);
        let bytes_for_decode = bytes.clone();
        let decoded = tokio::task::spawn_blocking(move || codec.decode(&bytes_for_decode))
            .await
            .map_err(|e| FetchError::decode(format!("Decode task panicked: {e}")))??;

        let entry = ImageEntry::new(Arc::new(decoded));
        self.persist(key, bytes, &entry).await;
        self.memory.put(key.clone(), entry.clone());

        Ok(loaded(key.clone(), &entry, ImageSource::Network))
    }

    /// Best-effort disk write; failures are only logged.
    async fn persist(&self, key: &CacheKey, bytes: Bytes, entry: &ImageEntry) {
        let payload = match self.persist_format {
            PersistFormat::Original => bytes,
            PersistFormat::Png => {
                let codec = Arc::clone(&self.codec);
                let image = Arc::clone(entry.image());
                let encoded = tokio::task::spawn_blocking(move || {
                    codec.encode(&image, image::ImageFormat::Png)
                })
                .await;
                match encoded {
                    Ok(Ok(png)) => Bytes::from(png),
                    Ok(Err(e)) => {
                        warn!(key = %key, error = %e, "Failed to re-encode image for disk cache");
                        return;
                    }
                    Err(e) => {
                        error!(key = %key, error = %e, "Encode task panicked");
                        return;
                    }
                }
            }
        };

        if let Err(e) = self.disk.put(key, payload).await {
            warn!(key = %key, error = %e, "Failed to cache to disk");
        }
    }
}

fn loaded(key: CacheKey, entry: &ImageEntry, source: ImageSource) -> LoadedImage {
    LoadedImage {
        key,
        image: Arc::clone(entry.image()),
        source,
    }
}

/// Accepts absolute http(s) URLs only.
fn parse_identifier(identifier: &str) -> FetchResult<reqwest::Url> {
    let url = reqwest::Url::parse(identifier)
        .map_err(|e| FetchError::malformed(identifier, e.to_string()))?;

    match url.scheme() {
        "http" | "https" if url.has_host() => Ok(url),
        "http" | "https" => Err(FetchError::malformed(identifier, "missing host")),
        scheme => Err(FetchError::malformed(
            identifier,
            format!("unsupported scheme {scheme:?}"),
        )),
    }
}
