//! The long-lived cache object an application builds once and shares.

use std::sync::Arc;

use thiserror::Error;
use tokio::runtime::Handle;
use tracing::info;

use crate::domain::entities::LoadedImage;
use crate::domain::errors::{DiskError, FetchResult};
use crate::domain::ports::{HttpFetcher, ImageCodec};
use crate::infrastructure::config::CacheConfig;
use crate::infrastructure::http::ReqwestFetcher;
use crate::infrastructure::image::{
    CacheStats, CoordinatorStats, DeliveryQueue, DiskImageCache, FetchCoordinator, ImageRequester,
    MemoryImageCache, RequestHandle, StandardCodec,
};

/// Errors building an [`ImageCache`].
#[derive(Debug, Error)]
#[allow(missing_docs)]
pub enum CacheInitError {
    #[error("disk cache unavailable: {0}")]
    Disk(#[from] DiskError),

    #[error("failed to create HTTP client: {0}")]
    Http(#[from] reqwest::Error),
}

/// Memory, disk and network tiers behind one lookup.
///
/// Build it once from the application's composition root and clone the
/// handle wherever images are needed; clones share every tier.
#[derive(Clone)]
pub struct ImageCache {
    coordinator: FetchCoordinator,
    requester: ImageRequester,
    runtime: Handle,
    config: Arc<CacheConfig>,
}

impl std::fmt::Debug for ImageCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ImageCache")
            .field("config", &self.config)
            .field("coordinator", &self.coordinator)
            .finish_non_exhaustive()
    }
}

impl ImageCache {
    /// Builds the cache with the `reqwest` transport and the standard codec.
    ///
    /// Must be called from within a tokio runtime; lookups are spawned on it.
    /// Returns the queue that callbacks of [`ImageCache::request_image`] are
    /// delivered through.
    ///
    /// # Errors
    /// Returns error if the disk directory cannot be created or the HTTP
    /// client cannot be built.
    pub async fn new(config: CacheConfig) -> Result<(Self, DeliveryQueue), CacheInitError> {
        let fetcher = ReqwestFetcher::new(
            config.connect_timeout(),
            config.read_timeout(),
            config.user_agent.as_deref(),
        )?;
        Self::with_parts(config, Arc::new(fetcher), Arc::new(StandardCodec)).await
    }

    /// Builds the cache around caller-supplied transport and codec.
    ///
    /// # Errors
    /// Returns error if the disk directory cannot be created.
    pub async fn with_parts(
        config: CacheConfig,
        fetcher: Arc<dyn HttpFetcher>,
        codec: Arc<dyn ImageCodec>,
    ) -> Result<(Self, DeliveryQueue), CacheInitError> {
        let disk = Arc::new(DiskImageCache::new(config.effective_cache_dir()).await?);

        let memory = Arc::new(match config.memory_budget_bytes {
            Some(bytes) => MemoryImageCache::new(usize::try_from(bytes).unwrap_or(usize::MAX)),
            None => MemoryImageCache::from_available_memory(config.memory_fraction),
        });

        info!(
            cache_dir = %disk.cache_dir().display(),
            memory_budget = memory.budget_bytes(),
            disk_entries = disk.len(),
            "Image cache ready"
        );

        let coordinator = FetchCoordinator::with_persist_format(
            memory,
            disk,
            fetcher,
            codec,
            config.persist_format,
        );
        let runtime = Handle::current();
        let (requester, queue) = ImageRequester::new(coordinator.clone(), runtime.clone());

        Ok((
            Self {
                coordinator,
                requester,
                runtime,
                config: Arc::new(config),
            },
            queue,
        ))
    }

    /// Resolves `identifier` in the background; `on_result` runs when the
    /// returned delivery queue is dispatched.
    pub fn request_image<F>(&self, identifier: impl Into<String>, on_result: F) -> RequestHandle
    where
        F: FnOnce(FetchResult<LoadedImage>) + Send + 'static,
    {
        self.requester.request(identifier, on_result)
    }

    /// Resolves `identifier` through memory, disk and network.
    ///
    /// # Errors
    /// Returns the lookup failure; see [`FetchCoordinator::resolve`].
    pub async fn resolve_image(&self, identifier: &str) -> FetchResult<LoadedImage> {
        self.coordinator.resolve(identifier).await
    }

    /// Blocking form of [`ImageCache::resolve_image`] for plain threads.
    ///
    /// # Errors
    /// Returns the lookup failure; see [`FetchCoordinator::resolve`].
    ///
    /// # Panics
    /// Panics if called from within an asynchronous execution context.
    pub fn resolve_image_blocking(&self, identifier: &str) -> FetchResult<LoadedImage> {
        self.runtime.block_on(self.coordinator.resolve(identifier))
    }

    /// Warms the caches for several identifiers.
    pub fn prefetch<I, S>(&self, identifiers: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.requester.prefetch(identifiers);
    }

    /// Returns the requester, for callers that want task handles.
    #[must_use]
    pub const fn requester(&self) -> &ImageRequester {
        &self.requester
    }

    /// Returns the coordinator.
    #[must_use]
    pub const fn coordinator(&self) -> &FetchCoordinator {
        &self.coordinator
    }

    /// Returns the configuration the cache was built from.
    #[must_use]
    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    /// Returns lookup statistics.
    #[must_use]
    pub fn stats(&self) -> CoordinatorStats {
        self.coordinator.stats()
    }

    /// Returns memory cache statistics.
    #[must_use]
    pub fn memory_cache_stats(&self) -> CacheStats {
        self.coordinator.memory().stats()
    }

    /// Clears all caches.
    pub async fn clear_all(&self) {
        self.coordinator.clear_all().await;
        info!("Cleared all image caches");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::entities::{CacheKey, ImageSource};
    use crate::domain::errors::FetchError;
    use crate::domain::ports::mocks::{StubHttpFetcher, png_bytes};
    use crate::infrastructure::config::PersistFormat;
    use tempfile::TempDir;

    async fn build(config: CacheConfig, fetcher: Arc<StubHttpFetcher>) -> (ImageCache, DeliveryQueue) {
        ImageCache::with_parts(config, fetcher, Arc::new(StandardCodec))
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_fresh_fetch_lands_in_every_tier() {
        let temp = TempDir::new().unwrap();
        let fetcher = Arc::new(StubHttpFetcher::new());
        fetcher.respond("https://x/a.png", png_bytes(10, 10));
        let (cache, _queue) = build(
            CacheConfig::default().with_cache_dir(temp.path()),
            Arc::clone(&fetcher),
        )
        .await;

        let image = cache.resolve_image("https://x/a.png").await.unwrap();

        let key = CacheKey::derive("https://x/a.png");
        assert_eq!(image.dimensions(), (10, 10));
        assert!(temp.path().join(key.as_str()).is_file());
        assert!(cache.coordinator().memory().peek(&key).is_some());
    }

    #[tokio::test]
    async fn test_not_found_leaves_tiers_empty() {
        let temp = TempDir::new().unwrap();
        let fetcher = Arc::new(StubHttpFetcher::new());
        fetcher.respond_status("https://x/a.png", 404);
        let (cache, _queue) = build(
            CacheConfig::default().with_cache_dir(temp.path()),
            fetcher,
        )
        .await;

        let err = cache.resolve_image("https://x/a.png").await.unwrap_err();

        assert!(matches!(err, FetchError::NetworkFailure { status: Some(404), .. }));
        assert_eq!(std::fs::read_dir(temp.path()).unwrap().count(), 0);
        assert_eq!(cache.memory_cache_stats().size, 0);
    }

    #[tokio::test]
    async fn test_budget_of_two_entries_evicts_least_recent() {
        let temp = TempDir::new().unwrap();
        let fetcher = Arc::new(StubHttpFetcher::new());
        for name in ["a", "b", "c"] {
            fetcher.respond(&format!("https://x/{name}.png"), png_bytes(10, 10));
        }
        // Each decoded 10x10 RGB image accounts for 300 bytes.
        let (cache, _queue) = build(
            CacheConfig::default()
                .with_cache_dir(temp.path())
                .with_memory_budget(600),
            Arc::clone(&fetcher),
        )
        .await;

        cache.resolve_image("https://x/a.png").await.unwrap();
        cache.resolve_image("https://x/b.png").await.unwrap();
        cache.resolve_image("https://x/a.png").await.unwrap();
        cache.resolve_image("https://x/c.png").await.unwrap();

        let memory = cache.coordinator().memory();
        assert!(memory.peek(&CacheKey::derive("https://x/a.png")).is_some());
        assert!(memory.peek(&CacheKey::derive("https://x/b.png")).is_none());
        assert!(memory.peek(&CacheKey::derive("https://x/c.png")).is_some());

        let b = cache.resolve_image("https://x/b.png").await.unwrap();
        assert_eq!(b.source, ImageSource::DiskCache);
        assert_eq!(fetcher.calls(), 3);
    }

    #[tokio::test]
    async fn test_disk_survives_a_new_cache_instance() {
        let temp = TempDir::new().unwrap();
        let fetcher = Arc::new(StubHttpFetcher::new());
        fetcher.respond("https://x/a.png", png_bytes(2, 2));
        let config = CacheConfig::default().with_cache_dir(temp.path());

        let (first, _queue) = build(config.clone(), Arc::clone(&fetcher)).await;
        first.resolve_image("https://x/a.png").await.unwrap();
        drop(first);

        let (second, _queue) = build(config, Arc::clone(&fetcher)).await;
        let image = second.resolve_image("https://x/a.png").await.unwrap();

        assert_eq!(image.source, ImageSource::DiskCache);
        assert_eq!(fetcher.calls(), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_request_image_delivers_through_queue() {
        let temp = TempDir::new().unwrap();
        let fetcher = Arc::new(StubHttpFetcher::new());
        fetcher.respond("https://x/a.png", png_bytes(6, 2));
        let (cache, mut queue) = build(
            CacheConfig::default()
                .with_cache_dir(temp.path())
                .with_persist_format(PersistFormat::Png),
            fetcher,
        )
        .await;

        let (tx, rx) = std::sync::mpsc::channel();
        cache.request_image("https://x/a.png", move |result| {
            tx.send(result.map(|image| image.dimensions())).unwrap();
        });
        assert!(queue.dispatch_next().await);

        assert_eq!(rx.try_recv().unwrap(), Ok((6, 2)));
    }

    #[test]
    fn test_resolve_blocking_from_plain_thread() {
        let runtime = tokio::runtime::Runtime::new().unwrap();
        let temp = TempDir::new().unwrap();
        let fetcher = Arc::new(StubHttpFetcher::new());
        fetcher.respond("https://x/a.png", png_bytes(1, 1));
        let (cache, _queue) = runtime.block_on(build(
            CacheConfig::default().with_cache_dir(temp.path()),
            fetcher,
        ));

        let worker = std::thread::spawn(move || {
            let first = cache.resolve_image_blocking("https://x/a.png").unwrap();
            let second = cache.resolve_image_blocking("https://x/a.png").unwrap();
            (first.source, second.source)
        });

        assert_eq!(
            worker.join().unwrap(),
            (ImageSource::Network, ImageSource::MemoryCache)
        );
    }

    #[tokio::test]
    async fn test_clear_all_forces_refetch() {
        let temp = TempDir::new().unwrap();
        let fetcher = Arc::new(StubHttpFetcher::new());
        fetcher.respond("https://x/a.png", png_bytes(1, 1));
        let (cache, _queue) = build(
            CacheConfig::default().with_cache_dir(temp.path()),
            Arc::clone(&fetcher),
        )
        .await;

        cache.resolve_image("https://x/a.png").await.unwrap();
        cache.clear_all().await;
        let image = cache.resolve_image("https://x/a.png").await.unwrap();

        assert_eq!(image.source, ImageSource::Network);
        assert_eq!(fetcher.calls(), 2);
    }

    #[tokio::test]
    async fn test_default_construction_sizes_memory_from_host() {
        let temp = TempDir::new().unwrap();
        let (cache, _queue) = ImageCache::new(CacheConfig::default().with_cache_dir(temp.path()))
            .await
            .unwrap();

        assert!(cache.memory_cache_stats().budget_bytes > 0);
        assert_eq!(cache.config().cache_dir.as_deref(), Some(temp.path()));
    }
}
