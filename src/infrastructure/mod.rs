//! Infrastructure layer with storage tiers and external adapters.

/// Cache configuration.
pub mod config;
/// HTTP transport.
pub mod http;
/// Image caching tiers and fetch coordination.
pub mod image;
/// Tracing subscriber setup.
pub mod logging;
/// Host memory probing.
pub mod system;

pub use config::{CacheConfig, ConfigStore, LogLevel, PersistFormat};
pub use http::ReqwestFetcher;
pub use image::{
    CacheStats, CoordinatorStats, DeliveryQueue, DiskImageCache, FetchCoordinator, ImageRequester,
    MemoryImageCache, RequestHandle, StandardCodec,
};
pub use logging::init_logging;
