//! Image caching infrastructure.
//!
//! This module provides:
//! - Memory caching with LRU eviction under a byte budget
//! - Disk caching for persistence across runs
//! - Single-flight network fetching
//! - Callback delivery for asynchronous requests

/// Image codec adapter.
pub mod codec;
/// Tier fallthrough and single-flight loading.
pub mod coordinator;
/// Persistent disk tier.
pub mod disk_cache;
/// In-flight fetch table.
pub mod in_flight;
/// Bounded memory tier.
pub mod memory_cache;
/// Callback-style request API.
pub mod requester;

pub use codec::StandardCodec;
pub use coordinator::{CoordinatorStats, FetchCoordinator};
pub use disk_cache::DiskImageCache;
pub use in_flight::InFlightTable;
pub use memory_cache::{CacheStats, MemoryImageCache};
pub use requester::{DeliveryQueue, ImageRequester, RequestHandle};
