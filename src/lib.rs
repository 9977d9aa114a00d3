//! imgcache - A three-tier image cache.
//!
//! Images named by URL are served from a bounded in-memory LRU, then from a
//! persistent disk directory, then from the network. Concurrent lookups of
//! the same image share a single download.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

/// Application layer containing the cache composition root.
pub mod application;
/// Domain layer containing entities, errors, and port definitions.
pub mod domain;
/// Infrastructure layer containing storage tiers and adapters.
pub mod infrastructure;

pub use application::{CacheInitError, ImageCache};
pub use domain::entities::{CacheKey, ImageSource, LoadedImage};
pub use domain::errors::{FetchError, FetchResult};
pub use infrastructure::config::CacheConfig;
pub use infrastructure::image::{DeliveryQueue, RequestHandle};

/// Current version of the library.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name.
pub const NAME: &str = "imgcache";
