//! Domain layer with core entities and port definitions.

/// Entity definitions.
pub mod entities;
/// Error types.
pub mod errors;
/// Port definitions.
pub mod ports;

pub use entities::{CacheKey, ImageEntry, ImageSource, LoadedImage};
pub use errors::{DiskError, FetchError, FetchResult};
pub use ports::{HttpFetcher, ImageCodec};
