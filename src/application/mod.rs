//! Application layer wiring the cache tiers together.

/// The shared cache handle.
pub mod image_cache;

pub use image_cache::{CacheInitError, ImageCache};
