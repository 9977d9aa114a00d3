//! Domain types for cached images.

use std::sync::Arc;

use sha2::{Digest, Sha256};

/// Number of digest bytes kept in a cache key (128 bits).
const KEY_DIGEST_BYTES: usize = 16;

/// Stable cache key derived from a resource identifier.
///
/// Keys are lowercase hex strings, so they are valid both as map keys and as
/// file basenames on every platform.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CacheKey(String);

impl CacheKey {
    /// Length of a key in characters.
    pub const LEN: usize = KEY_DIGEST_BYTES * 2;

    /// Derives the key for a resource identifier (usually a URL).
    #[must_use]
    pub fn derive(identifier: &str) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(identifier.as_bytes());
        let digest = hasher.finalize();
        Self(hex::encode(&digest[..KEY_DIGEST_BYTES]))
    }

    /// Recognises a string that has the shape of a derived key.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        let valid = s.len() == Self::LEN
            && s
                .bytes()
                .all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b));
        valid.then(|| Self(s.to_string()))
    }

    /// Returns the inner string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for CacheKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Where an image was loaded from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageSource {
    /// Loaded from in-memory LRU cache.
    MemoryCache,
    /// Loaded from disk cache.
    DiskCache,
    /// Downloaded from network.
    Network,
}

impl std::fmt::Display for ImageSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MemoryCache => write!(f, "memory"),
            Self::DiskCache => write!(f, "disk"),
            Self::Network => write!(f, "network"),
        }
    }
}

/// A decoded image together with its weight in the memory budget.
#[derive(Debug, Clone)]
pub struct ImageEntry {
    image: Arc<image::DynamicImage>,
    size_bytes: usize,
}

impl ImageEntry {
    /// Wraps a decoded image, accounting it by its pixel buffer length.
    #[must_use]
    pub fn new(image: Arc<image::DynamicImage>) -> Self {
        let size_bytes = image.as_bytes().len();
        Self { image, size_bytes }
    }

    /// Wraps a decoded image with an explicit accounted size.
    #[must_use]
    pub const fn with_size(image: Arc<image::DynamicImage>, size_bytes: usize) -> Self {
        Self { image, size_bytes }
    }

    /// Returns the shared image.
    #[must_use]
    pub const fn image(&self) -> &Arc<image::DynamicImage> {
        &self.image
    }

    /// Returns the accounted size in bytes.
    #[must_use]
    pub const fn size_bytes(&self) -> usize {
        self.size_bytes
    }
}

/// An image handed back to callers.
#[derive(Debug, Clone)]
pub struct LoadedImage {
    /// The cache key it was stored under.
    pub key: CacheKey,
    /// The decoded image.
    pub image: Arc<image::DynamicImage>,
    /// The tier that satisfied the lookup.
    pub source: ImageSource,
}

impl LoadedImage {
    /// Returns the image dimensions.
    #[must_use]
    pub fn dimensions(&self) -> (u32, u32) {
        (self.image.width(), self.image.height())
    }
}
