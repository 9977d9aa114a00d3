//! Domain entity definitions.

mod image;

pub use image::{CacheKey, ImageEntry, ImageSource, LoadedImage};
