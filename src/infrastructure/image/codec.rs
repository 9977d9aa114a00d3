//! Codec adapter backed by the `image` crate.

use crate::domain::errors::{FetchError, FetchResult};
use crate::domain::ports::ImageCodec;

/// Decodes any format enabled on the `image` dependency (png, jpeg, webp, gif).
#[derive(Debug, Clone, Copy, Default)]
pub struct StandardCodec;

impl ImageCodec for StandardCodec {
    fn decode(&self, bytes: &[u8]) -> FetchResult<image::DynamicImage> {
        image::load_from_memory(bytes)
            .map_err(|e| FetchError::decode(format!("Failed to decode image: {e}")))
    }

    fn encode(
        &self,
        image: &image::DynamicImage,
        format: image::ImageFormat,
    ) -> Result<Vec<u8>, image::ImageError> {
        let mut buf = std::io::Cursor::new(Vec::new());
        image.write_to(&mut buf, format)?;
        Ok(buf.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ports::mocks::png_bytes;

    #[test]
    fn test_decode_png() {
        let img = StandardCodec.decode(&png_bytes(7, 3)).unwrap();
        assert_eq!((img.width(), img.height()), (7, 3));
    }

    #[test]
    fn test_decode_garbage_fails() {
        let err = StandardCodec.decode(b"definitely not an image").unwrap_err();
        assert!(matches!(err, FetchError::DecodeFailure { .. }));
    }

    #[test]
    fn test_encode_then_decode_keeps_dimensions() {
        let original = image::DynamicImage::new_rgba8(5, 9);
        let bytes = StandardCodec
            .encode(&original, image::ImageFormat::Png)
            .unwrap();
        let decoded = StandardCodec.decode(&bytes).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (5, 9));
    }
}
