//! Port for turning encoded bytes into displayable images and back.

use crate::domain::errors::FetchResult;

/// Image codec capability.
/// Implementations must be thread-safe; decoding runs on blocking workers.
pub trait ImageCodec: Send + Sync {
    /// Decodes encoded bytes into an image.
    ///
    /// # Errors
    /// Returns [`FetchError::DecodeFailure`] if the bytes are not a supported image.
    ///
    /// [`FetchError::DecodeFailure`]: crate::domain::errors::FetchError::DecodeFailure
    fn decode(&self, bytes: &[u8]) -> FetchResult<image::DynamicImage>;

    /// Encodes an image in the given format.
    ///
    /// # Errors
    /// Returns the codec error if the image cannot be encoded.
    fn encode(
        &self,
        image: &image::DynamicImage,
        format: image::ImageFormat,
    ) -> Result<Vec<u8>, image::ImageError>;
}
