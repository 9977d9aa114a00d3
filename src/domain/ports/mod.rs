//! Port definitions for the adapters the cache depends on.

mod codec_port;
mod http_port;

pub use codec_port::ImageCodec;
pub use http_port::HttpFetcher;

#[cfg(test)]
pub use http_port::MockHttpFetcher;
