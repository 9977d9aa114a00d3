//! Port for fetching resource bytes over the network.

use async_trait::async_trait;
use bytes::Bytes;

use crate::domain::errors::FetchResult;

/// Port for HTTP GET downloads.
///
/// Implementations enforce their own connect and read timeouts and map any
/// non-success status to [`FetchError::NetworkFailure`].
///
/// [`FetchError::NetworkFailure`]: crate::domain::errors::FetchError::NetworkFailure
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait HttpFetcher: Send + Sync {
    /// Downloads the full body of `url`.
    async fn fetch(&self, url: &str) -> FetchResult<Bytes>;
}
