//! HTTP adapter backed by `reqwest`.

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::Client;
use tracing::debug;

use crate::domain::errors::{FetchError, FetchResult};
use crate::domain::ports::HttpFetcher;

/// Default connect and read timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

const USER_AGENT: &str = concat!("imgcache/", env!("CARGO_PKG_VERSION"));

/// Downloads images with a shared `reqwest` client.
#[derive(Debug, Clone)]
pub struct ReqwestFetcher {
    client: Client,
}

impl ReqwestFetcher {
    /// Creates a fetcher with the given timeouts.
    ///
    /// `read_timeout` bounds each read of the response, not the whole body.
    ///
    /// # Errors
    /// Returns error if the TLS backend cannot be initialized.
    pub fn new(
        connect_timeout: Duration,
        read_timeout: Duration,
        user_agent: Option<&str>,
    ) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .user_agent(user_agent.unwrap_or(USER_AGENT))
            .connect_timeout(connect_timeout)
            .read_timeout(read_timeout)
            .build()?;
        Ok(Self { client })
    }

    /// Creates a fetcher with 5 second connect and read timeouts.
    ///
    /// # Errors
    /// Returns error if the TLS backend cannot be initialized.
    pub fn with_defaults() -> Result<Self, reqwest::Error> {
        Self::new(DEFAULT_TIMEOUT, DEFAULT_TIMEOUT, None)
    }
}

#[async_trait]
impl HttpFetcher for ReqwestFetcher {
    async fn fetch(&self, url: &str) -> FetchResult<Bytes> {
        debug!(url = %url, "Downloading image from network");

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| request_error("Request failed", &e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::http_status(
                status.as_u16(),
                status.canonical_reason(),
            ));
        }

        response
            .bytes()
            .await
            .map_err(|e| request_error("Failed to read body", &e))
    }
}

fn request_error(context: &str, e: &reqwest::Error) -> FetchError {
    if e.is_timeout() {
        FetchError::network(format!("{context}: timed out"))
    } else {
        FetchError::network(format!("{context}: {e}"))
    }
}
