//! Remote fetching of checksums and databases.

use async_trait::async_trait;
use std::time::Duration;

use crate::Result;

/// Default bound on a single request, connect through body.
pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(30);

/// Source of remote content.
///
/// Every call must either finish or fail within a bounded time; a stalled
/// transfer is reported as an error.
#[async_trait]
pub trait Fetcher: Send + Sync {
    /// Fetch a text body.
    async fn fetch_text(&self, url: &str) -> Result<String>;

    /// Fetch a binary body.
    async fn fetch_bytes(&self, url: &str) -> Result<Vec<u8>>;
}

/// HTTP(S) fetcher. Non-success statuses are errors.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    /// Create a fetcher with [`DEFAULT_FETCH_TIMEOUT`].
    pub fn new() -> Result<Self> {
        Self::with_timeout(DEFAULT_FETCH_TIMEOUT)
    }

    /// Create a fetcher whose requests give up after `timeout`.
    pub fn with_timeout(timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("geopac/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self { client })
    }

    async fn get(&self, url: &str) -> Result<reqwest::Response> {
        let response = self.client.get(url).send().await?.error_for_status()?;
        Ok(response)
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch_text(&self, url: &str) -> Result<String> {
        Ok(self.get(url).await?.text().await?)
    }

    async fn fetch_bytes(&self, url: &str) -> Result<Vec<u8>> {
        Ok(self.get(url).await?.bytes().await?.to_vec())
    }
}
