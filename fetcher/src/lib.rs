//! Fetches the textual content of remote pages for the `fetch` tool.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;
use url::Url;

pub const DEFAULT_READER_PREFIX: &str = "https://r.jina.ai/";

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("invalid url `{url}`: {reason}")]
    InvalidUrl { url: String, reason: String },
    #[error("request to {url} failed: {reason}")]
    Request { url: String, reason: String },
    #[error("{url} returned HTTP {status}")]
    Status { url: String, status: u16 },
    #[error("client setup failed: {0}")]
    Client(String),
}

/// Source of remote text. The gateway only ever talks to this trait.
#[async_trait]
pub trait ContentFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<String, FetchError>;
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FetchConfig {
    pub timeout_secs: u64,
    pub user_agent: String,
    /// Prepended to the target URL, e.g. a reader service that renders pages as markdown.
    pub reader_prefix: Option<String>,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 30,
            user_agent: concat!("docsift-fetcher/", env!("CARGO_PKG_VERSION")).to_string(),
            reader_prefix: Some(DEFAULT_READER_PREFIX.to_string()),
        }
    }
}

/// HTTP fetcher backed by reqwest. No retries; the first failure is returned.
pub struct ReaderFetcher {
    client: Client,
    reader_prefix: Option<String>,
}

impl ReaderFetcher {
    pub fn new(config: &FetchConfig) -> Result<Self, FetchError> {
        let client = Client::builder()
            .user_agent(config.user_agent.clone())
            .redirect(reqwest::redirect::Policy::limited(5))
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| FetchError::Client(e.to_string()))?;
        Ok(Self { client, reader_prefix: config.reader_prefix.clone() })
    }

    /// The URL actually requested for `url`.
    pub fn request_url(&self, url: &str) -> Result<Url, FetchError> {
        let target = Url::parse(url).map_err(|e| FetchError::InvalidUrl { url: url.to_string(), reason: e.to_string() })?;
        if !matches!(target.scheme(), "http" | "https") {
            return Err(FetchError::InvalidUrl { url: url.to_string(), reason: format!("unsupported scheme `{}`", target.scheme()) });
        }
        match &self.reader_prefix {
            Some(prefix) => Url::parse(&format!("{prefix}{target}"))
                .map_err(|e| FetchError::InvalidUrl { url: url.to_string(), reason: e.to_string() }),
            None => Ok(target),
        }
    }
}

#[async_trait]
impl ContentFetcher for ReaderFetcher {
    async fn fetch(&self, url: &str) -> Result<String, FetchError> {
        let request_url = self.request_url(url)?;
        tracing::debug!(%request_url, "fetching");
        let resp = self
            .client
            .get(request_url)
            .send()
            .await
            .map_err(|e| FetchError::Request { url: url.to_string(), reason: e.to_string() })?;
        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            tracing::warn!(url, status, "fetch returned non-success status");
            return Err(FetchError::Status { url: url.to_string(), status });
        }
        let text = resp
            .text()
            .await
            .map_err(|e| FetchError::Request { url: url.to_string(), reason: e.to_string() })?;
        tracing::info!(url, bytes = text.len(), "fetched");
        Ok(text)
    }
}

/// Case-insensitive count of non-overlapping occurrences of `needle`.
pub fn count_occurrences(haystack: &str, needle: &str) -> usize {
    if needle.is_empty() { return 0; }
    haystack.to_lowercase().matches(&needle.to_lowercase()).count()
}
