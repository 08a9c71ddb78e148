//! HTTP fetcher implementation
//!
//! This module handles all HTTP requests for the crawler, including:
//! - Building HTTP clients with proper user agent strings
//! - GET requests for catalog pages
//! - Error classification into `FetchError`
//!
//! The fetcher issues exactly one request per call and never sleeps; spacing
//! requests out is the coordinator's job.

use crate::catalog::CatalogAddress;
use crate::config::UserAgentConfig;
use reqwest::{redirect::Policy, Client, StatusCode};
use std::time::Duration;
use thiserror::Error;
use url::Url;

/// Why a catalog page could not be fetched
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("page {page} ({url}) returned HTTP {status}")]
    Status {
        page: u32,
        url: String,
        status: StatusCode,
    },

    #[error("page {page} ({url}) timed out")]
    Timeout { page: u32, url: String },

    #[error("page {page} ({url}) network error: {source}")]
    Network {
        page: u32,
        url: String,
        source: reqwest::Error,
    },

    #[error("page {page} ({url}) body could not be read: {source}")]
    Body {
        page: u32,
        url: String,
        source: reqwest::Error,
    },

    #[error("page {page} ({url}) is disallowed by robots.txt")]
    Disallowed { page: u32, url: String },

    #[error("page {page} has no valid URL: {source}")]
    InvalidUrl { page: u32, source: url::ParseError },
}

impl FetchError {
    /// The 1-based page index the failure belongs to
    pub fn page(&self) -> u32 {
        match self {
            Self::Status { page, .. }
            | Self::Timeout { page, .. }
            | Self::Network { page, .. }
            | Self::Body { page, .. }
            | Self::Disallowed { page, .. }
            | Self::InvalidUrl { page, .. } => *page,
        }
    }
}

/// Raw markup of one catalog page
#[derive(Debug, Clone)]
pub struct RawPageDocument {
    /// 1-based page index
    pub page: u32,

    /// URL the document was requested from
    pub url: Url,

    /// Full response body
    pub body: String,
}

/// Builds an HTTP client with proper configuration
///
/// # Arguments
///
/// * `config` - The user agent configuration
/// * `timeout` - Whole-request timeout
///
/// # Example
///
/// ```no_run
/// use catalog_snapshot::config::UserAgentConfig;
/// use catalog_snapshot::crawler::build_http_client;
/// use std::time::Duration;
///
/// let config = UserAgentConfig {
///     crawler_name: "CatalogSnapshot".to_string(),
///     crawler_version: "0.1".to_string(),
///     contact_url: "https://example.com/about".to_string(),
///     contact_email: "ops@example.com".to_string(),
/// };
///
/// let client = build_http_client(&config, Duration::from_secs(30)).unwrap();
/// ```
pub fn build_http_client(
    config: &UserAgentConfig,
    timeout: Duration,
) -> Result<Client, reqwest::Error> {
    Client::builder()
        .user_agent(config.header_value())
        .timeout(timeout)
        .connect_timeout(Duration::from_secs(10).min(timeout))
        .redirect(Policy::limited(5))
        .gzip(true)
        .brotli(true)
        .build()
}

/// Fetches catalog pages by index
///
/// Cloning is cheap: the HTTP client is reference counted, so every in-flight
/// fetch can own its own handle.
#[derive(Debug, Clone)]
pub struct PageFetcher {
    client: Client,
    address: CatalogAddress,
}

impl PageFetcher {
    pub fn new(client: Client, address: CatalogAddress) -> Self {
        Self { client, address }
    }

    /// The addressing rules this fetcher uses
    pub fn address(&self) -> &CatalogAddress {
        &self.address
    }

    /// Fetches the document for a 1-based page index
    ///
    /// # Error Classification
    ///
    /// | Condition | Result |
    /// |-----------|--------|
    /// | 2xx | `Ok(RawPageDocument)` |
    /// | Any other status | `FetchError::Status` |
    /// | Timeout (connect or body) | `FetchError::Timeout` |
    /// | Connection / DNS / TLS failure | `FetchError::Network` |
    /// | Body cut off or undecodable | `FetchError::Body` |
    pub async fn fetch(&self, page: u32) -> Result<RawPageDocument, FetchError> {
        let url = self
            .address
            .page_url(page)
            .map_err(|source| FetchError::InvalidUrl { page, source })?;

        tracing::debug!("Fetching page {}: {}", page, url);

        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(|e| classify_request_error(page, &url, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                page,
                url: url.to_string(),
                status,
            });
        }

        let body = response.text().await.map_err(|e| {
            if e.is_timeout() {
                FetchError::Timeout {
                    page,
                    url: url.to_string(),
                }
            } else {
                FetchError::Body {
                    page,
                    url: url.to_string(),
                    source: e,
                }
            }
        })?;

        Ok(RawPageDocument { page, url, body })
    }

    /// Fetches the catalog host's robots.txt
    ///
    /// Returns None when the file is missing or unreachable, which callers
    /// treat as "everything allowed".
    pub async fn fetch_robots(&self) -> Option<String> {
        let url = self.address.robots_url().ok()?;

        match self.client.get(url.clone()).send().await {
            Ok(response) if response.status().is_success() => response.text().await.ok(),
            Ok(response) => {
                tracing::debug!("No robots.txt at {} (HTTP {})", url, response.status());
                None
            }
            Err(e) => {
                tracing::debug!("Failed to fetch robots.txt from {}: {}", url, e);
                None
            }
        }
    }
}

fn classify_request_error(page: u32, url: &Url, error: reqwest::Error) -> FetchError {
    if error.is_timeout() {
        FetchError::Timeout {
            page,
            url: url.to_string(),
        }
    } else {
        FetchError::Network {
            page,
            url: url.to_string(),
            source: error,
        }
    }
}
