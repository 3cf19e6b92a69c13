//! Short-link resolution.
//!
//! Follows HTTP redirects from a user-supplied link (e.g. `vt.tiktok.com/...`)
//! and returns the final page URL the scraper can parse.

use crate::http_utils::describe_request_error;
use async_trait::async_trait;
use reqwest::Client as HttpClient;
use std::fmt;
use thiserror::Error;
use tracing::{error, info};

/// Absolute URL reached after following all redirects.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedLink(String);

impl ResolvedLink {
    /// Wrap an already-resolved URL.
    #[must_use]
    pub fn new(url: impl Into<String>) -> Self {
        Self(url.into())
    }

    /// Borrow the URL as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ResolvedLink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Errors that can occur while resolving a link
#[derive(Debug, Error)]
pub enum ResolveError {
    /// Network-layer failure while following redirects
    #[error("resolution error: {0}")]
    Request(String),
}

/// Interface for link resolvers
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait UrlResolver: Send + Sync {
    /// Follow redirects from `url` and return the final destination.
    async fn resolve(&self, url: &str) -> Result<ResolvedLink, ResolveError>;
}

/// Resolver backed by a redirect-following reqwest client.
#[derive(Clone)]
pub struct HttpUrlResolver {
    client: HttpClient,
}

impl HttpUrlResolver {
    /// Create a resolver using the shared HTTP client.
    #[must_use]
    pub const fn new(client: HttpClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl UrlResolver for HttpUrlResolver {
    async fn resolve(&self, url: &str) -> Result<ResolvedLink, ResolveError> {
        // The status of the final hop is irrelevant, only where it lives
        match self.client.head(url.trim()).send().await {
            Ok(response) => {
                let resolved = response.url().to_string();
                info!("Resolved URL: {resolved}");
                Ok(ResolvedLink(resolved))
            }
            Err(e) => {
                let reason = describe_request_error(&e);
                error!("Error resolving short URL: {reason}");
                Err(ResolveError::Request(reason))
            }
        }
    }
}
