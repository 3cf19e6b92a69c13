//! HTTP utilities shared by the resolver and the media fetcher.

use reqwest::Client as HttpClient;
use std::time::Duration;

/// Browser-like user agent; the video CDN rejects requests without one.
pub const USER_AGENT: &str =
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0 Safari/537.36";

/// Creates an HTTP client configured with the given timeout.
///
/// Redirects are followed with reqwest's default policy (up to 10 hops),
/// which is what short-link resolution relies on.
#[must_use]
pub fn create_http_client(timeout_secs: u64) -> HttpClient {
    HttpClient::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .user_agent(USER_AGENT)
        .build()
        .unwrap_or_else(|_| HttpClient::new())
}

/// Returns a short human-readable description of a reqwest error.
#[must_use]
pub fn describe_request_error(err: &reqwest::Error) -> String {
    if err.is_timeout() {
        format!("timeout: {err}")
    } else if err.is_connect() {
        format!("connection failed: {err}")
    } else if err.is_redirect() {
        format!("redirect loop: {err}")
    } else {
        err.to_string()
    }
}
