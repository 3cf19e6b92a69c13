//! Media fetching
//!
//! Turns a resolved post URL into a [`MediaBundle`]: hybrid-parses the post,
//! validates the result and downloads both no-watermark video variants.

/// Hybrid-parsing scraper client and typed result
pub mod scraper;

use crate::http_utils::describe_request_error;
use crate::resolver::ResolvedLink;
use async_trait::async_trait;
use bytes::Bytes;
use futures_util::FutureExt;
use reqwest::{Client as HttpClient, StatusCode};
use scraper::{HybridParser, MediaUrls};
use std::fmt;
use std::panic::AssertUnwindSafe;
use thiserror::Error;
use tracing::{error, info};

/// Which of the two video variants a download refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VideoVariant {
    /// Standard-quality no-watermark video
    Standard,
    /// High-quality no-watermark video
    HighQuality,
}

impl fmt::Display for VideoVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Standard => f.write_str("standard"),
            Self::HighQuality => f.write_str("high-quality"),
        }
    }
}

/// Errors that can occur while fetching media
#[derive(Debug, Error)]
pub enum FetchError {
    /// The scraper returned nothing, or a result without the required sections
    #[error("malformed upstream result: {0}")]
    MalformedUpstream(String),
    /// One or more of the required media fields is absent or empty
    #[error("incomplete media fields: missing {}", .0.join(", "))]
    IncompleteFields(Vec<&'static str>),
    /// A video download answered with a non-200 status
    #[error("download failed ({variant}): HTTP {status}")]
    DownloadFailed {
        /// Variant being downloaded
        variant: VideoVariant,
        /// HTTP status received
        status: u16,
    },
    /// Network or HTTP-layer error
    #[error("request error: {0}")]
    Request(String),
    /// Anything else
    #[error("unexpected error: {0}")]
    Unexpected(String),
}

impl FetchError {
    /// Log category of the error: `request`, `shape` or `other`.
    #[must_use]
    pub const fn category(&self) -> &'static str {
        match self {
            Self::Request(_) | Self::DownloadFailed { .. } => "request",
            Self::MalformedUpstream(_) | Self::IncompleteFields(_) => "shape",
            Self::Unexpected(_) => "other",
        }
    }
}

/// Downloaded media for one post.
///
/// Every field is guaranteed non-empty; there is no way to build a partial
/// bundle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaBundle {
    video: Bytes,
    video_hq: Bytes,
    audio_url: String,
    caption: String,
    video_hq_url: String,
}

impl MediaBundle {
    /// Assemble a bundle.
    ///
    /// # Errors
    ///
    /// Returns [`FetchError::IncompleteFields`] naming every empty field.
    pub fn new(
        video: Bytes,
        video_hq: Bytes,
        audio_url: impl Into<String>,
        caption: impl Into<String>,
        video_hq_url: impl Into<String>,
    ) -> Result<Self, FetchError> {
        let audio_url = audio_url.into();
        let caption = caption.into();
        let video_hq_url = video_hq_url.into();

        let missing: Vec<&'static str> = [
            ("video", video.is_empty()),
            ("video_hq", video_hq.is_empty()),
            ("audio", audio_url.trim().is_empty()),
            ("caption", caption.trim().is_empty()),
            ("video_hq_url", video_hq_url.trim().is_empty()),
        ]
        .into_iter()
        .filter_map(|(name, empty)| empty.then_some(name))
        .collect();

        if !missing.is_empty() {
            return Err(FetchError::IncompleteFields(missing));
        }

        Ok(Self {
            video,
            video_hq,
            audio_url,
            caption,
            video_hq_url,
        })
    }

    /// Standard-quality video bytes.
    #[must_use]
    pub const fn video(&self) -> &Bytes {
        &self.video
    }

    /// High-quality video bytes.
    #[must_use]
    pub const fn video_hq(&self) -> &Bytes {
        &self.video_hq
    }

    /// Audio play URL.
    #[must_use]
    pub fn audio_url(&self) -> &str {
        &self.audio_url
    }

    /// Post description.
    #[must_use]
    pub fn caption(&self) -> &str {
        &self.caption
    }

    /// High-quality video URL, shown to the user as a link.
    #[must_use]
    pub fn video_hq_url(&self) -> &str {
        &self.video_hq_url
    }
}

/// Interface for media sources
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MediaSource: Send + Sync {
    /// Fetch the media bundle for a resolved post URL.
    async fn fetch(&self, link: &ResolvedLink) -> Result<MediaBundle, FetchError>;
}

/// Media fetcher backed by a hybrid parser and plain HTTP downloads.
pub struct MediaFetcher<P> {
    parser: P,
    client: HttpClient,
}

impl<P: HybridParser> MediaFetcher<P> {
    /// Create a fetcher.
    #[must_use]
    pub const fn new(parser: P, client: HttpClient) -> Self {
        Self { parser, client }
    }

    async fn fetch_inner(&self, link: &ResolvedLink) -> Result<MediaBundle, FetchError> {
        let result = self
            .parser
            .hybrid_parse(link)
            .await?
            .ok_or_else(|| FetchError::MalformedUpstream("no result returned".to_string()))?;

        let urls = MediaUrls::try_from(result)?;
        info!("Video URL: {}", urls.video);
        info!("Video_HQ URL: {}", urls.video_hq);
        info!("Play URL: {}", urls.audio);
        info!("Caption: {}", urls.caption);

        let (video, video_hq) = tokio::join!(
            self.download(&urls.video, VideoVariant::Standard),
            self.download(&urls.video_hq, VideoVariant::HighQuality),
        );

        MediaBundle::new(video?, video_hq?, urls.audio, urls.caption, urls.video_hq)
    }

    async fn download(&self, url: &str, variant: VideoVariant) -> Result<Bytes, FetchError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| FetchError::Request(describe_request_error(&e)))?;

        let status = response.status();
        if status != StatusCode::OK {
            error!("Failed to download {variant} MP4. Status code: {status}");
            return Err(FetchError::DownloadFailed {
                variant,
                status: status.as_u16(),
            });
        }

        let content = response
            .bytes()
            .await
            .map_err(|e| FetchError::Request(describe_request_error(&e)))?;
        info!(variant = %variant, bytes = content.len(), "Video downloaded");
        Ok(content)
    }
}

#[async_trait]
impl<P: HybridParser> MediaSource for MediaFetcher<P> {
    async fn fetch(&self, link: &ResolvedLink) -> Result<MediaBundle, FetchError> {
        let outcome = AssertUnwindSafe(self.fetch_inner(link))
            .catch_unwind()
            .await
            .unwrap_or_else(|panic| {
                let reason = panic
                    .downcast_ref::<&str>()
                    .map(ToString::to_string)
                    .or_else(|| panic.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "panic while fetching media".to_string());
                Err(FetchError::Unexpected(reason))
            });

        if let Err(e) = &outcome {
            error!(category = e.category(), url = %link, "Media fetch failed: {e}");
        }
        outcome
    }
}
