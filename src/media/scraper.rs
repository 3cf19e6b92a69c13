//! Hybrid-parsing scraper client.
//!
//! The scraper API turns a TikTok/Douyin page URL into a JSON description of
//! the post. The response is decoded into [`HybridParseResult`], whose fields
//! are all optional, and validated once into [`MediaUrls`].

use super::FetchError;
use crate::config::SCRAPER_HYBRID_PATH;
use crate::http_utils::describe_request_error;
use crate::resolver::ResolvedLink;
use async_trait::async_trait;
use reqwest::Client as HttpClient;
use serde::Deserialize;
use tracing::{debug, info};

/// Structured description of a post as returned by hybrid parsing.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct HybridParseResult {
    /// Video section with the no-watermark variants
    pub video_data: Option<VideoData>,
    /// Background music section
    pub music: Option<MusicData>,
    /// Post description, used as the caption
    pub desc: Option<String>,
}

/// Video section of a hybrid-parse result.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct VideoData {
    /// Standard-quality no-watermark video
    pub nwm_video_url: Option<String>,
    /// High-quality no-watermark video
    #[serde(rename = "nwm_video_url_HQ")]
    pub nwm_video_url_hq: Option<String>,
}

/// Music section of a hybrid-parse result.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct MusicData {
    /// Playable audio location
    pub play_url: Option<PlayUrl>,
}

/// Audio location; `uri` is preferred, `url_list` is the CDN mirror list.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PlayUrl {
    /// Direct audio URL
    pub uri: Option<String>,
    /// Mirror URLs
    #[serde(default)]
    pub url_list: Vec<String>,
}

/// The four values the fetcher needs, all guaranteed non-empty.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaUrls {
    /// Standard-quality video URL
    pub video: String,
    /// High-quality video URL
    pub video_hq: String,
    /// Audio play URL
    pub audio: String,
    /// Caption text
    pub caption: String,
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

impl TryFrom<HybridParseResult> for MediaUrls {
    type Error = FetchError;

    fn try_from(result: HybridParseResult) -> Result<Self, Self::Error> {
        let (Some(video_data), Some(music), Some(desc)) = (result.video_data, result.music, result.desc)
        else {
            return Err(FetchError::MalformedUpstream(
                "missing video_data, music or desc section".to_string(),
            ));
        };

        let video = non_empty(video_data.nwm_video_url);
        let video_hq = non_empty(video_data.nwm_video_url_hq);
        let audio = music.play_url.and_then(|play| {
            non_empty(play.uri).or_else(|| non_empty(play.url_list.into_iter().next()))
        });
        let caption = non_empty(Some(desc));

        match (video, video_hq, audio, caption) {
            (Some(video), Some(video_hq), Some(audio), Some(caption)) => Ok(Self {
                video,
                video_hq,
                audio,
                caption,
            }),
            (video, video_hq, audio, caption) => {
                let missing = [
                    ("video", video.is_none()),
                    ("video_hq", video_hq.is_none()),
                    ("audio", audio.is_none()),
                    ("caption", caption.is_none()),
                ]
                .into_iter()
                .filter_map(|(name, absent)| absent.then_some(name))
                .collect();
                Err(FetchError::IncompleteFields(missing))
            }
        }
    }
}

/// Interface for the hybrid-parsing collaborator
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait HybridParser: Send + Sync {
    /// Parse a post page. `Ok(None)` means the collaborator returned nothing.
    async fn hybrid_parse(
        &self,
        link: &ResolvedLink,
    ) -> Result<Option<HybridParseResult>, FetchError>;
}

/// Client for a self-hosted hybrid-parsing API.
#[derive(Clone)]
pub struct ScraperApiClient {
    client: HttpClient,
    base_url: String,
}

impl ScraperApiClient {
    /// Create a client for the API at `base_url`.
    #[must_use]
    pub fn new(client: HttpClient, base_url: &str) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    fn endpoint(&self) -> String {
        format!("{}{SCRAPER_HYBRID_PATH}", self.base_url)
    }
}

#[async_trait]
impl HybridParser for ScraperApiClient {
    async fn hybrid_parse(
        &self,
        link: &ResolvedLink,
    ) -> Result<Option<HybridParseResult>, FetchError> {
        let response = self
            .client
            .get(self.endpoint())
            .query(&[("url", link.as_str()), ("minimal", "false")])
            .send()
            .await
            .map_err(|e| FetchError::Request(describe_request_error(&e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Request(format!(
                "scraper API returned HTTP {status}"
            )));
        }

        let body = response
            .text()
            .await
            .map_err(|e| FetchError::Request(describe_request_error(&e)))?;
        let trimmed = body.trim();
        if trimmed.is_empty() || trimmed == "null" || trimmed == "{}" {
            return Ok(None);
        }

        debug!(bytes = trimmed.len(), "Scraper API response received");
        let result: HybridParseResult = serde_json::from_str(trimmed)
            .map_err(|e| FetchError::MalformedUpstream(e.to_string()))?;
        info!(
            has_video = result.video_data.is_some(),
            has_music = result.music.is_some(),
            has_desc = result.desc.is_some(),
            "API response parsed"
        );
        Ok(Some(result))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http_utils::create_http_client;
    use serde_json::json;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn full_payload() -> serde_json::Value {
        json!({
            "status": "success",
            "type": "video",
            "platform": "tiktok",
            "desc": "funny cat",
            "video_data": {
                "wm_video_url": "https://v.tiktok.com/wm.mp4",
                "nwm_video_url": "https://v.tiktok.com/nwm.mp4",
                "nwm_video_url_HQ": "https://v.tiktok.com/nwm_hq.mp4"
            },
            "music": {
                "title": "original sound",
                "play_url": {
                    "uri": "https://sf.tiktok.com/audio.mp3",
                    "url_list": ["https://sf16.tiktok.com/audio.mp3"]
                }
            }
        })
    }

    #[test]
    fn test_media_urls_from_full_result() -> Result<(), Box<dyn std::error::Error>> {
        let result: HybridParseResult = serde_json::from_value(full_payload())?;
        let urls = MediaUrls::try_from(result)?;
        assert_eq!(urls.video, "https://v.tiktok.com/nwm.mp4");
        assert_eq!(urls.video_hq, "https://v.tiktok.com/nwm_hq.mp4");
        assert_eq!(urls.audio, "https://sf.tiktok.com/audio.mp3");
        assert_eq!(urls.caption, "funny cat");
        Ok(())
    }

    #[test]
    fn test_missing_music_section_is_malformed() -> Result<(), Box<dyn std::error::Error>> {
        let mut payload = full_payload();
        if let Some(obj) = payload.as_object_mut() {
            obj.remove("music");
        }
        let result: HybridParseResult = serde_json::from_value(payload)?;
        assert!(matches!(
            MediaUrls::try_from(result),
            Err(FetchError::MalformedUpstream(_))
        ));
        Ok(())
    }

    #[test]
    fn test_empty_fields_are_reported_by_name() -> Result<(), Box<dyn std::error::Error>> {
        let mut payload = full_payload();
        payload["desc"] = json!("   ");
        payload["video_data"]["nwm_video_url_HQ"] = json!(null);
        let result: HybridParseResult = serde_json::from_value(payload)?;

        match MediaUrls::try_from(result) {
            Err(FetchError::IncompleteFields(missing)) => {
                assert_eq!(missing, vec!["video_hq", "caption"]);
            }
            other => panic!("expected incomplete fields, got {other:?}"),
        }
        Ok(())
    }

    #[test]
    fn test_audio_falls_back_to_url_list() -> Result<(), Box<dyn std::error::Error>> {
        let mut payload = full_payload();
        payload["music"]["play_url"]["uri"] = json!("");
        let result: HybridParseResult = serde_json::from_value(payload)?;
        let urls = MediaUrls::try_from(result)?;
        assert_eq!(urls.audio, "https://sf16.tiktok.com/audio.mp3");
        Ok(())
    }

    #[tokio::test]
    async fn test_client_queries_hybrid_endpoint() -> Result<(), Box<dyn std::error::Error>> {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api"))
            .and(query_param("url", "https://www.tiktok.com/@user/video/12345"))
            .respond_with(ResponseTemplate::new(200).set_body_json(full_payload()))
            .expect(1)
            .mount(&server)
            .await;

        let client = ScraperApiClient::new(create_http_client(5), &format!("{}/", server.uri()));
        let link = ResolvedLink::new("https://www.tiktok.com/@user/video/12345");
        let result = client.hybrid_parse(&link).await?;
        let urls = MediaUrls::try_from(result.ok_or("empty result")?)?;
        assert_eq!(urls.caption, "funny cat");
        Ok(())
    }

    #[tokio::test]
    async fn test_client_maps_null_body_to_none() -> Result<(), Box<dyn std::error::Error>> {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api"))
            .respond_with(ResponseTemplate::new(200).set_body_string("null"))
            .mount(&server)
            .await;

        let client = ScraperApiClient::new(create_http_client(5), &server.uri());
        let result = client.hybrid_parse(&ResolvedLink::new("https://www.tiktok.com/x")).await?;
        assert!(result.is_none());
        Ok(())
    }

    #[tokio::test]
    async fn test_client_rejects_non_json_body() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>oops</html>"))
            .mount(&server)
            .await;

        let client = ScraperApiClient::new(create_http_client(5), &server.uri());
        let result = client
            .hybrid_parse(&ResolvedLink::new("https://www.tiktok.com/x"))
            .await;
        assert!(matches!(result, Err(FetchError::MalformedUpstream(_))));
    }

    #[tokio::test]
    async fn test_client_reports_server_errors() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let client = ScraperApiClient::new(create_http_client(5), &server.uri());
        let result = client
            .hybrid_parse(&ResolvedLink::new("https://www.tiktok.com/x"))
            .await;
        assert!(matches!(result, Err(FetchError::Request(_))));
    }
}
