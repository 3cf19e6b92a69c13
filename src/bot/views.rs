//! User-facing texts
//!
//! Contains static replies and formatters for the video caption and the
//! size-exceeded fallback.

use crate::config::{TELEGRAM_CAPTION_LIMIT, TELEGRAM_MESSAGE_LIMIT};
use crate::media::MediaBundle;
use crate::utils::truncate_str;

// ─────────────────────────────────────────────────────────────────────────────
// Static replies
// ─────────────────────────────────────────────────────────────────────────────

/// `/help` reply
pub const HELP_TEXT: &str = "Send me a TikTok link and I will reply with the video without a watermark.";
/// `/custom` reply
pub const CUSTOM_TEXT: &str = "This is custom command";
/// `/start` reply when no support link is configured
pub const START_TEXT: &str = "Hi! Send me a TikTok link to get the video without a watermark.";
/// Reply to a direct message that does not contain a TikTok link
pub const SEND_VALID_LINK: &str = "Please send a TikTok URL";
/// Reply when the short link cannot be followed
pub const RESOLVE_FAILED: &str =
    "Failed to resolve TikTok URL. Please ensure the URL is correct.";
/// Reply when the media cannot be fetched
pub const PROCESSING_FAILED: &str =
    "Failed to process the TikTok URL. Please ensure the URL is correct and try again.";
/// Prefix of the fallback reply sent instead of an oversized video
pub const SIZE_EXCEEDED_NOTICE: &str = "Video is too large, sending link instead";

// ─────────────────────────────────────────────────────────────────────────────
// Formatters
// ─────────────────────────────────────────────────────────────────────────────

/// `/start` reply.
#[must_use]
pub fn start_text(support_url: Option<&str>) -> String {
    match support_url.map(str::trim).filter(|url| !url.is_empty()) {
        Some(url) => format!("Support me on : {url}"),
        None => START_TEXT.to_string(),
    }
}

fn details(bundle: &MediaBundle) -> String {
    format!(
        "Link:\n{}\n\nSound:\n{}\n\nCaption:\n{}",
        bundle.video_hq_url(),
        bundle.audio_url(),
        bundle.caption()
    )
}

/// Caption attached to the video, cut to the Telegram caption limit.
#[must_use]
pub fn video_caption(bundle: &MediaBundle) -> String {
    truncate_str(details(bundle), TELEGRAM_CAPTION_LIMIT)
}

/// Text reply sent when the video is too large to upload.
#[must_use]
pub fn size_exceeded_text(bundle: &MediaBundle) -> String {
    truncate_str(
        format!("{SIZE_EXCEEDED_NOTICE}\n\n{}", details(bundle)),
        TELEGRAM_MESSAGE_LIMIT,
    )
}
