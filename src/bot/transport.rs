//! Outbound replies.
//!
//! [`ReplySink`] is the seam between the message dispatcher and Telegram;
//! [`TelegramReplySink`] answers one inbound message as a reply to it.

use crate::config::{TELEGRAM_UPLOAD_LIMIT_BYTES, VIDEO_FILE_NAME};
use async_trait::async_trait;
use bytes::Bytes;
use teloxide::prelude::*;
use teloxide::types::{ChatId, InputFile, MessageId, ReplyParameters};
use teloxide::{ApiError, RequestError};
use thiserror::Error;
use tracing::{debug, warn};

/// Telegram error phrases meaning the upload was rejected for its size.
/// Only matched against bodies Telegram could not classify itself.
const PAYLOAD_TOO_LARGE_PATTERNS: &[&str] = &["Request Entity Too Large", "file is too big"];

/// Errors that can occur while sending a reply
#[derive(Debug, Error)]
pub enum SendError {
    /// The attachment exceeds the platform's size limit
    #[error("payload too large: {0}")]
    PayloadTooLarge(String),
    /// Any other Telegram API or network failure
    #[error("Telegram send error: {0}")]
    Telegram(RequestError),
}

/// Check if a Telegram error message reports an oversized payload
fn is_payload_too_large(error_msg: &str) -> bool {
    PAYLOAD_TOO_LARGE_PATTERNS
        .iter()
        .any(|pattern| error_msg.contains(pattern))
}

/// Whether `err` is Telegram refusing the upload for its size.
///
/// The typed API variant covers the normal case. A proxy answering HTTP 413
/// with an HTML page surfaces as `InvalidJson`, and an unrecognised
/// "file is too big" description as `ApiError::Unknown`.
fn rejects_payload_size(err: &RequestError) -> bool {
    match err {
        RequestError::Api(ApiError::RequestEntityTooLarge) => true,
        RequestError::Api(ApiError::Unknown(description)) => is_payload_too_large(description),
        RequestError::InvalidJson { raw, .. } => is_payload_too_large(raw),
        _ => false,
    }
}

impl From<RequestError> for SendError {
    fn from(err: RequestError) -> Self {
        if rejects_payload_size(&err) {
            Self::PayloadTooLarge(err.to_string())
        } else {
            Self::Telegram(err)
        }
    }
}

/// Destination for the replies to one inbound message
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ReplySink: Send + Sync {
    /// Send a plain text reply.
    async fn send_text(&self, text: String) -> Result<(), SendError>;

    /// Send a video attachment with a caption.
    async fn send_video(&self, video: Bytes, caption: String) -> Result<(), SendError>;
}

/// Replies to a Telegram message in its chat.
pub struct TelegramReplySink {
    bot: Bot,
    chat_id: ChatId,
    reply_to: MessageId,
}

impl TelegramReplySink {
    /// Create a sink answering message `reply_to` in `chat_id`.
    pub const fn new(bot: Bot, chat_id: ChatId, reply_to: MessageId) -> Self {
        Self {
            bot,
            chat_id,
            reply_to,
        }
    }
}

#[async_trait]
impl ReplySink for TelegramReplySink {
    async fn send_text(&self, text: String) -> Result<(), SendError> {
        self.bot
            .send_message(self.chat_id, text)
            .reply_parameters(ReplyParameters::new(self.reply_to))
            .await?;
        Ok(())
    }

    async fn send_video(&self, video: Bytes, caption: String) -> Result<(), SendError> {
        let size = video.len();
        if size > TELEGRAM_UPLOAD_LIMIT_BYTES {
            warn!(
                chat_id = %self.chat_id,
                bytes = size,
                "Video exceeds the upload limit, skipping upload"
            );
            return Err(SendError::PayloadTooLarge(format!(
                "{size} bytes (max {TELEGRAM_UPLOAD_LIMIT_BYTES})"
            )));
        }

        debug!(chat_id = %self.chat_id, bytes = size, "Uploading video");
        let file = InputFile::memory(video.to_vec()).file_name(VIDEO_FILE_NAME);
        self.bot
            .send_video(self.chat_id, file)
            .caption(caption)
            .reply_parameters(ReplyParameters::new(self.reply_to))
            .await?;
        Ok(())
    }
}
