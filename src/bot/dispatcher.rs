//! Message dispatcher.
//!
//! Every inbound message runs through an explicit state machine:
//!
//! ```text
//! Classify ─▶ Validate ─▶ Resolve ─▶ Fetch ─▶ Reply ─▶ Done
//!    │           │           │         │
//!    └───────────┴───────────┴─────────┴──────────────▶ Done
//! ```
//!
//! No state survives past `Done`; messages are handled independently.

use crate::bot::transport::{ReplySink, SendError};
use crate::bot::views;
use crate::config::TIKTOK_DOMAIN_MARKER;
use crate::media::{MediaBundle, MediaSource};
use crate::resolver::{ResolvedLink, UrlResolver};
use crate::utils::{contains_mention, extract_link, strip_mention};
use tracing::{debug, info, warn};

/// Kind of chat a message arrived in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChatKind {
    /// One-to-one chat with the bot
    Direct,
    /// Group or supergroup
    Group,
}

/// Transport-independent view of an inbound chat message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundMessage {
    /// Chat identifier
    pub chat_id: i64,
    /// Chat kind
    pub kind: ChatKind,
    /// Sender identifier, absent for anonymous senders
    pub sender_id: Option<u64>,
    /// Raw text body (empty for messages without text)
    pub text: String,
}

/// Terminal result of handling one message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Group message without a mention; nothing was sent
    Ignored,
    /// No link in the text; asked for a valid one
    PromptedForLink,
    /// The link could not be resolved
    ResolutionFailed,
    /// The media could not be fetched
    FetchFailed,
    /// The video was delivered
    VideoSent,
    /// The video was too large; the link fallback was delivered
    SizeFallbackSent,
}

/// Dispatcher states.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchState {
    /// Inspect the chat kind
    Classify,
    /// Check the text for the domain marker
    Validate {
        /// Text to inspect, with the mention already removed in groups
        text: String,
    },
    /// Follow redirects from the candidate link
    Resolve {
        /// Candidate link extracted from the text
        link: String,
    },
    /// Fetch the media behind the resolved link
    Fetch(ResolvedLink),
    /// Deliver the media
    Reply(MediaBundle),
    /// Terminal state
    Done(Outcome),
}

/// Routes inbound messages through resolution, fetching and reply.
pub struct MessageDispatcher<R, M> {
    resolver: R,
    media: M,
    mention: String,
}

impl<R: UrlResolver, M: MediaSource> MessageDispatcher<R, M> {
    /// Create a dispatcher; `mention` is the bot's `@name` handle.
    pub fn new(resolver: R, media: M, mention: impl Into<String>) -> Self {
        Self {
            resolver,
            media,
            mention: mention.into(),
        }
    }

    /// Run the state machine for `msg` until it reaches `Done`.
    ///
    /// # Errors
    ///
    /// Returns a [`SendError`] if a reply cannot be delivered and no fallback
    /// applies. The caller is expected to log it.
    pub async fn handle(
        &self,
        msg: &InboundMessage,
        sink: &dyn ReplySink,
    ) -> Result<Outcome, SendError> {
        info!(
            chat_id = msg.chat_id,
            kind = ?msg.kind,
            sender = ?msg.sender_id,
            "User message: {:?}",
            msg.text
        );

        let mut state = DispatchState::Classify;
        loop {
            state = match state {
                DispatchState::Done(outcome) => {
                    debug!(chat_id = msg.chat_id, ?outcome, "Message handled");
                    return Ok(outcome);
                }
                other => self.step(other, msg, sink).await?,
            };
        }
    }

    /// Perform a single transition.
    ///
    /// `Done` is returned unchanged.
    ///
    /// # Errors
    ///
    /// Returns a [`SendError`] if a reply cannot be delivered.
    pub async fn step(
        &self,
        state: DispatchState,
        msg: &InboundMessage,
        sink: &dyn ReplySink,
    ) -> Result<DispatchState, SendError> {
        let next = match state {
            DispatchState::Classify => self.classify(msg),
            DispatchState::Validate { text } => {
                if text.contains(TIKTOK_DOMAIN_MARKER) {
                    DispatchState::Resolve {
                        link: extract_link(&text, TIKTOK_DOMAIN_MARKER),
                    }
                } else {
                    sink.send_text(views::SEND_VALID_LINK.to_string()).await?;
                    DispatchState::Done(Outcome::PromptedForLink)
                }
            }
            DispatchState::Resolve { link } => match self.resolver.resolve(&link).await {
                Ok(resolved) => DispatchState::Fetch(resolved),
                Err(e) => {
                    warn!(chat_id = msg.chat_id, "Link resolution failed: {e}");
                    sink.send_text(views::RESOLVE_FAILED.to_string()).await?;
                    DispatchState::Done(Outcome::ResolutionFailed)
                }
            },
            DispatchState::Fetch(resolved) => match self.media.fetch(&resolved).await {
                Ok(bundle) => DispatchState::Reply(bundle),
                Err(e) => {
                    warn!(chat_id = msg.chat_id, category = e.category(), "Fetch failed: {e}");
                    sink.send_text(views::PROCESSING_FAILED.to_string()).await?;
                    DispatchState::Done(Outcome::FetchFailed)
                }
            },
            DispatchState::Reply(bundle) => DispatchState::Done(reply(&bundle, sink).await?),
            DispatchState::Done(outcome) => DispatchState::Done(outcome),
        };
        Ok(next)
    }

    fn classify(&self, msg: &InboundMessage) -> DispatchState {
        match msg.kind {
            ChatKind::Direct => DispatchState::Validate {
                text: msg.text.clone(),
            },
            ChatKind::Group if contains_mention(&msg.text, &self.mention) => {
                DispatchState::Validate {
                    text: strip_mention(&msg.text, &self.mention),
                }
            }
            ChatKind::Group => DispatchState::Done(Outcome::Ignored),
        }
    }
}

async fn reply(bundle: &MediaBundle, sink: &dyn ReplySink) -> Result<Outcome, SendError> {
    let caption = views::video_caption(bundle);
    match sink.send_video(bundle.video_hq().clone(), caption).await {
        Ok(()) => Ok(Outcome::VideoSent),
        Err(SendError::PayloadTooLarge(reason)) => {
            warn!("Video is too large, sending link instead ({reason})");
            sink.send_text(views::size_exceeded_text(bundle)).await?;
            Ok(Outcome::SizeFallbackSent)
        }
        Err(e) => Err(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bot::transport::MockReplySink;
    use crate::media::{FetchError, MockMediaSource};
    use crate::resolver::{MockUrlResolver, ResolveError};
    use bytes::Bytes;
    use teloxide::{ApiError, RequestError};

    const SHORT: &str = "https://vt.tiktok.com/ABC123";
    const RESOLVED: &str = "https://www.tiktok.com/@user/video/12345";
    const AUDIO: &str = "https://sf.tiktok.com/audio.mp3";

    fn direct(text: &str) -> InboundMessage {
        InboundMessage {
            chat_id: 42,
            kind: ChatKind::Direct,
            sender_id: Some(7),
            text: text.to_string(),
        }
    }

    fn group(text: &str) -> InboundMessage {
        InboundMessage {
            kind: ChatKind::Group,
            ..direct(text)
        }
    }

    fn bundle() -> MediaBundle {
        match MediaBundle::new(
            Bytes::from_static(b"sd"),
            Bytes::from_static(b"hq"),
            AUDIO,
            "funny cat",
            RESOLVED,
        ) {
            Ok(bundle) => bundle,
            Err(e) => panic!("test bundle must be valid: {e}"),
        }
    }

    fn resolver_ok() -> MockUrlResolver {
        let mut resolver = MockUrlResolver::new();
        resolver
            .expect_resolve()
            .withf(|url| url == SHORT)
            .times(1)
            .returning(|_| Ok(ResolvedLink::new(RESOLVED)));
        resolver
    }

    fn media_ok() -> MockMediaSource {
        let mut media = MockMediaSource::new();
        media
            .expect_fetch()
            .withf(|link| link.as_str() == RESOLVED)
            .times(1)
            .returning(|_| Ok(bundle()));
        media
    }

    fn untouched() -> (MockUrlResolver, MockMediaSource) {
        let mut resolver = MockUrlResolver::new();
        resolver.expect_resolve().never();
        let mut media = MockMediaSource::new();
        media.expect_fetch().never();
        (resolver, media)
    }

    fn text_sink(expected: &'static str) -> MockReplySink {
        let mut sink = MockReplySink::new();
        sink.expect_send_text()
            .withf(move |text| text == expected)
            .times(1)
            .returning(|_| Ok(()));
        sink.expect_send_video().never();
        sink
    }

    #[tokio::test]
    async fn test_direct_without_marker_prompts_for_link() -> Result<(), SendError> {
        let (resolver, media) = untouched();
        let dispatcher = MessageDispatcher::new(resolver, media, "@relay_bot");
        let sink = text_sink(views::SEND_VALID_LINK);

        let outcome = dispatcher.handle(&direct("hello there"), &sink).await?;
        assert_eq!(outcome, Outcome::PromptedForLink);
        Ok(())
    }

    #[tokio::test]
    async fn test_group_without_mention_is_ignored() -> Result<(), SendError> {
        let (resolver, media) = untouched();
        let dispatcher = MessageDispatcher::new(resolver, media, "@relay_bot");
        let mut sink = MockReplySink::new();
        sink.expect_send_text().never();
        sink.expect_send_video().never();

        let outcome = dispatcher.handle(&group(SHORT), &sink).await?;
        assert_eq!(outcome, Outcome::Ignored);
        Ok(())
    }

    #[tokio::test]
    async fn test_group_mention_is_stripped_before_validation() -> Result<(), SendError> {
        let (resolver, media) = untouched();
        let dispatcher = MessageDispatcher::new(resolver, media, "@relay_bot");

        let state = dispatcher
            .step(
                DispatchState::Classify,
                &group(&format!("@Relay_Bot {SHORT}")),
                &MockReplySink::new(),
            )
            .await?;
        assert_eq!(
            state,
            DispatchState::Validate {
                text: SHORT.to_string()
            }
        );
        Ok(())
    }

    #[tokio::test]
    async fn test_group_mention_next_to_non_ascii_text() -> Result<(), SendError> {
        let (resolver, media) = untouched();
        let dispatcher = MessageDispatcher::new(resolver, media, "@relay_bot");

        let state = dispatcher
            .step(
                DispatchState::Classify,
                &group(&format!("\u{2126}@relay_bot\u{023A} {SHORT}")),
                &MockReplySink::new(),
            )
            .await?;
        assert_eq!(
            state,
            DispatchState::Validate {
                text: format!("\u{2126}\u{023A} {SHORT}")
            }
        );
        Ok(())
    }

    #[tokio::test]
    async fn test_group_mention_of_other_bot_is_ignored() -> Result<(), SendError> {
        let (resolver, media) = untouched();
        let dispatcher = MessageDispatcher::new(resolver, media, "@relay_bot");
        let mut sink = MockReplySink::new();
        sink.expect_send_text().never();

        let outcome = dispatcher
            .handle(&group(&format!("@relay_botfather {SHORT}")), &sink)
            .await?;
        assert_eq!(outcome, Outcome::Ignored);
        Ok(())
    }

    #[tokio::test]
    async fn test_group_mention_with_link_is_processed() -> Result<(), SendError> {
        let dispatcher = MessageDispatcher::new(resolver_ok(), media_ok(), "@relay_bot");
        let mut sink = MockReplySink::new();
        sink.expect_send_video().times(1).returning(|_, _| Ok(()));

        let outcome = dispatcher
            .handle(&group(&format!("@relay_bot {SHORT}")), &sink)
            .await?;
        assert_eq!(outcome, Outcome::VideoSent);
        Ok(())
    }

    #[tokio::test]
    async fn test_resolver_failure_skips_fetch() -> Result<(), SendError> {
        let mut resolver = MockUrlResolver::new();
        resolver
            .expect_resolve()
            .times(1)
            .returning(|_| Err(ResolveError::Request("dns failure".to_string())));
        let mut media = MockMediaSource::new();
        media.expect_fetch().never();

        let dispatcher = MessageDispatcher::new(resolver, media, "@relay_bot");
        let sink = text_sink(views::RESOLVE_FAILED);

        let outcome = dispatcher.handle(&direct(SHORT), &sink).await?;
        assert_eq!(outcome, Outcome::ResolutionFailed);
        Ok(())
    }

    #[tokio::test]
    async fn test_fetch_failure_replies_generic_message() -> Result<(), SendError> {
        let mut media = MockMediaSource::new();
        media.expect_fetch().times(1).returning(|_| {
            Err(FetchError::MalformedUpstream(
                "missing video_data, music or desc section".to_string(),
            ))
        });

        let dispatcher = MessageDispatcher::new(resolver_ok(), media, "@relay_bot");
        let sink = text_sink(views::PROCESSING_FAILED);

        let outcome = dispatcher.handle(&direct(SHORT), &sink).await?;
        assert_eq!(outcome, Outcome::FetchFailed);
        Ok(())
    }

    #[tokio::test]
    async fn test_incomplete_fields_never_reach_reply() -> Result<(), SendError> {
        let mut media = MockMediaSource::new();
        media
            .expect_fetch()
            .returning(|_| Err(FetchError::IncompleteFields(vec!["audio"])));

        let dispatcher = MessageDispatcher::new(MockUrlResolver::new(), media, "@relay_bot");
        let state = dispatcher
            .step(
                DispatchState::Fetch(ResolvedLink::new(RESOLVED)),
                &direct(SHORT),
                &text_sink(views::PROCESSING_FAILED),
            )
            .await?;
        assert_eq!(state, DispatchState::Done(Outcome::FetchFailed));
        Ok(())
    }

    #[tokio::test]
    async fn test_round_trip_sends_video_with_caption() -> Result<(), SendError> {
        let dispatcher = MessageDispatcher::new(resolver_ok(), media_ok(), "@relay_bot");
        let mut sink = MockReplySink::new();
        sink.expect_send_text().never();
        sink.expect_send_video()
            .withf(|video, caption| {
                video.as_ref() == b"hq"
                    && caption.contains(RESOLVED)
                    && caption.contains(AUDIO)
                    && caption.contains("funny cat")
            })
            .times(1)
            .returning(|_, _| Ok(()));

        let outcome = dispatcher.handle(&direct(SHORT), &sink).await?;
        assert_eq!(outcome, Outcome::VideoSent);
        Ok(())
    }

    #[tokio::test]
    async fn test_oversized_video_falls_back_to_text() -> Result<(), SendError> {
        let dispatcher = MessageDispatcher::new(resolver_ok(), media_ok(), "@relay_bot");
        let mut sink = MockReplySink::new();
        sink.expect_send_video()
            .times(1)
            .returning(|_, _| Err(SendError::PayloadTooLarge("Request Entity Too Large".into())));
        sink.expect_send_text()
            .withf(|text| {
                text.starts_with(views::SIZE_EXCEEDED_NOTICE)
                    && text.contains(RESOLVED)
                    && text.contains(AUDIO)
                    && text.contains("funny cat")
            })
            .times(1)
            .returning(|_| Ok(()));

        let outcome = dispatcher.handle(&direct(SHORT), &sink).await?;
        assert_eq!(outcome, Outcome::SizeFallbackSent);
        Ok(())
    }

    #[tokio::test]
    async fn test_other_send_failures_propagate() {
        let dispatcher = MessageDispatcher::new(resolver_ok(), media_ok(), "@relay_bot");
        let mut sink = MockReplySink::new();
        sink.expect_send_video()
            .times(1)
            .returning(|_, _| Err(SendError::Telegram(RequestError::Api(ApiError::BotBlocked))));
        sink.expect_send_text().never();

        let result = dispatcher.handle(&direct(SHORT), &sink).await;
        assert!(matches!(result, Err(SendError::Telegram(_))));
    }

    #[tokio::test]
    async fn test_done_is_terminal() -> Result<(), SendError> {
        let (resolver, media) = untouched();
        let dispatcher = MessageDispatcher::new(resolver, media, "@relay_bot");
        let mut sink = MockReplySink::new();
        sink.expect_send_text().never();

        let state = dispatcher
            .step(DispatchState::Done(Outcome::VideoSent), &direct(SHORT), &sink)
            .await?;
        assert_eq!(state, DispatchState::Done(Outcome::VideoSent));
        Ok(())
    }
}
