//! Telegram endpoints for commands and inbound messages.

use crate::bot::dispatcher::{ChatKind, InboundMessage, MessageDispatcher};
use crate::bot::transport::{SendError, TelegramReplySink};
use crate::bot::views;
use crate::config::Settings;
use crate::media::scraper::ScraperApiClient;
use crate::media::MediaFetcher;
use crate::resolver::HttpUrlResolver;
use std::sync::Arc;
use teloxide::{prelude::*, types::ReplyParameters, utils::command::BotCommands};
use tracing::info;

/// Dispatcher wired to the live HTTP collaborators
pub type LiveDispatcher = MessageDispatcher<HttpUrlResolver, MediaFetcher<ScraperApiClient>>;

/// Supported commands for the bot
#[derive(BotCommands, Clone, Debug, PartialEq, Eq)]
#[command(rename_rule = "lowercase", description = "Supported commands:")]
pub enum Command {
    /// Show the support link
    #[command(description = "Start the bot.")]
    Start,
    /// Show usage help
    #[command(description = "Show help.")]
    Help,
    /// Placeholder command
    #[command(description = "Custom command.")]
    Custom,
}

/// Static reply for a command.
#[must_use]
pub fn command_reply(cmd: &Command, settings: &Settings) -> String {
    match cmd {
        Command::Start => views::start_text(settings.support_url.as_deref()),
        Command::Help => views::HELP_TEXT.to_string(),
        Command::Custom => views::CUSTOM_TEXT.to_string(),
    }
}

/// Safe extraction of user ID from a message.
pub fn get_user_id_safe(msg: &Message) -> Option<u64> {
    msg.from.as_ref().map(|u| u.id.0)
}

/// Build the transport-independent view of a Telegram message.
///
/// Voice notes and other media carry no text; their caption (if any) is used
/// instead, so they fall through validation like any other non-link text.
#[must_use]
pub fn inbound_from(msg: &Message) -> InboundMessage {
    let kind = if msg.chat.is_private() {
        ChatKind::Direct
    } else {
        ChatKind::Group
    };

    InboundMessage {
        chat_id: msg.chat.id.0,
        kind,
        sender_id: get_user_id_safe(msg),
        text: msg
            .text()
            .or_else(|| msg.caption())
            .unwrap_or_default()
            .to_string(),
    }
}

/// Command handler
///
/// # Errors
///
/// Returns an error if the reply cannot be sent.
pub async fn handle_command(
    bot: Bot,
    msg: Message,
    cmd: Command,
    settings: Arc<Settings>,
) -> Result<(), SendError> {
    info!(
        "User {:?} in chat {} issued {:?}",
        get_user_id_safe(&msg),
        msg.chat.id,
        cmd
    );

    bot.send_message(msg.chat.id, command_reply(&cmd, &settings))
        .reply_parameters(ReplyParameters::new(msg.id))
        .await?;
    Ok(())
}

/// Text and voice message handler
///
/// # Errors
///
/// Returns an error only when a reply cannot be delivered and no fallback
/// applies; it ends up in the runtime's error handler.
pub async fn handle_message(
    bot: Bot,
    msg: Message,
    dispatcher: Arc<LiveDispatcher>,
) -> Result<(), SendError> {
    let inbound = inbound_from(&msg);
    let sink = TelegramReplySink::new(bot, msg.chat.id, msg.id);
    dispatcher.handle(&inbound, &sink).await?;
    Ok(())
}
