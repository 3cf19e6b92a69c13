//! Bot runtime: handler tree, dependency injection and long polling.

use crate::bot::dispatcher::MessageDispatcher;
use crate::bot::handlers::{handle_command, handle_message, Command, LiveDispatcher};
use crate::bot::transport::SendError;
use crate::config::Settings;
use crate::http_utils::create_http_client;
use crate::media::scraper::ScraperApiClient;
use crate::media::MediaFetcher;
use crate::resolver::HttpUrlResolver;
use futures_util::future::BoxFuture;
use std::fmt::Debug;
use std::sync::Arc;
use std::time::Duration;
use teloxide::dispatching::UpdateHandler;
use teloxide::error_handlers::ErrorHandler;
use teloxide::prelude::*;
use teloxide::update_listeners::Polling;
use tracing::{error, info};

/// Error handler that logs through `tracing` and never replies.
#[derive(Debug, Clone, Copy)]
pub struct TracingErrorHandler {
    context: &'static str,
}

impl TracingErrorHandler {
    /// Create a handler whose log lines start with `context`.
    #[must_use]
    pub const fn new(context: &'static str) -> Self {
        Self { context }
    }
}

impl<E> ErrorHandler<E> for TracingErrorHandler
where
    E: Debug + Send + 'static,
{
    fn handle_error(self: Arc<Self>, error: E) -> BoxFuture<'static, ()> {
        Box::pin(async move {
            error!("{}: {:?}", self.context, error);
        })
    }
}

/// Wire the live collaborators into a dispatcher.
#[must_use]
pub fn build_dispatcher(settings: &Settings) -> LiveDispatcher {
    let http = create_http_client(settings.http_timeout_secs);
    let resolver = HttpUrlResolver::new(http.clone());
    let scraper = ScraperApiClient::new(http.clone(), &settings.scraper_api_url);
    let fetcher = MediaFetcher::new(scraper, http);

    info!(
        "Media fetcher initialized (scraper: {}, timeout: {}s)",
        settings.scraper_api_url, settings.http_timeout_secs
    );

    MessageDispatcher::new(resolver, fetcher, settings.mention_handle())
}

/// Run the Telegram runtime until Ctrl-C.
pub async fn run_bot(settings: Arc<Settings>) {
    let dispatcher = Arc::new(build_dispatcher(&settings));
    let bot = Bot::new(settings.telegram_token.clone());
    let handler = setup_handler();

    let listener = Polling::builder(bot.clone())
        .timeout(Duration::from_secs(settings.poll_timeout_secs))
        .delete_webhook()
        .await
        .build();

    info!(
        "Polling every {}s as {}...",
        settings.poll_timeout_secs,
        settings.mention_handle()
    );

    Dispatcher::builder(bot, handler)
        .dependencies(dptree::deps![settings, dispatcher])
        .error_handler(Arc::new(TracingErrorHandler::new("Update handler error")))
        .enable_ctrlc_handler()
        .build()
        .dispatch_with_listener(
            listener,
            Arc::new(TracingErrorHandler::new("Update listener error")),
        )
        .await;
}

fn setup_handler() -> UpdateHandler<SendError> {
    Update::filter_message()
        .branch(
            dptree::entry()
                .filter_command::<Command>()
                .endpoint(handle_command),
        )
        .branch(
            dptree::filter(|msg: Message| msg.text().is_some() || msg.voice().is_some())
                .endpoint(handle_message),
        )
}
