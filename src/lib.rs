//! Telegram bot that relays TikTok videos without a watermark.

/// Telegram handlers, dispatcher and reply transport
pub mod bot;
/// Settings and constants
pub mod config;
/// Shared HTTP client helpers
pub mod http_utils;
/// Media fetching via the hybrid-parsing scraper
pub mod media;
/// Short-link resolution
pub mod resolver;
/// Bot runtime entrypoint
pub mod runner;
/// Text helpers
pub mod utils;
