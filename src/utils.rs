//! Utility functions for text processing of inbound and outbound messages.
//!
//! Link detection uses the `lazy-regex` crate, so patterns are validated at
//! compile time and initialized on first use.

// lazy_regex! uses once_cell internally
#![allow(clippy::non_std_lazy_statics)]

use lazy_regex::lazy_regex;
use regex::RegexBuilder;
use std::ops::Range;

/// Match an http(s) URL up to the next whitespace
static RE_HTTP_URL: lazy_regex::Lazy<regex::Regex> = lazy_regex!(r"https?://\S+");

/// Truncates a string to a maximum number of characters.
///
/// This is UTF-8 safe and will not panic on multi-byte characters.
///
/// # Examples
///
/// ```
/// use tikgrab::utils::truncate_str;
/// let s = "Привет, мир!";
/// assert_eq!(truncate_str(s, 6), "Привет");
/// ```
pub fn truncate_str(s: impl AsRef<str>, max_chars: usize) -> String {
    let s = s.as_ref();
    if s.chars().count() <= max_chars {
        return s.to_string();
    }
    s.char_indices()
        .nth(max_chars)
        .map_or_else(|| s.to_string(), |(pos, _)| s[..pos].to_string())
}

/// Picks the link to resolve out of a message body.
///
/// Returns the first http(s) URL that contains `marker`, trimmed of trailing
/// punctuation. When no such URL exists the whole trimmed text is returned,
/// so a bare `vt.tiktok.com/...` is still handed to the resolver.
///
/// # Examples
///
/// ```
/// use tikgrab::utils::extract_link;
/// let text = "look at this https://vt.tiktok.com/ABC123/ lol";
/// assert_eq!(extract_link(text, "tiktok.com"), "https://vt.tiktok.com/ABC123/");
/// ```
#[must_use]
pub fn extract_link(text: &str, marker: &str) -> String {
    RE_HTTP_URL
        .find_iter(text)
        .map(|m| m.as_str().trim_end_matches(|c: char| matches!(c, '.' | ',' | ')' | '!' | '?')))
        .find(|url| url.contains(marker))
        .map_or_else(|| text.trim().to_string(), ToString::to_string)
}

/// Byte ranges of every mention of `handle` in `text`.
///
/// Matching is case-insensitive and positions come from `text` itself, so
/// slicing with them never splits a character. A match followed by another
/// username character belongs to a longer handle and is skipped.
fn mention_spans(text: &str, handle: &str) -> Vec<Range<usize>> {
    if handle.is_empty() {
        return Vec::new();
    }
    let Ok(re) = RegexBuilder::new(&regex::escape(handle))
        .case_insensitive(true)
        .build()
    else {
        return Vec::new();
    };
    re.find_iter(text)
        .filter(|m| !text[m.end()..].chars().next().is_some_and(is_username_char))
        .map(|m| m.range())
        .collect()
}

/// Characters allowed in a Telegram username
const fn is_username_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

/// Whether `text` mentions `handle` (case-insensitive, `@name` form).
#[must_use]
pub fn contains_mention(text: &str, handle: &str) -> bool {
    !mention_spans(text, handle).is_empty()
}

/// Removes every mention of `handle` from `text` and trims the result.
///
/// # Examples
///
/// ```
/// use tikgrab::utils::strip_mention;
/// assert_eq!(strip_mention("@Bot https://vt.tiktok.com/x", "@bot"), "https://vt.tiktok.com/x");
/// ```
#[must_use]
pub fn strip_mention(text: &str, handle: &str) -> String {
    let mut result = String::with_capacity(text.len());
    let mut cursor = 0;
    for span in mention_spans(text, handle) {
        result.push_str(&text[cursor..span.start]);
        cursor = span.end;
    }
    result.push_str(&text[cursor..]);
    result.trim().to_string()
}
