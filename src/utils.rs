//! Text helpers and retry utilities shared by the transport layer.

use anyhow::Result;
use std::time::Duration;
use tokio_retry::strategy::{jitter, ExponentialBackoff};
use tokio_retry::Retry;
use tracing::warn;

/// Telegram message limit with a margin for markup
pub const TELEGRAM_MESSAGE_LIMIT: usize = 4000;

/// Escape user-supplied text before it goes into an HTML reply.
///
/// # Examples
///
/// ```
/// use tender_course_bot::utils::escape_html;
/// assert_eq!(escape_html("<b>Иван</b> & Co"), "&lt;b&gt;Иван&lt;/b&gt; &amp; Co");
/// ```
#[must_use]
pub fn escape_html(text: &str) -> String {
    html_escape::encode_text(text).into_owned()
}

/// Safely truncates a string to a maximum character length (not bytes).
///
/// This is UTF-8 safe and will not panic on multi-byte characters.
///
/// # Examples
///
/// ```
/// use tender_course_bot::utils::truncate_str;
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

/// Cut a reply to [`TELEGRAM_MESSAGE_LIMIT`] characters, marking the cut.
#[must_use]
pub fn fit_message(text: &str) -> String {
    if text.chars().count() <= TELEGRAM_MESSAGE_LIMIT {
        return text.to_string();
    }
    format!(
        "{}...\n\n<i>(сообщение обрезано)</i>",
        truncate_str(text, TELEGRAM_MESSAGE_LIMIT)
    )
}

/// Retry a Telegram API operation with exponential backoff.
///
/// Delays start at `TELEGRAM_API_INITIAL_BACKOFF_MS`, double per attempt,
/// are capped at `TELEGRAM_API_MAX_BACKOFF_MS` and carry jitter.
///
/// # Errors
///
/// Returns the last error once all attempts have failed.
///
/// # Examples
///
/// ```no_run
/// use tender_course_bot::utils::retry_telegram_operation;
/// use anyhow::Result;
///
/// async fn send() -> Result<()> {
///     Ok(())
/// }
///
/// # async fn example() -> Result<()> {
/// retry_telegram_operation(|| async { send().await }).await?;
/// # Ok(())
/// # }
/// ```
pub async fn retry_telegram_operation<F, Fut, T>(operation: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T>>,
{
    use crate::config::{
        TELEGRAM_API_INITIAL_BACKOFF_MS, TELEGRAM_API_MAX_BACKOFF_MS, TELEGRAM_API_MAX_RETRIES,
    };

    let retry_strategy = backoff(
        TELEGRAM_API_INITIAL_BACKOFF_MS,
        TELEGRAM_API_MAX_BACKOFF_MS,
        TELEGRAM_API_MAX_RETRIES,
    );

    Retry::spawn(retry_strategy, operation).await.map_err(|e| {
        warn!(
            "Telegram API operation failed after {} retries: {}",
            TELEGRAM_API_MAX_RETRIES, e
        );
        e
    })
}

/// Doubling delays starting at `initial_ms`, capped at `max_ms`, with jitter.
pub fn backoff(initial_ms: u64, max_ms: u64, attempts: usize) -> impl Iterator<Item = Duration> {
    // from_millis(2) yields 2, 4, 8.. ms; the factor scales that to initial_ms, 2*initial_ms..
    ExponentialBackoff::from_millis(2)
        .factor(initial_ms / 2)
        .max_delay(Duration::from_millis(max_ms))
        .map(jitter)
        .take(attempts)
}
