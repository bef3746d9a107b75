//! Telegram sends with automatic retry.
//!
//! Every outgoing call goes through [`crate::utils::retry_telegram_operation`],
//! so transient network errors are retried with exponential backoff and jitter.

use super::markup::to_markup;
use super::reply::{Reply, ReplyBody};
use crate::utils::fit_message;
use anyhow::Result;
use std::path::Path;
use teloxide::prelude::*;
use teloxide::types::{ChatId, FileId, InputFile, Message, ParseMode, ReplyMarkup};
use tracing::debug;

/// Send an HTML message with automatic retry on network failures.
///
/// Text longer than the Telegram limit is cut and marked.
///
/// # Errors
///
/// Returns the last error after all retries are exhausted.
pub async fn send_message_resilient(
    bot: &Bot,
    chat_id: ChatId,
    text: &str,
    markup: Option<ReplyMarkup>,
) -> Result<Message> {
    let text = fit_message(text);
    crate::utils::retry_telegram_operation(|| async {
        let mut req = bot
            .send_message(chat_id, text.clone())
            .parse_mode(ParseMode::Html);
        if let Some(markup) = markup.clone() {
            req = req.reply_markup(markup);
        }
        req.await
            .map_err(|e| anyhow::anyhow!("Telegram send error: {e}"))
    })
    .await
}

/// Send audio with automatic retry.
///
/// `reference` is a local file when one exists at that path, otherwise it is
/// passed to Telegram as a file id or URL.
///
/// # Errors
///
/// Returns the last error after all retries are exhausted.
pub async fn send_audio_resilient(
    bot: &Bot,
    chat_id: ChatId,
    reference: &str,
    caption: &str,
    markup: Option<ReplyMarkup>,
) -> Result<Message> {
    crate::utils::retry_telegram_operation(|| async {
        let mut req = bot
            .send_audio(chat_id, audio_input(reference))
            .caption(caption.to_string())
            .parse_mode(ParseMode::Html);
        if let Some(markup) = markup.clone() {
            req = req.reply_markup(markup);
        }
        req.await
            .map_err(|e| anyhow::anyhow!("Telegram audio error: {e}"))
    })
    .await
}

fn audio_input(reference: &str) -> InputFile {
    let path = Path::new(reference);
    if path.is_file() {
        debug!("Sending audio from local file {}", path.display());
        InputFile::file(path.to_path_buf())
    } else {
        InputFile::file_id(FileId(reference.to_string()))
    }
}

/// Send one engine reply.
///
/// # Errors
///
/// Returns an error if Telegram rejects the message after retries.
pub async fn send_reply(bot: &Bot, chat_id: ChatId, reply: &Reply) -> Result<()> {
    let markup = reply.keyboard.as_ref().map(to_markup);
    match &reply.body {
        ReplyBody::Text(text) => {
            send_message_resilient(bot, chat_id, text, markup).await?;
        }
        ReplyBody::Audio { reference, caption } => {
            send_audio_resilient(bot, chat_id, reference, caption, markup).await?;
        }
    }
    Ok(())
}
