//! Delivery of one reply to many users

use super::reply::Reply;
use crate::config::BROADCAST_CONCURRENCY;
use anyhow::Result;
use async_trait::async_trait;
use futures_util::{stream, StreamExt};
use teloxide::prelude::*;
use tracing::{info, warn};

/// Outcome of a multi-recipient delivery
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeliveryReport {
    /// Recipients that got the message
    pub delivered: usize,
    /// Recipients where sending failed
    pub failed: usize,
}

/// Something that can send a reply to a user's private chat
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MessageSink: Send + Sync {
    /// Send `reply` to `user_id`
    async fn send(&self, user_id: i64, reply: &Reply) -> Result<()>;
}

/// Sends through the Telegram Bot API
pub struct TelegramSink {
    bot: Bot,
}

impl TelegramSink {
    /// Wrap a bot handle
    #[must_use]
    pub const fn new(bot: Bot) -> Self {
        Self { bot }
    }
}

#[async_trait]
impl MessageSink for TelegramSink {
    async fn send(&self, user_id: i64, reply: &Reply) -> Result<()> {
        super::resilient::send_reply(&self.bot, ChatId(user_id), reply).await
    }
}

/// Send `reply` to every recipient with bounded concurrency.
///
/// Failures are logged and counted; they never stop the delivery.
pub async fn deliver(sink: &dyn MessageSink, recipients: &[i64], reply: &Reply) -> DeliveryReport {
    let outcomes: Vec<bool> = stream::iter(recipients.iter().copied())
        .map(|user_id| async move {
            match sink.send(user_id, reply).await {
                Ok(()) => true,
                Err(e) => {
                    warn!("Delivery to user {user_id} failed: {e}");
                    false
                }
            }
        })
        .buffer_unordered(BROADCAST_CONCURRENCY)
        .collect()
        .await;

    let delivered = outcomes.iter().filter(|ok| **ok).count();
    let report = DeliveryReport {
        delivered,
        failed: outcomes.len() - delivered,
    };
    info!(
        "Delivery finished: {} delivered, {} failed",
        report.delivered, report.failed
    );
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockall::predicate::eq;

    #[tokio::test]
    async fn test_failures_are_counted_not_fatal() {
        let mut sink = MockMessageSink::new();
        sink.expect_send()
            .with(eq(2), mockall::predicate::always())
            .returning(|_, _| Err(anyhow::anyhow!("bot was blocked by the user")));
        sink.expect_send().returning(|_, _| Ok(()));

        let report = deliver(&sink, &[1, 2, 3], &Reply::text("hello")).await;
        assert_eq!(
            report,
            DeliveryReport {
                delivered: 2,
                failed: 1
            }
        );
    }

    #[tokio::test]
    async fn test_empty_recipient_list() {
        let sink = MockMessageSink::new();
        let report = deliver(&sink, &[], &Reply::text("hello")).await;
        assert_eq!(report, DeliveryReport::default());
    }
}
