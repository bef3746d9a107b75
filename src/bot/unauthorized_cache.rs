//! Flood protection for "access denied" replies
//!
//! Users who are not on the allow-list get the denial text once per cooldown
//! window. Further attempts inside the window are silenced and only counted.

use moka::future::Cache;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Remembers who was told "access denied" recently
#[derive(Clone)]
pub struct UnauthorizedCache {
    /// user id → () with TTL-based eviction
    cache: Cache<i64, ()>,
    cooldown: Duration,
    silenced_count: Arc<AtomicU64>,
}

impl UnauthorizedCache {
    /// Build the cache.
    ///
    /// Entries expire after `cooldown_secs`; `ttl_secs` bounds how long any
    /// entry may live regardless of activity.
    ///
    /// # Examples
    ///
    /// ```
    /// use tender_course_bot::bot::UnauthorizedCache;
    ///
    /// let cache = UnauthorizedCache::new(1200, 7200, 10_000);
    /// assert_eq!(cache.silenced_count(), 0);
    /// ```
    #[must_use]
    pub fn new(cooldown_secs: u64, ttl_secs: u64, max_capacity: u64) -> Self {
        let cooldown = Duration::from_secs(cooldown_secs);
        let cache = Cache::builder()
            .max_capacity(max_capacity)
            .time_to_live(Duration::from_secs(ttl_secs).min(cooldown))
            .build();

        Self {
            cache,
            cooldown,
            silenced_count: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Whether the denial text should be sent to `user_id` now.
    ///
    /// Silenced attempts are counted; every 100th one is logged.
    pub async fn should_send(&self, user_id: i64, user_name: &str) -> bool {
        if self.cache.get(&user_id).await.is_none() {
            return true;
        }

        let count = self.silenced_count.fetch_add(1, Ordering::Relaxed) + 1;
        if count.is_multiple_of(100) {
            debug!(
                "⛔️ Silenced {} denied attempts (recent: user {} - {})",
                count, user_id, user_name
            );
        }

        false
    }

    /// Start the cooldown for `user_id` after the denial text went out
    pub async fn mark_sent(&self, user_id: i64) {
        self.cache.insert(user_id, ()).await;
    }

    /// Users currently in cooldown (approximate)
    #[must_use]
    pub fn entry_count(&self) -> u64 {
        self.cache.entry_count()
    }

    /// Attempts answered with silence so far
    #[must_use]
    pub fn silenced_count(&self) -> u64 {
        self.silenced_count.load(Ordering::Relaxed)
    }

    /// Configured cooldown
    #[must_use]
    pub const fn cooldown(&self) -> Duration {
        self.cooldown
    }
}
