//! Runtime counters and the status snapshot shown to admins

use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};

/// Counters shared between the runner and the handlers
#[derive(Debug, Default)]
pub struct RuntimeStats {
    restarts: AtomicU32,
    feedback: AtomicU64,
}

impl RuntimeStats {
    /// Fresh counters
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Count a dispatcher restart, returning the new total
    pub fn record_restart(&self) -> u32 {
        self.restarts.fetch_add(1, Ordering::Relaxed) + 1
    }

    /// Dispatcher restarts so far
    #[must_use]
    pub fn restarts(&self) -> u32 {
        self.restarts.load(Ordering::Relaxed)
    }

    /// Count a received feedback message
    pub fn record_feedback(&self) {
        self.feedback.fetch_add(1, Ordering::Relaxed);
    }

    /// Feedback messages received since start
    #[must_use]
    pub fn feedback(&self) -> u64 {
        self.feedback.load(Ordering::Relaxed)
    }
}

/// Point-in-time view for `/status`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusSnapshot {
    /// Users with granted access
    pub granted: usize,
    /// Administrators
    pub admins: usize,
    /// Modules in the course
    pub modules: usize,
    /// Quiz questions
    pub questions: usize,
    /// Users with a progress record
    pub learners: usize,
    /// Dispatcher restarts
    pub restarts: u32,
    /// Feedback messages
    pub feedback: u64,
    /// Denials answered with silence
    pub silenced_denials: u64,
    /// Whether the allow-list is enforced
    pub access_control: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters() {
        let stats = RuntimeStats::new();
        assert_eq!(stats.record_restart(), 1);
        assert_eq!(stats.record_restart(), 2);
        stats.record_feedback();
        assert_eq!((stats.restarts(), stats.feedback()), (2, 1));
    }
}
