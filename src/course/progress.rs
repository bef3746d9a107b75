use super::quiz::QuizState;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Scored, archived quiz attempt
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct QuizResult {
    /// When the attempt was scored
    pub finished_at: DateTime<Utc>,
    /// Question id → chosen letter; `None` means skipped or unanswered
    pub answers: BTreeMap<String, Option<String>>,
    /// Number of correct answers
    pub correct_count: usize,
    /// Number of questions in the quiz
    pub total_count: usize,
    /// `correct_count / total_count * 100`
    pub percentage: f64,
}

impl QuizResult {
    /// Number of questions recorded without an answer
    #[must_use]
    pub fn unanswered_count(&self) -> usize {
        self.answers.values().filter(|a| a.is_none()).count()
    }
}

/// Per-user learning record
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UserProgress {
    /// Telegram user id
    pub user_id: i64,
    /// Display name captured on first contact
    #[serde(default)]
    pub name: Option<String>,
    /// First interaction
    pub started_at: DateTime<Utc>,
    /// 1-based numbers of completed modules
    #[serde(default)]
    pub completed_modules: BTreeSet<usize>,
    /// 0-based index of the module viewed last
    #[serde(default)]
    pub last_module: usize,
    /// 1-based numbers of modules whose audio was played
    #[serde(default)]
    pub audio_listened: BTreeSet<usize>,
    /// Archived attempts, oldest first
    #[serde(default)]
    pub quiz_attempts: Vec<QuizResult>,
    /// Active quiz run, if any
    #[serde(default)]
    pub quiz: QuizState,
}

impl UserProgress {
    /// Fresh record started now
    #[must_use]
    pub fn new(user_id: i64, name: Option<String>) -> Self {
        Self {
            user_id,
            name,
            started_at: Utc::now(),
            completed_modules: BTreeSet::new(),
            last_module: 0,
            audio_listened: BTreeSet::new(),
            quiz_attempts: Vec::new(),
            quiz: QuizState::Idle,
        }
    }

    /// Whether the module at 0-based `index` is completed
    #[must_use]
    pub fn is_completed(&self, index: usize) -> bool {
        self.completed_modules.contains(&(index + 1))
    }

    /// Completed modules that still exist in a course of `module_count`
    #[must_use]
    pub fn completed_count(&self, module_count: usize) -> usize {
        self.completed_modules
            .iter()
            .filter(|n| (1..=module_count).contains(*n))
            .count()
    }

    /// Highest-scoring attempt
    #[must_use]
    pub fn best_attempt(&self) -> Option<&QuizResult> {
        self.quiz_attempts
            .iter()
            .max_by(|a, b| a.correct_count.cmp(&b.correct_count))
    }

    /// Most recent attempt
    #[must_use]
    pub fn last_attempt(&self) -> Option<&QuizResult> {
        self.quiz_attempts.last()
    }
}
