//! Course domain: static catalog, learner progress and the quiz state machine

/// Static modules, quiz questions and info pages
pub mod catalog;
/// Domain errors
pub mod error;
/// Learner progress records
pub mod progress;
/// Quiz run state machine and scoring
pub mod quiz;
/// Progress tracking and navigation over a progress store
pub mod tracker;

pub use catalog::{Contacts, Course, Link, Module, QuizOption, QuizQuestion};
pub use error::CourseError;
pub use progress::{QuizResult, UserProgress};
pub use quiz::{QuizState, QuizStep};
pub use tracker::{Boundary, CompletionResult, Navigation, ProgressSummary, ProgressTracker};
