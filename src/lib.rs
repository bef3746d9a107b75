//! Telegram bot delivering the "Тендеры с нуля" course.
//!
//! Learners page through the modules, mark them completed and take a final
//! quiz. Administrators manage an allow-list of users who may take the course.

#![warn(missing_docs)]

/// Allow-list of learners and administrators
pub mod access;
/// Telegram layer
pub mod bot;
/// Configuration and tuning constants
pub mod config;
/// Course catalog, progress and quiz logic
pub mod course;
/// Bot assembly and the restart loop
pub mod runner;
/// Runtime counters for the status page
pub mod status;
/// JSON persistence
pub mod storage;
/// Text helpers and retries
pub mod utils;
