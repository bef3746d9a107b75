use crate::storage::StorageError;
use thiserror::Error;

/// Errors raised by the course core.
///
/// Apart from `AccessDenied`/`AdminOnly` every variant is turned into a
/// plain-language reply by the engine and never reaches the transport.
#[derive(Error, Debug)]
pub enum CourseError {
    /// User is not on the allow-list
    #[error("access denied for user {0}")]
    AccessDenied(i64),
    /// Action is reserved for administrators
    #[error("user {0} is not an administrator")]
    AdminOnly(i64),
    /// Module or question index outside `0..count`
    #[error("index {index} is out of range (0..{count})")]
    OutOfRange {
        /// Requested index
        index: usize,
        /// Number of valid items
        count: usize,
    },
    /// Refused to remove the only remaining administrator
    #[error("cannot remove the last administrator")]
    LastAdmin,
    /// Quiz answer/skip/finish while no run is active
    #[error("no quiz in progress")]
    QuizNotStarted,
    /// Answer letter is not one of the current question's options
    #[error("unknown answer option '{0}'")]
    InvalidAnswer(String),
    /// Storage backend failure
    #[error("persistence error: {0}")]
    Persistence(#[from] StorageError),
}
