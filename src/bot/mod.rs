/// Classification of commands, callbacks and keyboard text
pub mod action;
/// Multi-recipient delivery
pub mod broadcast;
/// Transport-independent course logic
pub mod engine;
/// Telegram endpoints and the command list
pub mod handlers;
/// Keyboard rendering
pub mod markup;
/// Outgoing message description
pub mod reply;
/// Telegram sends with retry
pub mod resilient;
/// User state and dialogue management
pub mod state;
/// Throttling of denial messages
pub mod unauthorized_cache;
/// Texts and keyboards
pub mod views;

pub use engine::{CourseEngine, UserRef};
pub use unauthorized_cache::UnauthorizedCache;
