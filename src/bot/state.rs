use serde::{Deserialize, Serialize};

/// Per-chat dialogue state
#[derive(Clone, Debug, Serialize, Deserialize, Default, PartialEq, Eq)]
pub enum State {
    /// Normal navigation
    #[default]
    Start,
    /// Next text message is course feedback
    AwaitingFeedback,
    /// Next text message is an admin broadcast
    AwaitingBroadcast,
}
