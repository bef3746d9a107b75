//! Transport-neutral description of what the bot answers
//!
//! The engine produces these values; the Telegram layer renders them.

use super::action::PendingInput;

/// Inline button
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Button {
    /// Visible label
    pub label: String,
    /// Callback data, at most 64 bytes
    pub data: String,
}

impl Button {
    /// Button with callback `data`
    pub fn new(label: impl Into<String>, data: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            data: data.into(),
        }
    }
}

/// Button layout attached to a reply
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Keyboard {
    /// Buttons under the message, rows of buttons
    Inline(Vec<Vec<Button>>),
    /// Persistent keyboard replacing the text input, rows of labels
    Reply(Vec<Vec<String>>),
}

impl Keyboard {
    /// Every callback token of an inline layout
    #[must_use]
    pub fn callback_data(&self) -> Vec<&str> {
        match self {
            Self::Inline(rows) => rows.iter().flatten().map(|b| b.data.as_str()).collect(),
            Self::Reply(_) => Vec::new(),
        }
    }
}

/// Message content
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplyBody {
    /// HTML text
    Text(String),
    /// Audio by Telegram file id, URL or local path, with an HTML caption
    Audio {
        /// Where the audio comes from
        reference: String,
        /// Caption under the player
        caption: String,
    },
}

/// One outgoing message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    /// Content
    pub body: ReplyBody,
    /// Optional buttons
    pub keyboard: Option<Keyboard>,
}

impl Reply {
    /// Plain HTML text
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            body: ReplyBody::Text(text.into()),
            keyboard: None,
        }
    }

    /// Audio with a caption
    pub fn audio(reference: impl Into<String>, caption: impl Into<String>) -> Self {
        Self {
            body: ReplyBody::Audio {
                reference: reference.into(),
                caption: caption.into(),
            },
            keyboard: None,
        }
    }

    /// Attach buttons
    #[must_use]
    pub fn with_keyboard(mut self, keyboard: Keyboard) -> Self {
        self.keyboard = Some(keyboard);
        self
    }

    /// Text content, `None` for audio
    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match &self.body {
            ReplyBody::Text(t) => Some(t),
            ReplyBody::Audio { .. } => None,
        }
    }
}

/// Work the transport does after sending the replies
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    /// Send `text` to every recipient and report the delivery back
    Broadcast {
        /// Target users
        recipients: Vec<i64>,
        /// HTML text
        text: String,
    },
    /// Send `reply` to other users, no report
    Notify {
        /// Target users
        recipients: Vec<i64>,
        /// Message for them
        reply: Reply,
    },
    /// Route the chat's next text message to `PendingInput`
    AwaitInput(PendingInput),
}

/// Result of handling one action
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Outcome {
    /// Replies in sending order
    pub replies: Vec<Reply>,
    /// Follow-up work
    pub effect: Option<Effect>,
}

impl Outcome {
    /// A single reply
    #[must_use]
    pub fn reply(reply: Reply) -> Self {
        Self {
            replies: vec![reply],
            effect: None,
        }
    }

    /// Several replies
    #[must_use]
    pub const fn replies(replies: Vec<Reply>) -> Self {
        Self {
            replies,
            effect: None,
        }
    }

    /// Attach a follow-up effect
    #[must_use]
    pub fn with_effect(mut self, effect: Effect) -> Self {
        self.effect = Some(effect);
        self
    }

    /// Text of the first reply, if it is text
    #[must_use]
    pub fn first_text(&self) -> Option<&str> {
        self.replies.first().and_then(Reply::as_text)
    }
}
