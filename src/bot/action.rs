//! Classification of inbound updates
//!
//! Commands, callback data and reply-keyboard labels are all turned into an
//! [`Action`] here, once, before anything else looks at them.

use super::handlers::Command;
use super::views::course::{callbacks, labels};
use lazy_regex::regex_captures;

/// Free-text input the chat is waiting for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PendingInput {
    /// Course feedback
    Feedback,
    /// Text to broadcast to every learner
    Broadcast,
}

/// Command whose argument could not be parsed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandHint {
    /// `/module N`
    Module,
    /// `/grant ID [note]`
    Grant,
    /// `/revoke ID`
    Revoke,
    /// `/addadmin ID`
    AddAdmin,
    /// `/removeadmin ID`
    RemoveAdmin,
}

/// Who may perform an action
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessLevel {
    /// Anyone
    Open,
    /// Granted users and admins
    Learner,
    /// Admins only
    Admin,
}

/// Everything a user can ask the bot to do
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    /// Greeting, starts or resumes the course
    Start,
    /// Command list and support contacts
    Help,
    /// Module menu
    Menu,
    /// Progress page
    Progress,
    /// Show module by 0-based index
    OpenModule(usize),
    /// Show module by the 1-based number typed after `/module`
    ModuleByNumber(u32),
    /// One module forward from the 0-based module the button sits under
    NextModule(usize),
    /// One module back from the 0-based module the button sits under
    PreviousModule(usize),
    /// Mark module complete by 0-based index
    CompleteModule(usize),
    /// Mark every module complete
    CompleteAll,
    /// Send the audio version of a module
    ListenAudio(usize),
    /// Start the quiz (warns when modules are unfinished)
    StartQuiz,
    /// Start the quiz without the completion warning
    StartQuizAnyway,
    /// Answer the current question
    AnswerQuiz(String),
    /// Skip the current question
    SkipQuestion,
    /// Score the quiz now
    FinishQuiz,
    /// Links page
    UsefulLinks,
    /// Contacts page
    Contacts,
    /// About page
    About,
    /// Ask for feedback
    LeaveFeedback,
    /// Feedback text
    SubmitFeedback(String),
    /// Ask the admins for access
    RequestAccess,
    /// Show the user's Telegram id
    MyId,
    /// Admin panel
    AdminPanel,
    /// Granted users, 0-based page
    ListUsers(usize),
    /// Grant access
    Grant {
        /// User to grant
        user: i64,
        /// Note stored with the grant
        note: String,
    },
    /// Revoke access
    Revoke(i64),
    /// Promote to admin
    AddAdmin(i64),
    /// Demote an admin
    RemoveAdmin(i64),
    /// Ask for broadcast text
    BroadcastPrompt,
    /// Send text to every granted user
    Broadcast(String),
    /// Runtime status
    Status,
    /// Liveness probe
    Healthcheck,
    /// Abandon pending input
    Cancel,
    /// Command with a malformed argument
    Usage(CommandHint),
    /// Anything not recognized
    Unknown,
}

impl Action {
    /// Required access level
    #[must_use]
    pub const fn access_level(&self) -> AccessLevel {
        match self {
            Self::Start
            | Self::Help
            | Self::MyId
            | Self::RequestAccess
            | Self::Healthcheck
            | Self::Cancel
            | Self::Usage(_)
            | Self::Unknown => AccessLevel::Open,
            Self::AdminPanel
            | Self::ListUsers(_)
            | Self::Grant { .. }
            | Self::Revoke(_)
            | Self::AddAdmin(_)
            | Self::RemoveAdmin(_)
            | Self::BroadcastPrompt
            | Self::Broadcast(_)
            | Self::Status => AccessLevel::Admin,
            _ => AccessLevel::Learner,
        }
    }

    /// Classify inline-button callback data
    #[must_use]
    pub fn from_callback(data: &str) -> Self {
        match data {
            callbacks::MENU => return Self::Menu,
            callbacks::PROGRESS => return Self::Progress,
            callbacks::COMPLETE_ALL => return Self::CompleteAll,
            callbacks::QUIZ_START => return Self::StartQuiz,
            callbacks::QUIZ_FORCE => return Self::StartQuizAnyway,
            callbacks::QUIZ_SKIP => return Self::SkipQuestion,
            callbacks::QUIZ_FINISH => return Self::FinishQuiz,
            callbacks::LINKS => return Self::UsefulLinks,
            callbacks::CONTACTS => return Self::Contacts,
            callbacks::ABOUT => return Self::About,
            callbacks::HELP => return Self::Help,
            callbacks::FEEDBACK => return Self::LeaveFeedback,
            callbacks::REQUEST_ACCESS => return Self::RequestAccess,
            callbacks::ADMIN => return Self::AdminPanel,
            callbacks::ADMIN_USERS => return Self::ListUsers(0),
            callbacks::ADMIN_BROADCAST => return Self::BroadcastPrompt,
            callbacks::ADMIN_STATUS => return Self::Status,
            callbacks::CANCEL => return Self::Cancel,
            _ => {}
        }

        if let Some((_, answer)) = regex_captures!(r"^quiz_answer_(\S+)$", data) {
            return Self::AnswerQuiz(answer.to_string());
        }

        let Some((_, kind, number)) =
            regex_captures!(r"^(module|next|prev|complete|audio|admin_users|revoke|grant)_(-?\d+)$", data)
        else {
            return Self::Unknown;
        };

        match kind {
            "module" | "next" | "prev" | "complete" | "audio" | "admin_users" => {
                let Ok(index) = number.parse::<usize>() else {
                    return Self::Unknown;
                };
                match kind {
                    "module" => Self::OpenModule(index),
                    "next" => Self::NextModule(index),
                    "prev" => Self::PreviousModule(index),
                    "complete" => Self::CompleteModule(index),
                    "audio" => Self::ListenAudio(index),
                    _ => Self::ListUsers(index),
                }
            }
            _ => {
                let Ok(user) = number.parse::<i64>() else {
                    return Self::Unknown;
                };
                if kind == "revoke" {
                    Self::Revoke(user)
                } else {
                    Self::Grant {
                        user,
                        note: String::new(),
                    }
                }
            }
        }
    }

    /// Classify a plain text message.
    ///
    /// Keyboard labels always win; otherwise the text fills `pending` input
    /// if there is any.
    #[must_use]
    pub fn from_text(text: &str, pending: Option<PendingInput>) -> Self {
        let text = text.trim();
        let labelled = match text {
            labels::COURSE => Some(Self::Menu),
            labels::PROGRESS => Some(Self::Progress),
            labels::QUIZ => Some(Self::StartQuiz),
            labels::LINKS => Some(Self::UsefulLinks),
            labels::CONTACTS => Some(Self::Contacts),
            labels::HELP => Some(Self::Help),
            labels::ADMIN => Some(Self::AdminPanel),
            labels::CANCEL => Some(Self::Cancel),
            _ => None,
        };
        if let Some(action) = labelled {
            return action;
        }

        match pending {
            _ if text.is_empty() || text.starts_with('/') => Self::Unknown,
            Some(PendingInput::Feedback) => Self::SubmitFeedback(text.to_string()),
            Some(PendingInput::Broadcast) => Self::Broadcast(text.to_string()),
            None => Self::Unknown,
        }
    }
}

fn parse_user_id(arg: &str) -> Option<i64> {
    arg.split_whitespace().next()?.parse().ok()
}

impl From<Command> for Action {
    fn from(cmd: Command) -> Self {
        match cmd {
            Command::Start => Self::Start,
            Command::Help => Self::Help,
            Command::Menu => Self::Menu,
            Command::Progress => Self::Progress,
            Command::Module(arg) => match arg.trim().parse::<u32>() {
                Ok(n) => Self::ModuleByNumber(n),
                Err(_) => Self::Usage(CommandHint::Module),
            },
            Command::Quiz => Self::StartQuiz,
            Command::Links => Self::UsefulLinks,
            Command::Contacts => Self::Contacts,
            Command::About => Self::About,
            Command::Feedback => Self::LeaveFeedback,
            Command::MyId => Self::MyId,
            Command::Request => Self::RequestAccess,
            Command::Admin => Self::AdminPanel,
            Command::Users => Self::ListUsers(0),
            Command::Grant(args) => {
                let mut parts = args.trim().splitn(2, char::is_whitespace);
                match parts.next().and_then(|id| id.parse::<i64>().ok()) {
                    Some(user) => Self::Grant {
                        user,
                        note: parts.next().unwrap_or_default().trim().to_string(),
                    },
                    None => Self::Usage(CommandHint::Grant),
                }
            }
            Command::Revoke(arg) => {
                parse_user_id(&arg).map_or(Self::Usage(CommandHint::Revoke), Self::Revoke)
            }
            Command::AddAdmin(arg) => {
                parse_user_id(&arg).map_or(Self::Usage(CommandHint::AddAdmin), Self::AddAdmin)
            }
            Command::RemoveAdmin(arg) => parse_user_id(&arg)
                .map_or(Self::Usage(CommandHint::RemoveAdmin), Self::RemoveAdmin),
            Command::Broadcast(text) if text.trim().is_empty() => Self::BroadcastPrompt,
            Command::Broadcast(text) => Self::Broadcast(text.trim().to_string()),
            Command::Status => Self::Status,
            Command::Healthcheck => Self::Healthcheck,
            Command::CompleteAll => Self::CompleteAll,
        }
    }
}
