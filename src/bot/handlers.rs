//! Telegram endpoints
//!
//! Each update is classified into an [`Action`], handed to the
//! [`CourseEngine`] and the resulting [`Outcome`] is sent back. Effects that
//! reach other users run in the background so the sender gets a quick answer.

use super::action::{Action, PendingInput};
use super::broadcast::{deliver, TelegramSink};
use super::engine::{CourseEngine, UserRef};
use super::reply::{Effect, Outcome, Reply};
use super::resilient::send_reply;
use super::state::State;
use super::unauthorized_cache::UnauthorizedCache;
use super::views::{AdminView, CourseView, DefaultAdminView, DefaultCourseView};
use crate::course::CourseError;
use anyhow::{anyhow, Result};
use std::sync::Arc;
use teloxide::dispatching::dialogue::InMemStorage;
use teloxide::prelude::*;
use teloxide::types::{CallbackQuery, User};
use teloxide::utils::command::BotCommands;
use tracing::{debug, error, info, warn};

/// Dialogue of one chat
pub type CourseDialogue = Dialogue<State, InMemStorage<State>>;

/// Bot commands
#[derive(BotCommands, Clone, Debug)]
#[command(rename_rule = "lowercase", description = "Команды курса:")]
pub enum Command {
    /// Start or resume the course
    #[command(description = "начать или продолжить курс")]
    Start,
    /// Command overview
    #[command(description = "помощь")]
    Help,
    /// Module list
    #[command(description = "меню курса")]
    Menu,
    /// Progress page
    #[command(description = "мой прогресс")]
    Progress,
    /// Open a module by its 1-based number
    #[command(description = "открыть модуль по номеру, например /module 2")]
    Module(String),
    /// Final quiz
    #[command(description = "итоговый тест")]
    Quiz,
    /// Useful links
    #[command(description = "полезные ссылки")]
    Links,
    /// Contacts
    #[command(description = "контакты")]
    Contacts,
    /// About the course
    #[command(description = "о курсе")]
    About,
    /// Leave feedback
    #[command(description = "оставить отзыв")]
    Feedback,
    /// Show own Telegram id
    #[command(description = "мой ID")]
    MyId,
    /// Ask administrators for access
    #[command(description = "запросить доступ")]
    Request,
    /// Admin panel
    #[command(description = "админ-панель")]
    Admin,
    /// Granted users
    #[command(description = "список пользователей с доступом")]
    Users,
    /// `/grant <id> [note]`
    #[command(description = "выдать доступ: /grant <id> [заметка]")]
    Grant(String),
    /// `/revoke <id>`
    #[command(description = "отозвать доступ: /revoke <id>")]
    Revoke(String),
    /// `/addadmin <id>`
    #[command(description = "добавить администратора")]
    AddAdmin(String),
    /// `/removeadmin <id>`
    #[command(description = "удалить администратора")]
    RemoveAdmin(String),
    /// `/broadcast [text]`
    #[command(description = "рассылка всем пользователям с доступом")]
    Broadcast(String),
    /// Runtime status
    #[command(description = "статус бота")]
    Status,
    /// Liveness probe
    #[command(description = "проверка работы")]
    Healthcheck,
    /// Mark every module completed
    #[command(description = "отметить все модули пройденными")]
    CompleteAll,
}

/// Shared handles for one update
#[derive(Clone)]
pub struct HandlerContext {
    /// Bot handle
    pub bot: Bot,
    /// Course logic
    pub engine: Arc<CourseEngine>,
    /// Throttle for denial messages
    pub denials: Arc<UnauthorizedCache>,
}

/// Sender id of a message, 0 for channel posts
#[must_use]
pub fn get_user_id_safe(msg: &Message) -> i64 {
    msg.from.as_ref().map_or(0, |u| u.id.0.cast_signed())
}

fn user_ref(user: &User) -> UserRef {
    UserRef {
        id: user.id.0.cast_signed(),
        name: user.full_name(),
        username: user.username.clone(),
    }
}

fn message_user(msg: &Message) -> UserRef {
    msg.from
        .as_ref()
        .map_or_else(|| UserRef::new(get_user_id_safe(msg), "Unknown"), user_ref)
}

const fn pending_input(state: &State) -> Option<PendingInput> {
    match state {
        State::Start => None,
        State::AwaitingFeedback => Some(PendingInput::Feedback),
        State::AwaitingBroadcast => Some(PendingInput::Broadcast),
    }
}

/// Handle a parsed command
///
/// # Errors
///
/// Returns an error if replies cannot be sent or the dialogue cannot be updated.
pub async fn handle_command(
    ctx: HandlerContext,
    msg: Message,
    cmd: Command,
    dialogue: CourseDialogue,
) -> Result<()> {
    debug!("Command {cmd:?} from {}", get_user_id_safe(&msg));
    process(&ctx, msg.chat.id, &message_user(&msg), Action::from(cmd), &dialogue).await
}

/// Handle a plain text message
///
/// # Errors
///
/// Returns an error if replies cannot be sent or the dialogue cannot be updated.
pub async fn handle_text(
    ctx: HandlerContext,
    msg: Message,
    state: State,
    dialogue: CourseDialogue,
) -> Result<()> {
    let Some(text) = msg.text() else {
        return Ok(());
    };
    let action = Action::from_text(text, pending_input(&state));
    process(&ctx, msg.chat.id, &message_user(&msg), action, &dialogue).await
}

/// Handle an inline button press
///
/// # Errors
///
/// Returns an error if the callback has no chat or replies cannot be sent.
pub async fn handle_callback(
    ctx: HandlerContext,
    q: CallbackQuery,
    dialogue: CourseDialogue,
) -> Result<()> {
    let Some(data) = q.data.as_deref() else {
        return Ok(());
    };

    let _ = ctx.bot.answer_callback_query(q.id.clone()).await;

    let chat_id = q
        .message
        .as_ref()
        .map(|msg| msg.chat().id)
        .ok_or_else(|| anyhow!("Callback message missing chat id"))?;

    process(&ctx, chat_id, &user_ref(&q.from), Action::from_callback(data), &dialogue).await
}

async fn process(
    ctx: &HandlerContext,
    chat_id: ChatId,
    user: &UserRef,
    action: Action,
    dialogue: &CourseDialogue,
) -> Result<()> {
    match ctx.engine.handle(user, action).await {
        Ok(outcome) => apply_outcome(ctx, chat_id, user, outcome, dialogue).await,
        Err(CourseError::AccessDenied(user_id)) => deny(ctx, chat_id, user_id, &user.name).await,
        Err(e) => {
            error!("Unhandled error for user {}: {e}", user.id);
            send_reply(
                &ctx.bot,
                chat_id,
                &Reply::text(DefaultCourseView::internal_error()),
            )
            .await
        }
    }
}

async fn deny(ctx: &HandlerContext, chat_id: ChatId, user_id: i64, name: &str) -> Result<()> {
    if !ctx.denials.should_send(user_id, name).await {
        return Ok(());
    }
    info!("⛔️ Unauthorized access from user {user_id} ({name}). Sending denial message.");

    for reply in &ctx.engine.denied().replies {
        if let Err(e) = send_reply(&ctx.bot, chat_id, reply).await {
            error!("Failed to send access denied message to {user_id}: {e}");
            return Ok(());
        }
    }
    ctx.denials.mark_sent(user_id).await;
    Ok(())
}

async fn apply_outcome(
    ctx: &HandlerContext,
    chat_id: ChatId,
    user: &UserRef,
    outcome: Outcome,
    dialogue: &CourseDialogue,
) -> Result<()> {
    for reply in &outcome.replies {
        send_reply(&ctx.bot, chat_id, reply).await?;
    }

    match outcome.effect {
        Some(Effect::AwaitInput(input)) => {
            let state = match input {
                PendingInput::Feedback => State::AwaitingFeedback,
                PendingInput::Broadcast => State::AwaitingBroadcast,
            };
            return dialogue
                .update(state)
                .await
                .map_err(|e| anyhow!("Failed to update dialogue: {e}"));
        }
        Some(Effect::Broadcast { recipients, text }) => {
            spawn_broadcast(ctx, chat_id, user.id, recipients, text);
        }
        Some(Effect::Notify { recipients, reply }) => {
            let sink = TelegramSink::new(ctx.bot.clone());
            tokio::spawn(async move {
                deliver(&sink, &recipients, &reply).await;
            });
        }
        None => {}
    }

    let current = dialogue
        .get()
        .await
        .map_err(|e| anyhow!("Failed to read dialogue: {e}"))?;
    if current.is_some_and(|s| s != State::Start) {
        dialogue
            .reset()
            .await
            .map_err(|e| anyhow!("Failed to reset dialogue: {e}"))?;
    }
    Ok(())
}

fn spawn_broadcast(
    ctx: &HandlerContext,
    chat_id: ChatId,
    admin_id: i64,
    recipients: Vec<i64>,
    text: String,
) {
    let bot = ctx.bot.clone();
    tokio::spawn(async move {
        let sink = TelegramSink::new(bot.clone());
        let report = deliver(&sink, &recipients, &Reply::text(text)).await;
        info!(
            "Broadcast by admin {admin_id}: {} delivered, {} failed",
            report.delivered, report.failed
        );
        let summary = Reply::text(DefaultAdminView::broadcast_report(&report));
        if let Err(e) = send_reply(&bot, chat_id, &summary).await {
            warn!("Failed to report broadcast result to {admin_id}: {e}");
        }
    });
}
