//! Bot assembly and the supervised dispatcher loop

use crate::access::AccessStore;
use crate::bot::handlers::{
    handle_callback, handle_command, handle_text, Command, CourseDialogue, HandlerContext,
};
use crate::bot::state::State;
use crate::bot::{CourseEngine, UnauthorizedCache};
use crate::config::{
    get_unauthorized_cache_max_size, get_unauthorized_cache_ttl, get_unauthorized_cooldown,
    Settings, RESTART_INITIAL_BACKOFF_MS, RESTART_MAX_BACKOFF_MS,
};
use crate::course::Course;
use crate::status::RuntimeStats;
use crate::storage::{
    InMemoryProgressStore, JsonFileAccessBackend, JsonFileProgressStore, ProgressStore,
};
use crate::utils::backoff;
use anyhow::{anyhow, Context, Result};
use std::sync::Arc;
use teloxide::dispatching::dialogue::InMemStorage;
use teloxide::dispatching::UpdateHandler;
use teloxide::prelude::*;
use teloxide::types::CallbackQuery;
use teloxide::utils::command::BotCommands;
use tracing::{error, info, warn};

/// Load the course and open the stores described by `settings`
///
/// # Errors
///
/// Returns an error if the course file cannot be read or is invalid.
pub async fn build_engine(
    settings: &Settings,
    stats: Arc<RuntimeStats>,
    denials: Arc<UnauthorizedCache>,
) -> Result<CourseEngine> {
    let course = Course::load(settings.course_file.as_deref())
        .await
        .context("Failed to load course")?;

    let mut admins: Vec<i64> = settings.admin_ids().into_iter().collect();
    admins.sort_unstable();
    if admins.is_empty() && settings.access_control_enabled {
        warn!("No administrators configured: nobody can grant access");
    }

    let access = AccessStore::open(
        Arc::new(JsonFileAccessBackend::new(&settings.data_dir)),
        &admins,
        settings.access_control_enabled,
    )
    .await;

    let progress: Arc<dyn ProgressStore> = if settings.persist_progress {
        let store = JsonFileProgressStore::open(&settings.data_dir).await;
        info!("Progress is stored in {}", store.path().display());
        Arc::new(store)
    } else {
        info!("Progress is kept in memory only");
        Arc::new(InMemoryProgressStore::new())
    };

    Ok(CourseEngine::new(Arc::new(course), Arc::new(access), progress)
        .with_features(settings.features())
        .with_stats(stats)
        .with_denial_cache(denials)
        .with_page_size(settings.users_page_size))
}

fn init_unauthorized_cache() -> Arc<UnauthorizedCache> {
    let cooldown = get_unauthorized_cooldown();
    let ttl = get_unauthorized_cache_ttl();
    let max_size = get_unauthorized_cache_max_size();

    info!(
        "Initializing UnauthorizedCache (cooldown: {}s, ttl: {}s, max_size: {})",
        cooldown, ttl, max_size
    );

    Arc::new(UnauthorizedCache::new(cooldown, ttl, max_size))
}

/// Run the bot until Ctrl-C, restarting the dispatcher with backoff when it
/// fails.
///
/// # Errors
///
/// Returns an error if the course cannot be loaded or the restart budget is
/// exhausted.
pub async fn run(settings: Arc<Settings>) -> Result<()> {
    let stats = Arc::new(RuntimeStats::new());
    let denials = init_unauthorized_cache();
    let engine = Arc::new(build_engine(&settings, stats.clone(), denials.clone()).await?);

    let ctx = HandlerContext {
        bot: Bot::new(settings.telegram_token.clone()),
        engine,
        denials,
    };
    let dialogues = InMemStorage::<State>::new();
    let max_restarts = usize::try_from(settings.max_restarts).unwrap_or(usize::MAX);
    let mut delays = backoff(RESTART_INITIAL_BACKOFF_MS, RESTART_MAX_BACKOFF_MS, max_restarts);

    loop {
        match tokio::spawn(run_once(ctx.clone(), dialogues.clone())).await {
            Ok(Ok(())) => {
                info!("Dispatcher stopped");
                return Ok(());
            }
            Ok(Err(e)) => error!("Dispatcher failed: {e:#}"),
            Err(e) => error!("Dispatcher task aborted: {e}"),
        }

        let Some(delay) = delays.next() else {
            return Err(anyhow!(
                "Dispatcher failed {} times in a row, giving up",
                stats.restarts() + 1
            ));
        };
        let attempt = stats.record_restart();
        warn!("Restarting dispatcher (attempt {attempt}) in {delay:?}");
        tokio::time::sleep(delay).await;
    }
}

async fn run_once(ctx: HandlerContext, dialogues: Arc<InMemStorage<State>>) -> Result<()> {
    let me = ctx
        .bot
        .get_me()
        .await
        .context("Telegram rejected getMe")?;
    info!("Authorized as @{}", me.username());

    if let Err(e) = ctx.bot.set_my_commands(Command::bot_commands()).await {
        warn!("Failed to register the command list: {e}");
    }

    info!("Bot is running...");
    Dispatcher::builder(ctx.bot.clone(), setup_handler())
        .dependencies(dptree::deps![ctx, dialogues])
        .enable_ctrlc_handler()
        .build()
        .dispatch()
        .await;
    Ok(())
}

fn setup_handler() -> UpdateHandler<teloxide::RequestError> {
    dptree::entry()
        .branch(
            Update::filter_callback_query()
                .enter_dialogue::<CallbackQuery, InMemStorage<State>, State>()
                .endpoint(on_callback),
        )
        .branch(
            Update::filter_message()
                .enter_dialogue::<Message, InMemStorage<State>, State>()
                .branch(
                    dptree::entry()
                        .filter_command::<Command>()
                        .endpoint(on_command),
                )
                .branch(dptree::filter(|msg: Message| msg.text().is_some()).endpoint(on_text)),
        )
}

async fn on_command(
    ctx: HandlerContext,
    msg: Message,
    cmd: Command,
    dialogue: CourseDialogue,
) -> Result<(), teloxide::RequestError> {
    if let Err(e) = handle_command(ctx, msg, cmd, dialogue).await {
        error!("Command error: {e}");
    }
    respond(())
}

async fn on_text(
    ctx: HandlerContext,
    msg: Message,
    state: State,
    dialogue: CourseDialogue,
) -> Result<(), teloxide::RequestError> {
    if let Err(e) = handle_text(ctx, msg, state, dialogue).await {
        error!("Text handler error: {e}");
    }
    respond(())
}

async fn on_callback(
    ctx: HandlerContext,
    q: CallbackQuery,
    dialogue: CourseDialogue,
) -> Result<(), teloxide::RequestError> {
    if let Err(e) = handle_callback(ctx, q, dialogue).await {
        error!("Callback error: {e}");
    }
    respond(())
}
