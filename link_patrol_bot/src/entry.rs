use std::{fs, path::PathBuf, sync::Arc, time::Duration};

use teloxide::{dptree::deps, prelude::*};
use tokio::sync::watch;

use crate::{
    allowlist::watch_allowlist,
    config::Config,
    database::Database,
    handlers::{handle_callback_query, handle_member_update, handle_message},
    health_check::{CheckSettings, HealthChecker},
    moderation::Moderator,
    platform::{telegram::TelegramPlatform, ChatPlatform},
    probe::HttpProber,
    state::ModerationState,
    ticker::run_every,
};

/// # Panics
///
/// Panics if there's no bot key, or if Telegram can't be reached at startup.
pub async fn entry() {
    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            log::error!("Invalid configuration: {e}");
            return;
        }
    };
    log::debug!("Running with {config:?}");

    let key = fs::read_to_string(match cfg!(debug_assertions) {
        true => "key_debug",
        false => "key",
    })
    .ok()
    .or_else(|| std::env::var("TELEGRAM_TOKEN").ok())
    .expect("Could not load bot key file, and TELEGRAM_TOKEN is not set!");

    let bot = Bot::new(key.trim());
    let me = bot.get_me().await.expect("Failed to get info about the bot!");
    log::info!("Logged in as {}", me.username());

    let state = Arc::new(ModerationState::new(&config));
    let platform = TelegramPlatform::new(bot.clone(), me.id, state.window.clone());

    let database = match &config.snapshot_path {
        Some(path) => open_snapshot(path, &state, &platform).await,
        None => None,
    };

    let (shutdown_sender, shutdown) = watch::channel(false);

    let allowlist_task = tokio::spawn(watch_allowlist(
        PathBuf::from(&config.allowlist_file),
        config.allowed_domains.clone(),
        state.policy.clone(),
        shutdown.clone(),
    ));

    let prober = HttpProber::new(config.probe_timeout).expect("Failed to create HTTP client!");
    let checker = HealthChecker::new(
        platform.clone(),
        prober,
        state.clone(),
        CheckSettings::from(&config),
    );
    let checker_task = tokio::spawn(run_health_checks(
        checker,
        state.clone(),
        database.clone(),
        config.check_interval,
        shutdown,
    ));

    let moderator = Arc::new(Moderator::new(platform, state.clone()));

    log::info!("Creating the handler...");

    let handler = dptree::entry()
        .branch(Update::filter_message().endpoint(handle_message))
        .branch(Update::filter_edited_message().endpoint(handle_message))
        .branch(Update::filter_channel_post().endpoint(handle_message))
        .branch(Update::filter_edited_channel_post().endpoint(handle_message))
        .branch(Update::filter_my_chat_member().endpoint(handle_member_update))
        .branch(Update::filter_chat_member().endpoint(handle_member_update))
        .branch(Update::filter_callback_query().endpoint(handle_callback_query));

    log::info!("Dispatching the dispatcher!");

    Dispatcher::builder(bot, handler)
        .default_handler(|_| async {})
        .dependencies(deps![moderator, me])
        .enable_ctrlc_handler()
        .build()
        .dispatch()
        .await;

    log::info!("Shutting down...");

    // Receivers only go away when both tasks are already done.
    let _ = shutdown_sender.send(true);
    if let Err(e) = checker_task.await {
        log::error!("Health check task failed: {e}");
    }
    if let Err(e) = allowlist_task.await {
        log::error!("Allowlist watcher task failed: {e}");
    }

    if let Some(database) = &database {
        persist(&state, database).await;
    }

    log::info!("Bye!");
}

/// Open the snapshot and restore state from it. Chats restored as monitored
/// are asked about again, since the bot may have been removed meanwhile.
async fn open_snapshot(
    path: &str,
    state: &ModerationState,
    platform: &TelegramPlatform,
) -> Option<Database> {
    let database = match Database::open(path).await {
        Ok(database) => database,
        Err(e) => {
            log::warn!("Failed to open snapshot {path}, running without it: {e}");
            return None;
        }
    };

    if let Err(e) = state.restore_from(&database).await {
        log::warn!("Failed to restore from snapshot {path}: {e}");
    }

    for chat in state.monitored.chats() {
        let status = platform
            .membership_status(chat, platform.engine_user_id())
            .await;
        state.monitored.reconcile(chat, status);
    }

    Some(database)
}

async fn run_health_checks(
    checker: HealthChecker<TelegramPlatform, HttpProber>,
    state: Arc<ModerationState>,
    database: Option<Database>,
    period: Duration,
    shutdown: watch::Receiver<bool>,
) {
    let checker = &checker;
    let state = &state;
    let database = database.as_ref();
    let cycle_shutdown = shutdown.clone();
    let cycle_shutdown = &cycle_shutdown;

    run_every(period, shutdown, move || async move {
        let report = checker.run_cycle(cycle_shutdown).await;
        log::info!("Link health check done: {report:?}");

        if let Some(database) = database {
            persist(state, database).await;
        }
    })
    .await;
}

async fn persist(state: &ModerationState, database: &Database) {
    if let Err(e) = state.persist_to(database).await {
        log::warn!("Failed to write snapshot: {e}");
    }
}
