use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use chatops_bot::admin::AdminList;
use chatops_bot::bot::{shutdown_signal, Bot};
use chatops_bot::config::Config;
use chatops_bot::platform::telegram::{self, TelegramReplies};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,chatops_bot=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config_path = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("config.toml"));

    info!("Loading configuration from: {}", config_path.display());
    let config = Config::load(&config_path)
        .with_context(|| format!("Failed to load config from {}", config_path.display()))?;

    info!("Configuration loaded successfully");
    info!("  Allowed users: {:?}", config.telegram.allowed_user_ids);
    info!("  Admins: {}", config.bot.admins.len());
    info!("  Shutdown timeout: {}s", config.bot.shutdown_timeout_secs);

    let telegram_bot = teloxide::Bot::new(&config.telegram.bot_token);
    let replies = Arc::new(TelegramReplies::new(telegram_bot.clone()));

    let mut bot = Bot::new(config.bot.clone(), replies);
    bot.register_commands(Vec::new())?;

    spawn_admin_reload(config_path.clone(), Arc::clone(&bot.context().admins));

    let platform = tokio::spawn(telegram::run(
        bot.sender(),
        config.telegram.allowed_user_ids.clone(),
        telegram_bot,
    ));

    info!("Bot is starting...");
    bot.run(shutdown_signal(tokio::signal::ctrl_c())).await?;

    platform.abort();
    info!("Bot stopped");
    Ok(())
}

/// Reload the admin list from the config file on SIGHUP
#[cfg(unix)]
fn spawn_admin_reload(config_path: PathBuf, admins: Arc<AdminList>) {
    use tokio::signal::unix::{signal, SignalKind};

    tokio::spawn(async move {
        let mut hangup = match signal(SignalKind::hangup()) {
            Ok(hangup) => hangup,
            Err(e) => {
                warn!("Admin reload on SIGHUP disabled: {}", e);
                return;
            }
        };
        while hangup.recv().await.is_some() {
            info!("SIGHUP received, reloading admins from {}", config_path.display());
            if let Err(e) = admins.reload(&config_path) {
                error!("Failed to reload admins: {:#}", e);
            }
        }
    });
}

#[cfg(not(unix))]
fn spawn_admin_reload(_config_path: PathBuf, _admins: Arc<AdminList>) {}
