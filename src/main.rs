use anyhow::Result;
use dotenvy::dotenv;
use std::sync::Arc;
use std::time::Duration;
use teloxide::prelude::*;
use teloxide::types::Me;
use tokio::time::sleep;

use filestore_bot::cli::{decode_command, encode_command, Cli, Commands};
use filestore_bot::core::{config, init_logger, log_startup_configuration, process, system};
use filestore_bot::shortener::ShortenerClient;
use filestore_bot::storage::Storage;
use filestore_bot::telegram::admin::restore_expiry_timers;
use filestore_bot::telegram::notifications::notify_owner;
use filestore_bot::telegram::{create_bot, schema, setup_bot_commands, HandlerDeps};

/// Attempts to reach the Bot API before giving up at startup
const STARTUP_MAX_RETRIES: u32 = 60;

/// Main entry point for the Telegram bot
///
/// Parses CLI arguments and dispatches to appropriate subcommand.
///
/// # Errors
/// Returns an error if initialization fails (logging, data files, bot creation).
#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse_args();

    // Keep panics inside handler tasks in the log file
    std::panic::set_hook(Box::new(|panic_info| {
        log::error!("Panic caught: {:?}", panic_info);
        if let Some(location) = panic_info.location() {
            log::error!("Panic at {}:{}:{}", location.file(), location.line(), location.column());
        }
        if let Some(msg) = panic_info.payload().downcast_ref::<&str>() {
            log::error!("Panic message: {}", msg);
        }
    }));

    // Load environment variables from .env if present
    let _ = dotenv();

    match cli.command {
        Some(Commands::Encode { payload }) => print_or_fail(encode_command(&payload)),
        Some(Commands::Decode { token }) => print_or_fail(decode_command(&token)),
        Some(Commands::Init) => {
            init_logger(&config::LOG_FILE_PATH)?;
            let storage = Storage::open(config::DATA_DIR.clone());
            let created = storage.init_files().await?;
            log::info!("{} data file(s) created in {}", created.len(), storage.root().display());
            Ok(())
        }
        Some(Commands::Run) | None => {
            init_logger(&config::LOG_FILE_PATH)?;
            run_bot().await
        }
    }
}

fn print_or_fail(result: Result<String, String>) -> Result<()> {
    match result {
        Ok(text) => {
            println!("{}", text);
            Ok(())
        }
        Err(e) => Err(anyhow::anyhow!(e)),
    }
}

/// Waits for the Bot API; a local server may still be starting up.
async fn connect(bot: &Bot) -> Result<Me> {
    let mut attempt = 0;
    loop {
        match bot.get_me().await {
            Ok(me) => return Ok(me),
            Err(e) => {
                let err_str = e.to_string();
                let is_retryable = err_str.contains("restart")
                    || err_str.contains("network")
                    || err_str.contains("connection")
                    || err_str.contains("timed out")
                    || err_str.contains("Connection refused");

                attempt += 1;
                if attempt >= STARTUP_MAX_RETRIES || !is_retryable {
                    return Err(anyhow::anyhow!(
                        "Failed to connect to Bot API after {} retries: {}",
                        attempt,
                        e
                    ));
                }
                log::warn!(
                    "Bot API not ready (attempt {}/{}): {}. Retrying in 5 seconds...",
                    attempt,
                    STARTUP_MAX_RETRIES,
                    err_str
                );
                sleep(Duration::from_secs(5)).await;
            }
        }
    }
}

async fn run_bot() -> Result<()> {
    let bot_init_start = std::time::Instant::now();
    log::info!("Starting bot...");
    system::mark_started();
    log_startup_configuration();

    let storage = Arc::new(Storage::open(config::DATA_DIR.clone()));
    storage.init_files().await?;
    let seeded = storage.admins.seed(&config::admin::ADMIN_IDS).await?;
    if seeded > 0 {
        log::info!("Seeded {} admin(s) from ADMIN_IDS", seeded);
    }

    let bot = create_bot()?;
    let me = connect(&bot).await?;
    let bot_username = me.user.username.clone().unwrap_or_default();
    log::info!("Bot username: @{}, Bot ID: {}", bot_username, me.user.id);

    if let Err(e) = setup_bot_commands(&bot).await {
        log::warn!("Failed to set bot commands: {}", e);
    }

    let shortener = Arc::new(ShortenerClient::new()?);
    let deps = HandlerDeps::new(
        Arc::clone(&storage),
        shortener,
        bot_username,
        me.user.id,
        *config::owner::OWNER_ID,
    );

    match restore_expiry_timers(&bot, &deps).await {
        Ok(count) => log::info!("Re-armed expiry timers for {} admin(s)", count),
        Err(e) => log::error!("Failed to restore admin expiry timers: {}", e),
    }

    notify_owner(&bot, "✅ <b>Bot started!</b>", None).await;

    let restart = deps.restart.clone();
    let handler = schema(deps.clone());

    let init_elapsed = bot_init_start.elapsed();
    log::info!("================================================");
    log::info!("🎉 Bot initialization complete in {:.2}s", init_elapsed.as_secs_f64());
    log::info!("📡 Ready to receive updates!");
    log::info!("================================================");

    {
        use teloxide::update_listeners::Polling;

        let listener = Polling::builder(bot.clone()).drop_pending_updates().build();
        let mut dispatcher = Dispatcher::builder(bot.clone(), handler)
            .dependencies(DependencyMap::new())
            .enable_ctrlc_handler()
            .build();

        // /restart and /update stop polling through this token
        let shutdown = dispatcher.shutdown_token();
        let watch = restart.clone();
        tokio::spawn(async move {
            watch.cancelled().await;
            log::info!("Stopping dispatcher for restart");
            match shutdown.shutdown() {
                Ok(done) => done.await,
                Err(e) => log::warn!("Dispatcher was not running: {:?}", e),
            }
        });

        dispatcher
            .dispatch_with_listener(
                listener,
                LoggingErrorHandler::with_custom_text("An error from the update listener"),
            )
            .await;
    }

    deps.shutdown_timers();
    log::info!("Dispatcher shutdown gracefully");

    if restart.is_cancelled() {
        // Only returns when exec failed
        let err = process::reexec();
        return Err(anyhow::anyhow!("Restart failed: {}", err));
    }
    Ok(())
}
