//! Bot initialization and command definitions
//!
//! This module contains:
//! - Command enum definition
//! - Bot instance creation
//! - Command argument parsing shared by the admin commands

use reqwest::ClientBuilder;
use teloxide::prelude::*;
use teloxide::utils::command::BotCommands;

use crate::core::config;

/// Bot commands enum with descriptions
#[derive(BotCommands, Clone, Debug, PartialEq, Eq)]
#[command(rename_rule = "lowercase", description = "Available commands:")]
pub enum Command {
    #[command(description = "start the bot or open a file link")]
    Start(String),
    #[command(description = "show the help message")]
    Help,
    #[command(description = "generate a link for the replied message")]
    Genlink,
    #[command(description = "generate a link for a range of channel posts")]
    Batchlink,
    #[command(description = "manage force-subscribe channels")]
    Fsub,
    #[command(description = "bot settings")]
    Settings,
    #[command(description = "promote a user to admin: /promote <id> [duration]")]
    Promote(String),
    #[command(description = "demote an admin: /demote <id>")]
    Demote(String),
    #[command(description = "admin control panel")]
    Adminpanel,
    #[command(rename = "admin_logs", description = "recent admin log entries")]
    AdminLogs,
    #[command(description = "list admins")]
    Admins,
    #[command(description = "ban a user: /ban <id>")]
    Ban(String),
    #[command(description = "unban a user: /unban <id>")]
    Unban(String),
    #[command(description = "user statistics")]
    Users,
    #[command(description = "broadcast the replied message to every user")]
    Broadcast,
    #[command(rename = "broadcast_status", description = "progress of the running broadcast")]
    BroadcastStatus,
    #[command(description = "system statistics")]
    Stats,
    #[command(description = "check latency")]
    Ping,
    #[command(description = "check that the bot is alive")]
    Alive,
    #[command(description = "restart the bot")]
    Restart,
    #[command(description = "pull updates and restart")]
    Update,
    #[command(description = "URL shortener setup")]
    Shortener,
    #[command(description = "shorten a link")]
    Shortlink,
}

/// Creates a Bot instance with custom or default API URL
///
/// # Returns
/// * `Ok(Bot)` - Successfully created bot instance
/// * `Err(anyhow::Error)` - Failed to create bot (invalid URL, HTTP client error)
pub fn create_bot() -> anyhow::Result<Bot> {
    let client = ClientBuilder::new().timeout(config::network::timeout()).build()?;
    let bot = Bot::with_client(config::BOT_TOKEN.as_str(), client);

    let bot = match config::BOT_API_URL.as_deref() {
        Some(bot_api_url) => {
            log::info!("Using custom Bot API URL: {}", bot_api_url);
            let url = url::Url::parse(bot_api_url).map_err(|e| anyhow::anyhow!("Invalid BOT_API_URL: {}", e))?;
            bot.set_api_url(url)
        }
        None => bot,
    };

    Ok(bot)
}

/// Sets up bot commands in the Telegram UI
pub async fn setup_bot_commands(bot: &Bot) -> Result<(), teloxide::RequestError> {
    bot.set_my_commands(Command::bot_commands()).await?;
    Ok(())
}

/// Parses the first argument of an admin command as a user id.
pub fn parse_user_id(args: &str) -> Option<i64> {
    args.split_whitespace().next()?.parse().ok()
}

/// Splits `/promote` arguments into the user id and the optional duration text.
pub fn split_promote_args(args: &str) -> Option<(i64, Option<String>)> {
    let mut parts = args.split_whitespace();
    let user_id = parts.next()?.parse().ok()?;
    let rest: Vec<&str> = parts.collect();
    let duration = if rest.is_empty() { None } else { Some(rest.join("")) };
    Some((user_id, duration))
}
