//! /shortener setup dialog and /shortlink.

use std::sync::Arc;
use std::time::Duration;

use teloxide::prelude::*;
use teloxide::types::{CallbackQuery, InlineKeyboardMarkup, MessageId};
use teloxide::utils::html::escape;

use crate::core::config::shortener::{
    setup_timeout, COUNTDOWN_SECS, COUNTDOWN_TICK_SECS, MIN_TOKEN_LEN, PROBE_URL, SETUP_TIMEOUT_SECS,
};
use crate::scheduler::{spawn_delayed, TimerRegistry};
use crate::shortener::SetupInput;
use crate::storage::{LinkRecord, LinkTarget, ShortenerConfig};
use crate::telegram::conversation::{Conversations, Pending};
use crate::telegram::handlers::types::{HandlerDeps, HandlerResult, NOT_AUTHORIZED_TEXT};
use crate::telegram::keyboards;
use crate::telegram::ui::{self, edit_html, send_html};

const EXPIRED_TEXT: &str = "⏰ <b>Time Expired</b>\n\n\
    The time limit has expired. Please use /shortener again to retry.";

pub fn render_status(config: &ShortenerConfig) -> String {
    if config.is_ready() {
        format!(
            "🔗 <b>Shortener Settings</b>\n\n\
             ✅ <b>Status:</b> Enabled\n\
             🌐 <b>Website:</b> {}\n\n\
             📝 <b>Usage:</b> Use /shortlink and send a message to generate a shortened link\n\
             🔄 <b>To change shortener:</b> press \"Change Shortener\"",
            escape(&config.website_name)
        )
    } else {
        "🔗 <b>Shortener Settings</b>\n\n\
         📢 Please add the shortener API first to enable link shortening.\n\n\
         Supported shorteners:\n\
         • GPLinks\n• ShortConnect\n• Dalink\n• Any site with a <code>/api</code> endpoint"
            .to_string()
    }
}

fn status_keyboard(config: &ShortenerConfig) -> InlineKeyboardMarkup {
    if config.is_ready() {
        keyboards::shortener_enabled()
    } else {
        keyboards::shortener_missing()
    }
}

pub fn render_token_prompt(changing: bool) -> String {
    let headline = if changing {
        "🔄 <b>Change Shortener</b>\n\nPlease send me your new API token"
    } else {
        "🔗 <b>Add Shortener API</b>\n\nPlease send me your API token from any shortener website"
    };
    format!(
        "{} within {} seconds.\n\n\
         📋 <b>Format:</b> <code>API_TOKEN</code>\n\
         🌐 <b>Custom site:</b> <code>API_TOKEN https://your-shortener.com</code>\n\n\
         ⏰ <b>Time Limit:</b> {} seconds",
        headline, SETUP_TIMEOUT_SECS, SETUP_TIMEOUT_SECS
    )
}

pub fn render_verified(website_name: &str) -> String {
    format!(
        "✅ <b>Shortener Set Successfully</b>\n\n\
         🌐 <b>Website:</b> {}\n\
         🔗 <b>API Status:</b> Verified\n\n\
         📝 <b>Usage:</b> Use /shortlink to generate shortened links",
        escape(website_name)
    )
}

pub const VERIFICATION_FAILED_TEXT: &str = "❌ <b>API Verification Failed</b>\n\n\
    The provided API token could not be verified. Please check:\n\
    • API token is correct\n\
    • Supported shortener service\n\
    • Internet connection\n\n\
    For another service, send <code>API_TOKEN https://your-shortener.com</code> \
    before the time runs out, or use /shortener to try again.";

pub fn render_invalid_token(reason: &str) -> String {
    format!(
        "❌ <b>Invalid API Token</b>\n\n\
         {}.\nIt should be at least {} characters long.\n\n\
         Use /shortener to try again.",
        escape(reason),
        MIN_TOKEN_LEN
    )
}

pub fn render_countdown(remaining_secs: u64) -> String {
    format!(
        "<blockquote>Please send or forward a message to generate a link.</blockquote>\n\
         Timeout: {}s remaining",
        remaining_secs
    )
}

/// Remaining seconds shown at each countdown edit, after the initial full value.
pub fn countdown_ticks() -> Vec<u64> {
    (1..COUNTDOWN_SECS / COUNTDOWN_TICK_SECS)
        .rev()
        .map(|n| n * COUNTDOWN_TICK_SECS)
        .collect()
}

pub fn render_shortened(service: &str, short_url: &str, original: &str) -> String {
    format!(
        "🔗 <b>Shortened Link Generated</b>\n\n\
         🌐 <b>Service:</b> {}\n\
         🔗 <b>Short URL:</b> {}\n\n\
         📎 <b>Original URL:</b>\n<code>{}</code>",
        escape(service),
        escape(short_url),
        escape(original)
    )
}

pub async fn handle_shortener(bot: &Bot, msg: &Message, deps: &HandlerDeps) -> HandlerResult {
    if !deps.require_admin(bot, msg).await? {
        return Ok(());
    }
    let config = deps.storage.shortener.load().await;
    send_html(bot, msg.chat.id, render_status(&config), Some(status_keyboard(&config))).await?;
    Ok(())
}

fn is_token_dialog(chat_id: i64, message_id: i32) -> impl Fn(&Pending) -> bool {
    move |p| *p == Pending::ShortenerToken { chat_id, message_id }
}

/// Closes the token dialog when the timer wins; the prompt turns into "Time Expired".
fn arm_setup_timeout(bot: &Bot, deps: &HandlerDeps, user_id: i64, chat_id: ChatId, message_id: MessageId) {
    let bot = bot.clone();
    let conversations = deps.conversations.clone();
    let timers = deps.dialog_timers.clone();
    let armed = deps.dialog_timers.arm(user_id);
    let generation = armed.generation;
    spawn_delayed(armed.token, setup_timeout(), async move {
        timers.finish(&user_id, generation);
        if conversations
            .take_if(user_id, is_token_dialog(chat_id.0, message_id.0))
            .is_none()
        {
            return;
        }
        log::info!("Shortener setup of {} timed out", user_id);
        if let Err(e) = edit_html(&bot, chat_id, message_id, EXPIRED_TEXT, Some(keyboards::shortener_retry())).await {
            log::debug!("Could not mark shortener prompt expired: {}", e);
        }
    });
}

/// `shortener_*` buttons.
pub async fn on_callback(bot: &Bot, q: &CallbackQuery, deps: &HandlerDeps, data: &str) -> HandlerResult {
    let user_id = ui::uid(&q.from);
    if !deps.is_authorized(user_id).await {
        ui::answer(bot, q, Some(NOT_AUTHORIZED_TEXT), true).await;
        return Ok(());
    }
    let Some((chat_id, message_id)) = ui::callback_origin(q) else {
        ui::answer(bot, q, None, false).await;
        return Ok(());
    };
    let close_dialog = || {
        deps.conversations
            .take_if(user_id, is_token_dialog(chat_id.0, message_id.0));
        deps.dialog_timers.cancel(&user_id);
    };

    match data {
        "shortener_add" | "shortener_change" => {
            ui::answer(bot, q, None, false).await;
            edit_html(
                bot,
                chat_id,
                message_id,
                render_token_prompt(data == "shortener_change"),
                Some(keyboards::shortener_waiting()),
            )
            .await?;
            deps.conversations.set(
                user_id,
                Pending::ShortenerToken {
                    chat_id: chat_id.0,
                    message_id: message_id.0,
                },
            );
            arm_setup_timeout(bot, deps, user_id, chat_id, message_id);
        }
        "shortener_cancel" => {
            ui::answer(bot, q, Some("Cancelled"), false).await;
            close_dialog();
            let config = deps.storage.shortener.load().await;
            edit_html(bot, chat_id, message_id, render_status(&config), Some(status_keyboard(&config))).await?;
        }
        "shortener_disable" => {
            ui::answer(bot, q, None, false).await;
            deps.storage.shortener.update(|c| c.disable()).await?;
            log::info!("Shortener disabled by {}", user_id);
            edit_html(
                bot,
                chat_id,
                message_id,
                "❌ <b>Shortener Disabled</b>\n\nLink shortening has been disabled successfully.",
                Some(keyboards::shortener_disabled()),
            )
            .await?;
        }
        "shortener_test" => {
            ui::answer(bot, q, Some("Testing..."), false).await;
            let config = deps.storage.shortener.load().await;
            match deps.shortener.shorten(&config, PROBE_URL).await {
                Ok(test_url) => {
                    let text = format!(
                        "✅ <b>Shortener Test Successful</b>\n\n\
                         🌐 <b>Service:</b> {}\n\
                         🔗 <b>Test URL:</b> {}\n\n\
                         Your shortener is working correctly!",
                        escape(&config.website_name),
                        escape(&test_url)
                    );
                    edit_html(bot, chat_id, message_id, text, Some(keyboards::shortener_tested(&test_url))).await?;
                }
                Err(e) => {
                    log::warn!("Shortener test failed: {}", e);
                    let text = format!(
                        "❌ <b>Shortener Test Failed</b>\n\nError: {}\n\nPlease check your API settings.",
                        escape(&e.to_string())
                    );
                    edit_html(bot, chat_id, message_id, text, Some(keyboards::close("shortener_close"))).await?;
                }
            }
        }
        _ => {
            close_dialog();
            ui::close_callback_message(bot, q).await;
        }
    }
    Ok(())
}

/// The API token typed while the setup dialog is open.
pub async fn on_token_input(
    bot: &Bot,
    msg: &Message,
    deps: &HandlerDeps,
    prompt_chat: i64,
    prompt_message: i32,
) -> HandlerResult {
    let user_id = ui::sender_id(msg);
    let input = match SetupInput::parse(msg.text().unwrap_or_default()) {
        Ok(input) => input,
        Err(e) => {
            deps.conversations
                .take_if(user_id, is_token_dialog(prompt_chat, prompt_message));
            deps.dialog_timers.cancel(&user_id);
            send_html(bot, msg.chat.id, render_invalid_token(&e.to_string()), None).await?;
            return Ok(());
        }
    };

    let status = send_html(bot, msg.chat.id, "⏳ Verifying API token…", None).await?;
    let Some(service) = deps.shortener.resolve(&input).await else {
        // dialog stays open so the token can be resent with a website
        edit_html(bot, msg.chat.id, status.id, VERIFICATION_FAILED_TEXT, None).await?;
        return Ok(());
    };
    if deps
        .conversations
        .take_if(user_id, is_token_dialog(prompt_chat, prompt_message))
        .is_none()
    {
        log::info!("Shortener token of {} verified after the dialog closed", user_id);
        ui::delete_quietly(bot, msg.chat.id, status.id).await;
        return Ok(());
    }
    deps.dialog_timers.cancel(&user_id);

    let name = service.name();
    let config = service.into_config(input.token);
    deps.storage.shortener.save(&config).await?;
    log::info!("Shortener set to {} ({}) by {}", name, config.website, user_id);

    if let Err(e) = edit_html(
        bot,
        ChatId(prompt_chat),
        MessageId(prompt_message),
        render_verified(name),
        Some(keyboards::shortener_ready()),
    )
    .await
    {
        log::debug!("Shortener prompt not updated: {}", e);
    }
    edit_html(
        bot,
        msg.chat.id,
        status.id,
        format!("✅ Successfully set {}!\n\nYou can now create shortened links with /shortlink", escape(name)),
        None,
    )
    .await?;
    Ok(())
}

fn is_shortlink_dialog(chat_id: i64, message_id: i32) -> impl Fn(&Pending) -> bool {
    move |p| *p == Pending::ShortLink { chat_id, message_id }
}

async fn run_countdown(
    bot: Bot,
    conversations: Arc<Conversations>,
    timers: Arc<TimerRegistry<i64>>,
    user_id: i64,
    chat_id: ChatId,
    message_id: MessageId,
    generation: u64,
) {
    for remaining in countdown_ticks() {
        tokio::time::sleep(Duration::from_secs(COUNTDOWN_TICK_SECS)).await;
        if let Err(e) = edit_html(&bot, chat_id, message_id, render_countdown(remaining), None).await {
            log::debug!("Countdown edit skipped: {}", e);
        }
    }
    tokio::time::sleep(Duration::from_secs(COUNTDOWN_TICK_SECS)).await;

    timers.finish(&user_id, generation);
    if conversations
        .take_if(user_id, is_shortlink_dialog(chat_id.0, message_id.0))
        .is_some()
    {
        if let Err(e) = edit_html(&bot, chat_id, message_id, "⏰ <b>Time expired!</b>", None).await {
            log::debug!("Countdown expiry edit skipped: {}", e);
        }
    }
}

pub async fn handle_shortlink(bot: &Bot, msg: &Message, deps: &HandlerDeps) -> HandlerResult {
    if !deps.require_admin(bot, msg).await? {
        return Ok(());
    }
    if !deps.storage.shortener.load().await.is_ready() {
        send_html(bot, msg.chat.id, "❌ Shortener not set. Use /shortener", None).await?;
        return Ok(());
    }

    let user_id = ui::sender_id(msg);
    let prompt = send_html(bot, msg.chat.id, render_countdown(COUNTDOWN_SECS), None).await?;
    deps.conversations.set(
        user_id,
        Pending::ShortLink {
            chat_id: msg.chat.id.0,
            message_id: prompt.id.0,
        },
    );

    let armed = deps.dialog_timers.arm(user_id);
    let countdown = run_countdown(
        bot.clone(),
        deps.conversations.clone(),
        deps.dialog_timers.clone(),
        user_id,
        msg.chat.id,
        prompt.id,
        armed.generation,
    );
    tokio::spawn(async move {
        tokio::select! {
            _ = armed.token.cancelled() => {}
            _ = countdown => {}
        }
    });
    Ok(())
}

/// The message sent while the /shortlink countdown runs.
pub async fn on_shortlink_input(
    bot: &Bot,
    msg: &Message,
    deps: &HandlerDeps,
    prompt_chat: i64,
    prompt_message: i32,
) -> HandlerResult {
    let user_id = ui::sender_id(msg);
    if deps
        .conversations
        .take_if(user_id, is_shortlink_dialog(prompt_chat, prompt_message))
        .is_none()
    {
        return Ok(());
    }
    deps.dialog_timers.cancel(&user_id);

    let prompt_chat = ChatId(prompt_chat);
    let prompt_message = MessageId(prompt_message);
    if let Err(e) = edit_html(bot, prompt_chat, prompt_message, "⏳ Generating shortlink…", None).await {
        log::debug!("Shortlink prompt not updated: {}", e);
    }

    let target = LinkTarget::Single {
        chat_id: msg.chat.id.0,
        message_id: msg.id.0,
    };
    let token = target.payload().token();
    let record = LinkRecord::new(target, user_id);
    deps.storage
        .links
        .update(|links| links.insert(token.clone(), record))
        .await?;
    let original = deps.start_link(&token);

    let config = deps.storage.shortener.load().await;
    match deps.shortener.shorten(&config, &original).await {
        Ok(short_url) => {
            log::info!("Short link {} created for {} by {}", short_url, token, user_id);
            edit_html(
                bot,
                prompt_chat,
                prompt_message,
                render_shortened(&config.website_name, &short_url, &original),
                Some(keyboards::short_link(&short_url)),
            )
            .await?;
        }
        Err(e) => {
            log::warn!("Shortening {} failed: {}", original, e);
            let text = format!(
                "❌ <b>Shortening Failed</b>\n\nError: {}\n\n\
                 The original link still works:\n<code>{}</code>\n\n\
                 Please check your API settings in /shortener",
                escape(&e.to_string()),
                original
            );
            edit_html(bot, prompt_chat, prompt_message, text, Some(keyboards::copy_link(&original))).await?;
        }
    }
    Ok(())
}

/// `shortlink_copy_<url>`
pub async fn on_shortlink_copy(bot: &Bot, q: &CallbackQuery, data: &str) -> HandlerResult {
    let url = data.strip_prefix("shortlink_copy_").unwrap_or_default();
    ui::answer(bot, q, Some(&format!("Copied: {}", url)), true).await;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_render_status() {
        let mut config = ShortenerConfig::default();
        assert!(render_status(&config).contains("Please add the shortener API first"));

        config.enabled = true;
        config.api_key = "0123456789abcdef".to_string();
        config.website_name = "GPLinks".to_string();
        assert!(render_status(&config).contains("<b>Website:</b> GPLinks"));
    }

    #[test]
    fn test_countdown_ticks() {
        let ticks = countdown_ticks();
        assert_eq!(ticks.first(), Some(&55));
        assert_eq!(ticks.last(), Some(&5));
        assert_eq!(ticks.len(), 11);
    }

    #[test]
    fn test_render_countdown() {
        assert!(render_countdown(60).ends_with("Timeout: 60s remaining"));
    }

    #[test]
    fn test_render_shortened_escapes() {
        let text = render_shortened("Dalink", "https://dalink.in/a?b=1&c=2", "https://t.me/bot?start=x");
        assert!(text.contains("https://dalink.in/a?b=1&amp;c=2"));
        assert!(text.contains("<code>https://t.me/bot?start=x</code>"));
    }

    #[test]
    fn test_token_prompt_mentions_custom_form() {
        assert!(render_token_prompt(false).contains("API_TOKEN https://your-shortener.com"));
        assert!(render_token_prompt(true).starts_with("🔄 <b>Change Shortener</b>"));
    }
}
