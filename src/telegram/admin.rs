//! Admin management: /admins, /promote, /demote, /adminpanel, /admin_logs
//! and the expiry timers of temporary admins.

use chrono::{DateTime, TimeDelta, Utc};
use teloxide::prelude::*;
use teloxide::types::CallbackQuery;
use teloxide::utils::html::escape;

use crate::core::config::admin_expiry::{LOG_TAIL_LINES, SOON_WINDOW_SECS, WARNING_STAGES};
use crate::core::error::AppResult;
use crate::core::utils::{format_hours_minutes, format_ist, mention_html, parse_duration, truncate_message};
use crate::scheduler::spawn_delayed;
use crate::storage::{PromoteOutcome, SharedStorage};
use crate::telegram::bot::{parse_user_id, split_promote_args};
use crate::telegram::conversation::Pending;
use crate::telegram::handlers::types::{HandlerDeps, HandlerResult, NOT_AUTHORIZED_TEXT};
use crate::telegram::keyboards;
use crate::telegram::notifications::{notify_owner, notify_user};
use crate::telegram::ui::{self, edit_html, send_html};

const PANEL_TITLE: &str = "<b>🛠 Admin Control Panel</b>";

const PROMOTE_USAGE: &str = "Use: <b>/promote &lt;user_id&gt; &lt;duration(optional)&gt;</b>\n\n\
    Duration examples: 2d, 6h, 5min, 1y, 3m";

const DEMOTE_USAGE: &str = "Use: <b>/demote &lt;user_id&gt;</b>";

const EXPIRED_TEXT: &str = "❌ <b>Your admin access has expired.</b>\nYou no longer have admin privileges.";

/// Seconds a message stays after "Okay!" on the expiry notice
const EXPIRED_OKAY_DELETE_SECS: u64 = 10;

/// Best display name for an id: users.json first, then the Bot API.
async fn display_name(bot: &Bot, deps: &HandlerDeps, id: i64) -> Option<String> {
    let stored = deps
        .storage
        .users
        .load()
        .await
        .find(id)
        .and_then(|u| u.first_name.clone())
        .filter(|n| !n.is_empty());
    if stored.is_some() {
        return stored;
    }
    match bot.get_chat(ChatId(id)).await {
        Ok(chat) => chat.first_name().map(str::to_string),
        Err(e) => {
            log::debug!("Could not resolve name of {}: {}", id, e);
            None
        }
    }
}

async fn mention_of(bot: &Bot, deps: &HandlerDeps, id: i64) -> String {
    let name = display_name(bot, deps, id).await.unwrap_or_else(|| id.to_string());
    mention_html(id, &name)
}

pub fn render_admin_list(owner: Option<(i64, &str)>, admins: &[(i64, String)]) -> String {
    let mut lines = Vec::new();
    if let Some((id, mention)) = owner {
        lines.push(format!("👑 <b>Owner:</b> {} (ID: <code>{}</code>)", mention, id));
    }
    for (id, mention) in admins {
        lines.push(format!("⚡ <b>Admin:</b> {} (ID: <code>{}</code>)", mention, id));
    }
    format!(
        "🛡️ <b>Administrators</b>\n\n{}\n\n📊 <b>Total Admins:</b> <code>{}</code>",
        lines.join("\n"),
        admins.len()
    )
}

async fn admin_list_text(bot: &Bot, deps: &HandlerDeps) -> String {
    let file = deps.storage.admins.load().await;
    let owner_mention = if deps.owner_id != 0 {
        Some(mention_of(bot, deps, deps.owner_id).await)
    } else {
        None
    };
    let mut admins = Vec::new();
    for id in file.admins.iter().copied().filter(|id| *id != deps.owner_id) {
        admins.push((id, mention_of(bot, deps, id).await));
    }
    render_admin_list(owner_mention.as_deref().map(|m| (deps.owner_id, m)), &admins)
}

pub async fn handle_admins(bot: &Bot, msg: &Message, deps: &HandlerDeps) -> HandlerResult {
    if !deps.require_admin(bot, msg).await? {
        return Ok(());
    }
    let text = admin_list_text(bot, deps).await;
    send_html(
        bot,
        msg.chat.id,
        text,
        Some(keyboards::refresh_close("admins_refresh", "admins_close")),
    )
    .await?;
    Ok(())
}

/// `admins_refresh`
pub async fn on_admins_refresh(bot: &Bot, q: &CallbackQuery, deps: &HandlerDeps) -> HandlerResult {
    if !deps.is_authorized(ui::uid(&q.from)).await {
        ui::answer(bot, q, Some(NOT_AUTHORIZED_TEXT), true).await;
        return Ok(());
    }
    ui::answer(bot, q, Some("Refreshed"), false).await;
    if let Some((chat_id, message_id)) = ui::callback_origin(q) {
        let text = admin_list_text(bot, deps).await;
        if let Err(e) = edit_html(
            bot,
            chat_id,
            message_id,
            text,
            Some(keyboards::refresh_close("admins_refresh", "admins_close")),
        )
        .await
        {
            log::debug!("Admin list not refreshed: {}", e);
        }
    }
    Ok(())
}

pub struct Promotion<'a> {
    pub target_mention: &'a str,
    pub target_id: i64,
    pub promoter_mention: &'a str,
    pub promoted_at: DateTime<Utc>,
    pub expires_at: Option<DateTime<Utc>>,
}

fn expiry_label(expires_at: Option<DateTime<Utc>>) -> String {
    expires_at.map(format_ist).unwrap_or_else(|| "Permanent".to_string())
}

pub fn render_promoted(p: &Promotion<'_>) -> String {
    format!(
        "<b>Admin Promoted Successfully ✔</b>\n\n\
         <b>Name:</b> {}\n\
         <b>User ID:</b> <code>{}</code>\n\
         <b>Promoted by:</b> {}\n\
         <b>Promoted on:</b> {}\n\
         <b>Duration:</b> {}\n\n\
         <b>Usage:</b>\n\
         /promote &lt;user_id&gt; &lt;duration(optional)&gt;\n\n\
         <b>Duration Format:</b>\n\
         y=year, m=month, d=day, h=hour, min=minute\n\
         <b>Examples:</b> 2d, 6h, 5min, 1y, 3m",
        p.target_mention,
        p.target_id,
        p.promoter_mention,
        format_ist(p.promoted_at),
        expiry_label(p.expires_at)
    )
}

/// A `/promote` duration that is malformed or reaches past the last representable date
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InvalidDuration;

/// Expiry of a promotion: `None` is permanent and only happens without a duration.
pub fn promotion_expiry(
    duration_text: Option<&str>,
    now: DateTime<Utc>,
) -> Result<Option<DateTime<Utc>>, InvalidDuration> {
    let Some(text) = duration_text else {
        return Ok(None);
    };
    let duration = parse_duration(text).ok_or(InvalidDuration)?;
    now.checked_add_signed(duration).map(Some).ok_or(InvalidDuration)
}

pub async fn handle_promote(bot: &Bot, msg: &Message, deps: &HandlerDeps, args: &str) -> HandlerResult {
    if !deps.require_admin(bot, msg).await? {
        return Ok(());
    }
    if args.trim().is_empty() {
        send_html(bot, msg.chat.id, PROMOTE_USAGE, None).await?;
        return Ok(());
    }
    let Some((target_id, duration_text)) = split_promote_args(args) else {
        send_html(bot, msg.chat.id, "Invalid user ID.", None).await?;
        return Ok(());
    };
    let now = Utc::now();
    let Ok(expires_at) = promotion_expiry(duration_text.as_deref(), now) else {
        send_html(bot, msg.chat.id, format!("Invalid duration.\n\n{}", PROMOTE_USAGE), None).await?;
        return Ok(());
    };

    let caller = ui::sender_id(msg);

    deps.admin_timers.cancel(&target_id);
    let outcome = deps
        .storage
        .admins
        .update(|file| file.promote(target_id, expires_at))
        .await?;
    let label = expiry_label(expires_at);
    log::info!("Admin {} {:?} by {} until {}", target_id, outcome, caller, label);
    deps.storage
        .admin_log
        .record(&format!("PROMOTED → {} by {} duration={}", target_id, caller, label))
        .await;

    let target_mention = mention_of(bot, deps, target_id).await;
    let promoter_mention = msg
        .from
        .as_ref()
        .map(ui::mention)
        .unwrap_or_else(|| caller.to_string());
    let text = render_promoted(&Promotion {
        target_mention: &target_mention,
        target_id,
        promoter_mention: &promoter_mention,
        promoted_at: now,
        expires_at,
    });
    send_html(bot, msg.chat.id, text, Some(keyboards::owner_close())).await?;

    let greeting = match outcome {
        PromoteOutcome::Added => "🎉 <b>Congratulations!</b>\n\nYou are now an <b>admin</b>.",
        PromoteOutcome::Renewed => "🎉 <b>Congratulations!</b>\n\nYour <b>admin</b> access was renewed.",
    };
    notify_user(
        bot,
        target_id,
        &format!("{}\n<b>Expires:</b> {}", greeting, label),
        Some(keyboards::promoted_notice()),
    )
    .await;

    if let Some(at) = expires_at {
        schedule_expiry(bot, deps, target_id, at);
    }
    Ok(())
}

pub async fn handle_demote(bot: &Bot, msg: &Message, deps: &HandlerDeps, args: &str) -> HandlerResult {
    if !deps.require_admin(bot, msg).await? {
        return Ok(());
    }
    if args.trim().is_empty() {
        send_html(bot, msg.chat.id, DEMOTE_USAGE, None).await?;
        return Ok(());
    }
    let Some(target_id) = parse_user_id(args) else {
        send_html(bot, msg.chat.id, "Invalid ID.", None).await?;
        return Ok(());
    };
    if deps.is_owner(target_id) {
        send_html(bot, msg.chat.id, "Cannot demote owner.", None).await?;
        return Ok(());
    }
    if !deps.storage.admins.update(|file| file.demote(target_id)).await? {
        send_html(bot, msg.chat.id, "This user is not admin.", None).await?;
        return Ok(());
    }

    let caller = ui::sender_id(msg);
    deps.admin_timers.cancel(&target_id);
    log::info!("Admin {} demoted by {}", target_id, caller);
    deps.storage
        .admin_log
        .record(&format!("DEMOTED → {} by {}", target_id, caller))
        .await;

    let target_mention = mention_of(bot, deps, target_id).await;
    let demoter = msg
        .from
        .as_ref()
        .map(ui::mention)
        .unwrap_or_else(|| caller.to_string());
    let text = format!(
        "<b>User Demoted Successfully ✔</b>\n\n\
         <b>Name:</b> {}\n\
         <b>User ID:</b> <code>{}</code>\n\
         <b>Demoted by:</b> {}\n\
         <b>Demoted on:</b> {}",
        target_mention,
        target_id,
        demoter,
        format_ist(Utc::now())
    );
    send_html(bot, msg.chat.id, text, Some(keyboards::close("close_msg"))).await?;
    notify_user(bot, target_id, "⚠️ Your admin role has been removed.", None).await;
    Ok(())
}

pub async fn handle_admin_panel(bot: &Bot, msg: &Message, deps: &HandlerDeps) -> HandlerResult {
    if !deps.require_admin(bot, msg).await? {
        return Ok(());
    }
    send_html(bot, msg.chat.id, PANEL_TITLE, Some(keyboards::admin_panel())).await?;
    Ok(())
}

pub fn render_logs(lines: &[String]) -> String {
    if lines.is_empty() {
        return "No logs.".to_string();
    }
    let body = lines.iter().map(|l| escape(l)).collect::<Vec<_>>().join("\n");
    truncate_message(&format!("<b>📜 Admin Logs</b>\n\n{}", body), 4096)
}

pub async fn handle_admin_logs(bot: &Bot, msg: &Message, deps: &HandlerDeps) -> HandlerResult {
    if !deps.require_admin(bot, msg).await? {
        return Ok(());
    }
    let lines = deps.storage.admin_log.tail(LOG_TAIL_LINES).await;
    send_html(bot, msg.chat.id, render_logs(&lines), None).await?;
    Ok(())
}

pub fn render_panel_admins(entries: &[(String, i64, Option<DateTime<Utc>>)]) -> String {
    let mut text = String::from("<b>👑 Current Admins</b>\n\n");
    if entries.is_empty() {
        text.push_str("No admins yet.");
        return text;
    }
    for (mention, id, expires_at) in entries {
        text.push_str(&format!(
            "• {}\n  ID: <code>{}</code>\n  Expires: {}\n\n",
            mention,
            id,
            expiry_label(*expires_at)
        ));
    }
    text
}

/// Splits temporary admins into "within 24h" and "long-term". `None` when nobody has an expiry.
pub fn render_expiring(entries: &[(String, DateTime<Utc>)], now: DateTime<Utc>) -> Option<String> {
    if entries.is_empty() {
        return None;
    }
    let mut soon = Vec::new();
    let mut long = Vec::new();
    for (mention, at) in entries {
        let remaining = *at - now;
        if remaining.num_seconds() <= SOON_WINDOW_SECS {
            soon.push(format!("• {} — <b>{}</b>", mention, format_hours_minutes(remaining)));
        } else {
            long.push(format!("• {} — Expires: {}", mention, format_ist(*at)));
        }
    }
    let mut sections = Vec::new();
    if !soon.is_empty() {
        sections.push(format!("<b>⚠ Expiring Within 24h</b>\n\n{}", soon.join("\n")));
    }
    if !long.is_empty() {
        sections.push(format!("<b>🕒 Long-term Admins</b>\n\n{}", long.join("\n")));
    }
    Some(sections.join("\n\n"))
}

async fn panel_page_text(bot: &Bot, deps: &HandlerDeps, data: &str) -> String {
    let file = deps.storage.admins.load().await;
    match data {
        "panel_admins" => {
            let mut entries = Vec::new();
            for id in &file.admins {
                entries.push((mention_of(bot, deps, *id).await, *id, file.expiry_of(*id)));
            }
            render_panel_admins(&entries)
        }
        "panel_promote" => format!("Use:\n{}", PROMOTE_USAGE.trim_start_matches("Use: ")),
        "panel_demote" => format!("Use:\n{}", DEMOTE_USAGE.trim_start_matches("Use: ")),
        "panel_logs" => "Open logs:\n<b>/admin_logs</b>".to_string(),
        _ => {
            let mut entries = Vec::new();
            for (id, at) in file.with_expiry() {
                entries.push((mention_of(bot, deps, id).await, at));
            }
            render_expiring(&entries, Utc::now()).unwrap_or_else(|| "No admins with expiry.".to_string())
        }
    }
}

/// `panel_*`, `admin_back`, `admin_okay`, `expired_*` and `close_msg`.
pub async fn on_panel_callback(bot: &Bot, q: &CallbackQuery, deps: &HandlerDeps, data: &str) -> HandlerResult {
    let user_id = ui::uid(&q.from);
    let Some((chat_id, message_id)) = ui::callback_origin(q) else {
        ui::answer(bot, q, None, false).await;
        return Ok(());
    };

    match data {
        "close_msg" => ui::close_callback_message(bot, q).await,
        "admin_okay" => {
            ui::answer(bot, q, Some("Congratulations 🎉 you have now access to our bot"), true).await;
            ui::delete_quietly(bot, chat_id, message_id).await;
        }
        "expired_okay" => {
            ui::answer(
                bot,
                q,
                Some("Thank you! For using our bot please give us feedback to improve our bot"),
                true,
            )
            .await;
            let bot = bot.clone();
            spawn_delayed(
                deps.dialog_timers.detached_token(),
                std::time::Duration::from_secs(EXPIRED_OKAY_DELETE_SECS),
                async move { ui::delete_quietly(&bot, chat_id, message_id).await },
            );
        }
        "expired_feedback" => {
            ui::answer(bot, q, None, false).await;
            deps.conversations.set(user_id, Pending::Feedback);
            send_html(bot, chat_id, "💬 <b>Please type your feedback.</b>", None).await?;
        }
        _ => {
            if !deps.is_authorized(user_id).await {
                ui::answer(bot, q, Some(NOT_AUTHORIZED_TEXT), true).await;
                return Ok(());
            }
            ui::answer(bot, q, None, false).await;
            if data == "admin_back" {
                edit_html(bot, chat_id, message_id, PANEL_TITLE, Some(keyboards::admin_panel())).await?;
            } else {
                let text = panel_page_text(bot, deps, data).await;
                edit_html(bot, chat_id, message_id, text, Some(keyboards::panel_page())).await?;
            }
        }
    }
    Ok(())
}

pub fn render_feedback(from_mention: &str, from_id: i64, text: &str) -> String {
    format!(
        "📩 <b>Admin Feedback Received</b>\n\n\
         <b>From:</b> {}\n\
         <b>User ID:</b> <code>{}</code>\n\n\
         <b>Message:</b>\n{}",
        from_mention,
        from_id,
        escape(text)
    )
}

/// Next text after "Feedback" on the expiry notice; forwarded to the owner.
pub async fn on_feedback(bot: &Bot, msg: &Message, deps: &HandlerDeps) -> HandlerResult {
    let user_id = ui::sender_id(msg);
    let Some(text) = msg.text().filter(|t| !t.trim().is_empty()) else {
        send_html(bot, msg.chat.id, "💬 Please send your feedback as text.", None).await?;
        return Ok(());
    };
    deps.conversations.take_if(user_id, |p| *p == Pending::Feedback);

    let from = msg
        .from
        .as_ref()
        .map(ui::mention)
        .unwrap_or_else(|| user_id.to_string());
    if !notify_owner(bot, &render_feedback(&from, user_id, text), None).await {
        log::warn!("Feedback from {} could not reach the owner", user_id);
    }
    send_html(bot, msg.chat.id, "✨ <b>Thanks for your feedback!</b>", None).await?;
    Ok(())
}

/// Warning stages still ahead of `now`, with their delay from `now`.
pub fn warning_plan(expires_at: DateTime<Utc>, now: DateTime<Utc>) -> Vec<(&'static str, TimeDelta)> {
    WARNING_STAGES
        .iter()
        .filter_map(|(label, secs_before)| {
            let at = expires_at - TimeDelta::seconds(*secs_before);
            (at > now).then(|| (*label, at - now))
        })
        .collect()
}

fn to_std(delta: TimeDelta) -> std::time::Duration {
    delta.to_std().unwrap_or_default()
}

pub fn render_warning(expires_at: DateTime<Utc>, now: DateTime<Utc>) -> String {
    format!(
        "⚠️ <b>Your admin access is expiring soon</b>\n\n\
         <b>Expires:</b> {}\n\
         <b>Time left:</b> {}",
        format_ist(expires_at),
        format_hours_minutes(expires_at - now)
    )
}

async fn send_warning(bot: &Bot, storage: &SharedStorage, user_id: i64, label: &str) {
    let Some(expires_at) = storage.admins.load().await.expiry_of(user_id) else {
        return;
    };
    notify_user(bot, user_id, &render_warning(expires_at, Utc::now()), None).await;
    storage
        .admin_log
        .record(&format!("WARNING {} → {}", label, user_id))
        .await;
}

async fn expire_admin(bot: &Bot, storage: &SharedStorage, user_id: i64) -> AppResult<()> {
    storage.admins.update(|file| file.demote(user_id)).await?;
    log::info!("Admin role of {} expired", user_id);
    notify_user(bot, user_id, EXPIRED_TEXT, Some(keyboards::expired_notice())).await;
    storage.admin_log.record(&format!("EXPIRED → {}", user_id)).await;
    Ok(())
}

/// Arms the warning jobs and the final expiry job of a temporary admin,
/// replacing whatever was armed for them before.
pub fn schedule_expiry(bot: &Bot, deps: &HandlerDeps, user_id: i64, expires_at: DateTime<Utc>) {
    let now = Utc::now();
    let armed = deps.admin_timers.arm(user_id);

    for (label, delay) in warning_plan(expires_at, now) {
        let bot = bot.clone();
        let storage = deps.storage.clone();
        spawn_delayed(armed.token.clone(), to_std(delay), async move {
            send_warning(&bot, &storage, user_id, label).await;
        });
    }

    let bot = bot.clone();
    let storage = deps.storage.clone();
    let timers = deps.admin_timers.clone();
    let generation = armed.generation;
    spawn_delayed(armed.token, to_std(expires_at - now), async move {
        if let Err(e) = expire_admin(&bot, &storage, user_id).await {
            log::error!("Failed to expire admin {}: {}", user_id, e);
        }
        timers.finish(&user_id, generation);
    });
    log::debug!("Expiry timers armed for {} until {}", user_id, expires_at);
}

/// Startup: drops admins that expired while the bot was down and re-arms the rest.
pub async fn restore_expiry_timers(bot: &Bot, deps: &HandlerDeps) -> AppResult<usize> {
    let expired = deps
        .storage
        .admins
        .update(|file| file.cleanup_expired(Utc::now()))
        .await?;
    for id in &expired {
        log::info!("Admin role of {} expired while offline", id);
        deps.storage.admin_log.record(&format!("EXPIRED → {}", id)).await;
    }

    let pending = deps.storage.admins.load().await.with_expiry();
    for (id, at) in &pending {
        schedule_expiry(bot, deps, *id, *at);
    }
    Ok(pending.len())
}
