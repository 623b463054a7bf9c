//! /broadcast and /broadcast_status (owner only).

use chrono::Utc;
use teloxide::prelude::*;
use teloxide::types::{CallbackQuery, MessageId};
use tokio_util::sync::CancellationToken;

use crate::broadcast::{
    render_progress, render_started, render_status, render_summary, should_report, BroadcastTracker, CANCELLED_TEXT,
    NEW_BROADCAST_TEXT,
};
use crate::core::config;
use crate::telegram::handlers::types::{HandlerDeps, HandlerResult, OWNER_ONLY_TEXT};
use crate::telegram::keyboards;
use crate::telegram::ui::{self, edit_html, send_html};

const ALREADY_RUNNING_TEXT: &str = "⚠️ <b>Broadcast is already in progress!</b>\n\n\
    Please wait for the current broadcast to complete or cancel it first.";

const USAGE_TEXT: &str = "❌ <b>Usage:</b> /broadcast (reply to a message)\n\n\
    Please reply to the message you want to broadcast.";

/// Where the broadcast message comes from and where its status is shown
#[derive(Debug, Clone, Copy)]
struct Job {
    source_chat: ChatId,
    source_message: MessageId,
    status_chat: ChatId,
    status_message: MessageId,
}

pub async fn handle_broadcast(bot: &Bot, msg: &Message, deps: &HandlerDeps) -> HandlerResult {
    if !deps.require_owner(bot, msg).await? {
        return Ok(());
    }
    if deps.broadcast.is_running() {
        send_html(bot, msg.chat.id, ALREADY_RUNNING_TEXT, None).await?;
        return Ok(());
    }
    let Some(source) = msg.reply_to_message() else {
        send_html(bot, msg.chat.id, USAGE_TEXT, None).await?;
        return Ok(());
    };

    let recipients = deps.storage.users.load().await.ids();
    if recipients.is_empty() {
        send_html(bot, msg.chat.id, "❌ No users found in the database!", None).await?;
        return Ok(());
    }
    let Some(token) = deps.broadcast.try_start(recipients.len()) else {
        send_html(bot, msg.chat.id, ALREADY_RUNNING_TEXT, None).await?;
        return Ok(());
    };

    let started = deps.broadcast.snapshot().map(|p| render_started(&p)).unwrap_or_default();
    let status = match send_html(bot, msg.chat.id, started, Some(keyboards::broadcast_running())).await {
        Ok(status) => status,
        Err(e) => {
            deps.broadcast.finish();
            return Err(e.into());
        }
    };
    log::info!("Broadcast to {} users started by {}", recipients.len(), ui::sender_id(msg));

    let job = Job {
        source_chat: source.chat.id,
        source_message: source.id,
        status_chat: msg.chat.id,
        status_message: status.id,
    };
    tokio::spawn(run(bot.clone(), deps.broadcast.clone(), token, recipients, job));
    Ok(())
}

async fn run(
    bot: Bot,
    tracker: std::sync::Arc<BroadcastTracker>,
    token: CancellationToken,
    recipients: Vec<i64>,
    job: Job,
) {
    let total = recipients.len();
    for user_id in recipients {
        if token.is_cancelled() {
            break;
        }
        let delivered = match bot
            .copy_message(ChatId(user_id), job.source_chat, job.source_message)
            .await
        {
            Ok(_) => true,
            Err(e) => {
                log::debug!("Broadcast to {} failed: {}", user_id, e);
                false
            }
        };
        let Some(progress) = tracker.record(delivered) else {
            break;
        };

        if should_report(progress.current, total) && !token.is_cancelled() {
            let elapsed = (Utc::now() - progress.started_at).num_milliseconds() as f64 / 1000.0;
            if let Err(e) = edit_html(
                &bot,
                job.status_chat,
                job.status_message,
                render_progress(&progress, elapsed),
                Some(keyboards::broadcast_running()),
            )
            .await
            {
                log::debug!("Broadcast progress not updated: {}", e);
            }
        }

        tokio::select! {
            _ = token.cancelled() => break,
            _ = tokio::time::sleep(config::broadcast::send_delay()) => {}
        }
    }

    let Some((progress, cancelled)) = tracker.finish() else {
        return;
    };
    let duration = (Utc::now() - progress.started_at).num_seconds().max(0) as u64;
    log::info!(
        "Broadcast {}: {} sent, {} failed, {} skipped",
        if cancelled { "cancelled" } else { "completed" },
        progress.success,
        progress.failed,
        progress.remaining()
    );
    if let Err(e) = edit_html(
        &bot,
        job.status_chat,
        job.status_message,
        render_summary(&progress, cancelled, duration),
        Some(keyboards::broadcast_finished()),
    )
    .await
    {
        log::warn!("Broadcast summary not shown: {}", e);
    }
}

pub async fn handle_broadcast_status(bot: &Bot, msg: &Message, deps: &HandlerDeps) -> HandlerResult {
    if !deps.require_owner(bot, msg).await? {
        return Ok(());
    }
    let snapshot = deps.broadcast.snapshot();
    let keyboard = snapshot.as_ref().map(|_| keyboards::broadcast_running());
    send_html(bot, msg.chat.id, render_status(snapshot.as_ref()), keyboard).await?;
    Ok(())
}

/// `broadcast_cancel`, `broadcast_new`, `broadcast_close`.
pub async fn on_callback(bot: &Bot, q: &CallbackQuery, deps: &HandlerDeps, data: &str) -> HandlerResult {
    if !deps.is_owner(ui::uid(&q.from)) {
        ui::answer(bot, q, Some(OWNER_ONLY_TEXT), true).await;
        return Ok(());
    }
    let Some((chat_id, message_id)) = ui::callback_origin(q) else {
        ui::answer(bot, q, None, false).await;
        return Ok(());
    };

    match data {
        "broadcast_cancel" => {
            if !deps.broadcast.cancel() {
                ui::answer(bot, q, Some("No broadcast is running."), true).await;
                return Ok(());
            }
            ui::answer(bot, q, Some("Broadcast cancelled"), false).await;
            log::info!("Broadcast cancelled by {}", ui::uid(&q.from));
            edit_html(bot, chat_id, message_id, CANCELLED_TEXT, Some(keyboards::broadcast_finished())).await?;
        }
        "broadcast_new" => {
            ui::answer(bot, q, None, false).await;
            edit_html(bot, chat_id, message_id, NEW_BROADCAST_TEXT, Some(keyboards::close("broadcast_close"))).await?;
        }
        _ => ui::close_callback_message(bot, q).await,
    }
    Ok(())
}
