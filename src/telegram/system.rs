//! /stats, /ping, /alive and the owner maintenance commands /restart, /update.

use std::time::{Duration, Instant};

use teloxide::prelude::*;
use teloxide::types::MessageId;
use teloxide::utils::html::escape;

use crate::core::disk::{get_disk_space, DiskSpaceInfo};
use crate::core::process::{git_pull, PullOutcome};
use crate::core::system::{memory_info, process_rss_mb, sample_cpu, samples_to_chart, uptime_secs, MemoryInfo};
use crate::core::utils::{format_uptime, truncate_message};
use crate::telegram::handlers::types::{HandlerDeps, HandlerResult};
use crate::telegram::ui::{self, edit_html, send_html, send_photo_or_text};

/// Pause between the status edits of /restart and /update
const STATUS_PAUSE: Duration = Duration::from_secs(2);

fn or_na<T: ToString>(value: Option<T>) -> String {
    value.map(|v| v.to_string()).unwrap_or_else(|| "N/A".to_string())
}

/// Everything /stats reports
#[derive(Debug, Clone, PartialEq)]
pub struct StatsReport {
    pub uptime_secs: u64,
    pub memory: Option<MemoryInfo>,
    pub bot_rss_mb: Option<u64>,
    pub disk: Option<DiskSpaceInfo>,
    pub cpu: Vec<Option<u8>>,
}

pub fn render_stats(report: &StatsReport) -> String {
    let (numbers, chart) = samples_to_chart(&report.cpu);
    let baseline = or_na(report.cpu.last().copied().flatten());
    let storage = match &report.disk {
        Some(d) => format!("{} / {} MB ({:.1}%)", d.used_mb(), d.total_mb(), d.used_percent()),
        None => "N/A".to_string(),
    };
    format!(
        "<b>📊 System Stats</b>\n\n\
         ⏱ <b>Uptime:</b> <code>{}</code>\n\
         💾 <b>RAM:</b> <code>{} MB / {} MB</code>\n\
         🧠 <b>Bot RAM:</b> <code>{} MB</code>\n\n\
         💽 <b>Storage:</b> <code>{}</code>\n\n\
         🔸 <b>CPU Baseline:</b> <code>{}%</code>\n\
         🔸 <b>CPU Samples:</b> <code>{}</code>\n\
         🔸 <b>Load Chart:</b> <code>{}</code>",
        format_uptime(report.uptime_secs),
        or_na(report.memory.as_ref().map(|m| m.used_mb)),
        or_na(report.memory.as_ref().map(|m| m.total_mb)),
        or_na(report.bot_rss_mb),
        storage,
        baseline,
        numbers,
        chart
    )
}

async fn stage(bot: &Bot, chat_id: ChatId, message_id: MessageId, text: &str) {
    if let Err(e) = edit_html(bot, chat_id, message_id, text, None).await {
        log::debug!("Status edit skipped: {}", e);
    }
}

pub async fn handle_stats(bot: &Bot, msg: &Message, deps: &HandlerDeps) -> HandlerResult {
    if !deps.require_admin(bot, msg).await? {
        return Ok(());
    }
    let chat_id = msg.chat.id;
    let status = send_html(bot, chat_id, "⏳ <b>Collecting system info…</b>", None).await?;

    let uptime = uptime_secs();
    let memory = memory_info().await;
    let bot_rss_mb = process_rss_mb().await;

    stage(bot, chat_id, status.id, "🔍 <b>Checking CPU samples…</b>").await;
    let cpu = sample_cpu().await;

    stage(bot, chat_id, status.id, "📦 <b>Checking storage…</b>").await;
    let disk = match get_disk_space(deps.storage.root()).await {
        Ok(info) => Some(info),
        Err(e) => {
            log::warn!("Disk space check failed: {}", e);
            None
        }
    };

    let report = StatsReport {
        uptime_secs: uptime,
        memory,
        bot_rss_mb,
        disk,
        cpu,
    };
    edit_html(bot, chat_id, status.id, render_stats(&report), None).await?;
    Ok(())
}

pub fn render_pong(elapsed: Duration, uptime_secs: u64, pinged_by: &str) -> String {
    format!(
        "🏓 <b>Pong!</b>\n\
         <b>Ping:</b> <code>{:.2} ms</code>\n\
         <b>Response Time:</b> <code>{:.2} s</code>\n\
         <b>Uptime:</b> <code>{}</code>\n\n\
         <b>Pinged by:</b> {}",
        elapsed.as_secs_f64() * 1000.0,
        elapsed.as_secs_f64(),
        format_uptime(uptime_secs),
        pinged_by
    )
}

pub async fn handle_ping(bot: &Bot, msg: &Message) -> HandlerResult {
    let started = Instant::now();
    let sent = send_html(bot, msg.chat.id, "🏓 <b>Pinging...</b>", None).await?;
    let elapsed = started.elapsed();

    let pinged_by = msg.from.as_ref().map(ui::mention).unwrap_or_default();
    edit_html(
        bot,
        msg.chat.id,
        sent.id,
        render_pong(elapsed, uptime_secs(), &pinged_by),
        None,
    )
    .await?;
    Ok(())
}

pub fn render_alive(uptime_secs: u64) -> String {
    format!("💡 <b>I'm alive!</b>\n\n<b>Uptime:</b> <code>{}</code>", format_uptime(uptime_secs))
}

pub async fn handle_alive(bot: &Bot, msg: &Message, deps: &HandlerDeps) -> HandlerResult {
    let settings = deps.storage.settings.load().await;
    let image = Some(settings.alive_image.as_str())
        .filter(|p| !p.is_empty())
        .map(|p| deps.storage.resolve(p));
    send_photo_or_text(bot, msg.chat.id, image.as_deref(), render_alive(uptime_secs()), None).await?;
    Ok(())
}

/// Stops the dispatcher; `main` re-executes the binary once it has shut down.
fn request_restart(deps: &HandlerDeps, reason: &str) {
    log::info!("♻️ Restart requested: {}", reason);
    deps.shutdown_timers();
    deps.restart.cancel();
}

pub async fn handle_restart(bot: &Bot, msg: &Message, deps: &HandlerDeps) -> HandlerResult {
    if !deps.require_owner(bot, msg).await? {
        return Ok(());
    }
    ui::delete_quietly(bot, msg.chat.id, msg.id).await;
    let status = send_html(bot, msg.chat.id, "♻️ <b>Restarting bot...</b>", None).await?;
    tokio::time::sleep(STATUS_PAUSE).await;
    stage(bot, msg.chat.id, status.id, "✅ <b>Bot is restarting, back in a moment.</b>").await;
    request_restart(deps, "/restart");
    Ok(())
}

pub fn render_pull(outcome: &PullOutcome) -> String {
    match outcome {
        PullOutcome::UpToDate => "✅ <b>Bot is already up to date!</b>".to_string(),
        PullOutcome::Updated(changes) => truncate_message(
            &format!("✅ <b>Updated from git!</b>\n\nChanges:\n<pre>{}</pre>", escape(changes)),
            4000,
        ),
        PullOutcome::Failed(stderr) => truncate_message(
            &format!("❌ <b>Failed to update:</b>\n<pre>{}</pre>", escape(stderr)),
            4000,
        ),
    }
}

pub async fn handle_update(bot: &Bot, msg: &Message, deps: &HandlerDeps) -> HandlerResult {
    if !deps.require_owner(bot, msg).await? {
        return Ok(());
    }
    ui::delete_quietly(bot, msg.chat.id, msg.id).await;
    let status = send_html(bot, msg.chat.id, "⏳ <b>Pulling latest update...</b>", None).await?;

    let outcome = match git_pull().await {
        Ok(outcome) => outcome,
        Err(e) => {
            log::error!("git pull failed: {}", e);
            let text = format!("❌ <b>Error updating:</b> {}", escape(&e.to_string()));
            edit_html(bot, msg.chat.id, status.id, text, None).await?;
            return Ok(());
        }
    };
    log::info!("git pull: {:?}", outcome);
    edit_html(bot, msg.chat.id, status.id, render_pull(&outcome), None).await?;

    if let PullOutcome::Updated(_) = outcome {
        tokio::time::sleep(STATUS_PAUSE).await;
        stage(bot, msg.chat.id, status.id, "♻️ <b>Restarting...</b>").await;
        request_restart(deps, "/update");
    }
    Ok(())
}
