//! /users

use chrono::Utc;
use teloxide::prelude::*;
use teloxide::types::CallbackQuery;

use crate::core::utils::percent;
use crate::telegram::handlers::types::{HandlerDeps, HandlerResult, NOT_AUTHORIZED_TEXT};
use crate::telegram::keyboards;
use crate::telegram::ui::{self, edit_html, send_html};

pub fn render_users(total: usize, recent: usize) -> String {
    format!(
        "📊 <b>Users Statistics</b>\n\n\
         👥 <b>Total Users:</b> <code>{}</code>\n\
         🆕 <b>Recent Users (7 days):</b> <code>{}</code>\n\
         📈 <b>Growth Rate:</b> <code>{:.1}%</code>\n\n\
         <i>Users are automatically added when they interact with the bot.</i>",
        total,
        recent,
        percent(recent, total)
    )
}

async fn current_text(deps: &HandlerDeps) -> String {
    let (total, recent) = deps.storage.users.load().await.stats(Utc::now());
    render_users(total, recent)
}

pub async fn handle_users(bot: &Bot, msg: &Message, deps: &HandlerDeps) -> HandlerResult {
    if !deps.require_admin(bot, msg).await? {
        return Ok(());
    }
    let text = current_text(deps).await;
    send_html(
        bot,
        msg.chat.id,
        text,
        Some(keyboards::refresh_close("users_refresh", "users_close")),
    )
    .await?;
    Ok(())
}

pub async fn on_refresh(bot: &Bot, q: &CallbackQuery, deps: &HandlerDeps) -> HandlerResult {
    if !deps.is_authorized(ui::uid(&q.from)).await {
        ui::answer(bot, q, Some(NOT_AUTHORIZED_TEXT), true).await;
        return Ok(());
    }
    ui::answer(bot, q, Some("Refreshed"), false).await;
    if let Some((chat_id, message_id)) = ui::callback_origin(q) {
        let text = current_text(deps).await;
        // "message is not modified" when nothing changed
        if let Err(e) = edit_html(
            bot,
            chat_id,
            message_id,
            text,
            Some(keyboards::refresh_close("users_refresh", "users_close")),
        )
        .await
        {
            log::debug!("Users stats not refreshed: {}", e);
        }
    }
    Ok(())
}
