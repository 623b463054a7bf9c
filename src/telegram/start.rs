//! /start, deep-link delivery with auto-delete, /help and the start screen buttons.

use teloxide::prelude::*;
use teloxide::types::{CallbackQuery, MessageId, User};

use crate::core::config;
use crate::core::deeplink::decode_token;
use crate::core::utils::render_mention_template;
use crate::scheduler::spawn_delayed;
use crate::storage::settings::auto_delete_label;
use crate::storage::{LinkRecord, LinkTarget, Settings};
use crate::telegram::force_sub;
use crate::telegram::handlers::types::{HandlerDeps, HandlerResult};
use crate::telegram::keyboards;
use crate::telegram::ui::{self, edit_caption_or_text, edit_html, send_html, send_photo_or_text};

pub const INVALID_LINK_TEXT: &str = "❌ Invalid link!";
pub const LINK_NOT_FOUND_TEXT: &str = "❌ Link expired or not found!";
pub const RETRIEVE_ERROR_TEXT: &str = "❌ Error retrieving file. It may have been deleted.";

const NOT_SENPAI_TEXT: &str = "You are not my senpai!";

pub fn render_warning(minutes: u64) -> String {
    format!(
        "⚠️ <b>IMPORTANT:</b>\n\n\
         <blockquote>This file will be deleted in <b>{}</b>. \
         Please save or forward it to your saved messages before it gets removed.</blockquote>",
        auto_delete_label(minutes)
    )
}

pub const DELETED_TEXT: &str = "✅ <b>Your file/video has been successfully deleted!</b>\n\n\
    <blockquote>If you want to retrieve it again, click the \"♻️ Click here\" button. \
    If not, simply close this message.</blockquote>";

pub fn render_start_text(settings: &Settings, user: Option<&User>) -> String {
    let mention = user.map(ui::mention).unwrap_or_default();
    render_mention_template(&settings.start_text, &mention)
}

fn render_about(bot_username: &str) -> String {
    format!(
        "<b>Bot name:</b> File Store Bot\n\
         <b>Username:</b> @{}\n\
         <b>Language:</b> Rust\n\
         <b>Database:</b> JSON files\n\
         <b>Owner:</b> <a href=\"{}\">contact</a>",
        bot_username,
        config::owner::OWNER_URL.as_str()
    )
}

fn image_path(deps: &HandlerDeps, stored: &str) -> Option<std::path::PathBuf> {
    Some(stored).filter(|s| !s.is_empty()).map(|s| deps.storage.resolve(s))
}

pub async fn handle_start(bot: &Bot, msg: &Message, deps: &HandlerDeps, payload: &str) -> HandlerResult {
    let payload = payload.trim();
    if payload.is_empty() {
        return send_start_screen(bot, msg, deps).await;
    }
    open_link(bot, msg.chat.id, ui::sender_id(msg), payload, deps).await
}

async fn send_start_screen(bot: &Bot, msg: &Message, deps: &HandlerDeps) -> HandlerResult {
    let placeholder = ui::show_loading(bot, msg.chat.id).await;
    let settings = deps.storage.settings.load().await;
    let text = render_start_text(&settings, msg.from.as_ref());
    let image = image_path(deps, &settings.start_image);

    let sent = send_photo_or_text(bot, msg.chat.id, image.as_deref(), text, Some(keyboards::start())).await;
    ui::clear_loading(bot, msg.chat.id, placeholder).await;
    sent?;
    Ok(())
}

/// Resolves a start token and delivers what it points at, behind the force-subscribe gate.
pub async fn open_link(bot: &Bot, chat_id: ChatId, user_id: i64, token: &str, deps: &HandlerDeps) -> HandlerResult {
    if decode_token(token).is_none() {
        send_html(bot, chat_id, INVALID_LINK_TEXT, None).await?;
        return Ok(());
    }
    let Some(record) = deps.storage.links.load().await.get(token).cloned() else {
        log::info!("User {} opened unknown link {}", user_id, token);
        send_html(bot, chat_id, LINK_NOT_FOUND_TEXT, None).await?;
        return Ok(());
    };

    if !force_sub::pass_gate(bot, chat_id, user_id, token, deps).await? {
        return Ok(());
    }
    deliver(bot, chat_id, token, &record, deps).await
}

async fn copy_one(bot: &Bot, to: ChatId, from: i64, message_id: i32, protect: bool) -> Option<MessageId> {
    match bot
        .copy_message(to, ChatId(from), MessageId(message_id))
        .protect_content(protect)
        .await
    {
        Ok(id) => Some(id),
        Err(e) => {
            log::debug!("Could not copy message {} from {}: {}", message_id, from, e);
            None
        }
    }
}

/// Message ids a batch delivers, at most `batch::MAX_MESSAGES` from the first one.
pub fn batch_ids(first: i32, last: i32) -> std::ops::RangeInclusive<i32> {
    let capped = first.saturating_add(config::batch::MAX_MESSAGES - 1);
    first..=last.min(capped)
}

/// Copies the stored message (or every message of a range) into `to`.
async fn copy_target(bot: &Bot, to: ChatId, target: &LinkTarget, protect: bool) -> Vec<MessageId> {
    match target {
        LinkTarget::Single { chat_id, message_id } => {
            copy_one(bot, to, *chat_id, *message_id, protect).await.into_iter().collect()
        }
        LinkTarget::Batch {
            chat_id,
            first_message_id,
            last_message_id,
            ..
        } => {
            let mut copied = Vec::new();
            for message_id in batch_ids(*first_message_id, *last_message_id) {
                if let Some(id) = copy_one(bot, to, *chat_id, message_id, protect).await {
                    copied.push(id);
                }
            }
            copied
        }
    }
}

async fn deliver(bot: &Bot, chat_id: ChatId, token: &str, record: &LinkRecord, deps: &HandlerDeps) -> HandlerResult {
    let settings = deps.storage.settings.load().await;
    let delivered = copy_target(bot, chat_id, &record.target, settings.protect_content).await;
    let Some(first) = delivered.first().copied() else {
        send_html(bot, chat_id, RETRIEVE_ERROR_TEXT, None).await?;
        return Ok(());
    };
    log::info!("Delivered {} message(s) of link {} to {}", delivered.len(), token, chat_id);

    let minutes = settings.auto_delete_time;
    if minutes == 0 {
        return Ok(());
    }

    let url = deps.start_link(token);
    let warning = send_html(
        bot,
        chat_id,
        render_warning(minutes),
        Some(keyboards::delivery_warning(&url, first.0)),
    )
    .await?;

    let bot = bot.clone();
    let warning_id = warning.id;
    spawn_delayed(
        deps.dialog_timers.detached_token(),
        config::auto_delete::delay(minutes),
        async move {
            for id in delivered {
                ui::delete_quietly(&bot, chat_id, id).await;
            }
            if let Err(e) = edit_html(
                &bot,
                chat_id,
                warning_id,
                DELETED_TEXT,
                Some(keyboards::delivery_warning(&url, warning_id.0)),
            )
            .await
            {
                log::debug!("Could not update auto-delete notice in {}: {}", chat_id, e);
            }
        },
    );
    Ok(())
}

pub async fn handle_help(bot: &Bot, msg: &Message, deps: &HandlerDeps) -> HandlerResult {
    if !deps.require_admin(bot, msg).await? {
        return Ok(());
    }
    let placeholder = ui::show_loading(bot, msg.chat.id).await;
    let settings = deps.storage.settings.load().await;
    let image = image_path(deps, &settings.help_image);
    let sent = send_photo_or_text(
        bot,
        msg.chat.id,
        image.as_deref(),
        settings.help_text.clone(),
        Some(keyboards::start_sub_page()),
    )
    .await;
    ui::clear_loading(bot, msg.chat.id, placeholder).await;
    sent?;
    Ok(())
}

/// `start_about`, `start_help`, `start_back`, `start_close`.
pub async fn on_start_callback(bot: &Bot, q: &CallbackQuery, deps: &HandlerDeps, data: &str) -> HandlerResult {
    let Some((chat_id, message_id)) = ui::callback_origin(q) else {
        ui::answer(bot, q, None, false).await;
        return Ok(());
    };

    match data {
        "start_about" => {
            ui::answer(bot, q, None, false).await;
            edit_caption_or_text(
                bot,
                chat_id,
                message_id,
                render_about(&deps.bot_username),
                Some(keyboards::start_sub_page()),
            )
            .await?;
        }
        "start_help" => {
            if !deps.is_authorized(ui::uid(&q.from)).await {
                ui::answer(bot, q, Some(NOT_SENPAI_TEXT), true).await;
                return Ok(());
            }
            ui::answer(bot, q, None, false).await;
            let settings = deps.storage.settings.load().await;
            edit_caption_or_text(
                bot,
                chat_id,
                message_id,
                settings.help_text,
                Some(keyboards::start_sub_page()),
            )
            .await?;
        }
        "start_back" => {
            ui::answer(bot, q, None, false).await;
            let settings = deps.storage.settings.load().await;
            let text = render_start_text(&settings, Some(&q.from));
            edit_caption_or_text(bot, chat_id, message_id, text, Some(keyboards::start())).await?;
        }
        _ => ui::close_callback_message(bot, q).await,
    }
    Ok(())
}

/// `link_close:<id>`: removes a delivered file and the notice under it.
pub async fn on_link_close(bot: &Bot, q: &CallbackQuery, data: &str) -> HandlerResult {
    ui::answer(bot, q, None, false).await;
    let Some((chat_id, message_id)) = ui::callback_origin(q) else {
        return Ok(());
    };
    if let Some(target) = keyboards::parse_link_close(data).filter(|id| *id != message_id.0) {
        ui::delete_quietly(bot, chat_id, MessageId(target)).await;
    }
    ui::delete_quietly(bot, chat_id, message_id).await;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn user(id: u64, first: &str) -> User {
        serde_json::from_value(serde_json::json!({
            "id": id,
            "is_bot": false,
            "first_name": first,
        }))
        .unwrap()
    }

    #[test]
    fn test_render_start_text_mentions_user() {
        let settings = Settings::default();
        assert_eq!(
            render_start_text(&settings, Some(&user(9, "Neo"))),
            "Hi <a href=\"tg://user?id=9\">Neo</a> welcome to File Store Bot"
        );
    }

    #[test]
    fn test_render_warning_uses_minutes() {
        let text = render_warning(30);
        assert!(text.contains("deleted in <b>30 minutes</b>"));
    }

    #[test]
    fn test_batch_ids_capped() {
        assert_eq!(batch_ids(5, 9), 5..=9);
        assert_eq!(batch_ids(7, 7), 7..=7);
        let max = config::batch::MAX_MESSAGES;
        assert_eq!(batch_ids(1, 1_000_000), 1..=max);
        assert_eq!(batch_ids(1, 1_000_000).count(), max as usize);
        assert_eq!(batch_ids(i32::MAX - 1, i32::MAX), (i32::MAX - 1)..=i32::MAX);
    }

    #[test]
    fn test_about_names_the_bot() {
        assert!(render_about("filebot").contains("@filebot"));
    }
}
