//! Small Bot API helpers shared by every feature module.
//!
//! Everything is sent with HTML parse mode. Deleting or editing a message the
//! user already removed is routine here, so the `*_quietly` helpers only log.

use std::path::Path;

use teloxide::prelude::*;
use teloxide::types::{CallbackQuery, InlineKeyboardMarkup, InputFile, MessageId, ParseMode, User};

use crate::core::utils::mention_html;

/// Sent before slow replies and deleted once the real answer is ready
pub const LOADING_PLACEHOLDER: &str = "ㅤ";

/// Numeric id of a Telegram user, as stored in the JSON documents.
pub fn uid(user: &User) -> i64 {
    i64::try_from(user.id.0).unwrap_or(0)
}

/// Sender of a message; 0 for channel posts.
pub fn sender_id(msg: &Message) -> i64 {
    msg.from.as_ref().map(uid).unwrap_or(0)
}

pub fn user_id_of(id: i64) -> Option<UserId> {
    u64::try_from(id).ok().map(UserId)
}

/// First and last name of a user.
pub fn full_name(user: &User) -> String {
    match &user.last_name {
        Some(last) if !last.is_empty() => format!("{} {}", user.first_name, last),
        _ => user.first_name.clone(),
    }
}

pub fn mention(user: &User) -> String {
    mention_html(uid(user), &full_name(user))
}

/// Chat and message id of the message a callback button belongs to.
pub fn callback_origin(q: &CallbackQuery) -> Option<(ChatId, MessageId)> {
    q.message.as_ref().map(|m| (m.chat().id, m.id()))
}

pub async fn send_html(
    bot: &Bot,
    chat_id: ChatId,
    text: impl Into<String>,
    keyboard: Option<InlineKeyboardMarkup>,
) -> ResponseResult<Message> {
    let mut req = bot.send_message(chat_id, text).parse_mode(ParseMode::Html);
    if let Some(kb) = keyboard {
        req = req.reply_markup(kb);
    }
    req.await
}

pub async fn edit_html(
    bot: &Bot,
    chat_id: ChatId,
    message_id: MessageId,
    text: impl Into<String>,
    keyboard: Option<InlineKeyboardMarkup>,
) -> ResponseResult<()> {
    let mut req = bot
        .edit_message_text(chat_id, message_id, text)
        .parse_mode(ParseMode::Html);
    if let Some(kb) = keyboard {
        req = req.reply_markup(kb);
    }
    req.await?;
    Ok(())
}

/// Edit caption if present, else fallback to editing text.
pub async fn edit_caption_or_text(
    bot: &Bot,
    chat_id: ChatId,
    message_id: MessageId,
    text: String,
    keyboard: Option<InlineKeyboardMarkup>,
) -> ResponseResult<()> {
    let mut caption_req = bot
        .edit_message_caption(chat_id, message_id)
        .caption(text.clone())
        .parse_mode(ParseMode::Html);

    if let Some(ref kb) = keyboard {
        caption_req = caption_req.reply_markup(kb.clone());
    }

    match caption_req.await {
        Ok(_) => Ok(()),
        Err(_) => edit_html(bot, chat_id, message_id, text, keyboard).await,
    }
}

/// Sends `path` as a photo with `text` as caption when the file exists,
/// otherwise sends `text` alone.
pub async fn send_photo_or_text(
    bot: &Bot,
    chat_id: ChatId,
    photo: Option<&Path>,
    text: String,
    keyboard: Option<InlineKeyboardMarkup>,
) -> ResponseResult<Message> {
    if let Some(path) = photo.filter(|p| p.is_file()) {
        let mut req = bot
            .send_photo(chat_id, InputFile::file(path.to_path_buf()))
            .caption(text.clone())
            .parse_mode(ParseMode::Html);
        if let Some(ref kb) = keyboard {
            req = req.reply_markup(kb.clone());
        }
        match req.await {
            Ok(msg) => return Ok(msg),
            Err(e) => log::warn!("Failed to send photo {}: {}; falling back to text", path.display(), e),
        }
    }
    send_html(bot, chat_id, text, keyboard).await
}

pub async fn delete_quietly(bot: &Bot, chat_id: ChatId, message_id: MessageId) {
    if let Err(e) = bot.delete_message(chat_id, message_id).await {
        log::debug!("Could not delete message {} in {}: {}", message_id.0, chat_id, e);
    }
}

/// Answers a callback query, optionally as an alert. Failures are logged.
pub async fn answer(bot: &Bot, q: &CallbackQuery, text: Option<&str>, alert: bool) {
    let mut req = bot.answer_callback_query(q.id.clone());
    if let Some(text) = text {
        req = req.text(text).show_alert(alert);
    }
    if let Err(e) = req.await {
        log::debug!("Failed to answer callback {:?}: {}", q.id, e);
    }
}

/// Deletes the message a callback button is attached to.
pub async fn close_callback_message(bot: &Bot, q: &CallbackQuery) {
    answer(bot, q, None, false).await;
    if let Some((chat_id, message_id)) = callback_origin(q) {
        delete_quietly(bot, chat_id, message_id).await;
    }
}

/// Shows the invisible placeholder; pair with [`clear_loading`].
pub async fn show_loading(bot: &Bot, chat_id: ChatId) -> Option<MessageId> {
    match bot.send_message(chat_id, LOADING_PLACEHOLDER).await {
        Ok(msg) => Some(msg.id),
        Err(e) => {
            log::debug!("Failed to send loading placeholder to {}: {}", chat_id, e);
            None
        }
    }
}

pub async fn clear_loading(bot: &Bot, chat_id: ChatId, placeholder: Option<MessageId>) {
    if let Some(message_id) = placeholder {
        delete_quietly(bot, chat_id, message_id).await;
    }
}
