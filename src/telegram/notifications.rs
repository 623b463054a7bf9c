use teloxide::prelude::*;
use teloxide::types::InlineKeyboardMarkup;

use crate::core::config;
use crate::telegram::ui::send_html;

/// Sends an HTML notice to the bot owner.
///
/// Does nothing when `OWNER_ID` is not configured. Returns `true` if the
/// message was delivered.
pub async fn notify_owner(bot: &Bot, text: &str, keyboard: Option<InlineKeyboardMarkup>) -> bool {
    let owner_id = *config::owner::OWNER_ID;
    if owner_id == 0 {
        log::warn!("OWNER_ID is not set. Owner notification dropped");
        return false;
    }
    notify_user(bot, owner_id, text, keyboard).await
}

/// Sends an HTML notice to a user who may have blocked the bot.
///
/// Returns `true` if the message was delivered.
pub async fn notify_user(bot: &Bot, user_id: i64, text: &str, keyboard: Option<InlineKeyboardMarkup>) -> bool {
    match send_html(bot, ChatId(user_id), text, keyboard).await {
        Ok(_) => {
            log::debug!("Notification delivered to {}", user_id);
            true
        }
        Err(e) => {
            log::warn!("Failed to notify user {}: {}", user_id, e);
            false
        }
    }
}
