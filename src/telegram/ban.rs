//! /ban and /unban

use teloxide::prelude::*;
use teloxide::utils::html::escape;

use crate::storage::{BanRecord, Timestamp};
use crate::telegram::bot::parse_user_id;
use crate::telegram::handlers::types::{HandlerDeps, HandlerResult};
use crate::telegram::keyboards;
use crate::telegram::ui::{self, send_html};

pub const BANNED_NOTICE: &str = "🚫 <b>You have been banned from using this bot!</b>\n\n\
    If you think this is a mistake, please contact the administrator.";

const INVALID_ID_TEXT: &str = "❌ Invalid user ID! Please provide a numeric user ID.";

/// Who a banned or unbanned id belongs to, for the confirmation text
#[derive(Debug, Clone, PartialEq)]
pub struct BanTarget {
    pub id: i64,
    pub first_name: Option<String>,
    pub username: Option<String>,
}

impl BanTarget {
    fn name(&self) -> &str {
        self.first_name.as_deref().filter(|n| !n.is_empty()).unwrap_or("Unknown User")
    }

    fn username(&self) -> &str {
        self.username.as_deref().unwrap_or("None")
    }
}

/// Why a ban was refused
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BanRefusal {
    SelfBan,
    Owner,
    Admin,
    AlreadyBanned,
}

impl BanRefusal {
    pub fn text(self) -> &'static str {
        match self {
            Self::SelfBan => "❌ You cannot ban yourself!",
            Self::Owner => "❌ You cannot ban the bot owner!",
            Self::Admin => "❌ You cannot ban an admin!",
            Self::AlreadyBanned => "❌ User is already banned!",
        }
    }
}

pub fn check_ban(
    caller: i64,
    target: i64,
    owner_id: i64,
    target_is_admin: bool,
    already_banned: bool,
) -> Result<(), BanRefusal> {
    if caller == target {
        return Err(BanRefusal::SelfBan);
    }
    if owner_id != 0 && target == owner_id {
        return Err(BanRefusal::Owner);
    }
    if target_is_admin {
        return Err(BanRefusal::Admin);
    }
    if already_banned {
        return Err(BanRefusal::AlreadyBanned);
    }
    Ok(())
}

pub fn render_banned(target: &BanTarget) -> String {
    format!(
        "✅ <b>User banned successfully!</b>\n\n\
         👤 <b>User:</b> {}\n\
         🆔 <b>ID:</b> <code>{}</code>\n\
         📛 <b>Username:</b> @{}",
        escape(target.name()),
        target.id,
        escape(target.username())
    )
}

pub fn render_unbanned(target: &BanTarget) -> String {
    format!(
        "✅ <b>User unbanned successfully!</b>\n\n\
         👤 <b>User:</b> {}\n\
         🆔 <b>ID:</b> <code>{}</code>\n\
         📛 <b>Username:</b> @{}",
        escape(target.name()),
        target.id,
        escape(target.username())
    )
}

/// Looks the user up in users.json, then through the Bot API.
async fn resolve_target(bot: &Bot, deps: &HandlerDeps, id: i64) -> BanTarget {
    if let Some(user) = deps.storage.users.load().await.find(id) {
        return BanTarget {
            id,
            first_name: user.first_name.clone(),
            username: user.username.clone(),
        };
    }
    match bot.get_chat(ChatId(id)).await {
        Ok(chat) => BanTarget {
            id,
            first_name: chat.first_name().map(str::to_string),
            username: chat.username().map(str::to_string),
        },
        Err(e) => {
            log::debug!("Could not resolve user {}: {}", id, e);
            BanTarget {
                id,
                first_name: None,
                username: None,
            }
        }
    }
}

pub async fn handle_ban(bot: &Bot, msg: &Message, deps: &HandlerDeps, args: &str) -> HandlerResult {
    if !deps.require_admin(bot, msg).await? {
        return Ok(());
    }
    if args.trim().is_empty() {
        send_html(
            bot,
            msg.chat.id,
            "❌ <b>Usage:</b> /ban &lt;user_id&gt;\n\n<b>Example:</b> <code>/ban 123456789</code>",
            Some(keyboards::close("ban_close")),
        )
        .await?;
        return Ok(());
    }
    let Some(target_id) = parse_user_id(args) else {
        send_html(bot, msg.chat.id, INVALID_ID_TEXT, None).await?;
        return Ok(());
    };

    let caller = ui::sender_id(msg);
    let admins = deps.storage.admins.load().await;
    let banned = deps.storage.banned.load().await;
    if let Err(refusal) = check_ban(
        caller,
        target_id,
        deps.owner_id,
        admins.is_admin(target_id),
        banned.is_banned(target_id),
    ) {
        send_html(bot, msg.chat.id, refusal.text(), None).await?;
        return Ok(());
    }

    let target = resolve_target(bot, deps, target_id).await;
    let record = BanRecord {
        id: target_id,
        username: target.username.clone(),
        first_name: target.first_name.clone(),
        banned_by: caller,
        banned_at: Timestamp::now(),
    };
    if !deps.storage.banned.update(|list| list.ban(record)).await? {
        send_html(bot, msg.chat.id, BanRefusal::AlreadyBanned.text(), None).await?;
        return Ok(());
    }
    log::info!("User {} banned by {}", target_id, caller);

    send_html(bot, msg.chat.id, render_banned(&target), Some(keyboards::close("ban_close"))).await?;
    Ok(())
}

pub async fn handle_unban(bot: &Bot, msg: &Message, deps: &HandlerDeps, args: &str) -> HandlerResult {
    if !deps.require_admin(bot, msg).await? {
        return Ok(());
    }
    if args.trim().is_empty() {
        send_html(
            bot,
            msg.chat.id,
            "❌ <b>Usage:</b> /unban &lt;user_id&gt;\n\n<b>Example:</b> <code>/unban 123456789</code>",
            Some(keyboards::close("ban_close")),
        )
        .await?;
        return Ok(());
    }
    let Some(target_id) = parse_user_id(args) else {
        send_html(bot, msg.chat.id, INVALID_ID_TEXT, None).await?;
        return Ok(());
    };

    let Some(record) = deps.storage.banned.update(|list| list.unban(target_id)).await? else {
        send_html(bot, msg.chat.id, "❌ User is not banned!", None).await?;
        return Ok(());
    };
    log::info!("User {} unbanned by {}", target_id, ui::sender_id(msg));

    let target = BanTarget {
        id: record.id,
        first_name: record.first_name,
        username: record.username,
    };
    send_html(bot, msg.chat.id, render_unbanned(&target), Some(keyboards::close("ban_close"))).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_check_ban_order() {
        assert_eq!(check_ban(1, 1, 1, true, true), Err(BanRefusal::SelfBan));
        assert_eq!(check_ban(2, 1, 1, true, true), Err(BanRefusal::Owner));
        assert_eq!(check_ban(2, 3, 1, true, false), Err(BanRefusal::Admin));
        assert_eq!(check_ban(2, 3, 1, false, true), Err(BanRefusal::AlreadyBanned));
        assert_eq!(check_ban(2, 3, 1, false, false), Ok(()));
        // no owner configured
        assert_eq!(check_ban(2, 0, 0, false, false), Ok(()));
    }

    #[test]
    fn test_render_banned_fallbacks() {
        let text = render_banned(&BanTarget {
            id: 5,
            first_name: None,
            username: None,
        });
        assert!(text.contains("👤 <b>User:</b> Unknown User"));
        assert!(text.contains("<code>5</code>"));
        assert!(text.contains("@None"));
    }

    #[test]
    fn test_render_unbanned_escapes() {
        let text = render_unbanned(&BanTarget {
            id: 5,
            first_name: Some("A&B".to_string()),
            username: Some("ab".to_string()),
        });
        assert!(text.contains("A&amp;B"));
        assert!(text.contains("@ab"));
    }
}
