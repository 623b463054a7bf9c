//! /genlink and the two-step /batchlink dialog.

use teloxide::prelude::*;
use teloxide::types::{CallbackQuery, MessageOrigin, Recipient};
use teloxide::utils::html::escape;

use crate::core::config;
use crate::core::deeplink::{parse_message_link, LinkPayload, MessageLink};
use crate::storage::{LinkRecord, LinkTarget};
use crate::telegram::conversation::Pending;
use crate::telegram::handlers::types::{HandlerDeps, HandlerResult};
use crate::telegram::keyboards;
use crate::telegram::start::LINK_NOT_FOUND_TEXT;
use crate::telegram::ui::{self, send_html};

const FIRST_PROMPT: &str = "📌 Please forward the first message from your batch channel (with forward tag)\n\
    or share the link of the first message from your batch channel.";

const EXTRACT_FAILED_TEXT: &str = "❌ Could not extract message information. \
    Please forward a message from a channel or send a channel message link.";

const BOT_NOT_ADMIN_TEXT: &str = "❌ Bot is not admin in this channel! Please make bot admin first.";

/// A channel post named by a forward or a `t.me` link
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelPost {
    pub chat_id: i64,
    pub message_id: i32,
    pub title: Option<String>,
}

/// Why a last post cannot close the range
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RangeError {
    DifferentChannel,
    Reversed,
    TooLarge,
}

impl RangeError {
    pub fn text(self) -> String {
        match self {
            Self::DifferentChannel => "❌ First and last messages must be from the same channel!".to_string(),
            Self::Reversed => "❌ Last message ID should be greater than first message ID!".to_string(),
            Self::TooLarge => format!(
                "❌ A batch can hold at most {} messages! Please pick a closer last message.",
                config::batch::MAX_MESSAGES
            ),
        }
    }
}

pub fn check_range(first_chat: i64, first_id: i32, last: &ChannelPost) -> Result<(), RangeError> {
    if last.chat_id != first_chat {
        return Err(RangeError::DifferentChannel);
    }
    if last.message_id < first_id {
        return Err(RangeError::Reversed);
    }
    if i64::from(last.message_id) - i64::from(first_id) >= i64::from(config::batch::MAX_MESSAGES) {
        return Err(RangeError::TooLarge);
    }
    Ok(())
}

pub fn render_last_prompt(title: &str) -> String {
    format!(
        "📌 Great! Now forward the last message from <b>{}</b> (with forward tag)\n\
         or share the link of the last message from your batch channel.",
        escape(title)
    )
}

pub fn render_batch_success(title: &str, first: i32, last: i32, link: &str) -> String {
    format!(
        "✅ <b>Batch Link Generated Successfully!</b>\n\n\
         📢 <b>Channel:</b> {}\n\
         📊 <b>Total Messages:</b> {}\n\
         🔢 <b>Range:</b> {} - {}\n\n\
         🔗 <b>Batch Link:</b>\n<code>{}</code>",
        escape(title),
        last - first + 1,
        first,
        last,
        link
    )
}

/// Channel post of a forwarded message.
pub fn post_from_forward(msg: &Message) -> Option<ChannelPost> {
    match msg.forward_origin()? {
        MessageOrigin::Channel { chat, message_id, .. } => Some(ChannelPost {
            chat_id: chat.id.0,
            message_id: message_id.0,
            title: chat.title().map(str::to_string),
        }),
        _ => None,
    }
}

/// Forward first, then a message link in the text; public links are resolved through `@username`.
async fn resolve_post(bot: &Bot, msg: &Message) -> Option<ChannelPost> {
    if let Some(post) = post_from_forward(msg) {
        return Some(post);
    }
    match parse_message_link(msg.text()?)? {
        MessageLink::Private { chat_id, message_id } => {
            let title = match bot.get_chat(ChatId(chat_id)).await {
                Ok(chat) => chat.title().map(str::to_string),
                Err(e) => {
                    log::debug!("get_chat({}) failed: {}", chat_id, e);
                    None
                }
            };
            Some(ChannelPost {
                chat_id,
                message_id,
                title,
            })
        }
        MessageLink::Public { username, message_id } => {
            let recipient = Recipient::ChannelUsername(format!("@{}", username));
            match bot.get_chat(recipient).await {
                Ok(chat) => Some(ChannelPost {
                    chat_id: chat.id.0,
                    message_id,
                    title: chat.title().map(str::to_string),
                }),
                Err(e) => {
                    log::debug!("Cannot resolve @{}: {}", username, e);
                    None
                }
            }
        }
    }
}

async fn bot_is_admin(bot: &Bot, chat_id: i64, deps: &HandlerDeps) -> bool {
    match bot.get_chat_member(ChatId(chat_id), deps.bot_id).await {
        Ok(member) => member.is_administrator() || member.is_owner(),
        Err(e) => {
            log::debug!("Bot membership lookup in {} failed: {}", chat_id, e);
            false
        }
    }
}

pub async fn handle_genlink(bot: &Bot, msg: &Message, deps: &HandlerDeps) -> HandlerResult {
    if !deps.require_admin(bot, msg).await? {
        return Ok(());
    }
    let Some(reply) = msg.reply_to_message() else {
        send_html(bot, msg.chat.id, "Please reply to a message to generate a link.", None).await?;
        return Ok(());
    };

    let target = LinkTarget::Single {
        chat_id: msg.chat.id.0,
        message_id: reply.id.0,
    };
    let token = target.payload().token();
    let record = LinkRecord::new(target, ui::sender_id(msg));
    deps.storage
        .links
        .update(|links| links.insert(token.clone(), record))
        .await?;

    let link = deps.start_link(&token);
    log::info!("Link {} generated by {}", token, ui::sender_id(msg));
    send_html(
        bot,
        msg.chat.id,
        format!("✅ Link generated successfully!\n\n{}", link),
        Some(keyboards::copy_link(&link)),
    )
    .await?;
    Ok(())
}

pub async fn handle_batchlink(bot: &Bot, msg: &Message, deps: &HandlerDeps) -> HandlerResult {
    if !deps.require_admin(bot, msg).await? {
        return Ok(());
    }
    deps.conversations.set(ui::sender_id(msg), Pending::BatchFirst);
    send_html(bot, msg.chat.id, FIRST_PROMPT, None).await?;
    Ok(())
}

/// Input for the `/batchlink` dialog. Bad input keeps the dialog open.
pub async fn on_batch_input(bot: &Bot, msg: &Message, deps: &HandlerDeps, pending: Pending) -> HandlerResult {
    let user_id = ui::sender_id(msg);
    let Some(post) = resolve_post(bot, msg).await else {
        send_html(bot, msg.chat.id, EXTRACT_FAILED_TEXT, None).await?;
        return Ok(());
    };

    match pending {
        Pending::BatchFirst => {
            if !bot_is_admin(bot, post.chat_id, deps).await {
                send_html(bot, msg.chat.id, BOT_NOT_ADMIN_TEXT, None).await?;
                return Ok(());
            }
            let title = post.title.unwrap_or_else(|| post.chat_id.to_string());
            send_html(bot, msg.chat.id, render_last_prompt(&title), None).await?;
            deps.conversations.set(
                user_id,
                Pending::BatchLast {
                    chat_id: post.chat_id,
                    first_message_id: post.message_id,
                    title,
                },
            );
        }
        Pending::BatchLast {
            chat_id,
            first_message_id,
            title,
        } => {
            if let Err(e) = check_range(chat_id, first_message_id, &post) {
                send_html(bot, msg.chat.id, e.text(), None).await?;
                return Ok(());
            }
            deps.conversations.take(user_id);

            let target = LinkTarget::batch(chat_id, first_message_id, post.message_id, Some(title.clone()));
            let token = target.payload().token();
            let record = LinkRecord::new(target, user_id);
            deps.storage
                .links
                .update(|links| links.insert(token.clone(), record))
                .await?;

            let link = deps.start_link(&token);
            log::info!(
                "Batch link {} ({}..={} in {}) generated by {}",
                token,
                first_message_id,
                post.message_id,
                chat_id,
                user_id
            );
            send_html(
                bot,
                msg.chat.id,
                render_batch_success(&title, first_message_id, post.message_id, &link),
                Some(keyboards::batch_link(&link, &token)),
            )
            .await?;
        }
        other => log::warn!("Batch input routed with unrelated state {:?}", other),
    }
    Ok(())
}

/// `copy_batch_<token>`: repeats the link as copyable text.
pub async fn on_copy_batch(bot: &Bot, q: &CallbackQuery, deps: &HandlerDeps, data: &str) -> HandlerResult {
    let Some(token) = keyboards::parse_copy_batch(data) else {
        ui::answer(bot, q, None, false).await;
        return Ok(());
    };
    let is_batch = matches!(
        deps.storage.links.load().await.get(token).map(|r| r.target.payload()),
        Some(LinkPayload::Batch { .. })
    );
    if !is_batch {
        ui::answer(bot, q, Some(LINK_NOT_FOUND_TEXT), true).await;
        return Ok(());
    }

    ui::answer(bot, q, Some("Batch link copied to clipboard!"), true).await;
    if let Some((chat_id, _)) = ui::callback_origin(q) {
        send_html(
            bot,
            chat_id,
            format!("🔗 <b>Batch Link:</b>\n<code>{}</code>", deps.start_link(token)),
            None,
        )
        .await?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn post(chat_id: i64, message_id: i32) -> ChannelPost {
        ChannelPost {
            chat_id,
            message_id,
            title: None,
        }
    }

    #[test]
    fn test_check_range() {
        assert_eq!(check_range(-100, 10, &post(-100, 20)), Ok(()));
        assert_eq!(check_range(-100, 10, &post(-100, 10)), Ok(()));
        assert_eq!(check_range(-100, 10, &post(-100, 9)), Err(RangeError::Reversed));
        assert_eq!(check_range(-100, 10, &post(-200, 20)), Err(RangeError::DifferentChannel));
    }

    #[test]
    fn test_check_range_limits_size() {
        let max = config::batch::MAX_MESSAGES;
        assert_eq!(check_range(-100, 1, &post(-100, max)), Ok(()));
        assert_eq!(check_range(-100, 1, &post(-100, max + 1)), Err(RangeError::TooLarge));
        assert_eq!(check_range(-100, 1, &post(-100, 1_000_000)), Err(RangeError::TooLarge));
        assert!(RangeError::TooLarge.text().contains(&max.to_string()));
    }

    #[test]
    fn test_render_batch_success() {
        let text = render_batch_success("Anime <HD>", 10, 14, "https://t.me/filebot?start=xyz");
        assert!(text.contains("<b>Channel:</b> Anime &lt;HD&gt;"));
        assert!(text.contains("<b>Total Messages:</b> 5"));
        assert!(text.contains("<b>Range:</b> 10 - 14"));
        assert!(text.contains("<code>https://t.me/filebot?start=xyz</code>"));
    }

    #[test]
    fn test_post_from_forwarded_channel_message() {
        let msg: Message = serde_json::from_value(serde_json::json!({
            "message_id": 1,
            "date": 1_700_000_000,
            "chat": {"id": 5, "type": "private", "first_name": "Admin"},
            "from": {"id": 5, "is_bot": false, "first_name": "Admin"},
            "forward_origin": {
                "type": "channel",
                "date": 1_700_000_000,
                "chat": {"id": -1001234, "type": "channel", "title": "Vault"},
                "message_id": 77
            },
            "text": "episode 1"
        }))
        .unwrap();

        assert_eq!(
            post_from_forward(&msg),
            Some(ChannelPost {
                chat_id: -1001234,
                message_id: 77,
                title: Some("Vault".to_string()),
            })
        );
    }
}
