//! Force-subscribe: /fsub channel management and the membership gate in
//! front of file delivery.

use teloxide::prelude::*;
use teloxide::types::{CallbackQuery, MessageOrigin};
use teloxide::utils::html::escape;

use crate::storage::ForceSubChannel;
use crate::telegram::conversation::Pending;
use crate::telegram::handlers::types::{HandlerDeps, HandlerError, HandlerResult, NOT_AUTHORIZED_TEXT};
use crate::telegram::keyboards;
use crate::telegram::start;
use crate::telegram::ui::{self, edit_html, send_html, send_photo_or_text};

const ADD_PROMPT: &str = "📢 <b>Add Force Subscribe Channel</b>\n\n\
    Forward any message from the channel you want to add (with the forward tag).\n\n\
    ⚠️ The bot must be an admin in that channel.";

pub fn render_channel_list(channels: &[ForceSubChannel]) -> String {
    let mut text = String::from("📢 <b>Force Subscribe Channels</b>\n\n");
    if channels.is_empty() {
        text.push_str("No channels added yet.");
        return text;
    }
    for channel in channels {
        text.push_str(&format!(
            "• {} (ID: <code>{}</code>)\n",
            escape(&channel.title),
            channel.id
        ));
    }
    text.push_str(&format!("\n<b>Total:</b> {}", channels.len()));
    text
}

pub fn render_join_text(missing: &[ForceSubChannel]) -> String {
    let list = missing
        .iter()
        .map(|c| format!("• {}", escape(&c.title)))
        .collect::<Vec<_>>()
        .join("\n");
    format!(
        "🔒 <b>Join Required Channels</b>\n\n\
         You must join the following channel(s) to access the files:\n\n\
         {}\n\n\
         After joining, click the \"🔄 Try Again\" button.",
        list
    )
}

/// A user counts as subscribed unless they left, were kicked, or the lookup failed.
async fn is_member(bot: &Bot, channel_id: i64, user_id: UserId) -> bool {
    match bot.get_chat_member(ChatId(channel_id), user_id).await {
        Ok(member) => !(member.is_left() || member.is_banned()),
        Err(e) => {
            log::warn!("Membership check for {} in {} failed: {}", user_id, channel_id, e);
            false
        }
    }
}

/// Channels from the list the user has not joined.
pub async fn missing_channels(bot: &Bot, user_id: i64, channels: &[ForceSubChannel]) -> Vec<ForceSubChannel> {
    let Some(user) = ui::user_id_of(user_id) else {
        return channels.to_vec();
    };
    let mut missing = Vec::new();
    for channel in channels {
        if !is_member(bot, channel.id, user).await {
            missing.push(channel.clone());
        }
    }
    missing
}

pub async fn send_join_message(
    bot: &Bot,
    chat_id: ChatId,
    missing: &[ForceSubChannel],
    deps: &HandlerDeps,
) -> ResponseResult<Message> {
    let settings = deps.storage.settings.load().await;
    let image = Some(settings.force_sub_image.as_str())
        .filter(|p| !p.is_empty())
        .map(|p| deps.storage.resolve(p));
    send_photo_or_text(
        bot,
        chat_id,
        image.as_deref(),
        render_join_text(missing),
        Some(keyboards::force_sub_join(missing)),
    )
    .await
}

/// Checks the user against every force-subscribe channel.
///
/// When something is missing the start token is held for "Try Again", the
/// join message is sent and `false` is returned.
pub async fn pass_gate(
    bot: &Bot,
    chat_id: ChatId,
    user_id: i64,
    token: &str,
    deps: &HandlerDeps,
) -> Result<bool, HandlerError> {
    let channels = deps.storage.force_sub.load().await;
    if channels.is_empty() {
        return Ok(true);
    }
    let missing = missing_channels(bot, user_id, channels.list()).await;
    if missing.is_empty() {
        return Ok(true);
    }
    log::info!("User {} must join {} channel(s) first", user_id, missing.len());
    deps.conversations.hold_link(user_id, token.to_string());
    send_join_message(bot, chat_id, &missing, deps).await?;
    Ok(false)
}

pub async fn handle_fsub(bot: &Bot, msg: &Message, deps: &HandlerDeps) -> HandlerResult {
    if !deps.require_admin(bot, msg).await? {
        return Ok(());
    }
    let channels = deps.storage.force_sub.load().await;
    send_html(
        bot,
        msg.chat.id,
        render_channel_list(channels.list()),
        Some(keyboards::force_sub_admin(channels.list())),
    )
    .await?;
    Ok(())
}

async fn show_list(bot: &Bot, q: &CallbackQuery, deps: &HandlerDeps) -> HandlerResult {
    let Some((chat_id, message_id)) = ui::callback_origin(q) else {
        return Ok(());
    };
    let channels = deps.storage.force_sub.load().await;
    edit_html(
        bot,
        chat_id,
        message_id,
        render_channel_list(channels.list()),
        Some(keyboards::force_sub_admin(channels.list())),
    )
    .await?;
    Ok(())
}

/// `fsub_*` buttons of the admin list.
pub async fn on_admin_callback(bot: &Bot, q: &CallbackQuery, deps: &HandlerDeps, data: &str) -> HandlerResult {
    let user_id = ui::uid(&q.from);
    if !deps.is_authorized(user_id).await {
        ui::answer(bot, q, Some(NOT_AUTHORIZED_TEXT), true).await;
        return Ok(());
    }

    match data {
        "fsub_add_channel" => {
            ui::answer(bot, q, None, false).await;
            deps.conversations.set(user_id, Pending::ForceSubChannel);
            if let Some((chat_id, message_id)) = ui::callback_origin(q) {
                edit_html(
                    bot,
                    chat_id,
                    message_id,
                    ADD_PROMPT,
                    Some(keyboards::back_close("fsub_back", "fsub_close")),
                )
                .await?;
            }
        }
        "fsub_back" => {
            ui::answer(bot, q, None, false).await;
            deps.conversations.take_if(user_id, |p| *p == Pending::ForceSubChannel);
            show_list(bot, q, deps).await?;
        }
        "fsub_close" => {
            deps.conversations.take_if(user_id, |p| *p == Pending::ForceSubChannel);
            ui::close_callback_message(bot, q).await;
        }
        other => {
            let Some(channel_id) = keyboards::parse_fsub_delete(other) else {
                ui::answer(bot, q, None, false).await;
                return Ok(());
            };
            match deps.storage.force_sub.update(|list| list.remove(channel_id)).await? {
                Some(removed) => {
                    log::info!("Force-sub channel {} removed by {}", channel_id, user_id);
                    let text = format!("✅ {} removed from force subscribe!", removed.title);
                    ui::answer(bot, q, Some(&text), false).await;
                }
                None => ui::answer(bot, q, Some("Channel not found"), false).await,
            }
            show_list(bot, q, deps).await?;
        }
    }
    Ok(())
}

/// Next message after "Add Channel": must be forwarded from the channel.
pub async fn on_channel_forward(bot: &Bot, msg: &Message, deps: &HandlerDeps) -> HandlerResult {
    let user_id = ui::sender_id(msg);
    let Some(MessageOrigin::Channel { chat, .. }) = msg.forward_origin() else {
        send_html(bot, msg.chat.id, "⚠️ This message is not forwarded from a channel!", None).await?;
        return Ok(());
    };
    let channel_id = chat.id;
    // the waiting state ends here whatever the outcome
    deps.conversations.take_if(user_id, |p| *p == Pending::ForceSubChannel);

    match bot.get_chat_member(channel_id, deps.bot_id).await {
        Ok(member) if member.is_administrator() || member.is_owner() => {}
        Ok(_) => {
            send_html(
                bot,
                msg.chat.id,
                "❌ Bot is not admin in this channel! Please make the bot admin first.",
                None,
            )
            .await?;
            return Ok(());
        }
        Err(e) => {
            log::warn!("Cannot check bot status in {}: {}", channel_id, e);
            send_html(bot, msg.chat.id, "❌ Cannot verify bot admin status in this channel!", None).await?;
            return Ok(());
        }
    }

    if deps.storage.force_sub.load().await.contains(channel_id.0) {
        send_html(bot, msg.chat.id, "❌ This channel is already in force subscribe list!", None).await?;
        return Ok(());
    }

    let full = bot.get_chat(channel_id).await.ok();
    let title = full
        .as_ref()
        .and_then(|c| c.title().map(str::to_string))
        .or_else(|| chat.title().map(str::to_string))
        .unwrap_or_else(|| channel_id.to_string());
    let username = full
        .as_ref()
        .and_then(|c| c.username().map(str::to_string))
        .or_else(|| chat.username().map(str::to_string));
    let mut invite_link = full.as_ref().and_then(|c| c.invite_link().map(str::to_string));
    if invite_link.is_none() {
        match bot.create_chat_invite_link(channel_id).await {
            Ok(link) => invite_link = Some(link.invite_link),
            Err(e) => log::warn!("Could not create invite link for {}: {}", channel_id, e),
        }
    }

    let channel = ForceSubChannel {
        id: channel_id.0,
        title: title.clone(),
        username,
        invite_link,
        mode: Some("direct".to_string()),
        added_by: Some(user_id),
    };
    if !deps.storage.force_sub.update(|list| list.add(channel)).await? {
        send_html(bot, msg.chat.id, "❌ This channel is already in force subscribe list!", None).await?;
        return Ok(());
    }
    log::info!("Force-sub channel {} ({}) added by {}", channel_id, title, user_id);

    send_html(
        bot,
        msg.chat.id,
        format!(
            "✅ Successfully added <b>{}</b> as force subscribe channel!",
            escape(&title)
        ),
        Some(keyboards::force_sub_added()),
    )
    .await?;
    Ok(())
}

/// `fsub_try_again`: re-check and deliver the held link once everything is joined.
pub async fn on_try_again(bot: &Bot, q: &CallbackQuery, deps: &HandlerDeps) -> HandlerResult {
    let user_id = ui::uid(&q.from);
    let Some((chat_id, message_id)) = ui::callback_origin(q) else {
        ui::answer(bot, q, None, false).await;
        return Ok(());
    };

    let channels = deps.storage.force_sub.load().await;
    let missing = missing_channels(bot, user_id, channels.list()).await;
    if !missing.is_empty() {
        ui::answer(bot, q, Some("❌ You haven't joined all channels yet!"), true).await;
        send_join_message(bot, chat_id, &missing, deps).await?;
        ui::delete_quietly(bot, chat_id, message_id).await;
        return Ok(());
    }

    ui::answer(bot, q, Some("✅ All channels joined! Processing your request..."), false).await;
    ui::delete_quietly(bot, chat_id, message_id).await;

    match deps.conversations.release_link(user_id) {
        Some(token) => start::open_link(bot, chat_id, user_id, &token, deps).await,
        None => {
            log::debug!("User {} passed the gate with no held link", user_id);
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn channel(id: i64, title: &str) -> ForceSubChannel {
        ForceSubChannel {
            id,
            title: title.to_string(),
            username: None,
            invite_link: None,
            mode: None,
            added_by: None,
        }
    }

    #[test]
    fn test_render_channel_list() {
        assert_eq!(
            render_channel_list(&[]),
            "📢 <b>Force Subscribe Channels</b>\n\nNo channels added yet."
        );
        let text = render_channel_list(&[channel(-1001, "News & Co"), channel(-1002, "B")]);
        assert!(text.contains("• News &amp; Co (ID: <code>-1001</code>)"));
        assert!(text.ends_with("<b>Total:</b> 2"));
    }

    #[test]
    fn test_render_join_text() {
        let text = render_join_text(&[channel(-1, "One"), channel(-2, "Two")]);
        assert!(text.starts_with("🔒 <b>Join Required Channels</b>"));
        assert!(text.contains("• One\n• Two"));
        assert!(text.contains("🔄 Try Again"));
    }
}
