//! /settings: images, texts, auto-delete delay and content protection.

use teloxide::net::Download;
use teloxide::prelude::*;
use teloxide::types::CallbackQuery;

use crate::core::error::AppResult;
use crate::core::utils::humanize_key;
use crate::storage::settings::auto_delete_label;
use crate::storage::{SettingField, Settings, Storage};
use crate::telegram::conversation::Pending;
use crate::telegram::handlers::types::{HandlerDeps, HandlerResult, NOT_AUTHORIZED_TEXT};
use crate::telegram::keyboards;
use crate::telegram::ui::{self, edit_html, send_html};

fn mark(set: bool) -> &'static str {
    if set {
        "✅ Set"
    } else {
        "❌ Not Set"
    }
}

/// An image counts as set when its file is present in the data directory.
fn image_is_set(storage: &Storage, stored: &str) -> bool {
    !stored.is_empty() && storage.resolve(stored).is_file()
}

pub fn render_menu(settings: &Settings, images_present: [bool; 4]) -> String {
    let [start, help, force_sub, alive] = images_present;
    format!(
        "⚙️ <b>Bot Settings</b>\n\n\
         🖼️ Start Image: {}\n\
         📖 Help Image: {}\n\
         📢 Force Sub Image: {}\n\
         💡 Alive Image: {}\n\
         ⏰ Auto Delete: {}\n\
         🔒 Protect Content: {}\n\n\
         Select an option to configure:",
        mark(start),
        mark(help),
        mark(force_sub),
        mark(alive),
        settings.auto_delete_label(),
        if settings.protect_content { "✅ ON" } else { "❌ OFF" }
    )
}

async fn menu_text(storage: &Storage) -> String {
    let settings = storage.settings.load().await;
    let present = [
        image_is_set(storage, &settings.start_image),
        image_is_set(storage, &settings.help_image),
        image_is_set(storage, &settings.force_sub_image),
        image_is_set(storage, &settings.alive_image),
    ];
    render_menu(&settings, present)
}

pub fn render_field_prompt(field: SettingField) -> String {
    let title = humanize_key(field.key());
    if field.is_image() {
        format!(
            "🖼️ <b>{} Settings</b>\n\nNow send me the image you want to use as the {}.",
            title,
            title.to_lowercase()
        )
    } else if field == SettingField::StartText {
        format!(
            "📝 <b>{} Settings</b>\n\nSend me the new start text. You can use {{mention}} for the user mention.",
            title
        )
    } else {
        format!("📋 <b>{} Settings</b>\n\nSend me the new help text.", title)
    }
}

pub async fn handle_settings(bot: &Bot, msg: &Message, deps: &HandlerDeps) -> HandlerResult {
    if !deps.require_admin(bot, msg).await? {
        return Ok(());
    }
    send_menu(bot, msg.chat.id, deps).await
}

async fn send_menu(bot: &Bot, chat_id: ChatId, deps: &HandlerDeps) -> HandlerResult {
    let text = menu_text(&deps.storage).await;
    send_html(bot, chat_id, text, Some(keyboards::settings_menu())).await?;
    Ok(())
}

async fn show_menu(bot: &Bot, q: &CallbackQuery, deps: &HandlerDeps) -> HandlerResult {
    if let Some((chat_id, message_id)) = ui::callback_origin(q) {
        let text = menu_text(&deps.storage).await;
        edit_html(bot, chat_id, message_id, text, Some(keyboards::settings_menu())).await?;
    }
    Ok(())
}

/// `settings_*`, `auto_delete_*` and `protect_*` buttons.
pub async fn on_callback(bot: &Bot, q: &CallbackQuery, deps: &HandlerDeps, data: &str) -> HandlerResult {
    let user_id = ui::uid(&q.from);
    if !deps.is_authorized(user_id).await {
        ui::answer(bot, q, Some(NOT_AUTHORIZED_TEXT), true).await;
        return Ok(());
    }
    let is_setting = |p: &Pending| matches!(p, Pending::Setting(_));

    if let Some(field) = SettingField::from_callback(data) {
        ui::answer(bot, q, None, false).await;
        deps.conversations.set(user_id, Pending::Setting(field));
        if let Some((chat_id, message_id)) = ui::callback_origin(q) {
            edit_html(
                bot,
                chat_id,
                message_id,
                render_field_prompt(field),
                Some(keyboards::settings_back()),
            )
            .await?;
        }
        return Ok(());
    }

    if let Some(minutes) = keyboards::parse_auto_delete(data) {
        deps.storage.settings.update(|s| s.auto_delete_time = minutes).await?;
        log::info!("Auto delete set to {} minutes by {}", minutes, user_id);
        let status = auto_delete_label(minutes);
        ui::answer(bot, q, Some(&format!("Auto delete set to {}!", status)), true).await;
        return show_menu(bot, q, deps).await;
    }

    match data {
        "settings_auto_delete" => {
            ui::answer(bot, q, None, false).await;
            if let Some((chat_id, message_id)) = ui::callback_origin(q) {
                edit_html(
                    bot,
                    chat_id,
                    message_id,
                    "⏰ <b>Auto Delete Settings</b>\n\nSelect time duration for auto deletion:",
                    Some(keyboards::auto_delete_choices()),
                )
                .await?;
            }
        }
        "settings_protect_content" => {
            ui::answer(bot, q, None, false).await;
            let enabled = deps.storage.settings.load().await.protect_content;
            if let Some((chat_id, message_id)) = ui::callback_origin(q) {
                edit_html(
                    bot,
                    chat_id,
                    message_id,
                    "🔒 <b>Protect Content Settings</b>\n\n\
                     When enabled, delivered files cannot be forwarded or saved.",
                    Some(keyboards::protect_content(enabled)),
                )
                .await?;
            }
        }
        "protect_on" | "protect_off" => {
            let enabled = data == "protect_on";
            deps.storage.settings.update(|s| s.protect_content = enabled).await?;
            log::info!("Protect content set to {} by {}", enabled, user_id);
            let text = if enabled {
                "Protect content enabled!"
            } else {
                "Protect content disabled!"
            };
            ui::answer(bot, q, Some(text), true).await;
            show_menu(bot, q, deps).await?;
        }
        "settings_back" => {
            ui::answer(bot, q, None, false).await;
            deps.conversations.take_if(user_id, is_setting);
            show_menu(bot, q, deps).await?;
        }
        _ => {
            deps.conversations.take_if(user_id, is_setting);
            ui::close_callback_message(bot, q).await;
        }
    }
    Ok(())
}

/// Downloads the largest size of a photo into `DATA_DIR/<key>.jpg`.
async fn save_photo(bot: &Bot, msg: &Message, storage: &Storage, field: SettingField) -> AppResult<Option<String>> {
    let Some(largest) = msg.photo().and_then(|sizes| sizes.iter().max_by_key(|p| p.width * p.height)) else {
        return Ok(None);
    };
    let file = bot.get_file(largest.file.id.clone()).await?;
    let mut buf = Vec::new();
    bot.download_file(&file.path, &mut buf).await?;

    let name = field.image_file_name();
    tokio::fs::create_dir_all(storage.root()).await?;
    tokio::fs::write(storage.resolve(&name), &buf).await?;
    log::info!("Saved {} ({} bytes)", name, buf.len());
    Ok(Some(name))
}

/// Next message after choosing a field in the menu.
pub async fn on_setting_input(bot: &Bot, msg: &Message, deps: &HandlerDeps, field: SettingField) -> HandlerResult {
    let user_id = ui::sender_id(msg);
    let title = humanize_key(field.key());

    if field.is_image() {
        let Some(name) = save_photo(bot, msg, &deps.storage, field).await? else {
            send_html(bot, msg.chat.id, "❌ Please send a valid image!", None).await?;
            return Ok(());
        };
        deps.storage.settings.update(|s| s.set(field, name)).await?;
        send_html(bot, msg.chat.id, format!("✅ {} has been set successfully!", title), None).await?;
    } else {
        let Some(text) = msg.text().map(str::trim).filter(|t| !t.is_empty()) else {
            send_html(bot, msg.chat.id, "❌ Please send a text message!", None).await?;
            return Ok(());
        };
        let text = text.to_string();
        deps.storage.settings.update(|s| s.set(field, text)).await?;
        send_html(bot, msg.chat.id, format!("✅ {} has been updated successfully!", title), None).await?;
    }
    log::info!("{} updated by {}", field.key(), user_id);

    deps.conversations.take_if(user_id, |p| *p == Pending::Setting(field));
    send_menu(bot, msg.chat.id, deps).await
}
