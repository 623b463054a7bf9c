//! Inline keyboards and their callback-data strings.

use teloxide::types::{InlineKeyboardButton, InlineKeyboardMarkup};
use url::Url;

use crate::core::config;
use crate::storage::{ForceSubChannel, SettingField};

/// Telegram rejects callback data longer than this many bytes.
pub const MAX_CALLBACK_DATA: usize = 64;

pub fn callback(text: &str, data: impl Into<String>) -> InlineKeyboardButton {
    InlineKeyboardButton::callback(text, data)
}

/// URL button; `None` when the link does not parse.
pub fn url_button(text: &str, link: &str) -> Option<InlineKeyboardButton> {
    match Url::parse(link) {
        Ok(url) => Some(InlineKeyboardButton::url(text, url)),
        Err(e) => {
            log::warn!("Skipping button '{}' with invalid URL {}: {}", text, link, e);
            None
        }
    }
}

fn markup(rows: Vec<Vec<InlineKeyboardButton>>) -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(rows.into_iter().filter(|row| !row.is_empty()))
}

fn owner_button() -> Option<InlineKeyboardButton> {
    url_button("👑 Owner", &config::owner::OWNER_URL)
}

/// A single close button.
pub fn close(data: &str) -> InlineKeyboardMarkup {
    markup(vec![vec![callback("✖ Close", data)]])
}

pub fn back_close(back: &str, close: &str) -> InlineKeyboardMarkup {
    markup(vec![vec![callback("⬅ Back", back), callback("✖ Close", close)]])
}

pub fn refresh_close(refresh: &str, close: &str) -> InlineKeyboardMarkup {
    markup(vec![vec![callback("🔄 Refresh", refresh)], vec![callback("✖ Close", close)]])
}

// ---- start / help ----

pub fn start() -> InlineKeyboardMarkup {
    markup(vec![
        vec![callback("About", "start_about"), callback("Help", "start_help")],
        vec![callback("✖ Close", "start_close")],
    ])
}

pub fn start_sub_page() -> InlineKeyboardMarkup {
    back_close("start_back", "start_close")
}

// ---- file links ----

/// Attached to the auto-delete warning and to the completion notice.
pub fn delivery_warning(start_url: &str, close_message_id: i32) -> InlineKeyboardMarkup {
    markup(vec![
        url_button("♻️ Click here", start_url).into_iter().collect(),
        vec![callback("✖ Close", format!("link_close:{}", close_message_id))],
    ])
}

pub fn parse_link_close(data: &str) -> Option<i32> {
    data.strip_prefix("link_close:")?.parse().ok()
}

pub fn copy_link(link: &str) -> InlineKeyboardMarkup {
    markup(vec![url_button("🔗 Copy Link", link).into_iter().collect()])
}

pub fn batch_link(link: &str, token: &str) -> InlineKeyboardMarkup {
    let copy_data = format!("copy_batch_{}", token);
    let mut rows = vec![url_button("🔗 Copy Batch Link", link).into_iter().collect::<Vec<_>>()];
    if copy_data.len() <= MAX_CALLBACK_DATA {
        rows.push(vec![callback("📋 Copy as Text", copy_data)]);
    }
    markup(rows)
}

/// Tokens are base64url and may contain `_`, so only the prefix is stripped.
pub fn parse_copy_batch(data: &str) -> Option<&str> {
    data.strip_prefix("copy_batch_").filter(|t| !t.is_empty())
}

// ---- force subscribe ----

/// Join buttons for at most four channels, two per row, then "Try Again".
pub fn force_sub_join(channels: &[ForceSubChannel]) -> InlineKeyboardMarkup {
    let buttons: Vec<InlineKeyboardButton> = channels
        .iter()
        .take(config::force_sub::MAX_BUTTONS)
        .filter_map(|c| url_button(&format!("📢 {}", c.title), &c.join_url()))
        .collect();

    let mut rows: Vec<Vec<InlineKeyboardButton>> = buttons
        .chunks(config::force_sub::BUTTONS_PER_ROW)
        .map(|chunk| chunk.to_vec())
        .collect();
    rows.push(vec![callback("🔄 Try Again", "fsub_try_again")]);
    markup(rows)
}

pub fn force_sub_admin(channels: &[ForceSubChannel]) -> InlineKeyboardMarkup {
    let mut rows: Vec<Vec<InlineKeyboardButton>> = channels
        .iter()
        .map(|c| vec![callback(&format!("🗑️ {}", c.title), format!("fsub_delete_{}", c.id))])
        .collect();
    rows.push(vec![callback("➕ Add Channel", "fsub_add_channel")]);
    rows.push(vec![callback("❌ Close", "fsub_close")]);
    markup(rows)
}

pub fn force_sub_added() -> InlineKeyboardMarkup {
    markup(vec![
        vec![callback("➕ Add Channel", "fsub_add_channel")],
        vec![callback("🔙 Back", "fsub_back"), callback("❌ Close", "fsub_close")],
    ])
}

pub fn parse_fsub_delete(data: &str) -> Option<i64> {
    data.strip_prefix("fsub_delete_")?.parse().ok()
}

// ---- settings ----

fn setting_label(field: SettingField) -> &'static str {
    match field {
        SettingField::StartImage => "🖼️ Start Image",
        SettingField::HelpImage => "📖 Help Image",
        SettingField::ForceSubImage => "📢 Force Sub Image",
        SettingField::AliveImage => "💡 Alive Image",
        SettingField::StartText => "📝 Start Text",
        SettingField::HelpText => "📋 Help Text",
    }
}

pub fn settings_menu() -> InlineKeyboardMarkup {
    let field = |f: SettingField| vec![callback(setting_label(f), f.callback_data())];
    markup(vec![
        vec![
            callback(setting_label(SettingField::StartImage), SettingField::StartImage.callback_data()),
            callback(setting_label(SettingField::HelpImage), SettingField::HelpImage.callback_data()),
        ],
        vec![
            callback(setting_label(SettingField::ForceSubImage), SettingField::ForceSubImage.callback_data()),
            callback(setting_label(SettingField::AliveImage), SettingField::AliveImage.callback_data()),
        ],
        vec![callback("⏰ Auto Delete", "settings_auto_delete")],
        vec![callback("🔒 Protect Content", "settings_protect_content")],
        field(SettingField::StartText),
        field(SettingField::HelpText),
        vec![callback("🔙 Back", "settings_back"), callback("❌ Close", "settings_close")],
    ])
}

pub fn settings_back() -> InlineKeyboardMarkup {
    markup(vec![vec![callback("🔙 Back", "settings_back")]])
}

fn auto_delete_button(minutes: u64) -> InlineKeyboardButton {
    let label = match minutes {
        0 => "Disable".to_string(),
        m if m >= 60 && m % 60 == 0 => format!("{} hr", m / 60),
        m => format!("{} min", m),
    };
    callback(&label, format!("auto_delete_{}", minutes))
}

pub fn auto_delete_choices() -> InlineKeyboardMarkup {
    let timed: Vec<InlineKeyboardButton> = config::auto_delete::CHOICES_MINUTES
        .iter()
        .filter(|m| **m != 0)
        .map(|m| auto_delete_button(*m))
        .collect();
    let mut rows: Vec<Vec<InlineKeyboardButton>> = timed.chunks(2).map(|c| c.to_vec()).collect();
    rows.push(vec![auto_delete_button(0)]);
    rows.push(vec![callback("🔙 Back", "settings_back")]);
    markup(rows)
}

/// Only the offered choices are accepted.
pub fn parse_auto_delete(data: &str) -> Option<u64> {
    let minutes: u64 = data.strip_prefix("auto_delete_")?.parse().ok()?;
    config::auto_delete::CHOICES_MINUTES.contains(&minutes).then_some(minutes)
}

pub fn protect_content(enabled: bool) -> InlineKeyboardMarkup {
    let (on, off) = if enabled { ("✅ On", "Off") } else { ("On", "✅ Off") };
    markup(vec![
        vec![callback(on, "protect_on"), callback(off, "protect_off")],
        vec![callback("🔙 Back", "settings_back")],
    ])
}

// ---- admins ----

pub fn admin_panel() -> InlineKeyboardMarkup {
    markup(vec![
        vec![callback("👑 Admins", "panel_admins")],
        vec![callback("➕ Promote", "panel_promote"), callback("➖ Demote", "panel_demote")],
        vec![callback("⚠ Expiring Admins", "panel_expiring")],
        vec![callback("📜 Logs", "panel_logs")],
        owner_button().into_iter().collect(),
        vec![callback("✖ Close Panel", "close_msg")],
    ])
}

pub fn panel_page() -> InlineKeyboardMarkup {
    back_close("admin_back", "close_msg")
}

pub fn owner_close() -> InlineKeyboardMarkup {
    let mut row: Vec<InlineKeyboardButton> = owner_button().into_iter().collect();
    row.push(callback("✖ Close", "close_msg"));
    markup(vec![row])
}

pub fn promoted_notice() -> InlineKeyboardMarkup {
    markup(vec![
        owner_button().into_iter().collect(),
        vec![callback("Okay!", "admin_okay")],
    ])
}

pub fn expired_notice() -> InlineKeyboardMarkup {
    let mut row = vec![callback("Okay!", "expired_okay"), callback("Feedback", "expired_feedback")];
    row.extend(owner_button());
    markup(vec![row])
}

// ---- broadcast ----

pub fn broadcast_running() -> InlineKeyboardMarkup {
    markup(vec![vec![
        callback("⚠︎ Cancel", "broadcast_cancel"),
        callback("✖ Close", "broadcast_close"),
    ]])
}

pub fn broadcast_finished() -> InlineKeyboardMarkup {
    markup(vec![vec![
        callback("▪︎ New", "broadcast_new"),
        callback("✖ Close", "broadcast_close"),
    ]])
}

// ---- shortener ----

pub fn shortener_enabled() -> InlineKeyboardMarkup {
    markup(vec![
        vec![callback("🔄 Change Shortener", "shortener_change")],
        vec![callback("❌ Disable", "shortener_disable")],
        vec![callback("❌ Close", "shortener_close")],
    ])
}

pub fn shortener_missing() -> InlineKeyboardMarkup {
    markup(vec![
        vec![callback("➕ Add Shortener", "shortener_add")],
        vec![callback("❌ Close", "shortener_close")],
    ])
}

pub fn shortener_waiting() -> InlineKeyboardMarkup {
    markup(vec![vec![callback("❌ Cancel", "shortener_cancel")]])
}

pub fn shortener_retry() -> InlineKeyboardMarkup {
    markup(vec![
        vec![callback("🔄 Try Again", "shortener_add")],
        vec![callback("❌ Close", "shortener_close")],
    ])
}

pub fn shortener_disabled() -> InlineKeyboardMarkup {
    markup(vec![
        vec![callback("➕ Enable Again", "shortener_add")],
        vec![callback("❌ Close", "shortener_close")],
    ])
}

pub fn shortener_ready() -> InlineKeyboardMarkup {
    markup(vec![
        vec![callback("🔗 Test Shortlink", "shortener_test")],
        vec![callback("❌ Close", "shortener_close")],
    ])
}

pub fn shortener_tested(test_url: &str) -> InlineKeyboardMarkup {
    markup(vec![
        url_button("🔗 Open Test Link", test_url).into_iter().collect(),
        vec![callback("❌ Close", "shortener_close")],
    ])
}

pub fn short_link(short_url: &str) -> InlineKeyboardMarkup {
    let copy_data = format!("shortlink_copy_{}", short_url);
    let mut rows = vec![url_button("🔗 Open Short Link", short_url).into_iter().collect::<Vec<_>>()];
    if copy_data.len() <= MAX_CALLBACK_DATA {
        rows.push(vec![callback("📋 Copy", copy_data)]);
    }
    markup(rows)
}
