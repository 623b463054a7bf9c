//! `settings.json`: texts, images, auto-delete delay and content protection

use serde::{Deserialize, Serialize};

use crate::core::config;

pub const DEFAULT_START_TEXT: &str = "Hi {mention} welcome to File Store Bot";

pub const DEFAULT_HELP_TEXT: &str = "Available Commands:\n\n\
/start - Start the bot\n\
/help - Show this help message\n\
/genlink - Generate link\n\
/batchlink - Generate batch links\n\
/fsub - Force subscribe\n\
/settings - Bot settings\n\
/promote - Promote user to admin\n\
/demote - Demote admin\n\
/adminpanel - Admin control panel\n\
/ban - Ban user\n\
/unban - Unban user\n\
/users - Show users\n\
/admins - Show admins\n\
/shortener - URL shortener setup\n\
/shortlink - Shorten a link\n\
/stats - System stats\n\
/update - Update bot\n\
/restart - Restart bot";

/// Missing keys take their default, so partially written files stay usable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub start_image: String,
    pub help_image: String,
    pub force_sub_image: String,
    pub alive_image: String,
    pub start_text: String,
    pub help_text: String,
    /// Minutes; 0 disables auto-delete
    pub auto_delete_time: u64,
    pub protect_content: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            start_image: "img.jpg".to_string(),
            help_image: String::new(),
            force_sub_image: String::new(),
            alive_image: String::new(),
            start_text: DEFAULT_START_TEXT.to_string(),
            help_text: DEFAULT_HELP_TEXT.to_string(),
            auto_delete_time: config::auto_delete::DEFAULT_MINUTES,
            protect_content: false,
        }
    }
}

/// A setting edited through the "send me the new value" dialog
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SettingField {
    StartImage,
    HelpImage,
    ForceSubImage,
    AliveImage,
    StartText,
    HelpText,
}

impl SettingField {
    pub const ALL: [SettingField; 6] = [
        Self::StartImage,
        Self::HelpImage,
        Self::ForceSubImage,
        Self::AliveImage,
        Self::StartText,
        Self::HelpText,
    ];

    /// JSON key; images are saved as `<key>.jpg`
    pub fn key(self) -> &'static str {
        match self {
            Self::StartImage => "start_image",
            Self::HelpImage => "help_image",
            Self::ForceSubImage => "force_sub_image",
            Self::AliveImage => "alive_image",
            Self::StartText => "start_text",
            Self::HelpText => "help_text",
        }
    }

    pub fn callback_data(self) -> &'static str {
        match self {
            Self::StartImage => "settings_start_img",
            Self::HelpImage => "settings_help_img",
            Self::ForceSubImage => "settings_fsub_img",
            Self::AliveImage => "settings_alive_img",
            Self::StartText => "settings_start_text",
            Self::HelpText => "settings_help_text",
        }
    }

    pub fn from_callback(data: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|f| f.callback_data() == data)
    }

    pub fn is_image(self) -> bool {
        matches!(
            self,
            Self::StartImage | Self::HelpImage | Self::ForceSubImage | Self::AliveImage
        )
    }

    pub fn image_file_name(self) -> String {
        format!("{}.jpg", self.key())
    }
}

impl Settings {
    pub fn get(&self, field: SettingField) -> &str {
        match field {
            SettingField::StartImage => &self.start_image,
            SettingField::HelpImage => &self.help_image,
            SettingField::ForceSubImage => &self.force_sub_image,
            SettingField::AliveImage => &self.alive_image,
            SettingField::StartText => &self.start_text,
            SettingField::HelpText => &self.help_text,
        }
    }

    pub fn set(&mut self, field: SettingField, value: String) {
        let slot = match field {
            SettingField::StartImage => &mut self.start_image,
            SettingField::HelpImage => &mut self.help_image,
            SettingField::ForceSubImage => &mut self.force_sub_image,
            SettingField::AliveImage => &mut self.alive_image,
            SettingField::StartText => &mut self.start_text,
            SettingField::HelpText => &mut self.help_text,
        };
        *slot = value;
    }

    pub fn auto_delete_label(&self) -> String {
        auto_delete_label(self.auto_delete_time)
    }
}

/// `"Disabled"` for 0, otherwise `"N minutes"`.
pub fn auto_delete_label(minutes: u64) -> String {
    if minutes == 0 {
        "Disabled".to_string()
    } else {
        format!("{} minutes", minutes)
    }
}
