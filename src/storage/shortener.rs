//! `shortener.json`

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ShortenerConfig {
    pub enabled: bool,
    pub api_key: String,
    /// Site root, e.g. `https://api.gplinks.com`; custom services are called at `{website}/api`
    pub website: String,
    pub website_name: String,
}

impl ShortenerConfig {
    pub fn is_ready(&self) -> bool {
        self.enabled && !self.api_key.is_empty()
    }

    pub fn disable(&mut self) {
        *self = Self::default();
    }
}
