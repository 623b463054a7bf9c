//! Per-user "waiting for X" dialog state.
//!
//! A user has at most one open dialog. Opening a new one replaces whatever
//! was pending, so the most recent prompt always owns the next message.

use dashmap::DashMap;

use crate::storage::SettingField;

/// What the next message from a user is expected to be
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Pending {
    /// `/batchlink`: first post of the range
    BatchFirst,
    /// `/batchlink`: last post of the range
    BatchLast {
        chat_id: i64,
        first_message_id: i32,
        title: String,
    },
    /// `/fsub`: a post forwarded from the channel to add
    ForceSubChannel,
    /// `/settings`: new value for one field
    Setting(SettingField),
    /// `/shortener`: an API token; the prompt message is edited with the result
    ShortenerToken { chat_id: i64, message_id: i32 },
    /// `/shortlink`: the message to store and shorten
    ShortLink { chat_id: i64, message_id: i32 },
    /// Feedback from an admin whose role expired
    Feedback,
}

#[derive(Debug, Default)]
pub struct Conversations {
    pending: DashMap<i64, Pending>,
    /// Start tokens held back by the force-subscribe gate, per user
    held_links: DashMap<i64, String>,
}

impl Conversations {
    pub fn new() -> Self {
        Self::default()
    }

    /// Opens a dialog, returning the one it replaced.
    pub fn set(&self, user_id: i64, pending: Pending) -> Option<Pending> {
        let previous = self.pending.insert(user_id, pending);
        if let Some(ref p) = previous {
            log::debug!("User {} abandoned dialog {:?}", user_id, p);
        }
        previous
    }

    pub fn peek(&self, user_id: i64) -> Option<Pending> {
        self.pending.get(&user_id).map(|p| p.clone())
    }

    pub fn take(&self, user_id: i64) -> Option<Pending> {
        self.pending.remove(&user_id).map(|(_, p)| p)
    }

    /// Closes the dialog only if it is still the expected one.
    pub fn take_if(&self, user_id: i64, f: impl FnOnce(&Pending) -> bool) -> Option<Pending> {
        self.pending.remove_if(&user_id, |_, p| f(p)).map(|(_, p)| p)
    }

    pub fn hold_link(&self, user_id: i64, token: String) {
        self.held_links.insert(user_id, token);
    }

    pub fn held_link(&self, user_id: i64) -> Option<String> {
        self.held_links.get(&user_id).map(|t| t.clone())
    }

    pub fn release_link(&self, user_id: i64) -> Option<String> {
        self.held_links.remove(&user_id).map(|(_, t)| t)
    }
}
