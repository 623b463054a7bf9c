//! Handler types, dependencies, and user management helpers

use std::sync::Arc;

use teloxide::prelude::*;
use teloxide::types::{Message, User};
use tokio_util::sync::CancellationToken;

use crate::broadcast::BroadcastTracker;
use crate::core::deeplink::start_url;
use crate::scheduler::TimerRegistry;
use crate::shortener::ShortenerClient;
use crate::storage::{SharedStorage, UserRecord};
use crate::telegram::conversation::Conversations;
use crate::telegram::ui::{self, send_html};

/// Error type for handlers
pub type HandlerError = Box<dyn std::error::Error + Send + Sync + 'static>;

pub type HandlerResult = Result<(), HandlerError>;

pub const NOT_AUTHORIZED_TEXT: &str = "🚫 You are not authorized to use this command.";

pub const OWNER_ONLY_TEXT: &str = "❌ This command is only available for the bot owner!";

/// Dependencies required by handlers
#[derive(Clone)]
pub struct HandlerDeps {
    pub storage: SharedStorage,
    pub conversations: Arc<Conversations>,
    /// Admin role expiry jobs, keyed by admin id
    pub admin_timers: Arc<TimerRegistry<i64>>,
    /// Dialog timeouts and countdowns keyed by user id, plus unkeyed auto-delete jobs
    pub dialog_timers: Arc<TimerRegistry<i64>>,
    pub broadcast: Arc<BroadcastTracker>,
    pub shortener: Arc<ShortenerClient>,
    pub bot_username: String,
    pub bot_id: UserId,
    pub owner_id: i64,
    /// Cancelled by /restart and /update; the dispatcher stops and the process re-executes
    pub restart: CancellationToken,
}

impl HandlerDeps {
    /// Create new handler dependencies
    pub fn new(
        storage: SharedStorage,
        shortener: Arc<ShortenerClient>,
        bot_username: String,
        bot_id: UserId,
        owner_id: i64,
    ) -> Self {
        Self {
            storage,
            conversations: Arc::new(Conversations::new()),
            admin_timers: Arc::new(TimerRegistry::new()),
            dialog_timers: Arc::new(TimerRegistry::new()),
            broadcast: Arc::new(BroadcastTracker::new()),
            shortener,
            bot_username,
            bot_id,
            owner_id,
            restart: CancellationToken::new(),
        }
    }

    pub fn is_owner(&self, user_id: i64) -> bool {
        self.owner_id != 0 && user_id == self.owner_id
    }

    /// Owner, or an admin whose role has not expired.
    pub async fn is_authorized(&self, user_id: i64) -> bool {
        self.storage.admins.is_authorized(user_id, self.owner_id).await
    }

    pub fn start_link(&self, token: &str) -> String {
        start_url(&self.bot_username, token)
    }

    /// Replies with the "not authorized" notice unless the sender may use admin commands.
    pub async fn require_admin(&self, bot: &Bot, msg: &Message) -> ResponseResult<bool> {
        if self.is_authorized(ui::sender_id(msg)).await {
            return Ok(true);
        }
        send_html(bot, msg.chat.id, NOT_AUTHORIZED_TEXT, None).await?;
        Ok(false)
    }

    pub async fn require_owner(&self, bot: &Bot, msg: &Message) -> ResponseResult<bool> {
        if self.is_owner(ui::sender_id(msg)) {
            return Ok(true);
        }
        send_html(bot, msg.chat.id, OWNER_ONLY_TEXT, None).await?;
        Ok(false)
    }

    /// Cancels every pending timer; used on shutdown.
    pub fn shutdown_timers(&self) {
        self.admin_timers.shutdown();
        self.dialog_timers.shutdown();
    }
}

/// Sender info recorded in `users.json`
#[derive(Clone, Debug, PartialEq)]
pub struct UserInfo {
    pub user_id: i64,
    pub username: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
}

impl UserInfo {
    pub fn from_user(user: &User) -> Self {
        Self {
            user_id: ui::uid(user),
            username: user.username.clone(),
            first_name: Some(user.first_name.clone()),
            last_name: user.last_name.clone(),
        }
    }

    /// Extract user info from a Telegram message
    pub fn from_message(msg: &Message) -> Option<Self> {
        msg.from.as_ref().filter(|u| !u.is_bot).map(Self::from_user)
    }

    pub fn into_record(self) -> UserRecord {
        UserRecord::new(self.user_id, self.username, self.first_name, self.last_name)
    }
}

/// Result of ensure_user_exists operation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UserCreationResult {
    /// User already existed
    Existed,
    /// User was newly created
    Created,
    /// Failed to write users.json
    StorageError,
}

/// Registers a user on first contact.
pub async fn ensure_user_exists(storage: &SharedStorage, user: &UserInfo) -> UserCreationResult {
    match storage.users.register(user.clone().into_record()).await {
        Ok(true) => {
            log::info!("New user registered: {} (@{})", user.user_id, user.username.as_deref().unwrap_or("-"));
            UserCreationResult::Created
        }
        Ok(false) => UserCreationResult::Existed,
        Err(e) => {
            log::error!("Failed to register user {}: {}", user.user_id, e);
            UserCreationResult::StorageError
        }
    }
}
