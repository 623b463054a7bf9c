//! Telegram bot integration and handlers

pub mod bot;
pub mod conversation;
pub mod handlers;
pub mod keyboards;
pub mod notifications;
pub mod ui;

pub mod admin;
pub mod ban;
pub mod broadcast;
pub mod force_sub;
pub mod links;
pub mod settings;
pub mod shortener;
pub mod start;
pub mod system;
pub mod users;

// Re-exports for convenience
pub use bot::{create_bot, setup_bot_commands, Command};
pub use handlers::{schema, HandlerDeps};
