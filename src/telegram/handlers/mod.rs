//! Telegram bot handler tree configuration
//!
//! The dispatcher schema lives here so the routing tests exercise the same
//! tree as production.

mod schema;
pub mod types;

pub use schema::{route_callback, schema, CallbackRoute};
pub use types::{ensure_user_exists, HandlerDeps, HandlerError, HandlerResult, UserCreationResult, UserInfo};
