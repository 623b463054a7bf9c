//! File-store Telegram bot
//!
//! Turns channel posts into shareable `/start` deep links and delivers them
//! behind an optional force-subscribe gate, with auto-delete and an admin
//! toolbox on top.
//!
//! # Module Structure
//!
//! - `core`: configuration, errors, logging and small utilities
//! - `storage`: JSON documents in the data directory
//! - `telegram`: command and callback handlers

#![allow(clippy::too_many_arguments)]

pub mod broadcast;
pub mod cli;
pub mod core;
pub mod scheduler;
pub mod shortener;
pub mod storage;
pub mod telegram;

// Re-export commonly used types for convenience
pub use core::{config, AppError, AppResult};
pub use storage::{SharedStorage, Storage};
