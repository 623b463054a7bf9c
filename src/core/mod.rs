//! Core utilities, configuration, and common functionality

pub mod config;
pub mod deeplink;
pub mod disk;
pub mod error;
pub mod logging;
pub mod process;
pub mod system;
pub mod utils;

// Re-exports for convenience
pub use error::{AppError, AppResult};
pub use logging::{init_logger, log_startup_configuration};
