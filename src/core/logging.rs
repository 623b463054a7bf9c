//! Logging initialization and startup diagnostics
//!
//! This module provides:
//! - Logger initialization (console + file)
//! - Startup configuration summary

use anyhow::Result;
use simplelog::*;
use std::fs::File;

use crate::core::config;

/// Initialize logger for both console and file output
///
/// # Arguments
/// * `log_file_path` - Path to the log file
///
/// # Returns
/// * `Ok(())` - Logger initialized successfully
/// * `Err(anyhow::Error)` - Failed to initialize logger
pub fn init_logger(log_file_path: &str) -> Result<()> {
    let log_file = File::create(log_file_path).map_err(|e| anyhow::anyhow!("Failed to create log file: {}", e))?;

    CombinedLogger::init(vec![
        TermLogger::new(
            LevelFilter::Info,
            Config::default(),
            TerminalMode::Mixed,
            ColorChoice::Auto,
        ),
        WriteLogger::new(LevelFilter::Info, Config::default(), log_file),
    ])
    .map_err(|e| anyhow::anyhow!("Failed to initialize logger: {}", e))?;

    Ok(())
}

/// Logs the effective configuration at application startup
///
/// Warns loudly when OWNER_ID is missing: without it nobody can broadcast,
/// restart or promote the first admin.
pub fn log_startup_configuration() {
    log::info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    log::info!("📦 File store configuration");
    log::info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");

    let data_dir = &*config::DATA_DIR;
    if data_dir.is_dir() {
        log::info!("✅ DATA_DIR: {}", data_dir.display());
    } else {
        log::warn!("⚠️  DATA_DIR: {} (does not exist yet, will be created)", data_dir.display());
    }

    let owner_id = *config::owner::OWNER_ID;
    if owner_id != 0 {
        log::info!("✅ OWNER_ID: {}", owner_id);
    } else {
        log::error!("❌ OWNER_ID is not set - owner-only commands are disabled");
    }

    let seeded = &*config::admin::ADMIN_IDS;
    if seeded.is_empty() {
        log::info!("ADMIN_IDS: none (admins are managed with /promote)");
    } else {
        log::info!("ADMIN_IDS: {:?}", seeded);
    }

    match config::BOT_API_URL.as_deref() {
        Some(url) => log::info!("Bot API: {}", url),
        None => log::info!("Bot API: https://api.telegram.org"),
    }
    log::info!("Log file: {}", *config::LOG_FILE_PATH);
}
