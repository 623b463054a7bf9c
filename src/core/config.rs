use once_cell::sync::Lazy;
use std::env;
use std::path::PathBuf;
use std::time::Duration;

/// Bot token
/// Read from BOT_TOKEN or TELOXIDE_TOKEN environment variable
pub static BOT_TOKEN: Lazy<String> = Lazy::new(|| {
    env::var("BOT_TOKEN")
        .or_else(|_| env::var("TELOXIDE_TOKEN"))
        .unwrap_or_else(|_| String::new())
});

/// Custom Bot API server URL (local telegram-bot-api instance)
/// Read from BOT_API_URL environment variable
pub static BOT_API_URL: Lazy<Option<String>> = Lazy::new(|| env::var("BOT_API_URL").ok().filter(|v| !v.is_empty()));

/// Log file path
/// Read from LOG_FILE_PATH environment variable
/// Default: filestore.log
pub static LOG_FILE_PATH: Lazy<String> =
    Lazy::new(|| env::var("LOG_FILE_PATH").unwrap_or_else(|_| "filestore.log".to_string()));

/// Directory holding every JSON document and uploaded image.
/// Read from DATA_DIR environment variable, supports tilde (~) expansion.
/// Default: current directory
pub static DATA_DIR: Lazy<PathBuf> = Lazy::new(|| {
    let raw = env::var("DATA_DIR").unwrap_or_else(|_| ".".to_string());
    PathBuf::from(shellexpand::tilde(&raw).into_owned())
});

/// Owner configuration
pub mod owner {
    use once_cell::sync::Lazy;
    use std::env;

    /// Telegram user id of the bot owner.
    /// The owner is always authorized and is the only one allowed to broadcast,
    /// restart and update the bot.
    /// Read from OWNER_ID environment variable. 0 means "no owner configured".
    pub static OWNER_ID: Lazy<i64> = Lazy::new(|| {
        env::var("OWNER_ID")
            .ok()
            .and_then(|v| v.trim().parse::<i64>().ok())
            .unwrap_or(0)
    });

    /// Link used by the "Owner" buttons.
    /// Read from OWNER_URL; falls back to a `tg://user` link to OWNER_ID.
    pub static OWNER_URL: Lazy<String> = Lazy::new(|| {
        env::var("OWNER_URL")
            .ok()
            .filter(|v| !v.trim().is_empty())
            .unwrap_or_else(|| owner_fallback_url(*OWNER_ID))
    });

    pub fn owner_fallback_url(owner_id: i64) -> String {
        format!("tg://user?id={}", owner_id)
    }
}

/// Admin configuration
pub mod admin {
    use once_cell::sync::Lazy;
    use std::env;

    /// Admins seeded into admins.json on first start.
    /// Read from ADMIN_IDS (comma, space or newline separated).
    pub static ADMIN_IDS: Lazy<Vec<i64>> = Lazy::new(|| parse_admin_ids(&env::var("ADMIN_IDS").unwrap_or_default()));

    pub fn parse_admin_ids(raw: &str) -> Vec<i64> {
        let mut ids: Vec<i64> = raw
            .split([',', ' ', '\n', '\t'])
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .filter_map(|s| s.parse::<i64>().ok())
            .collect();
        ids.dedup();
        ids
    }
}

/// Auto-delete configuration for delivered files
pub mod auto_delete {
    use super::Duration;

    /// Minutes offered in the settings menu. 0 disables auto-delete.
    pub const CHOICES_MINUTES: [u64; 9] = [5, 10, 15, 20, 30, 45, 60, 180, 0];

    /// Auto-delete delay used when settings.json is missing
    pub const DEFAULT_MINUTES: u64 = 10;

    pub fn delay(minutes: u64) -> Duration {
        Duration::from_secs(minutes.saturating_mul(60))
    }
}

/// Broadcast configuration
pub mod broadcast {
    use super::Duration;

    /// Pause between two copies, keeps the bot under Telegram's flood limits
    pub const SEND_DELAY_MS: u64 = 100;

    /// Progress message is edited after this many sends (and on the last one)
    pub const PROGRESS_EVERY: usize = 10;

    /// Width of the progress bar in characters
    pub const BAR_WIDTH: usize = 20;

    pub fn send_delay() -> Duration {
        Duration::from_millis(SEND_DELAY_MS)
    }
}

/// Temporary admin configuration
pub mod admin_expiry {
    /// Warnings sent before an admin role expires: (label, seconds before expiry)
    pub const WARNING_STAGES: [(&str, i64); 4] = [("24h", 24 * 3600), ("12h", 12 * 3600), ("6h", 6 * 3600), ("2h", 2 * 3600)];

    /// Admins expiring within this window are listed as "expiring soon"
    pub const SOON_WINDOW_SECS: i64 = 24 * 3600;

    /// Number of admin log lines shown by /admin_logs
    pub const LOG_TAIL_LINES: usize = 40;
}

/// URL shortener configuration
pub mod shortener {
    use super::Duration;

    /// Time the admin has to paste an API token
    pub const SETUP_TIMEOUT_SECS: u64 = 60;

    /// Countdown shown by /shortlink while waiting for a message
    pub const COUNTDOWN_SECS: u64 = 60;

    /// How often the countdown message is edited
    pub const COUNTDOWN_TICK_SECS: u64 = 5;

    /// Shorter tokens are rejected before any network call
    pub const MIN_TOKEN_LEN: usize = 10;

    /// URL used to probe a token against each known service
    pub const PROBE_URL: &str = "https://google.com";

    /// HTTP timeout for shortener APIs
    pub const HTTP_TIMEOUT_SECS: u64 = 10;

    pub fn setup_timeout() -> Duration {
        Duration::from_secs(SETUP_TIMEOUT_SECS)
    }

    pub fn http_timeout() -> Duration {
        Duration::from_secs(HTTP_TIMEOUT_SECS)
    }
}

/// Batch link configuration
pub mod batch {
    /// Messages a single batch link may cover
    pub const MAX_MESSAGES: i32 = 200;
}

/// Force-subscribe configuration
pub mod force_sub {
    /// Channel buttons shown in the join message
    pub const MAX_BUTTONS: usize = 4;

    /// Channel buttons per keyboard row
    pub const BUTTONS_PER_ROW: usize = 2;
}

/// System stats configuration
pub mod system {
    use super::Duration;

    /// CPU samples taken by /stats
    pub const CPU_SAMPLES: usize = 7;

    /// Pause between two CPU samples
    pub const CPU_SAMPLE_INTERVAL_MS: u64 = 350;

    pub fn cpu_sample_interval() -> Duration {
        Duration::from_millis(CPU_SAMPLE_INTERVAL_MS)
    }
}

/// Network configuration
pub mod network {
    use super::Duration;

    /// Request timeout for the Bot API client (in seconds)
    pub const REQUEST_TIMEOUT_SECS: u64 = 60;

    pub fn timeout() -> Duration {
        Duration::from_secs(REQUEST_TIMEOUT_SECS)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_admin_ids_mixed_separators() {
        assert_eq!(admin::parse_admin_ids("1, 2\n3\t4"), vec![1, 2, 3, 4]);
    }

    #[test]
    fn test_parse_admin_ids_skips_garbage() {
        assert_eq!(admin::parse_admin_ids("abc,,42, -7"), vec![42, -7]);
        assert!(admin::parse_admin_ids("").is_empty());
    }

    #[test]
    fn test_owner_fallback_url() {
        assert_eq!(owner::owner_fallback_url(5), "tg://user?id=5");
    }

    #[test]
    fn test_auto_delete_delay() {
        assert_eq!(auto_delete::delay(10), Duration::from_secs(600));
        assert_eq!(auto_delete::delay(0), Duration::ZERO);
        assert!(auto_delete::CHOICES_MINUTES.contains(&auto_delete::DEFAULT_MINUTES));
    }

    #[test]
    fn test_auto_delete_delay_saturates() {
        assert_eq!(auto_delete::delay(u64::MAX), Duration::from_secs(u64::MAX));
        assert_eq!(auto_delete::delay(u64::MAX / 60 + 1), Duration::from_secs(u64::MAX));
    }

    #[test]
    fn test_warning_stages_descending() {
        let secs: Vec<i64> = admin_expiry::WARNING_STAGES.iter().map(|(_, s)| *s).collect();
        let mut sorted = secs.clone();
        sorted.sort_by(|a, b| b.cmp(a));
        assert_eq!(secs, sorted);
    }
}
