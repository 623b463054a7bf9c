//! Broadcast bookkeeping and status texts.
//!
//! The send loop lives in the Telegram handler; this module holds the single
//! "is a broadcast running" slot, the counters, and everything that renders
//! them.

use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use tokio_util::sync::CancellationToken;

use crate::core::config;
use crate::core::utils::{format_minutes_seconds, percent, progress_bar};

#[derive(Debug, Clone, PartialEq)]
pub struct BroadcastProgress {
    pub total: usize,
    /// Users processed so far, successful or not
    pub current: usize,
    pub success: usize,
    pub failed: usize,
    pub started_at: DateTime<Utc>,
}

impl BroadcastProgress {
    pub fn new(total: usize, started_at: DateTime<Utc>) -> Self {
        Self {
            total,
            current: 0,
            success: 0,
            failed: 0,
            started_at,
        }
    }

    pub fn remaining(&self) -> usize {
        self.total.saturating_sub(self.current)
    }

    /// Seconds left at the average pace so far; `None` before the first send.
    pub fn eta_secs(&self, elapsed_secs: f64) -> Option<u64> {
        if self.current == 0 {
            return None;
        }
        let per_user = elapsed_secs / self.current as f64;
        Some((per_user * self.remaining() as f64).max(0.0) as u64)
    }
}

/// Progress is reported every few sends and always on the last one.
pub fn should_report(processed: usize, total: usize) -> bool {
    processed % config::broadcast::PROGRESS_EVERY == 0 || processed == total
}

#[derive(Debug)]
struct Running {
    progress: BroadcastProgress,
    token: CancellationToken,
}

/// The one broadcast slot of the process.
#[derive(Debug, Default)]
pub struct BroadcastTracker {
    running: Mutex<Option<Running>>,
}

impl BroadcastTracker {
    pub fn new() -> Self {
        Self::default()
    }

    fn slot(&self) -> MutexGuard<'_, Option<Running>> {
        self.running.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Claims the slot; `None` while another broadcast is running.
    pub fn try_start(&self, total: usize) -> Option<CancellationToken> {
        let mut slot = self.slot();
        if slot.is_some() {
            return None;
        }
        let token = CancellationToken::new();
        *slot = Some(Running {
            progress: BroadcastProgress::new(total, Utc::now()),
            token: token.clone(),
        });
        Some(token)
    }

    pub fn is_running(&self) -> bool {
        self.slot().is_some()
    }

    /// Counts one processed user and returns the updated counters.
    pub fn record(&self, delivered: bool) -> Option<BroadcastProgress> {
        let mut slot = self.slot();
        let running = slot.as_mut()?;
        running.progress.current += 1;
        if delivered {
            running.progress.success += 1;
        } else {
            running.progress.failed += 1;
        }
        Some(running.progress.clone())
    }

    pub fn snapshot(&self) -> Option<BroadcastProgress> {
        self.slot().as_ref().map(|r| r.progress.clone())
    }

    /// Returns `false` when nothing is running.
    pub fn cancel(&self) -> bool {
        match self.slot().as_ref() {
            Some(running) => {
                running.token.cancel();
                true
            }
            None => false,
        }
    }

    /// Releases the slot; the flag tells whether the run was cancelled.
    pub fn finish(&self) -> Option<(BroadcastProgress, bool)> {
        self.slot()
            .take()
            .map(|r| (r.progress, r.token.is_cancelled()))
    }
}

pub fn render_started(progress: &BroadcastProgress) -> String {
    format!(
        "📢 <b>Broadcast Started</b>\n\n\
         📊 <b>Total Users:</b> <code>{}</code>\n\
         ⏰ <b>Started:</b> <code>{}</code>\n\n\
         🔄 <b>Preparing to send...</b>\n\
         📤 <b>Progress:</b> <code>0%</code> (0/{})\n\
         ✅ <b>Successful:</b> <code>0</code>\n\
         ❌ <b>Failed:</b> <code>0</code>",
        progress.total,
        progress.started_at.format("%Y-%m-%d %H:%M:%S"),
        progress.total
    )
}

pub fn render_progress(progress: &BroadcastProgress, elapsed_secs: f64) -> String {
    let eta = progress
        .eta_secs(elapsed_secs)
        .map(format_minutes_seconds)
        .unwrap_or_else(|| "Calculating...".to_string());
    format!(
        "📢 <b>Broadcast in Progress</b>\n\n\
         📊 <b>Total Users:</b> <code>{total}</code>\n\
         ⏰ <b>Started:</b> <code>{started}</code>\n\
         ⏱️ <b>ETA:</b> <code>{eta}</code>\n\n\
         <code>[{bar}]</code>\n\
         📤 <b>Progress:</b> <code>{pct:.1}%</code> ({current}/{total})\n\
         ✅ <b>Successful:</b> <code>{success}</code>\n\
         ❌ <b>Failed:</b> <code>{failed}</code>\n\
         ⏳ <b>Remaining:</b> <code>{remaining}</code>",
        total = progress.total,
        started = progress.started_at.format("%H:%M:%S"),
        eta = eta,
        bar = progress_bar(progress.current, progress.total, config::broadcast::BAR_WIDTH),
        pct = percent(progress.current, progress.total),
        current = progress.current,
        success = progress.success,
        failed = progress.failed,
        remaining = progress.remaining(),
    )
}

pub fn render_summary(progress: &BroadcastProgress, cancelled: bool, duration_secs: u64) -> String {
    let headline = if cancelled {
        "🚫 <b>Broadcast Cancelled</b>"
    } else {
        "✅ <b>Broadcast Completed</b>"
    };
    format!(
        "{headline}\n\n\
         📊 <b>Total Users:</b> <code>{total}</code>\n\
         ⏰ <b>Duration:</b> <code>{duration}</code>\n\
         📈 <b>Success Rate:</b> <code>{rate:.1}%</code>\n\n\
         ✅ <b>Successful:</b> <code>{success}</code>\n\
         ❌ <b>Failed:</b> <code>{failed}</code>\n\
         📤 <b>Sent:</b> <code>{sent}</code>\n\
         ⏳ <b>Skipped:</b> <code>{skipped}</code>",
        headline = headline,
        total = progress.total,
        duration = format_minutes_seconds(duration_secs),
        rate = percent(progress.success, progress.total),
        success = progress.success,
        failed = progress.failed,
        sent = progress.current,
        skipped = progress.remaining(),
    )
}

pub fn render_status(progress: Option<&BroadcastProgress>) -> String {
    match progress {
        Some(p) => format!(
            "📢 <b>Broadcast Running</b>\n\n\
             📊 <b>Progress:</b> <code>{:.1}%</code> ({}/{})\n\
             ✅ <b>Successful:</b> <code>{}</code>\n\
             ❌ <b>Failed:</b> <code>{}</code>\n\
             ⏳ <b>Remaining:</b> <code>{}</code>\n\n\
             ⏰ <b>Started:</b> <code>{}</code>",
            percent(p.current, p.total),
            p.current,
            p.total,
            p.success,
            p.failed,
            p.remaining(),
            p.started_at.format("%H:%M:%S")
        ),
        None => "📢 <b>No active broadcast</b>\n\nThere is no broadcast currently running.".to_string(),
    }
}

pub const CANCELLED_TEXT: &str = "🚫 <b>Broadcast Cancelled</b>\n\n\
    The broadcast has been stopped. Some users may have already received the message.";

pub const NEW_BROADCAST_TEXT: &str = "📢 <b>New Broadcast</b>\n\n\
    Reply to a message with /broadcast to start a new broadcast.";

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use pretty_assertions::assert_eq;

    fn progress(total: usize, current: usize, success: usize) -> BroadcastProgress {
        BroadcastProgress {
            total,
            current,
            success,
            failed: current - success,
            started_at: Utc.with_ymd_and_hms(2025, 3, 1, 12, 0, 0).unwrap(),
        }
    }

    #[test]
    fn test_should_report() {
        assert!(!should_report(1, 25));
        assert!(should_report(10, 25));
        assert!(should_report(20, 25));
        assert!(should_report(25, 25));
        assert!(should_report(3, 3));
    }

    #[test]
    fn test_eta() {
        assert_eq!(progress(100, 0, 0).eta_secs(5.0), None);
        // 2s per user, 75 left
        assert_eq!(progress(100, 25, 25).eta_secs(50.0), Some(150));
        assert_eq!(progress(10, 10, 9).eta_secs(3.0), Some(0));
    }

    #[test]
    fn test_render_progress() {
        let text = render_progress(&progress(40, 10, 8), 20.0);
        assert!(text.contains("<code>[█████░░░░░░░░░░░░░░░]</code>"));
        assert!(text.contains("<code>25.0%</code> (10/40)"));
        assert!(text.contains("ETA:</b> <code>1m 0s</code>"));
        assert!(text.contains("Failed:</b> <code>2</code>"));
        assert!(text.contains("Remaining:</b> <code>30</code>"));
        assert!(text.contains("Started:</b> <code>12:00:00</code>"));
    }

    #[test]
    fn test_render_summary() {
        let text = render_summary(&progress(10, 4, 3), true, 125);
        assert!(text.starts_with("🚫 <b>Broadcast Cancelled</b>"));
        assert!(text.contains("Duration:</b> <code>2m 5s</code>"));
        assert!(text.contains("Success Rate:</b> <code>30.0%</code>"));
        assert!(text.contains("Sent:</b> <code>4</code>"));
        assert!(text.contains("Skipped:</b> <code>6</code>"));

        let done = render_summary(&progress(2, 2, 2), false, 1);
        assert!(done.starts_with("✅ <b>Broadcast Completed</b>"));
        assert!(done.contains("<code>100.0%</code>"));
    }

    #[test]
    fn test_render_status() {
        assert!(render_status(None).contains("No active broadcast"));
        let text = render_status(Some(&progress(8, 2, 1)));
        assert!(text.contains("<code>25.0%</code> (2/8)"));
    }

    #[test]
    fn test_tracker_single_slot() {
        let tracker = BroadcastTracker::new();
        assert!(!tracker.cancel());

        let token = tracker.try_start(3).unwrap();
        assert!(tracker.try_start(5).is_none());
        assert!(tracker.is_running());

        tracker.record(true);
        let p = tracker.record(false).unwrap();
        assert_eq!((p.current, p.success, p.failed), (2, 1, 1));

        assert!(tracker.cancel());
        assert!(token.is_cancelled());

        let (final_progress, cancelled) = tracker.finish().unwrap();
        assert!(cancelled);
        assert_eq!(final_progress.remaining(), 1);
        assert!(!tracker.is_running());
        assert!(tracker.record(true).is_none());
        assert!(tracker.try_start(1).is_some());
    }
}
