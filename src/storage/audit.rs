//! `admin_logs.txt`: append-only record of promotions, demotions and expiries

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

use crate::core::error::AppResult;

#[derive(Debug)]
pub struct AdminLog {
    path: PathBuf,
    lock: Mutex<()>,
}

/// `"<iso UTC> UTC • <event>"`
pub fn format_entry(at: DateTime<Utc>, event: &str) -> String {
    format!("{} UTC • {}", at.format("%Y-%m-%dT%H:%M:%S%.6f"), event)
}

impl AdminLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn append(&self, event: &str) -> AppResult<()> {
        let line = format!("{}\n", format_entry(Utc::now(), event));
        let _guard = self.lock.lock().await;
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;
        file.write_all(line.as_bytes()).await?;
        file.flush().await?;
        Ok(())
    }

    /// Appends and only logs failures; the audit trail never blocks an admin action.
    pub async fn record(&self, event: &str) {
        if let Err(e) = self.append(event).await {
            log::warn!("Failed to write admin log entry '{}': {}", event, e);
        }
    }

    /// Last `n` lines; empty when the file does not exist.
    pub async fn tail(&self, n: usize) -> Vec<String> {
        let content = match tokio::fs::read_to_string(&self.path).await {
            Ok(content) => content,
            Err(_) => return Vec::new(),
        };
        let lines: Vec<&str> = content.lines().filter(|l| !l.trim().is_empty()).collect();
        let start = lines.len().saturating_sub(n);
        lines[start..].iter().map(|l| l.to_string()).collect()
    }
}
