//! Process execution utilities with timeout support
//!
//! Used by `/update` (git pull) and `/restart` (re-executing the bot binary).

use std::process::Output;
use std::time::Duration;
use tokio::process::Command;

use crate::core::error::{AppError, AppResult};

/// Default timeout for `git pull`
pub const GIT_PULL_TIMEOUT: Duration = Duration::from_secs(120);

/// Run an async Command with a timeout.
///
/// Returns the process Output on success, or an AppError on timeout/IO failure.
pub async fn run_with_timeout(cmd: &mut Command, timeout: Duration) -> AppResult<Output> {
    match tokio::time::timeout(timeout, cmd.output()).await {
        Ok(Ok(output)) => Ok(output),
        Ok(Err(e)) => Err(AppError::Io(e)),
        Err(_) => Err(AppError::Process(format!(
            "Process timed out after {}s",
            timeout.as_secs()
        ))),
    }
}

/// Outcome of `git pull` in the working directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PullOutcome {
    UpToDate,
    Updated(String),
    Failed(String),
}

/// Classifies the result of `git pull`.
pub fn classify_pull(success: bool, stdout: &str, stderr: &str) -> PullOutcome {
    if !success {
        return PullOutcome::Failed(stderr.trim().to_string());
    }
    let changes = stdout.trim();
    if changes.is_empty() || changes.contains("Already up to date") || changes.contains("Already up-to-date") {
        PullOutcome::UpToDate
    } else {
        PullOutcome::Updated(changes.to_string())
    }
}

/// Runs `git pull` in the current directory.
pub async fn git_pull() -> AppResult<PullOutcome> {
    let output = run_with_timeout(Command::new("git").arg("pull"), GIT_PULL_TIMEOUT).await?;
    Ok(classify_pull(
        output.status.success(),
        &String::from_utf8_lossy(&output.stdout),
        &String::from_utf8_lossy(&output.stderr),
    ))
}

/// Replaces the current process with a fresh copy of itself, same arguments.
///
/// Only returns on failure.
#[cfg(unix)]
pub fn reexec() -> AppError {
    use std::os::unix::process::CommandExt;

    let exe = match std::env::current_exe() {
        Ok(exe) => exe,
        Err(e) => return AppError::Io(e),
    };
    let args: Vec<String> = std::env::args().skip(1).collect();
    log::info!("♻️ Re-executing {} {:?}", exe.display(), args);
    AppError::Io(std::process::Command::new(exe).args(args).exec())
}

#[cfg(not(unix))]
pub fn reexec() -> AppError {
    AppError::Process("In-place restart is only supported on unix".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_pull() {
        assert_eq!(classify_pull(true, "Already up to date.\n", ""), PullOutcome::UpToDate);
        assert_eq!(classify_pull(true, "", ""), PullOutcome::UpToDate);
        assert_eq!(
            classify_pull(true, "Fast-forward\n src/main.rs | 2 +-\n", ""),
            PullOutcome::Updated("Fast-forward\n src/main.rs | 2 +-".to_string())
        );
        assert_eq!(
            classify_pull(false, "", "fatal: not a git repository\n"),
            PullOutcome::Failed("fatal: not a git repository".to_string())
        );
    }

    #[tokio::test]
    async fn test_run_with_timeout_success() {
        let output = run_with_timeout(Command::new("echo").arg("hi"), Duration::from_secs(5))
            .await
            .unwrap();
        assert!(output.status.success());
        assert_eq!(String::from_utf8_lossy(&output.stdout).trim(), "hi");
    }

    #[tokio::test]
    async fn test_run_with_timeout_expires() {
        let result = run_with_timeout(Command::new("sleep").arg("5"), Duration::from_millis(100)).await;
        assert!(matches!(result, Err(AppError::Process(_))));
    }
}
