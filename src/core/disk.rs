//! Disk usage of the data directory, as reported by `/stats`

use crate::core::error::{AppError, AppResult};
use std::path::Path;

const MIB: u64 = 1024 * 1024;

/// Result of a disk usage check
#[derive(Debug, Clone, PartialEq)]
pub struct DiskSpaceInfo {
    /// Available space in bytes
    pub available_bytes: u64,
    /// Total space in bytes
    pub total_bytes: u64,
    /// Path that was checked
    pub path: String,
}

impl DiskSpaceInfo {
    pub fn used_bytes(&self) -> u64 {
        self.total_bytes.saturating_sub(self.available_bytes)
    }

    pub fn used_mb(&self) -> u64 {
        self.used_bytes() / MIB
    }

    pub fn total_mb(&self) -> u64 {
        self.total_bytes / MIB
    }

    /// Used percentage (0-100)
    pub fn used_percent(&self) -> f64 {
        if self.total_bytes == 0 {
            0.0
        } else {
            (self.used_bytes() as f64 / self.total_bytes as f64) * 100.0
        }
    }
}

/// Parses the output of `df -k <path>`.
///
/// df output: `Filesystem 1K-blocks Used Available Use% Mounted`
pub fn parse_df_output(stdout: &str, path: &str) -> AppResult<DiskSpaceInfo> {
    // Skip header line; long device names may wrap the data onto a third line
    let data: Vec<&str> = stdout.lines().skip(1).flat_map(str::split_whitespace).collect();
    if data.len() < 4 {
        return Err(AppError::Process("Unexpected df output format".to_string()));
    }

    let total_kb: u64 = data[1]
        .parse()
        .map_err(|_| AppError::Process("Failed to parse total blocks".to_string()))?;
    let available_kb: u64 = data[3]
        .parse()
        .map_err(|_| AppError::Process("Failed to parse available blocks".to_string()))?;

    Ok(DiskSpaceInfo {
        available_bytes: available_kb * 1024,
        total_bytes: total_kb * 1024,
        path: path.to_string(),
    })
}

/// Get disk space information for a path using the df command.
pub async fn get_disk_space(path: &Path) -> AppResult<DiskSpaceInfo> {
    let check_path = if path.exists() {
        path.to_path_buf()
    } else {
        // If the path doesn't exist, use its parent directory
        path.parent()
            .filter(|p| !p.as_os_str().is_empty())
            .map(Path::to_path_buf)
            .unwrap_or_else(|| Path::new("/").to_path_buf())
    };
    let check_path = check_path.to_string_lossy().to_string();

    let output = tokio::process::Command::new("df")
        .args(["-k", &check_path])
        .output()
        .await
        .map_err(|e| AppError::Process(format!("Failed to run df command: {}", e)))?;

    if !output.status.success() {
        return Err(AppError::Process(format!(
            "df command failed for {}: {}",
            check_path,
            String::from_utf8_lossy(&output.stderr)
        )));
    }

    parse_df_output(&String::from_utf8_lossy(&output.stdout), &check_path)
}

#[cfg(test)]
mod tests {
    use super::*;

    const DF_SAMPLE: &str = "Filesystem     1K-blocks     Used Available Use% Mounted on\n\
                             /dev/sda1       10485760  7340032   3145728  70% /\n";

    #[test]
    fn test_parse_df_output() {
        let info = parse_df_output(DF_SAMPLE, "/").unwrap();
        assert_eq!(info.total_mb(), 10 * 1024);
        assert_eq!(info.used_mb(), 7 * 1024);
        assert!((info.used_percent() - 70.0).abs() < 0.01);
    }

    #[test]
    fn test_parse_df_output_wrapped_line() {
        let wrapped = "Filesystem 1K-blocks Used Available Use% Mounted on\n\
                       /dev/mapper/very-long-volume-name\n\
                       2048 1024 1024 50% /data\n";
        let info = parse_df_output(wrapped, "/data").unwrap();
        assert_eq!(info.total_bytes, 2048 * 1024);
        assert_eq!(info.available_bytes, 1024 * 1024);
    }

    #[test]
    fn test_parse_df_output_rejects_garbage() {
        assert!(parse_df_output("Filesystem\n", "/").is_err());
        assert!(parse_df_output("h\nfs x y z\n", "/").is_err());
    }

    #[test]
    fn test_used_percent_zero_total() {
        let info = DiskSpaceInfo {
            available_bytes: 0,
            total_bytes: 0,
            path: "/".to_string(),
        };
        assert_eq!(info.used_percent(), 0.0);
    }

    #[tokio::test]
    async fn test_get_disk_space_tmp() {
        let info = get_disk_space(Path::new("/tmp")).await.unwrap();
        assert!(info.total_bytes > 0);
        assert!(info.used_percent() <= 100.0);
    }
}
