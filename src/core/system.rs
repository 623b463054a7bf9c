//! Host statistics for `/stats`, `/ping` and `/alive`
//!
//! Everything is read from procfs; on hosts without it the values come back
//! as `None` and are rendered as "N/A".

use std::time::Instant;

use once_cell::sync::Lazy;

use crate::core::config;

static STARTED_AT: Lazy<Instant> = Lazy::new(Instant::now);

const CHART_BLOCKS: [char; 8] = ['▁', '▂', '▃', '▄', '▅', '▆', '▇', '█'];

/// Pins the start instant. Called once from main before the dispatcher starts.
pub fn mark_started() {
    Lazy::force(&STARTED_AT);
}

/// Seconds since [`mark_started`].
pub fn uptime_secs() -> u64 {
    STARTED_AT.elapsed().as_secs()
}

/// RAM used and total, in MB
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemoryInfo {
    pub used_mb: u64,
    pub total_mb: u64,
}

/// Parses `/proc/meminfo`. Used memory is `MemTotal - MemAvailable`.
pub fn parse_meminfo(content: &str) -> Option<MemoryInfo> {
    let field = |name: &str| -> Option<u64> {
        content
            .lines()
            .find(|line| line.starts_with(name))
            .and_then(|line| line.split_whitespace().nth(1))
            .and_then(|kb| kb.parse().ok())
    };
    let total_kb = field("MemTotal:")?;
    let available_kb = field("MemAvailable:").or_else(|| field("MemFree:"))?;
    Some(MemoryInfo {
        used_mb: total_kb.saturating_sub(available_kb) / 1024,
        total_mb: total_kb / 1024,
    })
}

/// Parses the resident set size (MB) out of `/proc/self/status`.
pub fn parse_vm_rss(content: &str) -> Option<u64> {
    content
        .lines()
        .find(|line| line.starts_with("VmRSS:"))
        .and_then(|line| line.split_whitespace().nth(1))
        .and_then(|kb| kb.parse::<u64>().ok())
        .map(|kb| kb / 1024)
}

pub async fn memory_info() -> Option<MemoryInfo> {
    let content = tokio::fs::read_to_string("/proc/meminfo").await.ok()?;
    parse_meminfo(&content)
}

pub async fn process_rss_mb() -> Option<u64> {
    let content = tokio::fs::read_to_string("/proc/self/status").await.ok()?;
    parse_vm_rss(&content)
}

/// Aggregate CPU counters from the first line of `/proc/stat`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CpuTimes {
    pub idle: u64,
    pub total: u64,
}

pub fn parse_proc_stat(content: &str) -> Option<CpuTimes> {
    let line = content.lines().find(|l| l.starts_with("cpu "))?;
    let values: Vec<u64> = line
        .split_whitespace()
        .skip(1)
        .filter_map(|v| v.parse().ok())
        .collect();
    if values.len() < 4 {
        return None;
    }
    // idle + iowait
    let idle = values[3] + values.get(4).copied().unwrap_or(0);
    Some(CpuTimes {
        idle,
        total: values.iter().sum(),
    })
}

/// Busy percentage between two readings, clamped to 0..=100.
pub fn cpu_usage(prev: CpuTimes, next: CpuTimes) -> Option<u8> {
    let total = next.total.checked_sub(prev.total)?;
    let idle = next.idle.checked_sub(prev.idle)?;
    if total == 0 {
        return None;
    }
    let busy = total.saturating_sub(idle) * 100 / total;
    Some(busy.min(100) as u8)
}

async fn read_cpu_times() -> Option<CpuTimes> {
    let content = tokio::fs::read_to_string("/proc/stat").await.ok()?;
    parse_proc_stat(&content)
}

/// Takes [`config::system::CPU_SAMPLES`] usage samples, one per interval.
pub async fn sample_cpu() -> Vec<Option<u8>> {
    let mut samples = Vec::with_capacity(config::system::CPU_SAMPLES);
    let mut prev = read_cpu_times().await;
    for _ in 0..config::system::CPU_SAMPLES {
        tokio::time::sleep(config::system::cpu_sample_interval()).await;
        let next = read_cpu_times().await;
        let sample = match (prev, next) {
            (Some(p), Some(n)) => cpu_usage(p, n),
            _ => None,
        };
        samples.push(sample);
        prev = next;
    }
    samples
}

/// Renders samples as `"12% → 40% → N/A"` and a block chart such as `"▁▂·"`.
///
/// # Example
///
/// ```
/// use filestore_bot::core::system::samples_to_chart;
///
/// let (numbers, chart) = samples_to_chart(&[Some(0), Some(100), None]);
/// assert_eq!(numbers, "0% → 100% → N/A");
/// assert_eq!(chart, "▁█·");
/// ```
pub fn samples_to_chart(samples: &[Option<u8>]) -> (String, String) {
    let numbers = samples
        .iter()
        .map(|s| match s {
            Some(v) => format!("{}%", v),
            None => "N/A".to_string(),
        })
        .collect::<Vec<_>>()
        .join(" → ");

    let chart = samples
        .iter()
        .map(|s| match s {
            Some(v) => CHART_BLOCKS[(usize::from(*v) * 7 / 100).min(7)],
            None => '·',
        })
        .collect();

    (numbers, chart)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_parse_meminfo() {
        let content = "MemTotal:        8192000 kB\nMemFree:          100000 kB\nMemAvailable:    4096000 kB\n";
        assert_eq!(
            parse_meminfo(content),
            Some(MemoryInfo {
                used_mb: 4000,
                total_mb: 8000
            })
        );
    }

    #[test]
    fn test_parse_meminfo_without_available() {
        let content = "MemTotal: 2048 kB\nMemFree: 1024 kB\n";
        assert_eq!(
            parse_meminfo(content),
            Some(MemoryInfo {
                used_mb: 1,
                total_mb: 2
            })
        );
        assert_eq!(parse_meminfo("garbage"), None);
    }

    #[test]
    fn test_parse_vm_rss() {
        let content = "Name:\tfilestore-bot\nVmRSS:\t   51200 kB\nThreads:\t8\n";
        assert_eq!(parse_vm_rss(content), Some(50));
        assert_eq!(parse_vm_rss("Name: x\n"), None);
    }

    #[test]
    fn test_parse_proc_stat_and_usage() {
        let a = parse_proc_stat("cpu  100 0 100 700 100 0 0 0 0 0\ncpu0 1 2 3 4\n").unwrap();
        assert_eq!(a, CpuTimes { idle: 800, total: 1000 });
        let b = parse_proc_stat("cpu  150 0 150 800 100 0 0 0 0 0\n").unwrap();
        // 200 ticks elapsed, 100 idle
        assert_eq!(cpu_usage(a, b), Some(50));
    }

    #[test]
    fn test_cpu_usage_no_progress() {
        let t = CpuTimes { idle: 1, total: 2 };
        assert_eq!(cpu_usage(t, t), None);
    }

    #[test]
    fn test_samples_to_chart_block_index() {
        let samples = [Some(13), Some(14), Some(50), Some(99)];
        let (numbers, chart) = samples_to_chart(&samples);
        assert_eq!(numbers, "13% → 14% → 50% → 99%");
        // 13*7/100 = 0, 14*7/100 = 0, 50*7/100 = 3, 99*7/100 = 6
        assert_eq!(chart, "▁▁▄▇");
    }

    #[test]
    fn test_samples_to_chart_empty() {
        assert_eq!(samples_to_chart(&[]), (String::new(), String::new()));
    }

    #[test]
    fn test_uptime_is_monotonic() {
        mark_started();
        let first = uptime_secs();
        assert!(uptime_secs() >= first);
    }
}
