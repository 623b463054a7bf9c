//! Formatting and parsing helpers shared by the handlers.

use chrono::{DateTime, FixedOffset, NaiveDateTime, Offset, TimeDelta, Utc};

const IST_OFFSET_SECS: i32 = 5 * 3600 + 30 * 60;
const YEAR_SECS: u64 = 31_536_000;
const MONTH_SECS: u64 = 2_628_000;
const DAY_SECS: u64 = 86_400;

/// Formats an uptime as `"1y, 2m, 3d, 4h, 5min, 6s"`.
///
/// Years, months and days only appear when non-zero; hours, minutes and
/// seconds are always present.
///
/// # Example
///
/// ```
/// use filestore_bot::core::utils::format_uptime;
///
/// assert_eq!(format_uptime(3_725), "1h, 2min, 5s");
/// assert_eq!(format_uptime(90_061), "1d, 1h, 1min, 1s");
/// ```
pub fn format_uptime(total_secs: u64) -> String {
    let mut rest = total_secs;
    let years = rest / YEAR_SECS;
    rest %= YEAR_SECS;
    let months = rest / MONTH_SECS;
    rest %= MONTH_SECS;
    let days = rest / DAY_SECS;
    rest %= DAY_SECS;
    let hours = rest / 3600;
    rest %= 3600;
    let minutes = rest / 60;
    let seconds = rest % 60;

    let mut parts = Vec::with_capacity(6);
    if years >= 1 {
        parts.push(format!("{}y", years));
    }
    if months >= 1 {
        parts.push(format!("{}m", months));
    }
    if days >= 1 {
        parts.push(format!("{}d", days));
    }
    parts.push(format!("{}h", hours));
    parts.push(format!("{}min", minutes));
    parts.push(format!("{}s", seconds));

    parts.join(", ")
}

/// Formats a short duration as `"Xm Ys"` (broadcast ETA and duration).
pub fn format_minutes_seconds(total_secs: u64) -> String {
    format!("{}m {}s", total_secs / 60, total_secs % 60)
}

/// Parses an admin role duration such as `5min`, `6h`, `2d`, `1y` or `3m`.
///
/// `y` is 365 days and `m` is 30 days. Whitespace and case are ignored.
/// Returns `None` for anything else, including zero or negative amounts.
///
/// # Example
///
/// ```
/// use chrono::TimeDelta;
/// use filestore_bot::core::utils::parse_duration;
///
/// assert_eq!(parse_duration("6h"), Some(TimeDelta::hours(6)));
/// assert_eq!(parse_duration("5 MIN"), Some(TimeDelta::minutes(5)));
/// assert_eq!(parse_duration("soon"), None);
/// ```
pub fn parse_duration(raw: &str) -> Option<TimeDelta> {
    let s: String = raw.chars().filter(|c| !c.is_whitespace()).collect::<String>().to_lowercase();

    // "min" must be checked before "m" (months)
    let (amount, unit) = if let Some(n) = s.strip_suffix("min") {
        (n, "min")
    } else {
        let split = s.len().checked_sub(1)?;
        if !s.is_char_boundary(split) {
            return None;
        }
        s.split_at(split)
    };

    let amount: i64 = amount.parse().ok()?;
    if amount <= 0 {
        return None;
    }

    match unit {
        "min" => TimeDelta::try_minutes(amount),
        "h" => TimeDelta::try_hours(amount),
        "d" => TimeDelta::try_days(amount),
        "y" => TimeDelta::try_days(amount.checked_mul(365)?),
        "m" => TimeDelta::try_days(amount.checked_mul(30)?),
        _ => None,
    }
}

fn ist_offset() -> FixedOffset {
    FixedOffset::east_opt(IST_OFFSET_SECS).unwrap_or_else(|| Utc.fix())
}

/// Formats a UTC timestamp in Indian Standard Time: `"05-01-2025 03:30 PM IST"`.
pub fn format_ist(dt: DateTime<Utc>) -> String {
    dt.with_timezone(&ist_offset()).format("%d-%m-%Y %I:%M %p IST").to_string()
}

/// Parses a stored timestamp.
///
/// Accepts RFC 3339 (what this crate writes) and naive ISO-8601 without an
/// offset, which older files contain; naive values are taken as UTC.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
        .map(|naive| naive.and_utc())
}

/// Remaining time as `"{h}h {m}m"`, clamped at zero.
pub fn format_hours_minutes(remaining: TimeDelta) -> String {
    let secs = remaining.num_seconds().max(0);
    format!("{}h {}m", secs / 3600, (secs % 3600) / 60)
}

/// Renders a fixed-width progress bar using `█` and `░`.
///
/// # Example
///
/// ```
/// use filestore_bot::core::utils::progress_bar;
///
/// assert_eq!(progress_bar(5, 10, 10), "█████░░░░░");
/// ```
pub fn progress_bar(current: usize, total: usize, width: usize) -> String {
    let filled = if total == 0 {
        0
    } else {
        (width * current.min(total)) / total
    };
    format!("{}{}", "█".repeat(filled), "░".repeat(width - filled))
}

/// Percentage with one decimal, 0 when `total` is 0.
pub fn percent(part: usize, total: usize) -> f64 {
    if total == 0 {
        0.0
    } else {
        part as f64 * 100.0 / total as f64
    }
}

/// HTML mention of a Telegram user.
pub fn mention_html(user_id: i64, name: &str) -> String {
    format!(
        "<a href=\"tg://user?id={}\">{}</a>",
        user_id,
        teloxide::utils::html::escape(name)
    )
}

/// Replaces the `{mention}` placeholder of a configurable text.
pub fn render_mention_template(template: &str, mention: &str) -> String {
    template.replace("{mention}", mention)
}

/// Makes `settings_start_text`-style keys readable: `start_image` → `Start Image`.
pub fn humanize_key(key: &str) -> String {
    key.split('_')
        .filter(|w| !w.is_empty())
        .map(|w| {
            let mut chars = w.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Truncates a message to Telegram's limits, keeping the tail marker visible.
pub fn truncate_message(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let truncated: String = text.chars().take(max_chars.saturating_sub(20)).collect();
    format!("{}\n\n... (truncated)", truncated)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_format_uptime_always_shows_hms() {
        assert_eq!(format_uptime(0), "0h, 0min, 0s");
        assert_eq!(format_uptime(59), "0h, 0min, 59s");
    }

    #[test]
    fn test_format_uptime_with_long_units() {
        let secs = YEAR_SECS + 2 * MONTH_SECS + 3 * DAY_SECS + 4 * 3600 + 5 * 60 + 6;
        assert_eq!(format_uptime(secs), "1y, 2m, 3d, 4h, 5min, 6s");
    }

    #[test]
    fn test_format_uptime_skips_zero_months() {
        assert_eq!(format_uptime(YEAR_SECS + 10), "1y, 0h, 0min, 10s");
    }

    #[test]
    fn test_format_minutes_seconds() {
        assert_eq!(format_minutes_seconds(125), "2m 5s");
        assert_eq!(format_minutes_seconds(0), "0m 0s");
    }

    #[test]
    fn test_parse_duration_units() {
        assert_eq!(parse_duration("5min"), Some(TimeDelta::minutes(5)));
        assert_eq!(parse_duration("6h"), Some(TimeDelta::hours(6)));
        assert_eq!(parse_duration("2d"), Some(TimeDelta::days(2)));
        assert_eq!(parse_duration("1y"), Some(TimeDelta::days(365)));
        assert_eq!(parse_duration("3m"), Some(TimeDelta::days(90)));
    }

    #[test]
    fn test_parse_duration_rejects_invalid() {
        assert_eq!(parse_duration(""), None);
        assert_eq!(parse_duration("h"), None);
        assert_eq!(parse_duration("0d"), None);
        assert_eq!(parse_duration("-1d"), None);
        assert_eq!(parse_duration("5w"), None);
        assert_eq!(parse_duration("abc"), None);
        assert_eq!(parse_duration("5мин"), None);
    }

    #[test]
    fn test_parse_duration_ignores_case_and_spaces() {
        assert_eq!(parse_duration(" 12 H "), Some(TimeDelta::hours(12)));
    }

    #[test]
    fn test_format_ist() {
        let dt = Utc.with_ymd_and_hms(2025, 1, 5, 10, 0, 0).unwrap();
        assert_eq!(format_ist(dt), "05-01-2025 03:30 PM IST");
    }

    #[test]
    fn test_parse_timestamp_formats() {
        let expected = Utc.with_ymd_and_hms(2025, 3, 1, 12, 30, 0).unwrap();
        assert_eq!(parse_timestamp("2025-03-01T12:30:00+00:00"), Some(expected));
        assert_eq!(parse_timestamp("2025-03-01T12:30:00"), Some(expected));
        assert_eq!(parse_timestamp("2025-03-01T12:30:00.000000"), Some(expected));
        assert_eq!(parse_timestamp("yesterday"), None);
    }

    #[test]
    fn test_format_hours_minutes() {
        assert_eq!(format_hours_minutes(TimeDelta::minutes(135)), "2h 15m");
        assert_eq!(format_hours_minutes(TimeDelta::minutes(-5)), "0h 0m");
    }

    #[test]
    fn test_progress_bar_bounds() {
        assert_eq!(progress_bar(0, 10, 4), "░░░░");
        assert_eq!(progress_bar(10, 10, 4), "████");
        assert_eq!(progress_bar(20, 10, 4), "████");
        assert_eq!(progress_bar(3, 0, 4), "░░░░");
        assert_eq!(progress_bar(1, 3, 20).chars().count(), 20);
    }

    #[test]
    fn test_percent() {
        assert_eq!(percent(1, 4), 25.0);
        assert_eq!(percent(5, 0), 0.0);
    }

    #[test]
    fn test_mention_html_escapes_name() {
        assert_eq!(
            mention_html(42, "<Bob & Co>"),
            "<a href=\"tg://user?id=42\">&lt;Bob &amp; Co&gt;</a>"
        );
    }

    #[test]
    fn test_render_mention_template() {
        assert_eq!(
            render_mention_template("Hi {mention} welcome", "<b>x</b>"),
            "Hi <b>x</b> welcome"
        );
        assert_eq!(render_mention_template("no placeholder", "x"), "no placeholder");
    }

    #[test]
    fn test_humanize_key() {
        assert_eq!(humanize_key("start_image"), "Start Image");
        assert_eq!(humanize_key("help_text"), "Help Text");
    }

    #[test]
    fn test_truncate_message() {
        assert_eq!(truncate_message("short", 100), "short");
        let long = "a".repeat(200);
        let out = truncate_message(&long, 100);
        assert!(out.ends_with("(truncated)"));
        assert!(out.chars().count() <= 100);
    }
}
