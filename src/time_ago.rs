use chrono::DateTime;

const MINUTE: i128 = 60;
const HOUR: i128 = 60 * MINUTE;
const DAY: i128 = 24 * HOUR;
const MONTH: i128 = 30 * DAY;

/// Coarse relative time for a message timestamp, e.g. `"5m ago"`.
///
/// Anything thirty days or older falls back to a `M/D/YYYY` calendar date
/// (UTC). Timestamps ahead of `now_secs` read as `"just now"`.
pub fn time_ago(timestamp_secs: u64, now_secs: u64) -> String {
    // Both operands fit in i128 for every u64 input.
    let delta = i128::from(now_secs) - i128::from(timestamp_secs);

    if delta < MINUTE {
        "just now".to_string()
    } else if delta < HOUR {
        format!("{}m ago", delta / MINUTE)
    } else if delta < DAY {
        format!("{}h ago", delta / HOUR)
    } else if delta < MONTH {
        format!("{}d ago", delta / DAY)
    } else {
        calendar_date(timestamp_secs)
    }
}

fn calendar_date(timestamp_secs: u64) -> String {
    i64::try_from(timestamp_secs)
        .ok()
        .and_then(|secs| DateTime::from_timestamp(secs, 0))
        .map(|date| date.format("%-m/%-d/%Y").to_string())
        .unwrap_or_else(|| timestamp_secs.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    const NOW: u64 = 1_760_000_000;

    #[test]
    fn test_just_now() {
        assert_eq!(time_ago(NOW - 10, NOW), "just now");
        assert_eq!(time_ago(NOW - 59, NOW), "just now");
    }

    #[test]
    fn test_minutes() {
        assert_eq!(time_ago(NOW - 60, NOW), "1m ago");
        assert_eq!(time_ago(NOW - 120, NOW), "2m ago");
        assert_eq!(time_ago(NOW - 3599, NOW), "59m ago");
    }

    #[test]
    fn test_hours() {
        assert_eq!(time_ago(NOW - 7200, NOW), "2h ago");
        assert_eq!(time_ago(NOW - 86_399, NOW), "23h ago");
    }

    #[test]
    fn test_days() {
        assert_eq!(time_ago(NOW - 172_800, NOW), "2d ago");
        assert_eq!(time_ago(NOW - 2_591_999, NOW), "29d ago");
    }

    #[test]
    fn test_old_timestamps_render_a_date() {
        let rendered = time_ago(NOW - 2_592_001, NOW);
        assert!(!rendered.ends_with("ago"));
        assert_eq!(rendered.matches('/').count(), 2);

        // 2024-01-05T12:00:00Z
        assert_eq!(time_ago(1_704_456_000, NOW), "1/5/2024");
    }

    #[test]
    fn test_future_timestamp_reads_just_now() {
        assert_eq!(time_ago(NOW + 3600, NOW), "just now");
    }

    #[test]
    fn test_extreme_timestamps_do_not_overflow() {
        assert_eq!(time_ago(1 << 63, NOW), "just now");
        assert_eq!(time_ago(u64::MAX, 0), "just now");
        assert_eq!(time_ago(0, u64::MAX), "1/1/1970");
    }
}
