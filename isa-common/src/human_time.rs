//! Human-readable elapsed time for session pickers and feeds

use chrono::{DateTime, Utc};

/// Format the time elapsed since `since` as `"3h 12m ago"` or `"5m ago"`.
///
/// Timestamps in the future (clock skew between device and backend) are
/// clamped to `"0m ago"`.
///
/// # Examples
///
/// ```
/// use chrono::{Duration, Utc};
/// use isa_common::human_time::time_ago;
///
/// let now = Utc::now();
/// assert_eq!(time_ago(now - Duration::minutes(5), now), "5m ago");
/// assert_eq!(time_ago(now - Duration::minutes(192), now), "3h 12m ago");
/// ```
pub fn time_ago(since: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let elapsed = (now - since).num_seconds().max(0);
    let hours = elapsed / 3600;
    let minutes = (elapsed % 3600) / 60;

    if hours > 0 {
        format!("{}h {}m ago", hours, minutes)
    } else {
        format!("{}m ago", minutes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_minutes_only() {
        let now = Utc::now();
        assert_eq!(time_ago(now - Duration::seconds(59), now), "0m ago");
        assert_eq!(time_ago(now - Duration::minutes(45), now), "45m ago");
    }

    #[test]
    fn test_hours_and_minutes() {
        let now = Utc::now();
        assert_eq!(time_ago(now - Duration::hours(1), now), "1h 0m ago");
        assert_eq!(time_ago(now - Duration::hours(26) - Duration::minutes(3), now), "26h 3m ago");
    }

    #[test]
    fn test_future_is_clamped() {
        let now = Utc::now();
        assert_eq!(time_ago(now + Duration::minutes(10), now), "0m ago");
    }
}
