//! Template filters registered on the view environment at startup.

use time::OffsetDateTime;
use weblog_orm::now_timestamp;

/// Relative-time rendering for `created_at` timestamps, registered as the
/// `datetime` filter.
pub fn datetime(value: f64) -> String {
    relative(value, now_timestamp())
}

fn relative(value: f64, now: f64) -> String {
    let delta = (now - value).max(0.0) as u64;
    if delta < 60 {
        return "1 minute ago".to_string();
    }
    if delta < 3600 {
        return format!("{} minutes ago", delta / 60);
    }
    if delta < 86400 {
        return format!("{} hours ago", delta / 3600);
    }
    if delta < 604800 {
        return format!("{} days ago", delta / 86400);
    }
    match OffsetDateTime::from_unix_timestamp(value as i64) {
        Ok(dt) => format!("{} {}, {}", dt.month(), dt.day(), dt.year()),
        Err(_) => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recent_times_are_relative() {
        let now = 1_700_000_000.0;
        assert_eq!(relative(now - 30.0, now), "1 minute ago");
        assert_eq!(relative(now - 180.0, now), "3 minutes ago");
        assert_eq!(relative(now - 7200.0, now), "2 hours ago");
        assert_eq!(relative(now - 172_800.0, now), "2 days ago");
    }

    #[test]
    fn old_times_are_dates() {
        // 2021-01-01T00:00:00Z
        let rendered = relative(1_609_459_200.0, 1_700_000_000.0);
        assert_eq!(rendered, "January 1, 2021");
    }

    #[test]
    fn future_times_do_not_underflow() {
        let now = 1_700_000_000.0;
        assert_eq!(relative(now + 500.0, now), "1 minute ago");
    }
}
