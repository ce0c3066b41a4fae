//! Deadline arithmetic.  Every stored deadline is a Unix timestamp in seconds.

use std::time::Duration;

pub fn now() -> i64 {
    chrono::Utc::now().timestamp()
}

/// Time left before `deadline`, or `None` once it has passed.
pub fn remaining(deadline: i64, now: i64) -> Option<Duration> {
    (now < deadline).then(|| Duration::from_secs((deadline - now).unsigned_abs()))
}

pub fn is_ready(deadline: i64, now: i64) -> bool {
    remaining(deadline, now).is_none()
}

/// Format a duration as e.g. `1h 5m 3s`.
pub fn human_duration(duration: Duration) -> String {
    let secs = duration.as_secs();
    let (h, m, s) = (secs / 3600, (secs / 60) % 60, secs % 60);
    match (h, m) {
        (0, 0) => format!("{}s", s),
        (0, _) => format!("{}m {}s", m, s),
        _ => format!("{}h {}m {}s", h, m, s),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_before_deadline_accepts_after() {
        assert_eq!(remaining(100, 40), Some(Duration::from_secs(60)));
        assert!(!is_ready(100, 99));
        assert!(is_ready(100, 100));
        assert!(is_ready(100, 250));
    }

    #[test]
    fn formats_durations() {
        assert_eq!(human_duration(Duration::from_secs(42)), "42s");
        assert_eq!(human_duration(Duration::from_secs(125)), "2m 5s");
        assert_eq!(human_duration(Duration::from_secs(3903)), "1h 5m 3s");
    }
}
