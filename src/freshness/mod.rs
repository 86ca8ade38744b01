use chrono::{DateTime, Utc};
use std::time::Duration;

/// Time-to-live shared by the connection and profile collections
pub const DEFAULT_TTL: Duration = Duration::from_secs(5 * 60);

/// Decide whether a refresh should hit the network.
///
/// True when forced, when nothing was ever fetched, or when at least `ttl`
/// has passed since `last_fetched`. A `last_fetched` later than `now` counts
/// as fresh.
pub fn should_fetch(
    last_fetched: Option<DateTime<Utc>>,
    ttl: Duration,
    force: bool,
    now: DateTime<Utc>,
) -> bool {
    if force {
        return true;
    }

    let Some(last_fetched) = last_fetched else {
        return true;
    };

    let elapsed = now
        .signed_duration_since(last_fetched)
        .to_std()
        .unwrap_or(Duration::ZERO);
    elapsed >= ttl
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeDelta;

    #[test]
    fn test_never_fetched() {
        assert!(should_fetch(None, DEFAULT_TTL, false, Utc::now()));
    }

    #[test]
    fn test_within_ttl_is_skipped() {
        let now = Utc::now();
        let last = now - TimeDelta::minutes(4);
        assert!(!should_fetch(Some(last), DEFAULT_TTL, false, now));
        assert!(should_fetch(Some(last), DEFAULT_TTL, true, now));
    }

    #[test]
    fn test_boundary_is_stale() {
        let now = Utc::now();
        let last = now - TimeDelta::minutes(5);
        assert!(should_fetch(Some(last), DEFAULT_TTL, false, now));
    }

    #[test]
    fn test_future_timestamp_is_fresh() {
        let now = Utc::now();
        let last = now + TimeDelta::minutes(10);
        assert!(!should_fetch(Some(last), DEFAULT_TTL, false, now));
    }

    #[test]
    fn test_zero_ttl_always_fetches() {
        let now = Utc::now();
        assert!(should_fetch(Some(now), Duration::ZERO, false, now));
    }
}
