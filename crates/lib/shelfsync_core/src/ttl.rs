//! TTL arithmetic shared by both caches.

use chrono::{DateTime, TimeDelta, Utc};

/// An entry is fresh while `refreshed_at` is strictly newer than `now - ttl`.
pub fn is_fresh(refreshed_at: DateTime<Utc>, now: DateTime<Utc>, ttl: TimeDelta) -> bool {
    refreshed_at > now - ttl
}

/// Rows refreshed before the returned instant are past `ttl`.
pub fn expiry_cutoff(now: DateTime<Utc>, ttl: TimeDelta) -> DateTime<Utc> {
    now - ttl
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn product_ttl_boundary() {
        let now = Utc::now();
        let ttl = TimeDelta::hours(24);
        assert!(is_fresh(now - ttl + TimeDelta::seconds(1), now, ttl));
        assert!(!is_fresh(now - ttl - TimeDelta::seconds(1), now, ttl));
    }

    #[test]
    fn characteristics_ttl_boundary() {
        let now = Utc::now();
        let ttl = TimeDelta::days(7);
        assert!(is_fresh(now - ttl + TimeDelta::seconds(1), now, ttl));
        assert!(!is_fresh(now - ttl - TimeDelta::seconds(1), now, ttl));
    }

    #[test]
    fn exactly_ttl_old_is_stale() {
        let now = Utc::now();
        let ttl = TimeDelta::hours(24);
        assert!(!is_fresh(now - ttl, now, ttl));
        assert_eq!(expiry_cutoff(now, ttl), now - ttl);
    }
}
