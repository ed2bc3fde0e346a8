//! Per-client admission control for the webhook path.
//!
//! One counter per `(client, hour bucket)`. The map is mutex-guarded so two
//! concurrent requests from the same client cannot both read a stale count
//! and slip past the ceiling: increment-then-compare happens under the lock.

use std::collections::HashMap;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use tracing::warn;

/// Default ceiling: webhook calls per client per hour.
pub const DEFAULT_RATE_LIMIT: u32 = 60;

/// Admission decision for a single webhook call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    Allowed,
    /// Over the ceiling; `limit` is echoed into the client-facing message.
    Limited { limit: u32 },
}

#[derive(Debug)]
struct RateWindow {
    hour_bucket: String,
    count: u32,
}

/// Process-wide admission guard, exclusively owning the counter map.
#[derive(Debug)]
pub struct AdmissionGuard {
    limit: u32,
    windows: Mutex<HashMap<String, RateWindow>>,
}

impl AdmissionGuard {
    pub fn new(limit: u32) -> Self {
        Self {
            limit,
            windows: Mutex::new(HashMap::new()),
        }
    }

    pub fn limit(&self) -> u32 {
        self.limit
    }

    /// Check (and count) one webhook call for `client_key`.
    pub fn admit(&self, client_key: &str) -> Admission {
        self.admit_at(client_key, Utc::now())
    }

    /// Same as [`admit`](Self::admit) with an explicit timestamp; the seam
    /// used by tests to pin the hour bucket.
    pub fn admit_at(&self, client_key: &str, now: DateTime<Utc>) -> Admission {
        let bucket = now.format("%Y-%m-%d-%H").to_string();

        let mut windows = self.windows.lock().expect("admission guard lock poisoned");
        let window = windows
            .entry(client_key.to_string())
            .or_insert_with(|| RateWindow {
                hour_bucket: bucket.clone(),
                count: 0,
            });

        // New hour: the previous window's count is discarded.
        if window.hour_bucket != bucket {
            window.hour_bucket = bucket;
            window.count = 0;
        }

        window.count += 1;
        if window.count > self.limit {
            warn!(
                client = %client_key,
                count = window.count,
                limit = self.limit,
                "rate limit exceeded"
            );
            Admission::Limited { limit: self.limit }
        } else {
            Admission::Allowed
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at_hour(hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 8, 31, hour, 30, 0).unwrap()
    }

    #[test]
    fn allows_up_to_the_ceiling() {
        let guard = AdmissionGuard::new(60);
        for _ in 0..60 {
            assert_eq!(guard.admit_at("10.0.0.1", at_hour(9)), Admission::Allowed);
        }
        assert_eq!(
            guard.admit_at("10.0.0.1", at_hour(9)),
            Admission::Limited { limit: 60 }
        );
    }

    #[test]
    fn new_hour_resets_the_counter() {
        let guard = AdmissionGuard::new(2);
        assert_eq!(guard.admit_at("c", at_hour(9)), Admission::Allowed);
        assert_eq!(guard.admit_at("c", at_hour(9)), Admission::Allowed);
        assert_eq!(guard.admit_at("c", at_hour(9)), Admission::Limited { limit: 2 });

        // Hour rollover discards the previous window.
        assert_eq!(guard.admit_at("c", at_hour(10)), Admission::Allowed);
    }

    #[test]
    fn clients_are_counted_independently() {
        let guard = AdmissionGuard::new(1);
        assert_eq!(guard.admit_at("a", at_hour(9)), Admission::Allowed);
        assert_eq!(guard.admit_at("b", at_hour(9)), Admission::Allowed);
        assert_eq!(guard.admit_at("a", at_hour(9)), Admission::Limited { limit: 1 });
    }
}
