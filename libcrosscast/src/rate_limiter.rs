//! Rate limiting for content generation
//!
//! A per-key sliding-window gate that prevents rapid repeat generation calls
//! for the same (target, article) pair. Keys look like `"linkedin:article-1"`.
//!
//! The backing store is injected so deployments that run more than one
//! process can substitute a shared store without touching call sites. The
//! default store is in-memory and never evicts; key count is bounded by
//! content-target count times article count.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// Outcome of a rate-limit check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitStatus {
    pub allowed: bool,
    /// Milliseconds until the window reopens. Present only when denied,
    /// always greater than zero.
    pub remaining_ms: Option<i64>,
}

/// Key→last-accepted-timestamp store backing the limiter.
///
/// `check_and_set` must be atomic per key: of two concurrent calls inside
/// one window, exactly one may win.
pub trait RateLimitStore: Send + Sync {
    fn last_accepted(&self, key: &str) -> Option<i64>;

    /// Record `now_ms` as the accepted timestamp for `key` iff the previous
    /// acceptance is at least `window_ms` old. On denial, returns the
    /// timestamp that closed the window.
    fn check_and_set(&self, key: &str, now_ms: i64, window_ms: i64) -> Result<(), i64>;
}

/// Process-wide in-memory store.
#[derive(Default)]
pub struct InMemoryRateLimitStore {
    records: Mutex<HashMap<String, i64>>,
}

impl InMemoryRateLimitStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl RateLimitStore for InMemoryRateLimitStore {
    fn last_accepted(&self, key: &str) -> Option<i64> {
        self.records.lock().unwrap().get(key).copied()
    }

    fn check_and_set(&self, key: &str, now_ms: i64, window_ms: i64) -> Result<(), i64> {
        // Single lock acquisition covers both the read and the write
        let mut records = self.records.lock().unwrap();
        match records.get(key).copied() {
            Some(last) if now_ms - last < window_ms => Err(last),
            _ => {
                records.insert(key.to_string(), now_ms);
                Ok(())
            }
        }
    }
}

/// Sliding-window rate limiter.
#[derive(Clone)]
pub struct RateLimiter {
    store: Arc<dyn RateLimitStore>,
    window_ms: i64,
}

impl RateLimiter {
    pub const DEFAULT_WINDOW_MS: i64 = 60_000;

    pub fn new(store: Arc<dyn RateLimitStore>, window_ms: i64) -> Self {
        Self { store, window_ms }
    }

    /// In-memory limiter with the default 60-second window.
    pub fn in_memory() -> Self {
        Self::new(Arc::new(InMemoryRateLimitStore::new()), Self::DEFAULT_WINDOW_MS)
    }

    pub fn window_ms(&self) -> i64 {
        self.window_ms
    }

    /// Check whether a generation for `key` is allowed at `now_ms`, and if
    /// so record the acceptance. A denied check never writes, so the window
    /// cannot be extended by retrying. Check and record are one atomic
    /// store operation, so concurrent callers on the same key cannot both
    /// be admitted.
    pub fn check_and_consume(&self, key: &str, now_ms: i64) -> RateLimitStatus {
        match self.store.check_and_set(key, now_ms, self.window_ms) {
            Ok(()) => RateLimitStatus {
                allowed: true,
                remaining_ms: None,
            },
            Err(last) => RateLimitStatus {
                allowed: false,
                remaining_ms: Some(self.window_ms - (now_ms - last)),
            },
        }
    }

    /// Same result as [`check_and_consume`](Self::check_and_consume) but
    /// never writes. UI polling uses this so that displaying the countdown
    /// does not itself reset the window.
    pub fn peek_status(&self, key: &str, now_ms: i64) -> RateLimitStatus {
        self.evaluate(key, now_ms)
    }

    fn evaluate(&self, key: &str, now_ms: i64) -> RateLimitStatus {
        match self.store.last_accepted(key) {
            None => RateLimitStatus {
                allowed: true,
                remaining_ms: None,
            },
            Some(last) => {
                let elapsed = now_ms - last;
                if elapsed >= self.window_ms {
                    RateLimitStatus {
                        allowed: true,
                        remaining_ms: None,
                    }
                } else {
                    RateLimitStatus {
                        allowed: false,
                        remaining_ms: Some(self.window_ms - elapsed),
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn limiter(window_ms: i64) -> RateLimiter {
        RateLimiter::new(Arc::new(InMemoryRateLimitStore::new()), window_ms)
    }

    #[test]
    fn test_first_check_allowed() {
        let limiter = limiter(60_000);
        let status = limiter.check_and_consume("linkedin:article-1", 1_000_000);
        assert!(status.allowed);
        assert_eq!(status.remaining_ms, None);
    }

    #[test]
    fn test_immediate_second_check_denied_with_full_window() {
        let limiter = limiter(60_000);
        let now = 1_000_000;

        assert!(limiter.check_and_consume("k", now).allowed);

        let status = limiter.check_and_consume("k", now);
        assert!(!status.allowed);
        assert_eq!(status.remaining_ms, Some(60_000));
    }

    #[test]
    fn test_allowed_again_after_window_elapses() {
        let limiter = limiter(60_000);
        let now = 1_000_000;

        assert!(limiter.check_and_consume("k", now).allowed);
        assert!(!limiter.check_and_consume("k", now + 59_999).allowed);
        assert!(limiter.check_and_consume("k", now + 60_000).allowed);
    }

    #[test]
    fn test_remaining_ms_counts_down() {
        let limiter = limiter(60_000);
        let now = 1_000_000;

        limiter.check_and_consume("k", now);

        let status = limiter.check_and_consume("k", now + 15_000);
        assert_eq!(status.remaining_ms, Some(45_000));
    }

    #[test]
    fn test_denied_check_does_not_extend_window() {
        let limiter = limiter(60_000);
        let now = 1_000_000;

        limiter.check_and_consume("k", now);

        // A denied retry halfway through must not reset the window start
        assert!(!limiter.check_and_consume("k", now + 30_000).allowed);
        assert!(limiter.check_and_consume("k", now + 60_000).allowed);
    }

    #[test]
    fn test_peek_never_writes() {
        let limiter = limiter(60_000);
        let now = 1_000_000;

        // Peeking before any acceptance does not open a window
        assert!(limiter.peek_status("k", now).allowed);
        assert!(limiter.check_and_consume("k", now).allowed);

        // Peeking while denied matches check_and_consume exactly
        let peeked = limiter.peek_status("k", now + 10_000);
        let consumed = limiter.check_and_consume("k", now + 10_000);
        assert_eq!(peeked, consumed);

        // And the peek did not change the eventual reopen time
        assert!(limiter.check_and_consume("k", now + 60_000).allowed);
    }

    #[test]
    fn test_keys_are_independent() {
        let limiter = limiter(60_000);
        let now = 1_000_000;

        assert!(limiter.check_and_consume("linkedin:a", now).allowed);
        assert!(limiter.check_and_consume("facebook:a", now).allowed);
        assert!(limiter.check_and_consume("linkedin:b", now).allowed);
        assert!(!limiter.check_and_consume("linkedin:a", now).allowed);
    }

    #[test]
    fn test_concurrent_checks_admit_exactly_one() {
        let limiter = Arc::new(limiter(60_000));
        let now = 1_000_000;

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let limiter = limiter.clone();
                std::thread::spawn(move || limiter.check_and_consume("k", now).allowed)
            })
            .collect();

        let admitted = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|allowed| *allowed)
            .count();
        assert_eq!(admitted, 1);
    }

    #[test]
    fn test_custom_window() {
        let limiter = limiter(5_000);
        let now = 0;

        assert!(limiter.check_and_consume("k", now).allowed);
        let status = limiter.check_and_consume("k", now + 1_000);
        assert_eq!(status.remaining_ms, Some(4_000));
        assert!(limiter.check_and_consume("k", now + 5_000).allowed);
    }
}
