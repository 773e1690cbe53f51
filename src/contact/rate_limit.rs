//! Fixed-window submission throttling.
//!
//! Each key gets a window that starts on its first hit and lasts
//! [`RateLimitPolicy::window`]. The first hit after the window has passed
//! starts a fresh one. Counters live only as long as the store does; the
//! default [`MemoryRateLimitStore`] forgets everything on restart and never
//! evicts stale keys on its own.

use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use dashmap::{mapref::entry::Entry, DashMap};
use time::OffsetDateTime;

use crate::config::ContactConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitPolicy {
    pub max_requests: u32,
    pub window: Duration,
}

impl From<&ContactConfig> for RateLimitPolicy {
    fn from(config: &ContactConfig) -> Self {
        Self {
            max_requests: config.max_per_window,
            window: config.window,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Counter {
    pub count: u32,
    pub window_reset_at: OffsetDateTime,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateDecision {
    Allowed { remaining: u32, reset_in: Duration },
    Limited { reset_in: Duration },
}

impl RateDecision {
    pub fn is_limited(&self) -> bool {
        matches!(self, RateDecision::Limited { .. })
    }
}

/// Storage for per-key counters. Implementations must apply one hit atomically
/// per key.
#[async_trait]
pub trait RateLimitStore: Send + Sync {
    async fn hit(&self, key: &str, now: OffsetDateTime, policy: RateLimitPolicy) -> RateDecision;
}

#[derive(Debug, Default)]
pub struct MemoryRateLimitStore {
    counters: DashMap<String, Counter>,
}

impl MemoryRateLimitStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.counters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.counters.is_empty()
    }
}

#[async_trait]
impl RateLimitStore for MemoryRateLimitStore {
    async fn hit(&self, key: &str, now: OffsetDateTime, policy: RateLimitPolicy) -> RateDecision {
        let fresh = Counter {
            count: 1,
            window_reset_at: now + policy.window,
        };

        let mut occupied = match self.counters.entry(key.to_owned()) {
            Entry::Vacant(vacant) => {
                vacant.insert(fresh);
                return RateDecision::Allowed {
                    remaining: policy.max_requests.saturating_sub(1),
                    reset_in: policy.window,
                };
            }
            Entry::Occupied(occupied) => occupied,
        };
        let counter = occupied.get_mut();

        if now > counter.window_reset_at {
            *counter = fresh;
            return RateDecision::Allowed {
                remaining: policy.max_requests.saturating_sub(1),
                reset_in: policy.window,
            };
        }

        let reset_in = until(now, counter.window_reset_at);
        if counter.count >= policy.max_requests {
            return RateDecision::Limited { reset_in };
        }

        counter.count += 1;
        RateDecision::Allowed {
            remaining: policy.max_requests - counter.count,
            reset_in,
        }
    }
}

fn until(now: OffsetDateTime, then: OffsetDateTime) -> Duration {
    Duration::try_from(then - now).unwrap_or_default()
}

#[derive(Clone)]
pub struct RateLimiter {
    store: Arc<dyn RateLimitStore>,
    policy: RateLimitPolicy,
}

impl RateLimiter {
    pub fn new(store: Arc<dyn RateLimitStore>, policy: RateLimitPolicy) -> Self {
        Self { store, policy }
    }

    pub fn in_memory(policy: RateLimitPolicy) -> Self {
        Self::new(Arc::new(MemoryRateLimitStore::new()), policy)
    }

    pub fn policy(&self) -> RateLimitPolicy {
        self.policy
    }

    pub async fn check(&self, key: &str) -> RateDecision {
        self.check_at(key, OffsetDateTime::now_utc()).await
    }

    pub async fn check_at(&self, key: &str, now: OffsetDateTime) -> RateDecision {
        self.store.hit(key, now, self.policy).await
    }
}

/// Submissions are throttled per address *and* email: a rotating address
/// slips past, a shared address with distinct emails is unaffected.
pub fn submission_key(client_address: &str, email: &str) -> String {
    format!("{client_address}:{}", email.to_lowercase())
}

#[cfg(test)]
mod tests {
    use time::macros::datetime;

    use super::*;

    const HOUR: Duration = Duration::from_secs(3600);

    fn limiter() -> RateLimiter {
        RateLimiter::in_memory(RateLimitPolicy { max_requests: 3, window: HOUR })
    }

    #[tokio::test]
    async fn allows_three_then_limits() {
        let limiter = limiter();
        let t0 = datetime!(2026-01-01 12:00 UTC);

        let mut seen = Vec::new();
        for minutes in [0, 10, 20] {
            let now = t0 + Duration::from_secs(minutes * 60);
            match limiter.check_at("1.2.3.4:ada@example.com", now).await {
                RateDecision::Allowed { remaining, .. } => seen.push(remaining),
                other => panic!("expected allow, got {other:?}"),
            }
        }
        assert_eq!(seen, [2, 1, 0]);

        let fourth = limiter
            .check_at("1.2.3.4:ada@example.com", t0 + Duration::from_secs(30 * 60))
            .await;
        assert_eq!(fourth, RateDecision::Limited { reset_in: Duration::from_secs(30 * 60) });
    }

    #[tokio::test]
    async fn window_expiry_starts_fresh() {
        let limiter = limiter();
        let t0 = datetime!(2026-01-01 12:00 UTC);
        for _ in 0..4 {
            limiter.check_at("k", t0).await;
        }
        assert!(limiter.check_at("k", t0 + HOUR).await.is_limited());

        let after = limiter.check_at("k", t0 + HOUR + Duration::from_millis(1)).await;
        assert_eq!(after, RateDecision::Allowed { remaining: 2, reset_in: HOUR });
    }

    #[tokio::test]
    async fn keys_are_independent() {
        let limiter = limiter();
        let now = datetime!(2026-01-01 12:00 UTC);
        for _ in 0..3 {
            limiter.check_at("10.0.0.1:a@example.com", now).await;
        }
        assert!(limiter.check_at("10.0.0.1:a@example.com", now).await.is_limited());
        assert!(!limiter.check_at("10.0.0.1:b@example.com", now).await.is_limited());
        assert!(!limiter.check_at("10.0.0.2:a@example.com", now).await.is_limited());
    }

    #[tokio::test]
    async fn concurrent_hits_never_exceed_the_maximum() {
        let limiter = limiter();
        let now = datetime!(2026-01-01 12:00 UTC);

        let handles: Vec<_> = (0..16)
            .map(|_| {
                let limiter = limiter.clone();
                tokio::spawn(async move { limiter.check_at("shared", now).await })
            })
            .collect();

        let mut allowed = 0;
        for handle in handles {
            if !handle.await.unwrap().is_limited() {
                allowed += 1;
            }
        }
        assert_eq!(allowed, 3);
    }

    #[test]
    fn key_lowercases_email() {
        assert_eq!(submission_key("unknown", "Ada@Example.com"), "unknown:ada@example.com");
    }
}
