//! Fixed-window rate limiter.
//!
//! # Algorithm
//!
//! 1. Window start: `floor(now_ms / window_ms) * window_ms`
//! 2. Counter key: `{prefix}{identifier}:{window_start}`
//! 3. Atomic increment; the TTL is set only when the counter is created
//! 4. Allowed while the count is within `max_requests`
//!
//! # Availability
//!
//! A failing counter backend **fails open**: the request is allowed and a
//! warning is logged. The limiter must never become a single point of
//! denial of service.

use crate::config::RateLimitPolicy;
use crate::constants::keys;
use crate::error::{AuthError, Result};
use crate::providers::KeyValueStore;
use chrono::{DateTime, TimeZone, Utc};

/// Outcome of a rate-limit check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitDecision {
    /// Whether the request may proceed.
    pub allowed: bool,

    /// Requests left in the current window.
    pub remaining: u32,

    /// Start of the next window.
    pub reset_time: DateTime<Utc>,
}

impl RateLimitDecision {
    /// Time until the window resets, measured from `now`.
    #[must_use]
    pub fn retry_after(&self, now: DateTime<Utc>) -> std::time::Duration {
        (self.reset_time - now).to_std().unwrap_or_default()
    }

    /// Convert a denial into `AuthError::TooManyRequests`.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::TooManyRequests` if the request is not allowed.
    pub fn into_result(self) -> Result<Self> {
        if self.allowed {
            Ok(self)
        } else {
            Err(AuthError::TooManyRequests {
                retry_after: self.retry_after(Utc::now()),
            })
        }
    }
}

/// Counter identifier for an endpoint and a client (IP, user id, API key).
#[must_use]
pub fn identifier(endpoint: &str, client: &str) -> String {
    format!("{endpoint}:{client}")
}

/// Fixed-window rate limiter over a [`KeyValueStore`].
#[derive(Debug, Clone)]
pub struct FixedWindowRateLimiter<K> {
    store: K,
}

impl<K: KeyValueStore> FixedWindowRateLimiter<K> {
    /// Create a rate limiter.
    #[must_use]
    pub const fn new(store: K) -> Self {
        Self { store }
    }

    /// Count a request against `identifier` and decide.
    pub async fn check(&self, identifier: &str, policy: RateLimitPolicy) -> RateLimitDecision {
        self.check_at(identifier, policy, Utc::now()).await
    }

    /// [`check`](Self::check) with an explicit clock.
    #[allow(clippy::cast_possible_truncation, clippy::cast_possible_wrap)] // windows are seconds to days
    pub async fn check_at(
        &self,
        identifier: &str,
        policy: RateLimitPolicy,
        now: DateTime<Utc>,
    ) -> RateLimitDecision {
        let window_ms = (policy.window.as_millis() as i64).max(1);
        let now_ms = now.timestamp_millis();
        let window_start = now_ms.div_euclid(window_ms) * window_ms;
        let reset_ms = window_start + window_ms;
        let reset_time = Utc
            .timestamp_millis_opt(reset_ms)
            .single()
            .unwrap_or(now);

        let key = format!("{}{identifier}:{window_start}", keys::RATE_LIMIT_PREFIX);
        let ttl = std::time::Duration::from_millis((reset_ms - now_ms).max(1) as u64);

        let count = match self.store.increment_with_ttl(&key, ttl).await {
            Ok(count) => count,
            Err(e) => {
                tracing::warn!(
                    identifier = %identifier,
                    error = %e,
                    "Rate limiter backend unavailable; failing open"
                );
                return RateLimitDecision {
                    allowed: true,
                    remaining: policy.max_requests,
                    reset_time,
                };
            }
        };

        let max = u64::from(policy.max_requests);
        let decision = RateLimitDecision {
            allowed: count <= max,
            remaining: max.saturating_sub(count) as u32,
            reset_time,
        };

        if decision.allowed {
            tracing::debug!(identifier = %identifier, count, "Rate limit check passed");
        } else {
            tracing::warn!(
                identifier = %identifier,
                count,
                limit = policy.max_requests,
                "Rate limit exceeded"
            );
        }

        decision
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stores::MemoryStore;

    fn at(ms: i64) -> DateTime<Utc> {
        Utc.timestamp_millis_opt(ms).single().unwrap()
    }

    /// Start of a one-minute window.
    fn window_start() -> DateTime<Utc> {
        at(1_700_000_040_000)
    }

    #[tokio::test]
    async fn test_window_counts_down() {
        let limiter = FixedWindowRateLimiter::new(MemoryStore::new());
        let policy = RateLimitPolicy::per_minute(3);
        let now = window_start();

        let first = limiter.check_at("login:1.2.3.4", policy, now).await;
        assert!(first.allowed);
        assert_eq!(first.remaining, 2);

        limiter.check_at("login:1.2.3.4", policy, now).await;
        let third = limiter.check_at("login:1.2.3.4", policy, now).await;
        assert!(third.allowed);
        assert_eq!(third.remaining, 0);

        let fourth = limiter.check_at("login:1.2.3.4", policy, now).await;
        assert!(!fourth.allowed);
        assert_eq!(fourth.remaining, 0);
    }

    #[tokio::test]
    async fn test_reset_time_is_window_boundary() {
        let limiter = FixedWindowRateLimiter::new(MemoryStore::new());
        let policy = RateLimitPolicy::per_minute(10);

        // 90.5 s into the epoch → window [60 s, 120 s)
        let decision = limiter.check_at("x", policy, at(90_500)).await;
        assert_eq!(decision.reset_time, at(120_000));
        assert_eq!(decision.retry_after(at(90_500)), std::time::Duration::from_millis(29_500));
    }

    #[tokio::test]
    async fn test_identifiers_are_independent() {
        let limiter = FixedWindowRateLimiter::new(MemoryStore::new());
        let policy = RateLimitPolicy::per_minute(1);
        let now = window_start();

        assert!(limiter.check_at(&identifier("login", "a"), policy, now).await.allowed);
        assert!(limiter.check_at(&identifier("login", "b"), policy, now).await.allowed);
        assert!(!limiter.check_at(&identifier("login", "a"), policy, now).await.allowed);
    }

    #[tokio::test]
    async fn test_denial_maps_to_too_many_requests() {
        let limiter = FixedWindowRateLimiter::new(MemoryStore::new());
        let policy = RateLimitPolicy::per_minute(0);

        let decision = limiter.check("x", policy).await;
        assert!(matches!(
            decision.into_result(),
            Err(AuthError::TooManyRequests { .. })
        ));
    }
}
