//! Keyed token-bucket rate limiting on top of `governor`.

use std::num::NonZeroU32;
use std::time::Duration;

use governor::clock::DefaultClock;
use governor::state::keyed::DefaultKeyedStateStore;
use governor::{Quota, RateLimiter};

use crate::error::{ResilienceError, ResilienceResult};

type Keyed = RateLimiter<String, DefaultKeyedStateStore<String>, DefaultClock>;

/// A per-key token-bucket limiter: every key (workspace id, node type)
/// gets its own bucket sharing one quota.
pub struct KeyedRateLimiter {
    limiter: Keyed,
    rps: u32,
}

impl KeyedRateLimiter {
    /// Limiter allowing `rps` requests per second per key with the given
    /// burst capacity.
    pub fn new(rps: u32, burst: u32) -> ResilienceResult<Self> {
        let rps_nz = NonZeroU32::new(rps)
            .ok_or_else(|| ResilienceError::InvalidConfig("rps must be greater than 0".into()))?;
        let burst_nz = NonZeroU32::new(burst.max(1)).expect("max(1) is non-zero");
        let quota = Quota::per_second(rps_nz).allow_burst(burst_nz);
        Ok(Self {
            limiter: RateLimiter::keyed(quota),
            rps,
        })
    }

    /// Fail-fast check: take a token now or report `RateLimited`.
    pub fn check(&self, key: &str) -> ResilienceResult<()> {
        self.limiter
            .check_key(&key.to_owned())
            .map_err(|_| ResilienceError::RateLimited {
                retry_after: Some(Duration::from_secs_f64(1.0 / f64::from(self.rps))),
            })
    }

    /// Wait up to `max_wait` for a token; fail with `RateLimited` when
    /// the wait would exceed the budget.
    pub async fn acquire_within(&self, key: &str, max_wait: Duration) -> ResilienceResult<()> {
        let key = key.to_owned();
        tokio::time::timeout(max_wait, self.limiter.until_key_ready(&key))
            .await
            .map_err(|_| ResilienceError::RateLimited {
                retry_after: Some(Duration::from_secs_f64(1.0 / f64::from(self.rps))),
            })
    }
}

impl std::fmt::Debug for KeyedRateLimiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyedRateLimiter")
            .field("rps", &self.rps)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_rps_is_rejected() {
        assert!(KeyedRateLimiter::new(0, 1).is_err());
    }

    #[test]
    fn burst_allows_initial_calls() {
        let limiter = KeyedRateLimiter::new(1, 3).unwrap();
        assert!(limiter.check("ws-1").is_ok());
        assert!(limiter.check("ws-1").is_ok());
        assert!(limiter.check("ws-1").is_ok());
        assert!(limiter.check("ws-1").is_err());
    }

    #[test]
    fn keys_have_independent_buckets() {
        let limiter = KeyedRateLimiter::new(1, 1).unwrap();
        assert!(limiter.check("ws-1").is_ok());
        assert!(limiter.check("ws-1").is_err());
        assert!(limiter.check("ws-2").is_ok());
    }

    #[tokio::test]
    async fn acquire_within_waits_for_refill() {
        let limiter = KeyedRateLimiter::new(20, 1).unwrap();
        assert!(limiter.check("k").is_ok());
        // Bucket drained; a 500ms budget comfortably covers the ~50ms
        // refill at 20 rps.
        let result = limiter.acquire_within("k", Duration::from_millis(500)).await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn acquire_within_times_out() {
        let limiter = KeyedRateLimiter::new(1, 1).unwrap();
        assert!(limiter.check("k").is_ok());
        let result = limiter.acquire_within("k", Duration::from_millis(5)).await;
        assert!(matches!(result, Err(ResilienceError::RateLimited { .. })));
    }

    #[test]
    fn rate_limited_error_carries_hint() {
        let limiter = KeyedRateLimiter::new(2, 1).unwrap();
        let _ = limiter.check("k");
        let err = limiter.check("k").unwrap_err();
        assert_eq!(err.retry_after(), Some(Duration::from_millis(500)));
    }
}
