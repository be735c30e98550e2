//! Retry strategies with pluggable backoff.

use std::future::Future;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

/// Backoff policies for retry delays.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "policy", rename_all = "snake_case")]
pub enum BackoffPolicy {
    /// Fixed delay between attempts.
    Fixed {
        /// Delay before every retry.
        delay: Duration,
    },
    /// Linear backoff: `base * attempt`.
    Linear {
        /// Base delay.
        base: Duration,
        /// Upper bound.
        max: Duration,
    },
    /// Quadratic backoff: `base * attempt²`. The engine default for node
    /// retries (100ms base).
    Quadratic {
        /// Base delay.
        base: Duration,
        /// Upper bound.
        max: Duration,
    },
    /// Exponential backoff: `base * multiplier^(attempt-1)`.
    Exponential {
        /// Base delay.
        base: Duration,
        /// Growth factor.
        multiplier: f64,
        /// Upper bound.
        max: Duration,
    },
}

/// A retry plan: how many attempts, spaced how.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryStrategy {
    /// Maximum number of retries after the first attempt.
    pub max_retries: u32,
    /// Delay policy between attempts.
    pub backoff: BackoffPolicy,
}

impl Default for RetryStrategy {
    fn default() -> Self {
        Self::quadratic(3, Duration::from_millis(100))
    }
}

impl RetryStrategy {
    /// Fixed-delay strategy.
    #[must_use]
    pub fn fixed(max_retries: u32, delay: Duration) -> Self {
        Self {
            max_retries,
            backoff: BackoffPolicy::Fixed { delay },
        }
    }

    /// Quadratic strategy (`base * attempt²`), capped at 30s.
    #[must_use]
    pub fn quadratic(max_retries: u32, base: Duration) -> Self {
        Self {
            max_retries,
            backoff: BackoffPolicy::Quadratic {
                base,
                max: Duration::from_secs(30),
            },
        }
    }

    /// Exponential strategy with a 2.0 multiplier, capped at 30s.
    #[must_use]
    pub fn exponential(max_retries: u32, base: Duration) -> Self {
        Self {
            max_retries,
            backoff: BackoffPolicy::Exponential {
                base,
                multiplier: 2.0,
                max: Duration::from_secs(30),
            },
        }
    }

    /// Delay before retry number `attempt` (1-indexed). `None` once the
    /// attempt budget is spent.
    #[must_use]
    pub fn delay_for_attempt(&self, attempt: u32) -> Option<Duration> {
        if attempt == 0 || attempt > self.max_retries {
            return None;
        }
        let delay = match &self.backoff {
            BackoffPolicy::Fixed { delay } => *delay,
            BackoffPolicy::Linear { base, max } => {
                (*base).saturating_mul(attempt).min(*max)
            }
            BackoffPolicy::Quadratic { base, max } => {
                (*base).saturating_mul(attempt.saturating_mul(attempt)).min(*max)
            }
            BackoffPolicy::Exponential {
                base,
                multiplier,
                max,
            } => {
                let factor = multiplier.powi(attempt.saturating_sub(1) as i32);
                Duration::from_secs_f64((base.as_secs_f64() * factor).min(max.as_secs_f64()))
            }
        };
        Some(delay)
    }

    /// Run `operation`, retrying failures `should_retry` approves, with
    /// this strategy's backoff between attempts. The final error is the
    /// last attempt's error.
    pub async fn run<T, E, F, Fut, P>(&self, should_retry: P, mut operation: F) -> Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        P: Fn(&E) -> bool,
        E: std::fmt::Display,
    {
        let mut attempt = 0;
        loop {
            match operation().await {
                Ok(value) => return Ok(value),
                Err(err) => {
                    attempt += 1;
                    let Some(delay) = self.delay_for_attempt(attempt) else {
                        return Err(err);
                    };
                    if !should_retry(&err) {
                        return Err(err);
                    }
                    debug!(attempt, delay_ms = delay.as_millis() as u64, error = %err, "retrying after failure");
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }
}
