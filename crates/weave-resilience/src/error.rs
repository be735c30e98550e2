//! Error types for resilience operations.

use std::time::Duration;

use thiserror::Error;

/// Result alias for resilience operations.
pub type ResilienceResult<T> = Result<T, ResilienceError>;

/// Errors raised by the resilience primitives.
#[derive(Debug, Clone, Error)]
pub enum ResilienceError {
    /// The operation exceeded its deadline.
    #[error("operation timed out after {duration:?}")]
    Timeout {
        /// The deadline that was exceeded.
        duration: Duration,
    },

    /// The circuit breaker refused the call without running it.
    #[error("circuit breaker is open (state: {state})")]
    CircuitOpen {
        /// Current breaker state name.
        state: String,
        /// Hint for when a retry could succeed.
        retry_after: Option<Duration>,
    },

    /// The concurrency bulkhead is at capacity.
    #[error("bulkhead is full (max concurrency: {max_concurrency})")]
    BulkheadFull {
        /// The configured concurrency cap.
        max_concurrency: usize,
    },

    /// A rate limit refused the operation.
    #[error("rate limit exceeded")]
    RateLimited {
        /// Hint for when a retry could succeed.
        retry_after: Option<Duration>,
    },

    /// The surrounding context was cancelled.
    #[error("operation was cancelled")]
    Cancelled,

    /// The primitive was configured with invalid parameters.
    #[error("invalid resilience configuration: {0}")]
    InvalidConfig(String),
}

impl ResilienceError {
    /// Timeout constructor.
    #[must_use]
    pub fn timeout(duration: Duration) -> Self {
        Self::Timeout { duration }
    }

    /// Whether retrying the operation later could succeed.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Timeout { .. } | Self::RateLimited { .. } | Self::BulkheadFull { .. }
        )
    }

    /// Delay hint, when the primitive knows one.
    #[must_use]
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::CircuitOpen { retry_after, .. } | Self::RateLimited { retry_after } => {
                *retry_after
            }
            _ => None,
        }
    }
}
