//! # weave-resilience
//!
//! Resilience primitives for the Weave workflow engine: deadlines (with
//! an optional cleanup grace period), retry strategies with pluggable
//! backoff, a windowed circuit breaker, governor-backed keyed rate
//! limiting, and a bulkhead concurrency cap.
//!
//! The runtime's middleware chain composes these around node handler
//! calls; the primitives themselves know nothing about workflows.

pub mod bulkhead;
pub mod circuit_breaker;
pub mod error;
pub mod rate_limiter;
pub mod retry;
pub mod timeout;

pub use bulkhead::Bulkhead;
pub use circuit_breaker::{CircuitBreaker, CircuitBreakerConfig, CircuitState};
pub use error::{ResilienceError, ResilienceResult};
pub use rate_limiter::KeyedRateLimiter;
pub use retry::{BackoffPolicy, RetryStrategy};
pub use timeout::{timeout, timeout_with_grace};
