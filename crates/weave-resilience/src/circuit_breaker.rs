//! Circuit breaker: automatic failure detection and recovery.
//!
//! States move Closed → Open when failures reach a threshold within a
//! rolling window, Open → HalfOpen after a reset timeout, and HalfOpen →
//! Closed after enough probe successes (or back to Open on any probe
//! failure).

use std::time::{Duration, Instant};

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::{ResilienceError, ResilienceResult};

/// Circuit breaker states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    /// Calls flow through.
    Closed,
    /// Calls are refused.
    Open,
    /// A limited number of probe calls are allowed.
    HalfOpen,
}

impl std::fmt::Display for CircuitState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Closed => f.write_str("closed"),
            Self::Open => f.write_str("open"),
            Self::HalfOpen => f.write_str("half-open"),
        }
    }
}

/// Circuit breaker tuning.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CircuitBreakerConfig {
    /// Failures within `window` before the circuit opens.
    pub failure_threshold: u32,
    /// Rolling window failures are counted in.
    pub window: Duration,
    /// How long the circuit stays open before probing.
    pub reset_timeout: Duration,
    /// Probe successes required to close again.
    pub half_open_successes: u32,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            window: Duration::from_secs(60),
            reset_timeout: Duration::from_secs(30),
            half_open_successes: 2,
        }
    }
}

impl CircuitBreakerConfig {
    /// Validate the configuration.
    pub fn validate(&self) -> ResilienceResult<()> {
        if self.failure_threshold == 0 {
            return Err(ResilienceError::InvalidConfig(
                "failure_threshold must be greater than 0".into(),
            ));
        }
        if self.reset_timeout.is_zero() {
            return Err(ResilienceError::InvalidConfig(
                "reset_timeout must be greater than 0".into(),
            ));
        }
        if self.half_open_successes == 0 {
            return Err(ResilienceError::InvalidConfig(
                "half_open_successes must be greater than 0".into(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug)]
struct Inner {
    state: CircuitState,
    failures: u32,
    window_start: Instant,
    opened_at: Option<Instant>,
    probe_successes: u32,
}

/// A single circuit breaker instance (the runtime keeps one per node
/// type).
#[derive(Debug)]
pub struct CircuitBreaker {
    config: CircuitBreakerConfig,
    inner: Mutex<Inner>,
}

impl CircuitBreaker {
    /// Breaker with default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(CircuitBreakerConfig::default())
    }

    /// Breaker with explicit configuration.
    #[must_use]
    pub fn with_config(config: CircuitBreakerConfig) -> Self {
        Self {
            config,
            inner: Mutex::new(Inner {
                state: CircuitState::Closed,
                failures: 0,
                window_start: Instant::now(),
                opened_at: None,
                probe_successes: 0,
            }),
        }
    }

    /// Current state (Open flips to HalfOpen lazily in [`try_acquire`]).
    #[must_use]
    pub fn state(&self) -> CircuitState {
        self.inner.lock().state
    }

    /// Ask permission to run a call.
    pub fn try_acquire(&self) -> ResilienceResult<()> {
        let mut inner = self.inner.lock();
        match inner.state {
            CircuitState::Closed | CircuitState::HalfOpen => Ok(()),
            CircuitState::Open => {
                let elapsed = inner.opened_at.map_or(Duration::ZERO, |t| t.elapsed());
                if elapsed >= self.config.reset_timeout {
                    inner.state = CircuitState::HalfOpen;
                    inner.probe_successes = 0;
                    info!("circuit transitioning to half-open");
                    Ok(())
                } else {
                    Err(ResilienceError::CircuitOpen {
                        state: CircuitState::Open.to_string(),
                        retry_after: Some(self.config.reset_timeout - elapsed),
                    })
                }
            }
        }
    }

    /// Record a successful call.
    pub fn record_success(&self) {
        let mut inner = self.inner.lock();
        match inner.state {
            CircuitState::Closed => {
                inner.failures = 0;
                inner.window_start = Instant::now();
            }
            CircuitState::HalfOpen => {
                inner.probe_successes += 1;
                if inner.probe_successes >= self.config.half_open_successes {
                    inner.state = CircuitState::Closed;
                    inner.failures = 0;
                    inner.opened_at = None;
                    inner.window_start = Instant::now();
                    info!("circuit closed after successful probes");
                } else {
                    debug!(
                        successes = inner.probe_successes,
                        needed = self.config.half_open_successes,
                        "half-open probe succeeded"
                    );
                }
            }
            CircuitState::Open => {}
        }
    }

    /// Record a failed call.
    pub fn record_failure(&self) {
        let mut inner = self.inner.lock();
        match inner.state {
            CircuitState::Closed => {
                // Restart the count when the window has rolled over.
                if inner.window_start.elapsed() > self.config.window {
                    inner.failures = 0;
                    inner.window_start = Instant::now();
                }
                inner.failures += 1;
                if inner.failures >= self.config.failure_threshold {
                    inner.state = CircuitState::Open;
                    inner.opened_at = Some(Instant::now());
                    warn!(
                        failures = inner.failures,
                        threshold = self.config.failure_threshold,
                        "circuit opened"
                    );
                }
            }
            CircuitState::HalfOpen => {
                inner.state = CircuitState::Open;
                inner.opened_at = Some(Instant::now());
                inner.probe_successes = 0;
                warn!("circuit re-opened after failed probe");
            }
            CircuitState::Open => {}
        }
    }
}

impl Default for CircuitBreaker {
    fn default() -> Self {
        Self::new()
    }
}
