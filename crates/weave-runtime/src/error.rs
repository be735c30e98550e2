//! Runtime error types and error classification.

use std::time::Duration;

use thiserror::Error;
use weave_core::NodeId;
use weave_resilience::ResilienceError;

/// An error from executing a single node.
///
/// Node errors are local: they become a workflow error only once any
/// configured retry is exhausted and the scheduler adopts them.
#[derive(Debug, Clone, Error)]
pub enum NodeError {
    /// The workflow failed validation before any handler ran.
    #[error("validation failed: {0}")]
    Validation(String),

    /// An expression in the node configuration failed to resolve.
    #[error("expression resolution failed: {0}")]
    Expression(String),

    /// A credential could not be resolved.
    #[error("credential resolution failed: {0}")]
    Credential(String),

    /// No handler is registered for the node's type tag.
    #[error("unknown node type: {0}")]
    UnknownType(String),

    /// The node exceeded its deadline.
    #[error("node timed out after {duration:?}")]
    Timeout {
        /// The deadline that expired.
        duration: Duration,
    },

    /// The execution was cancelled while the node ran.
    #[error("node execution was cancelled")]
    Cancelled,

    /// A rate limiter refused the node.
    #[error("rate limit exceeded for {scope}")]
    RateLimited {
        /// Which bucket refused (workspace or node type).
        scope: String,
    },

    /// The circuit breaker short-circuited without calling the handler.
    #[error("circuit breaker open for node type {node_type}")]
    CircuitOpen {
        /// The tripped node type.
        node_type: String,
    },

    /// The handler panicked and was recovered.
    #[error("node panicked: {0}")]
    Panic(String),

    /// The handler returned an error.
    #[error("{0}")]
    Handler(String),
}

impl NodeError {
    /// Whether this error came from cancellation.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }

    /// Whether this error came from a deadline.
    #[must_use]
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }
}

impl From<ResilienceError> for NodeError {
    fn from(err: ResilienceError) -> Self {
        match err {
            ResilienceError::Timeout { duration } => Self::Timeout { duration },
            ResilienceError::Cancelled => Self::Cancelled,
            ResilienceError::RateLimited { .. } => Self::RateLimited {
                scope: "rate limiter".into(),
            },
            ResilienceError::CircuitOpen { state, .. } => Self::CircuitOpen { node_type: state },
            ResilienceError::BulkheadFull { max_concurrency } => Self::Handler(format!(
                "concurrency limit reached (max {max_concurrency})"
            )),
            ResilienceError::InvalidConfig(message) => Self::Handler(message),
        }
    }
}

/// Engine-level errors outside any single node.
#[derive(Debug, Error)]
pub enum EngineError {
    /// A handler was registered twice for the same type tag.
    #[error("handler already registered for node type {0}")]
    HandlerExists(String),

    /// The shared store or bus failed.
    #[error("store error: {0}")]
    Store(String),

    /// The target execution is not running in this process.
    #[error("execution not found: {0}")]
    ExecutionNotFound(String),
}

/// Coarse error classes used by the metrics middleware, derived from the
/// error message by substring match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    Timeout,
    Cancelled,
    RateLimit,
    Auth,
    NotFound,
    Network,
    Unknown,
}

impl ErrorCategory {
    /// Classify an error message.
    #[must_use]
    pub fn classify(message: &str) -> Self {
        let lower = message.to_lowercase();
        if lower.contains("timed out") || lower.contains("timeout") || lower.contains("deadline") {
            Self::Timeout
        } else if lower.contains("cancel") {
            Self::Cancelled
        } else if lower.contains("rate limit") || lower.contains("too many requests") {
            Self::RateLimit
        } else if lower.contains("unauthorized")
            || lower.contains("forbidden")
            || lower.contains("auth")
        {
            Self::Auth
        } else if lower.contains("not found") || lower.contains("404") {
            Self::NotFound
        } else if lower.contains("connection")
            || lower.contains("network")
            || lower.contains("dns")
            || lower.contains("refused")
        {
            Self::Network
        } else {
            Self::Unknown
        }
    }

    /// Stable label for metrics.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Timeout => "timeout",
            Self::Cancelled => "cancelled",
            Self::RateLimit => "rate_limit",
            Self::Auth => "auth",
            Self::NotFound => "not_found",
            Self::Network => "network",
            Self::Unknown => "unknown",
        }
    }
}

/// A node failure paired with the node that raised it.
#[derive(Debug, Clone)]
pub struct ExecutionFailure {
    /// The failing node.
    pub node_id: NodeId,
    /// The error after retries were exhausted.
    pub error: NodeError,
}
