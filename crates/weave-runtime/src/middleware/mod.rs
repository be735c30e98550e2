//! Middleware chain around node handler calls.
//!
//! A middleware wraps the rest of the chain through [`Next`]; the chain
//! composes so the first-registered middleware is outermost. Conditional
//! wrappers short-circuit to `next` when their predicate rejects the
//! node.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::future::BoxFuture;
use tokio_util::sync::CancellationToken;
use weave_workflow::NodeDefinition;

use crate::context::RuntimeContext;
use crate::error::NodeError;
use crate::handler::Output;

mod circuit_breaker;
mod concurrency;
mod conditional;
mod logging;
mod metrics;
mod rate_limit;
mod recovery;
mod retry;
mod timeout;
mod trace;

pub use circuit_breaker::CircuitBreakerMiddleware;
pub use concurrency::ConcurrencyMiddleware;
pub use conditional::{Conditional, NodePredicate};
pub use logging::LoggingMiddleware;
pub use metrics::MetricsMiddleware;
pub use rate_limit::{RateLimitConfig, RateLimitMiddleware, RateLimitMode};
pub use recovery::{RecoveryMiddleware, RetryOnPanicMiddleware};
pub use retry::ErrorHandlingMiddleware;
pub use timeout::{GracefulTimeoutMiddleware, TimeoutMiddleware};
pub use trace::TracingMiddleware;

/// Everything middlewares can observe about one node invocation.
pub struct Invocation {
    /// The execution's runtime context.
    pub runtime: Arc<RuntimeContext>,
    /// The node being invoked.
    pub node: Arc<NodeDefinition>,
    /// Snapshot of the assembled node input.
    pub input: Output,
    /// Effective deadline (node override, else handler default, else
    /// engine default).
    pub effective_timeout: Option<Duration>,
    /// Node-scoped cancellation, fired by sibling failure, workflow
    /// cancellation, or the graceful-timeout middleware.
    pub cancel: CancellationToken,
}

/// The innermost handler call.
pub type HandlerFn =
    dyn for<'a> Fn(&'a Invocation) -> BoxFuture<'a, Result<Output, NodeError>> + Send + Sync;

/// The remainder of the chain after the current middleware.
pub struct Next<'a> {
    rest: &'a [Arc<dyn Middleware>],
    terminal: &'a HandlerFn,
}

impl Clone for Next<'_> {
    fn clone(&self) -> Self {
        *self
    }
}

impl Copy for Next<'_> {}

impl Next<'_> {
    /// Run the rest of the chain. `Next` is `Copy`, so retrying
    /// middlewares can invoke it more than once.
    pub async fn run(self, ctx: &Invocation) -> Result<Output, NodeError> {
        match self.rest.split_first() {
            Some((head, rest)) => {
                head.handle(
                    ctx,
                    Next {
                        rest,
                        terminal: self.terminal,
                    },
                )
                .await
            }
            None => (self.terminal)(ctx).await,
        }
    }
}

/// A wrapper intercepting node execution to apply cross-cutting policy.
#[async_trait]
pub trait Middleware: Send + Sync {
    /// Handle the invocation, calling `next.run(ctx)` zero or more
    /// times.
    async fn handle(&self, ctx: &Invocation, next: Next<'_>) -> Result<Output, NodeError>;
}

/// An ordered middleware chain.
#[derive(Default)]
pub struct Chain {
    middlewares: Vec<Arc<dyn Middleware>>,
}

impl Chain {
    /// Empty chain (the terminal handler runs bare).
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a middleware; earlier registrations wrap later ones.
    #[must_use]
    pub fn with(mut self, middleware: Arc<dyn Middleware>) -> Self {
        self.middlewares.push(middleware);
        self
    }

    /// Append in place.
    pub fn push(&mut self, middleware: Arc<dyn Middleware>) {
        self.middlewares.push(middleware);
    }

    /// Number of registered middlewares.
    #[must_use]
    pub fn len(&self) -> usize {
        self.middlewares.len()
    }

    /// Whether the chain is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.middlewares.is_empty()
    }

    /// Run the chain around the terminal handler.
    pub async fn execute(
        &self,
        ctx: &Invocation,
        terminal: &HandlerFn,
    ) -> Result<Output, NodeError> {
        Next {
            rest: &self.middlewares,
            terminal,
        }
        .run(ctx)
        .await
    }
}

impl std::fmt::Debug for Chain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Chain")
            .field("len", &self.middlewares.len())
            .finish()
    }
}
