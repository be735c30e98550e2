//! Predicate-driven retry with backoff.

use std::sync::Arc;

use async_trait::async_trait;
use weave_resilience::RetryStrategy;

use super::{Invocation, Middleware, Next};
use crate::error::NodeError;
use crate::handler::Output;

/// Decides whether a node error is worth retrying.
pub type RetryPredicate = Arc<dyn Fn(&NodeError) -> bool + Send + Sync>;

/// Wraps errors through a caller-supplied predicate and retries with
/// the strategy's backoff (quadratic 100ms × attempt² by default).
pub struct ErrorHandlingMiddleware {
    strategy: RetryStrategy,
    should_retry: RetryPredicate,
}

impl ErrorHandlingMiddleware {
    /// Retry transient errors (timeouts and rate limits) with the
    /// default strategy.
    #[must_use]
    pub fn new() -> Self {
        Self::with_strategy(
            RetryStrategy::default(),
            Arc::new(|error: &NodeError| {
                matches!(
                    error,
                    NodeError::Timeout { .. } | NodeError::RateLimited { .. }
                )
            }),
        )
    }

    /// Explicit strategy and predicate.
    #[must_use]
    pub fn with_strategy(strategy: RetryStrategy, should_retry: RetryPredicate) -> Self {
        Self {
            strategy,
            should_retry,
        }
    }
}

impl Default for ErrorHandlingMiddleware {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ErrorHandlingMiddleware {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ErrorHandlingMiddleware")
            .field("strategy", &self.strategy)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl Middleware for ErrorHandlingMiddleware {
    async fn handle(&self, ctx: &Invocation, next: Next<'_>) -> Result<Output, NodeError> {
        let predicate = Arc::clone(&self.should_retry);
        self.strategy
            .run(move |error| predicate(error), || next.run(ctx))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::middleware::testing::invocation;
    use crate::middleware::{Chain, HandlerFn};
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    fn eventually_ok(fail_times: u32, calls: Arc<AtomicU32>) -> Box<HandlerFn> {
        Box::new(move |_ctx| {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            Box::pin(async move {
                if n < fail_times {
                    Err(NodeError::Timeout {
                        duration: Duration::from_millis(1),
                    })
                } else {
                    Ok(Output::new())
                }
            })
        })
    }

    #[tokio::test]
    async fn retries_transient_errors() {
        let chain = Chain::new().with(Arc::new(ErrorHandlingMiddleware::with_strategy(
            RetryStrategy::fixed(3, Duration::from_millis(1)),
            Arc::new(|e| e.is_timeout()),
        )));
        let calls = Arc::new(AtomicU32::new(0));
        let terminal = eventually_ok(2, Arc::clone(&calls));
        let ctx = invocation("action.http");
        assert!(chain.execute(&ctx, terminal.as_ref()).await.is_ok());
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn predicate_blocks_retry() {
        let chain = Chain::new().with(Arc::new(ErrorHandlingMiddleware::with_strategy(
            RetryStrategy::fixed(3, Duration::from_millis(1)),
            Arc::new(|_| false),
        )));
        let calls = Arc::new(AtomicU32::new(0));
        let terminal = eventually_ok(2, Arc::clone(&calls));
        let ctx = invocation("action.http");
        assert!(chain.execute(&ctx, terminal.as_ref()).await.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
