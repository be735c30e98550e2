//! Per-node-type circuit breaking.

use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use weave_resilience::{CircuitBreaker, CircuitBreakerConfig};

use super::{Invocation, Middleware, Next};
use crate::error::NodeError;
use crate::handler::Output;

/// One circuit breaker per node type: repeated failures of a type open
/// its circuit and short-circuit further calls without reaching the
/// handler. Cancellations do not count as failures.
#[derive(Debug)]
pub struct CircuitBreakerMiddleware {
    config: CircuitBreakerConfig,
    breakers: DashMap<String, Arc<CircuitBreaker>>,
}

impl CircuitBreakerMiddleware {
    /// Middleware with default breaker tuning.
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(CircuitBreakerConfig::default())
    }

    /// Middleware with explicit breaker tuning.
    #[must_use]
    pub fn with_config(config: CircuitBreakerConfig) -> Self {
        Self {
            config,
            breakers: DashMap::new(),
        }
    }

    fn breaker_for(&self, node_type: &str) -> Arc<CircuitBreaker> {
        self.breakers
            .entry(node_type.to_owned())
            .or_insert_with(|| Arc::new(CircuitBreaker::with_config(self.config.clone())))
            .clone()
    }
}

impl Default for CircuitBreakerMiddleware {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Middleware for CircuitBreakerMiddleware {
    async fn handle(&self, ctx: &Invocation, next: Next<'_>) -> Result<Output, NodeError> {
        let breaker = self.breaker_for(&ctx.node.node_type);
        if breaker.try_acquire().is_err() {
            return Err(NodeError::CircuitOpen {
                node_type: ctx.node.node_type.clone(),
            });
        }
        let result = next.run(ctx).await;
        match &result {
            Ok(_) => breaker.record_success(),
            Err(error) if error.is_cancelled() => {}
            Err(_) => breaker.record_failure(),
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::middleware::testing::{err_terminal, invocation, ok_terminal};
    use crate::middleware::Chain;
    use serde_json::json;
    use std::time::Duration;

    fn tight_config() -> CircuitBreakerConfig {
        CircuitBreakerConfig {
            failure_threshold: 2,
            window: Duration::from_secs(60),
            reset_timeout: Duration::from_secs(60),
            half_open_successes: 1,
        }
    }

    #[tokio::test]
    async fn opens_after_threshold_and_short_circuits() {
        let chain = Chain::new().with(Arc::new(CircuitBreakerMiddleware::with_config(
            tight_config(),
        )));
        let ctx = invocation("integration.slack");
        let failing = err_terminal("connection refused");

        assert!(chain.execute(&ctx, failing.as_ref()).await.is_err());
        assert!(chain.execute(&ctx, failing.as_ref()).await.is_err());

        // Circuit is now open; even a healthy terminal is refused.
        let healthy = ok_terminal(json!({}));
        let err = chain.execute(&ctx, healthy.as_ref()).await.unwrap_err();
        assert!(matches!(err, NodeError::CircuitOpen { .. }));
    }

    #[tokio::test]
    async fn breakers_are_per_node_type() {
        let chain = Chain::new().with(Arc::new(CircuitBreakerMiddleware::with_config(
            tight_config(),
        )));
        let slack = invocation("integration.slack");
        let failing = err_terminal("boom");
        assert!(chain.execute(&slack, failing.as_ref()).await.is_err());
        assert!(chain.execute(&slack, failing.as_ref()).await.is_err());

        // A different type has its own closed breaker.
        let http = invocation("action.http");
        let healthy = ok_terminal(json!({}));
        assert!(chain.execute(&http, healthy.as_ref()).await.is_ok());
    }

    #[tokio::test]
    async fn cancellation_does_not_trip_breaker() {
        let chain = Chain::new().with(Arc::new(CircuitBreakerMiddleware::with_config(
            tight_config(),
        )));
        let ctx = invocation("integration.slack");
        let cancelled: Box<crate::middleware::HandlerFn> =
            Box::new(|_ctx| Box::pin(async { Err(NodeError::Cancelled) }));

        for _ in 0..5 {
            assert!(chain.execute(&ctx, cancelled.as_ref()).await.is_err());
        }
        let healthy = ok_terminal(json!({}));
        assert!(chain.execute(&ctx, healthy.as_ref()).await.is_ok());
    }
}
