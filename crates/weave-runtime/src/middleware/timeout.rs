//! Deadline enforcement middlewares.

use std::time::Duration;

use async_trait::async_trait;
use weave_resilience::{timeout, timeout_with_grace, ResilienceError};

use super::{Invocation, Middleware, Next};
use crate::error::NodeError;
use crate::handler::Output;

/// Enforces the invocation's effective deadline; expiry cancels the
/// node and surfaces a timeout error.
#[derive(Debug, Clone, Copy, Default)]
pub struct TimeoutMiddleware;

impl TimeoutMiddleware {
    /// New timeout middleware.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Middleware for TimeoutMiddleware {
    async fn handle(&self, ctx: &Invocation, next: Next<'_>) -> Result<Output, NodeError> {
        let Some(deadline) = ctx.effective_timeout else {
            return next.run(ctx).await;
        };
        match timeout(deadline, next.run(ctx)).await {
            Ok(result) => result,
            Err(ResilienceError::Timeout { duration }) => {
                ctx.cancel.cancel();
                Err(NodeError::Timeout { duration })
            }
            Err(other) => Err(other.into()),
        }
    }
}

/// As [`TimeoutMiddleware`], but after the primary deadline the node's
/// cancellation fires and the handler gets a short grace window to
/// clean up before the timeout error surfaces.
#[derive(Debug, Clone, Copy)]
pub struct GracefulTimeoutMiddleware {
    grace: Duration,
}

impl GracefulTimeoutMiddleware {
    /// Grace window after the primary deadline.
    #[must_use]
    pub fn new(grace: Duration) -> Self {
        Self { grace }
    }
}

#[async_trait]
impl Middleware for GracefulTimeoutMiddleware {
    async fn handle(&self, ctx: &Invocation, next: Next<'_>) -> Result<Output, NodeError> {
        let Some(deadline) = ctx.effective_timeout else {
            return next.run(ctx).await;
        };
        match timeout_with_grace(deadline, self.grace, &ctx.cancel, next.run(ctx)).await {
            Ok(result) => result,
            Err(ResilienceError::Timeout { duration }) => Err(NodeError::Timeout { duration }),
            Err(other) => Err(other.into()),
        }
    }
}
