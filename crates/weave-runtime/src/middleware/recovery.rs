//! Panic isolation and panic-scoped retry.

use std::time::Duration;

use async_trait::async_trait;
use futures::FutureExt;
use tracing::error;

use super::{Invocation, Middleware, Next};
use crate::error::NodeError;
use crate::handler::Output;

/// Catches panics inside handlers and converts them into structured
/// node errors; the engine keeps running.
#[derive(Debug, Clone, Copy, Default)]
pub struct RecoveryMiddleware;

impl RecoveryMiddleware {
    /// New recovery middleware.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_owned()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_owned()
    }
}

#[async_trait]
impl Middleware for RecoveryMiddleware {
    async fn handle(&self, ctx: &Invocation, next: Next<'_>) -> Result<Output, NodeError> {
        match std::panic::AssertUnwindSafe(next.run(ctx)).catch_unwind().await {
            Ok(result) => result,
            Err(payload) => {
                let message = panic_message(payload.as_ref());
                error!(
                    execution_id = %ctx.runtime.execution_id,
                    node_id = %ctx.node.id,
                    panic = %message,
                    "recovered panic in node handler"
                );
                Err(NodeError::Panic(message))
            }
        }
    }
}

/// Retries a node after a recovered panic, up to a bound; the last
/// failure surfaces.
#[derive(Debug, Clone, Copy)]
pub struct RetryOnPanicMiddleware {
    max_retries: u32,
    delay: Duration,
}

impl RetryOnPanicMiddleware {
    /// Retry up to `max_retries` times with a fixed delay between
    /// attempts.
    #[must_use]
    pub fn new(max_retries: u32, delay: Duration) -> Self {
        Self { max_retries, delay }
    }
}

#[async_trait]
impl Middleware for RetryOnPanicMiddleware {
    async fn handle(&self, ctx: &Invocation, next: Next<'_>) -> Result<Output, NodeError> {
        let mut attempts = 0;
        loop {
            match next.run(ctx).await {
                Err(NodeError::Panic(message)) if attempts < self.max_retries => {
                    attempts += 1;
                    tracing::warn!(
                        node_id = %ctx.node.id,
                        attempts,
                        panic = %message,
                        "retrying after recovered panic"
                    );
                    tokio::time::sleep(self.delay).await;
                }
                other => return other,
            }
        }
    }
}
