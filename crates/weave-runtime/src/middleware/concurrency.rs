//! Per-workspace concurrency capping.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use weave_resilience::Bulkhead;

use super::{Invocation, Middleware, Next};
use crate::error::NodeError;
use crate::handler::Output;

/// Caps concurrent node executions per workspace with a bulkhead
/// (bounded waiters, acquire timeout).
#[derive(Debug)]
pub struct ConcurrencyMiddleware {
    max_concurrent: usize,
    max_waiters: usize,
    acquire_timeout: Duration,
    bulkheads: DashMap<String, Arc<Bulkhead>>,
}

impl ConcurrencyMiddleware {
    /// Cap with defaults: as many waiters as permits, 30s acquire
    /// timeout.
    #[must_use]
    pub fn new(max_concurrent: usize) -> Self {
        Self::with_limits(max_concurrent, max_concurrent, Duration::from_secs(30))
    }

    /// Fully configured cap.
    #[must_use]
    pub fn with_limits(
        max_concurrent: usize,
        max_waiters: usize,
        acquire_timeout: Duration,
    ) -> Self {
        Self {
            max_concurrent,
            max_waiters,
            acquire_timeout,
            bulkheads: DashMap::new(),
        }
    }

    fn bulkhead_for(&self, workspace: &str) -> Arc<Bulkhead> {
        self.bulkheads
            .entry(workspace.to_owned())
            .or_insert_with(|| {
                Arc::new(Bulkhead::with_limits(
                    self.max_concurrent,
                    self.max_waiters,
                    self.acquire_timeout,
                ))
            })
            .clone()
    }
}

#[async_trait]
impl Middleware for ConcurrencyMiddleware {
    async fn handle(&self, ctx: &Invocation, next: Next<'_>) -> Result<Output, NodeError> {
        let bulkhead = self.bulkhead_for(ctx.runtime.workspace_id.as_str());
        let _permit = bulkhead.acquire().await.map_err(NodeError::from)?;
        next.run(ctx).await
    }
}
