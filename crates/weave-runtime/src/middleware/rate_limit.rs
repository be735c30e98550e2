//! Per-workspace and per-node-type rate limiting.

use std::time::Duration;

use async_trait::async_trait;
use tracing::debug;
use weave_resilience::KeyedRateLimiter;

use super::{Invocation, Middleware, Next};
use crate::error::NodeError;
use crate::handler::Output;

/// What to do when a bucket is empty.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateLimitMode {
    /// Wait up to the budget for a token, then fail.
    Wait {
        /// Maximum time to wait per bucket.
        max_wait: Duration,
    },
    /// Fail immediately.
    FailFast,
}

/// Rate limiting configuration.
#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    /// Per-workspace requests per second.
    pub workspace_rps: u32,
    /// Per-workspace burst.
    pub workspace_burst: u32,
    /// Per-node-type requests per second.
    pub node_type_rps: u32,
    /// Per-node-type burst.
    pub node_type_burst: u32,
    /// Advisory global ceiling; carried but not enforced.
    pub global_rps: Option<u32>,
    /// Behaviour when a bucket is dry.
    pub mode: RateLimitMode,
    /// Exact node types subject to limiting, in addition to every
    /// `integration.*` type.
    pub limited_types: Vec<String>,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            workspace_rps: 10,
            workspace_burst: 20,
            node_type_rps: 5,
            node_type_burst: 10,
            global_rps: None,
            mode: RateLimitMode::Wait {
                max_wait: Duration::from_secs(10),
            },
            limited_types: vec![
                "action.http".to_owned(),
                "action.send_email".to_owned(),
                "action.sub_workflow".to_owned(),
            ],
        }
    }
}

/// Token buckets per workspace and per node type; only node types
/// named by the config (or under `integration.`) are gated.
pub struct RateLimitMiddleware {
    config: RateLimitConfig,
    workspace_buckets: KeyedRateLimiter,
    type_buckets: KeyedRateLimiter,
}

impl RateLimitMiddleware {
    /// Middleware from configuration.
    pub fn new(config: RateLimitConfig) -> Result<Self, NodeError> {
        let workspace_buckets =
            KeyedRateLimiter::new(config.workspace_rps, config.workspace_burst)
                .map_err(NodeError::from)?;
        let type_buckets = KeyedRateLimiter::new(config.node_type_rps, config.node_type_burst)
            .map_err(NodeError::from)?;
        Ok(Self {
            config,
            workspace_buckets,
            type_buckets,
        })
    }

    fn applies_to(&self, node_type: &str) -> bool {
        node_type.starts_with("integration.")
            || self.config.limited_types.iter().any(|t| t == node_type)
    }

    async fn take(&self, bucket: &KeyedRateLimiter, key: &str, scope: &str) -> Result<(), NodeError> {
        let refused = match self.config.mode {
            RateLimitMode::FailFast => bucket.check(key).is_err(),
            RateLimitMode::Wait { max_wait } => {
                bucket.acquire_within(key, max_wait).await.is_err()
            }
        };
        if refused {
            debug!(scope, key, "rate limit refused node");
            return Err(NodeError::RateLimited {
                scope: format!("{scope} {key}"),
            });
        }
        Ok(())
    }
}

impl std::fmt::Debug for RateLimitMiddleware {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RateLimitMiddleware")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl Middleware for RateLimitMiddleware {
    async fn handle(&self, ctx: &Invocation, next: Next<'_>) -> Result<Output, NodeError> {
        if !self.applies_to(&ctx.node.node_type) {
            return next.run(ctx).await;
        }
        let workspace = ctx.runtime.workspace_id.to_string();
        self.take(&self.workspace_buckets, &workspace, "workspace")
            .await?;
        self.take(&self.type_buckets, &ctx.node.node_type, "node type")
            .await?;
        next.run(ctx).await
    }
}
