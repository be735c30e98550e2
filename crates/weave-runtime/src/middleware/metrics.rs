//! Execution metrics via the `metrics` facade.

use async_trait::async_trait;
use metrics::{counter, gauge, histogram};

use super::{Invocation, Middleware, Next};
use crate::error::{ErrorCategory, NodeError};
use crate::handler::Output;

/// Emits per-node counters, a duration histogram, and an active-node
/// gauge, labelled by workspace, node type, and outcome. Errors are
/// additionally classified by [`ErrorCategory`].
#[derive(Debug, Clone, Copy, Default)]
pub struct MetricsMiddleware;

impl MetricsMiddleware {
    /// New metrics middleware.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Middleware for MetricsMiddleware {
    async fn handle(&self, ctx: &Invocation, next: Next<'_>) -> Result<Output, NodeError> {
        let workspace = ctx.runtime.workspace_id.to_string();
        let node_type = ctx.node.node_type.clone();

        gauge!("weave_nodes_active").increment(1.0);
        let started = std::time::Instant::now();
        let result = next.run(ctx).await;
        let elapsed = started.elapsed();
        gauge!("weave_nodes_active").decrement(1.0);

        histogram!(
            "weave_node_duration_seconds",
            "workspace" => workspace.clone(),
            "node_type" => node_type.clone(),
        )
        .record(elapsed.as_secs_f64());

        let status = if result.is_ok() { "success" } else { "error" };
        counter!(
            "weave_node_executions_total",
            "workspace" => workspace.clone(),
            "node_type" => node_type.clone(),
            "status" => status,
        )
        .increment(1);

        if let Err(error) = &result {
            let category = ErrorCategory::classify(&error.to_string());
            counter!(
                "weave_node_errors_total",
                "workspace" => workspace,
                "node_type" => node_type,
                "category" => category.as_str(),
            )
            .increment(1);
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
    use std::sync::Arc;

    #[tokio::test]
    async fn success_passes_through() {
        let chain = Chain::new().with(Arc::new(MetricsMiddleware::new()));
        let ctx = invocation("action.set");
        let terminal = ok_terminal(json!({"v": 1}));
        assert!(chain.execute(&ctx, terminal.as_ref()).await.is_ok());
    }

    #[tokio::test]
    async fn error_passes_through() {
        let chain = Chain::new().with(Arc::new(MetricsMiddleware::new()));
        let ctx = invocation("action.http");
        let terminal = err_terminal("connection refused");
        assert!(chain.execute(&ctx, terminal.as_ref()).await.is_err());
    }
}
