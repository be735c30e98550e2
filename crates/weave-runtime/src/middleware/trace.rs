//! Span-per-node tracing.

use async_trait::async_trait;
use tracing::{error, info_span, Instrument};

use super::{Invocation, Middleware, Next};
use crate::error::NodeError;
use crate::handler::Output;

/// Opens a child span per node tagged with execution, workflow,
/// workspace, node, and type; failures attach the error to the span.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingMiddleware;

impl TracingMiddleware {
    /// New tracing middleware.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Middleware for TracingMiddleware {
    async fn handle(&self, ctx: &Invocation, next: Next<'_>) -> Result<Output, NodeError> {
        let span = info_span!(
            "node.execute",
            trace_id = %ctx.runtime.trace_id,
            execution_id = %ctx.runtime.execution_id,
            workflow_id = %ctx.runtime.workflow_id,
            workspace_id = %ctx.runtime.workspace_id,
            node_id = %ctx.node.id,
            node_type = %ctx.node.node_type,
        );
        async {
            let result = next.run(ctx).await;
            if let Err(err) = &result {
                error!(error = %err, "node execution failed");
            }
            result
        }
        .instrument(span)
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::middleware::testing::{invocation, ok_terminal};
    use crate::middleware::Chain;
    use serde_json::json;
    use std::sync::Arc;

    #[tokio::test]
    async fn wraps_without_altering_result() {
        let chain = Chain::new().with(Arc::new(TracingMiddleware::new()));
        let ctx = invocation("action.set");
        let terminal = ok_terminal(json!({"v": 2}));
        let out = chain.execute(&ctx, terminal.as_ref()).await.unwrap();
        assert_eq!(out.get("v"), Some(&json!(2)));
    }
}
