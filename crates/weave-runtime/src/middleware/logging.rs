//! Structured start/finish logging around node execution.

use async_trait::async_trait;
use serde_json::Value;
use tracing::debug;

use super::{Invocation, Middleware, Next};
use crate::error::NodeError;
use crate::handler::Output;

/// Logs node start and finish at debug level, with input/output
/// previews truncated to a byte budget.
#[derive(Debug, Clone)]
pub struct LoggingMiddleware {
    max_preview_bytes: usize,
}

impl LoggingMiddleware {
    /// Default 512-byte previews.
    #[must_use]
    pub fn new() -> Self {
        Self {
            max_preview_bytes: 512,
        }
    }

    /// Explicit preview budget; 0 disables previews.
    #[must_use]
    pub fn with_preview_bytes(max_preview_bytes: usize) -> Self {
        Self { max_preview_bytes }
    }

    fn preview(&self, value: &Output) -> String {
        if self.max_preview_bytes == 0 {
            return String::new();
        }
        let mut rendered = Value::Object(value.clone()).to_string();
        if rendered.len() > self.max_preview_bytes {
            let mut cut = self.max_preview_bytes;
            while cut > 0 && !rendered.is_char_boundary(cut) {
                cut -= 1;
            }
            rendered.truncate(cut);
            rendered.push('…');
        }
        rendered
    }
}

impl Default for LoggingMiddleware {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Middleware for LoggingMiddleware {
    async fn handle(&self, ctx: &Invocation, next: Next<'_>) -> Result<Output, NodeError> {
        debug!(
            execution_id = %ctx.runtime.execution_id,
            node_id = %ctx.node.id,
            node_type = %ctx.node.node_type,
            input = %self.preview(&ctx.input),
            "node starting"
        );
        let started = std::time::Instant::now();
        let result = next.run(ctx).await;
        match &result {
            Ok(output) => debug!(
                execution_id = %ctx.runtime.execution_id,
                node_id = %ctx.node.id,
                duration_ms = started.elapsed().as_millis() as u64,
                output = %self.preview(output),
                "node finished"
            ),
            Err(error) => debug!(
                execution_id = %ctx.runtime.execution_id,
                node_id = %ctx.node.id,
                duration_ms = started.elapsed().as_millis() as u64,
                error = %error,
                "node failed"
            ),
        }
        result
    }
}
