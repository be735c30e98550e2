//! Conditional middleware application.

use std::sync::Arc;

use async_trait::async_trait;
use weave_workflow::NodeDefinition;

use super::{Invocation, Middleware, Next};
use crate::error::NodeError;
use crate::handler::Output;

/// Decides whether a wrapped middleware applies to a node.
pub type NodePredicate = Arc<dyn Fn(&NodeDefinition) -> bool + Send + Sync>;

/// Applies the inner middleware only when the predicate matches;
/// otherwise control short-circuits straight to `next`.
pub struct Conditional {
    predicate: NodePredicate,
    inner: Arc<dyn Middleware>,
}

impl Conditional {
    /// Gate a middleware behind an arbitrary predicate.
    #[must_use]
    pub fn new(predicate: NodePredicate, inner: Arc<dyn Middleware>) -> Self {
        Self { predicate, inner }
    }

    /// Apply only to the listed node types.
    #[must_use]
    pub fn for_node_types(types: Vec<String>, inner: Arc<dyn Middleware>) -> Self {
        Self::new(
            Arc::new(move |node: &NodeDefinition| types.iter().any(|t| t == &node.node_type)),
            inner,
        )
    }

    /// Apply only to node types in the listed categories (the segment
    /// before the first `.`; `integration.slack` is category
    /// `integration`).
    #[must_use]
    pub fn for_categories(categories: Vec<String>, inner: Arc<dyn Middleware>) -> Self {
        Self::new(
            Arc::new(move |node: &NodeDefinition| {
                let category = node.node_type.split('.').next().unwrap_or_default();
                categories.iter().any(|c| c == category)
            }),
            inner,
        )
    }
}

impl std::fmt::Debug for Conditional {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Conditional").finish_non_exhaustive()
    }
}

#[async_trait]
impl Middleware for Conditional {
    async fn handle(&self, ctx: &Invocation, next: Next<'_>) -> Result<Output, NodeError> {
        if (self.predicate)(&ctx.node) {
            self.inner.handle(ctx, next).await
        } else {
            next.run(ctx).await
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::middleware::testing::{invocation, ok_terminal};
    use crate::middleware::Chain;
    use serde_json::json;
    use std::sync::atomic::{AtomicU32, Ordering};

    struct CountingMiddleware(Arc<AtomicU32>);

    #[async_trait]
    impl Middleware for CountingMiddleware {
        async fn handle(&self, ctx: &Invocation, next: Next<'_>) -> Result<Output, NodeError> {
            self.0.fetch_add(1, Ordering::SeqCst);
            next.run(ctx).await
        }
    }

    #[tokio::test]
    async fn applies_only_to_listed_types() {
        let hits = Arc::new(AtomicU32::new(0));
        let chain = Chain::new().with(Arc::new(Conditional::for_node_types(
            vec!["action.http".into()],
            Arc::new(CountingMiddleware(Arc::clone(&hits))),
        )));
        let terminal = ok_terminal(json!({}));

        chain
            .execute(&invocation("action.http"), terminal.as_ref())
            .await
            .unwrap();
        chain
            .execute(&invocation("action.set"), terminal.as_ref())
            .await
            .unwrap();

        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn applies_by_category() {
        let hits = Arc::new(AtomicU32::new(0));
        let chain = Chain::new().with(Arc::new(Conditional::for_categories(
            vec!["integration".into()],
            Arc::new(CountingMiddleware(Arc::clone(&hits))),
        )));
        let terminal = ok_terminal(json!({}));

        chain
            .execute(&invocation("integration.slack"), terminal.as_ref())
            .await
            .unwrap();
        chain
            .execute(&invocation("integration.github"), terminal.as_ref())
            .await
            .unwrap();
        chain
            .execute(&invocation("logic.condition"), terminal.as_ref())
            .await
            .unwrap();

        assert_eq!(hits.load(Ordering::SeqCst), 2);
    }
}
