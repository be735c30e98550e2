//! Node handler interface and registry.
//!
//! Handlers are the executable realization of node types and live
//! outside the core: the runtime only dispatches through this trait.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::RwLock;
use serde_json::Value;
use weave_core::{CredentialId, ExecutionId, NodeId, WorkflowId, WorkspaceId};

use crate::error::{EngineError, NodeError};

/// A node output mapping.
pub type Output = serde_json::Map<String, Value>;

/// Decrypted credential material handed to handlers.
pub type CredentialData = serde_json::Map<String, Value>;

/// Resolves credential ids to decrypted credential data.
#[async_trait]
pub trait CredentialResolver: Send + Sync {
    /// Fetch and decrypt the credential.
    async fn resolve(&self, id: &CredentialId) -> Result<CredentialData, NodeError>;
}

/// A resolver that knows no credentials; useful for tests and workflows
/// without integrations.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullCredentialResolver;

#[async_trait]
impl CredentialResolver for NullCredentialResolver {
    async fn resolve(&self, id: &CredentialId) -> Result<CredentialData, NodeError> {
        Err(NodeError::Credential(format!("unknown credential: {id}")))
    }
}

/// Everything a handler sees for one node invocation.
#[derive(Clone)]
pub struct HandlerContext {
    /// The running execution.
    pub execution_id: ExecutionId,
    /// The workflow being executed.
    pub workflow_id: WorkflowId,
    /// The owning workspace.
    pub workspace_id: WorkspaceId,
    /// The node being executed.
    pub node_id: NodeId,
    /// Assembled node input (`$input`, `$json`, `$node`, predecessors by
    /// id).
    pub input: Output,
    /// Node configuration with expressions already resolved.
    pub config: Output,
    /// Workflow variables at invocation time.
    pub variables: Output,
    /// Credential access for integrations.
    pub credentials: Arc<dyn CredentialResolver>,
    /// Fired when the node should stop (sibling failure, timeout,
    /// execution cancellation). Handlers doing I/O should watch it and
    /// return promptly.
    pub cancellation: tokio_util::sync::CancellationToken,
}

impl std::fmt::Debug for HandlerContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HandlerContext")
            .field("execution_id", &self.execution_id)
            .field("workflow_id", &self.workflow_id)
            .field("workspace_id", &self.workspace_id)
            .field("node_id", &self.node_id)
            .finish_non_exhaustive()
    }
}

/// The executable realization of a node type.
#[async_trait]
pub trait NodeHandler: Send + Sync {
    /// Run the node. Handlers should honour cancellation of the ambient
    /// task and return promptly when it fires.
    async fn execute(&self, ctx: HandlerContext) -> Result<Output, NodeError>;

    /// Handler-level default deadline, between the node override and the
    /// engine default.
    fn default_timeout(&self) -> Option<Duration> {
        None
    }
}

/// Registry mapping type tags to handlers.
#[derive(Default)]
pub struct HandlerRegistry {
    handlers: RwLock<HashMap<String, Arc<dyn NodeHandler>>>,
}

impl HandlerRegistry {
    /// Empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler for a type tag. Double registration is an
    /// error.
    pub fn register(
        &self,
        type_tag: impl Into<String>,
        handler: Arc<dyn NodeHandler>,
    ) -> Result<(), EngineError> {
        let type_tag = type_tag.into();
        let mut handlers = self.handlers.write();
        if handlers.contains_key(&type_tag) {
            return Err(EngineError::HandlerExists(type_tag));
        }
        handlers.insert(type_tag, handler);
        Ok(())
    }

    /// Replace (or add) a handler for a type tag.
    pub fn register_replacing(&self, type_tag: impl Into<String>, handler: Arc<dyn NodeHandler>) {
        self.handlers.write().insert(type_tag.into(), handler);
    }

    /// Look up a handler by type tag.
    #[must_use]
    pub fn get(&self, type_tag: &str) -> Option<Arc<dyn NodeHandler>> {
        self.handlers.read().get(type_tag).cloned()
    }

    /// Whether a handler exists for the type tag.
    #[must_use]
    pub fn contains(&self, type_tag: &str) -> bool {
        self.handlers.read().contains_key(type_tag)
    }

    /// Registered type tags, sorted.
    #[must_use]
    pub fn type_tags(&self) -> Vec<String> {
        let mut tags: Vec<String> = self.handlers.read().keys().cloned().collect();
        tags.sort();
        tags
    }
}

impl std::fmt::Debug for HandlerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HandlerRegistry")
            .field("types", &self.type_tags())
            .finish()
    }
}
