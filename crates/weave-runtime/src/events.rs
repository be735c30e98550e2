//! Lifecycle event publication on workspace channels.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::sync::Arc;
use tracing::warn;
use weave_core::{ExecutionId, NodeId, WorkflowId, WorkspaceId};

use crate::store::PubSub;

/// Event kinds published by the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventKind {
    #[serde(rename = "execution.started")]
    ExecutionStarted,
    #[serde(rename = "execution.completed")]
    ExecutionCompleted,
    #[serde(rename = "execution.failed")]
    ExecutionFailed,
    #[serde(rename = "execution.cancelled")]
    ExecutionCancelled,
    #[serde(rename = "node.started")]
    NodeStarted,
    #[serde(rename = "node.completed")]
    NodeCompleted,
    #[serde(rename = "node.failed")]
    NodeFailed,
    #[serde(rename = "workflow.activated")]
    WorkflowActivated,
    #[serde(rename = "workflow.deactivated")]
    WorkflowDeactivated,
}

impl EventKind {
    /// The wire name (`execution.started`, ...).
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::ExecutionStarted => "execution.started",
            Self::ExecutionCompleted => "execution.completed",
            Self::ExecutionFailed => "execution.failed",
            Self::ExecutionCancelled => "execution.cancelled",
            Self::NodeStarted => "node.started",
            Self::NodeCompleted => "node.completed",
            Self::NodeFailed => "node.failed",
            Self::WorkflowActivated => "workflow.activated",
            Self::WorkflowDeactivated => "workflow.deactivated",
        }
    }
}

/// A lifecycle event as published on `workspace:<id>` channels.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    /// Event kind.
    #[serde(rename = "type")]
    pub kind: EventKind,
    /// When the event was emitted.
    pub timestamp: DateTime<Utc>,
    /// The workspace channel scope.
    pub workspace_id: WorkspaceId,
    /// Workflow, when relevant.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub workflow_id: Option<WorkflowId>,
    /// Execution, when relevant.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub execution_id: Option<ExecutionId>,
    /// Node, for node-scoped events.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub node_id: Option<NodeId>,
    /// Event-specific payload (status, duration, error, preview...).
    #[serde(default)]
    pub data: Map<String, Value>,
}

impl Event {
    /// Event with empty payload.
    #[must_use]
    pub fn new(kind: EventKind, workspace_id: WorkspaceId) -> Self {
        Self {
            kind,
            timestamp: Utc::now(),
            workspace_id,
            workflow_id: None,
            execution_id: None,
            node_id: None,
            data: Map::new(),
        }
    }

    /// Attach the workflow id.
    #[must_use]
    pub fn workflow(mut self, id: WorkflowId) -> Self {
        self.workflow_id = Some(id);
        self
    }

    /// Attach the execution id.
    #[must_use]
    pub fn execution(mut self, id: ExecutionId) -> Self {
        self.execution_id = Some(id);
        self
    }

    /// Attach the node id.
    #[must_use]
    pub fn node(mut self, id: NodeId) -> Self {
        self.node_id = Some(id);
        self
    }

    /// Add a payload entry.
    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: Value) -> Self {
        self.data.insert(key.into(), value);
        self
    }
}

/// Byte budget for output previews embedded in `node.completed` events.
pub const DEFAULT_PREVIEW_BYTES: usize = 1024;

/// Truncate a JSON value to a preview within the byte budget; truncated
/// previews become `{"truncated": true, "preview": "..."}`.
#[must_use]
pub fn output_preview(value: &Value, max_bytes: usize) -> Value {
    let rendered = value.to_string();
    if rendered.len() <= max_bytes {
        return value.clone();
    }
    let mut cut = max_bytes;
    while cut > 0 && !rendered.is_char_boundary(cut) {
        cut -= 1;
    }
    serde_json::json!({
        "truncated": true,
        "preview": &rendered[..cut],
    })
}

/// Fan-out of lifecycle events on a workspace channel.
pub struct EventPublisher {
    bus: Arc<dyn PubSub>,
}

impl EventPublisher {
    /// Publisher over a pub/sub bus.
    #[must_use]
    pub fn new(bus: Arc<dyn PubSub>) -> Self {
        Self { bus }
    }

    /// The channel for a workspace.
    #[must_use]
    pub fn channel(workspace_id: &WorkspaceId) -> String {
        format!("workspace:{workspace_id}")
    }

    /// Publish an event on its workspace channel. Publication failures
    /// are logged, never fatal: events are observability, not state.
    pub async fn publish(&self, event: Event) {
        let channel = Self::channel(&event.workspace_id);
        let payload = match serde_json::to_string(&event) {
            Ok(payload) => payload,
            Err(err) => {
                warn!(error = %err, "failed to encode event");
                return;
            }
        };
        if let Err(err) = self.bus.publish(&channel, payload).await {
            warn!(error = %err, channel, "failed to publish event");
        }
    }
}

impl std::fmt::Debug for EventPublisher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventPublisher").finish_non_exhaustive()
    }
}
