//! Serde-facing workflow structures and their JSON ingestion.
//!
//! The wire format accepts both camelCase and snake_case field spellings
//! for connection endpoints and both `parameters` and `config` for node
//! configuration. Serialization always emits camelCase, so
//! `parse(serialize(def))` reproduces the definition.

use serde::{Deserialize, Serialize};
use weave_core::{NodeId, WorkflowId, WorkspaceId};

use crate::error::WorkflowError;

/// A complete, immutable workflow definition.
///
/// Shared read-only between executions; a single execution never mutates
/// its definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowDefinition {
    /// Workflow identity.
    #[serde(default)]
    pub id: WorkflowId,
    /// Owning workspace.
    #[serde(default, alias = "workspace_id")]
    pub workspace_id: WorkspaceId,
    /// Display name.
    #[serde(default)]
    pub name: String,
    /// Ordered node list.
    #[serde(default)]
    pub nodes: Vec<NodeDefinition>,
    /// Directed connections between node handles.
    #[serde(default)]
    pub connections: Vec<Connection>,
    /// Workflow-level settings.
    #[serde(default)]
    pub settings: WorkflowSettings,
}

impl WorkflowDefinition {
    /// Parse a definition from its JSON wire format.
    pub fn from_json(raw: &str) -> Result<Self, WorkflowError> {
        Ok(serde_json::from_str(raw)?)
    }

    /// Serialize back to the JSON wire format.
    pub fn to_json(&self) -> Result<String, WorkflowError> {
        Ok(serde_json::to_string(self)?)
    }

    /// Look up a node by id.
    #[must_use]
    pub fn node(&self, id: &NodeId) -> Option<&NodeDefinition> {
        self.nodes.iter().find(|n| &n.id == id)
    }
}

/// A single node in a workflow.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeDefinition {
    /// Unique id within the workflow.
    pub id: NodeId,
    /// Type tag resolved against the handler registry
    /// (e.g. `action.http`, `logic.condition`).
    #[serde(rename = "type", default)]
    pub node_type: String,
    /// Display name. Falls back to the id when absent.
    #[serde(default)]
    pub name: Option<String>,
    /// Open configuration mapping; string values may contain
    /// `{{ expression }}` templates.
    #[serde(rename = "parameters", alias = "config", default)]
    pub config: serde_json::Map<String, serde_json::Value>,
    /// Editor position, carried through untouched.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<Position>,
    /// Disabled nodes are dropped at graph build time.
    #[serde(default)]
    pub disabled: bool,
    /// Retry the node handler on failure.
    #[serde(default)]
    pub retry_on_fail: bool,
    /// Maximum retries when `retry_on_fail` is set.
    #[serde(default)]
    pub max_retries: u32,
    /// Per-node timeout in milliseconds, overriding handler and global
    /// defaults.
    #[serde(rename = "timeout", default, skip_serializing_if = "Option::is_none")]
    pub timeout_ms: Option<u64>,
}

impl NodeDefinition {
    /// Create a minimal node with an id and type tag.
    #[must_use]
    pub fn new(id: impl Into<NodeId>, node_type: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            node_type: node_type.into(),
            name: None,
            config: serde_json::Map::new(),
            position: None,
            disabled: false,
            retry_on_fail: false,
            max_retries: 0,
            timeout_ms: None,
        }
    }

    /// Replace the node configuration.
    #[must_use]
    pub fn with_config(mut self, config: serde_json::Map<String, serde_json::Value>) -> Self {
        self.config = config;
        self
    }

    /// Mark the node disabled.
    #[must_use]
    pub fn disabled(mut self) -> Self {
        self.disabled = true;
        self
    }

    /// Display name, falling back to the id.
    #[must_use]
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or_else(|| self.id.as_str())
    }
}

/// Editor canvas position.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

fn default_source_handle() -> String {
    "output".to_owned()
}

fn default_target_handle() -> String {
    "input".to_owned()
}

/// A directed edge from a source node's output handle to a target node's
/// input handle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Connection {
    /// Optional stable id from the editor.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Source node id.
    #[serde(alias = "source_node_id")]
    pub source_node_id: NodeId,
    /// Source handle; distinguishes semantic output ports
    /// (e.g. a condition's `true`/`false`).
    #[serde(default = "default_source_handle", alias = "source_handle")]
    pub source_handle: String,
    /// Target node id.
    #[serde(alias = "target_node_id")]
    pub target_node_id: NodeId,
    /// Target handle.
    #[serde(default = "default_target_handle", alias = "target_handle")]
    pub target_handle: String,
}

impl Connection {
    /// Create a connection with default handles.
    #[must_use]
    pub fn new(source: impl Into<NodeId>, target: impl Into<NodeId>) -> Self {
        Self {
            id: None,
            source_node_id: source.into(),
            source_handle: default_source_handle(),
            target_node_id: target.into(),
            target_handle: default_target_handle(),
        }
    }

    /// Create a connection with an explicit source handle.
    #[must_use]
    pub fn with_source_handle(mut self, handle: impl Into<String>) -> Self {
        self.source_handle = handle.into();
        self
    }
}

fn default_true() -> bool {
    true
}

/// Workflow-level settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowSettings {
    /// IANA timezone for schedule-sensitive nodes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timezone: Option<String>,
    /// Workflow to run when this one fails.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_workflow: Option<String>,
    /// Which workflows may call this one as a sub-workflow.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub caller_policy: Option<String>,
    /// Persist execution data for failed runs.
    #[serde(default = "default_true")]
    pub save_execution_data: bool,
    /// Persist execution data for successful runs.
    #[serde(default = "default_true")]
    pub save_successful_data: bool,
    /// Workflow wall-clock budget in seconds; overrides the engine
    /// default when set.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub execution_timeout: Option<u64>,
}

impl Default for WorkflowSettings {
    fn default() -> Self {
        Self {
            timezone: None,
            error_workflow: None,
            caller_policy: None,
            save_execution_data: true,
            save_successful_data: true,
            execution_timeout: None,
        }
    }
}
