//! Error and validation types for workflow ingestion and graph checks.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use weave_core::NodeId;

/// Errors produced while parsing definitions or deriving the graph.
#[derive(Debug, Error)]
pub enum WorkflowError {
    /// The workflow graph contains a cycle.
    #[error("cycle detected in workflow graph")]
    CycleDetected,

    /// The workflow JSON could not be parsed.
    #[error("failed to parse workflow definition: {0}")]
    Parse(#[from] serde_json::Error),

    /// A referenced node does not exist in the graph.
    #[error("unknown node: {0}")]
    UnknownNode(NodeId),
}

/// Stable machine-readable validation codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ValidationCode {
    /// The graph contains at least one cycle.
    CycleDetected,
    /// A node cannot be reached from any root.
    UnreachableNode,
    /// A node is missing its type tag.
    MissingNodeType,
}

impl ValidationCode {
    /// The canonical string form (`CYCLE_DETECTED`, ...).
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::CycleDetected => "CYCLE_DETECTED",
            Self::UnreachableNode => "UNREACHABLE_NODE",
            Self::MissingNodeType => "MISSING_NODE_TYPE",
        }
    }
}

impl std::fmt::Display for ValidationCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single validation finding for a workflow graph.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationError {
    /// Machine-readable code.
    pub code: ValidationCode,
    /// Human-readable description.
    pub message: String,
    /// The offending node, when the finding is node-scoped.
    pub node_id: Option<NodeId>,
}

impl ValidationError {
    /// Create a workflow-scoped finding.
    #[must_use]
    pub fn new(code: ValidationCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            node_id: None,
        }
    }

    /// Create a node-scoped finding.
    #[must_use]
    pub fn for_node(code: ValidationCode, node_id: NodeId, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            node_id: Some(node_id),
        }
    }
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.node_id {
            Some(node) => write!(f, "{}: {} (node {node})", self.code, self.message),
            None => write!(f, "{}: {}", self.code, self.message),
        }
    }
}
