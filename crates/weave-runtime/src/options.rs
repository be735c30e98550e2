//! Execution options and result types.

use std::collections::{BTreeMap, HashMap};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use weave_core::{ExecutionId, NodeId};
use weave_workflow::ValidationError;

use crate::handler::Output;

/// Options for one `execute` call.
#[derive(Debug, Clone)]
pub struct ExecutionOptions {
    /// Concurrent node bound within a level; `<= 1` selects the
    /// sequential scheduler.
    pub max_parallel_nodes: usize,
    /// Node deadline when neither the node nor its handler sets one.
    pub default_node_timeout: Duration,
    /// Workflow wall-clock budget (settings can override).
    pub workflow_timeout: Duration,
    /// Whether result caching participates at all.
    pub enable_caching: bool,
    /// Validate and plan without calling handlers.
    pub dry_run: bool,
    /// Restrict the run to the sub-graph reachable from this node
    /// (partial replay).
    pub start_from_node: Option<NodeId>,
    /// Stop scheduling once this node has run.
    pub stop_at_node: Option<NodeId>,
    /// Nodes to skip outright.
    pub skip_nodes: Vec<NodeId>,
    /// Per-node config entries applied over the resolved config.
    pub node_overrides: HashMap<NodeId, Output>,
}

impl Default for ExecutionOptions {
    fn default() -> Self {
        Self {
            max_parallel_nodes: 10,
            default_node_timeout: Duration::from_secs(5 * 60),
            workflow_timeout: Duration::from_secs(30 * 60),
            enable_caching: true,
            dry_run: false,
            start_from_node: None,
            stop_at_node: None,
            skip_nodes: Vec::new(),
            node_overrides: HashMap::new(),
        }
    }
}

/// Final status of a workflow execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionStatus {
    /// Every scheduled node finished.
    Completed,
    /// A node error stopped the run.
    Failed,
    /// Cancellation stopped the run.
    Cancelled,
    /// The workflow deadline stopped the run.
    TimedOut,
}

impl std::fmt::Display for ExecutionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Completed => f.write_str("completed"),
            Self::Failed => f.write_str("failed"),
            Self::Cancelled => f.write_str("cancelled"),
            Self::TimedOut => f.write_str("timed_out"),
        }
    }
}

/// Status of a single node within an execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeStatus {
    /// Not yet reached.
    Pending,
    /// Currently executing.
    Running,
    /// Finished successfully.
    Completed,
    /// Finished with an error.
    Failed,
    /// Skipped (disabled or listed in `skip_nodes`).
    Skipped,
    /// Served from the result cache.
    Cached,
}

impl std::fmt::Display for NodeStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pending => f.write_str("pending"),
            Self::Running => f.write_str("running"),
            Self::Completed => f.write_str("completed"),
            Self::Failed => f.write_str("failed"),
            Self::Skipped => f.write_str("skipped"),
            Self::Cached => f.write_str("cached"),
        }
    }
}

/// Outcome of a single node.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeResult {
    /// The node.
    pub node_id: NodeId,
    /// Its type tag.
    pub node_type: String,
    /// Final status.
    pub status: NodeStatus,
    /// Snapshot of the assembled input.
    pub input: Output,
    /// Output mapping (empty unless completed or cached).
    pub output: Output,
    /// Error message for failed nodes.
    pub error: Option<String>,
    /// When the node started.
    pub started_at: DateTime<Utc>,
    /// When the node reached a terminal state.
    pub finished_at: DateTime<Utc>,
    /// Retries performed (0 on first-attempt success).
    pub retries: u32,
    /// Whether the output came from the result cache.
    pub cache_hit: bool,
}

/// Outcome of one workflow execution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionResult {
    /// The execution.
    pub execution_id: ExecutionId,
    /// Final status.
    pub status: ExecutionStatus,
    /// Aggregate output: node id → output mapping.
    pub output: BTreeMap<NodeId, Output>,
    /// Per-node results, id-sorted.
    pub node_results: BTreeMap<NodeId, NodeResult>,
    /// When the execution started.
    pub started_at: DateTime<Utc>,
    /// When the execution finished.
    pub finished_at: DateTime<Utc>,
    /// Wall-clock duration in milliseconds.
    pub duration_ms: u64,
    /// Nodes that actually ran (completed, cached, or failed).
    pub nodes_executed: usize,
    /// First error message, for failed runs.
    pub error: Option<String>,
    /// The node that raised the first error.
    pub error_node_id: Option<NodeId>,
}

impl ExecutionResult {
    /// Whether the execution completed successfully.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.status == ExecutionStatus::Completed
    }
}

/// Dry-run preview for one node.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodePreview {
    /// The node.
    pub node_id: NodeId,
    /// Its type tag.
    pub node_type: String,
    /// Whether the processor would call a handler for it.
    pub would_execute: bool,
    /// Direct predecessors.
    pub predecessors: Vec<NodeId>,
}

/// Result of a dry-run preview: validation plus per-node previews, no
/// handler calls.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PreviewResult {
    /// Whether validation passed.
    pub valid: bool,
    /// Validation findings.
    pub errors: Vec<ValidationError>,
    /// Non-fatal observations (unknown node types, skipped nodes).
    pub warnings: Vec<String>,
    /// Per-node previews in execution order.
    pub nodes: Vec<NodePreview>,
}
