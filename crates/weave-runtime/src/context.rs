//! Per-execution runtime state.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use parking_lot::{Mutex, RwLock};
use serde_json::Value;
use sha2::{Digest, Sha256};
use tokio_util::sync::CancellationToken;
use weave_core::{ExecutionId, NodeId, WorkflowId, WorkspaceId};

use crate::error::NodeError;
use crate::handler::Output;

/// Mutable state owned by one `execute` call and destroyed on return.
///
/// The node-output map is the only structure written concurrently: a
/// node's output is written exactly once by the single task executing
/// it, and once written it is shared read-only. Variables are
/// lock-guarded and mutable throughout the run.
#[derive(Debug)]
pub struct RuntimeContext {
    /// This execution.
    pub execution_id: ExecutionId,
    /// The workflow being executed.
    pub workflow_id: WorkflowId,
    /// The owning workspace.
    pub workspace_id: WorkspaceId,
    /// The workflow input payload.
    pub input: Output,
    /// Cancellation for the whole execution (user cancel or workflow
    /// timeout).
    pub cancellation: CancellationToken,
    /// When the execution started.
    pub started_at: DateTime<Utc>,
    /// Trace correlation id.
    pub trace_id: String,

    variables: RwLock<Output>,
    outputs: DashMap<NodeId, Output>,
    total_nodes: usize,
    completed: AtomicUsize,
    timed_out: AtomicBool,
    failure: Mutex<Option<(NodeId, NodeError)>>,
}

impl RuntimeContext {
    /// Fresh context for one execution.
    #[must_use]
    pub fn new(
        execution_id: ExecutionId,
        workflow_id: WorkflowId,
        workspace_id: WorkspaceId,
        input: Output,
        total_nodes: usize,
    ) -> Self {
        let started_at = Utc::now();
        let trace_id = derive_trace_id(&execution_id, started_at);
        Self {
            execution_id,
            workflow_id,
            workspace_id,
            input,
            cancellation: CancellationToken::new(),
            started_at,
            trace_id,
            variables: RwLock::new(Output::new()),
            outputs: DashMap::new(),
            total_nodes,
            completed: AtomicUsize::new(0),
            timed_out: AtomicBool::new(false),
            failure: Mutex::new(None),
        }
    }

    /// Seed workflow variables.
    pub fn set_variables(&self, variables: Output) {
        *self.variables.write() = variables;
    }

    /// Set one variable.
    pub fn set_variable(&self, key: impl Into<String>, value: Value) {
        self.variables.write().insert(key.into(), value);
    }

    /// Snapshot of the variables.
    #[must_use]
    pub fn variables(&self) -> Output {
        self.variables.read().clone()
    }

    /// Store a node's output. Single-writer per node id.
    pub fn set_output(&self, node_id: NodeId, output: Output) {
        self.outputs.insert(node_id, output);
    }

    /// Read a node's output.
    #[must_use]
    pub fn output(&self, node_id: &NodeId) -> Option<Output> {
        self.outputs.get(node_id).map(|entry| entry.value().clone())
    }

    /// All outputs keyed by node id, id-sorted.
    #[must_use]
    pub fn outputs_snapshot(&self) -> std::collections::BTreeMap<NodeId, Output> {
        self.outputs
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().clone()))
            .collect()
    }

    /// Total nodes scheduled for this execution.
    #[must_use]
    pub fn total_nodes(&self) -> usize {
        self.total_nodes
    }

    /// Count a node as done (for progress).
    pub fn mark_node_done(&self) {
        self.completed.fetch_add(1, Ordering::SeqCst);
    }

    /// Nodes done so far.
    #[must_use]
    pub fn nodes_done(&self) -> usize {
        self.completed.load(Ordering::SeqCst)
    }

    /// Progress as whole percent.
    #[must_use]
    pub fn progress_percent(&self) -> u8 {
        if self.total_nodes == 0 {
            return 100;
        }
        let done = self.nodes_done().min(self.total_nodes);
        ((done * 100) / self.total_nodes) as u8
    }

    /// Record the first failure; later failures are ignored in its
    /// favour.
    pub fn record_failure(&self, node_id: NodeId, error: NodeError) {
        let mut failure = self.failure.lock();
        if failure.is_none() {
            *failure = Some((node_id, error));
        }
    }

    /// The first recorded failure.
    #[must_use]
    pub fn failure(&self) -> Option<(NodeId, NodeError)> {
        self.failure.lock().clone()
    }

    /// Flag the execution as stopped by its workflow deadline.
    pub fn mark_timed_out(&self) {
        self.timed_out.store(true, Ordering::SeqCst);
    }

    /// Whether the workflow deadline fired.
    #[must_use]
    pub fn timed_out(&self) -> bool {
        self.timed_out.load(Ordering::SeqCst)
    }

    /// Whether cancellation was requested.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancellation.is_cancelled()
    }
}

fn derive_trace_id(execution_id: &ExecutionId, started_at: DateTime<Utc>) -> String {
    let mut hasher = Sha256::new();
    hasher.update(execution_id.as_str().as_bytes());
    hasher.update(started_at.timestamp_nanos_opt().unwrap_or_default().to_be_bytes());
    hex::encode(&hasher.finalize()[..16])
}

/// Fingerprint of a node input: canonical JSON (object keys sorted by
/// `serde_json`'s map representation), SHA-256, first 8 bytes as hex.
///
/// Volatile execution metadata (the `$execution` entry) is excluded so
/// replaying an execution fingerprints identically.
#[must_use]
pub fn compute_input_hash(input: &Output) -> String {
    let mut canonical = input.clone();
    canonical.remove("$execution");
    let encoded =
        serde_json::to_vec(&Value::Object(canonical)).unwrap_or_default();
    let digest = Sha256::digest(&encoded);
    hex::encode(&digest[..8])
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn context(total: usize) -> RuntimeContext {
        RuntimeContext::new(
            ExecutionId::new("exec-1"),
            WorkflowId::new("wf-1"),
            WorkspaceId::new("ws-1"),
            Output::new(),
            total,
        )
    }

    fn output(value: Value) -> Output {
        value.as_object().cloned().expect("object")
    }

    #[test]
    fn outputs_write_once_read_many() {
        let ctx = context(3);
        ctx.set_output(NodeId::new("a"), output(json!({"x": 1})));
        assert_eq!(
            ctx.output(&NodeId::new("a")),
            Some(output(json!({"x": 1})))
        );
        assert_eq!(ctx.output(&NodeId::new("b")), None);
    }

    #[test]
    fn progress_tracks_completion() {
        let ctx = context(4);
        assert_eq!(ctx.progress_percent(), 0);
        ctx.mark_node_done();
        ctx.mark_node_done();
        assert_eq!(ctx.progress_percent(), 50);
        ctx.mark_node_done();
        ctx.mark_node_done();
        assert_eq!(ctx.progress_percent(), 100);
    }

    #[test]
    fn empty_workflow_is_complete() {
        let ctx = context(0);
        assert_eq!(ctx.progress_percent(), 100);
    }

    #[test]
    fn first_failure_wins() {
        let ctx = context(2);
        ctx.record_failure(NodeId::new("a"), NodeError::Handler("first".into()));
        ctx.record_failure(NodeId::new("b"), NodeError::Handler("second".into()));
        let (node, error) = ctx.failure().unwrap();
        assert_eq!(node.as_str(), "a");
        assert_eq!(error.to_string(), "first");
    }

    #[test]
    fn variables_are_mutable() {
        let ctx = context(1);
        ctx.set_variable("k", json!(1));
        ctx.set_variable("k", json!(2));
        assert_eq!(ctx.variables().get("k"), Some(&json!(2)));
    }

    #[test]
    fn hash_is_deterministic_and_input_sensitive() {
        let a = output(json!({"x": 1, "y": [1, 2]}));
        let b = output(json!({"y": [1, 2], "x": 1}));
        let c = output(json!({"x": 2, "y": [1, 2]}));

        assert_eq!(compute_input_hash(&a), compute_input_hash(&b));
        assert_ne!(compute_input_hash(&a), compute_input_hash(&c));
        assert_eq!(compute_input_hash(&a).len(), 16);
    }

    #[test]
    fn hash_ignores_execution_metadata() {
        let mut a = output(json!({"x": 1}));
        let mut b = output(json!({"x": 1}));
        a.insert("$execution".into(), json!({"startedAt": "2024-01-01"}));
        b.insert("$execution".into(), json!({"startedAt": "2025-01-01"}));
        assert_eq!(compute_input_hash(&a), compute_input_hash(&b));
    }

    #[test]
    fn trace_id_is_stable_per_context() {
        let ctx = context(1);
        assert_eq!(ctx.trace_id.len(), 32);
    }
}
