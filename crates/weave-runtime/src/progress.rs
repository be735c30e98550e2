//! Progress snapshots in the shared store.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::warn;
use weave_core::{ExecutionId, NodeId};

use crate::context::RuntimeContext;
use crate::store::KeyValueStore;

/// Snapshot TTL: readers can poll for up to an hour after the last
/// write.
const PROGRESS_TTL: Duration = Duration::from_secs(60 * 60);

/// A point-in-time view of execution progress, written under
/// `execution:progress:<id>`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressSnapshot {
    /// The execution.
    pub execution_id: ExecutionId,
    /// Total nodes scheduled.
    pub total_nodes: usize,
    /// Nodes done.
    pub completed: usize,
    /// The node running when the snapshot was taken.
    pub current_node: Option<NodeId>,
    /// Whole-percent progress.
    pub percentage: u8,
    /// When the snapshot was written.
    pub updated_at: DateTime<Utc>,
}

/// Writes progress snapshots, on demand and on a periodic tick.
pub struct ProgressTracker {
    store: Arc<dyn KeyValueStore>,
    runtime: Arc<RuntimeContext>,
    current_node: Mutex<Option<NodeId>>,
}

impl ProgressTracker {
    /// Tracker for one execution.
    #[must_use]
    pub fn new(store: Arc<dyn KeyValueStore>, runtime: Arc<RuntimeContext>) -> Self {
        Self {
            store,
            runtime,
            current_node: Mutex::new(None),
        }
    }

    /// The store key for an execution's progress.
    #[must_use]
    pub fn key(execution_id: &ExecutionId) -> String {
        format!("execution:progress:{execution_id}")
    }

    /// Record the node currently executing.
    pub fn set_current_node(&self, node: Option<NodeId>) {
        *self.current_node.lock() = node;
    }

    /// Write a snapshot now.
    pub async fn write(&self) {
        let snapshot = ProgressSnapshot {
            execution_id: self.runtime.execution_id.clone(),
            total_nodes: self.runtime.total_nodes(),
            completed: self.runtime.nodes_done(),
            current_node: self.current_node.lock().clone(),
            percentage: self.runtime.progress_percent(),
            updated_at: Utc::now(),
        };
        let key = Self::key(&snapshot.execution_id);
        match serde_json::to_string(&snapshot) {
            Ok(payload) => {
                if let Err(err) = self.store.set(&key, payload, Some(PROGRESS_TTL)).await {
                    warn!(key, error = %err, "progress write failed");
                }
            }
            Err(err) => warn!(error = %err, "failed to encode progress snapshot"),
        }
    }

    /// Write snapshots every `interval` until `stop` fires, then write a
    /// final one.
    pub async fn run_periodic(self: Arc<Self>, interval: Duration, stop: CancellationToken) {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        loop {
            tokio::select! {
                _ = ticker.tick() => self.write().await,
                () = stop.cancelled() => {
                    self.write().await;
                    return;
                }
            }
        }
    }

    /// Read another execution's progress from the store.
    pub async fn read(
        store: &dyn KeyValueStore,
        execution_id: &ExecutionId,
    ) -> Option<ProgressSnapshot> {
        let raw = store.get(&Self::key(execution_id)).await.ok()??;
        serde_json::from_str(&raw).ok()
    }
}

impl std::fmt::Debug for ProgressTracker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProgressTracker")
            .field("execution_id", &self.runtime.execution_id)
            .finish_non_exhaustive()
    }
}
