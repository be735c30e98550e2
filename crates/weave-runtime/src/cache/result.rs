//! Node result caching keyed by input fingerprint.

use std::sync::Arc;
use std::time::Duration;

use moka::sync::Cache;
use serde_json::Value;
use tracing::{debug, warn};
use weave_core::{ExecutionId, NodeId, WorkspaceId};

use crate::handler::Output;
use crate::store::KeyValueStore;

/// Node types whose outputs must never be cached: they contact external
/// services with side effects. The deny-list is by exact tag or
/// `integration.`/`trigger.` prefix.
const DENY_EXACT: &[&str] = &["action.http", "logic.wait", "action.sub_workflow"];
const DENY_PREFIXES: &[&str] = &["integration.", "trigger."];

/// Whether a node type's results may be cached.
#[must_use]
pub fn cacheable_node_type(node_type: &str) -> bool {
    !(DENY_EXACT.contains(&node_type)
        || DENY_PREFIXES.iter().any(|p| node_type.starts_with(p)))
}

/// Result cache tuning.
#[derive(Debug, Clone)]
pub struct ResultCacheConfig {
    /// Shared-store TTL (default 1h).
    pub ttl: Duration,
    /// In-process entry bound.
    pub local_capacity: u64,
}

impl Default for ResultCacheConfig {
    fn default() -> Self {
        Self {
            ttl: Duration::from_secs(60 * 60),
            local_capacity: 10_000,
        }
    }
}

/// Two-level result cache: in-process (moka, explicit expiry) over the
/// shared store.
pub struct ResultCache {
    store: Arc<dyn KeyValueStore>,
    local: Cache<String, Output>,
    ttl: Duration,
}

impl ResultCache {
    /// Cache over a shared store with default tuning.
    #[must_use]
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self::with_config(store, ResultCacheConfig::default())
    }

    /// Cache with explicit tuning.
    #[must_use]
    pub fn with_config(store: Arc<dyn KeyValueStore>, config: ResultCacheConfig) -> Self {
        let local = Cache::builder()
            .max_capacity(config.local_capacity)
            .time_to_live(config.ttl)
            .build();
        Self {
            store,
            local,
            ttl: config.ttl,
        }
    }

    /// Per-execution key: `node:result:<execution>:<node>:<hash>`.
    #[must_use]
    pub fn execution_key(
        execution_id: &ExecutionId,
        node_id: &NodeId,
        input_hash: &str,
    ) -> String {
        format!("node:result:{execution_id}:{node_id}:{input_hash}")
    }

    /// Workspace-wide key, reserved for explicitly idempotent node
    /// types: `node:global:<workspace>:<type>:<hash>`.
    #[must_use]
    pub fn global_key(workspace_id: &WorkspaceId, node_type: &str, input_hash: &str) -> String {
        format!("node:global:{workspace_id}:{node_type}:{input_hash}")
    }

    /// Look up a cached output, checking in-process first.
    pub async fn get(&self, key: &str) -> Option<Output> {
        if let Some(hit) = self.local.get(key) {
            debug!(key, "result cache hit (local)");
            return Some(hit);
        }
        match self.store.get(key).await {
            Ok(Some(raw)) => match serde_json::from_str::<Value>(&raw) {
                Ok(Value::Object(output)) => {
                    self.local.insert(key.to_owned(), output.clone());
                    debug!(key, "result cache hit (store)");
                    Some(output)
                }
                _ => {
                    warn!(key, "dropping undecodable cached result");
                    None
                }
            },
            Ok(None) => None,
            Err(err) => {
                warn!(key, error = %err, "result cache read failed");
                None
            }
        }
    }

    /// Store an output under a key. Failures are logged; caching is an
    /// optimization, not state.
    pub async fn put(&self, key: &str, output: &Output) {
        self.local.insert(key.to_owned(), output.clone());
        let payload = Value::Object(output.clone()).to_string();
        if let Err(err) = self.store.set(key, payload, Some(self.ttl)).await {
            warn!(key, error = %err, "result cache write failed");
        }
    }

    /// Drop every cached result of an execution.
    pub async fn invalidate_execution(&self, execution_id: &ExecutionId) {
        self.invalidate_prefix(&format!("node:result:{execution_id}:"))
            .await;
    }

    /// Drop every workspace-global cached result of a workspace.
    pub async fn invalidate_workspace(&self, workspace_id: &WorkspaceId) {
        self.invalidate_prefix(&format!("node:global:{workspace_id}:"))
            .await;
    }

    /// Drop everything under a key prefix. The in-process layer cannot
    /// enumerate by prefix, so it clears wholesale.
    pub async fn invalidate_prefix(&self, prefix: &str) {
        self.local.invalidate_all();
        if let Err(err) = self.store.delete_prefix(prefix).await {
            warn!(prefix, error = %err, "result cache invalidation failed");
        }
    }
}

impl std::fmt::Debug for ResultCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResultCache")
            .field("ttl", &self.ttl)
            .finish_non_exhaustive()
    }
}
