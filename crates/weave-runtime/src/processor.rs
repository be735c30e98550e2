//! The workflow processor: sequential and level-parallel scheduling.
//!
//! `execute` walks the dependency graph in topological order (or level
//! by level with bounded parallelism), runs each node through the
//! middleware chain, flows outputs forward, and publishes lifecycle
//! events. The first error to reach the scheduler stops further node
//! starts; in parallel mode, in-flight siblings are cancelled and their
//! errors are discarded in its favour.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde_json::Value;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use weave_core::{ExecutionId, NodeId};
use weave_expression::{Engine, EvaluationContext};
use weave_resilience::RetryStrategy;
use weave_workflow::{DependencyGraph, NodeDefinition, WorkflowDefinition};

use crate::cache::{cacheable_node_type, ResultCache};
use crate::cancel::CancellationManager;
use crate::context::{compute_input_hash, RuntimeContext};
use crate::error::{EngineError, NodeError};
use crate::events::{output_preview, Event, EventKind, EventPublisher, DEFAULT_PREVIEW_BYTES};
use crate::handler::{CredentialResolver, HandlerContext, HandlerRegistry, Output};
use crate::middleware::{Chain, HandlerFn, Invocation};
use crate::options::{
    ExecutionOptions, ExecutionResult, ExecutionStatus, NodePreview, NodeResult, NodeStatus,
    PreviewResult,
};
use crate::progress::ProgressTracker;
use crate::store::KeyValueStore;

/// Base delay for node-level retry backoff (quadratic: 100ms × attempt²).
const RETRY_BASE_DELAY: Duration = Duration::from_millis(100);

/// Interval for periodic progress snapshots.
const PROGRESS_INTERVAL: Duration = Duration::from_secs(5);

/// The workflow execution engine.
pub struct Processor {
    registry: Arc<HandlerRegistry>,
    engine: Arc<Engine>,
    chain: Arc<Chain>,
    result_cache: Option<Arc<ResultCache>>,
    cancellations: Option<Arc<CancellationManager>>,
    progress_store: Option<Arc<dyn KeyValueStore>>,
}

impl Processor {
    /// Processor over a handler registry, with no middleware and no
    /// caching.
    #[must_use]
    pub fn new(registry: Arc<HandlerRegistry>) -> Self {
        Self {
            registry,
            engine: Arc::new(Engine::new()),
            chain: Arc::new(Chain::new()),
            result_cache: None,
            cancellations: None,
            progress_store: None,
        }
    }

    /// Install the middleware chain.
    #[must_use]
    pub fn with_chain(mut self, chain: Chain) -> Self {
        self.chain = Arc::new(chain);
        self
    }

    /// Enable result caching.
    #[must_use]
    pub fn with_result_cache(mut self, cache: Arc<ResultCache>) -> Self {
        self.result_cache = Some(cache);
        self
    }

    /// Attach the cancellation manager (local registry + remote
    /// subscriber).
    #[must_use]
    pub fn with_cancellation_manager(mut self, manager: Arc<CancellationManager>) -> Self {
        self.cancellations = Some(manager);
        self
    }

    /// Persist progress snapshots to this store during execution.
    #[must_use]
    pub fn with_progress_store(mut self, store: Arc<dyn KeyValueStore>) -> Self {
        self.progress_store = Some(store);
        self
    }

    /// Cancel an execution by id (local or remote).
    pub async fn cancel(
        &self,
        execution_id: &ExecutionId,
        reason: &str,
        requested_by: &str,
    ) -> Result<(), EngineError> {
        let Some(manager) = &self.cancellations else {
            return Err(EngineError::ExecutionNotFound(execution_id.to_string()));
        };
        manager.cancel(execution_id, reason, requested_by).await;
        Ok(())
    }

    /// Dry-run: build, validate, and plan, but call no handlers.
    #[must_use]
    pub fn preview(&self, def: &WorkflowDefinition) -> PreviewResult {
        let dag = DependencyGraph::from_definition(def);
        let errors = dag.validate();
        let mut warnings = Vec::new();

        let order = dag
            .topo_sort()
            .unwrap_or_else(|_| dag.nodes().map(|n| n.id.clone()).collect());

        let nodes = order
            .iter()
            .filter_map(|id| dag.node(id))
            .map(|node| {
                let known = self.registry.contains(&node.node_type);
                if !known {
                    warnings.push(format!(
                        "node {} has unknown type {}",
                        node.id, node.node_type
                    ));
                }
                NodePreview {
                    node_id: node.id.clone(),
                    node_type: node.node_type.clone(),
                    would_execute: known,
                    predecessors: dag.predecessors(&node.id),
                }
            })
            .collect();

        PreviewResult {
            valid: errors.is_empty(),
            errors,
            warnings,
            nodes,
        }
    }

    /// Execute a workflow definition against an input payload.
    pub async fn execute(
        &self,
        def: &WorkflowDefinition,
        input: Output,
        options: &ExecutionOptions,
        execution_id: ExecutionId,
        resolver: Arc<dyn CredentialResolver>,
        publisher: Arc<EventPublisher>,
    ) -> ExecutionResult {
        let started_at = Utc::now();

        let dag = DependencyGraph::from_definition(def);
        let errors = dag.validate();
        if let Some(first) = errors.first() {
            warn!(execution_id = %execution_id, error = %first, "workflow failed validation");
            publisher
                .publish(
                    Event::new(EventKind::ExecutionFailed, def.workspace_id.clone())
                        .workflow(def.id.clone())
                        .execution(execution_id.clone())
                        .with("error", Value::String(first.to_string())),
                )
                .await;
            return failed_result(execution_id, started_at, first.to_string());
        }

        if options.dry_run {
            let preview = self.preview(def);
            debug!(execution_id = %execution_id, nodes = preview.nodes.len(), "dry run complete");
            return empty_result(execution_id, started_at, ExecutionStatus::Completed);
        }

        let dag = match &options.start_from_node {
            Some(start) => match dag.sub_dag(start) {
                Ok(sub) => sub,
                Err(err) => {
                    return failed_result(execution_id, started_at, err.to_string());
                }
            },
            None => dag,
        };

        let rctx = Arc::new(RuntimeContext::new(
            execution_id.clone(),
            def.id.clone(),
            def.workspace_id.clone(),
            input,
            dag.node_count(),
        ));

        if let Some(manager) = &self.cancellations {
            manager.register(execution_id.clone(), rctx.cancellation.clone());
        }

        let progress_stop = CancellationToken::new();
        let progress = self.progress_store.as_ref().map(|store| {
            let tracker = Arc::new(ProgressTracker::new(Arc::clone(store), Arc::clone(&rctx)));
            let task = tokio::spawn(
                Arc::clone(&tracker).run_periodic(PROGRESS_INTERVAL, progress_stop.clone()),
            );
            (tracker, task)
        });

        // Workflow-level timeout is a cancellation with a timed-out
        // marker; settings override the engine default.
        let workflow_timeout = def
            .settings
            .execution_timeout
            .map_or(options.workflow_timeout, Duration::from_secs);
        let watchdog = {
            let rctx = Arc::clone(&rctx);
            tokio::spawn(async move {
                tokio::select! {
                    () = tokio::time::sleep(workflow_timeout) => {
                        warn!(execution_id = %rctx.execution_id, "workflow timeout");
                        rctx.mark_timed_out();
                        rctx.cancellation.cancel();
                    }
                    () = rctx.cancellation.cancelled() => {}
                }
            })
        };

        publisher
            .publish(
                Event::new(EventKind::ExecutionStarted, def.workspace_id.clone())
                    .workflow(def.id.clone())
                    .execution(execution_id.clone())
                    .with("workflow_name", Value::String(def.name.clone()))
                    .with("total_nodes", Value::from(dag.node_count() as u64)),
            )
            .await;

        let shared = Arc::new(Shared {
            dag,
            rctx: Arc::clone(&rctx),
            options: options.clone(),
            publisher: Arc::clone(&publisher),
            resolver,
            registry: Arc::clone(&self.registry),
            engine: Arc::clone(&self.engine),
            chain: Arc::clone(&self.chain),
            result_cache: self.result_cache.clone(),
            progress: progress.as_ref().map(|(tracker, _)| Arc::clone(tracker)),
            abort: rctx.cancellation.child_token(),
        });

        let node_results = if options.max_parallel_nodes <= 1 {
            run_sequential(&shared).await
        } else {
            run_parallel(&shared).await
        };

        watchdog.abort();
        if let Some((tracker, task)) = progress {
            tracker.set_current_node(None);
            progress_stop.cancel();
            let _ = task.await;
        }
        if let Some(manager) = &self.cancellations {
            manager.unregister(&execution_id);
        }

        let result = assemble_result(&execution_id, started_at, &rctx, node_results);

        let (kind, mut event_data) = match result.status {
            ExecutionStatus::Completed => (EventKind::ExecutionCompleted, Output::new()),
            ExecutionStatus::Cancelled => (EventKind::ExecutionCancelled, Output::new()),
            ExecutionStatus::Failed | ExecutionStatus::TimedOut => {
                (EventKind::ExecutionFailed, Output::new())
            }
        };
        event_data.insert("status".into(), Value::String(result.status.to_string()));
        event_data.insert("duration_ms".into(), Value::from(result.duration_ms));
        event_data.insert(
            "nodes_completed".into(),
            Value::from(result.nodes_executed as u64),
        );
        if let Some(error) = &result.error {
            event_data.insert("error".into(), Value::String(error.clone()));
        }
        let mut event = Event::new(kind, def.workspace_id.clone())
            .workflow(def.id.clone())
            .execution(execution_id);
        event.data = event_data;
        publisher.publish(event).await;

        info!(
            execution_id = %result.execution_id,
            status = %result.status,
            nodes = result.nodes_executed,
            duration_ms = result.duration_ms,
            "execution finished"
        );
        result
    }
}

impl std::fmt::Debug for Processor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Processor")
            .field("middlewares", &self.chain.len())
            .field("caching", &self.result_cache.is_some())
            .finish_non_exhaustive()
    }
}

/// Everything a node task needs, shared across the run.
struct Shared {
    dag: DependencyGraph,
    rctx: Arc<RuntimeContext>,
    options: ExecutionOptions,
    publisher: Arc<EventPublisher>,
    resolver: Arc<dyn CredentialResolver>,
    registry: Arc<HandlerRegistry>,
    engine: Arc<Engine>,
    chain: Arc<Chain>,
    result_cache: Option<Arc<ResultCache>>,
    progress: Option<Arc<ProgressTracker>>,
    /// Child of the execution token; sibling failure cancels this
    /// without marking the execution cancelled.
    abort: CancellationToken,
}

async fn run_sequential(shared: &Arc<Shared>) -> BTreeMap<NodeId, NodeResult> {
    let mut results = BTreeMap::new();
    let order = match shared.dag.topo_sort() {
        Ok(order) => order,
        Err(_) => return results, // validation already rejected cycles
    };

    for node_id in order {
        if shared.rctx.is_cancelled() {
            debug!(node_id = %node_id, "cancellation observed between nodes");
            break;
        }
        let result = run_node(shared, &node_id).await;
        let failed = result.status == NodeStatus::Failed;
        let stop_here = shared.options.stop_at_node.as_ref() == Some(&node_id);
        results.insert(node_id, result);
        if failed || stop_here {
            break;
        }
    }
    results
}

async fn run_parallel(shared: &Arc<Shared>) -> BTreeMap<NodeId, NodeResult> {
    let mut results = BTreeMap::new();
    let levels = match shared.dag.levels() {
        Ok(levels) => levels,
        Err(_) => return results,
    };
    let permits = Arc::new(Semaphore::new(shared.options.max_parallel_nodes.max(1)));

    for level in levels {
        if shared.rctx.is_cancelled() || shared.abort.is_cancelled() {
            break;
        }

        let mut tasks: JoinSet<(NodeId, NodeResult)> = JoinSet::new();
        for node_id in &level {
            let shared = Arc::clone(shared);
            let permits = Arc::clone(&permits);
            let node_id = node_id.clone();
            tasks.spawn(async move {
                // The semaphore is never closed, so acquisition only
                // fails on shutdown.
                let _permit = permits.acquire_owned().await;
                let result = run_node(&shared, &node_id).await;
                if result.status == NodeStatus::Failed {
                    shared.abort.cancel();
                }
                (node_id, result)
            });
        }

        // Barrier: the whole level completes before the next starts.
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((node_id, result)) => {
                    results.insert(node_id, result);
                }
                Err(err) => warn!(error = %err, "node task failed to join"),
            }
        }

        let failed = shared.rctx.failure().is_some();
        let stop_here = shared
            .options
            .stop_at_node
            .as_ref()
            .is_some_and(|stop| level.contains(stop));
        if failed || stop_here {
            break;
        }
    }
    results
}

/// Run one node end to end: input assembly, config resolution, cache
/// lookup, middleware chain, retries, output storage, events.
async fn run_node(shared: &Arc<Shared>, node_id: &NodeId) -> NodeResult {
    let started_at = Utc::now();
    let node = shared
        .dag
        .node(node_id)
        .cloned()
        .map(Arc::new)
        .expect("scheduler only visits nodes in the graph");

    if shared.options.skip_nodes.contains(node_id) {
        debug!(node_id = %node_id, "node skipped by options");
        shared.rctx.mark_node_done();
        return NodeResult {
            node_id: node_id.clone(),
            node_type: node.node_type.clone(),
            status: NodeStatus::Skipped,
            input: Output::new(),
            output: Output::new(),
            error: None,
            started_at,
            finished_at: Utc::now(),
            retries: 0,
            cache_hit: false,
        };
    }

    if let Some(tracker) = &shared.progress {
        tracker.set_current_node(Some(node_id.clone()));
    }

    shared
        .publisher
        .publish(
            Event::new(EventKind::NodeStarted, shared.rctx.workspace_id.clone())
                .workflow(shared.rctx.workflow_id.clone())
                .execution(shared.rctx.execution_id.clone())
                .node(node_id.clone())
                .with("node_type", Value::String(node.node_type.clone())),
        )
        .await;

    let input = assemble_input(shared, node_id);

    match execute_prepared(shared, &node, &input).await {
        Ok((output, retries, cache_hit)) => {
            shared.rctx.set_output(node_id.clone(), output.clone());
            shared.rctx.mark_node_done();
            shared
                .publisher
                .publish(
                    Event::new(EventKind::NodeCompleted, shared.rctx.workspace_id.clone())
                        .workflow(shared.rctx.workflow_id.clone())
                        .execution(shared.rctx.execution_id.clone())
                        .node(node_id.clone())
                        .with("cached", Value::Bool(cache_hit))
                        .with(
                            "duration_ms",
                            Value::from(
                                (Utc::now() - started_at).num_milliseconds().max(0) as u64
                            ),
                        )
                        .with(
                            "output",
                            output_preview(&Value::Object(output.clone()), DEFAULT_PREVIEW_BYTES),
                        ),
                )
                .await;
            NodeResult {
                node_id: node_id.clone(),
                node_type: node.node_type.clone(),
                status: if cache_hit {
                    NodeStatus::Cached
                } else {
                    NodeStatus::Completed
                },
                input,
                output,
                error: None,
                started_at,
                finished_at: Utc::now(),
                retries,
                cache_hit,
            }
        }
        Err((error, retries)) => {
            shared.rctx.record_failure(node_id.clone(), error.clone());
            shared
                .publisher
                .publish(
                    Event::new(EventKind::NodeFailed, shared.rctx.workspace_id.clone())
                        .workflow(shared.rctx.workflow_id.clone())
                        .execution(shared.rctx.execution_id.clone())
                        .node(node_id.clone())
                        .with("error", Value::String(error.to_string())),
                )
                .await;
            NodeResult {
                node_id: node_id.clone(),
                node_type: node.node_type.clone(),
                status: NodeStatus::Failed,
                input,
                output: Output::new(),
                error: Some(error.to_string()),
                started_at,
                finished_at: Utc::now(),
                retries,
                cache_hit: false,
            }
        }
    }
}

/// Config resolution, cache lookup, and the (possibly retried) chain
/// call. Returns `(output, retries, cache_hit)`.
async fn execute_prepared(
    shared: &Arc<Shared>,
    node: &Arc<NodeDefinition>,
    input: &Output,
) -> Result<(Output, u32, bool), (NodeError, u32)> {
    let eval_ctx = evaluation_context(shared, input);
    let resolved = shared
        .engine
        .resolve_config(&Value::Object(node.config.clone()), &eval_ctx)
        .map_err(|e| (NodeError::Expression(e.to_string()), 0))?;
    let mut config = match resolved {
        Value::Object(map) => map,
        other => {
            return Err((
                NodeError::Expression(format!("config resolved to non-object: {other}")),
                0,
            ));
        }
    };

    if let Some(overrides) = shared.options.node_overrides.get(&node.id) {
        for (key, value) in overrides {
            config.insert(key.clone(), value.clone());
        }
    }

    let caching = shared.options.enable_caching
        && cacheable_node_type(&node.node_type)
        && shared.result_cache.is_some();
    let cache_key = caching.then(|| {
        ResultCache::execution_key(
            &shared.rctx.execution_id,
            &node.id,
            &compute_input_hash(input),
        )
    });

    if let (Some(cache), Some(key)) = (&shared.result_cache, &cache_key) {
        if let Some(output) = cache.get(key).await {
            debug!(node_id = %node.id, "serving node from result cache");
            return Ok((output, 0, true));
        }
    }

    let handler = shared
        .registry
        .get(&node.node_type)
        .ok_or_else(|| (NodeError::UnknownType(node.node_type.clone()), 0))?;

    let effective_timeout = node
        .timeout_ms
        .map(Duration::from_millis)
        .or_else(|| handler.default_timeout())
        .unwrap_or(shared.options.default_node_timeout);

    // The handler token is taken from the invocation at call time, so
    // every retry starts with a fresh, uncancelled token.
    let base_ctx = HandlerContext {
        execution_id: shared.rctx.execution_id.clone(),
        workflow_id: shared.rctx.workflow_id.clone(),
        workspace_id: shared.rctx.workspace_id.clone(),
        node_id: node.id.clone(),
        input: input.clone(),
        config,
        variables: shared.rctx.variables(),
        credentials: Arc::clone(&shared.resolver),
        cancellation: shared.abort.child_token(),
    };
    let terminal: Box<HandlerFn> = Box::new(move |inv| {
        let handler = Arc::clone(&handler);
        let mut ctx = base_ctx.clone();
        ctx.cancellation = inv.cancel.clone();
        Box::pin(async move { handler.execute(ctx).await })
    });

    // Retries reuse the same resolved input and configuration.
    let retry_budget = if node.retry_on_fail { node.max_retries } else { 0 };
    let backoff = RetryStrategy::quadratic(retry_budget, RETRY_BASE_DELAY);
    let mut retries = 0;
    let output = loop {
        let invocation = Invocation {
            runtime: Arc::clone(&shared.rctx),
            node: Arc::clone(node),
            input: input.clone(),
            effective_timeout: Some(effective_timeout),
            cancel: shared.abort.child_token(),
        };
        match shared.chain.execute(&invocation, terminal.as_ref()).await {
            Ok(output) => break output,
            Err(error) => {
                let give_up = retries >= retry_budget
                    || error.is_cancelled()
                    || shared.abort.is_cancelled();
                if give_up {
                    return Err((error, retries));
                }
                retries += 1;
                let delay = backoff
                    .delay_for_attempt(retries)
                    .unwrap_or(RETRY_BASE_DELAY);
                debug!(
                    node_id = %node.id,
                    attempt = retries,
                    delay_ms = delay.as_millis() as u64,
                    error = %error,
                    "retrying node"
                );
                tokio::time::sleep(delay).await;
            }
        }
    };

    if let (Some(cache), Some(key)) = (&shared.result_cache, &cache_key) {
        cache.put(key, &output).await;
    }
    Ok((output, retries, false))
}

/// Assemble the node input mapping (spec: `$input`, `$json`, `$node`,
/// `$vars`, `$execution`, plus per-predecessor outputs by source id).
fn assemble_input(shared: &Arc<Shared>, node_id: &NodeId) -> Output {
    let rctx = &shared.rctx;
    let mut input = Output::new();
    input.insert("$input".into(), Value::Object(rctx.input.clone()));

    let refs = shared.dag.input_refs(node_id);
    for input_ref in refs {
        if let Some(output) = rctx.output(&input_ref.source) {
            input.insert(input_ref.source.to_string(), Value::Object(output));
        }
    }

    // $json: the workflow input's own $json wins; otherwise the output
    // of a sole predecessor.
    if let Some(json) = rctx.input.get("$json") {
        input.insert("$json".into(), json.clone());
    } else {
        let preds = shared.dag.predecessors(node_id);
        if let [only] = preds.as_slice() {
            if let Some(output) = rctx.output(only) {
                input.insert("$json".into(), Value::Object(output));
            }
        }
    }

    let nodes: Output = rctx
        .outputs_snapshot()
        .into_iter()
        .map(|(id, output)| (id.into_string(), Value::Object(output)))
        .collect();
    input.insert("$node".into(), Value::Object(nodes));
    input.insert("$vars".into(), Value::Object(rctx.variables()));

    let mut execution = Output::new();
    execution.insert("id".into(), Value::String(rctx.execution_id.to_string()));
    execution.insert(
        "workflowId".into(),
        Value::String(rctx.workflow_id.to_string()),
    );
    execution.insert(
        "workspaceId".into(),
        Value::String(rctx.workspace_id.to_string()),
    );
    execution.insert(
        "startedAt".into(),
        Value::String(rctx.started_at.to_rfc3339()),
    );
    input.insert("$execution".into(), Value::Object(execution));

    input
}

/// Expression context for one node, mirroring the assembled input.
fn evaluation_context(shared: &Arc<Shared>, input: &Output) -> EvaluationContext {
    let rctx = &shared.rctx;
    let mut builder = EvaluationContext::builder()
        .input(Value::Object(rctx.input.clone()))
        .json(input.get("$json").cloned().unwrap_or(Value::Null));

    for (id, output) in rctx.outputs_snapshot() {
        builder = builder.node_output(id.into_string(), Value::Object(output));
    }
    for (key, value) in rctx.variables() {
        builder = builder.var(key, value);
    }
    for (key, value) in std::env::vars() {
        builder = builder.env(key, value);
    }
    builder = builder
        .execution("id", Value::String(rctx.execution_id.to_string()))
        .execution("workflowId", Value::String(rctx.workflow_id.to_string()))
        .execution("workspaceId", Value::String(rctx.workspace_id.to_string()))
        .execution("startedAt", Value::String(rctx.started_at.to_rfc3339()));
    builder.build()
}

fn assemble_result(
    execution_id: &ExecutionId,
    started_at: chrono::DateTime<Utc>,
    rctx: &RuntimeContext,
    node_results: BTreeMap<NodeId, NodeResult>,
) -> ExecutionResult {
    let finished_at = Utc::now();
    let failure = rctx.failure();

    let status = if rctx.timed_out() {
        ExecutionStatus::TimedOut
    } else if let Some((_, error)) = &failure {
        if error.is_cancelled() && rctx.is_cancelled() {
            ExecutionStatus::Cancelled
        } else {
            ExecutionStatus::Failed
        }
    } else if rctx.is_cancelled() {
        ExecutionStatus::Cancelled
    } else {
        ExecutionStatus::Completed
    };

    let (error, error_node_id) = match (&status, failure) {
        (ExecutionStatus::TimedOut, failure) => (
            Some("workflow timeout".to_owned()),
            failure.map(|(id, _)| id),
        ),
        (_, Some((node_id, error))) => (Some(error.to_string()), Some(node_id)),
        (_, None) => (None, None),
    };

    let output: BTreeMap<NodeId, Output> = node_results
        .values()
        .filter(|r| matches!(r.status, NodeStatus::Completed | NodeStatus::Cached))
        .map(|r| (r.node_id.clone(), r.output.clone()))
        .collect();

    let nodes_executed = node_results
        .values()
        .filter(|r| {
            matches!(
                r.status,
                NodeStatus::Completed | NodeStatus::Cached | NodeStatus::Failed
            )
        })
        .count();

    ExecutionResult {
        execution_id: execution_id.clone(),
        status,
        output,
        node_results,
        started_at,
        finished_at,
        duration_ms: (finished_at - started_at).num_milliseconds().max(0) as u64,
        nodes_executed,
        error,
        error_node_id,
    }
}

fn failed_result(
    execution_id: ExecutionId,
    started_at: chrono::DateTime<Utc>,
    error: String,
) -> ExecutionResult {
    let finished_at = Utc::now();
    ExecutionResult {
        execution_id,
        status: ExecutionStatus::Failed,
        output: BTreeMap::new(),
        node_results: BTreeMap::new(),
        started_at,
        finished_at,
        duration_ms: (finished_at - started_at).num_milliseconds().max(0) as u64,
        nodes_executed: 0,
        error: Some(error),
        error_node_id: None,
    }
}

fn empty_result(
    execution_id: ExecutionId,
    started_at: chrono::DateTime<Utc>,
    status: ExecutionStatus,
) -> ExecutionResult {
    let finished_at = Utc::now();
    ExecutionResult {
        execution_id,
        status,
        output: BTreeMap::new(),
        node_results: BTreeMap::new(),
        started_at,
        finished_at,
        duration_ms: (finished_at - started_at).num_milliseconds().max(0) as u64,
        nodes_executed: 0,
        error: None,
        error_node_id: None,
    }
}
