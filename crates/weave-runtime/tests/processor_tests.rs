//! End-to-end processor scenarios with in-memory store, bus, and
//! handlers.

use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use pretty_assertions::assert_eq;
use serde_json::{json, Value};
use weave_core::{ExecutionId, NodeId};
use weave_runtime::cache::ResultCache;
use weave_runtime::cancel::CancellationManager;
use weave_runtime::error::{ErrorCategory, NodeError};
use weave_runtime::events::EventPublisher;
use weave_runtime::handler::{
    HandlerContext, HandlerRegistry, NodeHandler, NullCredentialResolver, Output,
};
use weave_runtime::middleware::{Chain, RecoveryMiddleware, TimeoutMiddleware};
use weave_runtime::options::{ExecutionOptions, ExecutionStatus, NodeStatus};
use weave_runtime::processor::Processor;
use weave_runtime::store::{MemoryBus, MemoryStore};
use weave_sandbox::Sandbox;
use weave_workflow::WorkflowDefinition;

/// `action.set`: output is the resolved configuration.
struct SetHandler;

#[async_trait]
impl NodeHandler for SetHandler {
    async fn execute(&self, ctx: HandlerContext) -> Result<Output, NodeError> {
        Ok(ctx.config)
    }
}

/// `action.code`: runs the configured script in the sandbox.
struct CodeHandler {
    sandbox: Sandbox,
}

#[async_trait]
impl NodeHandler for CodeHandler {
    async fn execute(&self, ctx: HandlerContext) -> Result<Output, NodeError> {
        let code = ctx
            .config
            .get("code")
            .and_then(Value::as_str)
            .ok_or_else(|| NodeError::Handler("code node has no code".into()))?;
        let run = self
            .sandbox
            .execute_with_cancel(code, &ctx.input, ctx.cancellation.clone())
            .await
            .map_err(|e| NodeError::Handler(e.to_string()))?;
        Ok(run.output)
    }
}

/// Sleeps for `delay_ms`, then outputs its configuration. Honours
/// cancellation like a well-behaved handler.
struct SleepHandler;

#[async_trait]
impl NodeHandler for SleepHandler {
    async fn execute(&self, ctx: HandlerContext) -> Result<Output, NodeError> {
        let delay = ctx
            .config
            .get("delay_ms")
            .and_then(Value::as_u64)
            .unwrap_or(50);
        tokio::select! {
            () = tokio::time::sleep(Duration::from_millis(delay)) => Ok(ctx.config),
            () = ctx.cancellation.cancelled() => Err(NodeError::Cancelled),
        }
    }
}

/// Fails a fixed number of times, then succeeds.
struct FlakyHandler {
    failures: AtomicU32,
    calls: AtomicU32,
}

#[async_trait]
impl NodeHandler for FlakyHandler {
    async fn execute(&self, ctx: HandlerContext) -> Result<Output, NodeError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        if call < self.failures.load(Ordering::SeqCst) {
            return Err(NodeError::Handler(format!("attempt {call} failed")));
        }
        Ok(ctx.config)
    }
}

/// Counts invocations; outputs its configuration.
struct CountingHandler {
    calls: AtomicUsize,
}

#[async_trait]
impl NodeHandler for CountingHandler {
    async fn execute(&self, ctx: HandlerContext) -> Result<Output, NodeError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(ctx.config)
    }
}

/// Cancels its own execution through the manager, then completes.
struct CancellingHandler {
    manager: Arc<CancellationManager>,
}

#[async_trait]
impl NodeHandler for CancellingHandler {
    async fn execute(&self, ctx: HandlerContext) -> Result<Output, NodeError> {
        self.manager
            .cancel(&ctx.execution_id, "test cancel", "test")
            .await;
        Ok(ctx.config)
    }
}

struct Harness {
    processor: Processor,
    publisher: Arc<EventPublisher>,
    manager: Arc<CancellationManager>,
    #[allow(dead_code)]
    bus: Arc<MemoryBus>,
}

fn harness(registry: Arc<HandlerRegistry>) -> Harness {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();
    let bus = Arc::new(MemoryBus::new());
    let store = Arc::new(MemoryStore::new());
    let manager = Arc::new(CancellationManager::new(bus.clone()));
    let chain = Chain::new()
        .with(Arc::new(RecoveryMiddleware::new()))
        .with(Arc::new(TimeoutMiddleware::new()));
    let processor = Processor::new(registry)
        .with_chain(chain)
        .with_result_cache(Arc::new(ResultCache::new(store.clone())))
        .with_cancellation_manager(manager.clone())
        .with_progress_store(store);
    Harness {
        processor,
        publisher: Arc::new(EventPublisher::new(bus.clone())),
        manager,
        bus,
    }
}

fn base_registry() -> Arc<HandlerRegistry> {
    let registry = Arc::new(HandlerRegistry::new());
    registry.register("action.set", Arc::new(SetHandler)).unwrap();
    registry
        .register(
            "action.code",
            Arc::new(CodeHandler {
                sandbox: Sandbox::new(),
            }),
        )
        .unwrap();
    registry
        .register("action.sleep", Arc::new(SleepHandler))
        .unwrap();
    registry
}

fn definition(value: Value) -> WorkflowDefinition {
    serde_json::from_value(value).expect("valid workflow definition")
}

fn object(value: Value) -> Output {
    value.as_object().cloned().expect("object")
}

async fn run(
    harness: &Harness,
    def: &WorkflowDefinition,
    input: Value,
    options: ExecutionOptions,
    execution_id: &str,
) -> weave_runtime::options::ExecutionResult {
    harness
        .processor
        .execute(
            def,
            object(input),
            &options,
            ExecutionId::new(execution_id),
            Arc::new(NullCredentialResolver),
            Arc::clone(&harness.publisher),
        )
        .await
}

#[tokio::test]
async fn linear_three_node_pipeline() {
    let harness = harness(base_registry());
    let def = definition(json!({
        "id": "wf-linear",
        "workspaceId": "ws-1",
        "name": "linear",
        "nodes": [
            {"id": "A", "type": "action.set", "parameters": {"x": "{{ $input.n }}"}},
            {"id": "B", "type": "action.code", "parameters": {"code": "return { y: $json.x * 2 };"}},
            {"id": "C", "type": "action.set", "parameters": {
                "y": "{{ $node.B.y }}",
                "z": "{{ $node.B.y + 1 }}"
            }}
        ],
        "connections": [
            {"sourceNodeId": "A", "targetNodeId": "B"},
            {"sourceNodeId": "B", "targetNodeId": "C"}
        ]
    }));

    let result = run(
        &harness,
        &def,
        json!({"n": 3}),
        ExecutionOptions::default(),
        "exec-linear",
    )
    .await;

    assert_eq!(result.status, ExecutionStatus::Completed);
    assert_eq!(result.nodes_executed, 3);
    assert_eq!(result.output[&NodeId::new("A")], object(json!({"x": 3})));
    assert_eq!(result.output[&NodeId::new("B")], object(json!({"y": 6})));
    assert_eq!(
        result.output[&NodeId::new("C")],
        object(json!({"y": 6, "z": 7}))
    );
}

#[tokio::test]
async fn parallel_diamond() {
    let harness = harness(base_registry());
    let def = definition(json!({
        "id": "wf-diamond",
        "workspaceId": "ws-1",
        "name": "diamond",
        "nodes": [
            {"id": "A", "type": "action.set", "parameters": {"value": "A"}},
            {"id": "B", "type": "action.set", "parameters": {"value": "B"}},
            {"id": "C", "type": "action.set", "parameters": {"value": "C"}},
            {"id": "D", "type": "action.set", "parameters": {"value": "D"}}
        ],
        "connections": [
            {"sourceNodeId": "A", "targetNodeId": "B"},
            {"sourceNodeId": "A", "targetNodeId": "C"},
            {"sourceNodeId": "B", "targetNodeId": "D"},
            {"sourceNodeId": "C", "targetNodeId": "D"}
        ]
    }));

    let options = ExecutionOptions {
        max_parallel_nodes: 2,
        ..ExecutionOptions::default()
    };
    let result = run(&harness, &def, json!({}), options, "exec-diamond").await;

    assert_eq!(result.status, ExecutionStatus::Completed);
    assert_eq!(result.nodes_executed, 4);
    for id in ["A", "B", "C", "D"] {
        assert_eq!(
            result.output[&NodeId::new(id)],
            object(json!({"value": id})),
        );
    }

    // D only starts after the whole middle level completes.
    let d = &result.node_results[&NodeId::new("D")];
    let b = &result.node_results[&NodeId::new("B")];
    let c = &result.node_results[&NodeId::new("C")];
    assert!(d.started_at >= b.finished_at);
    assert!(d.started_at >= c.finished_at);
}

#[tokio::test]
async fn siblings_in_a_level_overlap() {
    let harness = harness(base_registry());
    let def = definition(json!({
        "id": "wf-overlap",
        "workspaceId": "ws-1",
        "name": "overlap",
        "nodes": [
            {"id": "left", "type": "action.sleep", "parameters": {"delay_ms": 100}},
            {"id": "right", "type": "action.sleep", "parameters": {"delay_ms": 100}}
        ],
        "connections": []
    }));

    let options = ExecutionOptions {
        max_parallel_nodes: 2,
        enable_caching: false,
        ..ExecutionOptions::default()
    };
    let result = run(&harness, &def, json!({}), options, "exec-overlap").await;

    assert_eq!(result.status, ExecutionStatus::Completed);
    let left = &result.node_results[&NodeId::new("left")];
    let right = &result.node_results[&NodeId::new("right")];
    // Concurrent siblings overlap in wall-clock time.
    assert!(left.started_at < right.finished_at);
    assert!(right.started_at < left.finished_at);
}

#[tokio::test]
async fn node_timeout_fails_execution() {
    let harness = harness(base_registry());
    let def = definition(json!({
        "id": "wf-timeout",
        "workspaceId": "ws-1",
        "name": "timeout",
        "nodes": [
            {"id": "slow", "type": "action.sleep",
             "parameters": {"delay_ms": 5000}, "timeout": 100}
        ],
        "connections": []
    }));

    let result = run(
        &harness,
        &def,
        json!({}),
        ExecutionOptions::default(),
        "exec-timeout",
    )
    .await;

    assert_eq!(result.status, ExecutionStatus::Failed);
    assert_eq!(result.error_node_id, Some(NodeId::new("slow")));
    let error = result.error.unwrap();
    assert_eq!(ErrorCategory::classify(&error), ErrorCategory::Timeout);
}

#[tokio::test]
async fn retry_succeeds_and_counts_attempts() {
    let registry = base_registry();
    registry
        .register(
            "action.flaky",
            Arc::new(FlakyHandler {
                failures: AtomicU32::new(2),
                calls: AtomicU32::new(0),
            }),
        )
        .unwrap();
    let harness = harness(registry);

    let def = definition(json!({
        "id": "wf-retry",
        "workspaceId": "ws-1",
        "name": "retry",
        "nodes": [
            {"id": "flaky", "type": "action.flaky", "parameters": {"ok": true},
             "retryOnFail": true, "maxRetries": 2}
        ],
        "connections": []
    }));

    let result = run(
        &harness,
        &def,
        json!({}),
        ExecutionOptions::default(),
        "exec-retry",
    )
    .await;

    assert_eq!(result.status, ExecutionStatus::Completed);
    let node = &result.node_results[&NodeId::new("flaky")];
    assert_eq!(node.status, NodeStatus::Completed);
    assert_eq!(node.retries, 2);
    assert!(node.error.is_none());
}

#[tokio::test]
async fn retry_exhaustion_surfaces_last_error() {
    let registry = base_registry();
    registry
        .register(
            "action.flaky",
            Arc::new(FlakyHandler {
                failures: AtomicU32::new(10),
                calls: AtomicU32::new(0),
            }),
        )
        .unwrap();
    let harness = harness(registry);

    let def = definition(json!({
        "id": "wf-retry-fail",
        "workspaceId": "ws-1",
        "name": "retry-fail",
        "nodes": [
            {"id": "flaky", "type": "action.flaky", "parameters": {},
             "retryOnFail": true, "maxRetries": 2}
        ],
        "connections": []
    }));

    let result = run(
        &harness,
        &def,
        json!({}),
        ExecutionOptions::default(),
        "exec-retry-fail",
    )
    .await;

    assert_eq!(result.status, ExecutionStatus::Failed);
    let node = &result.node_results[&NodeId::new("flaky")];
    assert_eq!(node.retries, 2);
    // The last attempt's error is the one that surfaces.
    assert_eq!(node.error.as_deref(), Some("attempt 2 failed"));
}

#[tokio::test]
async fn cycle_is_rejected_without_running_handlers() {
    let registry = base_registry();
    let counting = Arc::new(CountingHandler {
        calls: AtomicUsize::new(0),
    });
    registry
        .register("action.counted", Arc::clone(&counting) as Arc<dyn NodeHandler>)
        .unwrap();
    let harness = harness(registry);

    let def = definition(json!({
        "id": "wf-cycle",
        "workspaceId": "ws-1",
        "name": "cycle",
        "nodes": [
            {"id": "A", "type": "action.counted", "parameters": {}},
            {"id": "B", "type": "action.counted", "parameters": {}},
            {"id": "C", "type": "action.counted", "parameters": {}}
        ],
        "connections": [
            {"sourceNodeId": "A", "targetNodeId": "B"},
            {"sourceNodeId": "B", "targetNodeId": "C"},
            {"sourceNodeId": "C", "targetNodeId": "A"}
        ]
    }));

    let result = run(
        &harness,
        &def,
        json!({}),
        ExecutionOptions::default(),
        "exec-cycle",
    )
    .await;

    assert_eq!(result.status, ExecutionStatus::Failed);
    assert!(result.error.unwrap().contains("CYCLE_DETECTED"));
    assert_eq!(result.nodes_executed, 0);
    assert_eq!(counting.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn cancellation_stops_before_next_node() {
    let registry = base_registry();
    let harness = harness(registry.clone());
    // Node n2 cancels the execution through the manager as its last
    // act, so the scheduler observes the cancellation before n3.
    registry
        .register(
            "action.cancelling",
            Arc::new(CancellingHandler {
                manager: Arc::clone(&harness.manager),
            }),
        )
        .unwrap();

    let def = definition(json!({
        "id": "wf-cancel",
        "workspaceId": "ws-1",
        "name": "cancel",
        "nodes": [
            {"id": "n1", "type": "action.set", "parameters": {"step": 1}},
            {"id": "n2", "type": "action.cancelling", "parameters": {"step": 2}},
            {"id": "n3", "type": "action.set", "parameters": {"step": 3}},
            {"id": "n4", "type": "action.set", "parameters": {"step": 4}},
            {"id": "n5", "type": "action.set", "parameters": {"step": 5}}
        ],
        "connections": [
            {"sourceNodeId": "n1", "targetNodeId": "n2"},
            {"sourceNodeId": "n2", "targetNodeId": "n3"},
            {"sourceNodeId": "n3", "targetNodeId": "n4"},
            {"sourceNodeId": "n4", "targetNodeId": "n5"}
        ]
    }));

    let options = ExecutionOptions {
        max_parallel_nodes: 1,
        ..ExecutionOptions::default()
    };
    let result = run(&harness, &def, json!({}), options, "exec-cancel").await;

    assert_eq!(result.status, ExecutionStatus::Cancelled);
    assert_eq!(result.nodes_executed, 2);
    assert!(!result.node_results.contains_key(&NodeId::new("n3")));
}

#[tokio::test]
async fn empty_workflow_completes() {
    let harness = harness(base_registry());
    let def = definition(json!({
        "id": "wf-empty",
        "workspaceId": "ws-1",
        "name": "empty",
        "nodes": [],
        "connections": []
    }));

    let result = run(
        &harness,
        &def,
        json!({}),
        ExecutionOptions::default(),
        "exec-empty",
    )
    .await;

    assert_eq!(result.status, ExecutionStatus::Completed);
    assert_eq!(result.nodes_executed, 0);
}

#[tokio::test]
async fn single_disabled_node_behaves_like_empty() {
    let harness = harness(base_registry());
    let def = definition(json!({
        "id": "wf-disabled",
        "workspaceId": "ws-1",
        "name": "disabled",
        "nodes": [
            {"id": "off", "type": "action.set", "parameters": {}, "disabled": true}
        ],
        "connections": []
    }));

    let result = run(
        &harness,
        &def,
        json!({}),
        ExecutionOptions::default(),
        "exec-disabled",
    )
    .await;

    assert_eq!(result.status, ExecutionStatus::Completed);
    assert_eq!(result.nodes_executed, 0);
}

#[tokio::test]
async fn unknown_node_type_fails_node() {
    let harness = harness(base_registry());
    let def = definition(json!({
        "id": "wf-unknown",
        "workspaceId": "ws-1",
        "name": "unknown",
        "nodes": [
            {"id": "mystery", "type": "action.nope", "parameters": {}}
        ],
        "connections": []
    }));

    let result = run(
        &harness,
        &def,
        json!({}),
        ExecutionOptions::default(),
        "exec-unknown",
    )
    .await;

    assert_eq!(result.status, ExecutionStatus::Failed);
    assert_eq!(result.error_node_id, Some(NodeId::new("mystery")));
    assert!(result.error.unwrap().contains("unknown node type"));
}

#[tokio::test]
async fn cached_rerun_skips_handler_invocations() {
    let registry = base_registry();
    let counting = Arc::new(CountingHandler {
        calls: AtomicUsize::new(0),
    });
    registry
        .register("action.counted", Arc::clone(&counting) as Arc<dyn NodeHandler>)
        .unwrap();
    let harness = harness(registry);

    let def = definition(json!({
        "id": "wf-cache",
        "workspaceId": "ws-1",
        "name": "cache",
        "nodes": [
            {"id": "pure", "type": "action.counted", "parameters": {"v": 1}}
        ],
        "connections": []
    }));

    let first = run(
        &harness,
        &def,
        json!({"n": 1}),
        ExecutionOptions::default(),
        "exec-cache",
    )
    .await;
    assert_eq!(first.status, ExecutionStatus::Completed);
    assert_eq!(counting.calls.load(Ordering::SeqCst), 1);
    assert!(!first.node_results[&NodeId::new("pure")].cache_hit);

    // Same execution id, same input: the result is served from cache.
    let second = run(
        &harness,
        &def,
        json!({"n": 1}),
        ExecutionOptions::default(),
        "exec-cache",
    )
    .await;
    assert_eq!(second.status, ExecutionStatus::Completed);
    assert_eq!(counting.calls.load(Ordering::SeqCst), 1);
    let node = &second.node_results[&NodeId::new("pure")];
    assert_eq!(node.status, NodeStatus::Cached);
    assert!(node.cache_hit);
    assert_eq!(second.output[&NodeId::new("pure")], object(json!({"v": 1})));
}

#[tokio::test]
async fn skip_nodes_are_marked_skipped() {
    let harness = harness(base_registry());
    let def = definition(json!({
        "id": "wf-skip",
        "workspaceId": "ws-1",
        "name": "skip",
        "nodes": [
            {"id": "a", "type": "action.set", "parameters": {"v": "a"}},
            {"id": "b", "type": "action.set", "parameters": {"v": "b"}}
        ],
        "connections": [
            {"sourceNodeId": "a", "targetNodeId": "b"}
        ]
    }));

    let options = ExecutionOptions {
        skip_nodes: vec![NodeId::new("a")],
        ..ExecutionOptions::default()
    };
    let result = run(&harness, &def, json!({}), options, "exec-skip").await;

    assert_eq!(result.status, ExecutionStatus::Completed);
    assert_eq!(result.nodes_executed, 1);
    assert_eq!(
        result.node_results[&NodeId::new("a")].status,
        NodeStatus::Skipped
    );
    assert_eq!(
        result.node_results[&NodeId::new("b")].status,
        NodeStatus::Completed
    );
}

#[tokio::test]
async fn node_overrides_replace_resolved_config() {
    let harness = harness(base_registry());
    let def = definition(json!({
        "id": "wf-override",
        "workspaceId": "ws-1",
        "name": "override",
        "nodes": [
            {"id": "a", "type": "action.set", "parameters": {"v": "original"}}
        ],
        "connections": []
    }));

    let mut options = ExecutionOptions::default();
    options
        .node_overrides
        .insert(NodeId::new("a"), object(json!({"v": "patched"})));
    let result = run(&harness, &def, json!({}), options, "exec-override").await;

    assert_eq!(
        result.output[&NodeId::new("a")],
        object(json!({"v": "patched"}))
    );
}

#[tokio::test]
async fn workflow_timeout_yields_timed_out_status() {
    let harness = harness(base_registry());
    let def = definition(json!({
        "id": "wf-deadline",
        "workspaceId": "ws-1",
        "name": "deadline",
        "nodes": [
            {"id": "slow", "type": "action.sleep", "parameters": {"delay_ms": 60000}}
        ],
        "connections": []
    }));

    let options = ExecutionOptions {
        workflow_timeout: Duration::from_millis(100),
        default_node_timeout: Duration::from_secs(120),
        ..ExecutionOptions::default()
    };
    let result = run(&harness, &def, json!({}), options, "exec-deadline").await;

    assert_eq!(result.status, ExecutionStatus::TimedOut);
    assert_eq!(result.error.as_deref(), Some("workflow timeout"));
}

#[tokio::test]
async fn parallel_failure_stops_following_levels() {
    let registry = base_registry();
    let counting = Arc::new(CountingHandler {
        calls: AtomicUsize::new(0),
    });
    registry
        .register("action.counted", Arc::clone(&counting) as Arc<dyn NodeHandler>)
        .unwrap();
    registry
        .register(
            "action.failing",
            Arc::new(FlakyHandler {
                failures: AtomicU32::new(u32::MAX),
                calls: AtomicU32::new(0),
            }),
        )
        .unwrap();
    let harness = harness(registry);

    let def = definition(json!({
        "id": "wf-parallel-fail",
        "workspaceId": "ws-1",
        "name": "parallel-fail",
        "nodes": [
            {"id": "a", "type": "action.set", "parameters": {}},
            {"id": "bad", "type": "action.failing", "parameters": {}},
            {"id": "fine", "type": "action.set", "parameters": {}},
            {"id": "after", "type": "action.counted", "parameters": {}}
        ],
        "connections": [
            {"sourceNodeId": "a", "targetNodeId": "bad"},
            {"sourceNodeId": "a", "targetNodeId": "fine"},
            {"sourceNodeId": "bad", "targetNodeId": "after"},
            {"sourceNodeId": "fine", "targetNodeId": "after"}
        ]
    }));

    let options = ExecutionOptions {
        max_parallel_nodes: 4,
        ..ExecutionOptions::default()
    };
    let result = run(&harness, &def, json!({}), options, "exec-parallel-fail").await;

    assert_eq!(result.status, ExecutionStatus::Failed);
    assert_eq!(result.error_node_id, Some(NodeId::new("bad")));
    // The level after the failure never starts.
    assert_eq!(counting.calls.load(Ordering::SeqCst), 0);
    assert!(!result.node_results.contains_key(&NodeId::new("after")));
}

#[tokio::test]
async fn preview_reports_plan_without_running() {
    let registry = base_registry();
    let counting = Arc::new(CountingHandler {
        calls: AtomicUsize::new(0),
    });
    registry
        .register("action.counted", Arc::clone(&counting) as Arc<dyn NodeHandler>)
        .unwrap();
    let harness = harness(registry);

    let def = definition(json!({
        "id": "wf-preview",
        "workspaceId": "ws-1",
        "name": "preview",
        "nodes": [
            {"id": "a", "type": "action.counted", "parameters": {}},
            {"id": "b", "type": "action.unknown", "parameters": {}}
        ],
        "connections": [
            {"sourceNodeId": "a", "targetNodeId": "b"}
        ]
    }));

    let preview = harness.processor.preview(&def);
    assert!(preview.valid);
    assert_eq!(preview.nodes.len(), 2);
    assert!(preview.nodes[0].would_execute);
    assert!(!preview.nodes[1].would_execute);
    assert_eq!(preview.warnings.len(), 1);
    assert_eq!(counting.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn start_from_node_replays_sub_graph() {
    let registry = base_registry();
    let counting = Arc::new(CountingHandler {
        calls: AtomicUsize::new(0),
    });
    registry
        .register("action.counted", Arc::clone(&counting) as Arc<dyn NodeHandler>)
        .unwrap();
    let harness = harness(registry);

    let def = definition(json!({
        "id": "wf-replay",
        "workspaceId": "ws-1",
        "name": "replay",
        "nodes": [
            {"id": "a", "type": "action.counted", "parameters": {}},
            {"id": "b", "type": "action.set", "parameters": {"v": "b"}},
            {"id": "c", "type": "action.set", "parameters": {"v": "c"}}
        ],
        "connections": [
            {"sourceNodeId": "a", "targetNodeId": "b"},
            {"sourceNodeId": "b", "targetNodeId": "c"}
        ]
    }));

    let options = ExecutionOptions {
        start_from_node: Some(NodeId::new("b")),
        ..ExecutionOptions::default()
    };
    let result = run(&harness, &def, json!({}), options, "exec-replay").await;

    assert_eq!(result.status, ExecutionStatus::Completed);
    assert_eq!(result.nodes_executed, 2);
    assert_eq!(counting.calls.load(Ordering::SeqCst), 0);
    assert!(result.output.contains_key(&NodeId::new("b")));
    assert!(result.output.contains_key(&NodeId::new("c")));
}
