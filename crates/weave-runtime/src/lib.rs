//! # weave-runtime
//!
//! The execution runtime of the Weave workflow engine: given a parsed
//! workflow definition and an input payload, [`Processor::execute`]
//! walks the dependency graph in order (sequentially, or level-parallel
//! under a concurrency bound), runs each node's handler through a
//! middleware chain, flows outputs between nodes, caches idempotent
//! results, enforces deadlines, and publishes lifecycle events so
//! observers can follow progress live.
//!
//! Persistence, authentication, scheduling triggers, and concrete node
//! implementations live outside this crate, behind the
//! [`handler::NodeHandler`] registry, [`handler::CredentialResolver`],
//! and the [`store`] interfaces.
//!
//! ```no_run
//! use std::sync::Arc;
//! use weave_runtime::cancel::CancellationManager;
//! use weave_runtime::events::EventPublisher;
//! use weave_runtime::handler::{HandlerRegistry, NullCredentialResolver};
//! use weave_runtime::options::ExecutionOptions;
//! use weave_runtime::processor::Processor;
//! use weave_runtime::store::MemoryBus;
//! use weave_workflow::WorkflowDefinition;
//!
//! # async fn run() {
//! let registry = Arc::new(HandlerRegistry::new());
//! let bus = Arc::new(MemoryBus::new());
//! let processor = Processor::new(registry)
//!     .with_cancellation_manager(Arc::new(CancellationManager::new(bus.clone())));
//!
//! let def = WorkflowDefinition::from_json(r#"{"nodes": [], "connections": []}"#).unwrap();
//! let result = processor
//!     .execute(
//!         &def,
//!         serde_json::Map::new(),
//!         &ExecutionOptions::default(),
//!         "exec-1".into(),
//!         Arc::new(NullCredentialResolver),
//!         Arc::new(EventPublisher::new(bus)),
//!     )
//!     .await;
//! assert!(result.is_success());
//! # }
//! ```

pub mod cache;
pub mod cancel;
pub mod context;
pub mod error;
pub mod events;
pub mod handler;
pub mod middleware;
pub mod options;
pub mod processor;
pub mod progress;
pub mod store;

pub use cache::{CachingCredentialResolver, ResultCache};
pub use cancel::CancellationManager;
pub use context::{compute_input_hash, RuntimeContext};
pub use error::{EngineError, ErrorCategory, NodeError};
pub use events::{Event, EventKind, EventPublisher};
pub use handler::{
    CredentialData, CredentialResolver, HandlerContext, HandlerRegistry, NodeHandler,
    NullCredentialResolver, Output,
};
pub use middleware::{Chain, Middleware};
pub use options::{
    ExecutionOptions, ExecutionResult, ExecutionStatus, NodePreview, NodeResult, NodeStatus,
    PreviewResult,
};
pub use processor::Processor;
pub use progress::{ProgressSnapshot, ProgressTracker};
pub use store::{KeyValueStore, MemoryBus, MemoryStore, PubSub};
