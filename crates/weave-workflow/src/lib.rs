//! Workflow definitions and the dependency graph derived from them.
//!
//! [`definition`] holds the serde-facing structures ingested from the
//! workflow JSON format; [`graph`] derives the acyclic dependency graph
//! the scheduler walks, along with validation, topological ordering, and
//! level partitioning.

pub mod definition;
pub mod error;
pub mod graph;

pub use definition::{
    Connection, NodeDefinition, Position, WorkflowDefinition, WorkflowSettings,
};
pub use error::{ValidationCode, ValidationError, WorkflowError};
pub use graph::{Branch, DependencyGraph, InputRef};
