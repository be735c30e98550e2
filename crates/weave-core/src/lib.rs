//! Shared identifier types for the Weave workflow engine.

pub mod id;

pub use id::{CredentialId, ExecutionId, NodeId, WorkflowId, WorkspaceId};
