//! Sandbox error types.

use std::time::Duration;

use thiserror::Error;

/// Result alias for sandbox operations.
pub type SandboxResult<T> = Result<T, SandboxError>;

/// Errors raised while executing sandboxed code.
#[derive(Debug, Clone, Error)]
pub enum SandboxError {
    /// The interpreter could not be created.
    #[error("failed to initialize sandbox interpreter: {0}")]
    Init(String),

    /// The script threw or failed to parse.
    #[error("script error: {0}")]
    Script(String),

    /// The script exceeded its time budget.
    #[error("script exceeded time limit of {0:?}")]
    TimeLimit(Duration),

    /// The surrounding execution was cancelled while the script ran.
    #[error("script execution was cancelled")]
    Cancelled,

    /// The script produced a value the engine could not decode.
    #[error("script produced undecodable output: {0}")]
    Output(String),

    /// The sandbox worker thread was lost.
    #[error("sandbox worker failed: {0}")]
    Worker(String),
}
