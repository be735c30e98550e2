//! # weave-sandbox
//!
//! Sandboxed JavaScript execution for "code" nodes.
//!
//! User code runs inside QuickJS with no host I/O: `eval` and `Function`
//! are neutralized, `console.*` is captured instead of reaching stdout,
//! memory is bounded through the interpreter's allocator limit, and a
//! deadline interrupt stops runaway scripts. Concurrency is bounded by an
//! interpreter pool; every run gets a freshly reset interpreter.

pub mod error;
pub mod pool;
pub mod script;

pub use error::{SandboxError, SandboxResult};
pub use pool::{Sandbox, SandboxConfig};
pub use script::ScriptOutput;
