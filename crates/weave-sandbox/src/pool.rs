//! Bounded interpreter pool and the public sandbox API.

use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use tracing::trace;

use crate::error::{SandboxError, SandboxResult};
use crate::script::{self, ScriptKind, ScriptOutput};

/// Sandbox tuning knobs.
#[derive(Debug, Clone)]
pub struct SandboxConfig {
    /// Concurrent interpreter bound.
    pub pool_size: usize,
    /// Wall-clock budget per run.
    pub time_limit: Duration,
    /// Interpreter allocator budget in bytes (best-effort).
    pub memory_limit_bytes: usize,
}

impl Default for SandboxConfig {
    fn default() -> Self {
        Self {
            pool_size: 10,
            time_limit: Duration::from_secs(30),
            memory_limit_bytes: 64 * 1024 * 1024,
        }
    }
}

/// A pool of isolated interpreters running user code from code nodes.
///
/// A run draws a slot from the pool, gets a freshly reset interpreter on
/// a blocking thread, and returns the slot when done.
#[derive(Debug, Clone)]
pub struct Sandbox {
    config: SandboxConfig,
    slots: Arc<Semaphore>,
}

impl Sandbox {
    /// Sandbox with default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(SandboxConfig::default())
    }

    /// Sandbox with explicit configuration.
    #[must_use]
    pub fn with_config(config: SandboxConfig) -> Self {
        let slots = Arc::new(Semaphore::new(config.pool_size.max(1)));
        Self { config, slots }
    }

    /// Run node code against an input mapping.
    ///
    /// The input is visible as `input`, and as `$json` (either the
    /// input's own `$json` entry or the whole input). Non-object return
    /// values are wrapped as `{"result": value}`.
    pub async fn execute(
        &self,
        code: &str,
        input: &serde_json::Map<String, Value>,
    ) -> SandboxResult<ScriptOutput> {
        self.execute_with_cancel(code, input, CancellationToken::new())
            .await
    }

    /// As [`execute`](Self::execute), interrupting when `cancel` fires.
    pub async fn execute_with_cancel(
        &self,
        code: &str,
        input: &serde_json::Map<String, Value>,
        cancel: CancellationToken,
    ) -> SandboxResult<ScriptOutput> {
        let input_json = serde_json::to_string(&Value::Object(input.clone()))
            .map_err(|e| SandboxError::Output(e.to_string()))?;
        let (value, logs) = self
            .run(ScriptKind::Node, code, input_json, Some(cancel))
            .await?;
        Ok(ScriptOutput {
            output: script::wrap_output(value),
            logs,
        })
    }

    /// Run code once per item with `$item` and `$index`, collecting the
    /// per-item results.
    pub async fn execute_transform(
        &self,
        code: &str,
        items: &[Value],
    ) -> SandboxResult<Vec<Value>> {
        let input_json = serde_json::to_string(items)
            .map_err(|e| SandboxError::Output(e.to_string()))?;
        let (value, _logs) = self
            .run(ScriptKind::Transform, code, input_json, None)
            .await?;
        match value {
            Value::Array(items) => Ok(items),
            other => Err(SandboxError::Output(format!(
                "transform produced non-array output: {other}"
            ))),
        }
    }

    /// Run code once per item, keeping the items the code returned a
    /// truthy value for.
    pub async fn execute_filter(&self, code: &str, items: &[Value]) -> SandboxResult<Vec<Value>> {
        let input_json = serde_json::to_string(items)
            .map_err(|e| SandboxError::Output(e.to_string()))?;
        let (value, _logs) = self.run(ScriptKind::Filter, code, input_json, None).await?;
        match value {
            Value::Array(items) => Ok(items),
            other => Err(SandboxError::Output(format!(
                "filter produced non-array output: {other}"
            ))),
        }
    }

    async fn run(
        &self,
        kind: ScriptKind,
        code: &str,
        input_json: String,
        cancel: Option<CancellationToken>,
    ) -> SandboxResult<(Value, Vec<String>)> {
        let _slot = Arc::clone(&self.slots)
            .acquire_owned()
            .await
            .map_err(|e| SandboxError::Worker(e.to_string()))?;
        trace!(available = self.slots.available_permits(), "sandbox slot acquired");

        let code = code.to_owned();
        let time_limit = self.config.time_limit;
        let memory_limit = self.config.memory_limit_bytes;
        tokio::task::spawn_blocking(move || {
            script::run_blocking(&kind, &code, input_json, time_limit, memory_limit, cancel)
        })
        .await
        .map_err(|e| SandboxError::Worker(e.to_string()))?
    }
}

impl Default for Sandbox {
    fn default() -> Self {
        Self::new()
    }
}
