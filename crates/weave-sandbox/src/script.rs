//! Script wrapping and single-run execution on a blocking thread.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use rquickjs::{Context, Runtime};
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::error::{SandboxError, SandboxResult};

/// The decoded result of one sandbox run.
#[derive(Debug, Clone, PartialEq)]
pub struct ScriptOutput {
    /// The script's return value, wrapped as `{"result": value}` when
    /// the script did not return an object.
    pub output: serde_json::Map<String, Value>,
    /// Captured `console.*` lines, in emission order.
    pub logs: Vec<String>,
}

/// Shim installed before user code: neutralizes dynamic code execution
/// and replaces console with a capturing recorder. `JSON`, `Math`,
/// `Object`, and `Array` are interpreter intrinsics and stay available.
const PRELUDE: &str = r"globalThis.eval = undefined; globalThis.Function = undefined;";

struct Envelope {
    value: Value,
    logs: Vec<String>,
    error: Option<String>,
}

impl Envelope {
    fn from_value(raw: &Value) -> Option<Self> {
        let map = raw.as_object()?;
        Some(Self {
            value: map.get("value").cloned().unwrap_or(Value::Null),
            logs: map
                .get("logs")?
                .as_array()?
                .iter()
                .filter_map(|v| v.as_str().map(str::to_owned))
                .collect(),
            error: map.get("error").and_then(Value::as_str).map(str::to_owned),
        })
    }
}

/// Wrap user code as a function body over `input`/`$json` with captured
/// console, returning a JSON envelope.
fn wrap_node_code(code: &str) -> String {
    format!(
        r#"{PRELUDE}
(function() {{
    const __logs = [];
    const __fmt = function(args) {{
        return args.map(function(a) {{
            return (typeof a === "string") ? a : JSON.stringify(a);
        }}).join(" ");
    }};
    const console = {{
        log: function() {{ __logs.push(__fmt(Array.prototype.slice.call(arguments))); }},
        info: function() {{ __logs.push(__fmt(Array.prototype.slice.call(arguments))); }},
        warn: function() {{ __logs.push(__fmt(Array.prototype.slice.call(arguments))); }},
        error: function() {{ __logs.push(__fmt(Array.prototype.slice.call(arguments))); }}
    }};
    let __value = null;
    let __error = null;
    try {{
        const input = JSON.parse(__weave_input);
        const $json = (input !== null && typeof input === "object" && "$json" in input)
            ? input["$json"]
            : input;
        const __run = function(input, $json, console) {{
{code}
        }};
        const __r = __run(input, $json, console);
        __value = (__r === undefined) ? null : __r;
    }} catch (e) {{
        __error = String(e && e.message ? e.message : e);
    }}
    return JSON.stringify({{ value: __value, logs: __logs, error: __error }});
}})()"#
    )
}

/// Wrap user code to run per item with `$item`/`$index`. In `filter`
/// mode items whose result is truthy are kept; otherwise the results are
/// collected.
fn wrap_item_code(code: &str, filter: bool) -> String {
    let collect = if filter {
        "if (__r) { __out.push($item); }"
    } else {
        "__out.push(__r === undefined ? null : __r);"
    };
    format!(
        r#"{PRELUDE}
(function() {{
    const __logs = [];
    const __fmt = function(args) {{
        return args.map(function(a) {{
            return (typeof a === "string") ? a : JSON.stringify(a);
        }}).join(" ");
    }};
    const console = {{
        log: function() {{ __logs.push(__fmt(Array.prototype.slice.call(arguments))); }},
        info: function() {{ __logs.push(__fmt(Array.prototype.slice.call(arguments))); }},
        warn: function() {{ __logs.push(__fmt(Array.prototype.slice.call(arguments))); }},
        error: function() {{ __logs.push(__fmt(Array.prototype.slice.call(arguments))); }}
    }};
    let __value = null;
    let __error = null;
    try {{
        const __items = JSON.parse(__weave_input);
        const __step = function($item, $index, console) {{
{code}
        }};
        const __out = [];
        for (let __i = 0; __i < __items.length; __i++) {{
            const $item = __items[__i];
            const __r = __step($item, __i, console);
            {collect}
        }}
        __value = __out;
    }} catch (e) {{
        __error = String(e && e.message ? e.message : e);
    }}
    return JSON.stringify({{ value: __value, logs: __logs, error: __error }});
}})()"#
    )
}

pub(crate) enum ScriptKind {
    /// Whole-input node code (`input` / `$json`).
    Node,
    /// Per-item transform (`$item` / `$index`).
    Transform,
    /// Per-item predicate keeping truthy items.
    Filter,
}

/// Run one script on the current (blocking) thread with a fresh
/// interpreter, bounded memory, and a deadline interrupt.
pub(crate) fn run_blocking(
    kind: &ScriptKind,
    code: &str,
    input_json: String,
    time_limit: Duration,
    memory_limit: usize,
    cancel: Option<CancellationToken>,
) -> SandboxResult<(Value, Vec<String>)> {
    let runtime = Runtime::new().map_err(|e| SandboxError::Init(e.to_string()))?;
    runtime.set_memory_limit(memory_limit);

    let deadline = Instant::now() + time_limit;
    let timed_out = Arc::new(AtomicBool::new(false));
    let cancelled = Arc::new(AtomicBool::new(false));
    {
        let timed_out = Arc::clone(&timed_out);
        let cancelled = Arc::clone(&cancelled);
        let cancel = cancel.clone();
        runtime.set_interrupt_handler(Some(Box::new(move || {
            if Instant::now() >= deadline {
                timed_out.store(true, Ordering::SeqCst);
                return true;
            }
            if cancel.as_ref().is_some_and(CancellationToken::is_cancelled) {
                cancelled.store(true, Ordering::SeqCst);
                return true;
            }
            false
        })));
    }

    let context = Context::full(&runtime).map_err(|e| SandboxError::Init(e.to_string()))?;
    let wrapped = match kind {
        ScriptKind::Node => wrap_node_code(code),
        ScriptKind::Transform => wrap_item_code(code, false),
        ScriptKind::Filter => wrap_item_code(code, true),
    };

    let evaluated: Result<String, rquickjs::Error> = context.with(|ctx| {
        ctx.globals().set("__weave_input", input_json)?;
        ctx.eval(wrapped)
    });

    let payload = match evaluated {
        Ok(payload) => payload,
        Err(err) => {
            if timed_out.load(Ordering::SeqCst) {
                return Err(SandboxError::TimeLimit(time_limit));
            }
            if cancelled.load(Ordering::SeqCst) {
                return Err(SandboxError::Cancelled);
            }
            return Err(SandboxError::Script(err.to_string()));
        }
    };

    let raw: Value = serde_json::from_str(&payload)
        .map_err(|e| SandboxError::Output(format!("invalid result envelope: {e}")))?;
    let envelope = Envelope::from_value(&raw)
        .ok_or_else(|| SandboxError::Output("malformed result envelope".into()))?;

    for line in &envelope.logs {
        debug!(target: "weave_sandbox::console", "{line}");
    }
    if let Some(message) = envelope.error {
        return Err(SandboxError::Script(message));
    }
    Ok((envelope.value, envelope.logs))
}

/// Wrap non-object return values for node output uniformity.
pub(crate) fn wrap_output(value: Value) -> serde_json::Map<String, Value> {
    match value {
        Value::Object(map) => map,
        other => {
            let mut map = serde_json::Map::new();
            map.insert("result".to_owned(), other);
            map
        }
    }
}
