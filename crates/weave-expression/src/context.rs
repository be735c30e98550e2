//! Evaluation context for expressions.
//!
//! Carries everything an expression can see: the current node's canonical
//! input (`$json`), prior node outputs (`$node.<id>`), workflow variables
//! (`$vars`), resolved environment variables (`$env`), execution metadata
//! (`$execution`), and the raw workflow input (`$input`).

use std::collections::BTreeMap;

use chrono::{SecondsFormat, Utc};
use serde_json::{Map, Value};

/// Context an expression is evaluated against.
#[derive(Debug, Clone, Default)]
pub struct EvaluationContext {
    json: Value,
    input: Value,
    nodes: BTreeMap<String, Value>,
    vars: BTreeMap<String, Value>,
    env: BTreeMap<String, String>,
    execution: Map<String, Value>,
}

impl EvaluationContext {
    /// Create an empty context.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a builder.
    #[must_use]
    pub fn builder() -> EvaluationContextBuilder {
        EvaluationContextBuilder::default()
    }

    /// Set the canonical input of the current node (`$json`).
    pub fn set_json(&mut self, value: Value) {
        self.json = value;
    }

    /// Set the raw workflow input (`$input`).
    pub fn set_input(&mut self, value: Value) {
        self.input = value;
    }

    /// Record a prior node's output (`$node.<id>`).
    pub fn set_node_output(&mut self, node_id: impl Into<String>, value: Value) {
        self.nodes.insert(node_id.into(), value);
    }

    /// Set a workflow variable (`$vars.<key>`).
    pub fn set_var(&mut self, key: impl Into<String>, value: Value) {
        self.vars.insert(key.into(), value);
    }

    /// Set a resolved environment variable (`$env.<key>`).
    pub fn set_env(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.env.insert(key.into(), value.into());
    }

    /// Set an execution metadata field (`$execution.<key>`).
    pub fn set_execution(&mut self, key: impl Into<String>, value: Value) {
        self.execution.insert(key.into(), value);
    }

    /// Resolve a `$`-variable by name. `None` means undefined, which the
    /// evaluator maps to null.
    #[must_use]
    pub fn resolve(&self, name: &str) -> Option<Value> {
        match name {
            "json" => Some(self.json.clone()),
            "input" => Some(self.input.clone()),
            "node" => Some(Value::Object(
                self.nodes
                    .iter()
                    .map(|(k, v)| (k.clone(), v.clone()))
                    .collect(),
            )),
            "vars" => Some(Value::Object(
                self.vars
                    .iter()
                    .map(|(k, v)| (k.clone(), v.clone()))
                    .collect(),
            )),
            "env" => Some(Value::Object(
                self.env
                    .iter()
                    .map(|(k, v)| (k.clone(), Value::String(v.clone())))
                    .collect(),
            )),
            "execution" => Some(Value::Object(self.execution.clone())),
            "now" => Some(Value::String(
                Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
            )),
            "today" => Some(Value::String(Utc::now().format("%Y-%m-%d").to_string())),
            "timestamp" => Some(Value::from(Utc::now().timestamp_millis())),
            _ => None,
        }
    }
}

/// Builder for [`EvaluationContext`].
#[derive(Debug, Clone, Default)]
pub struct EvaluationContextBuilder {
    context: EvaluationContext,
}

impl EvaluationContextBuilder {
    /// Set `$json`.
    #[must_use]
    pub fn json(mut self, value: Value) -> Self {
        self.context.json = value;
        self
    }

    /// Set `$input`.
    #[must_use]
    pub fn input(mut self, value: Value) -> Self {
        self.context.input = value;
        self
    }

    /// Record a node output.
    #[must_use]
    pub fn node_output(mut self, node_id: impl Into<String>, value: Value) -> Self {
        self.context.nodes.insert(node_id.into(), value);
        self
    }

    /// Set a workflow variable.
    #[must_use]
    pub fn var(mut self, key: impl Into<String>, value: Value) -> Self {
        self.context.vars.insert(key.into(), value);
        self
    }

    /// Set an environment variable.
    #[must_use]
    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.context.env.insert(key.into(), value.into());
        self
    }

    /// Set an execution metadata field.
    #[must_use]
    pub fn execution(mut self, key: impl Into<String>, value: Value) -> Self {
        self.context.execution.insert(key.into(), value);
        self
    }

    /// Finish building.
    #[must_use]
    pub fn build(self) -> EvaluationContext {
        self.context
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn resolves_known_variables() {
        let ctx = EvaluationContext::builder()
            .json(json!({"x": 1}))
            .input(json!({"n": 3}))
            .node_output("a", json!({"out": true}))
            .var("limit", json!(10))
            .env("REGION", "eu-west-1")
            .execution("id", json!("exec-1"))
            .build();

        assert_eq!(ctx.resolve("json"), Some(json!({"x": 1})));
        assert_eq!(ctx.resolve("input"), Some(json!({"n": 3})));
        assert_eq!(ctx.resolve("node"), Some(json!({"a": {"out": true}})));
        assert_eq!(ctx.resolve("vars"), Some(json!({"limit": 10})));
        assert_eq!(ctx.resolve("env"), Some(json!({"REGION": "eu-west-1"})));
        assert_eq!(ctx.resolve("execution"), Some(json!({"id": "exec-1"})));
    }

    #[test]
    fn unknown_variable_is_none() {
        let ctx = EvaluationContext::new();
        assert_eq!(ctx.resolve("nope"), None);
    }

    #[test]
    fn now_and_today_are_strings() {
        let ctx = EvaluationContext::new();
        assert!(matches!(ctx.resolve("now"), Some(Value::String(_))));
        let today = ctx.resolve("today").unwrap();
        let text = today.as_str().unwrap();
        assert_eq!(text.len(), 10); // YYYY-MM-DD
    }

    #[test]
    fn timestamp_is_numeric() {
        let ctx = EvaluationContext::new();
        assert!(ctx.resolve("timestamp").unwrap().is_i64());
    }
}
