//! Builtin function set for the expression language.
//!
//! The set is deliberately small: `length`, `upper`, `lower`, `trim`,
//! `now`, `formatDate`, `parseInt`, `parseFloat`, `default`, `contains`.

use chrono::{DateTime, SecondsFormat, TimeZone, Utc};
use serde_json::Value;

use crate::error::{ExpressionError, ExpressionResult};
use crate::eval::{display, loose_eq};

/// Dispatch a builtin call by name.
pub fn call(name: &str, args: &[Value]) -> ExpressionResult<Value> {
    match name {
        "length" => Ok(length(args.first())),
        "upper" => Ok(Value::String(text_arg(args).to_uppercase())),
        "lower" => Ok(Value::String(text_arg(args).to_lowercase())),
        "trim" => Ok(Value::String(text_arg(args).trim().to_owned())),
        "now" => Ok(Value::String(
            Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
        )),
        "formatDate" => format_date(args),
        "parseInt" => Ok(parse_int(args.first())),
        "parseFloat" => Ok(parse_float(args.first())),
        "default" => Ok(default_value(args)),
        "contains" => Ok(contains(args)),
        other => Err(ExpressionError::UnknownFunction(other.to_owned())),
    }
}

fn text_arg(args: &[Value]) -> String {
    args.first().map(display).unwrap_or_default()
}

fn length(value: Option<&Value>) -> Value {
    let count = match value {
        Some(Value::String(s)) => s.chars().count(),
        Some(Value::Array(items)) => items.len(),
        Some(Value::Object(map)) => map.len(),
        _ => 0,
    };
    Value::from(count as i64)
}

fn format_date(args: &[Value]) -> ExpressionResult<Value> {
    let timestamp = args.first().cloned().unwrap_or(Value::Null);
    let format = args
        .get(1)
        .and_then(Value::as_str)
        .unwrap_or("%Y-%m-%dT%H:%M:%S%.3fZ");

    let parsed: Option<DateTime<Utc>> = match &timestamp {
        Value::String(s) => DateTime::parse_from_rfc3339(s)
            .ok()
            .map(|dt| dt.with_timezone(&Utc)),
        Value::Number(n) => n
            .as_i64()
            .and_then(|millis| Utc.timestamp_millis_opt(millis).single()),
        _ => None,
    };

    match parsed {
        Some(dt) => Ok(Value::String(dt.format(format).to_string())),
        None => Err(ExpressionError::type_mismatch(
            "RFC 3339 string or epoch milliseconds",
            display(&timestamp),
        )),
    }
}

fn parse_int(value: Option<&Value>) -> Value {
    match value {
        Some(Value::Number(n)) => n
            .as_i64()
            .or_else(|| n.as_f64().map(|f| f as i64))
            .map_or(Value::Null, Value::from),
        Some(Value::String(s)) => {
            let trimmed = s.trim();
            trimmed
                .parse::<i64>()
                .ok()
                .or_else(|| trimmed.parse::<f64>().ok().map(|f| f as i64))
                .map_or(Value::Null, Value::from)
        }
        _ => Value::Null,
    }
}

fn parse_float(value: Option<&Value>) -> Value {
    match value {
        Some(Value::Number(n)) => n.as_f64().map_or(Value::Null, Value::from),
        Some(Value::String(s)) => s.trim().parse::<f64>().ok().map_or(Value::Null, Value::from),
        _ => Value::Null,
    }
}

/// `default(x, d)` — `d` when `x` is null or absent, `x` otherwise.
fn default_value(args: &[Value]) -> Value {
    match args.first() {
        None | Some(Value::Null) => args.get(1).cloned().unwrap_or(Value::Null),
        Some(value) => value.clone(),
    }
}

/// `contains(haystack, needle)` — substring for strings, membership for
/// arrays, key presence for objects.
fn contains(args: &[Value]) -> Value {
    let (Some(haystack), Some(needle)) = (args.first(), args.get(1)) else {
        return Value::Bool(false);
    };
    let found = match haystack {
        Value::String(s) => s.contains(&display(needle)),
        Value::Array(items) => items.iter().any(|item| loose_eq(item, needle)),
        Value::Object(map) => needle.as_str().is_some_and(|key| map.contains_key(key)),
        _ => false,
    };
    Value::Bool(found)
}
