//! AST evaluation over `serde_json::Value`.
//!
//! Missing values never error: an unknown identifier evaluates to null,
//! and property or index access on null (or on a value of the wrong
//! shape) propagates null. Arithmetic on explicitly non-coercible
//! operands is the one place evaluation fails.

use serde_json::Value;

use crate::ast::{BinaryOp, Expr};
use crate::builtins;
use crate::context::EvaluationContext;
use crate::error::{ExpressionError, ExpressionResult};

/// Recursion guard for deeply nested expressions.
const MAX_RECURSION_DEPTH: usize = 128;

/// Evaluate an expression in the given context.
pub fn eval(expr: &Expr, context: &EvaluationContext) -> ExpressionResult<Value> {
    eval_with_depth(expr, context, 0)
}

fn eval_with_depth(
    expr: &Expr,
    context: &EvaluationContext,
    depth: usize,
) -> ExpressionResult<Value> {
    if depth > MAX_RECURSION_DEPTH {
        return Err(ExpressionError::eval(format!(
            "maximum recursion depth ({MAX_RECURSION_DEPTH}) exceeded"
        )));
    }

    match expr {
        Expr::Literal(value) => Ok(value.clone()),

        Expr::Variable(name) => Ok(context.resolve(name).unwrap_or(Value::Null)),

        // Bare identifiers are undefined unless a property lookup gives
        // them meaning; undefined is null.
        Expr::Identifier(_) => Ok(Value::Null),

        Expr::Negate(inner) => {
            let value = eval_with_depth(inner, context, depth + 1)?;
            match &value {
                Value::Number(n) => {
                    if let Some(i) = n.as_i64() {
                        i.checked_neg().map(Value::from).ok_or_else(|| {
                            ExpressionError::eval(format!("integer overflow: -{i}"))
                        })
                    } else {
                        Ok(Value::from(-n.as_f64().unwrap_or(0.0)))
                    }
                }
                _ => Err(ExpressionError::type_mismatch("number", kind_name(&value))),
            }
        }

        Expr::Not(inner) => {
            let value = eval_with_depth(inner, context, depth + 1)?;
            Ok(Value::Bool(!truthy(&value)))
        }

        Expr::Binary { left, op, right } => eval_binary(*op, left, right, context, depth),

        Expr::Property { object, property } => {
            let value = eval_with_depth(object, context, depth + 1)?;
            Ok(access_property(&value, property))
        }

        Expr::Index { object, index } => {
            let value = eval_with_depth(object, context, depth + 1)?;
            let index = eval_with_depth(index, context, depth + 1)?;
            Ok(access_index(&value, &index))
        }

        Expr::Call { name, args } => {
            let mut evaluated = Vec::with_capacity(args.len());
            for arg in args {
                evaluated.push(eval_with_depth(arg, context, depth + 1)?);
            }
            builtins::call(name, &evaluated)
        }

        Expr::Conditional {
            condition,
            then_expr,
            else_expr,
        } => {
            let condition = eval_with_depth(condition, context, depth + 1)?;
            if truthy(&condition) {
                eval_with_depth(then_expr, context, depth + 1)
            } else {
                eval_with_depth(else_expr, context, depth + 1)
            }
        }
    }
}

fn eval_binary(
    op: BinaryOp,
    left: &Expr,
    right: &Expr,
    context: &EvaluationContext,
    depth: usize,
) -> ExpressionResult<Value> {
    // Short-circuit logical operators.
    match op {
        BinaryOp::And => {
            let left = eval_with_depth(left, context, depth + 1)?;
            if !truthy(&left) {
                return Ok(Value::Bool(false));
            }
            let right = eval_with_depth(right, context, depth + 1)?;
            return Ok(Value::Bool(truthy(&right)));
        }
        BinaryOp::Or => {
            let left = eval_with_depth(left, context, depth + 1)?;
            if truthy(&left) {
                return Ok(Value::Bool(true));
            }
            let right = eval_with_depth(right, context, depth + 1)?;
            return Ok(Value::Bool(truthy(&right)));
        }
        _ => {}
    }

    let left = eval_with_depth(left, context, depth + 1)?;
    let right = eval_with_depth(right, context, depth + 1)?;

    match op {
        BinaryOp::Add => add(&left, &right),
        BinaryOp::Subtract => arithmetic(&left, &right, "-", i64::checked_sub, |a, b| a - b),
        BinaryOp::Multiply => arithmetic(&left, &right, "*", i64::checked_mul, |a, b| a * b),
        BinaryOp::Divide => divide(&left, &right),
        BinaryOp::Modulo => modulo(&left, &right),
        BinaryOp::Equal => Ok(Value::Bool(loose_eq(&left, &right))),
        BinaryOp::NotEqual => Ok(Value::Bool(!loose_eq(&left, &right))),
        BinaryOp::LessThan => compare(&left, &right, |ord| ord == std::cmp::Ordering::Less),
        BinaryOp::LessEqual => compare(&left, &right, |ord| ord != std::cmp::Ordering::Greater),
        BinaryOp::GreaterThan => compare(&left, &right, |ord| ord == std::cmp::Ordering::Greater),
        BinaryOp::GreaterEqual => compare(&left, &right, |ord| ord != std::cmp::Ordering::Less),
        BinaryOp::And | BinaryOp::Or => unreachable!("handled above"),
    }
}

/// `+` adds numbers and concatenates when either side is a string.
fn add(left: &Value, right: &Value) -> ExpressionResult<Value> {
    match (left, right) {
        (Value::Number(_), Value::Number(_)) => {
            arithmetic(left, right, "+", i64::checked_add, |a, b| a + b)
        }
        (Value::String(l), r) => Ok(Value::String(format!("{l}{}", display(r)))),
        (l, Value::String(r)) => Ok(Value::String(format!("{}{r}", display(l)))),
        _ => Err(ExpressionError::type_mismatch(
            "number or string",
            format!("{} and {}", kind_name(left), kind_name(right)),
        )),
    }
}

fn arithmetic(
    left: &Value,
    right: &Value,
    symbol: &str,
    int_op: fn(i64, i64) -> Option<i64>,
    float_op: fn(f64, f64) -> f64,
) -> ExpressionResult<Value> {
    match (left, right) {
        (Value::Number(l), Value::Number(r)) => {
            if let (Some(a), Some(b)) = (l.as_i64(), r.as_i64()) {
                int_op(a, b).map(Value::from).ok_or_else(|| {
                    ExpressionError::eval(format!("integer overflow: {a} {symbol} {b}"))
                })
            } else {
                let a = l.as_f64().unwrap_or(0.0);
                let b = r.as_f64().unwrap_or(0.0);
                Ok(Value::from(float_op(a, b)))
            }
        }
        _ => Err(ExpressionError::type_mismatch(
            "number",
            format!("{} and {}", kind_name(left), kind_name(right)),
        )),
    }
}

fn divide(left: &Value, right: &Value) -> ExpressionResult<Value> {
    match (left, right) {
        (Value::Number(l), Value::Number(r)) => {
            if let (Some(a), Some(b)) = (l.as_i64(), r.as_i64()) {
                if b == 0 {
                    return Err(ExpressionError::eval("division by zero"));
                }
                if a % b == 0 {
                    return Ok(Value::from(a / b));
                }
                return Ok(Value::from(a as f64 / b as f64));
            }
            let b = r.as_f64().unwrap_or(0.0);
            if b == 0.0 {
                return Err(ExpressionError::eval("division by zero"));
            }
            Ok(Value::from(l.as_f64().unwrap_or(0.0) / b))
        }
        _ => Err(ExpressionError::type_mismatch(
            "number",
            format!("{} and {}", kind_name(left), kind_name(right)),
        )),
    }
}

fn modulo(left: &Value, right: &Value) -> ExpressionResult<Value> {
    match (left, right) {
        (Value::Number(l), Value::Number(r)) => {
            if let (Some(a), Some(b)) = (l.as_i64(), r.as_i64()) {
                if b == 0 {
                    return Err(ExpressionError::eval("division by zero"));
                }
                return Ok(Value::from(a % b));
            }
            let b = r.as_f64().unwrap_or(0.0);
            if b == 0.0 {
                return Err(ExpressionError::eval("division by zero"));
            }
            Ok(Value::from(l.as_f64().unwrap_or(0.0) % b))
        }
        _ => Err(ExpressionError::type_mismatch(
            "number",
            format!("{} and {}", kind_name(left), kind_name(right)),
        )),
    }
}

fn compare(
    left: &Value,
    right: &Value,
    check: fn(std::cmp::Ordering) -> bool,
) -> ExpressionResult<Value> {
    let ordering = match (left, right) {
        (Value::Number(l), Value::Number(r)) => l
            .as_f64()
            .unwrap_or(f64::NAN)
            .partial_cmp(&r.as_f64().unwrap_or(f64::NAN)),
        (Value::String(l), Value::String(r)) => Some(l.cmp(r)),
        _ => None,
    };
    match ordering {
        Some(ord) => Ok(Value::Bool(check(ord))),
        None => Err(ExpressionError::type_mismatch(
            "two numbers or two strings",
            format!("{} and {}", kind_name(left), kind_name(right)),
        )),
    }
}

/// Equality with numeric coercion: `3 == 3.0` holds.
pub(crate) fn loose_eq(left: &Value, right: &Value) -> bool {
    match (left, right) {
        (Value::Number(l), Value::Number(r)) => {
            l.as_f64().unwrap_or(f64::NAN) == r.as_f64().unwrap_or(f64::NAN)
        }
        _ => left == right,
    }
}

/// Property access; null propagates, wrong shapes yield null.
pub(crate) fn access_property(value: &Value, property: &str) -> Value {
    match value {
        Value::Object(map) => map.get(property).cloned().unwrap_or(Value::Null),
        _ => Value::Null,
    }
}

/// Index access for arrays (numeric) and objects (string keys).
pub(crate) fn access_index(value: &Value, index: &Value) -> Value {
    match (value, index) {
        (Value::Array(items), Value::Number(n)) => {
            let Some(i) = n.as_i64() else {
                return Value::Null;
            };
            let i = if i < 0 { items.len() as i64 + i } else { i };
            usize::try_from(i)
                .ok()
                .and_then(|i| items.get(i))
                .cloned()
                .unwrap_or(Value::Null)
        }
        (Value::Object(map), Value::String(key)) => {
            map.get(key).cloned().unwrap_or(Value::Null)
        }
        _ => Value::Null,
    }
}

/// Truthiness: null and absent are false, numbers compare against zero,
/// strings against empty; arrays and objects are always true.
pub(crate) fn truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

/// Stringification used for template concatenation: null renders empty,
/// strings render raw, everything else renders as JSON.
pub(crate) fn display(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        other => serde_json::to_string(other).unwrap_or_default(),
    }
}

/// Human-readable type name for error messages.
pub(crate) fn kind_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
