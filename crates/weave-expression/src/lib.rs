//! # weave-expression
//!
//! Expression language for the Weave workflow engine.
//!
//! Strings of the form `prefix {{ expr }} suffix` are evaluated against a
//! per-node context. A string that is only one expression preserves the
//! evaluated value's type; mixed content concatenates to a string.
//!
//! The grammar is deliberately restricted: property and index access,
//! literals, unary `!`/`-`, the usual binary operators, ternary
//! conditionals, and a small builtin set (`length`, `upper`, `lower`,
//! `trim`, `now`, `formatDate`, `parseInt`, `parseFloat`, `default`,
//! `contains`). Unknown identifiers evaluate to null and null propagates
//! through property access without erroring.
//!
//! ## Quick start
//!
//! ```
//! use weave_expression::{Engine, EvaluationContext};
//! use serde_json::json;
//!
//! let engine = Engine::new();
//! let context = EvaluationContext::builder()
//!     .json(json!({"x": 3}))
//!     .build();
//!
//! let value = engine.resolve("{{ $json.x * 2 }}", &context).unwrap();
//! assert_eq!(value, json!(6));
//! ```

pub mod ast;
pub mod builtins;
pub mod context;
pub mod engine;
pub mod error;
pub mod eval;
pub mod lexer;
pub mod parser;
pub mod template;
pub mod token;

pub use ast::{BinaryOp, Expr};
pub use context::{EvaluationContext, EvaluationContextBuilder};
pub use engine::Engine;
pub use error::{ExpressionError, ExpressionResult};
pub use template::{Template, TemplatePart};
