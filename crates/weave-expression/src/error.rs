//! Expression evaluation errors.

use thiserror::Error;

/// Result alias for expression operations.
pub type ExpressionResult<T> = Result<T, ExpressionError>;

/// Errors surfaced by the expression engine.
///
/// Evaluation is deliberately forgiving: unknown identifiers and property
/// access on missing values yield null instead of erroring. Only syntax
/// errors and arithmetic on non-coercible operands fail.
#[derive(Debug, Clone, Error)]
pub enum ExpressionError {
    /// The expression text could not be tokenized or parsed.
    #[error("syntax error at offset {offset}: {message}")]
    Syntax {
        /// Byte offset into the expression source.
        offset: usize,
        /// What went wrong.
        message: String,
    },

    /// An operator was applied to operands it cannot coerce.
    #[error("type mismatch: expected {expected}, found {found}")]
    TypeMismatch {
        /// What the operator needed.
        expected: String,
        /// What it was given.
        found: String,
    },

    /// A call referenced a function the engine does not provide.
    #[error("unknown function: {0}")]
    UnknownFunction(String),

    /// A runtime evaluation failure (overflow, division by zero,
    /// recursion limit).
    #[error("evaluation error: {0}")]
    Eval(String),
}

impl ExpressionError {
    /// Syntax error constructor.
    #[must_use]
    pub fn syntax(offset: usize, message: impl Into<String>) -> Self {
        Self::Syntax {
            offset,
            message: message.into(),
        }
    }

    /// Type mismatch constructor.
    #[must_use]
    pub fn type_mismatch(expected: impl Into<String>, found: impl Into<String>) -> Self {
        Self::TypeMismatch {
            expected: expected.into(),
            found: found.into(),
        }
    }

    /// Evaluation error constructor.
    #[must_use]
    pub fn eval(message: impl Into<String>) -> Self {
        Self::Eval(message.into())
    }
}
