//! Abstract syntax tree for parsed expressions.

use serde_json::Value;

/// A parsed expression node.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// Literal value (number, string, boolean, null).
    Literal(Value),

    /// `$`-prefixed context variable (`$json`, `$node`, ...).
    Variable(String),

    /// Bare identifier. Unknown identifiers evaluate to null.
    Identifier(String),

    /// Unary negation `-expr`.
    Negate(Box<Expr>),

    /// Logical not `!expr`.
    Not(Box<Expr>),

    /// Binary operation `left op right`.
    Binary {
        left: Box<Expr>,
        op: BinaryOp,
        right: Box<Expr>,
    },

    /// Property access `object.property`.
    Property { object: Box<Expr>, property: String },

    /// Index access `object[index]` (array index or computed key).
    Index { object: Box<Expr>, index: Box<Expr> },

    /// Builtin function call `name(args...)`.
    Call { name: String, args: Vec<Expr> },

    /// Ternary conditional `cond ? then : else`.
    Conditional {
        condition: Box<Expr>,
        then_expr: Box<Expr>,
        else_expr: Box<Expr>,
    },
}

/// Binary operators, in the restricted grammar.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Subtract,
    Multiply,
    Divide,
    Modulo,
    Equal,
    NotEqual,
    LessThan,
    LessEqual,
    GreaterThan,
    GreaterEqual,
    And,
    Or,
}

impl BinaryOp {
    /// Operator symbol for error messages.
    #[must_use]
    pub fn symbol(self) -> &'static str {
        match self {
            Self::Add => "+",
            Self::Subtract => "-",
            Self::Multiply => "*",
            Self::Divide => "/",
            Self::Modulo => "%",
            Self::Equal => "==",
            Self::NotEqual => "!=",
            Self::LessThan => "<",
            Self::LessEqual => "<=",
            Self::GreaterThan => ">",
            Self::GreaterEqual => ">=",
            Self::And => "&&",
            Self::Or => "||",
        }
    }
}

impl std::fmt::Display for BinaryOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.symbol())
    }
}
