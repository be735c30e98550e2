//! Recursive-descent parser for the expression grammar.
//!
//! Precedence, lowest binding first: ternary, `||`, `&&`, equality,
//! comparison, additive, multiplicative, unary, postfix
//! (property/index/call), primary.

use serde_json::Value;

use crate::ast::{BinaryOp, Expr};
use crate::error::{ExpressionError, ExpressionResult};
use crate::token::{Token, TokenKind};

/// Parses a token stream into an AST.
pub struct Parser {
    tokens: Vec<Token>,
    position: usize,
}

impl Parser {
    #[must_use]
    pub fn new(tokens: Vec<Token>) -> Self {
        Self {
            tokens,
            position: 0,
        }
    }

    /// Parse a complete expression; trailing tokens are an error.
    pub fn parse(mut self) -> ExpressionResult<Expr> {
        let expr = self.ternary()?;
        let trailing = self.current();
        if trailing.kind != TokenKind::Eof {
            return Err(ExpressionError::syntax(
                trailing.offset,
                format!("unexpected {}", trailing.kind.describe()),
            ));
        }
        Ok(expr)
    }

    fn ternary(&mut self) -> ExpressionResult<Expr> {
        let condition = self.or()?;
        if self.eat(&TokenKind::Question) {
            let then_expr = self.ternary()?;
            self.expect(&TokenKind::Colon)?;
            let else_expr = self.ternary()?;
            return Ok(Expr::Conditional {
                condition: Box::new(condition),
                then_expr: Box::new(then_expr),
                else_expr: Box::new(else_expr),
            });
        }
        Ok(condition)
    }

    fn or(&mut self) -> ExpressionResult<Expr> {
        let mut left = self.and()?;
        while self.eat(&TokenKind::Or) {
            let right = self.and()?;
            left = binary(left, BinaryOp::Or, right);
        }
        Ok(left)
    }

    fn and(&mut self) -> ExpressionResult<Expr> {
        let mut left = self.equality()?;
        while self.eat(&TokenKind::And) {
            let right = self.equality()?;
            left = binary(left, BinaryOp::And, right);
        }
        Ok(left)
    }

    fn equality(&mut self) -> ExpressionResult<Expr> {
        let mut left = self.comparison()?;
        loop {
            let op = if self.eat(&TokenKind::Equal) {
                BinaryOp::Equal
            } else if self.eat(&TokenKind::NotEqual) {
                BinaryOp::NotEqual
            } else {
                break;
            };
            let right = self.comparison()?;
            left = binary(left, op, right);
        }
        Ok(left)
    }

    fn comparison(&mut self) -> ExpressionResult<Expr> {
        let mut left = self.additive()?;
        loop {
            let op = if self.eat(&TokenKind::LessEqual) {
                BinaryOp::LessEqual
            } else if self.eat(&TokenKind::LessThan) {
                BinaryOp::LessThan
            } else if self.eat(&TokenKind::GreaterEqual) {
                BinaryOp::GreaterEqual
            } else if self.eat(&TokenKind::GreaterThan) {
                BinaryOp::GreaterThan
            } else {
                break;
            };
            let right = self.additive()?;
            left = binary(left, op, right);
        }
        Ok(left)
    }

    fn additive(&mut self) -> ExpressionResult<Expr> {
        let mut left = self.multiplicative()?;
        loop {
            let op = if self.eat(&TokenKind::Plus) {
                BinaryOp::Add
            } else if self.eat(&TokenKind::Minus) {
                BinaryOp::Subtract
            } else {
                break;
            };
            let right = self.multiplicative()?;
            left = binary(left, op, right);
        }
        Ok(left)
    }

    fn multiplicative(&mut self) -> ExpressionResult<Expr> {
        let mut left = self.unary()?;
        loop {
            let op = if self.eat(&TokenKind::Star) {
                BinaryOp::Multiply
            } else if self.eat(&TokenKind::Slash) {
                BinaryOp::Divide
            } else if self.eat(&TokenKind::Percent) {
                BinaryOp::Modulo
            } else {
                break;
            };
            let right = self.unary()?;
            left = binary(left, op, right);
        }
        Ok(left)
    }

    fn unary(&mut self) -> ExpressionResult<Expr> {
        if self.eat(&TokenKind::Not) {
            return Ok(Expr::Not(Box::new(self.unary()?)));
        }
        if self.eat(&TokenKind::Minus) {
            return Ok(Expr::Negate(Box::new(self.unary()?)));
        }
        self.postfix()
    }

    fn postfix(&mut self) -> ExpressionResult<Expr> {
        let mut expr = self.primary()?;
        loop {
            if self.eat(&TokenKind::Dot) {
                let token = self.advance();
                let property = match token.kind {
                    TokenKind::Identifier(name) => name,
                    // Allow digits and keywords after `.` as raw keys.
                    TokenKind::Integer(n) => n.to_string(),
                    TokenKind::True => "true".into(),
                    TokenKind::False => "false".into(),
                    TokenKind::Null => "null".into(),
                    other => {
                        return Err(ExpressionError::syntax(
                            token.offset,
                            format!("expected property name after `.`, found {}", other.describe()),
                        ));
                    }
                };
                expr = Expr::Property {
                    object: Box::new(expr),
                    property,
                };
            } else if self.eat(&TokenKind::LeftBracket) {
                let index = self.ternary()?;
                self.expect(&TokenKind::RightBracket)?;
                expr = Expr::Index {
                    object: Box::new(expr),
                    index: Box::new(index),
                };
            } else {
                break;
            }
        }
        Ok(expr)
    }

    fn primary(&mut self) -> ExpressionResult<Expr> {
        let token = self.advance();
        match token.kind {
            TokenKind::Integer(n) => Ok(Expr::Literal(Value::from(n))),
            TokenKind::Number(n) => Ok(Expr::Literal(Value::from(n))),
            TokenKind::Str(s) => Ok(Expr::Literal(Value::String(s))),
            TokenKind::True => Ok(Expr::Literal(Value::Bool(true))),
            TokenKind::False => Ok(Expr::Literal(Value::Bool(false))),
            TokenKind::Null => Ok(Expr::Literal(Value::Null)),
            TokenKind::Variable(name) => Ok(Expr::Variable(name)),
            TokenKind::Identifier(name) => {
                if self.eat(&TokenKind::LeftParen) {
                    let args = self.arguments()?;
                    Ok(Expr::Call { name, args })
                } else {
                    Ok(Expr::Identifier(name))
                }
            }
            TokenKind::LeftParen => {
                let inner = self.ternary()?;
                self.expect(&TokenKind::RightParen)?;
                Ok(inner)
            }
            other => Err(ExpressionError::syntax(
                token.offset,
                format!("unexpected {}", other.describe()),
            )),
        }
    }

    fn arguments(&mut self) -> ExpressionResult<Vec<Expr>> {
        let mut args = Vec::new();
        if self.eat(&TokenKind::RightParen) {
            return Ok(args);
        }
        loop {
            args.push(self.ternary()?);
            if self.eat(&TokenKind::Comma) {
                continue;
            }
            self.expect(&TokenKind::RightParen)?;
            return Ok(args);
        }
    }

    fn current(&self) -> &Token {
        self.tokens
            .get(self.position)
            .unwrap_or_else(|| self.tokens.last().expect("token stream ends with Eof"))
    }

    fn advance(&mut self) -> Token {
        let token = self.current().clone();
        if self.position < self.tokens.len() - 1 {
            self.position += 1;
        }
        token
    }

    fn eat(&mut self, kind: &TokenKind) -> bool {
        if &self.current().kind == kind {
            self.advance();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, kind: &TokenKind) -> ExpressionResult<Token> {
        let token = self.current().clone();
        if &token.kind == kind {
            Ok(self.advance())
        } else {
            Err(ExpressionError::syntax(
                token.offset,
                format!(
                    "expected {}, found {}",
                    kind.describe(),
                    token.kind.describe()
                ),
            ))
        }
    }
}

fn binary(left: Expr, op: BinaryOp, right: Expr) -> Expr {
    Expr::Binary {
        left: Box::new(left),
        op,
        right: Box::new(right),
    }
}

/// Lex and parse an expression string (without `{{ }}` delimiters).
pub fn parse_expression(source: &str) -> ExpressionResult<Expr> {
    let tokens = crate::lexer::Lexer::new(source).tokenize()?;
    Parser::new(tokens).parse()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn precedence_mul_over_add() {
        let expr = parse_expression("1 + 2 * 3").unwrap();
        let Expr::Binary { op, right, .. } = expr else {
            panic!("expected binary");
        };
        assert_eq!(op, BinaryOp::Add);
        assert!(matches!(
            *right,
            Expr::Binary {
                op: BinaryOp::Multiply,
                ..
            }
        ));
    }

    #[test]
    fn parenthesized_grouping() {
        let expr = parse_expression("(1 + 2) * 3").unwrap();
        let Expr::Binary { op, left, .. } = expr else {
            panic!("expected binary");
        };
        assert_eq!(op, BinaryOp::Multiply);
        assert!(matches!(
            *left,
            Expr::Binary {
                op: BinaryOp::Add,
                ..
            }
        ));
    }

    #[test]
    fn property_chain() {
        let expr = parse_expression("$node.b.y").unwrap();
        let Expr::Property { object, property } = expr else {
            panic!("expected property access");
        };
        assert_eq!(property, "y");
        assert!(matches!(*object, Expr::Property { .. }));
    }

    #[test]
    fn index_access_variants() {
        assert!(matches!(
            parse_expression(r#"$json["key"]"#).unwrap(),
            Expr::Index { .. }
        ));
        assert!(matches!(
            parse_expression("$json.items[0]").unwrap(),
            Expr::Index { .. }
        ));
    }

    #[test]
    fn ternary_is_right_associative() {
        let expr = parse_expression("a ? 1 : b ? 2 : 3").unwrap();
        let Expr::Conditional { else_expr, .. } = expr else {
            panic!("expected conditional");
        };
        assert!(matches!(*else_expr, Expr::Conditional { .. }));
    }

    #[test]
    fn function_call_with_args() {
        let expr = parse_expression("default($vars.x, 'fallback')").unwrap();
        let Expr::Call { name, args } = expr else {
            panic!("expected call");
        };
        assert_eq!(name, "default");
        assert_eq!(args.len(), 2);
    }

    #[test]
    fn empty_call() {
        let expr = parse_expression("now()").unwrap();
        assert!(matches!(expr, Expr::Call { ref name, ref args } if name == "now" && args.is_empty()));
    }

    #[test]
    fn unary_operators() {
        assert!(matches!(parse_expression("!a").unwrap(), Expr::Not(_)));
        assert!(matches!(parse_expression("-5").unwrap(), Expr::Negate(_)));
    }

    #[test]
    fn trailing_tokens_error() {
        assert!(parse_expression("1 + 2 3").is_err());
    }

    #[test]
    fn dangling_operator_errors() {
        assert!(parse_expression("1 +").is_err());
        assert!(parse_expression("a ? 1").is_err());
    }
}
