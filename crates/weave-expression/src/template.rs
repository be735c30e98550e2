//! Templates: strings mixing literal text with `{{ expression }}` parts.
//!
//! A string that is nothing but a single `{{ expression }}` preserves the
//! evaluated value's type; any surrounding literal text turns the result
//! into a string, with null rendering as the empty string.

use crate::ast::Expr;
use crate::error::{ExpressionError, ExpressionResult};
use crate::parser::parse_expression;

/// One parsed segment of a template.
#[derive(Debug, Clone, PartialEq)]
pub enum TemplatePart {
    /// Literal text, emitted as-is.
    Static(String),
    /// An expression to evaluate (stored without the braces).
    Expression {
        /// The raw expression source.
        source: String,
        /// The parsed expression.
        expr: Expr,
    },
}

/// A parsed template, reusable across renders.
#[derive(Debug, Clone, PartialEq)]
pub struct Template {
    source: String,
    parts: Vec<TemplatePart>,
}

impl Template {
    /// Parse a template. Fails on unterminated `{{` or on an expression
    /// that does not parse.
    pub fn parse(source: impl Into<String>) -> ExpressionResult<Self> {
        let source = source.into();
        let mut parts = Vec::new();
        let mut rest = source.as_str();
        let mut offset = 0;

        while let Some(open) = rest.find("{{") {
            if open > 0 {
                parts.push(TemplatePart::Static(rest[..open].to_owned()));
            }
            let after_open = &rest[open + 2..];
            let Some(close) = after_open.find("}}") else {
                return Err(ExpressionError::syntax(
                    offset + open,
                    "unterminated expression: missing `}}`",
                ));
            };
            let inner = &after_open[..close];
            let expr = parse_expression(inner.trim())?;
            parts.push(TemplatePart::Expression {
                source: inner.trim().to_owned(),
                expr,
            });
            let consumed = open + 2 + close + 2;
            offset += consumed;
            rest = &rest[consumed..];
        }
        if !rest.is_empty() {
            parts.push(TemplatePart::Static(rest.to_owned()));
        }

        Ok(Self { source, parts })
    }

    /// The original template source.
    #[must_use]
    pub fn source(&self) -> &str {
        &self.source
    }

    /// The parsed parts.
    #[must_use]
    pub fn parts(&self) -> &[TemplatePart] {
        &self.parts
    }

    /// Number of expression parts.
    #[must_use]
    pub fn expression_count(&self) -> usize {
        self.parts
            .iter()
            .filter(|p| matches!(p, TemplatePart::Expression { .. }))
            .count()
    }

    /// Whether the template is exactly one expression with no literal
    /// text, so rendering preserves the value's type.
    #[must_use]
    pub fn is_single_expression(&self) -> Option<&Expr> {
        match self.parts.as_slice() {
            [TemplatePart::Expression { expr, .. }] => Some(expr),
            _ => None,
        }
    }

    /// Whether the template contains any expression at all.
    #[must_use]
    pub fn has_expressions(&self) -> bool {
        self.expression_count() > 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_text_is_one_static_part() {
        let t = Template::parse("hello world").unwrap();
        assert_eq!(t.parts().len(), 1);
        assert_eq!(t.expression_count(), 0);
        assert!(t.is_single_expression().is_none());
    }

    #[test]
    fn single_expression_is_detected() {
        let t = Template::parse("{{ $json.x }}").unwrap();
        assert!(t.is_single_expression().is_some());
        assert_eq!(t.expression_count(), 1);
    }

    #[test]
    fn whitespace_inside_braces_is_allowed() {
        let t = Template::parse("{{$json.x}}").unwrap();
        assert!(t.is_single_expression().is_some());

        let t = Template::parse("{{   $json.x   }}").unwrap();
        assert!(t.is_single_expression().is_some());
    }

    #[test]
    fn surrounding_text_makes_it_mixed() {
        let t = Template::parse(" {{ $json.x }}").unwrap();
        assert!(t.is_single_expression().is_none());
        assert_eq!(t.parts().len(), 2);
    }

    #[test]
    fn multiple_expressions() {
        let t = Template::parse("a={{ 1 }} b={{ 2 }}!").unwrap();
        assert_eq!(t.expression_count(), 2);
        assert_eq!(t.parts().len(), 5);
    }

    #[test]
    fn unterminated_braces_error() {
        assert!(Template::parse("{{ 1 + 2").is_err());
    }

    #[test]
    fn bad_expression_errors() {
        assert!(Template::parse("{{ 1 + }}").is_err());
    }
}
