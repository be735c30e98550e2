//! Expression engine with parse caching and config resolution.

use std::num::NonZeroUsize;

use lru::LruCache;
use parking_lot::Mutex;
use serde_json::Value;
use tracing::trace;

use crate::ast::Expr;
use crate::context::EvaluationContext;
use crate::error::ExpressionResult;
use crate::eval;
use crate::template::Template;

const DEFAULT_CACHE_SIZE: usize = 256;

/// Parses and evaluates expressions and templates, caching parse results.
///
/// Referential transparency (same expression + same context = same value)
/// makes AST caching safe; only `$now`/`$today`/`$timestamp` vary, and
/// those vary at evaluation time, not parse time.
pub struct Engine {
    expr_cache: Mutex<LruCache<String, Expr>>,
    template_cache: Mutex<LruCache<String, Template>>,
}

impl Engine {
    /// Engine with the default cache size.
    #[must_use]
    pub fn new() -> Self {
        Self::with_cache_size(DEFAULT_CACHE_SIZE)
    }

    /// Engine with an explicit parse-cache capacity.
    #[must_use]
    pub fn with_cache_size(size: usize) -> Self {
        let capacity = NonZeroUsize::new(size.max(1)).expect("max(1) is non-zero");
        Self {
            expr_cache: Mutex::new(LruCache::new(capacity)),
            template_cache: Mutex::new(LruCache::new(capacity)),
        }
    }

    /// Evaluate a bare expression. Accepts either `expr` or
    /// `{{ expr }}` spellings.
    pub fn evaluate(
        &self,
        expression: &str,
        context: &EvaluationContext,
    ) -> ExpressionResult<Value> {
        let trimmed = expression.trim();
        let inner = trimmed
            .strip_prefix("{{")
            .and_then(|s| s.strip_suffix("}}"))
            .map_or(trimmed, str::trim);

        let expr = self.parse_cached(inner)?;
        let result = eval::eval(&expr, context)?;
        trace!(expression = inner, "evaluated expression");
        Ok(result)
    }

    /// Resolve a string that may contain `{{ … }}` templates.
    ///
    /// A string that is only one expression returns the raw value; mixed
    /// content renders to a string; text without any `{{` passes through
    /// unchanged.
    pub fn resolve(&self, text: &str, context: &EvaluationContext) -> ExpressionResult<Value> {
        if !text.contains("{{") {
            return Ok(Value::String(text.to_owned()));
        }
        let template = self.template_cached(text)?;
        if let Some(expr) = template.is_single_expression() {
            return eval::eval(expr, context);
        }
        let rendered = self.render_parts(&template, context)?;
        Ok(Value::String(rendered))
    }

    /// Render a template to a string regardless of shape.
    pub fn render(&self, text: &str, context: &EvaluationContext) -> ExpressionResult<String> {
        let template = self.template_cached(text)?;
        self.render_parts(&template, context)
    }

    /// Deeply resolve a config structure: every string containing `{{`
    /// is evaluated, sub-maps and arrays are recursed into, all other
    /// leaves pass through unchanged.
    pub fn resolve_config(
        &self,
        config: &Value,
        context: &EvaluationContext,
    ) -> ExpressionResult<Value> {
        match config {
            Value::String(text) if text.contains("{{") => self.resolve(text, context),
            Value::Array(items) => {
                let mut resolved = Vec::with_capacity(items.len());
                for item in items {
                    resolved.push(self.resolve_config(item, context)?);
                }
                Ok(Value::Array(resolved))
            }
            Value::Object(map) => {
                let mut resolved = serde_json::Map::with_capacity(map.len());
                for (key, value) in map {
                    resolved.insert(key.clone(), self.resolve_config(value, context)?);
                }
                Ok(Value::Object(resolved))
            }
            other => Ok(other.clone()),
        }
    }

    fn render_parts(
        &self,
        template: &Template,
        context: &EvaluationContext,
    ) -> ExpressionResult<String> {
        use crate::template::TemplatePart;

        let mut out = String::with_capacity(template.source().len());
        for part in template.parts() {
            match part {
                TemplatePart::Static(text) => out.push_str(text),
                TemplatePart::Expression { expr, .. } => {
                    let value = eval::eval(expr, context)?;
                    out.push_str(&eval::display(&value));
                }
            }
        }
        Ok(out)
    }

    fn parse_cached(&self, source: &str) -> ExpressionResult<Expr> {
        if let Some(expr) = self.expr_cache.lock().get(source) {
            return Ok(expr.clone());
        }
        let expr = crate::parser::parse_expression(source)?;
        self.expr_cache
            .lock()
            .put(source.to_owned(), expr.clone());
        Ok(expr)
    }

    fn template_cached(&self, source: &str) -> ExpressionResult<Template> {
        if let Some(template) = self.template_cache.lock().get(source) {
            return Ok(template.clone());
        }
        let template = Template::parse(source)?;
        self.template_cache
            .lock()
            .put(source.to_owned(), template.clone());
        Ok(template)
    }
}

impl Default for Engine {
    fn default() -> Self {
        Self::new()
    }
}
