//! Expression Evaluator
//!
//! Resolves variable references against a [`RequestContext`] and evaluates
//! builtin calls, arguments first. The [`Evaluator`] bundles the primitives
//! adapters use during interpolation.

use serde_json::Value;

use crate::error::{RouterError, RouterResult};

use super::ast::{Expr, Namespace, VariablePath};
use super::context::RequestContext;
use super::parser::{is_function_call, parse_call, parse_expression, parse_variable};
use super::scanner::{scan, ExpressionRef};
use super::value::ExprValue;

/// Default open delimiter
pub const OPEN_DELIMITER: &str = "${{";

/// Default close delimiter
pub const CLOSE_DELIMITER: &str = "}}";

/// Scanning and evaluation primitives handed to adapters
#[derive(Debug, Clone)]
pub struct Evaluator {
    open: String,
    close: String,
}

impl Default for Evaluator {
    fn default() -> Self {
        Self::new()
    }
}

impl Evaluator {
    /// Evaluator using `${{` / `}}`
    pub fn new() -> Self {
        Self::with_delimiters(OPEN_DELIMITER, CLOSE_DELIMITER)
    }

    /// Evaluator using custom delimiters
    pub fn with_delimiters(open: impl Into<String>, close: impl Into<String>) -> Self {
        Self {
            open: open.into(),
            close: close.into(),
        }
    }

    /// Locate every expression in `template`
    pub fn parse_expressions(&self, template: &str) -> Vec<ExpressionRef> {
        scan(template, &self.open, &self.close)
    }

    /// Resolve `namespace.seg...`; missing values are `Undefined`
    pub fn resolve_variable(&self, inner: &str, ctx: &RequestContext) -> RouterResult<ExprValue> {
        let path = parse_variable(inner)?;
        Ok(resolve_path(&path, ctx))
    }

    /// Evaluate `name(args...)`
    pub fn evaluate_function(&self, inner: &str, ctx: &RequestContext) -> RouterResult<ExprValue> {
        if !is_function_call(inner.trim()) {
            return Err(RouterError::validation(format!(
                "'{}' is not a function call",
                inner.trim()
            )));
        }
        let expr = parse_call(inner)?;
        Ok(evaluate(&expr, ctx))
    }

    /// Classify the inner text of a reference and evaluate it
    pub fn evaluate_reference(&self, inner: &str, ctx: &RequestContext) -> RouterResult<ExprValue> {
        if is_function_call(inner.trim()) {
            self.evaluate_function(inner, ctx)
        } else {
            self.resolve_variable(inner, ctx)
        }
    }

    /// Parse every expression in `template` without evaluating anything
    pub fn parse_template(&self, template: &str) -> RouterResult<Vec<Expr>> {
        self.parse_expressions(template)
            .iter()
            .map(|r| parse_expression(&r.inner_text))
            .collect()
    }
}

/// Walk a parsed expression tree
pub fn evaluate(expr: &Expr, ctx: &RequestContext) -> ExprValue {
    match expr {
        Expr::Variable(path) => resolve_path(path, ctx),
        Expr::Literal(value) => ExprValue::Json(value.clone()),
        Expr::Call { function, args } => {
            let args = args.iter().map(|arg| evaluate(arg, ctx)).collect();
            function.call(args)
        }
    }
}

/// Resolve a variable path against the context
pub fn resolve_path(path: &VariablePath, ctx: &RequestContext) -> ExprValue {
    let segments = path.segments.as_slice();

    let resolved: ExprValue = match (path.namespace, segments.split_first()) {
        (Namespace::Path, None) => ctx.path_object().into(),
        (Namespace::Path, Some((head, rest))) => ctx
            .path
            .get(head)
            .map(|v| Value::String(v.clone()))
            .and_then(|v| walk(&v, rest).cloned())
            .into(),
        (Namespace::Query, None) => ctx.query_object().into(),
        (Namespace::Query, Some((head, rest))) => ctx
            .query
            .get(head)
            .map(|v| v.to_json())
            .and_then(|v| walk(&v, rest).cloned())
            .into(),
        (Namespace::Body, _) => walk(&ctx.body, segments).cloned().into(),
        (Namespace::Auth, None) => ctx.auth.clone().map(Value::Object).into(),
        (Namespace::Auth, Some((head, rest))) => ctx
            .auth
            .as_ref()
            .and_then(|auth| auth.get(head))
            .and_then(|v| walk(v, rest))
            .cloned()
            .into(),
    };

    if path.namespace == Namespace::Query {
        split_list_value(resolved)
    } else {
        resolved
    }
}

fn walk<'v>(value: &'v Value, segments: &[String]) -> Option<&'v Value> {
    segments.iter().try_fold(value, |current, seg| match current {
        Value::Object(map) => map.get(seg),
        Value::Array(items) => seg.parse::<usize>().ok().and_then(|i| items.get(i)),
        _ => None,
    })
}

/// `"1,2,3"` becomes `["1","2","3"]`
fn split_list_value(value: ExprValue) -> ExprValue {
    match value {
        ExprValue::Json(Value::String(s)) if s.contains(',') => ExprValue::Json(Value::Array(
            s.split(',').map(|part| Value::String(part.to_string())).collect(),
        )),
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn ctx() -> RequestContext {
        let auth = json!({"tenantId": "t1", "roles": ["admin"]});
        RequestContext::new()
            .with_path("id", "7")
            .with_query("status", "open")
            .with_query("ids", "1,2,3")
            .with_body(json!({"user": {"name": "Ada", "tags": ["x", "y"]}}))
            .with_auth(auth.as_object().cloned().unwrap())
    }

    #[test]
    fn test_resolve_each_namespace() {
        let ev = Evaluator::new();
        let ctx = ctx();

        assert_eq!(ev.resolve_variable("path.id", &ctx).unwrap(), ExprValue::Json(json!("7")));
        assert_eq!(ev.resolve_variable("query.status", &ctx).unwrap(), ExprValue::Json(json!("open")));
        assert_eq!(ev.resolve_variable("body.user.name", &ctx).unwrap(), ExprValue::Json(json!("Ada")));
        assert_eq!(ev.resolve_variable("auth.tenantId", &ctx).unwrap(), ExprValue::Json(json!("t1")));
    }

    #[test]
    fn test_body_alone_is_whole_body() {
        let ev = Evaluator::new();
        let ctx = ctx();
        assert_eq!(ev.resolve_variable("body", &ctx).unwrap(), ExprValue::Json(ctx.body.clone()));
    }

    #[test]
    fn test_array_index_segment() {
        let ev = Evaluator::new();
        assert_eq!(
            ev.resolve_variable("body.user.tags.1", &ctx()).unwrap(),
            ExprValue::Json(json!("y"))
        );
    }

    #[test]
    fn test_missing_intermediate_is_undefined() {
        let ev = Evaluator::new();
        let ctx = ctx();
        assert_eq!(ev.resolve_variable("body.missing.deeper", &ctx).unwrap(), ExprValue::Undefined);
        assert_eq!(ev.resolve_variable("path.id.more", &ctx).unwrap(), ExprValue::Undefined);
        assert_eq!(
            ev.resolve_variable("auth.tenantId", &RequestContext::new()).unwrap(),
            ExprValue::Undefined
        );
    }

    #[test]
    fn test_query_comma_split() {
        let ev = Evaluator::new();
        assert_eq!(
            ev.resolve_variable("query.ids", &ctx()).unwrap(),
            ExprValue::Json(json!(["1", "2", "3"]))
        );
    }

    #[test]
    fn test_body_string_with_comma_is_not_split() {
        let ev = Evaluator::new();
        let ctx = RequestContext::new().with_body(json!({"csv": "a,b"}));
        assert_eq!(ev.resolve_variable("body.csv", &ctx).unwrap(), ExprValue::Json(json!("a,b")));
    }

    #[test]
    fn test_evaluate_function_default() {
        let ev = Evaluator::new();
        let ctx = ctx();
        assert_eq!(
            ev.evaluate_function("default(query.missing, 'active')", &ctx).unwrap(),
            ExprValue::Json(json!("active"))
        );
        assert_eq!(
            ev.evaluate_function("default(query.status, 'active')", &ctx).unwrap(),
            ExprValue::Json(json!("open"))
        );
    }

    #[test]
    fn test_evaluate_function_rejects_variables() {
        let ev = Evaluator::new();
        assert!(ev.evaluate_function("path.id", &ctx()).is_err());
    }

    #[test]
    fn test_evaluate_reference_classifies() {
        let ev = Evaluator::new();
        let ctx = ctx();
        assert!(matches!(
            ev.evaluate_reference("now()", &ctx).unwrap(),
            ExprValue::Timestamp(_)
        ));
        assert_eq!(ev.evaluate_reference("path.id", &ctx).unwrap(), ExprValue::Json(json!("7")));
    }

    #[test]
    fn test_custom_delimiters() {
        let ev = Evaluator::with_delimiters("{%", "%}");
        let refs = ev.parse_expressions("a {% path.id %} b ${{ path.id }}");
        assert_eq!(refs.len(), 1);
        assert_eq!(refs[0].inner_text, "path.id");
    }

    #[test]
    fn test_parse_template_surfaces_unknown_function() {
        let ev = Evaluator::new();
        let err = ev.parse_template("SELECT ${{ md5(path.id) }}").unwrap_err();
        assert_eq!(err.code(), "UNKNOWN_FUNCTION");
    }
}
