//! Route compiler and matcher
//!
//! `{name}` path segments become single-segment capture groups. Matching
//! is first-match-wins in declaration order: literal routes such as
//! `/items/new` must be declared before `/items/{id}` to take precedence.

use std::collections::BTreeMap;

use percent_encoding::percent_decode_str;
use regex::Regex;
use serde_json::Value;

use crate::error::{RouterError, RouterResult};
use crate::expression::{Evaluator, Expr, Namespace};
use crate::shaper::{ExtractionPointer, FieldMap};

use super::definition::RouteDefinition;

/// Matchable, immutable form of a route definition
#[derive(Debug, Clone)]
pub struct CompiledRoute {
    /// Uppercase HTTP method
    pub method: String,
    /// Anchored path regex
    pub pattern: Regex,
    /// Capture names in declaration order
    pub capture_names: Vec<String>,
    pub template: Value,
    pub adapter: Option<String>,
    /// Whether any expression reads a property of `auth`
    pub uses_auth: bool,
    pub field_map: Option<FieldMap>,
    pub extraction: Option<ExtractionPointer>,
    pub original_path: String,
    pub array_params: Vec<String>,
    pub status: u16,
}

impl CompiledRoute {
    /// `GET /users/{id}`
    pub fn label(&self) -> String {
        format!("{} {}", self.method, self.original_path)
    }
}

/// A matched route plus its decoded captures
#[derive(Debug, Clone)]
pub struct RouteMatch<'r> {
    pub route: &'r CompiledRoute,
    pub params: BTreeMap<String, String>,
}

/// Compile one route definition, parsing every expression in its template
pub fn compile(definition: &RouteDefinition, evaluator: &Evaluator) -> RouterResult<CompiledRoute> {
    let method = definition.method.trim();
    if method.is_empty() || !method.chars().all(|c| c.is_ascii_alphabetic()) {
        return Err(RouterError::validation(format!(
            "Invalid HTTP method '{}' for path {}",
            definition.method, definition.path
        )));
    }
    let method = method.to_ascii_uppercase();

    let (pattern, capture_names) = compile_path(&definition.path)?;

    let mut expressions = Vec::new();
    for text in string_leaves(&definition.query) {
        expressions.extend(evaluator.parse_template(text)?);
    }
    let uses_auth = expressions
        .iter()
        .any(|expr: &Expr| expr.reads_property_of(Namespace::Auth));

    let field_map = definition
        .field_map
        .as_ref()
        .map(FieldMap::from_declared)
        .transpose()
        .map_err(|e| RouterError::validation(format!("{} {}: {}", method, definition.path, e)))?;

    let extraction = definition
        .returns
        .as_deref()
        .map(ExtractionPointer::parse)
        .transpose()
        .map_err(|e| RouterError::validation(format!("{} {}: {}", method, definition.path, e)))?;

    if !(100..=599).contains(&definition.status) {
        return Err(RouterError::validation(format!(
            "{} {}: status {} is not a valid HTTP status",
            method, definition.path, definition.status
        )));
    }

    Ok(CompiledRoute {
        method,
        pattern,
        capture_names,
        template: definition.query.clone(),
        adapter: definition.adapter.clone(),
        uses_auth,
        field_map,
        extraction,
        original_path: definition.path.clone(),
        array_params: definition.array_params.clone(),
        status: definition.status,
    })
}

/// Turn `/things/{id}` into `^/things/([^/]+)$` plus `["id"]`
pub fn compile_path(path: &str) -> RouterResult<(Regex, Vec<String>)> {
    if !path.starts_with('/') {
        return Err(RouterError::validation(format!(
            "Path '{}' must start with '/'",
            path
        )));
    }

    let mut source = String::from("^");
    let mut names: Vec<String> = Vec::new();
    let mut rest = path;

    while let Some(open) = rest.find('{') {
        source.push_str(&regex::escape(&rest[..open]));
        let close = rest[open..]
            .find('}')
            .map(|offset| open + offset)
            .ok_or_else(|| RouterError::validation(format!("Unclosed '{{' in path '{}'", path)))?;

        let name = &rest[open + 1..close];
        if !is_identifier(name) {
            return Err(RouterError::validation(format!(
                "Invalid path parameter '{{{}}}' in '{}'",
                name, path
            )));
        }
        if names.iter().any(|n| n == name) {
            return Err(RouterError::validation(format!(
                "Duplicate path parameter '{}' in '{}'",
                name, path
            )));
        }

        names.push(name.to_string());
        source.push_str("([^/]+)");
        rest = &rest[close + 1..];
    }

    if rest.contains('}') {
        return Err(RouterError::validation(format!(
            "Unmatched '}}' in path '{}'",
            path
        )));
    }
    source.push_str(&regex::escape(rest));
    source.push('$');

    let pattern = Regex::new(&source)
        .map_err(|e| RouterError::validation(format!("Invalid path '{}': {}", path, e)))?;
    Ok((pattern, names))
}

fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Every string leaf in a template
fn string_leaves(value: &Value) -> Vec<&str> {
    match value {
        Value::String(s) => vec![s.as_str()],
        Value::Array(items) => items.iter().flat_map(string_leaves).collect(),
        Value::Object(map) => map.values().flat_map(string_leaves).collect(),
        _ => Vec::new(),
    }
}

/// Find the first route matching `method` and `path`
pub fn match_route<'r>(
    routes: &'r [CompiledRoute],
    method: &str,
    path: &str,
) -> Option<RouteMatch<'r>> {
    let path = path.split('?').next().unwrap_or_default();

    routes.iter().find_map(|route| {
        if !route.method.eq_ignore_ascii_case(method) {
            return None;
        }
        let captures = route.pattern.captures(path)?;
        let params = route
            .capture_names
            .iter()
            .zip(captures.iter().skip(1))
            .filter_map(|(name, m)| {
                m.map(|m| {
                    let decoded = percent_decode_str(m.as_str()).decode_utf8_lossy();
                    (name.clone(), decoded.into_owned())
                })
            })
            .collect();
        Some(RouteMatch { route, params })
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn route(method: &str, path: &str, query: Value) -> CompiledRoute {
        compile(&RouteDefinition::new(method, path, query), &Evaluator::new()).unwrap()
    }

    #[test]
    fn test_compile_path_captures_in_order() {
        let (pattern, names) = compile_path("/orgs/{org}/users/{id}").unwrap();
        assert_eq!(names, vec!["org", "id"]);
        assert_eq!(pattern.captures_len() - 1, names.len());
        assert!(pattern.is_match("/orgs/a/users/b"));
        assert!(!pattern.is_match("/orgs/a/users/b/c"));
        assert!(!pattern.is_match("/orgs/a/b/users/c"));
    }

    #[test]
    fn test_compile_path_escapes_literals() {
        let (pattern, _) = compile_path("/files/v1.0/{name}").unwrap();
        assert!(pattern.is_match("/files/v1.0/a"));
        assert!(!pattern.is_match("/files/v1x0/a"));
    }

    #[test]
    fn test_compile_path_errors() {
        assert!(compile_path("users/{id}").is_err());
        assert!(compile_path("/users/{id").is_err());
        assert!(compile_path("/users/{}").is_err());
        assert!(compile_path("/users/{id}/{id}").is_err());
        assert!(compile_path("/users/id}").is_err());
    }

    #[test]
    fn test_method_is_normalized() {
        let r = route("get", "/items", json!("SELECT 1"));
        assert_eq!(r.method, "GET");
        assert!(compile(&RouteDefinition::new("", "/x", json!("SELECT 1")), &Evaluator::new()).is_err());
    }

    #[test]
    fn test_auth_detection() {
        let sql = route("GET", "/me", json!("SELECT * FROM u WHERE id = ${{ auth.sub }}"));
        assert!(sql.uses_auth);

        let nested = route(
            "GET",
            "/mine",
            json!({"collection": "t", "operation": "find", "filter": {"owner": "${{ default(auth.sub, 'x') }}"}}),
        );
        assert!(nested.uses_auth);

        let plain = route("GET", "/t", json!("SELECT 'auth.sub' FROM t WHERE x = ${{ path.authx }}"));
        assert!(!plain.uses_auth);
    }

    #[test]
    fn test_compile_rejects_unknown_function() {
        let err = compile(
            &RouteDefinition::new("GET", "/x", json!("SELECT ${{ sha1(path.id) }}")),
            &Evaluator::new(),
        )
        .unwrap_err();
        assert_eq!(err.code(), "UNKNOWN_FUNCTION");
    }

    #[test]
    fn test_compile_rejects_bad_status_and_pointer() {
        let bad_status = RouteDefinition::new("GET", "/x", json!("SELECT 1")).with_status(42);
        assert!(compile(&bad_status, &Evaluator::new()).is_err());

        let bad_pointer = RouteDefinition::new("GET", "/x", json!("SELECT 1")).returning("0");
        assert!(compile(&bad_pointer, &Evaluator::new()).is_err());
    }

    #[test]
    fn test_match_is_case_insensitive_and_strips_query() {
        let routes = vec![route("GET", "/items/{id}", json!("SELECT 1"))];
        let m = match_route(&routes, "get", "/items/42?verbose=1").unwrap();
        assert_eq!(m.params["id"], "42");
        assert!(match_route(&routes, "POST", "/items/42").is_none());
    }

    #[test]
    fn test_literal_route_declared_first_wins() {
        let routes = vec![
            route("GET", "/items", json!("SELECT 'list'")),
            route("GET", "/items/{id}", json!("SELECT 'one'")),
        ];
        let m = match_route(&routes, "GET", "/items").unwrap();
        assert_eq!(m.route.original_path, "/items");
        assert!(m.params.is_empty());
    }

    #[test]
    fn test_first_structural_match_wins() {
        let routes = vec![
            route("GET", "/items/{id}", json!("SELECT 'one'")),
            route("GET", "/items/new", json!("SELECT 'new'")),
        ];
        let m = match_route(&routes, "GET", "/items/new").unwrap();
        assert_eq!(m.route.original_path, "/items/{id}");
    }

    #[test]
    fn test_captures_are_percent_decoded() {
        let routes = vec![route("GET", "/files/{name}", json!("SELECT 1"))];
        let m = match_route(&routes, "GET", "/files/hello%20world%2Ftxt").unwrap();
        assert_eq!(m.params["name"], "hello world/txt");
    }

    #[test]
    fn test_capture_does_not_cross_segments() {
        let routes = vec![route("GET", "/files/{name}", json!("SELECT 1"))];
        assert!(match_route(&routes, "GET", "/files/a/b").is_none());
        assert!(match_route(&routes, "GET", "/files/").is_none());
    }
}
