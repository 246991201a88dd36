//! Expression Property Tests
//!
//! Properties that must hold for any template and context:
//! - One parameter slot per expression, left to right
//! - Variable resolution is deterministic
//! - `default` only replaces null and undefined
//! - Comma-separated query values become arrays
//! - Nested calls evaluate innermost first
//! - First registered route wins on overlap
//! - Single-item extraction of nothing is null

use aeroquery::adapter::{
    DocumentAdapter, DriverFuture, MemoryDocumentStore, Placeholder, RowSet, SqlAdapter, SqlDriver,
    SqlQuery,
};
use aeroquery::adapter::{Artifact, DatabaseAdapter};
use aeroquery::expression::{Evaluator, ExprValue, RequestContext};
use aeroquery::routing::{compile, match_route, RouteDefinition};
use aeroquery::shaper::{shape, ExtractionPointer, FieldMap};
use aeroquery::RouterError;
use serde_json::{json, Map, Value};

// =============================================================================
// Helper Functions
// =============================================================================

struct NoopDriver;

impl SqlDriver for NoopDriver {
    fn fetch_all<'a>(&'a self, _query: &'a SqlQuery) -> DriverFuture<'a> {
        Box::pin(async { Ok(RowSet::new()) })
    }
}

fn eval(inner: &str, ctx: &RequestContext) -> ExprValue {
    Evaluator::new().evaluate_reference(inner, ctx).unwrap()
}

fn json_value(inner: &str, ctx: &RequestContext) -> Value {
    eval(inner, ctx).to_json()
}

fn full_context() -> RequestContext {
    let mut auth = Map::new();
    auth.insert("tenantId".to_string(), json!("t1"));
    auth.insert("sub".to_string(), json!("u1"));

    RequestContext::new()
        .with_path("id", "7")
        .with_query("status", "open")
        .with_query("tags", "a,b,c")
        .with_body(json!({"user": {"name": "Ada", "age": 36}, "zero": 0, "no": false, "empty": ""}))
        .with_auth(auth)
}

fn row(value: Value) -> Map<String, Value> {
    value.as_object().cloned().unwrap()
}

// =============================================================================
// Round-trip: slot count and order
// =============================================================================

/// Every expression becomes exactly one slot, values kept in template order.
#[test]
fn test_one_slot_per_expression_in_order() {
    let cases: Vec<(&str, Vec<Value>)> = vec![
        ("SELECT 1", vec![]),
        ("SELECT * FROM t WHERE id = ${{ path.id }}", vec![json!("7")]),
        (
            "UPDATE t SET name = ${{ body.user.name }}, age = ${{ body.user.age }} WHERE id = ${{ path.id }} AND tenant = ${{ auth.tenantId }}",
            vec![json!("Ada"), json!(36), json!("7"), json!("t1")],
        ),
        (
            "SELECT ${{ query.status }}, ${{ query.status }}, ${{ default(query.missing, 'x') }}",
            vec![json!("open"), json!("open"), json!("x")],
        ),
    ];

    let ctx = full_context();
    for placeholder in [Placeholder::Numbered, Placeholder::Positional] {
        let adapter = SqlAdapter::new(NoopDriver).with_placeholder(placeholder);

        for (template, expected) in &cases {
            let query = adapter
                .interpolate_sql(template, &ctx, &Evaluator::new())
                .unwrap();

            let values: Vec<Value> = query.values.iter().map(ExprValue::to_json).collect();
            assert_eq!(&values, expected, "template: {}", template);

            let slots = match placeholder {
                Placeholder::Numbered => (1..=expected.len())
                    .filter(|n| query.text.contains(&format!("${}", n)))
                    .count(),
                Placeholder::Positional => query.text.matches('?').count(),
            };
            assert_eq!(slots, expected.len(), "template: {}", template);
            assert!(!query.text.contains("${{"));
        }
    }
}

/// Numbered slots appear in increasing order through the text.
#[test]
fn test_numbered_slots_increase_left_to_right() {
    let adapter = SqlAdapter::new(NoopDriver);
    let query = adapter
        .interpolate_sql(
            "${{ path.id }} ${{ query.status }} ${{ body.user.name }}",
            &full_context(),
            &Evaluator::new(),
        )
        .unwrap();
    assert_eq!(query.text, "$1 $2 $3");
}

/// The SQL scenario: path id then defaulted status.
#[test]
fn test_sql_scenario_values() {
    let adapter = SqlAdapter::new(NoopDriver);
    let ctx = RequestContext::new().with_path("id", "7");
    let artifact = adapter
        .interpolate(
            &json!("SELECT * FROM t WHERE id = ${{ path.id }} AND s = ${{ default(query.status, 'active') }}"),
            &ctx,
            &Evaluator::new(),
        )
        .unwrap();

    let Artifact::Sql(query) = artifact else {
        panic!("expected SQL artifact");
    };
    let values: Vec<Value> = query.values.iter().map(ExprValue::to_json).collect();
    assert_eq!(values, vec![json!("7"), json!("active")]);
}

/// The structured scenario: a whole-leaf expression keeps the value's type.
#[test]
fn test_document_scenario_whole_leaf() {
    let adapter = DocumentAdapter::new(MemoryDocumentStore::new());
    let mut auth = Map::new();
    auth.insert("tenantId".to_string(), json!("t1"));
    auth.insert("limit".to_string(), json!(5));
    let ctx = RequestContext::new().with_auth(auth);

    let artifact = adapter
        .interpolate(
            &json!({
                "collection": "items",
                "operation": "find",
                "filter": {"tenant": "${{ auth.tenantId }}", "cap": "${{ auth.limit }}", "label": "t-${{ auth.limit }}"}
            }),
            &ctx,
            &Evaluator::new(),
        )
        .unwrap();

    let Artifact::Document(command) = artifact else {
        panic!("expected document artifact");
    };
    assert_eq!(
        command.arg(0),
        &json!({"tenant": "t1", "cap": 5, "label": "t-5"})
    );
}

// =============================================================================
// Idempotence
// =============================================================================

/// Resolving the same reference against the same context is stable.
#[test]
fn test_resolution_is_deterministic() {
    let ctx = full_context();
    for inner in ["path.id", "query.tags", "body.user", "auth.tenantId", "body.nope", "default(query.x, 1)"] {
        let first = eval(inner, &ctx);
        for _ in 0..50 {
            assert_eq!(eval(inner, &ctx), first, "reference: {}", inner);
        }
    }
}

/// `uuid()` is the documented exception.
#[test]
fn test_uuid_is_fresh_each_time() {
    let ctx = RequestContext::new();
    assert_ne!(eval("uuid()", &ctx), eval("uuid()", &ctx));
}

// =============================================================================
// Default Semantics
// =============================================================================

/// Falsy but present values pass through `default` unchanged.
#[test]
fn test_default_keeps_falsy_values() {
    let ctx = full_context();
    assert_eq!(json_value("default(body.zero, 'y')", &ctx), json!(0));
    assert_eq!(json_value("default(body.no, 'y')", &ctx), json!(false));
    assert_eq!(json_value("default(body.empty, 'y')", &ctx), json!(""));
    assert_eq!(json_value("default(path.id, 'y')", &ctx), json!("7"));
}

/// Null and undefined are replaced.
#[test]
fn test_default_replaces_null_and_undefined() {
    let ctx = RequestContext::new().with_body(json!({"gone": null}));
    assert_eq!(json_value("default(body.gone, 'y')", &ctx), json!("y"));
    assert_eq!(json_value("default(body.missing, 'y')", &ctx), json!("y"));
    assert_eq!(json_value("default(query.status, 'active')", &ctx), json!("active"));
    assert_eq!(json_value("default(auth.sub, 42)", &ctx), json!(42));
}

// =============================================================================
// Array Coercion
// =============================================================================

#[test]
fn test_comma_query_value_becomes_array() {
    let ctx = RequestContext::new().with_query("ids", "1,2,3").with_query("one", "1");
    assert_eq!(json_value("query.ids", &ctx), json!(["1", "2", "3"]));
    assert_eq!(json_value("query.one", &ctx), json!("1"));
}

/// Commas in other namespaces are left alone.
#[test]
fn test_comma_split_only_in_query() {
    let ctx = RequestContext::new()
        .with_path("id", "1,2")
        .with_body(json!({"csv": "a,b"}));
    assert_eq!(json_value("path.id", &ctx), json!("1,2"));
    assert_eq!(json_value("body.csv", &ctx), json!("a,b"));
}

// =============================================================================
// Nesting
// =============================================================================

#[test]
fn test_nested_call_evaluates_inner_first() {
    let value = json_value("default(uuid(), 'x')", &RequestContext::new());
    let text = value.as_str().unwrap();
    assert!(uuid::Uuid::parse_str(text).is_ok(), "not a uuid: {}", text);
}

#[test]
fn test_unknown_function_is_rejected() {
    let err = Evaluator::new()
        .evaluate_reference("shout(path.id)", &RequestContext::new())
        .unwrap_err();
    assert!(matches!(err, RouterError::UnknownFunction(ref name) if name == "shout"));
}

// =============================================================================
// Matcher Specificity
// =============================================================================

#[test]
fn test_literal_route_registered_first_wins() {
    let evaluator = Evaluator::new();
    let routes = vec![
        compile(&RouteDefinition::new("GET", "/items", json!("SELECT * FROM items")), &evaluator).unwrap(),
        compile(
            &RouteDefinition::new("GET", "/items/{id}", json!("SELECT * FROM items WHERE id = ${{ path.id }}")),
            &evaluator,
        )
        .unwrap(),
    ];

    let list = match_route(&routes, "GET", "/items").unwrap();
    assert_eq!(list.route.original_path, "/items");
    assert!(list.params.is_empty());

    let one = match_route(&routes, "get", "/items/42").unwrap();
    assert_eq!(one.route.original_path, "/items/{id}");
    assert_eq!(one.params["id"], "42");

    assert!(match_route(&routes, "GET", "/items/42/extra").is_none());
    assert!(match_route(&routes, "DELETE", "/items").is_none());
}

// =============================================================================
// Not-found Extraction
// =============================================================================

#[test]
fn test_first_item_of_empty_rowset_is_null() {
    let pointer = ExtractionPointer::parse("/0").unwrap();
    assert!(pointer.is_single_item());
    assert_eq!(shape(Vec::new(), None, Some(&pointer)), Value::Null);
}

#[test]
fn test_first_item_is_field_mapped() {
    let mut declared = std::collections::BTreeMap::new();
    declared.insert("userId".to_string(), "user_id".to_string());
    let field_map = FieldMap::from_declared(&declared).unwrap();
    let pointer = ExtractionPointer::parse("/0").unwrap();

    let rows = vec![
        row(json!({"user_id": 1, "name": "Ada"})),
        row(json!({"user_id": 2, "name": "Grace"})),
    ];
    assert_eq!(
        shape(rows, Some(&field_map), Some(&pointer)),
        json!({"userId": 1, "name": "Ada"})
    );
}
