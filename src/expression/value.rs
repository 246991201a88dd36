//! Evaluated expression values

use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::{json, Value};

/// Result of evaluating one expression
#[derive(Debug, Clone, PartialEq)]
pub enum ExprValue {
    /// Nothing was found at the referenced location
    Undefined,
    /// Any JSON value, including `null`
    Json(Value),
    /// An instant produced by `now()`
    Timestamp(DateTime<Utc>),
}

impl ExprValue {
    /// True for `null` and undefined
    pub fn is_nullish(&self) -> bool {
        matches!(self, ExprValue::Undefined | ExprValue::Json(Value::Null))
    }

    /// Plain JSON form; timestamps become RFC 3339 strings
    pub fn to_json(&self) -> Value {
        match self {
            ExprValue::Undefined => Value::Null,
            ExprValue::Json(v) => v.clone(),
            ExprValue::Timestamp(ts) => Value::String(rfc3339(ts)),
        }
    }

    /// Document-store form; timestamps keep their type as extended JSON dates
    pub fn to_document_value(&self) -> Value {
        match self {
            ExprValue::Timestamp(ts) => json!({ "$date": rfc3339(ts) }),
            other => other.to_json(),
        }
    }

    /// Text form used when an expression is spliced into surrounding text
    pub fn to_text(&self) -> String {
        match self {
            ExprValue::Undefined => String::new(),
            ExprValue::Json(Value::String(s)) => s.clone(),
            ExprValue::Json(Value::Array(items)) => items
                .iter()
                .map(|item| ExprValue::Json(item.clone()).to_text())
                .collect::<Vec<_>>()
                .join(","),
            ExprValue::Json(other) => other.to_string(),
            ExprValue::Timestamp(ts) => rfc3339(ts),
        }
    }
}

impl From<Value> for ExprValue {
    fn from(value: Value) -> Self {
        ExprValue::Json(value)
    }
}

impl From<Option<Value>> for ExprValue {
    fn from(value: Option<Value>) -> Self {
        value.map_or(ExprValue::Undefined, ExprValue::Json)
    }
}

fn rfc3339(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Millis, true)
}
