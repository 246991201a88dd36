//! Request Context
//!
//! The four namespaces an expression can read from. Built fresh for every
//! request and never shared.

use std::collections::BTreeMap;

use serde_json::{Map, Value};

/// A query-string parameter value
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryValue {
    Single(String),
    Multi(Vec<String>),
}

impl QueryValue {
    /// JSON form used by the evaluator
    pub fn to_json(&self) -> Value {
        match self {
            QueryValue::Single(s) => Value::String(s.clone()),
            QueryValue::Multi(items) => {
                Value::Array(items.iter().cloned().map(Value::String).collect())
            }
        }
    }

    /// Append another occurrence of the same key
    pub fn push(&mut self, value: String) {
        match self {
            QueryValue::Single(first) => {
                *self = QueryValue::Multi(vec![std::mem::take(first), value]);
            }
            QueryValue::Multi(items) => items.push(value),
        }
    }
}

/// Context an expression is evaluated against
#[derive(Debug, Clone, Default)]
pub struct RequestContext {
    /// Captured path parameters (percent-decoded)
    pub path: BTreeMap<String, String>,

    /// Parsed query-string parameters
    pub query: BTreeMap<String, QueryValue>,

    /// Request body (`null` when absent)
    pub body: Value,

    /// Claims from the auth resolver, if one ran
    pub auth: Option<Map<String, Value>>,
}

impl RequestContext {
    /// Create an empty context
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a path parameter
    pub fn with_path(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.path.insert(name.into(), value.into());
        self
    }

    /// Add a single-valued query parameter
    pub fn with_query(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.query
            .insert(name.into(), QueryValue::Single(value.into()));
        self
    }

    /// Set the body
    pub fn with_body(mut self, body: Value) -> Self {
        self.body = body;
        self
    }

    /// Set the auth context
    pub fn with_auth(mut self, auth: Map<String, Value>) -> Self {
        self.auth = Some(auth);
        self
    }

    /// `path` namespace as a JSON object
    pub fn path_object(&self) -> Value {
        Value::Object(
            self.path
                .iter()
                .map(|(k, v)| (k.clone(), Value::String(v.clone())))
                .collect(),
        )
    }

    /// `query` namespace as a JSON object
    pub fn query_object(&self) -> Value {
        Value::Object(
            self.query
                .iter()
                .map(|(k, v)| (k.clone(), v.to_json()))
                .collect(),
        )
    }
}
