//! Route definitions
//!
//! One entry per annotated operation, as loaded from configuration.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

fn default_status() -> u16 {
    200
}

/// Declarative request-to-query mapping for one operation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteDefinition {
    /// HTTP method, any case
    pub method: String,

    /// Path template such as `/things/{id}`
    pub path: String,

    /// Query template: SQL text or a document query object
    pub query: Value,

    /// Adapter name; optional when exactly one adapter is configured
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub adapter: Option<String>,

    /// API field name to database column name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub field_map: Option<BTreeMap<String, String>>,

    /// Extraction pointer into the row-set (`/0` for a single item)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub returns: Option<String>,

    /// Query parameters that are always arrays
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub array_params: Vec<String>,

    /// Success status
    #[serde(default = "default_status")]
    pub status: u16,
}

impl RouteDefinition {
    pub fn new(method: impl Into<String>, path: impl Into<String>, query: Value) -> Self {
        Self {
            method: method.into(),
            path: path.into(),
            query,
            adapter: None,
            field_map: None,
            returns: None,
            array_params: Vec::new(),
            status: default_status(),
        }
    }

    pub fn with_adapter(mut self, adapter: impl Into<String>) -> Self {
        self.adapter = Some(adapter.into());
        self
    }

    pub fn with_field(mut self, api_name: impl Into<String>, db_name: impl Into<String>) -> Self {
        self.field_map
            .get_or_insert_with(BTreeMap::new)
            .insert(api_name.into(), db_name.into());
        self
    }

    pub fn returning(mut self, pointer: impl Into<String>) -> Self {
        self.returns = Some(pointer.into());
        self
    }

    pub fn with_array_param(mut self, name: impl Into<String>) -> Self {
        self.array_params.push(name.into());
        self
    }

    pub fn with_status(mut self, status: u16) -> Self {
        self.status = status;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_deserialize_camel_case() {
        let def: RouteDefinition = serde_json::from_value(json!({
            "method": "get",
            "path": "/users/{id}",
            "query": "SELECT * FROM users WHERE id = ${{ path.id }}::int",
            "fieldMap": {"userId": "user_id"},
            "returns": "/0",
            "arrayParams": ["ids"]
        }))
        .unwrap();

        assert_eq!(def.status, 200);
        assert_eq!(def.adapter, None);
        assert_eq!(def.field_map.unwrap()["userId"], "user_id");
        assert_eq!(def.returns.as_deref(), Some("/0"));
        assert_eq!(def.array_params, vec!["ids"]);
    }

    #[test]
    fn test_builder() {
        let def = RouteDefinition::new("POST", "/items", json!("INSERT"))
            .with_adapter("main")
            .with_field("itemId", "item_id")
            .returning("/0")
            .with_status(201);

        assert_eq!(def.adapter.as_deref(), Some("main"));
        assert_eq!(def.status, 201);
        assert_eq!(def.field_map.unwrap().len(), 1);
    }
}
