//! # Response Shaper
//!
//! Turns a row-set into the response value: column names are renamed
//! through the route's field map, then an optional extraction pointer picks
//! a sub-value out of the row array.

use std::collections::{BTreeMap, HashMap};

use serde_json::Value;

use crate::adapter::{Row, RowSet};

/// Reverse lookup from database column name to API field name
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldMap {
    db_to_api: HashMap<String, String>,
}

impl FieldMap {
    /// Build from a declared `apiName -> dbName` mapping.
    ///
    /// Two API names mapped to the same column are rejected, since the
    /// reverse lookup would be ambiguous.
    pub fn from_declared(declared: &BTreeMap<String, String>) -> Result<Self, String> {
        let mut db_to_api = HashMap::with_capacity(declared.len());
        for (api, db) in declared {
            if let Some(previous) = db_to_api.insert(db.clone(), api.clone()) {
                return Err(format!(
                    "fields '{}' and '{}' both map to column '{}'",
                    previous, api, db
                ));
            }
        }
        Ok(Self { db_to_api })
    }

    /// API name for a column; unmapped columns keep their name
    pub fn api_name<'a>(&'a self, column: &'a str) -> &'a str {
        self.db_to_api.get(column).map_or(column, String::as_str)
    }

    pub fn len(&self) -> usize {
        self.db_to_api.len()
    }

    pub fn is_empty(&self) -> bool {
        self.db_to_api.is_empty()
    }

    /// Rename the top-level keys of one row
    pub fn rename_row(&self, row: Row) -> Row {
        row.into_iter()
            .map(|(column, value)| (self.api_name(&column).to_string(), value))
            .collect()
    }
}

/// JSON pointer (RFC 6901) into the row-set viewed as an array
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractionPointer(String);

impl ExtractionPointer {
    /// `""` selects the whole array, `/0` the first row, `/0/name` its `name` field
    pub fn parse(text: &str) -> Result<Self, String> {
        if text.is_empty() || text.starts_with('/') {
            Ok(Self(text.to_string()))
        } else {
            Err(format!(
                "extraction pointer '{}' must be empty or start with '/'",
                text
            ))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// True for the "first row" shape whose absence means not found
    pub fn is_single_item(&self) -> bool {
        self.0 == "/0"
    }

    /// Resolve against the shaped rows; anything missing is `null`
    pub fn resolve(&self, rows: &Value) -> Value {
        rows.pointer(&self.0).cloned().unwrap_or(Value::Null)
    }
}

/// Apply field mapping, then extraction
pub fn shape(
    rows: RowSet,
    field_map: Option<&FieldMap>,
    extraction: Option<&ExtractionPointer>,
) -> Value {
    let rows: Vec<Value> = rows
        .into_iter()
        .map(|row| match field_map {
            Some(map) if !map.is_empty() => Value::Object(map.rename_row(row)),
            _ => Value::Object(row),
        })
        .collect();
    let rows = Value::Array(rows);

    match extraction {
        Some(pointer) => pointer.resolve(&rows),
        None => rows,
    }
}
