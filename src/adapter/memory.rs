//! In-memory document store
//!
//! Collections of JSON documents behind a lock. Implements
//! [`DocumentDriver`] so it can back a [`DocumentAdapter`](super::DocumentAdapter)
//! for local runs and tests.

use std::collections::HashMap;
use std::sync::RwLock;

use serde_json::{json, Map, Value};

use super::document::{DocumentCommand, DocumentDriver, DocumentOperation};
use super::filter::{apply_update, matches, project, sort_documents};
use super::{DriverFuture, Row, RowSet};
use crate::error::DriverError;

type Collections = HashMap<String, Vec<Value>>;

/// Thread-safe in-memory collections
#[derive(Debug, Default)]
pub struct MemoryDocumentStore {
    collections: RwLock<Collections>,
}

impl MemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert documents into `collection`, generating `_id` where missing
    pub fn seed(
        &self,
        collection: &str,
        documents: impl IntoIterator<Item = Value>,
    ) -> Result<usize, String> {
        let mut collections = self.collections.write().map_err(|_| "Lock poisoned")?;
        let docs = collections.entry(collection.to_string()).or_default();
        let mut count = 0;
        for document in documents {
            insert_document(docs, document)?;
            count += 1;
        }
        Ok(count)
    }

    /// Copy of every document in `collection`
    pub fn documents(&self, collection: &str) -> Vec<Value> {
        self.collections
            .read()
            .map(|c| c.get(collection).cloned().unwrap_or_default())
            .unwrap_or_default()
    }

    /// Run one command synchronously
    pub fn execute_command(&self, command: &DocumentCommand) -> Result<RowSet, String> {
        let mut collections = self.collections.write().map_err(|_| "Lock poisoned")?;
        let docs = collections.entry(command.collection.clone()).or_default();

        let filter = command.arg(0);
        let rows = match command.operation {
            DocumentOperation::Find => find(docs, filter, command.arg(1))?,
            DocumentOperation::FindOne => {
                let mut options = options_of(command.arg(1));
                options.insert("limit".to_string(), json!(1));
                find(docs, filter, &Value::Object(options))?
            }
            DocumentOperation::CountDocuments => {
                let count = matching_indices(docs, filter)?.len();
                vec![row(json!({ "count": count }))]
            }
            DocumentOperation::InsertOne => {
                let id = insert_document(docs, command.arg(0).clone())?;
                vec![row(json!({ "insertedId": id }))]
            }
            DocumentOperation::InsertMany => {
                let items = command.arg(0).as_array().cloned().unwrap_or_default();
                let mut staged = docs.clone();
                let ids = items
                    .into_iter()
                    .map(|doc| insert_document(&mut staged, doc))
                    .collect::<Result<Vec<_>, _>>()?;
                *docs = staged;
                vec![row(json!({ "insertedCount": ids.len(), "insertedIds": ids }))]
            }
            DocumentOperation::UpdateOne | DocumentOperation::UpdateMany => {
                let many = command.operation == DocumentOperation::UpdateMany;
                update(docs, filter, command.arg(1), command.arg(2), many)?
            }
            DocumentOperation::DeleteOne | DocumentOperation::DeleteMany => {
                let mut targets = matching_indices(docs, filter)?;
                if command.operation == DocumentOperation::DeleteOne {
                    targets.truncate(1);
                }
                for index in targets.iter().rev() {
                    docs.remove(*index);
                }
                vec![row(json!({ "deletedCount": targets.len() }))]
            }
            DocumentOperation::FindOneAndUpdate => {
                find_one_and_update(docs, filter, command.arg(1), command.arg(2))?
            }
            DocumentOperation::FindOneAndDelete => {
                let options = command.arg(1);
                match first_match(docs, filter, options)? {
                    Some(index) => {
                        let removed = docs.remove(index);
                        vec![row(apply_projection(removed, options)?)]
                    }
                    None => Vec::new(),
                }
            }
            DocumentOperation::Aggregate => aggregate(docs.clone(), command.arg(0))?,
        };

        Ok(rows)
    }
}

impl DocumentDriver for MemoryDocumentStore {
    fn run<'a>(&'a self, command: &'a DocumentCommand) -> DriverFuture<'a> {
        Box::pin(async move { self.execute_command(command).map_err(DriverError::from) })
    }
}

fn row(doc: Value) -> Row {
    match doc {
        Value::Object(map) => map,
        other => {
            let mut map = Map::new();
            map.insert("value".to_string(), other);
            map
        }
    }
}

fn options_of(options: &Value) -> Map<String, Value> {
    options.as_object().cloned().unwrap_or_default()
}

/// Append a document, returning its `_id`
fn insert_document(docs: &mut Vec<Value>, document: Value) -> Result<Value, String> {
    let Value::Object(mut document) = document else {
        return Err(format!("documents must be objects, got {}", document));
    };

    let id = document
        .entry("_id")
        .or_insert_with(|| Value::String(uuid::Uuid::new_v4().to_string()))
        .clone();

    if docs.iter().any(|existing| existing.get("_id") == Some(&id)) {
        return Err(format!("duplicate key: _id {}", id));
    }

    docs.push(Value::Object(document));
    Ok(id)
}

fn matching_indices(docs: &[Value], filter: &Value) -> Result<Vec<usize>, String> {
    let mut indices = Vec::new();
    for (index, doc) in docs.iter().enumerate() {
        if matches(doc, filter)? {
            indices.push(index);
        }
    }
    Ok(indices)
}

/// Index of the first match, honoring a `sort` option
fn first_match(docs: &[Value], filter: &Value, options: &Value) -> Result<Option<usize>, String> {
    let indices = matching_indices(docs, filter)?;
    let Some(sort) = options.get("sort") else {
        return Ok(indices.first().copied());
    };

    let mut tagged: Vec<Value> = indices
        .iter()
        .map(|i| json!({ "i": i, "d": docs[*i] }))
        .collect();
    let prefixed = prefix_sort(sort, "d")?;
    sort_documents(&mut tagged, &prefixed)?;
    Ok(tagged
        .first()
        .and_then(|t| t["i"].as_u64())
        .map(|i| i as usize))
}

fn prefix_sort(sort: &Value, prefix: &str) -> Result<Value, String> {
    let spec = sort
        .as_object()
        .ok_or_else(|| "sort must be an object".to_string())?;
    Ok(Value::Object(
        spec.iter()
            .map(|(k, v)| (format!("{}.{}", prefix, k), v.clone()))
            .collect(),
    ))
}

fn count_option(options: &Value, key: &str) -> Result<Option<usize>, String> {
    match options.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(value) => value
            .as_u64()
            .map(|n| Some(n as usize))
            .ok_or_else(|| format!("{} must be a non-negative integer", key)),
    }
}

fn apply_projection(doc: Value, options: &Value) -> Result<Value, String> {
    match options.get("projection") {
        Some(projection) => project(&doc, projection),
        None => Ok(doc),
    }
}

fn find(docs: &[Value], filter: &Value, options: &Value) -> Result<RowSet, String> {
    let mut found = Vec::new();
    for doc in docs {
        if matches(doc, filter)? {
            found.push(doc.clone());
        }
    }

    if let Some(sort) = options.get("sort") {
        sort_documents(&mut found, sort)?;
    }

    let skip = count_option(options, "skip")?.unwrap_or(0);
    let limit = match count_option(options, "limit")? {
        None | Some(0) => usize::MAX,
        Some(n) => n,
    };

    found
        .into_iter()
        .skip(skip)
        .take(limit)
        .map(|doc| apply_projection(doc, options).map(row))
        .collect()
}

fn update(
    docs: &mut Vec<Value>,
    filter: &Value,
    update: &Value,
    options: &Value,
    many: bool,
) -> Result<RowSet, String> {
    let mut targets = matching_indices(docs, filter)?;
    if !many {
        targets.truncate(1);
    }

    if targets.is_empty() && upsert_requested(options) {
        let id = upsert(docs, filter, update)?;
        return Ok(vec![row(json!({
            "matchedCount": 0,
            "modifiedCount": 0,
            "upsertedId": id
        }))]);
    }

    let mut staged = docs.clone();
    let mut modified = 0;
    for index in &targets {
        if let Some(Value::Object(doc)) = staged.get_mut(*index) {
            if apply_update(doc, update)? {
                modified += 1;
            }
        }
    }
    *docs = staged;

    Ok(vec![row(json!({
        "matchedCount": targets.len(),
        "modifiedCount": modified
    }))])
}

fn upsert_requested(options: &Value) -> bool {
    options.get("upsert").and_then(Value::as_bool).unwrap_or(false)
}

/// Insert a document seeded from the filter's equality fields, then apply the update
fn upsert(docs: &mut Vec<Value>, filter: &Value, update: &Value) -> Result<Value, String> {
    let mut seed: Map<String, Value> = filter
        .as_object()
        .map(|f| {
            f.iter()
                .filter(|(k, v)| {
                    !k.starts_with('$')
                        && !k.contains('.')
                        && !v.as_object().is_some_and(|o| o.keys().any(|k| k.starts_with('$')))
                })
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect()
        })
        .unwrap_or_default();

    let id = seed.remove("_id");
    apply_update(&mut seed, update)?;
    if let Some(id) = id {
        seed.insert("_id".to_string(), id);
    }
    insert_document(docs, Value::Object(seed))
}

fn find_one_and_update(
    docs: &mut Vec<Value>,
    filter: &Value,
    update: &Value,
    options: &Value,
) -> Result<RowSet, String> {
    let return_after = options.get("returnDocument").and_then(Value::as_str) != Some("before");

    let index = match first_match(docs, filter, options)? {
        Some(index) => index,
        None if upsert_requested(options) => {
            upsert(docs, filter, update)?;
            if !return_after {
                return Ok(Vec::new());
            }
            let created = docs.last().cloned().unwrap_or(Value::Null);
            return Ok(vec![row(apply_projection(created, options)?)]);
        }
        None => return Ok(Vec::new()),
    };

    let before = docs[index].clone();
    if let Some(Value::Object(doc)) = docs.get_mut(index) {
        apply_update(doc, update)?;
    }

    let result = if return_after {
        docs[index].clone()
    } else {
        before
    };
    Ok(vec![row(apply_projection(result, options)?)])
}

fn aggregate(mut docs: Vec<Value>, pipeline: &Value) -> Result<RowSet, String> {
    let stages = pipeline
        .as_array()
        .ok_or_else(|| "pipeline must be an array".to_string())?;

    for stage in stages {
        let (name, spec) = stage
            .as_object()
            .filter(|s| s.len() == 1)
            .and_then(|s| s.iter().next())
            .ok_or_else(|| "each pipeline stage must be an object with one key".to_string())?;

        docs = match name.as_str() {
            "$match" => {
                let mut kept = Vec::with_capacity(docs.len());
                for doc in docs {
                    if matches(&doc, spec)? {
                        kept.push(doc);
                    }
                }
                kept
            }
            "$sort" => {
                sort_documents(&mut docs, spec)?;
                docs
            }
            "$skip" => {
                let n = spec.as_u64().ok_or("$skip must be a non-negative integer")?;
                docs.into_iter().skip(n as usize).collect()
            }
            "$limit" => {
                let n = spec.as_u64().ok_or("$limit must be a non-negative integer")?;
                docs.into_iter().take(n as usize).collect()
            }
            "$project" => docs
                .iter()
                .map(|doc| project(doc, spec))
                .collect::<Result<Vec<_>, _>>()?,
            "$count" => {
                let field = spec.as_str().ok_or("$count expects a field name")?;
                let mut counted = Map::new();
                counted.insert(field.to_string(), json!(docs.len()));
                vec![Value::Object(counted)]
            }
            other => return Err(format!("unsupported pipeline stage {}", other)),
        };
    }

    Ok(docs.into_iter().map(row).collect())
}
