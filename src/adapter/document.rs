//! Structured-query (document store) adapter
//!
//! Templates are objects naming a `collection` plus exactly one of
//! `operation` or `pipeline`:
//!
//! ```json
//! { "collection": "users", "operation": "findOne", "filter": { "_id": "${{ path.id }}" } }
//! ```
//!
//! Interpolation walks every string leaf of the value sections. A leaf that
//! is exactly one expression keeps the resolved value's type; an expression
//! embedded in surrounding text is spliced in as text. `collection` and
//! `operation` are never interpolated.

use std::fmt;
use std::sync::Arc;

use serde_json::{json, Map, Value};
use tracing::debug;

use crate::error::{RouterError, RouterResult};
use crate::expression::{Evaluator, RequestContext};

use super::{AdapterFuture, Artifact, DatabaseAdapter, DriverFuture};

/// Template keys that may carry expressions
const VALUE_SECTIONS: [&str; 6] = ["filter", "update", "document", "documents", "options", "pipeline"];

/// Supported document operations
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentOperation {
    Find,
    FindOne,
    CountDocuments,
    InsertOne,
    InsertMany,
    UpdateOne,
    UpdateMany,
    DeleteOne,
    DeleteMany,
    FindOneAndUpdate,
    FindOneAndDelete,
    /// Selected by a `pipeline` template rather than by name
    Aggregate,
}

impl DocumentOperation {
    /// Look up an `operation` name. `aggregate` is only reachable through `pipeline`.
    pub fn from_name(name: &str) -> Option<Self> {
        Some(match name {
            "find" => DocumentOperation::Find,
            "findOne" => DocumentOperation::FindOne,
            "countDocuments" => DocumentOperation::CountDocuments,
            "insertOne" => DocumentOperation::InsertOne,
            "insertMany" => DocumentOperation::InsertMany,
            "updateOne" => DocumentOperation::UpdateOne,
            "updateMany" => DocumentOperation::UpdateMany,
            "deleteOne" => DocumentOperation::DeleteOne,
            "deleteMany" => DocumentOperation::DeleteMany,
            "findOneAndUpdate" => DocumentOperation::FindOneAndUpdate,
            "findOneAndDelete" => DocumentOperation::FindOneAndDelete,
            _ => return None,
        })
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentOperation::Find => "find",
            DocumentOperation::FindOne => "findOne",
            DocumentOperation::CountDocuments => "countDocuments",
            DocumentOperation::InsertOne => "insertOne",
            DocumentOperation::InsertMany => "insertMany",
            DocumentOperation::UpdateOne => "updateOne",
            DocumentOperation::UpdateMany => "updateMany",
            DocumentOperation::DeleteOne => "deleteOne",
            DocumentOperation::DeleteMany => "deleteMany",
            DocumentOperation::FindOneAndUpdate => "findOneAndUpdate",
            DocumentOperation::FindOneAndDelete => "findOneAndDelete",
            DocumentOperation::Aggregate => "aggregate",
        }
    }

    /// Template sections the operation must declare
    pub fn required_sections(&self) -> &'static [&'static str] {
        match self {
            DocumentOperation::InsertOne => &["document"],
            DocumentOperation::InsertMany => &["documents"],
            DocumentOperation::UpdateOne
            | DocumentOperation::UpdateMany
            | DocumentOperation::FindOneAndUpdate => &["update"],
            DocumentOperation::Aggregate => &["pipeline"],
            _ => &[],
        }
    }

    /// Sections that form the call's argument tuple, in order
    pub fn argument_sections(&self) -> &'static [&'static str] {
        match self {
            DocumentOperation::Find
            | DocumentOperation::FindOne
            | DocumentOperation::CountDocuments
            | DocumentOperation::DeleteOne
            | DocumentOperation::DeleteMany
            | DocumentOperation::FindOneAndDelete => &["filter", "options"],
            DocumentOperation::InsertOne => &["document", "options"],
            DocumentOperation::InsertMany => &["documents", "options"],
            DocumentOperation::UpdateOne
            | DocumentOperation::UpdateMany
            | DocumentOperation::FindOneAndUpdate => &["filter", "update", "options"],
            DocumentOperation::Aggregate => &["pipeline", "options"],
        }
    }
}

impl fmt::Display for DocumentOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Interpolated document command: collection, operation and argument tuple
#[derive(Debug, Clone, PartialEq)]
pub struct DocumentCommand {
    pub collection: String,
    pub operation: DocumentOperation,
    pub args: Vec<Value>,
}

impl DocumentCommand {
    /// Argument at `index`, or `null`
    pub fn arg(&self, index: usize) -> &Value {
        self.args.get(index).unwrap_or(&Value::Null)
    }
}

/// Engine driver behind a [`DocumentAdapter`]
pub trait DocumentDriver: Send + Sync {
    /// Run the command and return its results as rows
    fn run<'a>(&'a self, command: &'a DocumentCommand) -> DriverFuture<'a>;
}

/// Adapter for document stores
pub struct DocumentAdapter {
    driver: Arc<dyn DocumentDriver>,
}

impl DocumentAdapter {
    pub fn new(driver: impl DocumentDriver + 'static) -> Self {
        Self::from_shared(Arc::new(driver))
    }

    pub fn from_shared(driver: Arc<dyn DocumentDriver>) -> Self {
        Self { driver }
    }

    /// Build the command from an interpolated template
    fn build_command(template: &Map<String, Value>) -> RouterResult<DocumentCommand> {
        let collection = template
            .get("collection")
            .and_then(Value::as_str)
            .ok_or_else(|| RouterError::validation("document query requires a collection"))?
            .to_string();

        let operation = operation_of(template).map_err(RouterError::Validation)?;

        let mut args = Vec::with_capacity(operation.argument_sections().len());
        for section in operation.argument_sections() {
            let value = template.get(*section).cloned().unwrap_or(Value::Null);
            args.push(normalize_argument(operation, section, value)?);
        }

        Ok(DocumentCommand {
            collection,
            operation,
            args,
        })
    }
}

/// Resolve the operation a template declares
fn operation_of(template: &Map<String, Value>) -> Result<DocumentOperation, String> {
    match (template.get("operation"), template.get("pipeline")) {
        (Some(_), Some(_)) => Err("document query must not have both operation and pipeline".into()),
        (None, None) => Err("document query requires an operation or a pipeline".into()),
        (None, Some(_)) => Ok(DocumentOperation::Aggregate),
        (Some(Value::String(name)), None) => DocumentOperation::from_name(name)
            .ok_or_else(|| format!("unsupported document operation '{}'", name)),
        (Some(other), None) => Err(format!("operation must be a string, got {}", other)),
    }
}

/// Apply defaults and check the resolved type of one argument
fn normalize_argument(
    operation: DocumentOperation,
    section: &str,
    value: Value,
) -> RouterResult<Value> {
    let wrong_type = |expected: &str, got: &Value| {
        RouterError::validation(format!(
            "{} {} must resolve to {}, got {}",
            operation, section, expected, got
        ))
    };

    match section {
        "filter" => match value {
            Value::Null => Ok(json!({})),
            Value::Object(_) => Ok(value),
            other => Err(wrong_type("an object", &other)),
        },
        "options" => {
            let mut options = match value {
                Value::Null => Map::new(),
                Value::Object(map) => map,
                other => return Err(wrong_type("an object", &other)),
            };
            if operation == DocumentOperation::FindOneAndUpdate {
                options
                    .entry("returnDocument")
                    .or_insert_with(|| Value::String("after".to_string()));
            }
            Ok(Value::Object(options))
        }
        "document" | "update" => match value {
            Value::Object(_) => Ok(value),
            other => Err(wrong_type("an object", &other)),
        },
        "documents" | "pipeline" => match value {
            Value::Array(_) => Ok(value),
            other => Err(wrong_type("an array", &other)),
        },
        _ => Ok(value),
    }
}

/// Interpolate every string leaf of `value`
pub fn interpolate_value(
    value: &Value,
    ctx: &RequestContext,
    evaluator: &Evaluator,
) -> RouterResult<Value> {
    match value {
        Value::String(text) => interpolate_leaf(text, ctx, evaluator),
        Value::Array(items) => items
            .iter()
            .map(|item| interpolate_value(item, ctx, evaluator))
            .collect::<RouterResult<Vec<_>>>()
            .map(Value::Array),
        Value::Object(map) => map
            .iter()
            .map(|(k, v)| Ok((k.clone(), interpolate_value(v, ctx, evaluator)?)))
            .collect::<RouterResult<Map<_, _>>>()
            .map(Value::Object),
        other => Ok(other.clone()),
    }
}

fn interpolate_leaf(text: &str, ctx: &RequestContext, evaluator: &Evaluator) -> RouterResult<Value> {
    let refs = evaluator.parse_expressions(text);

    match refs.as_slice() {
        [] => Ok(Value::String(text.to_string())),
        [only] if only.start == 0 && only.end == text.len() => Ok(evaluator
            .evaluate_reference(&only.inner_text, ctx)?
            .to_document_value()),
        _ => {
            let mut out = String::with_capacity(text.len());
            let mut cursor = 0;
            for reference in &refs {
                out.push_str(&text[cursor..reference.start]);
                out.push_str(&evaluator.evaluate_reference(&reference.inner_text, ctx)?.to_text());
                cursor = reference.end;
            }
            out.push_str(&text[cursor..]);
            Ok(Value::String(out))
        }
    }
}

impl DatabaseAdapter for DocumentAdapter {
    fn kind(&self) -> &'static str {
        "document"
    }

    fn validate_query(&self, template: &Value) -> Result<(), String> {
        let template = template
            .as_object()
            .ok_or_else(|| "document query must be an object".to_string())?;

        match template.get("collection") {
            Some(Value::String(name)) if !name.trim().is_empty() => {}
            Some(_) => return Err("collection must be a non-empty string".to_string()),
            None => return Err("document query requires a collection".to_string()),
        }

        let operation = operation_of(template)?;

        for section in operation.required_sections() {
            match template.get(*section) {
                None | Some(Value::Null) => {
                    return Err(format!("{} requires a {}", operation, section));
                }
                Some(_) => {}
            }
        }

        for (key, value) in template {
            let expected_array = matches!(key.as_str(), "documents" | "pipeline");
            let shape_ok = match value {
                // a whole-leaf expression can resolve to any shape
                Value::String(_) => VALUE_SECTIONS.contains(&key.as_str()) && key != "pipeline",
                Value::Array(_) => expected_array,
                Value::Object(_) => !expected_array,
                Value::Null => true,
                _ => false,
            };
            match key.as_str() {
                "collection" | "operation" => {}
                section if VALUE_SECTIONS.contains(&section) => {
                    if !shape_ok {
                        return Err(format!("{} has an invalid shape", section));
                    }
                }
                unknown => return Err(format!("unknown document query field '{}'", unknown)),
            }
        }

        if let Some(Value::Array(stages)) = template.get("pipeline") {
            for stage in stages {
                match stage.as_object() {
                    Some(map) if map.len() == 1 => {}
                    _ => return Err("each pipeline stage must be an object with one key".to_string()),
                }
            }
        }

        Ok(())
    }

    fn interpolate(
        &self,
        template: &Value,
        ctx: &RequestContext,
        evaluator: &Evaluator,
    ) -> RouterResult<Artifact> {
        let source = template
            .as_object()
            .ok_or_else(|| RouterError::validation("document query must be an object"))?;

        let mut resolved = Map::new();
        for (key, value) in source {
            let value = if VALUE_SECTIONS.contains(&key.as_str()) {
                interpolate_value(value, ctx, evaluator)?
            } else {
                value.clone()
            };
            resolved.insert(key.clone(), value);
        }

        Self::build_command(&resolved).map(Artifact::Document)
    }

    fn execute(&self, artifact: Artifact) -> AdapterFuture<'_> {
        Box::pin(async move {
            let Artifact::Document(command) = artifact else {
                return Err(RouterError::validation(
                    "document adapter received a non-document artifact",
                ));
            };

            debug!(
                collection = %command.collection,
                operation = %command.operation,
                "executing document command"
            );
            self.driver.run(&command).await.map_err(|e| {
                RouterError::query(
                    format!("{} on {} failed", command.operation, command.collection),
                    e,
                )
            })
        })
    }
}
