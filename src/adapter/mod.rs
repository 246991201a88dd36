//! # Database Adapters
//!
//! One adapter per engine. Every adapter implements the same three
//! operations, so the router never special-cases an engine:
//!
//! - `validate_query`: boot-time structural check of a route's template
//! - `interpolate`: template + request context → parameter-safe [`Artifact`]
//! - `execute`: run the artifact and return a uniform [`RowSet`]
//!
//! Adapters are registered by name in an [`AdapterSet`].

pub mod document;
pub mod filter;
pub mod memory;
pub mod postgres;
pub mod sql;

use std::collections::BTreeMap;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use serde_json::{Map, Value};

use crate::error::{DriverError, RouterError, RouterResult};
use crate::expression::{Evaluator, RequestContext};

pub use document::{DocumentAdapter, DocumentCommand, DocumentDriver, DocumentOperation};
pub use memory::MemoryDocumentStore;
pub use postgres::PgDriver;
pub use sql::{Placeholder, SqlAdapter, SqlDriver, SqlQuery};

/// One result row
pub type Row = Map<String, Value>;

/// Uniform execution result for every engine
pub type RowSet = Vec<Row>;

/// Future returned by [`DatabaseAdapter::execute`]
pub type AdapterFuture<'a> = Pin<Box<dyn Future<Output = RouterResult<RowSet>> + Send + 'a>>;

/// Future returned by engine drivers
pub type DriverFuture<'a> = Pin<Box<dyn Future<Output = Result<RowSet, DriverError>> + Send + 'a>>;

/// Execution-ready form of a template, produced per request
#[derive(Debug, Clone, PartialEq)]
pub enum Artifact {
    /// Flat query text plus ordered values
    Sql(SqlQuery),
    /// Collection, operation and argument tuple
    Document(DocumentCommand),
}

/// The three-operation adapter contract
pub trait DatabaseAdapter: Send + Sync {
    /// Short engine name for logs
    fn kind(&self) -> &'static str;

    /// Structural check run once per route at boot. Never resolves placeholders.
    fn validate_query(&self, template: &Value) -> Result<(), String>;

    /// Evaluate every expression in `template` and build the artifact
    fn interpolate(
        &self,
        template: &Value,
        ctx: &RequestContext,
        evaluator: &Evaluator,
    ) -> RouterResult<Artifact>;

    /// Run the artifact. Engine failures surface as `RouterError::Query`.
    fn execute(&self, artifact: Artifact) -> AdapterFuture<'_>;
}

/// Named adapters configured for a router
#[derive(Clone, Default)]
pub struct AdapterSet {
    adapters: BTreeMap<String, Arc<dyn DatabaseAdapter>>,
}

impl AdapterSet {
    /// Create an empty set
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an adapter under `name`
    pub fn with(mut self, name: impl Into<String>, adapter: impl DatabaseAdapter + 'static) -> Self {
        self.insert(name, Arc::new(adapter));
        self
    }

    /// Register an already shared adapter
    pub fn insert(&mut self, name: impl Into<String>, adapter: Arc<dyn DatabaseAdapter>) {
        self.adapters.insert(name.into(), adapter);
    }

    pub fn get(&self, name: &str) -> Option<&Arc<dyn DatabaseAdapter>> {
        self.adapters.get(name)
    }

    pub fn len(&self) -> usize {
        self.adapters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.adapters.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.adapters.keys().map(String::as_str)
    }

    /// Pick the adapter for a route.
    ///
    /// An explicit name must exist. Without one, exactly one adapter must be
    /// configured.
    pub fn select(
        &self,
        requested: Option<&str>,
    ) -> RouterResult<(&str, &Arc<dyn DatabaseAdapter>)> {
        match requested {
            Some(name) => self
                .adapters
                .get_key_value(name)
                .map(|(k, v)| (k.as_str(), v))
                .ok_or_else(|| {
                    RouterError::validation(format!(
                        "Unknown adapter '{}' (configured: {})",
                        name,
                        self.names().collect::<Vec<_>>().join(", ")
                    ))
                }),
            None => {
                let mut iter = self.adapters.iter();
                match (iter.next(), iter.next()) {
                    (Some((k, v)), None) => Ok((k.as_str(), v)),
                    (None, _) => Err(RouterError::validation("No adapters are configured")),
                    (Some(_), Some(_)) => Err(RouterError::validation(format!(
                        "Route must name an adapter: {} adapters are configured",
                        self.len()
                    ))),
                }
            }
        }
    }
}

impl fmt::Debug for AdapterSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map()
            .entries(self.adapters.iter().map(|(k, v)| (k, v.kind())))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn memory_adapter() -> DocumentAdapter {
        DocumentAdapter::new(MemoryDocumentStore::new())
    }

    #[test]
    fn test_select_single_adapter_implicitly() {
        let set = AdapterSet::new().with("docs", memory_adapter());
        let (name, adapter) = set.select(None).unwrap();
        assert_eq!(name, "docs");
        assert_eq!(adapter.kind(), "document");
    }

    #[test]
    fn test_select_explicit_adapter() {
        let set = AdapterSet::new()
            .with("a", memory_adapter())
            .with("b", memory_adapter());
        assert_eq!(set.select(Some("b")).unwrap().0, "b");
    }

    #[test]
    fn test_select_unknown_adapter_fails() {
        let set = AdapterSet::new().with("a", memory_adapter());
        let err = set.select(Some("missing")).err().unwrap();
        assert_eq!(err.code(), "VALIDATION_ERROR");
        assert!(err.to_string().contains("missing"));
    }

    #[test]
    fn test_select_ambiguous_fails() {
        let set = AdapterSet::new()
            .with("a", memory_adapter())
            .with("b", memory_adapter());
        assert!(set.select(None).is_err());
    }

    #[test]
    fn test_select_empty_fails() {
        assert!(AdapterSet::new().select(None).is_err());
    }
}
