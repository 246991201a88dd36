//! Flat-query (SQL) adapter
//!
//! Each expression in the template is replaced by a positional placeholder
//! and its value is appended to an ordered list, strictly left to right.
//! User data only ever travels in that list.

use std::sync::Arc;

use serde_json::Value;
use tracing::debug;

use crate::error::{RouterError, RouterResult};
use crate::expression::{Evaluator, ExprValue, RequestContext};

use super::{AdapterFuture, Artifact, DatabaseAdapter, DriverFuture};

/// Placeholder dialect
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Placeholder {
    /// `$1`, `$2`, ... (Postgres)
    #[default]
    Numbered,
    /// `?` (MySQL, SQLite)
    Positional,
}

impl Placeholder {
    /// Placeholder text for the `n`th value (1-based)
    pub fn render(&self, n: usize) -> String {
        match self {
            Placeholder::Numbered => format!("${}", n),
            Placeholder::Positional => "?".to_string(),
        }
    }
}

/// Interpolated SQL: query text plus values in placeholder order
#[derive(Debug, Clone, PartialEq)]
pub struct SqlQuery {
    pub text: String,
    pub values: Vec<ExprValue>,
}

/// Engine driver behind a [`SqlAdapter`]
pub trait SqlDriver: Send + Sync {
    /// Run the statement and return every row
    fn fetch_all<'a>(&'a self, query: &'a SqlQuery) -> DriverFuture<'a>;
}

/// Adapter for engines that take a query string plus positional values
pub struct SqlAdapter {
    driver: Arc<dyn SqlDriver>,
    placeholder: Placeholder,
}

impl SqlAdapter {
    /// Create an adapter with numbered placeholders
    pub fn new(driver: impl SqlDriver + 'static) -> Self {
        Self::from_shared(Arc::new(driver))
    }

    /// Create an adapter over a shared driver
    pub fn from_shared(driver: Arc<dyn SqlDriver>) -> Self {
        Self {
            driver,
            placeholder: Placeholder::default(),
        }
    }

    /// Use a different placeholder dialect
    pub fn with_placeholder(mut self, placeholder: Placeholder) -> Self {
        self.placeholder = placeholder;
        self
    }

    /// Interpolate a SQL template string
    pub fn interpolate_sql(
        &self,
        template: &str,
        ctx: &RequestContext,
        evaluator: &Evaluator,
    ) -> RouterResult<SqlQuery> {
        let mut text = String::with_capacity(template.len());
        let mut values = Vec::new();
        let mut cursor = 0;

        for reference in evaluator.parse_expressions(template) {
            text.push_str(&template[cursor..reference.start]);
            values.push(evaluator.evaluate_reference(&reference.inner_text, ctx)?);
            text.push_str(&self.placeholder.render(values.len()));
            cursor = reference.end;
        }
        text.push_str(&template[cursor..]);

        Ok(SqlQuery { text, values })
    }
}

impl DatabaseAdapter for SqlAdapter {
    fn kind(&self) -> &'static str {
        "sql"
    }

    fn validate_query(&self, template: &Value) -> Result<(), String> {
        match template {
            Value::String(s) if !s.trim().is_empty() => Ok(()),
            Value::String(_) => Err("SQL query must not be empty".to_string()),
            _ => Err("SQL query must be a string".to_string()),
        }
    }

    fn interpolate(
        &self,
        template: &Value,
        ctx: &RequestContext,
        evaluator: &Evaluator,
    ) -> RouterResult<Artifact> {
        let template = template
            .as_str()
            .ok_or_else(|| RouterError::validation("SQL query must be a string"))?;
        self.interpolate_sql(template, ctx, evaluator)
            .map(Artifact::Sql)
    }

    fn execute(&self, artifact: Artifact) -> AdapterFuture<'_> {
        Box::pin(async move {
            let Artifact::Sql(query) = artifact else {
                return Err(RouterError::validation(
                    "SQL adapter received a non-SQL artifact",
                ));
            };

            debug!(sql = %query.text, params = query.values.len(), "executing SQL");
            self.driver
                .fetch_all(&query)
                .await
                .map_err(|e| RouterError::query("SQL statement failed", e))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapter::RowSet;
    use crate::error::DriverError;
    use serde_json::json;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingDriver {
        seen: Mutex<Vec<SqlQuery>>,
    }

    impl SqlDriver for RecordingDriver {
        fn fetch_all<'a>(&'a self, query: &'a SqlQuery) -> DriverFuture<'a> {
            Box::pin(async move {
                self.seen.lock().unwrap().push(query.clone());
                let row = json!({"ok": true}).as_object().cloned().unwrap();
                Ok::<RowSet, DriverError>(vec![row])
            })
        }
    }

    struct FailingDriver;

    impl SqlDriver for FailingDriver {
        fn fetch_all<'a>(&'a self, _query: &'a SqlQuery) -> DriverFuture<'a> {
            Box::pin(async { Err(DriverError::from("relation \"t\" does not exist")) })
        }
    }

    fn scenario_ctx() -> RequestContext {
        RequestContext::new().with_path("id", "7")
    }

    const SCENARIO: &str = "SELECT * FROM t WHERE id = ${{ path.id }} AND s = ${{ default(query.status, 'active') }}";

    #[test]
    fn test_numbered_placeholders_in_order() {
        let adapter = SqlAdapter::new(RecordingDriver::default());
        let query = adapter
            .interpolate_sql(SCENARIO, &scenario_ctx(), &Evaluator::new())
            .unwrap();

        assert_eq!(query.text, "SELECT * FROM t WHERE id = $1 AND s = $2");
        assert_eq!(
            query.values,
            vec![ExprValue::Json(json!("7")), ExprValue::Json(json!("active"))]
        );
    }

    #[test]
    fn test_positional_placeholders() {
        let adapter =
            SqlAdapter::new(RecordingDriver::default()).with_placeholder(Placeholder::Positional);
        let query = adapter
            .interpolate_sql(SCENARIO, &scenario_ctx(), &Evaluator::new())
            .unwrap();
        assert_eq!(query.text, "SELECT * FROM t WHERE id = ? AND s = ?");
        assert_eq!(query.values.len(), 2);
    }

    #[test]
    fn test_user_text_never_reaches_query_text() {
        let adapter = SqlAdapter::new(RecordingDriver::default());
        let ctx = RequestContext::new().with_path("id", "1; DROP TABLE users; --");
        let query = adapter
            .interpolate_sql("SELECT * FROM users WHERE id = ${{ path.id }}", &ctx, &Evaluator::new())
            .unwrap();

        assert_eq!(query.text, "SELECT * FROM users WHERE id = $1");
        assert!(!query.text.contains("DROP"));
        assert_eq!(query.values, vec![ExprValue::Json(json!("1; DROP TABLE users; --"))]);
    }

    #[test]
    fn test_template_without_expressions() {
        let adapter = SqlAdapter::new(RecordingDriver::default());
        let query = adapter
            .interpolate_sql("SELECT 1", &RequestContext::new(), &Evaluator::new())
            .unwrap();
        assert_eq!(query.text, "SELECT 1");
        assert!(query.values.is_empty());
    }

    #[test]
    fn test_validate_query_shape() {
        let adapter = SqlAdapter::new(RecordingDriver::default());
        assert!(adapter.validate_query(&json!("SELECT 1")).is_ok());
        assert!(adapter.validate_query(&json!("  ")).is_err());
        assert!(adapter.validate_query(&json!({"collection": "x"})).is_err());
    }

    #[tokio::test]
    async fn test_execute_passes_artifact_to_driver() {
        let driver = Arc::new(RecordingDriver::default());
        let adapter = SqlAdapter::from_shared(driver.clone());
        let artifact = adapter
            .interpolate(&json!(SCENARIO), &scenario_ctx(), &Evaluator::new())
            .unwrap();

        let rows = adapter.execute(artifact).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(driver.seen.lock().unwrap()[0].values.len(), 2);
    }

    #[tokio::test]
    async fn test_driver_failure_becomes_query_error() {
        let adapter = SqlAdapter::new(FailingDriver);
        let artifact = Artifact::Sql(SqlQuery {
            text: "SELECT * FROM t".into(),
            values: vec![],
        });

        let err = adapter.execute(artifact).await.unwrap_err();
        assert_eq!(err.code(), "QUERY_ERROR");
        assert_eq!(err.detail().as_deref(), Some("relation \"t\" does not exist"));
    }
}
