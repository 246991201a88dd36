//! Postgres driver for the SQL adapter
//!
//! Values travel as typed binds. Strings bind as `text`, so templates cast
//! where the column type differs (`WHERE id = ${{ path.id }}::int`).

use serde_json::{Map, Number, Value};
use sqlx::postgres::{PgArguments, PgPool, PgPoolOptions, PgRow};
use sqlx::query::Query;
use sqlx::{Column, Postgres, Row, TypeInfo, ValueRef};

use crate::error::DriverError;
use crate::expression::ExprValue;

use super::sql::{SqlDriver, SqlQuery};
use super::{DriverFuture, RowSet};

/// How one evaluated value is bound
#[derive(Debug, Clone, PartialEq)]
pub enum PgBind {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    TextArray(Vec<String>),
    Json(Value),
    Timestamp(chrono::DateTime<chrono::Utc>),
}

impl PgBind {
    /// Pick the Postgres representation of an evaluated value
    pub fn from_value(value: &ExprValue) -> Self {
        match value {
            ExprValue::Undefined | ExprValue::Json(Value::Null) => PgBind::Null,
            ExprValue::Json(Value::Bool(b)) => PgBind::Bool(*b),
            ExprValue::Json(Value::Number(n)) => match n.as_i64() {
                Some(i) => PgBind::Int(i),
                None => n.as_f64().map_or(PgBind::Null, PgBind::Float),
            },
            ExprValue::Json(Value::String(s)) => PgBind::Text(s.clone()),
            ExprValue::Json(Value::Array(items)) if items.iter().all(Value::is_string) => {
                PgBind::TextArray(
                    items
                        .iter()
                        .filter_map(|item| item.as_str().map(str::to_string))
                        .collect(),
                )
            }
            ExprValue::Json(other) => PgBind::Json(other.clone()),
            ExprValue::Timestamp(ts) => PgBind::Timestamp(*ts),
        }
    }

    fn bind<'q>(self, query: Query<'q, Postgres, PgArguments>) -> Query<'q, Postgres, PgArguments> {
        match self {
            PgBind::Null => query.bind(None::<String>),
            PgBind::Bool(b) => query.bind(b),
            PgBind::Int(i) => query.bind(i),
            PgBind::Float(f) => query.bind(f),
            PgBind::Text(s) => query.bind(s),
            PgBind::TextArray(items) => query.bind(items),
            PgBind::Json(v) => query.bind(sqlx::types::Json(v)),
            PgBind::Timestamp(ts) => query.bind(ts),
        }
    }
}

/// [`SqlDriver`] backed by a sqlx connection pool
#[derive(Debug, Clone)]
pub struct PgDriver {
    pool: PgPool,
}

impl PgDriver {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Create a pool that connects on first use. Must run inside a tokio runtime.
    pub fn connect_lazy(url: &str, max_connections: u32) -> Result<Self, sqlx::Error> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect_lazy(url)?;
        Ok(Self::new(pool))
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

impl SqlDriver for PgDriver {
    fn fetch_all<'a>(&'a self, query: &'a SqlQuery) -> DriverFuture<'a> {
        Box::pin(async move {
            let statement = query
                .values
                .iter()
                .map(PgBind::from_value)
                .fold(sqlx::query(&query.text), |q, bind| bind.bind(q));

            let rows = statement.fetch_all(&self.pool).await?;
            rows.iter().map(decode_row).collect::<Result<RowSet, DriverError>>()
        })
    }
}

/// Decode one row column by column, keyed by column name
fn decode_row(row: &PgRow) -> Result<Map<String, Value>, DriverError> {
    let mut out = Map::with_capacity(row.len());
    for (idx, column) in row.columns().iter().enumerate() {
        let value = decode_column(row, idx, column.type_info().name()).map_err(|err| {
            format!(
                "Unsupported column type {} for column '{}': {}",
                column.type_info().name(),
                column.name(),
                err
            )
        })?;
        out.insert(column.name().to_string(), value);
    }
    Ok(out)
}

fn decode_column(row: &PgRow, idx: usize, type_name: &str) -> Result<Value, sqlx::Error> {
    if row.try_get_raw(idx)?.is_null() {
        return Ok(Value::Null);
    }

    let value = match type_name {
        "BOOL" => Value::Bool(row.try_get::<bool, _>(idx)?),
        "INT2" => Value::from(row.try_get::<i16, _>(idx)?),
        "INT4" => Value::from(row.try_get::<i32, _>(idx)?),
        "INT8" => Value::from(row.try_get::<i64, _>(idx)?),
        "FLOAT4" => float(row.try_get::<f32, _>(idx)? as f64),
        "FLOAT8" => float(row.try_get::<f64, _>(idx)?),
        "TEXT" | "VARCHAR" | "BPCHAR" | "NAME" => Value::String(row.try_get::<String, _>(idx)?),
        "UUID" => Value::String(row.try_get::<uuid::Uuid, _>(idx)?.to_string()),
        "JSON" | "JSONB" => row.try_get::<Value, _>(idx)?,
        "TIMESTAMPTZ" => Value::String(
            row.try_get::<chrono::DateTime<chrono::Utc>, _>(idx)?
                .to_rfc3339_opts(chrono::SecondsFormat::Millis, true),
        ),
        "TIMESTAMP" => Value::String(
            row.try_get::<chrono::NaiveDateTime, _>(idx)?
                .format("%Y-%m-%dT%H:%M:%S%.3f")
                .to_string(),
        ),
        "DATE" => Value::String(row.try_get::<chrono::NaiveDate, _>(idx)?.to_string()),
        "TEXT[]" | "VARCHAR[]" => Value::from(row.try_get::<Vec<String>, _>(idx)?),
        "INT4[]" => Value::from(row.try_get::<Vec<i32>, _>(idx)?),
        "INT8[]" => Value::from(row.try_get::<Vec<i64>, _>(idx)?),
        "BOOL[]" => Value::from(row.try_get::<Vec<bool>, _>(idx)?),
        _ => Value::String(row.try_get::<String, _>(idx)?),
    };
    Ok(value)
}

fn float(f: f64) -> Value {
    Number::from_f64(f).map_or(Value::Null, Value::Number)
}
