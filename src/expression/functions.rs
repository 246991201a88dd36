//! Builtin functions
//!
//! A fixed, closed set. Names outside it are rejected with `UnknownFunction`.

use chrono::Utc;
use serde_json::Value;
use uuid::Uuid;

use super::value::ExprValue;

/// Builtin function identifiers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Builtin {
    /// `default(value, fallback)`
    Default,
    /// `now()`
    Now,
    /// `uuid()`
    Uuid,
}

impl Builtin {
    /// Look a function up by name
    pub fn lookup(name: &str) -> Option<Self> {
        match name {
            "default" => Some(Builtin::Default),
            "now" => Some(Builtin::Now),
            "uuid" => Some(Builtin::Uuid),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Builtin::Default => "default",
            Builtin::Now => "now",
            Builtin::Uuid => "uuid",
        }
    }

    /// Number of arguments the function takes
    pub fn arity(&self) -> usize {
        match self {
            Builtin::Default => 2,
            Builtin::Now | Builtin::Uuid => 0,
        }
    }

    /// Apply the function to evaluated arguments. Arity is checked by the parser.
    pub fn call(&self, args: Vec<ExprValue>) -> ExprValue {
        match self {
            Builtin::Default => {
                let mut args = args.into_iter();
                let value = args.next().unwrap_or(ExprValue::Undefined);
                let fallback = args.next().unwrap_or(ExprValue::Undefined);
                if value.is_nullish() {
                    fallback
                } else {
                    value
                }
            }
            Builtin::Now => ExprValue::Timestamp(Utc::now()),
            Builtin::Uuid => ExprValue::Json(Value::String(Uuid::new_v4().to_string())),
        }
    }
}
