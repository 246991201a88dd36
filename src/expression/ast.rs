//! Expression token tree
//!
//! Built once by the parser and walked once by the evaluator.

use std::fmt;
use std::str::FromStr;

use serde_json::Value;

use super::functions::Builtin;

/// The fixed request-data sources an expression can address
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Namespace {
    Path,
    Query,
    Body,
    Auth,
}

impl Namespace {
    pub fn as_str(&self) -> &'static str {
        match self {
            Namespace::Path => "path",
            Namespace::Query => "query",
            Namespace::Body => "body",
            Namespace::Auth => "auth",
        }
    }
}

impl FromStr for Namespace {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "path" => Ok(Namespace::Path),
            "query" => Ok(Namespace::Query),
            "body" => Ok(Namespace::Body),
            "auth" => Ok(Namespace::Auth),
            _ => Err(()),
        }
    }
}

impl fmt::Display for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// `namespace.seg1.seg2...`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VariablePath {
    pub namespace: Namespace,
    pub segments: Vec<String>,
}

/// A parsed expression
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// Reference into the request context
    Variable(VariablePath),
    /// Builtin function call with already-parsed arguments
    Call { function: Builtin, args: Vec<Expr> },
    /// String, number or `null` literal
    Literal(Value),
}

impl Expr {
    /// True if any variable in this tree reads a property of `namespace`
    pub fn reads_property_of(&self, namespace: Namespace) -> bool {
        match self {
            Expr::Variable(path) => path.namespace == namespace && !path.segments.is_empty(),
            Expr::Call { args, .. } => args.iter().any(|arg| arg.reads_property_of(namespace)),
            Expr::Literal(_) => false,
        }
    }
}
