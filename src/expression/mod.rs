//! # Expression Language
//!
//! Templates embed `${{ ... }}` expressions that pull untrusted request data
//! into a query. An expression is either a variable reference
//! (`path.id`, `query.status`, `body.user.name`, `auth.tenantId`) or a call
//! to one of the builtins `default`, `now` and `uuid`:
//!
//! ```text
//! SELECT * FROM t WHERE id = ${{ path.id }} AND s = ${{ default(query.status, 'active') }}
//! ```
//!
//! Expressions are only ever evaluated to values. Adapters decide how the
//! values reach the engine; none of them splice user text into the control
//! portion of a query.

pub mod ast;
pub mod context;
pub mod evaluator;
pub mod functions;
pub mod parser;
pub mod scanner;
pub mod value;

pub use ast::{Expr, Namespace, VariablePath};
pub use context::{QueryValue, RequestContext};
pub use evaluator::{Evaluator, CLOSE_DELIMITER, OPEN_DELIMITER};
pub use functions::Builtin;
pub use scanner::ExpressionRef;
pub use value::ExprValue;
