//! aeroquery - declarative HTTP routes over SQL and document stores
//!
//! Route definitions pair an HTTP operation with a query template whose
//! `${{ ... }}` expressions read the request. The [`router::Router`]
//! matches a request, evaluates the template through a database adapter,
//! executes it and shapes the rows into the response body.

pub mod adapter;
pub mod cli;
pub mod error;
pub mod expression;
pub mod http_server;
pub mod observability;
pub mod router;
pub mod routing;
pub mod shaper;

pub use error::{RouterError, RouterResult};
