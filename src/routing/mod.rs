//! # Routing
//!
//! Route definitions are compiled once at boot into [`CompiledRoute`]s and
//! matched per request by method and path.

pub mod compiler;
pub mod definition;

pub use compiler::{compile, compile_path, match_route, CompiledRoute, RouteMatch};
pub use definition::RouteDefinition;
