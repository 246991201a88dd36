//! # HTTP Server Module
//!
//! Serves a request router over HTTP with axum. Requests that match no
//! route get a `404` with code `ROUTE_NOT_FOUND`; router failures use the
//! error's own status and code.

pub mod config;
pub mod server;

pub use config::HttpServerConfig;
pub use server::HttpServer;
