//! CLI module for aeroquery
//!
//! Provides command-line interface for:
//! - serve: Boot the router and host it over HTTP
//! - check: Validate configuration and route templates
//! - routes: Print the compiled route table

mod args;
mod commands;
mod config;
mod errors;

pub use args::{Cli, Command};
pub use commands::{check, route_table, routes, run, run_command, serve};
pub use config::{AdapterConfig, AuthConfig, Config};
pub use errors::{CliError, CliErrorCode, CliResult};
