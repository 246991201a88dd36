//! CLI argument definitions using clap
//!
//! Commands:
//! - aeroquery serve --config <path> [--port <port>]
//! - aeroquery check --config <path>
//! - aeroquery routes --config <path>

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// aeroquery - declarative HTTP routes over SQL and document stores
#[derive(Parser, Debug)]
#[command(name = "aeroquery")]
#[command(version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Boot the router and serve HTTP
    Serve {
        /// Path to configuration file
        #[arg(long, default_value = "./aeroquery.json")]
        config: PathBuf,

        /// Override the configured port
        #[arg(long)]
        port: Option<u16>,
    },

    /// Load the configuration and run every boot check, then exit
    Check {
        /// Path to configuration file
        #[arg(long, default_value = "./aeroquery.json")]
        config: PathBuf,
    },

    /// Print the compiled route table
    Routes {
        /// Path to configuration file
        #[arg(long, default_value = "./aeroquery.json")]
        config: PathBuf,
    },
}

impl Cli {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Cli::parse()
    }
}
