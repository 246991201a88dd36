//! # Observability
//!
//! Structured logging through `tracing`. Lifecycle log lines carry an
//! `event` field from [`Event`]:
//!
//! ```ignore
//! use aeroquery::observability::{init_logging, Event, LogFormat};
//!
//! init_logging(LogFormat::Json);
//! tracing::info!(event = %Event::BootComplete, routes = 12, "ready");
//! ```

mod events;

pub use events::Event;

use serde::{Deserialize, Serialize};
use tracing_subscriber::EnvFilter;

/// Log output format
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable lines
    #[default]
    Pretty,
    /// One JSON object per line
    Json,
}

/// Install the global subscriber. `RUST_LOG` overrides the `info` default.
///
/// Calling this more than once keeps the first subscriber.
pub fn init_logging(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false);

    let _ = match format {
        LogFormat::Pretty => builder.try_init(),
        LogFormat::Json => builder.json().try_init(),
    };
}
