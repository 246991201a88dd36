//! Lifecycle events
//!
//! Every log line carries one of these as its `event` field.

use std::fmt;

/// Observable events in the request router
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    // Boot & Lifecycle
    /// Startup begins
    BootStart,
    /// Startup complete, ready to serve
    BootComplete,
    /// Configuration loaded
    ConfigLoaded,
    /// Adapter registered under a name
    AdapterRegistered,
    /// One route compiled and validated
    RouteCompiled,
    /// HTTP listener bound
    ServerListening,

    // Request processing
    /// Request matched a route
    RequestMatched,
    /// No route for the request
    RequestUnmatched,
    /// Auth resolver produced a context
    AuthResolved,
    /// Auth resolver produced nothing
    AuthRejected,
    /// Adapter execution finished
    QueryExecuted,
    /// Adapter execution failed
    QueryFailed,
    /// Single-item extraction found nothing
    ResourceNotFound,
    /// Request finished with a response
    RequestComplete,
    /// Request finished with an error
    RequestFailed,
}

impl Event {
    pub fn as_str(&self) -> &'static str {
        match self {
            Event::BootStart => "BOOT_START",
            Event::BootComplete => "BOOT_COMPLETE",
            Event::ConfigLoaded => "CONFIG_LOADED",
            Event::AdapterRegistered => "ADAPTER_REGISTERED",
            Event::RouteCompiled => "ROUTE_COMPILED",
            Event::ServerListening => "SERVER_LISTENING",
            Event::RequestMatched => "REQUEST_MATCHED",
            Event::RequestUnmatched => "REQUEST_UNMATCHED",
            Event::AuthResolved => "AUTH_RESOLVED",
            Event::AuthRejected => "AUTH_REJECTED",
            Event::QueryExecuted => "QUERY_EXECUTED",
            Event::QueryFailed => "QUERY_FAILED",
            Event::ResourceNotFound => "RESOURCE_NOT_FOUND",
            Event::RequestComplete => "REQUEST_COMPLETE",
            Event::RequestFailed => "REQUEST_FAILED",
        }
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
