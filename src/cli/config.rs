//! Configuration file
//!
//! One JSON document describing the HTTP server, logging, auth, the named
//! adapters and the route definitions.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::info;

use crate::adapter::{AdapterSet, DocumentAdapter, MemoryDocumentStore, PgDriver, SqlAdapter};
use crate::http_server::HttpServerConfig;
use crate::observability::{Event, LogFormat};
use crate::router::{AuthResolver, JwtAuthResolver, JwtConfig, Router};
use crate::routing::RouteDefinition;

use super::errors::{CliError, CliResult};

fn default_max_connections() -> u32 {
    10
}

/// Auth section
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    pub jwt: JwtConfig,
}

/// One named adapter
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum AdapterConfig {
    /// SQL adapter over a Postgres pool
    Postgres {
        url: String,
        #[serde(default = "default_max_connections")]
        max_connections: u32,
    },
    /// Document adapter over an in-process store
    Memory {
        #[serde(default)]
        collections: BTreeMap<String, Vec<Value>>,
    },
}

impl AdapterConfig {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Postgres { .. } => "postgres",
            Self::Memory { .. } => "memory",
        }
    }
}

/// Configuration file structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: HttpServerConfig,

    #[serde(default)]
    pub log_format: LogFormat,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auth: Option<AuthConfig>,

    pub adapters: BTreeMap<String, AdapterConfig>,

    pub routes: Vec<RouteDefinition>,
}

impl Config {
    /// Load configuration from file
    pub fn load(path: &Path) -> CliResult<Self> {
        let content = fs::read_to_string(path)
            .map_err(|e| CliError::config_error(format!("Failed to read config: {}", e)))?;

        Self::from_json(&content)
    }

    /// Parse and validate configuration text
    pub fn from_json(content: &str) -> CliResult<Self> {
        let config: Config = serde_json::from_str(content)
            .map_err(|e| CliError::config_error(format!("Invalid config JSON: {}", e)))?;

        config.validate()?;

        Ok(config)
    }

    /// Structural checks; route semantics are checked when the router boots
    pub fn validate(&self) -> CliResult<()> {
        if self.adapters.is_empty() {
            return Err(CliError::config_error("At least one adapter is required"));
        }

        if self.routes.is_empty() {
            return Err(CliError::config_error("At least one route is required"));
        }

        if self.server.port == 0 {
            return Err(CliError::config_error("server.port must be > 0"));
        }

        if self.server.body_limit_bytes == 0 {
            return Err(CliError::config_error("server.body_limit_bytes must be > 0"));
        }

        if let Some(auth) = &self.auth {
            if auth.jwt.secret.is_empty() {
                return Err(CliError::config_error("auth.jwt.secret must not be empty"));
            }
        }

        for (name, adapter) in &self.adapters {
            if let AdapterConfig::Postgres {
                url,
                max_connections,
            } = adapter
            {
                if url.is_empty() {
                    return Err(CliError::config_error(format!("adapters.{}.url is empty", name)));
                }
                if *max_connections == 0 {
                    return Err(CliError::config_error(format!(
                        "adapters.{}.max_connections must be > 0",
                        name
                    )));
                }
            }
        }

        for route in &self.routes {
            if !(100..=599).contains(&route.status) {
                return Err(CliError::config_error(format!(
                    "Route {} {}: invalid status {}",
                    route.method, route.path, route.status
                )));
            }
        }

        Ok(())
    }

    /// Build every configured adapter.
    ///
    /// Postgres pools connect lazily, which needs a tokio runtime context.
    pub fn build_adapters(&self) -> CliResult<AdapterSet> {
        let mut adapters = AdapterSet::new();

        for (name, config) in &self.adapters {
            match config {
                AdapterConfig::Postgres {
                    url,
                    max_connections,
                } => {
                    let driver = PgDriver::connect_lazy(url, *max_connections).map_err(|e| {
                        CliError::boot_failed(format!("Adapter '{}': {}", name, e))
                    })?;
                    adapters.insert(name.clone(), Arc::new(SqlAdapter::new(driver)));
                }
                AdapterConfig::Memory { collections } => {
                    let store = MemoryDocumentStore::new();
                    for (collection, documents) in collections {
                        store.seed(collection, documents.iter().cloned()).map_err(|e| {
                            CliError::boot_failed(format!(
                                "Adapter '{}', collection '{}': {}",
                                name, collection, e
                            ))
                        })?;
                    }
                    adapters.insert(name.clone(), Arc::new(DocumentAdapter::new(store)));
                }
            }

            info!(
                event = %Event::AdapterRegistered,
                adapter = %name,
                kind = config.kind(),
                "adapter registered"
            );
        }

        Ok(adapters)
    }

    /// Auth resolver, when an auth section is present
    pub fn build_auth(&self) -> Option<Arc<dyn AuthResolver>> {
        self.auth
            .as_ref()
            .map(|auth| Arc::new(JwtAuthResolver::new(&auth.jwt)) as Arc<dyn AuthResolver>)
    }

    /// Build adapters and the router, running every boot check
    pub fn build_router(&self) -> CliResult<Router> {
        let adapters = self.build_adapters()?;
        let router = Router::new(&self.routes, adapters, self.build_auth())?;
        Ok(router)
    }
}
