//! # HTTP Server
//!
//! Hosts a [`Router`] behind axum. Every request goes to a single fallback
//! handler that converts it, calls [`Router::handle`] and converts back.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::body::to_bytes;
use axum::extract::{Request, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use tokio::net::TcpListener;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

use super::config::HttpServerConfig;
use crate::error::ErrorResponse;
use crate::observability::Event;
use crate::router::{IncomingRequest, RequestBody, Router};

#[derive(Clone)]
struct AppState {
    router: Arc<Router>,
    body_limit: usize,
}

/// HTTP server for a request router
pub struct HttpServer {
    config: HttpServerConfig,
    router: axum::Router,
}

impl HttpServer {
    /// Create a server with default configuration
    pub fn new(router: Arc<Router>) -> Self {
        Self::with_config(router, HttpServerConfig::default())
    }

    /// Create a server with custom configuration
    pub fn with_config(router: Arc<Router>, config: HttpServerConfig) -> Self {
        let router = Self::build_router(router, &config);
        Self { config, router }
    }

    fn build_router(router: Arc<Router>, config: &HttpServerConfig) -> axum::Router {
        let cors = if config.cors_origins.is_empty() {
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any)
        } else {
            let origins: Vec<_> = config
                .cors_origins
                .iter()
                .filter_map(|s| s.parse().ok())
                .collect();

            CorsLayer::new()
                .allow_origin(AllowOrigin::list(origins))
                .allow_methods(Any)
                .allow_headers(Any)
        };

        let state = AppState {
            router,
            body_limit: config.body_limit_bytes,
        };

        axum::Router::new()
            .fallback(dispatch)
            .with_state(state)
            .layer(TraceLayer::new_for_http())
            .layer(cors)
    }

    /// Get the socket address
    pub fn socket_addr(&self) -> String {
        self.config.socket_addr()
    }

    /// Get the axum router (for testing)
    pub fn router(self) -> axum::Router {
        self.router
    }

    /// Bind and serve until the process exits
    pub async fn start(self) -> Result<(), std::io::Error> {
        let addr: SocketAddr = self.config.socket_addr().parse().map_err(|e| {
            std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                format!("invalid socket address {}: {}", self.config.socket_addr(), e),
            )
        })?;

        let listener = TcpListener::bind(addr).await?;
        info!(event = %Event::ServerListening, %addr, "listening");
        axum::serve(listener, self.router).await?;

        Ok(())
    }
}

async fn dispatch(State(state): State<AppState>, request: Request) -> Response {
    let (parts, body) = request.into_parts();

    let bytes = match to_bytes(body, state.body_limit).await {
        Ok(bytes) => bytes,
        Err(_) => {
            return error_body(
                StatusCode::PAYLOAD_TOO_LARGE,
                "PAYLOAD_TOO_LARGE",
                format!("Request body exceeds {} bytes", state.body_limit),
            );
        }
    };

    let uri = parts
        .uri
        .path_and_query()
        .map_or_else(|| parts.uri.path().to_string(), |pq| pq.as_str().to_string());

    let incoming = IncomingRequest {
        method: parts.method.as_str().to_string(),
        uri,
        headers: parts.headers,
        body: if bytes.is_empty() {
            RequestBody::Empty
        } else {
            RequestBody::Raw(bytes)
        },
    };
    let description = format!("{} {}", incoming.method, incoming.path());

    match state.router.handle(incoming).await {
        Ok(Some(response)) => response.into_response(),
        Ok(None) => error_body(
            StatusCode::NOT_FOUND,
            "ROUTE_NOT_FOUND",
            format!("No route for {}", description),
        ),
        Err(err) => err.into_response(),
    }
}

fn error_body(status: StatusCode, code: &'static str, error: String) -> Response {
    let body = ErrorResponse {
        code,
        error,
        status: status.as_u16(),
    };
    (status, Json(body)).into_response()
}
