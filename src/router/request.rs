//! Framework-neutral request and response types

use axum::http::header::{HeaderName, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use bytes::Bytes;
use serde_json::Value;

/// Request body as handed over by the host
#[derive(Debug, Clone, Default, PartialEq)]
pub enum RequestBody {
    /// No body
    #[default]
    Empty,
    /// Already decoded by the host framework
    Parsed(Value),
    /// Raw bytes; decoded as JSON, falling back to text
    Raw(Bytes),
}

impl RequestBody {
    /// Body value for the `body` namespace
    pub fn into_value(self) -> Value {
        match self {
            RequestBody::Empty => Value::Null,
            RequestBody::Parsed(value) => value,
            RequestBody::Raw(bytes) if bytes.iter().all(u8::is_ascii_whitespace) => Value::Null,
            RequestBody::Raw(bytes) => serde_json::from_slice(&bytes)
                .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into_owned())),
        }
    }
}

/// One inbound request
#[derive(Debug, Clone, Default)]
pub struct IncomingRequest {
    pub method: String,
    /// Path plus optional query string
    pub uri: String,
    pub headers: HeaderMap,
    pub body: RequestBody,
}

impl IncomingRequest {
    pub fn new(method: impl Into<String>, uri: impl Into<String>) -> Self {
        Self {
            method: method.into(),
            uri: uri.into(),
            ..Self::default()
        }
    }

    /// Add a header; invalid names or values are ignored
    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        if let (Ok(name), Ok(value)) = (
            HeaderName::from_bytes(name.as_bytes()),
            HeaderValue::from_str(value),
        ) {
            self.headers.append(name, value);
        }
        self
    }

    pub fn with_json(mut self, body: Value) -> Self {
        self.body = RequestBody::Parsed(body);
        self
    }

    pub fn with_raw_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = RequestBody::Raw(body.into());
        self
    }

    /// Path without the query string
    pub fn path(&self) -> &str {
        self.uri.split('?').next().unwrap_or_default()
    }

    /// Query string without the `?`
    pub fn query_string(&self) -> &str {
        self.uri.split_once('?').map_or("", |(_, q)| q)
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// Token from `Authorization: Bearer <token>`
    pub fn bearer_token(&self) -> Option<&str> {
        let value = self.headers.get(AUTHORIZATION)?.to_str().ok()?;
        let (scheme, token) = value.split_once(' ')?;
        let token = token.trim();
        (scheme.eq_ignore_ascii_case("bearer") && !token.is_empty()).then_some(token)
    }
}

/// Router output for a handled request
#[derive(Debug, Clone, PartialEq)]
pub struct HandlerResponse {
    pub status: u16,
    pub headers: HeaderMap,
    pub body: Value,
}

impl HandlerResponse {
    /// JSON response with `content-type: application/json`
    pub fn json(status: u16, body: Value) -> Self {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        Self {
            status,
            headers,
            body,
        }
    }
}

impl IntoResponse for HandlerResponse {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.status).unwrap_or(StatusCode::OK);
        if status == StatusCode::NO_CONTENT || status == StatusCode::NOT_MODIFIED {
            return (status, self.headers).into_response();
        }
        (status, self.headers, Json(self.body)).into_response()
    }
}
