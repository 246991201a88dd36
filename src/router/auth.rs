//! Auth resolver boundary
//!
//! A resolver turns a request into the `auth` namespace, or nothing. It is
//! only invoked for routes whose template reads a property of `auth`.

use std::future::Future;
use std::pin::Pin;

use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::RouterResult;

use super::request::IncomingRequest;

/// Auth context: the claims exposed as `auth.*`
pub type AuthContext = Map<String, Value>;

/// Future returned by [`AuthResolver::resolve`]
pub type AuthFuture<'a> = Pin<Box<dyn Future<Output = RouterResult<Option<AuthContext>>> + Send + 'a>>;

/// External auth resolver
pub trait AuthResolver: Send + Sync {
    /// `Ok(None)` means unauthenticated
    fn resolve<'a>(&'a self, request: &'a IncomingRequest) -> AuthFuture<'a>;
}

/// JWT configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JwtConfig {
    /// HMAC secret for HS256
    pub secret: String,

    /// Required `iss`, if set
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub issuer: Option<String>,

    /// Required `aud`, if set
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub audience: Option<String>,
}

/// Resolves `Authorization: Bearer` HS256 tokens to their claims
#[derive(Clone)]
pub struct JwtAuthResolver {
    decoding_key: DecodingKey,
    validation: Validation,
}

impl JwtAuthResolver {
    pub fn new(config: &JwtConfig) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        match &config.audience {
            Some(audience) => validation.set_audience(&[audience]),
            None => validation.validate_aud = false,
        }
        if let Some(issuer) = &config.issuer {
            validation.set_issuer(&[issuer]);
        }

        Self {
            decoding_key: DecodingKey::from_secret(config.secret.as_bytes()),
            validation,
        }
    }

    /// Validate a token and return its claims
    pub fn validate_token(&self, token: &str) -> Result<AuthContext, jsonwebtoken::errors::Error> {
        decode::<AuthContext>(token, &self.decoding_key, &self.validation).map(|data| data.claims)
    }
}

impl AuthResolver for JwtAuthResolver {
    fn resolve<'a>(&'a self, request: &'a IncomingRequest) -> AuthFuture<'a> {
        Box::pin(async move {
            let Some(token) = request.bearer_token() else {
                return Ok(None);
            };
            match self.validate_token(token) {
                Ok(claims) => Ok(Some(claims)),
                Err(err) => {
                    tracing::debug!(error = %err, "rejected bearer token");
                    Ok(None)
                }
            }
        })
    }
}
