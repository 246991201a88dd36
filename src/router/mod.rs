//! # Router
//!
//! Runs one request through a fixed sequence of steps:
//!
//! 1. match method and path against the compiled routes (no match → `None`)
//! 2. resolve auth when the route's template reads `auth`
//! 3. collect the request context (path captures, query string, body)
//! 4. select the adapter
//! 5. interpolate and execute
//! 6. shape the row-set
//! 7. turn an empty single-item extraction into `NotFound`
//!
//! Only step 5 (and the auth resolver) suspend. Compiled routes and the
//! adapter set are read-only after construction and shared across requests.

pub mod auth;
pub mod request;

use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::{debug, error, info, warn};

use crate::adapter::{AdapterSet, DatabaseAdapter};
use crate::error::{RouterError, RouterResult};
use crate::expression::{Evaluator, QueryValue, RequestContext};
use crate::observability::Event;
use crate::routing::{compile, match_route, CompiledRoute, RouteDefinition};
use crate::shaper::shape;

pub use auth::{AuthContext, AuthFuture, AuthResolver, JwtAuthResolver, JwtConfig};
pub use request::{HandlerResponse, IncomingRequest, RequestBody};

/// Request router over a fixed set of compiled routes
pub struct Router {
    routes: Vec<CompiledRoute>,
    adapters: AdapterSet,
    auth: Option<Arc<dyn AuthResolver>>,
    evaluator: Evaluator,
}

impl Router {
    /// Compile every route and run the boot checks.
    ///
    /// Fails when a route reads `auth` without a resolver, when its adapter
    /// cannot be selected, or when the adapter rejects its template.
    pub fn new(
        definitions: &[RouteDefinition],
        adapters: AdapterSet,
        auth: Option<Arc<dyn AuthResolver>>,
    ) -> RouterResult<Self> {
        Self::with_evaluator(definitions, adapters, auth, Evaluator::new())
    }

    /// Like [`Router::new`] with custom expression delimiters
    pub fn with_evaluator(
        definitions: &[RouteDefinition],
        adapters: AdapterSet,
        auth: Option<Arc<dyn AuthResolver>>,
        evaluator: Evaluator,
    ) -> RouterResult<Self> {
        let mut routes = Vec::with_capacity(definitions.len());

        for definition in definitions {
            let route = compile(definition, &evaluator)?;
            let label = route.label();

            if route.uses_auth && auth.is_none() {
                return Err(RouterError::AuthResolverMissing(label));
            }

            let (adapter_name, adapter) = adapters
                .select(route.adapter.as_deref())
                .map_err(|e| RouterError::validation(format!("{}: {}", label, e)))?;

            adapter
                .validate_query(&route.template)
                .map_err(|reason| RouterError::validation(format!("{}: {}", label, reason)))?;

            debug!(
                event = %Event::RouteCompiled,
                route = %label,
                adapter = adapter_name,
                uses_auth = route.uses_auth,
                "route compiled"
            );
            routes.push(route);
        }

        Ok(Self {
            routes,
            adapters,
            auth,
            evaluator,
        })
    }

    /// Compiled routes in declaration order
    pub fn routes(&self) -> &[CompiledRoute] {
        &self.routes
    }

    /// Name of the adapter a route resolves to
    pub fn adapter_name(&self, route: &CompiledRoute) -> Option<&str> {
        self.adapters
            .select(route.adapter.as_deref())
            .ok()
            .map(|(name, _)| name)
    }

    /// Handle one request. `Ok(None)` means no route matched.
    pub async fn handle(&self, request: IncomingRequest) -> RouterResult<Option<HandlerResponse>> {
        let Some(matched) = match_route(&self.routes, &request.method, request.path()) else {
            debug!(
                event = %Event::RequestUnmatched,
                method = %request.method,
                path = request.path(),
                "no route"
            );
            return Ok(None);
        };

        let route = matched.route;
        let label = route.label();
        debug!(event = %Event::RequestMatched, route = %label, uri = %request.uri, "request matched");

        match self.run(route, matched.params, request).await {
            Ok(response) => {
                info!(
                    event = %Event::RequestComplete,
                    route = %label,
                    status = response.status,
                    "request complete"
                );
                Ok(Some(response))
            }
            Err(err) => {
                log_failure(&label, &err);
                Err(err)
            }
        }
    }

    async fn run(
        &self,
        route: &CompiledRoute,
        params: BTreeMap<String, String>,
        request: IncomingRequest,
    ) -> RouterResult<HandlerResponse> {
        let auth = if route.uses_auth {
            Some(self.authenticate(route, &request).await?)
        } else {
            None
        };

        let ctx = RequestContext {
            path: params,
            query: parse_query(request.query_string(), &route.array_params),
            body: request.body.into_value(),
            auth,
        };

        let (_, adapter) = self.adapters.select(route.adapter.as_deref())?;
        let rows = execute(adapter.as_ref(), route, &ctx, &self.evaluator).await?;

        let row_count = rows.len();
        let body = shape(rows, route.field_map.as_ref(), route.extraction.as_ref());

        if route.extraction.as_ref().is_some_and(|p| p.is_single_item()) && body.is_null() {
            return Err(RouterError::NotFound);
        }

        debug!(event = %Event::QueryExecuted, route = %route.label(), rows = row_count, "query executed");
        Ok(HandlerResponse::json(route.status, body))
    }

    async fn authenticate(
        &self,
        route: &CompiledRoute,
        request: &IncomingRequest,
    ) -> RouterResult<AuthContext> {
        let resolver = self
            .auth
            .as_ref()
            .ok_or_else(|| RouterError::AuthResolverMissing(route.label()))?;

        match resolver.resolve(request).await? {
            Some(ctx) => {
                debug!(event = %Event::AuthResolved, route = %route.label(), "auth resolved");
                Ok(ctx)
            }
            None => {
                debug!(event = %Event::AuthRejected, route = %route.label(), "auth rejected");
                Err(RouterError::AuthRequired)
            }
        }
    }
}

async fn execute(
    adapter: &dyn DatabaseAdapter,
    route: &CompiledRoute,
    ctx: &RequestContext,
    evaluator: &Evaluator,
) -> RouterResult<crate::adapter::RowSet> {
    let artifact = adapter.interpolate(&route.template, ctx, evaluator)?;
    adapter.execute(artifact).await
}

/// Parse a query string; repeated keys and array-typed parameters become arrays
pub fn parse_query(query: &str, array_params: &[String]) -> BTreeMap<String, QueryValue> {
    let mut params: BTreeMap<String, QueryValue> = BTreeMap::new();

    for (key, value) in url::form_urlencoded::parse(query.as_bytes()) {
        let value = value.into_owned();
        match params.get_mut(key.as_ref()) {
            Some(existing) => existing.push(value),
            None => {
                params.insert(key.into_owned(), QueryValue::Single(value));
            }
        }
    }

    for name in array_params {
        if let Some(value) = params.get_mut(name) {
            let items = match value {
                QueryValue::Single(s) => vec![std::mem::take(s)],
                QueryValue::Multi(items) => std::mem::take(items),
            };
            *value = QueryValue::Multi(
                items
                    .iter()
                    .flat_map(|item| item.split(','))
                    .filter(|piece| !piece.is_empty())
                    .map(str::to_string)
                    .collect(),
            );
        }
    }

    params
}

fn log_failure(label: &str, err: &RouterError) {
    match err {
        RouterError::NotFound => {
            debug!(event = %Event::ResourceNotFound, route = %label, "not found");
        }
        RouterError::Query { .. } => {
            error!(
                event = %Event::QueryFailed,
                route = %label,
                code = err.code(),
                detail = %err.detail().unwrap_or_default(),
                "{}", err
            );
        }
        _ => {
            warn!(
                event = %Event::RequestFailed,
                route = %label,
                code = err.code(),
                status = err.status_code(),
                "{}", err
            );
        }
    }
}
