//! Static method + path dispatch.
//!
//! The table is assembled once at startup and is read-only afterwards. Lookup
//! is by exact path and exact method: a path nobody registered is a 404, a
//! registered path with an unregistered method is a 405 carrying an `Allow`
//! header.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use axum::extract::{Request, State};
use axum::http::{header, Method, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Router;
use futures::future::BoxFuture;
use futures::FutureExt;
use thiserror::Error;

use crate::metrics::track_metrics;

type Handler = Arc<dyn Fn(Request) -> BoxFuture<'static, Response> + Send + Sync>;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RouteError {
    #[error("route {method} {path} is already registered")]
    Duplicate { method: Method, path: String },
    #[error("route path '{0}' must start with '/'")]
    InvalidPath(String),
}

/// A `(method, path) -> handler` binding.
#[derive(Clone)]
pub struct RouteEntry {
    method: Method,
    path: Arc<str>,
    handler: Handler,
}

impl RouteEntry {
    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub async fn call(&self, req: Request) -> Response {
        (self.handler)(req).await
    }
}

/// Result of looking up a request in the table.
pub enum Dispatch<'a> {
    Matched(&'a RouteEntry),
    NotFound,
    MethodNotAllowed(Vec<Method>),
}

/// Route label attached to responses, so middleware can tell routes apart
/// without inheriting the cardinality of arbitrary request paths.
#[derive(Debug, Clone)]
pub struct MatchedRoute(pub Arc<str>);

#[derive(Default)]
pub struct RouteTableBuilder {
    routes: HashMap<Arc<str>, Vec<RouteEntry>>,
}

impl RouteTableBuilder {
    pub fn route<H, Fut, R>(
        mut self,
        method: Method,
        path: &str,
        handler: H,
    ) -> Result<Self, RouteError>
    where
        H: Fn(Request) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = R> + Send + 'static,
        R: IntoResponse + 'static,
    {
        if !path.starts_with('/') {
            return Err(RouteError::InvalidPath(path.to_owned()));
        }

        let path: Arc<str> = Arc::from(path);
        let entries = self.routes.entry(path.clone()).or_default();
        if entries.iter().any(|entry| entry.method == method) {
            return Err(RouteError::Duplicate {
                method,
                path: path.to_string(),
            });
        }

        let handler: Handler =
            Arc::new(move |req: Request| handler(req).map(IntoResponse::into_response).boxed());
        entries.push(RouteEntry {
            method,
            path,
            handler,
        });

        Ok(self)
    }

    pub fn get<H, Fut, R>(self, path: &str, handler: H) -> Result<Self, RouteError>
    where
        H: Fn(Request) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = R> + Send + 'static,
        R: IntoResponse + 'static,
    {
        self.route(Method::GET, path, handler)
    }

    pub fn build(self) -> RouteTable {
        RouteTable {
            routes: self.routes,
        }
    }
}

pub struct RouteTable {
    routes: HashMap<Arc<str>, Vec<RouteEntry>>,
}

impl RouteTable {
    pub fn builder() -> RouteTableBuilder {
        RouteTableBuilder::default()
    }

    pub fn dispatch(&self, method: &Method, path: &str) -> Dispatch<'_> {
        let Some(entries) = self.routes.get(path) else {
            return Dispatch::NotFound;
        };

        match entries.iter().find(|entry| entry.method == method) {
            Some(entry) => Dispatch::Matched(entry),
            None => Dispatch::MethodNotAllowed(
                entries.iter().map(|entry| entry.method.clone()).collect(),
            ),
        }
    }

    fn len(&self) -> usize {
        self.routes.values().map(Vec::len).sum()
    }

    /// Mount the table on an axum router, with HTTP metrics tracked for every request.
    pub fn into_router(self) -> Router {
        tracing::debug!(routes = self.len(), "mounting route table");
        Router::new()
            .fallback(dispatch_request)
            .with_state(Arc::new(self))
            .layer(axum::middleware::from_fn(track_metrics))
    }
}

async fn dispatch_request(State(table): State<Arc<RouteTable>>, req: Request) -> Response {
    let method = req.method().clone();
    let path = req.uri().path().to_owned();

    match table.dispatch(&method, &path) {
        Dispatch::Matched(entry) => {
            let mut response = entry.call(req).await;
            response
                .extensions_mut()
                .insert(MatchedRoute(entry.path.clone()));
            response
        }
        Dispatch::NotFound => (StatusCode::NOT_FOUND, "not found").into_response(),
        Dispatch::MethodNotAllowed(allowed) => {
            let allow = allowed
                .iter()
                .map(Method::as_str)
                .collect::<Vec<_>>()
                .join(", ");
            (
                StatusCode::METHOD_NOT_ALLOWED,
                [(header::ALLOW, allow)],
                "method not allowed",
            )
                .into_response()
        }
    }
}
