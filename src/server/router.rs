//! Route table and request dispatch.
//!
//! Patterns use `:name` segments for path parameters. The table is built
//! once and never changes; anything it does not match goes to the
//! not-found handler.

use std::collections::HashMap;
use std::time::Instant;

use crate::http::request::{Method, Request};
use crate::http::response::Response;
use crate::server::handlers::{self, FEEDBACK_URI};
use crate::server::middleware::DeliveryMiddleware;

/// What a matched route runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endpoint {
    Index,
    Feedback,
    NotFound,
}

/// Values captured from `:name` segments.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PathParams(HashMap<String, String>);

impl PathParams {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.0.get(name).map(String::as_str)
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.0.insert(name.into(), value.into());
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Param(String),
}

#[derive(Debug)]
struct Route {
    method: Method,
    segments: Vec<Segment>,
    endpoint: Endpoint,
}

impl Route {
    fn new(method: Method, pattern: &str, endpoint: Endpoint) -> Self {
        let segments = split_path(pattern)
            .into_iter()
            .map(|s| match s.strip_prefix(':') {
                Some(name) => Segment::Param(name.to_string()),
                None => Segment::Literal(s.to_string()),
            })
            .collect();

        Self { method, segments, endpoint }
    }

    fn matches(&self, method: Method, parts: &[&str]) -> Option<PathParams> {
        if self.method != method || self.segments.len() != parts.len() {
            return None;
        }

        let mut params = PathParams::new();
        for (segment, part) in self.segments.iter().zip(parts) {
            match segment {
                Segment::Literal(lit) if lit == part => {}
                Segment::Literal(_) => return None,
                // Empty captures are let through; the handler rejects them.
                Segment::Param(name) => params.insert(name.as_str(), *part),
            }
        }

        Some(params)
    }
}

/// `"/"` has no segments; empty segments elsewhere are kept.
fn split_path(path: &str) -> Vec<&str> {
    let trimmed = path.strip_prefix('/').unwrap_or(path);
    if trimmed.is_empty() {
        Vec::new()
    } else {
        trimmed.split('/').collect()
    }
}

/// Result of looking up a method and path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteMatch {
    pub endpoint: Endpoint,
    pub params: PathParams,
}

pub struct Router {
    routes: Vec<Route>,
    middleware: DeliveryMiddleware,
}

impl Router {
    /// Builds the route table with `middleware` applied to every request.
    pub fn new(middleware: DeliveryMiddleware) -> Self {
        let mut router = Self { routes: Vec::new(), middleware };
        router.attach_routes();
        router
    }

    fn attach_routes(&mut self) {
        self.route(Method::GET, "/", Endpoint::Index);
        self.route(Method::POST, FEEDBACK_URI, Endpoint::Feedback);
    }

    fn route(&mut self, method: Method, pattern: &str, endpoint: Endpoint) {
        self.routes.push(Route::new(method, pattern, endpoint));
    }

    /// Finds the endpoint for `method` and `path` (no query string).
    pub fn resolve(&self, method: Method, path: &str) -> RouteMatch {
        let parts = split_path(path);

        self.routes
            .iter()
            .find_map(|route| {
                route
                    .matches(method, &parts)
                    .map(|params| RouteMatch { endpoint: route.endpoint, params })
            })
            .unwrap_or(RouteMatch { endpoint: Endpoint::NotFound, params: PathParams::new() })
    }

    /// Feedback records delivered since startup.
    pub fn registered_feedback(&self) -> u64 {
        self.middleware.registered()
    }

    /// Runs the middleware, then the matched handler.
    pub async fn dispatch(&self, req: &Request) -> Response {
        let started = Instant::now();
        let ctx = self.middleware.attach(req);
        let matched = self.resolve(req.method, req.route_path());

        let response = match matched.endpoint {
            Endpoint::Index => handlers::index(),
            Endpoint::Feedback => handlers::submit_feedback(req, &matched.params, &ctx).await,
            Endpoint::NotFound => handlers::not_found(),
        };

        tracing::info!(
            method = req.method.as_str(),
            path = %req.path,
            status = response.status.as_u16(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Request handled"
        );

        response
    }
}
