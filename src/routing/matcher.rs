//! Route key extraction.
//!
//! # Design Decisions
//! - The method comes from the request line as-is; rules are uppercased at load
//! - The target is the raw path plus query string, so `/a?x=1` and `/a` are
//!   distinct keys

use axum::http::{Method, Uri};

/// The `(method, target)` pair a request is matched on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteKey {
    pub method: String,
    pub target: String,
}

impl RouteKey {
    pub fn new(method: &Method, uri: &Uri) -> Self {
        let target = uri
            .path_and_query()
            .map(|pq| pq.as_str())
            .unwrap_or_else(|| uri.path());
        Self {
            method: method.as_str().to_string(),
            target: target.to_string(),
        }
    }
}

impl std::fmt::Display for RouteKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.method, self.target)
    }
}

/// Methods whose body may be persisted.
pub fn carries_body(method: &Method) -> bool {
    matches!(*method, Method::POST | Method::PUT | Method::PATCH)
}
