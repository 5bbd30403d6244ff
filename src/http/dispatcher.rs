//! Per-request rule dispatch.
//!
//! # Request State Machine
//! ```text
//! Received → Matching ─┬─ no rule ──────────────────────────────→ Responded(404)
//!                      └─ rule → [persist body] → delay ─┬─ code 0 ─→ Dropped
//!                                                        ├─ ok ─────→ Responded(code)
//!                                                        └─ error ──→ Responded(500)
//! ```
//!
//! # Design Decisions
//! - The rule table is snapshotted once; a reload mid-request has no effect on it
//! - Failures are [`RequestError`] values, translated to responses in one place
//! - The delay is an async sleep and suspends only this request

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use axum::extract::Request;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

use crate::config::schema::Rule;
use crate::config::store::RuleStore;
use crate::http::request;
use crate::http::response::{self, ResponseBody};
use crate::observability::metrics;
use crate::routing::matcher::{carries_body, RouteKey};
use crate::routing::selector::RuleSelector;

const GENERIC_ERROR: &str = "Unknown Error";

/// Request-local failure. None of these affect other requests.
#[derive(Debug, thiserror::Error)]
pub enum RequestError {
    #[error("no rule matches {0}")]
    NoMatch(RouteKey),

    #[error("File specified in configuration ({}) does not exist.", .0.display())]
    MissingResponseFile(PathBuf),

    #[error("Request body of {declared} bytes exceeds the {limit} byte limit.")]
    BodyTooLarge { declared: usize, limit: usize },

    #[error("Failed to read request body: {0}")]
    BodyRead(String),

    #[error("invalid status code {0}")]
    InvalidStatus(u16),

    #[error("unexpected failure: {0}")]
    Unexpected(#[from] std::io::Error),
}

impl RequestError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::NoMatch(_) => StatusCode::NOT_FOUND,
            Self::BodyTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for RequestError {
    fn into_response(self) -> Response {
        let status = self.status();
        match self {
            Self::NoMatch(_) => response::emit(status, Vec::new(), None),
            Self::MissingResponseFile(_) | Self::BodyTooLarge { .. } | Self::BodyRead(_) => {
                response::error(status, self.to_string())
            }
            Self::InvalidStatus(_) | Self::Unexpected(_) => response::error(status, GENERIC_ERROR),
        }
    }
}

/// What to do with the connection once dispatch finishes.
#[derive(Debug)]
pub enum Outcome {
    Respond(Response),
    /// Close without writing anything.
    Drop,
}

/// Matches requests against the active rules and produces their responses.
#[derive(Debug, Clone)]
pub struct RequestDispatcher {
    store: Arc<RuleStore>,
    selector: Arc<dyn RuleSelector>,
    max_body_bytes: usize,
}

impl RequestDispatcher {
    pub fn new(store: Arc<RuleStore>, selector: Arc<dyn RuleSelector>, max_body_bytes: usize) -> Self {
        Self {
            store,
            selector,
            max_body_bytes,
        }
    }

    /// Run one request through the rule table.
    pub async fn dispatch(&self, request: Request) -> Result<Outcome, RequestError> {
        let key = RouteKey::new(request.method(), request.uri());
        let table = self.store.snapshot();

        let candidates = table.matching(&key.method, &key.target);
        let rule: &Rule = match candidates.len() {
            0 => return Err(RequestError::NoMatch(key)),
            1 => candidates[0],
            n => {
                let index = self.selector.select(n);
                tracing::debug!(route = %key, candidates = n, index, "Selected among duplicate rules");
                candidates[index.min(n - 1)]
            }
        };

        if let Some(dir) = &rule.request_file_path {
            if carries_body(request.method()) {
                let (parts, body) = request.into_parts();
                let declared = request::declared_length(&parts.headers);
                let data = request::read_body(body, declared, self.max_body_bytes).await?;
                let extension = request::request_extension(&parts.headers);
                let path = request::persist_body(dir, &data, extension).await?;
                tracing::info!(route = %key, path = %path.display(), bytes = data.len(), "Request body saved");
            }
        }

        if !rule.delay.is_zero() {
            tokio::time::sleep(rule.delay).await;
        }

        if rule.drops_connection() {
            return Ok(Outcome::Drop);
        }

        let status = StatusCode::from_u16(rule.response_code)
            .map_err(|_| RequestError::InvalidStatus(rule.response_code))?;

        let Some(file) = &rule.response_file else {
            return Ok(Outcome::Respond(response::emit(status, Vec::new(), None)));
        };

        if !tokio::fs::try_exists(file).await.unwrap_or(false) {
            return Err(RequestError::MissingResponseFile(file.clone()));
        }

        let data = tokio::fs::read(file).await?;
        let content_type = mime_guess::from_path(file).first_or_octet_stream();
        Ok(Outcome::Respond(response::emit(
            status,
            Vec::new(),
            Some(ResponseBody::bytes(data, Some(content_type.to_string()))),
        )))
    }

    /// Dispatch and translate the outcome into a response. Dropped connections
    /// yield a response marked with [`response::DropConnection`].
    pub async fn handle(&self, request: Request) -> Response {
        let start = Instant::now();
        let key = RouteKey::new(request.method(), request.uri());
        let request_id = request
            .headers()
            .get("x-request-id")
            .and_then(|v| v.to_str().ok())
            .unwrap_or("unknown")
            .to_string();

        let response = match self.dispatch(request).await {
            Ok(Outcome::Respond(response)) => response,
            Ok(Outcome::Drop) => {
                tracing::info!(request_id = %request_id, route = %key, "Dropping connection without response");
                response::dropped()
            }
            Err(e @ RequestError::NoMatch(_)) => {
                tracing::debug!(request_id = %request_id, route = %key, "No rule matched");
                e.into_response()
            }
            Err(e @ RequestError::Unexpected(_)) | Err(e @ RequestError::InvalidStatus(_)) => {
                tracing::error!(request_id = %request_id, route = %key, error = %e, "Request failed");
                e.into_response()
            }
            Err(e) => {
                tracing::warn!(request_id = %request_id, route = %key, error = %e, "Request rejected");
                e.into_response()
            }
        };

        let status = if response::is_dropped(&response) {
            0
        } else {
            response.status().as_u16()
        };
        metrics::record_request(&key.method, status, start);
        tracing::debug!(
            request_id = %request_id,
            route = %key,
            status,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Request handled"
        );

        response
    }
}
