//! Response emission.
//!
//! # Responsibilities
//! - Assemble status, headers and body into a single response
//! - Always append `Access-Control-Allow-Origin: *`
//! - Suppress the content type on 404
//! - Mark responses whose connection must be dropped instead of answered
//!
//! # Design Decisions
//! - Headers are emitted in the order given, CORS last
//! - JSON bodies default to `application/json`; byte bodies carry their own type

use axum::body::{Body, Bytes};
use axum::http::header::{self, HeaderName, HeaderValue};
use axum::http::StatusCode;
use axum::response::Response;

const JSON_CONTENT_TYPE: &str = "application/json";

/// Body payload of an emitted response.
#[derive(Debug, Clone)]
pub enum ResponseBody {
    /// Raw bytes with an optional content type.
    Bytes {
        data: Bytes,
        content_type: Option<String>,
    },
    /// Structured value serialised as JSON.
    Json(serde_json::Value),
}

impl ResponseBody {
    pub fn bytes(data: impl Into<Bytes>, content_type: Option<String>) -> Self {
        Self::Bytes {
            data: data.into(),
            content_type,
        }
    }

    fn into_parts(self) -> (Bytes, Option<String>) {
        match self {
            Self::Bytes { data, content_type } => (data, content_type),
            Self::Json(value) => (
                Bytes::from(value.to_string()),
                Some(JSON_CONTENT_TYPE.to_string()),
            ),
        }
    }
}

/// Marker extension: the connection must be closed without writing a response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DropConnection;

/// Build a response from a status, ordered headers and an optional body.
pub fn emit(
    status: StatusCode,
    headers: Vec<(HeaderName, HeaderValue)>,
    body: Option<ResponseBody>,
) -> Response {
    let (data, content_type) = match body {
        Some(body) => {
            let (data, content_type) = body.into_parts();
            (Some(data), content_type)
        }
        None => (None, None),
    };

    let has_body = data.is_some();
    let mut response = Response::new(data.map(Body::from).unwrap_or_else(Body::empty));
    *response.status_mut() = status;

    let map = response.headers_mut();
    for (name, value) in headers {
        map.append(name, value);
    }

    if status != StatusCode::NOT_FOUND && has_body {
        if let Some(value) = content_type.and_then(|ct| HeaderValue::from_str(&ct).ok()) {
            map.append(header::CONTENT_TYPE, value);
        }
    }

    map.append(
        header::ACCESS_CONTROL_ALLOW_ORIGIN,
        HeaderValue::from_static("*"),
    );
    response
}

/// `{"error": message}` with the given status.
pub fn error(status: StatusCode, message: impl Into<String>) -> Response {
    let body = serde_json::json!({ "error": message.into() });
    emit(status, Vec::new(), Some(ResponseBody::Json(body)))
}

/// CORS preflight answer.
pub fn preflight() -> Response {
    emit(
        StatusCode::OK,
        vec![
            (
                header::ACCESS_CONTROL_ALLOW_METHODS,
                HeaderValue::from_static("*"),
            ),
            (
                header::ACCESS_CONTROL_ALLOW_HEADERS,
                HeaderValue::from_static("*"),
            ),
        ],
        None,
    )
}

/// Placeholder response carrying [`DropConnection`]; never written to the wire.
pub fn dropped() -> Response {
    let mut response = Response::new(Body::empty());
    response.extensions_mut().insert(DropConnection);
    response
}

pub fn is_dropped(response: &Response) -> bool {
    response.extensions().get::<DropConnection>().is_some()
}
