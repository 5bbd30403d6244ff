//! Request body handling.
//!
//! # Responsibilities
//! - Read the body a request declares via `Content-Length`
//! - Derive a file extension from the declared content type
//! - Persist the body under a millisecond-timestamp file name
//!
//! # Design Decisions
//! - Content-type parameters (`; charset=...`) are ignored when guessing
//! - Files are created with `create_new`; a same-millisecond collision gets a
//!   `-1`, `-2`, ... suffix instead of overwriting the earlier body
//! - A request without `Content-Length` (chunked) is read to its end

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use axum::body::{Body, Bytes};
use axum::http::header::{CONTENT_LENGTH, CONTENT_TYPE};
use axum::http::HeaderMap;
use tokio::io::AsyncWriteExt;

use crate::http::dispatcher::RequestError;

/// Extensions for types where the first registered extension is a poor name.
const PREFERRED_EXTENSIONS: &[(&str, &str)] = &[
    ("text/plain", "txt"),
    ("text/html", "html"),
    ("image/jpeg", "jpg"),
    ("application/octet-stream", "bin"),
];

const MAX_NAME_ATTEMPTS: usize = 1_000;

/// File extension (without the dot) for a `Content-Type` value, if known.
pub fn extension_for(content_type: &str) -> Option<&'static str> {
    let essence = content_type.split(';').next()?.trim().to_ascii_lowercase();
    if essence.is_empty() {
        return None;
    }

    if let Some((_, ext)) = PREFERRED_EXTENSIONS.iter().find(|(mime, _)| *mime == essence) {
        return Some(*ext);
    }

    let extensions = mime_guess::get_mime_extensions_str(&essence)?;
    let subtype = essence.split('/').nth(1).unwrap_or_default();
    extensions
        .iter()
        .copied()
        .find(|ext| *ext == subtype)
        .or_else(|| extensions.first().copied())
}

/// Declared `Content-Length`, if present and well formed.
pub fn declared_length(headers: &HeaderMap) -> Option<usize> {
    headers
        .get(CONTENT_LENGTH)?
        .to_str()
        .ok()?
        .trim()
        .parse()
        .ok()
}

/// Extension derived from the request's `Content-Type` header.
pub fn request_extension(headers: &HeaderMap) -> Option<&'static str> {
    headers
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .and_then(extension_for)
}

/// Read the request body, insisting on exactly the declared number of bytes.
pub async fn read_body(
    body: Body,
    declared: Option<usize>,
    limit: usize,
) -> Result<Bytes, RequestError> {
    if let Some(declared) = declared {
        if declared > limit {
            return Err(RequestError::BodyTooLarge { declared, limit });
        }
    }

    let bytes = axum::body::to_bytes(body, limit)
        .await
        .map_err(|e| RequestError::BodyRead(e.to_string()))?;

    match declared {
        Some(declared) if bytes.len() != declared => Err(RequestError::BodyRead(format!(
            "expected {} bytes, received {}",
            declared,
            bytes.len()
        ))),
        _ => Ok(bytes),
    }
}

/// Milliseconds since the Unix epoch.
pub fn unix_millis() -> u128 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis()
}

/// Write `data` to a new file in `dir` named after the current time.
pub async fn persist_body(
    dir: &Path,
    data: &[u8],
    extension: Option<&str>,
) -> std::io::Result<PathBuf> {
    let stem = unix_millis().to_string();
    let suffix = extension.map(|ext| format!(".{}", ext)).unwrap_or_default();

    for attempt in 0..MAX_NAME_ATTEMPTS {
        let name = if attempt == 0 {
            format!("{}{}", stem, suffix)
        } else {
            format!("{}-{}{}", stem, attempt, suffix)
        };
        let path = dir.join(name);

        let mut file = match tokio::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .await
        {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::AlreadyExists => continue,
            Err(e) => return Err(e),
        };

        file.write_all(data).await?;
        file.flush().await?;
        return Ok(path);
    }

    Err(std::io::Error::new(
        ErrorKind::AlreadyExists,
        format!("no free file name for {} in {}", stem, dir.display()),
    ))
}
