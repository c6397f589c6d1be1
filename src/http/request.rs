//! Request wrapper handed to user handlers.
//!
//! # Responsibilities
//! - Expose method, raw url, path, query and headers
//! - Give access to the body either as a stream or fully buffered
//! - Carry the request ID assigned by the request-id layer
//!
//! # Design Decisions
//! - The body is consumed at most once; buffering caches the bytes so
//!   `text()` after `bytes()` works
//! - Proxying takes the stream untouched via `into_body`

use axum::body::{Body, Bytes};
use axum::http::{request::Parts, HeaderMap, Method, Request};
use serde::de::DeserializeOwned;

use crate::error::MoxyError;
use crate::routing::variables::{parse_query, request_path, Variables};

/// Header carrying the per-request ID.
pub const X_REQUEST_ID: &str = "x-request-id";

/// Upper bound for buffered request bodies.
pub const MAX_BUFFERED_BODY: usize = 16 * 1024 * 1024;

/// Request ID from headers, or a fresh one if the layer did not run.
pub fn request_id(headers: &HeaderMap) -> String {
    headers
        .get(X_REQUEST_ID)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string())
}

enum BodyState {
    Streaming(Body),
    Buffered(Bytes),
}

/// An inbound request as seen by handlers.
pub struct MockRequest {
    id: String,
    parts: Parts,
    body: BodyState,
}

impl MockRequest {
    pub fn new(request: Request<Body>) -> Self {
        let (parts, body) = request.into_parts();
        Self {
            id: request_id(&parts.headers),
            parts,
            body: BodyState::Streaming(body),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn method(&self) -> &Method {
        &self.parts.method
    }

    /// Raw request target: path plus query string.
    pub fn url(&self) -> &str {
        self.parts
            .uri
            .path_and_query()
            .map(|pq| pq.as_str())
            .unwrap_or("/")
    }

    /// Path without query string or fragment.
    pub fn path(&self) -> &str {
        request_path(self.url())
    }

    pub fn query(&self) -> Variables {
        parse_query(self.url())
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.parts.headers
    }

    /// Read the whole body, waiting for end of stream.
    pub async fn bytes(&mut self) -> Result<Bytes, MoxyError> {
        let bytes = match std::mem::replace(&mut self.body, BodyState::Buffered(Bytes::new())) {
            BodyState::Buffered(bytes) => bytes,
            BodyState::Streaming(body) => axum::body::to_bytes(body, MAX_BUFFERED_BODY)
                .await
                .map_err(|e| MoxyError::RequestStream(e.to_string()))?,
        };
        self.body = BodyState::Buffered(bytes.clone());
        Ok(bytes)
    }

    /// Body as UTF-8 text (lossy).
    pub async fn text(&mut self) -> Result<String, MoxyError> {
        let bytes = self.bytes().await?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }

    /// Body parsed as JSON. An empty body parses as `{}`.
    pub async fn json<T: DeserializeOwned>(&mut self) -> Result<T, MoxyError> {
        let bytes = self.bytes().await?;
        let raw: &[u8] = if bytes.iter().all(u8::is_ascii_whitespace) {
            b"{}"
        } else {
            &bytes
        };
        serde_json::from_slice(raw)
            .map_err(|e| MoxyError::http(axum::http::StatusCode::BAD_REQUEST, e.to_string()))
    }

    /// Take the body as a stream. Buffered bytes are replayed.
    pub fn into_body(self) -> Body {
        match self.body {
            BodyState::Streaming(body) => body,
            BodyState::Buffered(bytes) => Body::from(bytes),
        }
    }

    pub(crate) fn into_parts(self) -> (Parts, Body) {
        let body = match self.body {
            BodyState::Streaming(body) => body,
            BodyState::Buffered(bytes) => Body::from(bytes),
        };
        (self.parts, body)
    }
}

impl std::fmt::Debug for MockRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockRequest")
            .field("id", &self.id)
            .field("method", &self.parts.method)
            .field("url", &self.url())
            .finish()
    }
}
