//! Response construction.
//!
//! # Responsibilities
//! - JSON and text helpers for handler authors
//! - The generic 404 and error bodies
//! - Literal responses from a `ResponseSpec`, with variable substitution
//!
//! # Design Decisions
//! - Structured bodies are serialized to JSON text first and substitution
//!   runs on that text; substituted values are inserted raw
//! - User headers are applied last and win over the JSON content type

use axum::body::Body;
use axum::http::{header, HeaderName, HeaderValue, StatusCode};
use axum::response::Response;
use serde_json::{json, Value};

use crate::error::MoxyError;
use crate::routing::config::ResponseSpec;
use crate::routing::substitute::substitute;
use crate::routing::variables::Variables;

/// Header naming the failure class on proxy error responses.
pub const X_MOXY_ERROR: &str = "x-moxy-error";

const JSON_CONTENT_TYPE: &str = "application/json; charset=utf-8";
const TEXT_CONTENT_TYPE: &str = "text/plain; charset=utf-8";

fn with_body(status: StatusCode, content_type: &'static str, body: impl Into<Body>) -> Response {
    let mut response = Response::new(body.into());
    *response.status_mut() = status;
    response
        .headers_mut()
        .insert(header::CONTENT_TYPE, HeaderValue::from_static(content_type));
    response
}

/// Serialize `value` as a JSON response.
pub fn json_response(value: &Value, status: StatusCode) -> Response {
    with_body(status, JSON_CONTENT_TYPE, value.to_string())
}

pub fn text_response(text: impl Into<String>, status: StatusCode) -> Response {
    with_body(status, TEXT_CONTENT_TYPE, text.into())
}

/// The response sent when no route matches.
pub fn not_found() -> Response {
    let err = MoxyError::NotFound;
    json_response(
        &json!({ "message": err.to_string(), "status": err.status().as_u16() }),
        err.status(),
    )
}

/// Map an error to its status and `{"status", "error"}` body.
pub fn error_response(err: &MoxyError) -> Response {
    json_response(&err.to_json(), err.status())
}

/// Tag a response with an `X-Moxy-Error` class.
pub fn with_moxy_error(mut response: Response, class: &'static str) -> Response {
    response
        .headers_mut()
        .insert(X_MOXY_ERROR, HeaderValue::from_static(class));
    response
}

/// Build the literal response a route config describes.
pub fn literal_response(spec: &ResponseSpec, variables: &Variables) -> Response {
    let status = match spec.status {
        None => StatusCode::OK,
        Some(code) => match StatusCode::from_u16(code) {
            Ok(status) => status,
            Err(_) => {
                tracing::warn!(status = code, "Route configured with an invalid status code");
                return error_response(&MoxyError::Handler(format!("invalid status code {code}")));
            }
        },
    };

    let mut response = Response::new(Body::empty());
    *response.status_mut() = status;

    let text = match &spec.body {
        None | Some(Value::Null) => None,
        Some(Value::String(text)) => Some(text.clone()),
        Some(structured) => {
            response
                .headers_mut()
                .insert(header::CONTENT_TYPE, HeaderValue::from_static(JSON_CONTENT_TYPE));
            Some(structured.to_string())
        }
    };
    if let Some(text) = text {
        *response.body_mut() = Body::from(substitute(&text, variables));
    }

    for (name, value) in &spec.headers {
        match (
            HeaderName::from_bytes(name.as_bytes()),
            HeaderValue::from_str(value),
        ) {
            (Ok(name), Ok(value)) => {
                response.headers_mut().insert(name, value);
            }
            _ => tracing::warn!(header = %name, "Skipping invalid response header"),
        }
    }

    response
}
