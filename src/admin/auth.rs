use std::sync::Arc;

use axum::{
    body::Body,
    extract::State,
    http::{header, Request, StatusCode},
    middleware::Next,
    response::Response,
};
use serde_json::json;

use crate::http::response::json_response;

/// Require `Authorization: Bearer <api_key>` on every admin request.
pub async fn admin_auth_middleware(
    State(api_key): State<Arc<str>>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let authorized = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .is_some_and(|token| token == &*api_key);

    if authorized {
        return next.run(request).await;
    }

    tracing::warn!(path = %request.uri().path(), "Rejected unauthenticated admin request");
    json_response(
        &json!({ "status": 401, "error": "Unauthorized" }),
        StatusCode::UNAUTHORIZED,
    )
}
