//! Request dispatch.
//!
//! # Data Flow
//! ```text
//! request
//!     → url starts with /_moxy?  → admin router, done
//!     → RouteTable::resolve      → none: 404 {"message":"Not found"}
//!     → sleep(delay)
//!     → execute action           → handler | file | proxy | literal
//!     → log line + metrics
//! ```
//!
//! # Design Decisions
//! - Matching (and once-route consumption) is synchronous and finishes
//!   before any await point
//! - Handler errors become `{status, error}` bodies here; panics are caught
//!   further out by the panic layer

use std::time::Instant;

use axum::body::Body;
use axum::extract::State;
use axum::http::{Method, Request};
use axum::response::Response;
use tower::ServiceExt;

use crate::http::files;
use crate::http::inflight::InFlightGuard;
use crate::http::request::{request_id, MockRequest};
use crate::http::response::{error_response, literal_response, not_found};
use crate::http::server::AppState;
use crate::observability::metrics;
use crate::routing::substitute::substitute;
use crate::routing::{Action, RequestTarget, Resolution};

/// Paths under this prefix belong to the admin API.
pub const ADMIN_PREFIX: &str = "/_moxy";

/// Fallback handler for every request the server receives.
pub async fn dispatch(State(state): State<AppState>, request: Request<Body>) -> Response {
    let started = Instant::now();
    let request_id = request_id(request.headers());
    let method = request.method().clone();
    let url = request
        .uri()
        .path_and_query()
        .map(|pq| pq.as_str().to_string())
        .unwrap_or_else(|| "/".to_string());

    let (response, kind) = if url.starts_with(ADMIN_PREFIX) {
        (admin(&state, request).await, "admin")
    } else {
        let tracking = state.inflight.track(&request_id, &method, &url);
        route(&state, request, &method, &url, &tracking).await
    };

    let status = response.status().as_u16();
    tracing::info!(
        request_id = %request_id,
        method = %method,
        url = %url,
        status,
        kind,
        duration_ms = started.elapsed().as_millis() as u64,
        "Request served"
    );
    metrics::record_request(method.as_str(), status, kind, started);

    response
}

async fn admin(state: &AppState, request: Request<Body>) -> Response {
    let router = state.admin.clone().with_state(state.clone());
    match router.oneshot(request).await {
        Ok(response) => response,
        Err(never) => match never {},
    }
}

async fn route(
    state: &AppState,
    request: Request<Body>,
    method: &Method,
    url: &str,
    tracking: &InFlightGuard,
) -> (Response, &'static str) {
    let target = RequestTarget::new(method, url);
    let Some(resolution) = state.routes.resolve(&target) else {
        return (not_found(), "none");
    };

    let kind = resolution.action.kind();
    tracing::debug!(pattern = %resolution.pattern, kind, "Route matched");

    if let Some(delay) = resolution.delay {
        tokio::time::sleep(delay).await;
    }

    (execute(state, MockRequest::new(request), resolution, tracking).await, kind)
}

/// Produce the response for a resolved route.
pub(crate) async fn execute(
    state: &AppState,
    request: MockRequest,
    resolution: Resolution,
    tracking: &InFlightGuard,
) -> Response {
    let Resolution {
        variables, action, ..
    } = resolution;

    match action {
        Action::RouteHandler(handler) | Action::MethodHandler(handler) => {
            match handler.call(request, variables).await {
                Ok(response) => response,
                Err(err) => {
                    tracking.report_failure(&err);
                    error_response(&err)
                }
            }
        }
        Action::File(path) => {
            let filename = substitute(&path, &variables);
            files::serve_file(&state.config.files.root, &filename, request.method()).await
        }
        Action::Proxy { target, options } => {
            let target = substitute(&target, &variables);
            state.proxy.forward(request, &target, &options).await
        }
        Action::Respond(spec) => literal_response(&spec, &variables),
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use axum::http::StatusCode;
    use serde_json::{json, Value};

    use super::*;
    use crate::config::ServerConfig;
    use crate::error::MoxyError;
    use crate::http::response::json_response;
    use crate::http::server::MockServer;
    use crate::routing::{AddRouteOptions, PathConfig, ResponseSpec, RouteConfig};

    async fn send(server: &MockServer, method: Method, uri: &str) -> (StatusCode, Value) {
        let request = Request::builder()
            .method(method)
            .uri(uri)
            .body(Body::empty())
            .unwrap();
        let response = server.router().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, body)
    }

    fn server() -> MockServer {
        MockServer::new(ServerConfig::default()).unwrap()
    }

    #[tokio::test]
    async fn test_unmatched_is_not_found() {
        let (status, body) = send(&server(), Method::GET, "/nothing").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body, json!({ "message": "Not found", "status": 404 }));
    }

    #[tokio::test]
    async fn test_variables_flow_into_body() {
        let server = server();
        server
            .on("/e/:v", PathConfig::new().get(ResponseSpec::new(200).body(json!({ "value": ":v" }))))
            .unwrap();

        let (status, body) = send(&server, Method::GET, "/e/hello").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({ "value": "hello" }));
    }

    #[tokio::test]
    async fn test_once_route_served_once() {
        let server = server();
        server
            .on_with(
                "/test",
                PathConfig::new().get(ResponseSpec::new(200).body(json!({ "n": 1 }))),
                AddRouteOptions::once(),
            )
            .unwrap();

        assert_eq!(send(&server, Method::GET, "/test").await.0, StatusCode::OK);
        assert_eq!(send(&server, Method::GET, "/test").await.0, StatusCode::NOT_FOUND);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_requests_consume_once_route_once() {
        let server = server();
        server
            .once("/race", PathConfig::new().get(ResponseSpec::new(200)))
            .unwrap();
        let router = server.router();

        let mut requests = tokio::task::JoinSet::new();
        for _ in 0..32 {
            let router = router.clone();
            requests.spawn(async move {
                let request = Request::get("/race").body(Body::empty()).unwrap();
                router.oneshot(request).await.unwrap().status()
            });
        }

        let mut served = 0;
        while let Some(status) = requests.join_next().await {
            match status.unwrap() {
                StatusCode::OK => served += 1,
                other => assert_eq!(other, StatusCode::NOT_FOUND),
            }
        }
        assert_eq!(served, 1);
        assert!(server.routes().list(true).is_empty());
    }

    #[tokio::test]
    async fn test_handler_error_status() {
        let server = server();
        server
            .on(
                "/teapot",
                RouteConfig::handler(|_req, _vars| async {
                    Err::<Response, _>(MoxyError::http(StatusCode::IM_A_TEAPOT, "short and stout"))
                }),
            )
            .unwrap();

        let (status, body) = send(&server, Method::GET, "/teapot").await;
        assert_eq!(status, StatusCode::IM_A_TEAPOT);
        assert_eq!(body, json!({ "status": 418, "error": "short and stout" }));
    }

    #[tokio::test]
    async fn test_handler_panic_is_caught() {
        let server = server();
        server
            .on(
                "/boom",
                RouteConfig::handler(|_req, _vars| async {
                    if true {
                        panic!("handler exploded");
                    }
                    Ok(json_response(&Value::Null, StatusCode::OK))
                }),
            )
            .unwrap();

        let (status, body) = send(&server, Method::GET, "/boom").await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["status"], 500);
    }

    #[tokio::test]
    async fn test_delay_is_applied() {
        let server = server();
        server
            .on("/slow", PathConfig::new().delay(80).get(ResponseSpec::new(204)))
            .unwrap();

        let started = Instant::now();
        let (status, _) = send(&server, Method::GET, "/slow").await;
        assert_eq!(status, StatusCode::NO_CONTENT);
        assert!(started.elapsed() >= Duration::from_millis(80));
    }

    #[tokio::test]
    async fn test_admin_prefix_never_reaches_route_table() {
        let server = server();
        server
            .on("/_moxy/shadow", PathConfig::new().get(ResponseSpec::new(200)))
            .unwrap();

        let (status, _) = send(&server, Method::GET, "/_moxy/shadow").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }
}
