use axum::body::Bytes;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::Response;
use serde::Deserialize;
use serde_json::{json, Map, Value};

use crate::error::MoxyError;
use crate::http::response::{error_response, json_response, not_found};
use crate::http::server::AppState;
use crate::routing::{AddRouteOptions, RouteConfig};

/// Query flags shared by the read endpoints and route creation.
#[derive(Debug, Default, Deserialize)]
pub struct RoutesQuery {
    once: Option<String>,
    #[serde(rename = "serializeMethods")]
    serialize_methods: Option<String>,
}

impl RoutesQuery {
    pub fn once(&self) -> bool {
        self.once.as_deref() == Some("true")
    }

    /// Handlers are described unless explicitly turned off.
    pub fn serialize_methods(&self) -> bool {
        self.serialize_methods.as_deref() != Some("false")
    }
}

#[derive(Debug, Deserialize)]
struct NewRoute {
    #[serde(default)]
    path: String,
    config: Option<RouteConfig>,
}

fn mutations_allowed(state: &AppState) -> bool {
    state.config.router.allow_http_route_config
}

fn parse_config(body: &Bytes) -> Result<RouteConfig, MoxyError> {
    serde_json::from_slice(body).map_err(|e| MoxyError::Validation(format!("invalid route config: {e}")))
}

fn single(pattern: &str, config: Value) -> Value {
    let mut map = Map::new();
    map.insert(pattern.to_string(), config);
    Value::Object(map)
}

fn route_payload(state: &AppState, pattern: &str) -> Value {
    single(
        pattern,
        state.routes.route_json(pattern, true).unwrap_or(Value::Null),
    )
}

pub async fn capabilities(State(state): State<AppState>) -> Response {
    let mut api = json!({
        "GET /routes?once=false": "show router routes",
        "GET /router?once=false&serializeMethods=true": "show router",
    });

    if mutations_allowed(&state) {
        if let Value::Object(map) = &mut api {
            map.insert("POST /routes?once=false".into(), "create route".into());
            map.insert("PUT /routes/:route".into(), "create or replace route".into());
            map.insert("PATCH /routes/:route".into(), "update route".into());
            map.insert("DELETE /routes/:route".into(), "delete route".into());
        }
    }

    json_response(&api, StatusCode::OK)
}

pub async fn list_routes(State(state): State<AppState>, Query(query): Query<RoutesQuery>) -> Response {
    json_response(&json!(state.routes.list(query.once())), StatusCode::OK)
}

pub async fn show_router(State(state): State<AppState>, Query(query): Query<RoutesQuery>) -> Response {
    json_response(
        &state.routes.dump(query.once(), query.serialize_methods()),
        StatusCode::OK,
    )
}

pub async fn create_route(
    State(state): State<AppState>,
    Query(query): Query<RoutesQuery>,
    body: Bytes,
) -> Response {
    if !mutations_allowed(&state) {
        return not_found();
    }

    let route: NewRoute = match serde_json::from_slice(&body) {
        Ok(route) => route,
        Err(e) => return error_response(&MoxyError::Validation(format!("invalid route body: {e}"))),
    };
    if route.path.is_empty() {
        return error_response(&MoxyError::Validation("route must contain \"path\"".into()));
    }
    let Some(config) = route.config else {
        return error_response(&MoxyError::Validation("route must contain \"config\"".into()));
    };

    let options = AddRouteOptions {
        once: query.once(),
        ..Default::default()
    };
    if let Err(e) = state.routes.add_route(&route.path, config, options) {
        return error_response(&e);
    }
    tracing::info!(path = %route.path, once = options.once, "Route created via admin API");

    let payload = if options.once {
        state
            .routes
            .last_once_json(true)
            .map(|(pattern, config)| single(&pattern, config))
            .unwrap_or(Value::Null)
    } else {
        route_payload(&state, &route.path)
    };
    json_response(&payload, StatusCode::OK)
}

pub async fn put_route(State(state): State<AppState>, Path(route): Path<String>, body: Bytes) -> Response {
    if !mutations_allowed(&state) {
        return not_found();
    }
    let pattern = format!("/{route}");

    let replaced = match parse_config(&body).and_then(|config| state.routes.replace_route(&pattern, config)) {
        Ok(replaced) => replaced,
        Err(e) => return error_response(&e),
    };
    tracing::info!(path = %pattern, replaced, "Route stored via admin API");

    let status = if replaced {
        StatusCode::OK
    } else {
        StatusCode::CREATED
    };
    json_response(&route_payload(&state, &pattern), status)
}

pub async fn patch_route(State(state): State<AppState>, Path(route): Path<String>, body: Bytes) -> Response {
    if !mutations_allowed(&state) {
        return not_found();
    }
    let pattern = format!("/{route}");
    if !state.routes.contains(&pattern) {
        return not_found();
    }

    let result = parse_config(&body)
        .and_then(|config| state.routes.add_route(&pattern, config, AddRouteOptions::default()));
    if let Err(e) = result {
        return error_response(&e);
    }
    tracing::info!(path = %pattern, "Route updated via admin API");

    json_response(&route_payload(&state, &pattern), StatusCode::OK)
}

pub async fn delete_route(State(state): State<AppState>, Path(route): Path<String>) -> Response {
    if !mutations_allowed(&state) {
        return not_found();
    }
    let pattern = format!("/{route}");
    let removed = state.routes.remove_route(&pattern);
    tracing::info!(path = %pattern, removed, "Route deleted via admin API");

    json_response(&json!({ "message": "Ok" }), StatusCode::OK)
}

pub async fn fallback() -> Response {
    not_found()
}
