//! Administrative API under `/_moxy`.
//!
//! Read endpoints are always available. Route mutation is only enabled
//! with `router.allow_http_route_config`; otherwise those endpoints answer
//! 404 like any unknown path.

pub mod auth;
pub mod handlers;

use std::sync::Arc;

use axum::{
    middleware,
    routing::{get, put},
    Router,
};

use self::auth::admin_auth_middleware;
use self::handlers::*;
use crate::config::ServerConfig;
use crate::http::server::AppState;

pub fn setup_admin_router(config: &ServerConfig) -> Router<AppState> {
    let router = Router::new()
        .route("/_moxy", get(capabilities).fallback(fallback))
        .route(
            "/_moxy/routes",
            get(list_routes).post(create_route).fallback(fallback),
        )
        .route("/_moxy/router", get(show_router).fallback(fallback))
        .route(
            "/_moxy/routes/{*route}",
            put(put_route)
                .patch(patch_route)
                .delete(delete_route)
                .fallback(fallback),
        )
        .fallback(fallback);

    if config.admin.api_key.is_empty() {
        return router;
    }

    let api_key: Arc<str> = Arc::from(config.admin.api_key.as_str());
    router.layer(middleware::from_fn_with_state(api_key, admin_auth_middleware))
}
