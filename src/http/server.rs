//! HTTP server setup and the programmatic mock server API.
//!
//! # Responsibilities
//! - Own the route table, proxy client and in-flight registry
//! - Expose route registration (`on`, `once`, `on_all`, `off`, ...)
//! - Build the Axum router and wire up middleware (tracing, request ID,
//!   panic capture, optional global timeout)
//! - Serve on a listener until the shutdown broadcast fires

use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use axum::http::StatusCode;
use axum::response::Response;
use axum::Router;
use serde_json::json;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tower_http::{
    catch_panic::CatchPanicLayer,
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::admin::setup_admin_router;
use crate::config::ServerConfig;
use crate::error::Result;
use crate::http::dispatcher::dispatch;
use crate::http::inflight::InFlight;
use crate::http::proxy::ProxyForwarder;
use crate::http::response::json_response;
use crate::lifecycle::{shutdown, Shutdown};
use crate::routing::loader::{load_routes_from_folder, LoadError};
use crate::routing::{AddRouteOptions, RouteConfig, RouteTable, Routes};

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub routes: Arc<RouteTable>,
    pub proxy: ProxyForwarder,
    pub inflight: InFlight,
    pub config: Arc<ServerConfig>,
    /// Admin routes, given this state when a request reaches `/_moxy`.
    pub admin: Router<AppState>,
}

/// A mock HTTP server: a route table plus the machinery to serve it.
pub struct MockServer {
    state: AppState,
}

impl MockServer {
    pub fn new(config: ServerConfig) -> Result<Self> {
        let admin = setup_admin_router(&config);
        let state = AppState {
            routes: Arc::new(RouteTable::new()),
            proxy: ProxyForwarder::new(&config.proxy)?,
            inflight: InFlight::new(),
            config: Arc::new(config),
            admin,
        };
        Ok(Self { state })
    }

    pub fn config(&self) -> &ServerConfig {
        &self.state.config
    }

    /// Shared handle to the route table; stays valid after `listen`.
    pub fn routes(&self) -> Arc<RouteTable> {
        self.state.routes.clone()
    }

    pub fn inflight(&self) -> InFlight {
        self.state.inflight.clone()
    }

    pub fn on(&self, pattern: &str, config: impl Into<RouteConfig>) -> Result<&Self> {
        self.on_with(pattern, config, AddRouteOptions::default())
    }

    pub fn on_with(
        &self,
        pattern: &str,
        config: impl Into<RouteConfig>,
        options: AddRouteOptions,
    ) -> Result<&Self> {
        self.state.routes.add_route(pattern, config, options)?;
        Ok(self)
    }

    /// Register a route that is removed after its first match.
    pub fn once(&self, pattern: &str, config: impl Into<RouteConfig>) -> Result<&Self> {
        self.on_with(pattern, config, AddRouteOptions::once())
    }

    /// Register a pattern-keyed map of routes under `prefix`.
    pub fn on_all(&self, prefix: &str, routes: Routes, options: AddRouteOptions) -> Result<&Self> {
        self.state.routes.add_routes(prefix, routes, options)?;
        Ok(self)
    }

    pub fn off(&self, pattern: &str) -> &Self {
        self.state.routes.remove_route(pattern);
        self
    }

    pub fn reset_routes(&self) -> &Self {
        self.state.routes.reset_all();
        self
    }

    /// Load every route file under `root`. Returns the number of files.
    pub fn add_routes_from_folder(&self, root: impl AsRef<Path>) -> std::result::Result<usize, LoadError> {
        load_routes_from_folder(&self.state.routes, root.as_ref())
    }

    /// The fully layered Axum router serving this mock.
    #[allow(deprecated)]
    pub fn router(&self) -> Router {
        let mut router = Router::new()
            .fallback(dispatch)
            .with_state(self.state.clone());

        let request_secs = self.state.config.timeouts.request_secs;
        if request_secs > 0 {
            router = router.layer(TimeoutLayer::new(Duration::from_secs(request_secs)));
        }

        router
            .layer(CatchPanicLayer::custom(panic_response))
            .layer(PropagateRequestIdLayer::x_request_id())
            .layer(TraceLayer::new_for_http())
            .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
    }

    pub fn into_router(self) -> Router {
        self.router()
    }

    /// Serve on `listener` until `shutdown` fires.
    pub async fn run(self, listener: TcpListener, shutdown: broadcast::Receiver<()>) -> std::io::Result<()> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "Mock server listening");

        axum::serve(listener, self.router())
            .with_graceful_shutdown(shutdown::wait(shutdown))
            .await?;

        tracing::info!(address = %addr, "Mock server stopped");
        Ok(())
    }

    /// Bind `addr` and serve in the background.
    pub async fn listen(self, addr: &str) -> std::io::Result<RunningServer> {
        let listener = TcpListener::bind(addr).await?;
        let local_addr = listener.local_addr()?;
        let routes = self.routes();
        let shutdown = Shutdown::new();
        let task = tokio::spawn(self.run(listener, shutdown.subscribe()));

        Ok(RunningServer {
            addr: local_addr,
            routes,
            shutdown,
            task,
        })
    }
}

/// Handle to a server started with [`MockServer::listen`].
pub struct RunningServer {
    addr: SocketAddr,
    routes: Arc<RouteTable>,
    shutdown: Shutdown,
    task: JoinHandle<std::io::Result<()>>,
}

impl RunningServer {
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    pub fn port(&self) -> u16 {
        self.addr.port()
    }

    /// Absolute url for `path` on this server.
    pub fn url(&self, path: &str) -> String {
        format!("http://127.0.0.1:{}{}", self.addr.port(), path)
    }

    pub fn routes(&self) -> &RouteTable {
        &self.routes
    }

    /// Stop accepting and wait for open connections to finish.
    pub async fn close(self) -> std::io::Result<()> {
        self.shutdown.trigger();
        match self.task.await {
            Ok(result) => result,
            Err(e) => Err(std::io::Error::other(e)),
        }
    }

    /// Stop immediately, dropping open connections.
    pub fn abort(self) {
        self.task.abort();
    }
}

fn panic_response(err: Box<dyn std::any::Any + Send + 'static>) -> Response {
    let detail = err
        .downcast_ref::<String>()
        .map(String::as_str)
        .or_else(|| err.downcast_ref::<&str>().copied())
        .unwrap_or("handler panicked");

    tracing::error!(error = %detail, "Request handler panicked");
    json_response(
        &json!({ "status": 500, "error": detail }),
        StatusCode::INTERNAL_SERVER_ERROR,
    )
}
