//! Moxy: a configurable mock HTTP server.
//!
//! Routes map url patterns to canned responses, files, upstream proxies or
//! custom async handlers. Routes can be registered in code, loaded from
//! `*.routes.json` / `*.routes.toml` folders, or managed at runtime through
//! the `/_moxy` admin API.

pub mod admin;
pub mod config;
pub mod error;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod routing;

pub use config::ServerConfig;
pub use error::MoxyError;
pub use http::{json_response, text_response, MockRequest, MockServer, RunningServer};
pub use lifecycle::Shutdown;
pub use routing::{
    AddRouteOptions, Handler, MethodConfig, PathConfig, ProxyOptions, ResponseSpec, RouteConfig,
    RouteTable, Routes, VarValue, Variables,
};
