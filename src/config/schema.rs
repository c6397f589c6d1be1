//! Configuration schema definitions.
//!
//! Every section and field is defaulted so an empty file (or no file at all)
//! yields a working server.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Root configuration for the mock server.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ServerConfig {
    /// Listener configuration (bind address).
    pub listener: ListenerConfig,

    /// Route table behaviour.
    pub router: RouterConfig,

    /// Static file serving.
    pub files: FilesConfig,

    /// Outbound proxy client.
    pub proxy: ProxyClientConfig,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    pub admin: AdminConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address. Port 0 picks a free port.
    pub bind_address: String,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:0".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct RouterConfig {
    /// Enables POST/PUT/PATCH/DELETE under `/_moxy/routes`.
    pub allow_http_route_config: bool,

    /// Folders bulk-loaded at startup.
    pub route_dirs: Vec<PathBuf>,

    /// Reload route files when they change.
    pub watch: bool,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct FilesConfig {
    /// Base directory for file-string routes.
    pub root: PathBuf,
}

impl Default for FilesConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("."),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ProxyClientConfig {
    /// Outbound connect timeout in milliseconds.
    pub connect_timeout_ms: u64,
}

impl Default for ProxyClientConfig {
    fn default() -> Self {
        Self {
            connect_timeout_ms: 5_000,
        }
    }
}

/// Timeout configuration.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Global request timeout in seconds. 0 disables it.
    pub request_secs: u64,
}

/// Admin surface configuration.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct AdminConfig {
    /// When non-empty, `/_moxy` requires `Authorization: Bearer <key>`.
    pub api_key: String,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: false,
            metrics_address: "127.0.0.1:9090".to_string(),
        }
    }
}
