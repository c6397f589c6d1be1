//! Moxy mock server binary.
//!
//! # Architecture Overview
//!
//! ```text
//!     Client Request
//!     ──────────────▶ http::server (request id, trace, panic capture)
//!                         │
//!                         ▼
//!                     http::dispatcher ──── /_moxy ───▶ admin
//!                         │
//!                         ▼
//!                     routing::table ◀──── routing::loader ◀── config::watcher
//!                         │
//!         ┌───────────────┼────────────────┬──────────────┐
//!         ▼               ▼                ▼              ▼
//!     handler        http::files      http::proxy   literal response
//! ```

use std::path::PathBuf;

use clap::Parser;
use tokio::net::TcpListener;

use moxy::config::validation::validate_config;
use moxy::config::{load_config, ConfigError, RouteWatcher, ServerConfig};
use moxy::lifecycle::{signals, Shutdown};
use moxy::observability::{logging, metrics};
use moxy::MockServer;

/// Start a mocking server.
#[derive(Debug, Parser)]
#[command(name = "moxy", version, about)]
struct Args {
    /// TOML configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Add routes from FOLDER. Repeatable; also accepts a comma-separated list.
    #[arg(short, long = "route", value_name = "FOLDER", value_delimiter = ',')]
    routes: Vec<PathBuf>,

    /// Port to listen on. 0 picks a free port.
    #[arg(short, long, env = "PORT")]
    port: Option<u16>,

    /// Only log errors.
    #[arg(short, long)]
    quiet: bool,

    /// Allow route configuration through the HTTP admin API.
    #[arg(short, long, alias = "allowHttpRouteConfig")]
    allow_http_route_config: bool,

    /// Reload route folders when their files change.
    #[arg(short, long)]
    watch: bool,
}

impl Args {
    fn apply(&self, config: &mut ServerConfig) -> std::io::Result<()> {
        if let Some(port) = self.port {
            let host = config
                .listener
                .bind_address
                .rsplit_once(':')
                .map(|(host, _)| host.to_string())
                .unwrap_or_else(|| "0.0.0.0".to_string());
            config.listener.bind_address = format!("{host}:{port}");
        }
        for dir in &self.routes {
            config.router.route_dirs.push(dir.canonicalize()?);
        }
        config.router.allow_http_route_config |= self.allow_http_route_config;
        config.router.watch |= self.watch;
        Ok(())
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => load_config(path)?,
        None => ServerConfig::default(),
    };
    args.apply(&mut config)?;
    validate_config(&config).map_err(ConfigError::Validation)?;

    logging::init(&config.observability.log_level, args.quiet);
    tracing::info!("moxy v{} starting", env!("CARGO_PKG_VERSION"));

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let route_dirs = config.router.route_dirs.clone();
    let watch = config.router.watch;
    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    let server = MockServer::new(config)?;

    for dir in &route_dirs {
        let files = server.add_routes_from_folder(dir)?;
        tracing::info!(folder = %dir.display(), files, "Route folder loaded");
    }

    let _watcher = if watch && !route_dirs.is_empty() {
        Some(RouteWatcher::new(route_dirs, server.routes()).run()?)
    } else {
        None
    };

    let shutdown = Shutdown::new();
    signals::install(shutdown.clone());

    server.run(listener, shutdown.subscribe()).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
