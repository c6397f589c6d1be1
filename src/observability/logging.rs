//! Structured logging.
//!
//! # Responsibilities
//! - Install the global tracing subscriber
//! - Pick the filter from `MOXY_LOG`, then `RUST_LOG`, then configuration
//!
//! # Design Decisions
//! - `quiet` raises the floor to `error` unless an env filter is set
//! - `try_init` so tests and embedders can install their own subscriber

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

pub const LOG_ENV: &str = "MOXY_LOG";

/// Filter directives used when no environment override is present.
pub fn default_directives(level: &str, quiet: bool) -> String {
    let level = if quiet { "error" } else { level };
    format!("moxy={level},tower_http={level}")
}

pub fn init(level: &str, quiet: bool) {
    let filter = EnvFilter::try_from_env(LOG_ENV)
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| EnvFilter::new(default_directives(level, quiet)));

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .try_init();
}
