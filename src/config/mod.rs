//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! moxy.toml
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → ServerConfig (validated, immutable)
//!     → CLI flags override individual fields (main.rs)
//!
//! Route folders:
//!     watcher.rs detects route file change
//!     → routing::loader reloads the folder
//!     → RouteTable merges the new definitions
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; only routes hot-reload
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;
pub mod watcher;

pub use loader::{load_config, ConfigError};
pub use schema::ServerConfig;
pub use watcher::RouteWatcher;
