//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Registration:
//!     pattern + RouteConfig
//!     → pattern.rs (placeholders → named groups, anchored regex)
//!     → table.rs (merge into persistent table, or append to once list)
//!
//! Incoming request (method, url):
//!     → table.rs: once-routes → literal url/path entry → ordered scan
//!     → matcher.rs (verb lookup, proxy settings, captures + query)
//!     → Resolution { variables, delay, action }
//!     → substitute.rs (`:name` tokens in bodies, file paths, proxy urls)
//! ```
//!
//! # Design Decisions
//! - Registration order is precedence; first match wins
//! - Regex is only used where a pattern asks for it; exact routes compare text
//! - No-match is `None`, never an error

pub mod config;
pub mod loader;
pub mod matcher;
pub mod pattern;
pub mod substitute;
pub mod table;
pub mod variables;

pub use config::{Handler, MethodConfig, PathConfig, ProxyOptions, ResponseSpec, RouteConfig, Routes};
pub use matcher::{Action, RequestTarget, Resolution};
pub use table::{AddRouteOptions, RouteTable};
pub use variables::{VarValue, Variables};
