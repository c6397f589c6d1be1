//! HTTP serving subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, request ID, tracing, panic capture)
//!     → dispatcher.rs (admin delegation, route resolution, delay)
//!     → one of:
//!         user handler (request.rs body access)
//!         files.rs (static file from the files root)
//!         proxy.rs (stream to upstream and back)
//!         response.rs (literal response with substitution)
//!     → Send to client
//! ```

pub mod dispatcher;
pub mod files;
pub mod inflight;
pub mod proxy;
pub mod request;
pub mod response;
pub mod server;

pub use request::{MockRequest, X_REQUEST_ID};
pub use response::{json_response, text_response};
pub use server::{AppState, MockServer, RunningServer};
