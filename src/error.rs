//! Error taxonomy shared by the routing engine and the HTTP layer.
//!
//! # Design Decisions
//! - Matching failures are never errors: they travel as `None` through the
//!   dispatch loop
//! - Every variant maps to exactly one HTTP status
//! - The JSON shape `{"status": .., "error": ..}` is the only error body

use axum::http::StatusCode;
use serde_json::json;
use thiserror::Error;

/// Errors raised while registering routes or serving a request.
#[derive(Debug, Error)]
pub enum MoxyError {
    /// Missing or malformed route registration input.
    #[error("{0}")]
    Validation(String),

    /// A route pattern did not compile to a valid regular expression.
    #[error("invalid route pattern {pattern:?}: {source}")]
    Pattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    /// Nothing is registered for the requested resource.
    #[error("Not found")]
    NotFound,

    /// The proxy target refused or dropped the connection.
    #[error("proxy error: {0}")]
    Upstream(String),

    /// The proxy target did not answer within the configured timeout.
    #[error("Proxy timeout")]
    UpstreamTimeout,

    /// The inbound request body failed while being relayed.
    #[error("request error: {0}")]
    RequestStream(String),

    /// Raised by a user handler that wants a specific status.
    #[error("{message}")]
    Http { status: StatusCode, message: String },

    /// Any other failure inside a user handler.
    #[error("{0}")]
    Handler(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl MoxyError {
    /// Convenience constructor for handler authors.
    pub fn http(status: StatusCode, message: impl Into<String>) -> Self {
        MoxyError::Http {
            status,
            message: message.into(),
        }
    }

    /// HTTP status this error surfaces as.
    pub fn status(&self) -> StatusCode {
        match self {
            MoxyError::Validation(_) | MoxyError::Pattern { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            MoxyError::NotFound => StatusCode::NOT_FOUND,
            MoxyError::Upstream(_) => StatusCode::BAD_GATEWAY,
            MoxyError::UpstreamTimeout => StatusCode::GATEWAY_TIMEOUT,
            MoxyError::Http { status, .. } => *status,
            MoxyError::RequestStream(_) | MoxyError::Handler(_) | MoxyError::Io(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// JSON body used when this error becomes a response.
    pub fn to_json(&self) -> serde_json::Value {
        json!({
            "status": self.status().as_u16(),
            "error": self.to_string(),
        })
    }
}

pub type Result<T, E = MoxyError> = std::result::Result<T, E>;
