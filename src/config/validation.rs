//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Parse addresses, check the log level, check route folders exist
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Pure function: `&ServerConfig → Result<(), Vec<ValidationError>>`

use std::net::SocketAddr;

use thiserror::Error;

use crate::config::schema::ServerConfig;

const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("listener.bind_address {0:?} is not a socket address")]
    BindAddress(String),

    #[error("observability.metrics_address {0:?} is not a socket address")]
    MetricsAddress(String),

    #[error("observability.log_level {0:?} is not one of trace, debug, info, warn, error")]
    LogLevel(String),

    #[error("router.route_dirs entry {0:?} is not a directory")]
    RouteDir(String),
}

pub fn validate_config(config: &ServerConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::BindAddress(config.listener.bind_address.clone()));
    }

    let obs = &config.observability;
    if obs.metrics_enabled && obs.metrics_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::MetricsAddress(obs.metrics_address.clone()));
    }

    if !LOG_LEVELS.contains(&obs.log_level.to_ascii_lowercase().as_str()) {
        errors.push(ValidationError::LogLevel(obs.log_level.clone()));
    }

    for dir in &config.router.route_dirs {
        if !dir.is_dir() {
            errors.push(ValidationError::RouteDir(dir.display().to_string()));
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        assert_eq!(validate_config(&ServerConfig::default()), Ok(()));
    }

    #[test]
    fn test_collects_every_error() {
        let mut config = ServerConfig::default();
        config.listener.bind_address = "localhost".into();
        config.observability.metrics_enabled = true;
        config.observability.metrics_address = "nope".into();
        config.observability.log_level = "loud".into();
        config.router.route_dirs = vec!["/definitely/not/here".into()];

        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors.len(), 4);
        assert!(matches!(errors[0], ValidationError::BindAddress(_)));
        assert!(matches!(errors[3], ValidationError::RouteDir(_)));
    }

    #[test]
    fn test_metrics_address_ignored_when_disabled() {
        let mut config = ServerConfig::default();
        config.observability.metrics_address = "nope".into();
        assert!(validate_config(&config).is_ok());
    }
}
