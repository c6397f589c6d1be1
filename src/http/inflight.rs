//! Registry of requests currently being served.
//!
//! Entries are keyed by a server-assigned sequence number, not by the
//! client-supplied request ID, and removed by a drop guard, so a request
//! whose connection goes away mid-handler never lingers.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use axum::http::Method;
use dashmap::DashMap;

use crate::error::MoxyError;

#[derive(Debug, Clone)]
pub struct InFlightRequest {
    pub request_id: String,
    pub method: Method,
    pub url: String,
    pub started: Instant,
}

#[derive(Clone, Default)]
pub struct InFlight {
    requests: Arc<DashMap<u64, InFlightRequest>>,
    next_key: Arc<AtomicU64>,
}

impl InFlight {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a request until the returned guard is dropped.
    pub fn track(&self, request_id: &str, method: &Method, url: &str) -> InFlightGuard {
        let key = self.next_key.fetch_add(1, Ordering::Relaxed);
        self.requests.insert(
            key,
            InFlightRequest {
                request_id: request_id.to_string(),
                method: method.clone(),
                url: url.to_string(),
                started: Instant::now(),
            },
        );
        InFlightGuard {
            requests: self.requests.clone(),
            key,
        }
    }

    pub fn len(&self) -> usize {
        self.requests.len()
    }

    pub fn is_empty(&self) -> bool {
        self.requests.is_empty()
    }

    pub fn get(&self, key: u64) -> Option<InFlightRequest> {
        self.requests.get(&key).map(|entry| entry.value().clone())
    }
}

/// Removes its request from the registry on drop.
pub struct InFlightGuard {
    requests: Arc<DashMap<u64, InFlightRequest>>,
    key: u64,
}

impl InFlightGuard {
    pub fn key(&self) -> u64 {
        self.key
    }

    /// Log a handler failure with what the registry knows about the request.
    pub fn report_failure(&self, err: &MoxyError) {
        let Some(req) = self.requests.get(&self.key).map(|entry| entry.value().clone()) else {
            tracing::error!(error = %err, "Handler failed");
            return;
        };
        tracing::error!(
            request_id = %req.request_id,
            method = %req.method,
            url = %req.url,
            elapsed_ms = req.started.elapsed().as_millis() as u64,
            status = err.status().as_u16(),
            error = %err,
            "Handler failed"
        );
    }
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.requests.remove(&self.key);
    }
}
