//! Outbound request forwarding.
//!
//! # Responsibilities
//! - Merge the target url with per-route proxy options
//! - Stream the inbound body upstream and the upstream response back
//! - Turn upstream failures into tagged 502 / 504 / 500 responses
//!
//! # Design Decisions
//! - Status and headers are relayed verbatim; no redirects are followed
//! - The timeout covers waiting for the upstream response head; on expiry
//!   the outbound future is dropped and the inbound connection is closed
//! - Any scheme other than `http` is sent over TLS

use std::error::Error as _;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::body::{Body, HttpBody as _};
use axum::http::{header, HeaderMap, HeaderName, HeaderValue, Method, StatusCode};
use axum::response::Response;
use futures_util::TryStreamExt;
use indexmap::IndexMap;
use serde::Serialize;
use serde_json::json;

use crate::config::schema::ProxyClientConfig;
use crate::error::MoxyError;
use crate::http::request::MockRequest;
use crate::http::response::{json_response, with_moxy_error};
use crate::observability::metrics;
use crate::routing::config::ProxyOptions;

/// Connection-scoped headers that must not be relayed.
const HOP_BY_HOP: [&str; 7] = [
    "connection",
    "keep-alive",
    "proxy-connection",
    "te",
    "trailer",
    "transfer-encoding",
    "upgrade",
];

fn strip_hop_by_hop(headers: &mut HeaderMap) {
    for name in HOP_BY_HOP {
        headers.remove(name);
    }
}

/// Fully merged outbound request settings.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OutboundOptions {
    pub protocol: String,
    pub hostname: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,
    pub path: String,
    pub method: String,
    #[serde(skip_serializing_if = "IndexMap::is_empty")]
    pub headers: IndexMap<String, String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout: Option<u64>,
}

impl OutboundOptions {
    /// Defaults come from `target`; every option that is set wins.
    pub fn merge(target: &str, options: &ProxyOptions, inbound: &Method) -> Result<Self, MoxyError> {
        let url = url::Url::parse(target)
            .map_err(|e| MoxyError::Upstream(format!("invalid proxy target {target:?}: {e}")))?;

        let mut path = url.path().to_string();
        if let Some(query) = url.query() {
            path.push('?');
            path.push_str(query);
        }

        let protocol = options
            .protocol
            .as_deref()
            .unwrap_or(url.scheme())
            .trim_end_matches(':')
            .to_ascii_lowercase();

        let hostname = options
            .hostname
            .clone()
            .or_else(|| url.host_str().map(str::to_string))
            .ok_or_else(|| MoxyError::Upstream(format!("proxy target {target:?} has no host")))?;

        Ok(Self {
            protocol,
            hostname,
            port: options.port.or_else(|| url.port()),
            path: options.path.clone().unwrap_or(path),
            method: options
                .method
                .clone()
                .unwrap_or_else(|| inbound.as_str().to_string())
                .to_ascii_uppercase(),
            headers: options.headers.clone(),
            timeout: options.timeout,
        })
    }

    pub fn scheme(&self) -> &'static str {
        if self.protocol == "http" {
            "http"
        } else {
            "https"
        }
    }

    pub fn url(&self) -> String {
        let path = if self.path.starts_with('/') {
            self.path.clone()
        } else {
            format!("/{}", self.path)
        };
        match self.port {
            Some(port) => format!("{}://{}:{}{}", self.scheme(), self.hostname, port, path),
            None => format!("{}://{}{}", self.scheme(), self.hostname, path),
        }
    }

    /// Inbound headers, overridden by configured ones, with `Host` set to
    /// the target hostname.
    pub fn outbound_headers(&self, inbound: &HeaderMap) -> HeaderMap {
        let mut headers = inbound.clone();
        strip_hop_by_hop(&mut headers);
        for (name, value) in &self.headers {
            match (
                HeaderName::from_bytes(name.as_bytes()),
                HeaderValue::from_str(value),
            ) {
                (Ok(name), Ok(value)) => {
                    headers.insert(name, value);
                }
                _ => tracing::warn!(header = %name, "Skipping invalid proxy header"),
            }
        }
        if let Ok(host) = HeaderValue::from_str(&self.hostname) {
            headers.insert(header::HOST, host);
        }
        headers
    }
}

/// Relays matched requests to an upstream server.
#[derive(Clone)]
pub struct ProxyForwarder {
    client: reqwest::Client,
}

impl ProxyForwarder {
    pub fn new(config: &ProxyClientConfig) -> Result<Self, MoxyError> {
        let client = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .no_proxy()
            .connect_timeout(Duration::from_millis(config.connect_timeout_ms))
            .build()
            .map_err(|e| MoxyError::Upstream(format!("failed to build proxy client: {e}")))?;
        Ok(Self { client })
    }

    /// Forward `request` to `target`, returning the upstream response or a
    /// tagged failure response.
    pub async fn forward(&self, request: MockRequest, target: &str, options: &ProxyOptions) -> Response {
        let request_id = request.id().to_string();
        let outbound = match OutboundOptions::merge(target, options, request.method()) {
            Ok(outbound) => outbound,
            Err(e) => {
                tracing::warn!(request_id = %request_id, target = %target, error = %e, "Bad proxy target");
                return proxy_error(json!({ "code": "EINVAL", "error": e.to_string() }));
            }
        };

        let method = match Method::from_bytes(outbound.method.as_bytes()) {
            Ok(method) => method,
            Err(_) => {
                return proxy_error(json!({ "code": "EINVAL", "error": format!("invalid method {:?}", outbound.method) }));
            }
        };

        let (parts, body) = request.into_parts();
        let headers = outbound.outbound_headers(&parts.headers);
        let has_body = !body.is_end_stream();

        let inbound_failure: Arc<Mutex<Option<String>>> = Arc::default();
        let failure_slot = inbound_failure.clone();
        let stream = body.into_data_stream().inspect_err(move |e| {
            if let Ok(mut slot) = failure_slot.lock() {
                slot.get_or_insert_with(|| e.to_string());
            }
        });

        let url = outbound.url();
        tracing::debug!(request_id = %request_id, method = %method, url = %url, "Proxying request");

        let mut builder = self.client.request(method, &url).headers(headers);
        if has_body {
            builder = builder.body(reqwest::Body::wrap_stream(stream));
        }
        let send = builder.send();

        let result = match outbound.timeout {
            Some(ms) => match tokio::time::timeout(Duration::from_millis(ms), send).await {
                Ok(result) => result,
                Err(_) => {
                    tracing::warn!(request_id = %request_id, url = %url, timeout_ms = ms, "Proxy timeout");
                    metrics::record_proxy_failure("timeout");
                    return timeout_response(&outbound);
                }
            },
            None => send.await,
        };

        match result {
            Ok(upstream) => relay(upstream),
            Err(e) => {
                let inbound_error = inbound_failure.lock().ok().and_then(|slot| slot.clone());
                if let Some(detail) = inbound_error {
                    tracing::warn!(request_id = %request_id, error = %detail, "Inbound request stream failed");
                    metrics::record_proxy_failure("request");
                    let status = MoxyError::RequestStream(detail.clone()).status();
                    return with_moxy_error(
                        json_response(&json!({ "status": status.as_u16(), "message": detail }), status),
                        "request error",
                    );
                }

                tracing::warn!(request_id = %request_id, url = %url, error = %e, "Upstream error");
                metrics::record_proxy_failure("upstream");
                proxy_error(describe_upstream_error(&e, &outbound))
            }
        }
    }
}

fn relay(upstream: reqwest::Response) -> Response {
    let status = upstream.status();
    let mut headers = upstream.headers().clone();
    strip_hop_by_hop(&mut headers);

    let mut response = Response::new(Body::from_stream(upstream.bytes_stream()));
    *response.status_mut() = status;
    *response.headers_mut() = headers;
    response
}

fn proxy_error(message: serde_json::Value) -> Response {
    with_moxy_error(
        json_response(&json!({ "status": 502, "message": message }), StatusCode::BAD_GATEWAY),
        "proxy error",
    )
}

fn timeout_response(outbound: &OutboundOptions) -> Response {
    let err = MoxyError::UpstreamTimeout;
    let mut response = with_moxy_error(
        json_response(
            &json!({ "status": err.status().as_u16(), "message": err.to_string(), "options": outbound }),
            err.status(),
        ),
        "proxy timeout",
    );
    response
        .headers_mut()
        .insert(header::CONNECTION, HeaderValue::from_static("close"));
    response
}

/// Error code in the style of socket errnos, plus the address tried.
fn describe_upstream_error(err: &reqwest::Error, outbound: &OutboundOptions) -> serde_json::Value {
    let io_kind = std::iter::successors(err.source(), |&e| e.source())
        .find_map(|e| e.downcast_ref::<std::io::Error>())
        .map(std::io::Error::kind);

    let code = match io_kind {
        Some(std::io::ErrorKind::ConnectionRefused) => "ECONNREFUSED",
        Some(std::io::ErrorKind::ConnectionReset) => "ECONNRESET",
        Some(std::io::ErrorKind::TimedOut) => "ETIMEDOUT",
        _ if err.is_timeout() => "ETIMEDOUT",
        _ if err.is_connect() => "ECONNECT",
        _ => "EPROTO",
    };

    json!({
        "code": code,
        "syscall": if err.is_connect() { "connect" } else { "request" },
        "address": outbound.hostname,
        "port": outbound.port,
        "error": err.to_string(),
    })
}
