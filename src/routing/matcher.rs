//! Per-entry match resolution.
//!
//! # Responsibilities
//! - Pick the verb config (falling back to `all`)
//! - Pick proxy settings (verb level first, then path level)
//! - Run the compiled matcher and merge captures with query parameters
//! - Decide which of the four response kinds applies
//!
//! # Design Decisions
//! - Pure and synchronous: the table runs it under its lock so a once-route
//!   can be matched and removed in one step
//! - `None` means "keep scanning", never an error

use std::time::Duration;

use axum::http::Method;

use crate::routing::config::{Handler, MethodConfig, ProxyOptions, ResponseSpec, RouteConfig};
use crate::routing::table::RouteEntry;
use crate::routing::variables::{parse_query, request_path, Variables};

/// The parts of a request that routing looks at.
#[derive(Debug, Clone)]
pub struct RequestTarget {
    /// Lowercased verb.
    pub method: String,
    /// Raw request target: path plus query.
    pub url: String,
    pub query: Variables,
}

impl RequestTarget {
    pub fn new(method: &Method, url: impl Into<String>) -> Self {
        let url = url.into();
        Self {
            method: method.as_str().to_ascii_lowercase(),
            query: parse_query(&url),
            url,
        }
    }

    pub fn path(&self) -> &str {
        request_path(&self.url)
    }
}

/// What the dispatcher has to do for a matched request.
#[derive(Debug, Clone)]
pub enum Action {
    /// Catch-all handler bound to the whole pattern.
    RouteHandler(Handler),
    MethodHandler(Handler),
    /// File path before substitution.
    File(String),
    /// Target url before substitution.
    Proxy { target: String, options: ProxyOptions },
    Respond(ResponseSpec),
}

impl Action {
    /// Short label used in logs and metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            Action::RouteHandler(_) | Action::MethodHandler(_) => "handler",
            Action::File(_) => "file",
            Action::Proxy { .. } => "proxy",
            Action::Respond(_) => "response",
        }
    }
}

/// A successful match.
#[derive(Debug, Clone)]
pub struct Resolution {
    /// Registered pattern text that matched.
    pub pattern: String,
    pub variables: Variables,
    pub delay: Option<Duration>,
    pub action: Action,
}

/// Try one entry against a request.
pub fn try_match(entry: &RouteEntry, target: &RequestTarget) -> Option<Resolution> {
    let (path_config, method_config) = match &entry.config {
        RouteConfig::Handler(_) | RouteConfig::File(_) => (None, None),
        RouteConfig::Methods(cfg) => (Some(cfg), cfg.resolve(&target.method)),
    };

    let method_proxy = match method_config {
        Some(MethodConfig::Respond(spec)) => spec
            .proxy
            .as_ref()
            .map(|target| (target.clone(), spec.proxy_options.clone().unwrap_or_default())),
        _ => None,
    };
    let proxy = method_proxy.or_else(|| {
        path_config.and_then(|cfg| {
            cfg.proxy
                .as_ref()
                .map(|target| (target.clone(), cfg.proxy_options.clone().unwrap_or_default()))
        })
    });

    let is_whole_route = matches!(entry.config, RouteConfig::Handler(_) | RouteConfig::File(_));
    if method_config.is_none() && proxy.is_none() && !is_whole_route {
        return None;
    }

    let mut variables = entry.matcher.match_url(&entry.pattern, &target.url)?;
    for (name, value) in &target.query {
        variables.insert(name.clone(), value.clone());
    }

    let method_delay = match method_config {
        Some(MethodConfig::Respond(spec)) => spec.delay,
        _ => None,
    };
    let delay = method_delay
        .or_else(|| path_config.and_then(|cfg| cfg.delay))
        .filter(|ms| *ms > 0)
        .map(Duration::from_millis);

    let action = match (&entry.config, method_config, proxy) {
        (RouteConfig::Handler(handler), _, _) => Action::RouteHandler(handler.clone()),
        (RouteConfig::File(path), _, _) => Action::File(path.clone()),
        (_, Some(MethodConfig::Handler(handler)), _) => Action::MethodHandler(handler.clone()),
        (_, Some(MethodConfig::File(path)), _) => Action::File(path.clone()),
        (_, _, Some((target, options))) => Action::Proxy { target, options },
        (_, Some(MethodConfig::Respond(spec)), None) => Action::Respond(spec.clone()),
        (_, None, None) => return None,
    };

    Some(Resolution {
        pattern: entry.pattern.clone(),
        variables,
        delay,
        action,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::routing::config::PathConfig;
    use crate::routing::variables::VarValue;

    fn entry(pattern: &str, config: impl Into<RouteConfig>, exact: bool) -> RouteEntry {
        RouteEntry::new(pattern, config.into(), exact).unwrap()
    }

    fn get(url: &str) -> RequestTarget {
        RequestTarget::new(&Method::GET, url)
    }

    #[test]
    fn test_missing_verb_is_no_match() {
        let e = entry("/hello/world", PathConfig::new().get(ResponseSpec::new(200)), false);
        assert!(try_match(&e, &RequestTarget::new(&Method::POST, "/hello/world")).is_none());
        assert!(try_match(&e, &get("/hello/world")).is_some());
    }

    #[test]
    fn test_query_overrides_capture() {
        let e = entry("/users/:id", PathConfig::new().get(ResponseSpec::new(200)), false);
        let res = try_match(&e, &get("/users/7?id=8&extra=1")).unwrap();
        assert_eq!(res.variables.get("id"), Some(&VarValue::from("8")));
        assert_eq!(res.variables.get("extra"), Some(&VarValue::from("1")));
    }

    #[test]
    fn test_path_level_proxy_applies_to_every_verb() {
        let e = entry(
            "/proxied(?<path>.*)",
            PathConfig::new().proxy("http://localhost:1:path"),
            false,
        );
        let res = try_match(&e, &RequestTarget::new(&Method::DELETE, "/proxied/x")).unwrap();
        match res.action {
            Action::Proxy { target, .. } => assert_eq!(target, "http://localhost:1:path"),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_file_string_beats_proxy() {
        let e = entry(
            "/mixed",
            PathConfig::new().proxy("http://localhost:1").get("/public/index.html"),
            false,
        );
        assert!(matches!(try_match(&e, &get("/mixed")).unwrap().action, Action::File(_)));
    }

    #[test]
    fn test_method_delay_wins() {
        let e = entry(
            "/glacial/",
            PathConfig::new()
                .delay(100)
                .get(ResponseSpec::new(204).delay(250))
                .delete(ResponseSpec::new(204)),
            false,
        );
        assert_eq!(try_match(&e, &get("/glacial/")).unwrap().delay, Some(Duration::from_millis(250)));
        assert_eq!(
            try_match(&e, &RequestTarget::new(&Method::DELETE, "/glacial/")).unwrap().delay,
            Some(Duration::from_millis(100))
        );
    }

    #[test]
    fn test_exact_entry_uses_query_only() {
        let e = entry("/route/:ignored/.*", PathConfig::new().all(ResponseSpec::new(200)), true);
        let res = try_match(&e, &get("/route/:ignored/.*?a=b")).unwrap();
        assert_eq!(res.variables.len(), 1);
        assert!(try_match(&e, &get("/route/ignored/path")).is_none());
    }

    #[test]
    fn test_path_level_file_serves_every_verb() {
        let e = entry("/assets/(?<file>.*)", "/www-data/:file", false);
        for method in [Method::GET, Method::POST, Method::DELETE] {
            let res = try_match(&e, &RequestTarget::new(&method, "/assets/app.css")).unwrap();
            assert!(matches!(&res.action, Action::File(p) if p == "/www-data/:file"));
            assert_eq!(res.variables.get("file"), Some(&VarValue::from("app.css")));
        }
    }

    #[test]
    fn test_route_handler_ignores_verb_table() {
        let handler = RouteConfig::handler(|_req, _vars| async {
            Ok(axum::response::IntoResponse::into_response("ok"))
        });
        let e = entry("/manual", handler, false);
        let res = try_match(&e, &RequestTarget::new(&Method::PUT, "/manual")).unwrap();
        assert!(matches!(res.action, Action::RouteHandler(_)));
        assert_eq!(res.action.kind(), "handler");
    }
}
