//! Route configuration model.
//!
//! ```text
//! RouteConfig  = Methods(PathConfig) | File(path) | Handler
//! PathConfig   = { verb|all -> MethodConfig } + delay/proxy/proxyOptions/exact
//! MethodConfig = Respond(ResponseSpec) | File(path) | Handler
//! ```
//!
//! JSON and TOML route files deserialize into the same types. Handlers only
//! exist in code and render as text when a table is dumped.

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use axum::response::Response;
use indexmap::IndexMap;
use serde::de::{self, MapAccess, Visitor};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

use crate::error::MoxyError;
use crate::http::request::MockRequest;
use crate::routing::variables::Variables;

/// Method key that applies to every verb without its own entry.
pub const ALL_METHODS: &str = "all";

/// Placeholder shown instead of handler text when dumps are redacted.
pub const REDACTED_HANDLER: &str = "[Function: handler]";

pub type HandlerFuture = Pin<Box<dyn Future<Output = Result<Response, MoxyError>> + Send>>;

type HandlerFn = dyn Fn(MockRequest, Variables) -> HandlerFuture + Send + Sync;

/// User-supplied request handler.
#[derive(Clone)]
pub struct Handler {
    description: Arc<str>,
    func: Arc<HandlerFn>,
}

impl Handler {
    /// Wrap an async closure. The closure's type name is used as its
    /// displayable description.
    pub fn new<F, Fut>(func: F) -> Self
    where
        F: Fn(MockRequest, Variables) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Response, MoxyError>> + Send + 'static,
    {
        Self::named(std::any::type_name::<F>(), func)
    }

    /// Wrap an async closure with an explicit description.
    pub fn named<F, Fut>(description: impl Into<String>, func: F) -> Self
    where
        F: Fn(MockRequest, Variables) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Response, MoxyError>> + Send + 'static,
    {
        let description: String = description.into();
        Self {
            description: Arc::from(description),
            func: Arc::new(move |req: MockRequest, vars: Variables| -> HandlerFuture {
                Box::pin(func(req, vars))
            }),
        }
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn call(&self, request: MockRequest, variables: Variables) -> HandlerFuture {
        (self.func)(request, variables)
    }

    fn render(&self, expand: bool) -> Value {
        if expand {
            Value::String(self.description.to_string())
        } else {
            Value::String(REDACTED_HANDLER.to_string())
        }
    }
}

impl fmt::Debug for Handler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Handler")
            .field("description", &self.description)
            .finish()
    }
}

/// Outbound request overrides for proxied routes. Every field set here wins
/// over the value derived from the target url.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ProxyOptions {
    /// `http` or `https` (a trailing `:` is accepted).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub protocol: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hostname: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub method: Option<String>,
    #[serde(skip_serializing_if = "IndexMap::is_empty")]
    pub headers: IndexMap<String, String>,
    /// Milliseconds to wait for the upstream response head.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout: Option<u64>,
}

/// Literal response definition.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ResponseSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
    /// String bodies are sent as-is, anything else is serialized as JSON.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<Value>,
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub headers: IndexMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delay: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub proxy: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub proxy_options: Option<ProxyOptions>,
}

impl ResponseSpec {
    pub fn new(status: u16) -> Self {
        Self {
            status: Some(status),
            ..Default::default()
        }
    }

    pub fn body(mut self, body: impl Into<Value>) -> Self {
        self.body = Some(body.into());
        self
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    pub fn delay(mut self, ms: u64) -> Self {
        self.delay = Some(ms);
        self
    }

    /// Proxy this method to `target` instead of answering.
    pub fn proxy(target: impl Into<String>) -> Self {
        Self {
            proxy: Some(target.into()),
            ..Default::default()
        }
    }

    pub fn proxy_options(mut self, options: ProxyOptions) -> Self {
        self.proxy_options = Some(options);
        self
    }
}

/// What a single HTTP verb resolves to.
#[derive(Debug, Clone)]
pub enum MethodConfig {
    Respond(ResponseSpec),
    /// File path, with variable substitution.
    File(String),
    Handler(Handler),
}

impl MethodConfig {
    fn to_json(&self, expand_handlers: bool) -> Value {
        match self {
            MethodConfig::Respond(spec) => serde_json::to_value(spec).unwrap_or(Value::Null),
            MethodConfig::File(path) => Value::String(path.clone()),
            MethodConfig::Handler(handler) => handler.render(expand_handlers),
        }
    }
}

impl From<ResponseSpec> for MethodConfig {
    fn from(spec: ResponseSpec) -> Self {
        MethodConfig::Respond(spec)
    }
}

impl From<Handler> for MethodConfig {
    fn from(handler: Handler) -> Self {
        MethodConfig::Handler(handler)
    }
}

impl From<&str> for MethodConfig {
    fn from(path: &str) -> Self {
        MethodConfig::File(path.to_string())
    }
}

impl<'de> Deserialize<'de> for MethodConfig {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Repr {
            File(String),
            Respond(ResponseSpec),
        }

        Ok(match Repr::deserialize(deserializer)? {
            Repr::File(path) => MethodConfig::File(path),
            Repr::Respond(spec) => MethodConfig::Respond(spec),
        })
    }
}

/// Per-verb table plus path-level settings.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PathConfig {
    /// Path-level delay in milliseconds.
    #[serde(default)]
    pub delay: Option<u64>,
    /// Proxy target applied to every verb.
    #[serde(default)]
    pub proxy: Option<String>,
    #[serde(default)]
    pub proxy_options: Option<ProxyOptions>,
    /// Compare the pattern literally instead of compiling it.
    #[serde(default)]
    pub exact: Option<bool>,
    #[serde(flatten)]
    pub methods: IndexMap<String, MethodConfig>,
}

impl PathConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn method(mut self, verb: &str, config: impl Into<MethodConfig>) -> Self {
        self.methods.insert(verb.to_ascii_lowercase(), config.into());
        self
    }

    pub fn get(self, config: impl Into<MethodConfig>) -> Self {
        self.method("get", config)
    }

    pub fn post(self, config: impl Into<MethodConfig>) -> Self {
        self.method("post", config)
    }

    pub fn put(self, config: impl Into<MethodConfig>) -> Self {
        self.method("put", config)
    }

    pub fn patch(self, config: impl Into<MethodConfig>) -> Self {
        self.method("patch", config)
    }

    pub fn delete(self, config: impl Into<MethodConfig>) -> Self {
        self.method("delete", config)
    }

    pub fn all(self, config: impl Into<MethodConfig>) -> Self {
        self.method(ALL_METHODS, config)
    }

    pub fn delay(mut self, ms: u64) -> Self {
        self.delay = Some(ms);
        self
    }

    pub fn proxy(mut self, target: impl Into<String>) -> Self {
        self.proxy = Some(target.into());
        self
    }

    pub fn proxy_options(mut self, options: ProxyOptions) -> Self {
        self.proxy_options = Some(options);
        self
    }

    pub fn exact(mut self) -> Self {
        self.exact = Some(true);
        self
    }

    /// Config for `verb`, falling back to `all`.
    pub fn resolve(&self, verb: &str) -> Option<&MethodConfig> {
        self.methods
            .get(verb)
            .or_else(|| self.methods.get(ALL_METHODS))
    }

    /// Shallow merge: keys present in `other` replace ours, the rest stay.
    pub fn merge(&mut self, other: PathConfig) {
        if other.delay.is_some() {
            self.delay = other.delay;
        }
        if other.proxy.is_some() {
            self.proxy = other.proxy;
        }
        if other.proxy_options.is_some() {
            self.proxy_options = other.proxy_options;
        }
        if other.exact.is_some() {
            self.exact = other.exact;
        }
        for (verb, config) in other.methods {
            self.methods.insert(verb, config);
        }
    }

    fn lowercase_methods(&mut self) {
        if self.methods.keys().all(|k| !k.chars().any(|c| c.is_ascii_uppercase())) {
            return;
        }
        self.methods = std::mem::take(&mut self.methods)
            .into_iter()
            .map(|(k, v)| (k.to_ascii_lowercase(), v))
            .collect();
    }

    fn to_json(&self, expand_handlers: bool) -> Value {
        let mut out = Map::new();
        if let Some(delay) = self.delay {
            out.insert("delay".into(), Value::from(delay));
        }
        if let Some(proxy) = &self.proxy {
            out.insert("proxy".into(), Value::String(proxy.clone()));
        }
        if let Some(options) = &self.proxy_options {
            out.insert(
                "proxyOptions".into(),
                serde_json::to_value(options).unwrap_or(Value::Null),
            );
        }
        if let Some(exact) = self.exact {
            out.insert("exact".into(), Value::Bool(exact));
        }
        for (verb, config) in &self.methods {
            out.insert(verb.clone(), config.to_json(expand_handlers));
        }
        Value::Object(out)
    }
}

/// Everything that can be bound to a pattern.
#[derive(Debug, Clone)]
pub enum RouteConfig {
    Methods(PathConfig),
    /// File path served for every verb, with variable substitution.
    File(String),
    /// Catch-all handler, bypasses the verb table.
    Handler(Handler),
}

impl RouteConfig {
    /// Catch-all handler shorthand.
    pub fn handler<F, Fut>(func: F) -> Self
    where
        F: Fn(MockRequest, Variables) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Response, MoxyError>> + Send + 'static,
    {
        RouteConfig::Handler(Handler::new(func))
    }

    /// True when there is nothing to dispatch to.
    pub fn is_empty(&self) -> bool {
        match self {
            RouteConfig::Handler(_) => false,
            RouteConfig::File(path) => path.is_empty(),
            RouteConfig::Methods(cfg) => {
                cfg.methods.is_empty() && cfg.proxy.is_none() && cfg.delay.is_none()
            }
        }
    }

    /// Whether the config itself asks for literal matching.
    pub fn wants_exact(&self) -> bool {
        match self {
            RouteConfig::Methods(cfg) => cfg.exact.unwrap_or(false),
            RouteConfig::File(_) | RouteConfig::Handler(_) => false,
        }
    }

    pub(crate) fn normalize(mut self) -> Self {
        if let RouteConfig::Methods(cfg) = &mut self {
            cfg.lowercase_methods();
        }
        self
    }

    /// JSON view; handlers are rendered as text or redacted.
    pub fn to_json(&self, expand_handlers: bool) -> Value {
        match self {
            RouteConfig::Methods(cfg) => cfg.to_json(expand_handlers),
            RouteConfig::File(path) => Value::String(path.clone()),
            RouteConfig::Handler(handler) => handler.render(expand_handlers),
        }
    }
}

impl From<PathConfig> for RouteConfig {
    fn from(config: PathConfig) -> Self {
        RouteConfig::Methods(config)
    }
}

impl From<Handler> for RouteConfig {
    fn from(handler: Handler) -> Self {
        RouteConfig::Handler(handler)
    }
}

impl From<&str> for RouteConfig {
    fn from(path: &str) -> Self {
        RouteConfig::File(path.to_string())
    }
}

struct RouteConfigVisitor;

impl<'de> Visitor<'de> for RouteConfigVisitor {
    type Value = RouteConfig;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a file path or a route config table")
    }

    fn visit_str<E: de::Error>(self, path: &str) -> Result<RouteConfig, E> {
        Ok(RouteConfig::File(path.to_string()))
    }

    fn visit_map<A: MapAccess<'de>>(self, map: A) -> Result<RouteConfig, A::Error> {
        PathConfig::deserialize(de::value::MapAccessDeserializer::new(map)).map(RouteConfig::Methods)
    }
}

impl<'de> Deserialize<'de> for RouteConfig {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(RouteConfigVisitor)
    }
}

/// Pattern-keyed route map, as found in route files.
pub type Routes = IndexMap<String, RouteConfig>;
