//! Route table: persistent and fire-once partitions.
//!
//! # Responsibilities
//! - Register, merge, replace and remove routes
//! - Keep registration order, which is match precedence
//! - Resolve a request: once-routes, then exact text, then pattern scan
//!
//! # Design Decisions
//! - One `RwLock` around both partitions; mutation is rare
//! - Matching a once-route and removing it happen under the same write
//!   guard, so exactly one concurrent request consumes it
//! - Entries own their compiled matcher; dumps never expose it

use std::sync::{PoisonError, RwLock};

use indexmap::IndexMap;
use serde_json::{Map, Value};

use crate::error::{MoxyError, Result};
use crate::observability::metrics;
use crate::routing::config::{RouteConfig, Routes};
use crate::routing::matcher::{try_match, RequestTarget, Resolution};
use crate::routing::pattern::{compile, Matcher};

/// Registration options.
#[derive(Debug, Clone, Copy, Default)]
pub struct AddRouteOptions {
    /// Remove the route after its first match.
    pub once: bool,
    /// Compare the pattern literally.
    pub exact: bool,
}

impl AddRouteOptions {
    pub fn once() -> Self {
        Self {
            once: true,
            exact: false,
        }
    }

    pub fn exact() -> Self {
        Self {
            once: false,
            exact: true,
        }
    }
}

/// A pattern bound to its configuration.
#[derive(Debug, Clone)]
pub struct RouteEntry {
    pub pattern: String,
    pub config: RouteConfig,
    pub matcher: Matcher,
}

impl RouteEntry {
    pub fn new(pattern: &str, config: RouteConfig, exact: bool) -> Result<Self> {
        let exact = exact || config.wants_exact();
        Ok(Self {
            pattern: pattern.to_string(),
            matcher: compile(pattern, exact)?,
            config,
        })
    }
}

#[derive(Debug, Default)]
struct TableInner {
    persistent: IndexMap<String, RouteEntry>,
    once: Vec<RouteEntry>,
}

impl TableInner {
    fn resolve_persistent(&self, target: &RequestTarget) -> Option<Resolution> {
        let url = target.url.as_str();
        let path = target.path();

        if let Some(resolution) = self.persistent.get(url).and_then(|e| try_match(e, target)) {
            return Some(resolution);
        }
        if path != url {
            if let Some(resolution) = self.persistent.get(path).and_then(|e| try_match(e, target)) {
                return Some(resolution);
            }
        }

        self.persistent.values().find_map(|entry| try_match(entry, target))
    }

    fn record_size(&self) {
        metrics::record_route_count(self.persistent.len(), self.once.len());
    }
}

/// Thread-safe route table.
#[derive(Debug, Default)]
pub struct RouteTable {
    inner: RwLock<TableInner>,
}

impl RouteTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a route.
    ///
    /// A verb table merges into an existing verb table for the same
    /// pattern; a handler replaces whatever was there.
    pub fn add_route(
        &self,
        pattern: &str,
        config: impl Into<RouteConfig>,
        options: AddRouteOptions,
    ) -> Result<()> {
        let config = config.into().normalize();

        if pattern.is_empty() {
            return Err(MoxyError::Validation("route must contain \"path\"".into()));
        }
        if config.is_empty() {
            return Err(MoxyError::Validation("route must contain \"config\"".into()));
        }

        if options.once {
            let entry = RouteEntry::new(pattern, config, options.exact)?;
            let mut inner = self.inner.write().unwrap_or_else(PoisonError::into_inner);
            inner.once.push(entry);
            inner.record_size();
            tracing::debug!(pattern = %pattern, "Registered once-route");
            return Ok(());
        }

        let mut inner = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        let config = match (inner.persistent.get(pattern).map(|e| &e.config), config) {
            (Some(RouteConfig::Methods(existing)), RouteConfig::Methods(incoming)) => {
                let mut merged = existing.clone();
                merged.merge(incoming);
                RouteConfig::Methods(merged)
            }
            (_, config) => config,
        };

        let entry = RouteEntry::new(pattern, config, options.exact)?;
        inner.persistent.insert(pattern.to_string(), entry);
        inner.record_size();

        tracing::debug!(pattern = %pattern, exact = options.exact, "Registered route");
        Ok(())
    }

    /// Register every route in `routes` under `prefix`.
    pub fn add_routes(&self, prefix: &str, routes: Routes, options: AddRouteOptions) -> Result<()> {
        for (path, config) in routes {
            self.add_route(&join_route_path(prefix, &path), config, options)?;
        }
        Ok(())
    }

    /// Remove a route and register `config` in its place, at the end of
    /// the precedence order. Returns whether a route was replaced.
    pub fn replace_route(&self, pattern: &str, config: impl Into<RouteConfig>) -> Result<bool> {
        let config = config.into().normalize();
        if pattern.is_empty() {
            return Err(MoxyError::Validation("route must contain \"path\"".into()));
        }
        if config.is_empty() {
            return Err(MoxyError::Validation("route must contain \"config\"".into()));
        }

        let entry = RouteEntry::new(pattern, config, false)?;
        let mut inner = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        let existed = inner.persistent.shift_remove(pattern).is_some();
        inner.persistent.insert(pattern.to_string(), entry);
        inner.record_size();
        Ok(existed)
    }

    /// Remove a persistent route. Returns whether it existed.
    pub fn remove_route(&self, pattern: &str) -> bool {
        let mut inner = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        let removed = inner.persistent.shift_remove(pattern).is_some();
        inner.record_size();
        removed
    }

    /// Drop every persistent and once-route.
    pub fn reset_all(&self) {
        let mut inner = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        inner.persistent.clear();
        inner.once.clear();
        inner.record_size();
    }

    pub fn contains(&self, pattern: &str) -> bool {
        let inner = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        inner.persistent.contains_key(pattern)
    }

    /// Registered patterns in precedence order.
    pub fn list(&self, include_once: bool) -> Vec<String> {
        let inner = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        if include_once {
            let mut seen = indexmap::IndexSet::new();
            for entry in &inner.once {
                seen.insert(entry.pattern.clone());
            }
            seen.into_iter().collect()
        } else {
            inner.persistent.keys().cloned().collect()
        }
    }

    /// Pattern-keyed JSON view of the table.
    ///
    /// Handlers render as their description when `serialize_handlers` is
    /// set, otherwise as a redacted placeholder.
    pub fn dump(&self, include_once: bool, serialize_handlers: bool) -> Value {
        let inner = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        let mut out = Map::new();
        if include_once {
            for entry in &inner.once {
                out.insert(entry.pattern.clone(), entry.config.to_json(serialize_handlers));
            }
        } else {
            for (pattern, entry) in &inner.persistent {
                out.insert(pattern.clone(), entry.config.to_json(serialize_handlers));
            }
        }
        Value::Object(out)
    }

    /// JSON view of a single persistent route.
    pub fn route_json(&self, pattern: &str, serialize_handlers: bool) -> Option<Value> {
        let inner = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        inner
            .persistent
            .get(pattern)
            .map(|entry| entry.config.to_json(serialize_handlers))
    }

    /// JSON view of the most recently added once-route.
    pub fn last_once_json(&self, serialize_handlers: bool) -> Option<(String, Value)> {
        let inner = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        inner
            .once
            .last()
            .map(|entry| (entry.pattern.clone(), entry.config.to_json(serialize_handlers)))
    }

    /// Find the route that serves `target`.
    ///
    /// Once-routes are tried first and the winner is removed; then a
    /// persistent entry whose text equals the request url or path; then
    /// every persistent entry in registration order.
    pub fn resolve(&self, target: &RequestTarget) -> Option<Resolution> {
        {
            let inner = self.inner.read().unwrap_or_else(PoisonError::into_inner);
            if inner.once.is_empty() {
                return inner.resolve_persistent(target);
            }
        }

        let mut inner = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        let consumed = inner
            .once
            .iter()
            .enumerate()
            .find_map(|(idx, entry)| try_match(entry, target).map(|res| (idx, res)));

        if let Some((idx, resolution)) = consumed {
            inner.once.remove(idx);
            inner.record_size();
            tracing::debug!(pattern = %resolution.pattern, "Consumed once-route");
            return Some(resolution);
        }

        inner.resolve_persistent(target)
    }
}

/// Join a prefix and a route key the way POSIX paths join: one separator,
/// repeated slashes collapsed. The result is always rooted at `/`.
pub fn join_route_path(prefix: &str, path: &str) -> String {
    let joined = match (prefix.is_empty(), path.is_empty()) {
        (true, _) => path.to_string(),
        (false, true) => prefix.to_string(),
        (false, false) => format!("{prefix}/{path}"),
    };

    if joined.is_empty() {
        return joined;
    }

    let mut out = String::with_capacity(joined.len() + 1);
    if !joined.starts_with('/') {
        out.push('/');
    }
    let mut previous_slash = out.ends_with('/');
    for c in joined.chars() {
        if c == '/' && previous_slash {
            continue;
        }
        previous_slash = c == '/';
        out.push(c);
    }
    out
}
