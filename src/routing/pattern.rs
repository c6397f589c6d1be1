//! Route pattern compilation.
//!
//! # Responsibilities
//! - Turn `:name` placeholders into named capture groups
//! - Pass `(?<name>...)` groups through untouched
//! - Anchor the result and allow a trailing query string
//!
//! # Design Decisions
//! - Everything that is not a placeholder is regex source, verbatim. A
//!   literal `?` must be escaped by whoever registers the route
//! - Exact mode skips regex compilation entirely

use std::sync::OnceLock;

use regex::{Captures, Regex};

use crate::error::MoxyError;
use crate::routing::variables::{request_path, VarValue, Variables};

/// Character class a placeholder captures.
const PLACEHOLDER_GROUP: &str = "[^/#?]+";

fn placeholder_regex() -> &'static Regex {
    static PLACEHOLDER: OnceLock<Regex> = OnceLock::new();
    PLACEHOLDER.get_or_init(|| {
        Regex::new(r":([a-zA-Z][a-zA-Z0-9]*)").expect("placeholder regex is valid")
    })
}

/// Compiled form of a route pattern.
#[derive(Debug, Clone)]
pub enum Matcher {
    /// Literal comparison against the request url or path.
    Exact,
    /// Anchored regular expression over the full request url.
    Pattern(Regex),
}

impl Matcher {
    /// Match a request against this matcher.
    ///
    /// `pattern` is the registered text, `url` the raw request target
    /// (path plus query). Returns the path-derived variables on success.
    pub fn match_url(&self, pattern: &str, url: &str) -> Option<Variables> {
        match self {
            Matcher::Exact => {
                (pattern == url || pattern == request_path(url)).then(Variables::new)
            }
            Matcher::Pattern(regex) => {
                let caps = regex.captures(url)?;
                Some(named_captures(regex, &caps))
            }
        }
    }

    /// Regex source, if any.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Matcher::Exact => None,
            Matcher::Pattern(regex) => Some(regex.as_str()),
        }
    }
}

fn named_captures(regex: &Regex, caps: &Captures<'_>) -> Variables {
    regex
        .capture_names()
        .flatten()
        .filter_map(|name| {
            caps.name(name)
                .map(|m| (name.to_string(), VarValue::One(m.as_str().to_string())))
        })
        .collect()
}

/// Rewrite `:name` placeholders into named groups, prefixing `/` if absent.
pub fn expand_placeholders(pattern: &str) -> String {
    let normalized = if pattern.starts_with('/') {
        pattern.to_string()
    } else {
        format!("/{pattern}")
    };

    placeholder_regex()
        .replace_all(&normalized, |caps: &Captures<'_>| {
            let whole = caps.get(0).map(|m| m.as_str()).unwrap_or_default();
            let start = caps.get(0).map(|m| m.start()).unwrap_or_default();
            // `(?:...)` is a non-capturing group, not a placeholder
            if normalized[..start].ends_with("(?") {
                return whole.to_string();
            }
            format!("(?<{}>{})", &caps[1], PLACEHOLDER_GROUP)
        })
        .into_owned()
}

/// Compile a registered pattern.
pub fn compile(pattern: &str, exact: bool) -> Result<Matcher, MoxyError> {
    if exact {
        return Ok(Matcher::Exact);
    }

    let source = format!(r"^{}(\?.*)?$", expand_placeholders(pattern));
    let regex = Regex::new(&source).map_err(|source| MoxyError::Pattern {
        pattern: pattern.to_string(),
        source,
    })?;

    tracing::trace!(pattern = %pattern, regex = %regex, "Compiled route pattern");
    Ok(Matcher::Pattern(regex))
}
