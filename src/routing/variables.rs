//! Request variables: path captures merged with query parameters.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// A single variable value. Repeated query keys collapse into `Many`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum VarValue {
    One(String),
    Many(Vec<String>),
}

impl VarValue {
    /// Text inserted in place of a `:name` token.
    pub fn to_replacement(&self) -> String {
        match self {
            VarValue::One(value) => value.clone(),
            VarValue::Many(values) => serde_json::to_string(values).unwrap_or_default(),
        }
    }

    /// First value, for callers that only care about one.
    pub fn first(&self) -> Option<&str> {
        match self {
            VarValue::One(value) => Some(value),
            VarValue::Many(values) => values.first().map(String::as_str),
        }
    }
}

impl From<&str> for VarValue {
    fn from(value: &str) -> Self {
        VarValue::One(value.to_string())
    }
}

impl From<String> for VarValue {
    fn from(value: String) -> Self {
        VarValue::One(value)
    }
}

/// Insertion-ordered variables map handed to handlers and substitution.
pub type Variables = IndexMap<String, VarValue>;

/// Request path without query string or fragment.
pub fn request_path(url: &str) -> &str {
    match url.find(['?', '#']) {
        Some(idx) => &url[..idx],
        None => url,
    }
}

/// Parse the query string of a raw request url.
///
/// A bare key (`?search`) yields an empty string, a repeated key yields a
/// list in arrival order.
pub fn parse_query(url: &str) -> Variables {
    let mut vars = Variables::new();

    let Some(start) = url.find('?') else {
        return vars;
    };
    let query = &url[start + 1..];
    let query = match query.find('#') {
        Some(idx) => &query[..idx],
        None => query,
    };

    for (key, value) in url::form_urlencoded::parse(query.as_bytes()) {
        let value = value.into_owned();
        match vars.get_mut(key.as_ref()) {
            Some(slot) => {
                let merged = match std::mem::replace(slot, VarValue::Many(Vec::new())) {
                    VarValue::One(first) => vec![first, value],
                    VarValue::Many(mut values) => {
                        values.push(value);
                        values
                    }
                };
                *slot = VarValue::Many(merged);
            }
            None => {
                vars.insert(key.into_owned(), VarValue::One(value));
            }
        }
    }

    vars
}
