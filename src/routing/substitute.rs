//! `:name` placeholder substitution inside string payloads.
//!
//! Values are inserted as raw substrings. When the payload is serialized
//! JSON, a value containing quotes will produce invalid JSON; callers own
//! that.

use crate::routing::variables::Variables;

/// Replace every `:name` token in `text` with the matching variable.
///
/// Variables are applied in map order, so a shorter name that prefixes a
/// longer one (`:id` / `:idx`) replaces inside the longer token as well.
pub fn substitute(text: &str, variables: &Variables) -> String {
    let mut out = text.to_string();
    for (name, value) in variables {
        if name.is_empty() {
            continue;
        }
        let token = format!(":{name}");
        if out.contains(&token) {
            out = out.replace(&token, &value.to_replacement());
        }
    }
    out
}
