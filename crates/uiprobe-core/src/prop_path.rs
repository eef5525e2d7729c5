//! Dotted-path lookup over JSON trees.
//!
//! Property reads are total: a missing segment yields `None` instead of
//! an error, so probing optional structure never aborts a parse.

use serde_json::Value;

/// Split a dotted path into its segments. Empty segments are preserved
/// so `a..b` never silently aliases `a.b`.
pub fn segments(path: &str) -> Vec<&str> {
    path.split('.').collect()
}

/// Walk `value` along the dotted `path`, returning the reached node.
///
/// Stops with `None` at the first missing key or at any non-object
/// intermediate node. `null` intermediates propagate `None` as well.
pub fn lookup<'a>(value: &'a Value, path: &str) -> Option<&'a Value> {
    let mut current = value;
    for segment in segments(path) {
        match current {
            Value::Object(map) => {
                current = map.get(segment)?;
            }
            _ => return None,
        }
    }
    Some(current)
}
