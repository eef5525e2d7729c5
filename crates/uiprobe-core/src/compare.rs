//! Deep structural comparison of actual content against expected state.
//!
//! The walk iterates expected's own keys only, so an expected tree names
//! exactly the controls a test cares about. Mismatches carry the full
//! dotted/indexed path of the failing leaf (`a.b.c`, `children[1].title`).

use std::fmt;

use crate::content::{Content, ContentMap, ContentNode, Expected};
use crate::error::{Error, Result};
use crate::value::Scalar;

/// Description of a failed comparison.
///
/// `value`/`expected` are present for a value difference and absent when
/// the path itself was not found in the actual tree.
#[derive(Debug, Clone, PartialEq)]
pub struct Mismatch {
    pub key: String,
    pub value: Option<Scalar>,
    pub expected: Option<Scalar>,
}

impl Mismatch {
    pub fn not_found(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: None,
            expected: None,
        }
    }

    pub fn diff(key: impl Into<String>, value: Scalar, expected: Scalar) -> Self {
        Self {
            key: key.into(),
            value: Some(value),
            expected: Some(expected),
        }
    }
}

impl fmt::Display for Mismatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.value, &self.expected) {
            (Some(value), Some(expected)) => write!(
                f,
                "Not expected value \"{value}\" for ({}) \"{expected}\" is expected",
                self.key
            ),
            _ => write!(f, "Path ({}) not found", self.key),
        }
    }
}

/// Join an absolute path with a child key. Index segments (`[2]`) attach
/// without a dot.
pub(crate) fn join_key(path: &str, key: &str) -> String {
    if path.is_empty() {
        key.to_string()
    } else if key.starts_with('[') {
        format!("{path}{key}")
    } else {
        format!("{path}.{key}")
    }
}

/// Compare an actual content tree against an expected tree.
pub fn deep_meet(actual: &Content, expected: &Expected) -> std::result::Result<(), Mismatch> {
    meet_view(actual.into(), expected, "")
}

/// Compare and convert a mismatch into the throwing error form.
pub fn assert_meet(actual: &Content, expected: &Expected) -> Result<()> {
    deep_meet(actual, expected).map_err(Error::from)
}

/// Compare a content map (a parsed component's controls) against an
/// expected tree rooted at `path`.
pub fn check_values(content: &ContentMap, expected: &Expected, path: &str) -> Result<()> {
    match expected {
        Expected::Any => Ok(()),
        Expected::Map(map) => meet_map(content, map, path).map_err(Error::from),
        other => Err(Error::Config(format!(
            "expected state for ({path}) must be an object, got {}",
            other.kind()
        ))),
    }
}

/// Entry point used by [`crate::content::TestableNode::check_values`]:
/// compare a holder node against an expected node at an absolute path.
pub fn meet_node(
    node: &ContentNode,
    expected: &Expected,
    path: &str,
) -> std::result::Result<(), Mismatch> {
    meet_view(ContentView::Node(node), expected, path)
}

// Borrowed view over content, so the walk can be entered either from a
// Content or from a bare ContentNode.
enum ContentView<'a> {
    Value(&'a Scalar),
    Node(&'a ContentNode),
    Seq(&'a [Content]),
    Component(&'a dyn crate::content::TestableNode),
}

impl<'a> From<&'a Content> for ContentView<'a> {
    fn from(content: &'a Content) -> Self {
        match content {
            Content::Value(v) => ContentView::Value(v),
            Content::Node(n) => ContentView::Node(n),
            Content::Seq(items) => ContentView::Seq(items),
            Content::Component(c) => ContentView::Component(c.as_ref()),
        }
    }
}

impl ContentView<'_> {
    fn kind(&self) -> &'static str {
        match self {
            ContentView::Value(_) => "value",
            ContentView::Node(_) => "object",
            ContentView::Seq(_) => "array",
            ContentView::Component(_) => "component",
        }
    }

    /// The primitive a node contributes when compared against a primitive
    /// expected value: holders and components expose their `value` field.
    fn leaf_value(&self) -> Option<&Scalar> {
        match self {
            ContentView::Value(v) => Some(v),
            ContentView::Node(node) => match node.fields.get("value") {
                Some(Content::Value(v)) => Some(v),
                _ => None,
            },
            ContentView::Component(component) => {
                match component.content().fields.get("value") {
                    Some(Content::Value(v)) => Some(v),
                    _ => None,
                }
            }
            ContentView::Seq(_) => None,
        }
    }

    fn rendered(&self) -> Scalar {
        match self {
            ContentView::Value(v) => (*v).clone(),
            other => Scalar::Str(format!("[{}]", other.kind())),
        }
    }
}

fn meet_view(
    actual: ContentView<'_>,
    expected: &Expected,
    path: &str,
) -> std::result::Result<(), Mismatch> {
    match expected {
        // Don't-care sentinel matches anything, recursively.
        Expected::Any => Ok(()),

        Expected::Value(want) => match actual.leaf_value() {
            Some(got) if got == want => Ok(()),
            Some(got) => Err(Mismatch::diff(path, got.clone(), want.clone())),
            None => Err(Mismatch::diff(path, actual.rendered(), want.clone())),
        },

        Expected::Map(map) => match actual {
            ContentView::Component(component) => component.check_values(expected, path),
            ContentView::Node(node) => meet_map(&node.fields, map, path),
            // Expected a structured container, actual is not one.
            other => Err(Mismatch::diff(
                path,
                other.rendered(),
                Scalar::Str("[object]".to_string()),
            )),
        },

        Expected::Seq(want_items) => match actual {
            ContentView::Seq(items) => {
                // Report a length difference before any elementwise walk.
                if items.len() != want_items.len() {
                    return Err(Mismatch::diff(
                        join_key(path, "length"),
                        Scalar::Int(items.len() as i64),
                        Scalar::Int(want_items.len() as i64),
                    ));
                }

                for (index, (item, want)) in items.iter().zip(want_items).enumerate() {
                    let item_path = format!("{path}[{index}]");
                    match item {
                        Content::Component(component) => {
                            component.check_values(want, &item_path)?
                        }
                        other => meet_view(other.into(), want, &item_path)?,
                    }
                }
                Ok(())
            }
            other => Err(Mismatch::diff(
                path,
                other.rendered(),
                Scalar::Str("[array]".to_string()),
            )),
        },
    }
}

fn meet_map(
    fields: &ContentMap,
    expected: &crate::content::ExpectedMap,
    path: &str,
) -> std::result::Result<(), Mismatch> {
    for (key, want) in expected {
        let child_path = join_key(path, key);
        let Some(field) = fields.get(key) else {
            // Don't-care keys do not have to exist at all.
            if matches!(want, Expected::Any) {
                continue;
            }
            return Err(Mismatch::not_found(child_path));
        };

        match field {
            Content::Component(component) => component.check_values(want, &child_path)?,
            other => meet_view(other.into(), want, &child_path)?,
        }
    }
    Ok(())
}

#[cfg(test)]
#[path = "compare_tests.rs"]
mod tests;
