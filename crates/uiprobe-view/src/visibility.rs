//! Visibility resolution and the parallel visibility check.
//!
//! Resolution runs once per parse and fills a `visible` field into
//! every content node that does not already carry one, using a single
//! batched backend round trip. The check walks an expectation tree of
//! booleans against the live UI, mirroring the structural comparator's
//! path reporting.

use std::collections::BTreeMap;

use futures::future::BoxFuture;
use tracing::trace;

use uiprobe_core::{Content, ContentNode, Elem, Environment, Error, Mismatch, Result, Scalar};

/// Fill `visible` into every node of `root` that lacks one.
///
/// Handles are gathered in one pre-order pass and resolved through
/// [`Environment::resolve_visibility`] in a single round trip; the
/// backend deduplicates repeated elements, and nodes without a backing
/// element resolve to not-visible.
pub async fn resolve_content_visibility(
    env: &dyn Environment,
    root: &mut ContentNode,
) -> Result<()> {
    let mut targets = Vec::new();
    collect_targets(root, &mut targets);
    if targets.is_empty() {
        return Ok(());
    }

    let resolved = env.resolve_visibility(&targets).await?;
    if resolved.len() != targets.len() {
        return Err(Error::Backend(format!(
            "visibility batch returned {} results for {} targets",
            resolved.len(),
            targets.len()
        )));
    }
    trace!(target: "uiprobe::view", batch = targets.len(), "visibility resolved");

    let mut results = resolved.into_iter();
    assign_results(root, &mut results);
    Ok(())
}

// The two walks must visit nodes in the same order; both are pre-order
// over the node itself, then its fields in map order.
fn collect_targets(node: &ContentNode, out: &mut Vec<Option<Elem>>) {
    if !node.has_visible() {
        out.push(node.elem.clone());
    }
    for content in node.fields.values() {
        collect_content(content, out);
    }
}

fn collect_content(content: &Content, out: &mut Vec<Option<Elem>>) {
    match content {
        Content::Node(node) => collect_targets(node, out),
        Content::Component(component) => collect_targets(component.content(), out),
        Content::Seq(items) => {
            for item in items {
                collect_content(item, out);
            }
        }
        Content::Value(_) => {}
    }
}

fn assign_results(node: &mut ContentNode, results: &mut impl Iterator<Item = bool>) {
    if !node.has_visible() {
        node.set_visible(results.next().unwrap_or(false));
    }
    for content in node.fields.values_mut() {
        assign_content(content, results);
    }
}

fn assign_content(content: &mut Content, results: &mut impl Iterator<Item = bool>) {
    match content {
        Content::Node(node) => assign_results(node, results),
        Content::Component(component) => assign_results(component.content_mut(), results),
        Content::Seq(items) => {
            for item in items {
                assign_content(item, results);
            }
        }
        Content::Value(_) => {}
    }
}

/// One node of a visibility expectation tree: a boolean leaf for one
/// control, or a mapping naming child controls. As with expected state,
/// unnamed controls are not checked.
#[derive(Debug, Clone, PartialEq)]
pub enum VisibilityExpectation {
    Visible(bool),
    Map(BTreeMap<String, VisibilityExpectation>),
}

impl VisibilityExpectation {
    pub fn map<K, V, I>(entries: I) -> Self
    where
        K: Into<String>,
        V: Into<VisibilityExpectation>,
        I: IntoIterator<Item = (K, V)>,
    {
        VisibilityExpectation::Map(
            entries
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}

impl From<bool> for VisibilityExpectation {
    fn from(visible: bool) -> Self {
        VisibilityExpectation::Visible(visible)
    }
}

/// Check live visibility of a content node against an expectation tree.
///
/// `true` requires the node to resolve fully visible up its ancestor
/// chain; `false` is satisfied by an absent control as well as a
/// present-but-hidden one. Failures carry the dotted path of the leaf.
pub fn check_visibility<'a>(
    env: &'a dyn Environment,
    node: &'a ContentNode,
    expected: &'a VisibilityExpectation,
    path: &'a str,
) -> BoxFuture<'a, Result<()>> {
    Box::pin(async move {
        match expected {
            VisibilityExpectation::Visible(want) => {
                let actual = node_visible(env, node).await?;
                if actual != *want {
                    return Err(Mismatch::diff(path, Scalar::Bool(actual), Scalar::Bool(*want)).into());
                }
                Ok(())
            }
            VisibilityExpectation::Map(map) => {
                for (key, want) in map {
                    let child_path = join_key(path, key);
                    let Some(field) = node.fields.get(key) else {
                        // An absent control satisfies a `false` leaf.
                        if matches!(want, VisibilityExpectation::Visible(false)) {
                            continue;
                        }
                        return Err(Mismatch::not_found(child_path).into());
                    };

                    match field {
                        Content::Node(child) => {
                            check_visibility(env, child, want, &child_path).await?
                        }
                        Content::Component(component) => {
                            check_visibility(env, component.content(), want, &child_path).await?
                        }
                        Content::Value(_) => {
                            // A bare value has no element to resolve.
                            if !matches!(want, VisibilityExpectation::Visible(false)) {
                                return Err(Mismatch::diff(
                                    child_path.as_str(),
                                    Scalar::Bool(false),
                                    Scalar::Bool(true),
                                )
                                .into());
                            }
                        }
                        Content::Seq(_) => {
                            return Err(Error::Config(format!(
                                "visibility expectation for ({child_path}) cannot target an array"
                            )));
                        }
                    }
                }
                Ok(())
            }
        }
    })
}

// Live resolution for one node, preferring the `visible` field filled
// in at parse time over a fresh round trip.
async fn node_visible(env: &dyn Environment, node: &ContentNode) -> Result<bool> {
    if let Some(Content::Value(Scalar::Bool(resolved))) = node.fields.get("visible") {
        return Ok(*resolved);
    }
    match &node.elem {
        Some(elem) => env.is_visible(elem.into(), true).await,
        None => Ok(false),
    }
}

fn join_key(path: &str, key: &str) -> String {
    if path.is_empty() {
        key.to_string()
    } else {
        format!("{path}.{key}")
    }
}
