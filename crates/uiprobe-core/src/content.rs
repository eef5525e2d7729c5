//! Content and expected trees.
//!
//! A content tree is the structured snapshot a component parses from the
//! live UI; an expected tree is the partially-specified literal a test
//! compares it against. Both are explicit tagged unions: a node is a leaf
//! value, a DOM-derived holder, a sequence, or a nested testable component.

use std::collections::BTreeMap;
use std::fmt;

use serde_json::Value;

use crate::compare::{self, Mismatch};
use crate::env::Elem;
use crate::value::Scalar;

/// Ordered mapping from control name to content node.
pub type ContentMap = BTreeMap<String, Content>;

/// Ordered mapping from control name to expected node.
pub type ExpectedMap = BTreeMap<String, Expected>;

/// One node of an actual content tree.
#[derive(Debug)]
pub enum Content {
    /// A bare primitive.
    Value(Scalar),
    /// A plain DOM-derived holder: named fields, optionally backed by an
    /// element handle. A holder with a `value` field matches a primitive
    /// expected value against that field.
    Node(ContentNode),
    /// An ordered sequence of nodes.
    Seq(Vec<Content>),
    /// A nested testable component defining its own equality.
    Component(Box<dyn TestableNode>),
}

/// Fields of a DOM-derived holder plus its backing element.
#[derive(Debug, Default)]
pub struct ContentNode {
    pub elem: Option<Elem>,
    pub fields: ContentMap,
}

impl ContentNode {
    pub fn new(elem: Option<Elem>) -> Self {
        Self {
            elem,
            fields: ContentMap::new(),
        }
    }

    pub fn set(&mut self, name: impl Into<String>, value: impl Into<Content>) {
        self.fields.insert(name.into(), value.into());
    }

    /// Whether visibility has already been resolved for this node.
    pub fn has_visible(&self) -> bool {
        self.fields.contains_key("visible")
    }

    pub fn set_visible(&mut self, visible: bool) {
        self.fields
            .insert("visible".to_string(), Content::Value(Scalar::Bool(visible)));
    }
}

/// A nested component stored inside a content tree.
///
/// Polymorphic content nodes implement this to define custom equality:
/// the comparator delegates to [`TestableNode::check_values`] instead of
/// walking the component structurally.
pub trait TestableNode: fmt::Debug + Send + Sync {
    fn content(&self) -> &ContentNode;

    fn content_mut(&mut self) -> &mut ContentNode;

    /// Compare this component's content against an expected node. `path`
    /// is the absolute path of this component inside the outer tree.
    fn check_values(&self, expected: &Expected, path: &str) -> Result<(), Mismatch> {
        compare::meet_node(self.content(), expected, path)
    }
}

impl Content {
    pub fn value(v: impl Into<Scalar>) -> Content {
        Content::Value(v.into())
    }

    pub fn node(node: ContentNode) -> Content {
        Content::Node(node)
    }

    pub fn component(component: impl TestableNode + 'static) -> Content {
        Content::Component(Box::new(component))
    }

    /// Human-readable kind, used in mismatch messages.
    pub fn kind(&self) -> &'static str {
        match self {
            Content::Value(_) => "value",
            Content::Node(_) => "object",
            Content::Seq(_) => "array",
            Content::Component(_) => "component",
        }
    }

    /// Build a content tree from a JSON literal. Objects become holders
    /// without element handles; useful for models and fixtures.
    pub fn from_json(value: &Value) -> Content {
        match value {
            Value::Array(items) => Content::Seq(items.iter().map(Content::from_json).collect()),
            Value::Object(map) => {
                let mut node = ContentNode::new(None);
                for (key, item) in map {
                    node.fields.insert(key.clone(), Content::from_json(item));
                }
                Content::Node(node)
            }
            leaf => Content::Value(Scalar::from_json(leaf).unwrap_or(Scalar::Null)),
        }
    }
}

impl<T: Into<Scalar>> From<T> for Content {
    fn from(v: T) -> Self {
        Content::Value(v.into())
    }
}

/// One node of an expected state tree.
///
/// `Any` is the don't-care sentinel: it matches every actual value and is
/// what lets test authors specify only the fields they care about.
#[derive(Debug, Clone, PartialEq)]
pub enum Expected {
    Any,
    Value(Scalar),
    Map(ExpectedMap),
    Seq(Vec<Expected>),
}

impl Expected {
    pub fn value(v: impl Into<Scalar>) -> Expected {
        Expected::Value(v.into())
    }

    pub fn map<K, V, I>(entries: I) -> Expected
    where
        K: Into<String>,
        V: Into<Expected>,
        I: IntoIterator<Item = (K, V)>,
    {
        Expected::Map(
            entries
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }

    pub fn seq<V, I>(items: I) -> Expected
    where
        V: Into<Expected>,
        I: IntoIterator<Item = V>,
    {
        Expected::Seq(items.into_iter().map(Into::into).collect())
    }

    /// Human-readable kind, used in mismatch messages.
    pub fn kind(&self) -> &'static str {
        match self {
            Expected::Any => "any",
            Expected::Value(_) => "value",
            Expected::Map(_) => "object",
            Expected::Seq(_) => "array",
        }
    }

    /// Build an expected tree from a JSON literal. JSON null maps to the
    /// don't-care sentinel, matching the original `undefined` semantics.
    pub fn from_json(value: &Value) -> Expected {
        match value {
            Value::Null => Expected::Any,
            Value::Array(items) => Expected::Seq(items.iter().map(Expected::from_json).collect()),
            Value::Object(map) => Expected::Map(
                map.iter()
                    .map(|(k, v)| (k.clone(), Expected::from_json(v)))
                    .collect(),
            ),
            leaf => Scalar::from_json(leaf).map_or(Expected::Any, Expected::Value),
        }
    }
}

impl<T: Into<Scalar>> From<T> for Expected {
    fn from(v: T) -> Self {
        Expected::Value(v.into())
    }
}
