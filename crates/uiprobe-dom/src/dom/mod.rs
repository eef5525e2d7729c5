//! Arena-backed document model for the in-process backend.
//!
//! Nodes live in a flat arena and reference each other by index, so
//! handles stay `Copy` and the whole document drops in one piece.

pub mod parser;
pub mod selector;

use std::collections::HashMap;
use std::fmt::Write as _;

/// Index of a node in the document arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(pub(crate) usize);

#[derive(Debug, Clone)]
pub enum NodeKind {
    Document,
    Element(ElementData),
    Text(String),
}

#[derive(Debug, Clone)]
pub struct Node {
    pub parent: Option<NodeId>,
    pub children: Vec<NodeId>,
    pub kind: NodeKind,
}

/// Element payload. Form-control state (`value`, `checked`, `selected`)
/// is live state seeded from the attributes at parse time; the
/// attributes themselves keep their parsed values.
#[derive(Debug, Clone)]
pub struct ElementData {
    pub tag: String,
    pub attrs: HashMap<String, String>,
    pub value: String,
    pub checked: bool,
    pub selected: bool,
    pub disabled: bool,
}

impl ElementData {
    fn new(tag: String, attrs: HashMap<String, String>) -> Self {
        let value = attrs.get("value").cloned().unwrap_or_default();
        let checked = attrs.contains_key("checked");
        let selected = attrs.contains_key("selected");
        let disabled = attrs.contains_key("disabled");
        Self {
            tag,
            attrs,
            value,
            checked,
            selected,
            disabled,
        }
    }

    pub fn class_list(&self) -> Vec<&str> {
        self.attrs
            .get("class")
            .map(|c| c.split_whitespace().collect())
            .unwrap_or_default()
    }

    pub fn has_class(&self, name: &str) -> bool {
        self.class_list().contains(&name)
    }

    /// Value of an inline style property, e.g. `display`.
    pub fn style(&self, property: &str) -> Option<String> {
        let style = self.attrs.get("style")?;
        for declaration in style.split(';') {
            let Some((name, value)) = declaration.split_once(':') else {
                continue;
            };
            if name.trim().eq_ignore_ascii_case(property) {
                return Some(value.trim().to_string());
            }
        }
        None
    }
}

/// The document arena.
#[derive(Debug, Clone)]
pub struct Dom {
    nodes: Vec<Node>,
    root: NodeId,
    id_index: HashMap<String, NodeId>,
}

impl Dom {
    pub fn new() -> Self {
        let root = Node {
            parent: None,
            children: Vec::new(),
            kind: NodeKind::Document,
        };
        Self {
            nodes: vec![root],
            root: NodeId(0),
            id_index: HashMap::new(),
        }
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    fn create_node(&mut self, parent: NodeId, kind: NodeKind) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(Node {
            parent: Some(parent),
            children: Vec::new(),
            kind,
        });
        self.nodes[parent.0].children.push(id);
        id
    }

    pub fn create_element(
        &mut self,
        parent: NodeId,
        tag: String,
        attrs: HashMap<String, String>,
    ) -> NodeId {
        let data = ElementData::new(tag, attrs);
        let id_attr = data.attrs.get("id").cloned();
        let id = self.create_node(parent, NodeKind::Element(data));
        if let Some(id_attr) = id_attr {
            // First occurrence wins, like getElementById.
            self.id_index.entry(id_attr).or_insert(id);
        }
        id
    }

    pub fn create_text(&mut self, parent: NodeId, text: String) -> NodeId {
        self.create_node(parent, NodeKind::Text(text))
    }

    pub fn element(&self, node: NodeId) -> Option<&ElementData> {
        match &self.nodes[node.0].kind {
            NodeKind::Element(data) => Some(data),
            _ => None,
        }
    }

    pub fn element_mut(&mut self, node: NodeId) -> Option<&mut ElementData> {
        match &mut self.nodes[node.0].kind {
            NodeKind::Element(data) => Some(data),
            _ => None,
        }
    }

    pub fn tag_name(&self, node: NodeId) -> Option<&str> {
        self.element(node).map(|e| e.tag.as_str())
    }

    pub fn parent(&self, node: NodeId) -> Option<NodeId> {
        self.nodes[node.0].parent
    }

    /// Nearest ancestor that is an element, skipping the document node.
    pub fn parent_element(&self, node: NodeId) -> Option<NodeId> {
        let parent = self.parent(node)?;
        self.element(parent).map(|_| parent)
    }

    pub fn children(&self, node: NodeId) -> &[NodeId] {
        &self.nodes[node.0].children
    }

    pub fn by_id(&self, id: &str) -> Option<NodeId> {
        self.id_index.get(id).copied()
    }

    /// Element ancestors of `node`, nearest first.
    pub fn ancestors(&self, node: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut current = node;
        while let Some(parent) = self.parent_element(current) {
            out.push(parent);
            current = parent;
        }
        out
    }

    /// Element descendants of `scope` in document order, excluding the
    /// scope node itself.
    pub fn descendants(&self, scope: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack: Vec<NodeId> = self.children(scope).iter().rev().copied().collect();
        while let Some(node) = stack.pop() {
            if self.element(node).is_some() {
                out.push(node);
            }
            stack.extend(self.children(node).iter().rev().copied());
        }
        out
    }

    /// Concatenated text of all descendant text nodes.
    pub fn text_content(&self, node: NodeId) -> String {
        let mut out = String::new();
        self.collect_text(node, &mut out);
        out
    }

    fn collect_text(&self, node: NodeId, out: &mut String) {
        match &self.nodes[node.0].kind {
            NodeKind::Text(text) => out.push_str(text),
            _ => {
                for child in self.children(node) {
                    self.collect_text(*child, out);
                }
            }
        }
    }

    /// Visibility of the element itself: present, not `hidden`, display
    /// not `none`, visibility not `hidden`.
    pub fn is_visible_self(&self, node: NodeId) -> bool {
        let Some(data) = self.element(node) else {
            return false;
        };
        if data.attrs.contains_key("hidden") {
            return false;
        }
        if data.style("display").as_deref() == Some("none") {
            return false;
        }
        if data.style("visibility").as_deref() == Some("hidden") {
            return false;
        }
        true
    }

    /// Visibility, optionally requiring every ancestor element to be
    /// visible as well.
    pub fn is_visible(&self, node: NodeId, recursive: bool) -> bool {
        if !self.is_visible_self(node) {
            return false;
        }
        if !recursive {
            return true;
        }
        self.ancestors(node).iter().all(|a| self.is_visible_self(*a))
    }

    /// Option value per HTML rules: the `value` attribute, or the
    /// option's text when the attribute is absent.
    pub fn option_value(&self, node: NodeId) -> String {
        match self.element(node).and_then(|data| data.attrs.get("value")) {
            Some(value) => value.clone(),
            None => self.text_content(node).trim().to_string(),
        }
    }

    /// Seed select control values from their selected option (or the
    /// first option when none is marked selected).
    pub(crate) fn initialize_form_values(&mut self) {
        let selects: Vec<NodeId> = self
            .descendants(self.root())
            .into_iter()
            .filter(|n| self.tag_name(*n) == Some("select"))
            .collect();
        for select in selects {
            let options: Vec<NodeId> = self
                .descendants(select)
                .into_iter()
                .filter(|n| self.tag_name(*n) == Some("option"))
                .collect();
            let chosen = options
                .iter()
                .copied()
                .find(|n| self.element(*n).is_some_and(|d| d.selected))
                .or_else(|| options.first().copied());
            if let Some(option) = chosen {
                let value = self.option_value(option);
                if let Some(data) = self.element_mut(select) {
                    data.value = value;
                }
            }
        }
    }

    /// Serialize the subtree back to markup.
    pub fn to_html(&self, node: NodeId) -> String {
        let mut out = String::new();
        self.write_html(node, &mut out);
        out
    }

    fn write_html(&self, node: NodeId, out: &mut String) {
        match &self.nodes[node.0].kind {
            NodeKind::Document => {
                for child in self.children(node) {
                    self.write_html(*child, out);
                }
            }
            NodeKind::Text(text) => out.push_str(text),
            NodeKind::Element(data) => {
                let _ = write!(out, "<{}", data.tag);
                let mut attrs: Vec<(&String, &String)> = data.attrs.iter().collect();
                attrs.sort();
                for (name, value) in attrs {
                    let _ = write!(out, " {name}=\"{value}\"");
                }
                out.push('>');
                if parser::is_void_tag(&data.tag) {
                    return;
                }
                for child in self.children(node) {
                    self.write_html(*child, out);
                }
                let _ = write!(out, "</{}>", data.tag);
            }
        }
    }
}

impl Default for Dom {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Dom {
        parser::parse(
            "<div id=\"app\" class=\"main wide\">\
               <span style=\"display: none\">hidden text</span>\
               <p>visible <b>bold</b></p>\
             </div>",
        )
        .unwrap()
    }

    #[test]
    fn id_index_and_classes() {
        let dom = sample();
        let app = dom.by_id("app").unwrap();
        let data = dom.element(app).unwrap();
        assert_eq!(data.tag, "div");
        assert!(data.has_class("main"));
        assert!(data.has_class("wide"));
        assert!(!data.has_class("narrow"));
    }

    #[test]
    fn text_content_concatenates_descendants() {
        let dom = sample();
        let app = dom.by_id("app").unwrap();
        assert_eq!(dom.text_content(app), "hidden textvisible bold");
    }

    #[test]
    fn inline_style_controls_visibility() {
        let dom = sample();
        let app = dom.by_id("app").unwrap();
        let span = dom.descendants(app)[0];
        assert_eq!(dom.tag_name(span), Some("span"));
        assert!(!dom.is_visible_self(span));

        // Children of a hidden element are invisible only recursively.
        let p = dom.descendants(app)[1];
        assert!(dom.is_visible(p, true));
    }

    #[test]
    fn hidden_ancestor_propagates_recursively() {
        let dom = parser::parse("<div hidden><span id=\"inner\">x</span></div>").unwrap();
        let inner = dom.by_id("inner").unwrap();
        assert!(dom.is_visible(inner, false));
        assert!(!dom.is_visible(inner, true));
    }
}
