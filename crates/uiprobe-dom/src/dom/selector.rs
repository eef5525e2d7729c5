//! CSS selector subset used by test code.
//!
//! Supports compound selectors built from tag, `#id`, `.class`,
//! `[attr]` and `[attr=value]` parts, combined with descendant and `>`
//! combinators, comma-separated groups and a leading `:scope` that
//! matches the query root. Anything else is rejected up front.

use uiprobe_core::{Error, Result};

use super::{Dom, NodeId};

#[derive(Debug, Clone, PartialEq, Eq)]
struct AttrCondition {
    name: String,
    value: Option<String>,
}

/// One simple-selector sequence, e.g. `input.wide[type=text]`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct Compound {
    scope: bool,
    tag: Option<String>,
    id: Option<String>,
    classes: Vec<String>,
    attrs: Vec<AttrCondition>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Combinator {
    Descendant,
    Child,
}

#[derive(Debug, Clone)]
struct Complex {
    compounds: Vec<Compound>,
    // combinators[i] relates compounds[i] to compounds[i + 1]
    combinators: Vec<Combinator>,
}

/// A parsed selector: comma-separated alternatives.
#[derive(Debug, Clone)]
pub struct Selector {
    groups: Vec<Complex>,
}

impl Selector {
    pub fn parse(selector: &str) -> Result<Self> {
        let mut groups = Vec::new();
        for group in selector.split(',') {
            groups.push(parse_complex(group.trim(), selector)?);
        }
        Ok(Self { groups })
    }

    /// All matches within `scope`'s subtree, in document order. The
    /// scope node itself is only reachable through `:scope`.
    pub fn query_all(&self, dom: &Dom, scope: NodeId) -> Vec<NodeId> {
        let mut candidates = vec![scope];
        candidates.extend(dom.descendants(scope));
        candidates
            .into_iter()
            .filter(|node| self.matches(dom, *node, scope))
            .collect()
    }

    pub fn query(&self, dom: &Dom, scope: NodeId) -> Option<NodeId> {
        self.query_all(dom, scope).into_iter().next()
    }

    /// Whether `node` matches the selector with `scope` as the query root.
    /// The scope node itself can only match through a `:scope`-anchored
    /// group; plain groups match descendants only.
    pub fn matches(&self, dom: &Dom, node: NodeId, scope: NodeId) -> bool {
        self.groups.iter().any(|group| {
            (node != scope || group.compounds[0].scope)
                && matches_at(dom, node, scope, group, group.compounds.len() - 1)
        })
    }
}

/// Right-to-left match of `group.compounds[..=idx]` ending at `node`.
fn matches_at(dom: &Dom, node: NodeId, scope: NodeId, group: &Complex, idx: usize) -> bool {
    if !matches_compound(dom, node, scope, &group.compounds[idx]) {
        return false;
    }
    let Some(prev) = idx.checked_sub(1) else {
        return true;
    };
    match group.combinators[prev] {
        Combinator::Child => linked_parent(dom, scope, node)
            .is_some_and(|parent| matches_at(dom, parent, scope, group, prev)),
        Combinator::Descendant => {
            let mut current = node;
            while let Some(parent) = linked_parent(dom, scope, current) {
                if matches_at(dom, parent, scope, group, prev) {
                    return true;
                }
                current = parent;
            }
            false
        }
    }
}

/// Parent for combinator purposes: stops at the scope node so `:scope`
/// can anchor a chain even when the scope is the document root.
fn linked_parent(dom: &Dom, scope: NodeId, node: NodeId) -> Option<NodeId> {
    if node == scope {
        return None;
    }
    let parent = dom.parent(node)?;
    if parent == scope {
        return Some(parent);
    }
    dom.element(parent).map(|_| parent)
}

fn matches_compound(dom: &Dom, node: NodeId, scope: NodeId, compound: &Compound) -> bool {
    if compound.scope {
        return node == scope;
    }
    let Some(data) = dom.element(node) else {
        return false;
    };
    if let Some(tag) = &compound.tag {
        if data.tag != *tag {
            return false;
        }
    }
    if let Some(id) = &compound.id {
        if data.attrs.get("id") != Some(id) {
            return false;
        }
    }
    if !compound.classes.iter().all(|c| data.has_class(c)) {
        return false;
    }
    compound.attrs.iter().all(|cond| match &cond.value {
        None => data.attrs.contains_key(&cond.name),
        Some(value) => data.attrs.get(&cond.name) == Some(value),
    })
}

fn parse_complex(group: &str, original: &str) -> Result<Complex> {
    if group.is_empty() {
        return Err(unsupported(original));
    }

    let mut compounds = Vec::new();
    let mut combinators = Vec::new();
    let mut pending = Combinator::Descendant;
    let mut expect_compound = true;

    for token in tokenize(group, original)? {
        match token {
            Token::Child => {
                if expect_compound {
                    return Err(unsupported(original));
                }
                pending = Combinator::Child;
                expect_compound = true;
            }
            Token::Compound(text) => {
                if !compounds.is_empty() {
                    combinators.push(pending);
                }
                compounds.push(parse_compound(&text, original)?);
                pending = Combinator::Descendant;
                expect_compound = false;
            }
        }
    }

    if compounds.is_empty() || expect_compound {
        return Err(unsupported(original));
    }
    // :scope is only meaningful as the leftmost anchor.
    if compounds.iter().skip(1).any(|c| c.scope) {
        return Err(unsupported(original));
    }
    Ok(Complex {
        compounds,
        combinators,
    })
}

enum Token {
    Compound(String),
    Child,
}

fn tokenize(group: &str, original: &str) -> Result<Vec<Token>> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut in_brackets = false;

    for ch in group.chars() {
        match ch {
            '[' if !in_brackets => {
                in_brackets = true;
                current.push(ch);
            }
            ']' if in_brackets => {
                in_brackets = false;
                current.push(ch);
            }
            c if c.is_whitespace() && !in_brackets => {
                if !current.is_empty() {
                    tokens.push(Token::Compound(std::mem::take(&mut current)));
                }
            }
            '>' if !in_brackets => {
                if !current.is_empty() {
                    tokens.push(Token::Compound(std::mem::take(&mut current)));
                }
                tokens.push(Token::Child);
            }
            _ => current.push(ch),
        }
    }
    if in_brackets {
        return Err(unsupported(original));
    }
    if !current.is_empty() {
        tokens.push(Token::Compound(current));
    }
    Ok(tokens)
}

fn parse_compound(text: &str, original: &str) -> Result<Compound> {
    let mut compound = Compound::default();
    let mut rest = text;

    if let Some(after) = rest.strip_prefix(":scope") {
        compound.scope = true;
        if !after.is_empty() {
            // `:scope.class` and similar are not supported.
            return Err(unsupported(original));
        }
        return Ok(compound);
    }

    // Leading tag name (or the universal selector).
    if let Some(after) = rest.strip_prefix('*') {
        rest = after;
    } else {
        let tag_end = simple_end(rest);
        if tag_end > 0 {
            compound.tag = Some(rest[..tag_end].to_ascii_lowercase());
            rest = &rest[tag_end..];
        }
    }

    while !rest.is_empty() {
        if let Some(after) = rest.strip_prefix('#') {
            let end = simple_end(after);
            if end == 0 {
                return Err(unsupported(original));
            }
            compound.id = Some(after[..end].to_string());
            rest = &after[end..];
        } else if let Some(after) = rest.strip_prefix('.') {
            let end = simple_end(after);
            if end == 0 {
                return Err(unsupported(original));
            }
            compound.classes.push(after[..end].to_string());
            rest = &after[end..];
        } else if let Some(after) = rest.strip_prefix('[') {
            let end = after.find(']').ok_or_else(|| unsupported(original))?;
            compound.attrs.push(parse_attr_condition(&after[..end])?);
            rest = &after[end + 1..];
        } else {
            // Pseudo-classes other than :scope are not supported.
            return Err(unsupported(original));
        }
    }

    Ok(compound)
}

fn parse_attr_condition(body: &str) -> Result<AttrCondition> {
    match body.split_once('=') {
        None => Ok(AttrCondition {
            name: body.trim().to_ascii_lowercase(),
            value: None,
        }),
        Some((name, value)) => {
            let value = value.trim().trim_matches('"').trim_matches('\'');
            Ok(AttrCondition {
                name: name.trim().to_ascii_lowercase(),
                value: Some(value.to_string()),
            })
        }
    }
}

fn simple_end(text: &str) -> usize {
    text.find(|c: char| !(c.is_ascii_alphanumeric() || c == '-' || c == '_'))
        .unwrap_or(text.len())
}

fn unsupported(selector: &str) -> Error {
    Error::Config(format!("unsupported selector: {selector}"))
}

#[cfg(test)]
mod tests {
    use super::super::parser::parse as parse_html;
    use super::*;

    fn fixture() -> Dom {
        parse_html(
            "<div id=\"list\" class=\"items\">\
               <ul>\
                 <li class=\"item first\" data-id=\"1\">one</li>\
                 <li class=\"item\" data-id=\"2\"><span class=\"title\">two</span></li>\
               </ul>\
             </div>\
             <input type=\"text\" id=\"name\">",
        )
        .unwrap()
    }

    fn query_ids(dom: &Dom, selector: &str) -> Vec<String> {
        Selector::parse(selector)
            .unwrap()
            .query_all(dom, dom.root())
            .into_iter()
            .map(|n| {
                let data = dom.element(n).unwrap();
                data.attrs
                    .get("data-id")
                    .or(data.attrs.get("id"))
                    .cloned()
                    .unwrap_or_else(|| data.tag.clone())
            })
            .collect()
    }

    #[test]
    fn tag_id_class_and_attr_parts() {
        let dom = fixture();
        assert_eq!(query_ids(&dom, "li"), vec!["1", "2"]);
        assert_eq!(query_ids(&dom, "#name"), vec!["name"]);
        assert_eq!(query_ids(&dom, ".first"), vec!["1"]);
        assert_eq!(query_ids(&dom, "li.item.first"), vec!["1"]);
        assert_eq!(query_ids(&dom, "[data-id]"), vec!["1", "2"]);
        assert_eq!(query_ids(&dom, "[data-id=\"2\"]"), vec!["2"]);
        assert_eq!(query_ids(&dom, "input[type=text]"), vec!["name"]);
    }

    #[test]
    fn descendant_and_child_combinators() {
        let dom = fixture();
        assert_eq!(query_ids(&dom, "div span"), vec!["span"]);
        assert_eq!(query_ids(&dom, "div > ul > li"), vec!["1", "2"]);
        // span is not a direct child of div
        assert!(query_ids(&dom, "div > span").is_empty());
    }

    #[test]
    fn comma_groups_merge_in_document_order() {
        let dom = fixture();
        assert_eq!(query_ids(&dom, ".title, .first"), vec!["1", "span"]);
    }

    #[test]
    fn scope_anchors_to_query_root() {
        let dom = fixture();
        let list = dom.by_id("list").unwrap();
        let selector = Selector::parse(":scope > ul > li").unwrap();
        let matched = selector.query_all(&dom, list);
        assert_eq!(matched.len(), 2);

        // From the document root the same selector matches nothing:
        // ul is not a direct child of the root's children chain.
        let from_root = selector.query_all(&dom, dom.root());
        assert!(from_root.is_empty());
    }

    #[test]
    fn scoped_query_matches_descendants_only() {
        let dom =
            parse_html("<ul><li id=\"outer\"><ul><li id=\"inner\">x</li></ul></li></ul>").unwrap();
        let outer = dom.by_id("outer").unwrap();
        let inner = dom.by_id("inner").unwrap();

        // The scope node is an <li> itself but must not match.
        let selector = Selector::parse("li").unwrap();
        assert_eq!(selector.query_all(&dom, outer), vec![inner]);
        assert_eq!(selector.query(&dom, outer), Some(inner));
    }

    #[test]
    fn scope_alone_matches_the_root_element() {
        let dom = fixture();
        let list = dom.by_id("list").unwrap();
        let selector = Selector::parse(":scope").unwrap();
        assert_eq!(selector.query(&dom, list), Some(list));
    }

    #[test]
    fn unsupported_syntax_is_rejected() {
        assert!(Selector::parse("li:first-child").is_err());
        assert!(Selector::parse("a ~ b").is_err());
        assert!(Selector::parse("[unclosed").is_err());
        assert!(Selector::parse("").is_err());
        assert!(Selector::parse("a > > b").is_err());
    }

    #[test]
    fn closest_style_matching() {
        let dom = fixture();
        let span = Selector::parse(".title")
            .unwrap()
            .query(&dom, dom.root())
            .unwrap();
        let selector = Selector::parse("li").unwrap();
        let hit = std::iter::once(span)
            .chain(dom.ancestors(span))
            .find(|n| selector.matches(&dom, *n, dom.root()));
        let hit = hit.unwrap();
        assert_eq!(
            dom.element(hit).unwrap().attrs.get("data-id").unwrap(),
            "2"
        );
    }
}
