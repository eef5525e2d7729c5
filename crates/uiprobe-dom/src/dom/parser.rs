//! Minimal HTML parser for test fixtures.
//!
//! Handles the subset test pages are written in: nested elements,
//! quoted/unquoted/bare attributes, comments, void and self-closing
//! tags, raw-text `script`/`style` bodies and the common character
//! references. Mismatched end tags pop the open stack until the
//! matching tag, like a forgiving browser parser.

use std::collections::HashMap;

use uiprobe_core::{Error, Result};

use super::{Dom, NodeId};

const VOID_TAGS: [&str; 10] = [
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta",
];

pub(crate) fn is_void_tag(tag: &str) -> bool {
    VOID_TAGS.contains(&tag)
}

/// Parse markup into a document.
pub fn parse(html: &str) -> Result<Dom> {
    let mut dom = Dom::new();
    let bytes = html.as_bytes();
    let mut stack: Vec<NodeId> = vec![dom.root()];
    let mut i = 0usize;

    while i < bytes.len() {
        if html[i..].starts_with("<!--") {
            match html[i + 4..].find("-->") {
                Some(end) => i += 4 + end + 3,
                None => return Err(parse_error("unclosed comment")),
            }
            continue;
        }

        if html[i..].starts_with("<!") {
            // Doctype and friends: skip to the closing bracket.
            match html[i..].find('>') {
                Some(end) => i += end + 1,
                None => return Err(parse_error("unclosed declaration")),
            }
            continue;
        }

        if html[i..].starts_with("</") {
            let (tag, next) = parse_end_tag(html, i)?;
            i = next;
            while stack.len() > 1 {
                let top = stack.pop().unwrap_or(dom.root());
                if dom.tag_name(top).is_some_and(|t| t == tag) {
                    break;
                }
            }
            continue;
        }

        if bytes[i] == b'<' {
            let (tag, attrs, self_closing, next) = parse_start_tag(html, i)?;
            i = next;

            let parent = *stack.last().unwrap_or(&dom.root());
            let node = dom.create_element(parent, tag.clone(), attrs);

            if tag == "script" || tag == "style" {
                let close = format!("</{tag}");
                let body_end = html[i..]
                    .to_ascii_lowercase()
                    .find(&close)
                    .ok_or_else(|| parse_error(&format!("unclosed <{tag}>")))?;
                if body_end > 0 {
                    dom.create_text(node, html[i..i + body_end].to_string());
                }
                i += body_end;
                let (_, after) = parse_end_tag(html, i)?;
                i = after;
                continue;
            }

            if !self_closing && !is_void_tag(&tag) {
                stack.push(node);
            }
            continue;
        }

        let text_start = i;
        while i < bytes.len() && bytes[i] != b'<' {
            i += 1;
        }
        let text = &html[text_start..i];
        if !text.trim().is_empty() {
            let parent = *stack.last().unwrap_or(&dom.root());
            dom.create_text(parent, decode_entities(text));
        }
    }

    dom.initialize_form_values();
    Ok(dom)
}

fn parse_error(message: &str) -> Error {
    Error::Page(format!("HTML parse error: {message}"))
}

fn parse_start_tag(html: &str, at: usize) -> Result<(String, HashMap<String, String>, bool, usize)> {
    let bytes = html.as_bytes();
    let mut i = at + 1;

    let tag_start = i;
    while i < bytes.len() && is_name_char(bytes[i]) {
        i += 1;
    }
    let tag = html[tag_start..i].to_ascii_lowercase();
    if tag.is_empty() {
        return Err(parse_error("empty tag name"));
    }

    let mut attrs = HashMap::new();
    let mut self_closing = false;

    loop {
        skip_ws(bytes, &mut i);
        match bytes.get(i) {
            None => return Err(parse_error("unclosed start tag")),
            Some(b'>') => {
                i += 1;
                break;
            }
            Some(b'/') if bytes.get(i + 1) == Some(&b'>') => {
                self_closing = true;
                i += 2;
                break;
            }
            _ => {}
        }

        let name_start = i;
        while i < bytes.len() && is_attr_name_char(bytes[i]) {
            i += 1;
        }
        let name = html[name_start..i].to_ascii_lowercase();
        if name.is_empty() {
            return Err(parse_error("invalid attribute name"));
        }

        skip_ws(bytes, &mut i);
        let value = if bytes.get(i) == Some(&b'=') {
            i += 1;
            skip_ws(bytes, &mut i);
            parse_attr_value(html, &mut i)?
        } else {
            // Bare attribute: present without a value.
            String::new()
        };
        attrs.insert(name, value);
    }

    Ok((tag, attrs, self_closing, i))
}

fn parse_end_tag(html: &str, at: usize) -> Result<(String, usize)> {
    let bytes = html.as_bytes();
    let mut i = at + 2;
    skip_ws(bytes, &mut i);

    let tag_start = i;
    while i < bytes.len() && is_name_char(bytes[i]) {
        i += 1;
    }
    let tag = html[tag_start..i].to_ascii_lowercase();

    while i < bytes.len() && bytes[i] != b'>' {
        i += 1;
    }
    if i >= bytes.len() {
        return Err(parse_error("unclosed end tag"));
    }
    Ok((tag, i + 1))
}

fn parse_attr_value(html: &str, i: &mut usize) -> Result<String> {
    let bytes = html.as_bytes();
    match bytes.get(*i) {
        Some(&quote @ (b'"' | b'\'')) => {
            *i += 1;
            let start = *i;
            while *i < bytes.len() && bytes[*i] != quote {
                *i += 1;
            }
            if *i >= bytes.len() {
                return Err(parse_error("unclosed quoted attribute value"));
            }
            let value = decode_entities(&html[start..*i]);
            *i += 1;
            Ok(value)
        }
        Some(_) => {
            let start = *i;
            while *i < bytes.len()
                && !bytes[*i].is_ascii_whitespace()
                && bytes[*i] != b'>'
                && !(bytes[*i] == b'/' && bytes.get(*i + 1) == Some(&b'>'))
            {
                *i += 1;
            }
            Ok(decode_entities(&html[start..*i]))
        }
        None => Err(parse_error("missing attribute value")),
    }
}

fn decode_entities(text: &str) -> String {
    text.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&apos;", "'")
        .replace("&nbsp;", "\u{a0}")
        .replace("&amp;", "&")
}

fn skip_ws(bytes: &[u8], i: &mut usize) {
    while *i < bytes.len() && bytes[*i].is_ascii_whitespace() {
        *i += 1;
    }
}

fn is_name_char(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'-' || b == b'_'
}

fn is_attr_name_char(b: u8) -> bool {
    is_name_char(b) || b == b':'
}
