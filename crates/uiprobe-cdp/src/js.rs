//! Function sources injected into the page.
//!
//! Each constant is a function declaration for `Runtime.callFunctionOn`
//! with the relevant element (or the document) bound as `this`. All of
//! them are plain page-context DOM code; nothing here depends on the
//! application under test.

/// First match under `this` (element or document).
pub const QUERY: &str = "function(selector) { return this.querySelector(selector); }";

/// All matches under `this`, as a real array so its elements can be
/// read back through `Runtime.getProperties`.
pub const QUERY_ALL: &str =
    "function(selector) { return Array.from(this.querySelectorAll(selector)); }";

pub const CLOSEST: &str = "function(selector) { return this.closest(selector); }";

pub const PARENT: &str = "function() { return this.parentElement; }";

/// Dotted-path property read, total: a missing segment yields null.
pub const PROP: &str = "\
function(path) {\
  let v = this;\
  for (const part of path.split('.')) {\
    if (v === null || v === undefined) { return null; }\
    v = v[part];\
  }\
  return v === undefined ? null : v;\
}";

pub const ATTR: &str = "function(name) { return this.getAttribute(name); }";

pub const HAS_ATTR: &str = "function(name) { return this.hasAttribute(name); }";

pub const HAS_CLASS: &str = "function(name) { return this.classList.contains(name); }";

/// Visibility of `this`: not `hidden`, computed display/visibility not
/// suppressed; with `recursive` the same must hold up the ancestor
/// chain.
pub const IS_VISIBLE: &str = "\
function(recursive) {\
  let e = this;\
  while (e && e.nodeType === 1) {\
    const style = window.getComputedStyle(e);\
    if (e.hidden || style.display === 'none' || style.visibility === 'hidden') {\
      return false;\
    }\
    if (!recursive) { return true; }\
    e = e.parentElement;\
  }\
  return true;\
}";

/// Visibility lookup by element id, called on the document.
pub const IS_VISIBLE_BY_ID: &str = "\
function(id, recursive) {\
  let e = this.getElementById(id);\
  if (!e) { return false; }\
  while (e && e.nodeType === 1) {\
    const style = window.getComputedStyle(e);\
    if (e.hidden || style.display === 'none' || style.visibility === 'hidden') {\
      return false;\
    }\
    if (!recursive) { return true; }\
    e = e.parentElement;\
  }\
  return true;\
}";

/// Batched recursive visibility for every argument, memoized within
/// the call so a shared ancestor chain is walked once per element.
/// Null arguments resolve to false.
pub const RESOLVE_VISIBILITY: &str = "\
function() {\
  const check = (e) => {\
    while (e && e.nodeType === 1) {\
      const style = window.getComputedStyle(e);\
      if (e.hidden || style.display === 'none' || style.visibility === 'hidden') {\
        return false;\
      }\
      e = e.parentElement;\
    }\
    return true;\
  };\
  const memo = new Map();\
  return Array.from(arguments).map((e) => {\
    if (!e) { return false; }\
    if (!memo.has(e)) { memo.set(e, check(e)); }\
    return memo.get(e);\
  });\
}";

/// Select the option with the given value. Multi-select controls set
/// the matched option's selected flag to `additive`; single-select
/// controls replace the selection. Fires change on success.
pub const SELECT: &str = "\
function(value, additive) {\
  const options = Array.from(this.options);\
  const matched = options.find((o) => o.value === value);\
  if (!matched) { throw new Error('option not found: ' + value); }\
  if (this.multiple) {\
    matched.selected = additive;\
  } else {\
    this.value = value;\
  }\
  this.dispatchEvent(new Event('change', { bubbles: true }));\
}";

/// Simulated typing: one input event per appended character. Clearing
/// an already-empty control is a no-op.
pub const INPUT: &str = "\
function(value) {\
  if (value === '') {\
    if (this.value === '') { return; }\
    this.value = '';\
    this.dispatchEvent(new Event('input', { bubbles: true }));\
    return;\
  }\
  this.value = '';\
  for (const ch of value) {\
    this.value += ch;\
    this.dispatchEvent(new Event('input', { bubbles: true }));\
  }\
}";

pub const CLICK: &str = "function() { this.click(); }";

pub const CHANGE: &str =
    "function() { this.dispatchEvent(new Event('change', { bubbles: true })); }";

pub const BLUR: &str = "function() { this.dispatchEvent(new Event('blur')); }";

/// Presence and visibility of the first selector match, for the
/// selector wait loop. One round trip per poll tick.
pub const SELECTOR_STATE: &str = "\
function(selector, recursive) {\
  let e = this.querySelector(selector);\
  if (!e) { return { found: false, visible: false }; }\
  let visible = true;\
  while (e && e.nodeType === 1) {\
    const style = window.getComputedStyle(e);\
    if (e.hidden || style.display === 'none' || style.visibility === 'hidden') {\
      visible = false;\
      break;\
    }\
    if (!recursive) { break; }\
    e = e.parentElement;\
  }\
  return { found: true, visible: visible };\
}";

#[cfg(test)]
mod tests {
    use super::*;

    // The sources are handed to the browser verbatim; catch the easy
    // mistakes (truncated strings, stray quoting) without a browser.
    #[test]
    fn sources_are_function_declarations() {
        for src in [
            QUERY,
            QUERY_ALL,
            CLOSEST,
            PARENT,
            PROP,
            ATTR,
            HAS_ATTR,
            HAS_CLASS,
            IS_VISIBLE,
            IS_VISIBLE_BY_ID,
            RESOLVE_VISIBILITY,
            SELECT,
            INPUT,
            CLICK,
            CHANGE,
            BLUR,
            SELECTOR_STATE,
        ] {
            assert!(src.starts_with("function"), "not a declaration: {src}");
            assert_eq!(
                src.matches('{').count(),
                src.matches('}').count(),
                "unbalanced braces: {src}"
            );
            assert_eq!(src.matches('(').count(), src.matches(')').count());
        }
    }

    #[test]
    fn input_source_dispatches_per_character() {
        assert!(INPUT.contains("for (const ch of value)"));
        assert!(INPUT.contains("new Event('input', { bubbles: true })"));
    }

    #[test]
    fn visibility_sources_check_all_three_signals() {
        for src in [IS_VISIBLE, IS_VISIBLE_BY_ID, RESOLVE_VISIBILITY, SELECTOR_STATE] {
            assert!(src.contains("e.hidden"));
            assert!(src.contains("style.display === 'none'"));
            assert!(src.contains("style.visibility === 'hidden'"));
        }
    }
}
