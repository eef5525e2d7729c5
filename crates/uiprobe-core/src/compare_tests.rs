use serde_json::json;

use super::*;
use crate::content::TestableNode;

fn content(value: serde_json::Value) -> Content {
    Content::from_json(&value)
}

fn expected(value: serde_json::Value) -> Expected {
    Expected::from_json(&value)
}

#[test]
fn matches_subset_of_actual() {
    let actual = content(json!({"title": "Item 1", "count": 2, "extra": "ignored"}));
    let want = expected(json!({"title": "Item 1"}));
    assert_eq!(deep_meet(&actual, &want), Ok(()));
}

#[test]
fn any_matches_every_value() {
    let actual = content(json!(5));
    assert_eq!(deep_meet(&actual, &Expected::Any), Ok(()));

    let actual = content(json!({"a": 1}));
    assert_eq!(deep_meet(&actual, &Expected::Any), Ok(()));
}

#[test]
fn absent_key_reports_path_only() {
    let actual = content(json!({"title": "Item 1"}));
    let want = expected(json!({"missing": 1}));

    let mismatch = deep_meet(&actual, &want).unwrap_err();
    assert_eq!(mismatch.key, "missing");
    assert_eq!(mismatch.value, None);
    assert_eq!(mismatch.expected, None);
    assert_eq!(mismatch.to_string(), "Path (missing) not found");
}

#[test]
fn absent_key_with_any_expected_is_fine() {
    let actual = content(json!({"title": "Item 1"}));
    let want = Expected::map([("missing", Expected::Any)]);
    assert_eq!(deep_meet(&actual, &want), Ok(()));
}

#[test]
fn nan_compares_nan_aware() {
    let actual = Content::value(f64::NAN);
    assert_eq!(deep_meet(&actual, &Expected::value(f64::NAN)), Ok(()));
    assert!(deep_meet(&actual, &Expected::value(5.0)).is_err());
    assert!(deep_meet(&Content::value(5.0), &Expected::value(f64::NAN)).is_err());
}

#[test]
fn value_difference_carries_both_sides() {
    let actual = content(json!({"title": "Item 2"}));
    let want = expected(json!({"title": "Item 1"}));

    let mismatch = deep_meet(&actual, &want).unwrap_err();
    assert_eq!(mismatch.key, "title");
    assert_eq!(mismatch.value, Some(Scalar::Str("Item 2".into())));
    assert_eq!(mismatch.expected, Some(Scalar::Str("Item 1".into())));
    assert_eq!(
        mismatch.to_string(),
        "Not expected value \"Item 2\" for (title) \"Item 1\" is expected"
    );
}

#[test]
fn nested_mismatch_path_accumulates() {
    let actual = content(json!({"a": {"b": {"c": 1}}}));
    let want = expected(json!({"a": {"b": {"c": 2}}}));

    let mismatch = deep_meet(&actual, &want).unwrap_err();
    assert_eq!(mismatch.key, "a.b.c");
}

#[test]
fn array_length_reported_before_elements() {
    let actual = content(json!({"items": [1, 2]}));
    let want = expected(json!({"items": [1, 2, 3]}));

    let mismatch = deep_meet(&actual, &want).unwrap_err();
    assert_eq!(mismatch.key, "items.length");
    assert_eq!(mismatch.value, Some(Scalar::Int(2)));
    assert_eq!(mismatch.expected, Some(Scalar::Int(3)));
}

#[test]
fn array_element_mismatch_uses_indexed_path() {
    let actual = content(json!({"children": [{"title": "a"}, {"title": "b"}]}));
    let want = expected(json!({"children": [{"title": "a"}, {"title": "c"}]}));

    let mismatch = deep_meet(&actual, &want).unwrap_err();
    assert_eq!(mismatch.key, "children[1].title");
}

#[test]
fn expected_container_against_scalar_is_immediate_mismatch() {
    let actual = content(json!({"a": 5}));
    let want = expected(json!({"a": {"b": 1}}));

    let mismatch = deep_meet(&actual, &want).unwrap_err();
    assert_eq!(mismatch.key, "a");
    assert!(mismatch.expected.is_some());
}

#[test]
fn holder_with_value_field_matches_primitive() {
    let actual = content(json!({"amount": {"value": "100", "visible": true}}));
    let want = expected(json!({"amount": "100"}));
    assert_eq!(deep_meet(&actual, &want), Ok(()));

    let want = expected(json!({"amount": "200"}));
    let mismatch = deep_meet(&actual, &want).unwrap_err();
    assert_eq!(mismatch.key, "amount");
    assert_eq!(mismatch.value, Some(Scalar::Str("100".into())));
}

#[test]
fn nested_children_scenario() {
    let actual = content(json!({
        "item1": {
            "title": "Item 1",
            "children": [
                {"id": "child_1", "title": "Child item 1"},
                {"id": "child_2", "title": "Child item 2"},
            ],
        },
    }));
    let want = expected(json!({
        "item1": {
            "title": "Item 1",
            "children": [
                {"id": "child_1", "title": "Child item 1"},
                {"id": "child_2", "title": "Child item 2"},
            ],
        },
    }));

    assert_eq!(deep_meet(&actual, &want), Ok(()));
}

#[derive(Debug)]
struct UppercaseTitle {
    node: ContentNode,
}

impl UppercaseTitle {
    fn new(title: &str) -> Self {
        let mut node = ContentNode::new(None);
        node.set("title", title);
        Self { node }
    }
}

impl TestableNode for UppercaseTitle {
    fn content(&self) -> &ContentNode {
        &self.node
    }

    fn content_mut(&mut self) -> &mut ContentNode {
        &mut self.node
    }

    // Case-insensitive title equality.
    fn check_values(&self, expected: &Expected, path: &str) -> std::result::Result<(), Mismatch> {
        let want = match expected {
            Expected::Map(map) => map.get("title"),
            _ => None,
        };
        let Some(Expected::Value(Scalar::Str(want))) = want else {
            return Ok(());
        };
        let got = match self.node.fields.get("title") {
            Some(Content::Value(Scalar::Str(s))) => s.clone(),
            _ => String::new(),
        };
        if got.eq_ignore_ascii_case(want) {
            Ok(())
        } else {
            Err(Mismatch::diff(
                join_key(path, "title"),
                Scalar::Str(got),
                Scalar::Str(want.clone()),
            ))
        }
    }
}

#[test]
fn component_defines_custom_equality() {
    let mut node = ContentNode::new(None);
    node.fields.insert(
        "header".to_string(),
        Content::component(UppercaseTitle::new("HELLO")),
    );
    let actual = Content::Node(node);

    let want = expected(json!({"header": {"title": "hello"}}));
    assert_eq!(deep_meet(&actual, &want), Ok(()));

    let want = expected(json!({"header": {"title": "other"}}));
    let mismatch = deep_meet(&actual, &want).unwrap_err();
    assert_eq!(mismatch.key, "header.title");
}

#[test]
fn check_values_converts_to_error() {
    let Content::Node(node) = content(json!({"a": 1})) else {
        unreachable!();
    };

    assert!(check_values(&node.fields, &expected(json!({"a": 1})), "").is_ok());

    let err = check_values(&node.fields, &expected(json!({"a": 2})), "").unwrap_err();
    assert!(matches!(err, Error::Mismatch(_)));

    let err = check_values(&node.fields, &Expected::value(1), "").unwrap_err();
    assert!(matches!(err, Error::Config(_)));
}
