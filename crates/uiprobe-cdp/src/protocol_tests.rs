use super::*;

#[test]
fn request_serializes_without_empty_fields() {
    let req = CdpRequest {
        id: 1,
        method: "Page.navigate".to_string(),
        params: Some(serde_json::json!({"url": "https://example.com"})),
        session_id: None,
    };
    let json = serde_json::to_string(&req).unwrap();
    assert!(json.contains("Page.navigate"));
    assert!(json.contains("example.com"));
    assert!(!json.contains("sessionId"));
}

#[test]
fn response_deserializes() {
    let json = r#"{"id": 1, "result": {"frameId": "abc"}}"#;
    let resp: CdpResponse = serde_json::from_str(json).unwrap();
    assert_eq!(resp.id, Some(1));
    assert!(resp.result.is_some());
    assert!(resp.error.is_none());
}

#[test]
fn event_deserializes_with_session() {
    let json = r#"{"method": "Page.loadEventFired", "params": {"timestamp": 1.0}, "sessionId": "s1"}"#;
    let resp: CdpResponse = serde_json::from_str(json).unwrap();
    assert_eq!(resp.id, None);
    assert_eq!(resp.method.as_deref(), Some("Page.loadEventFired"));
    assert_eq!(resp.session_id.as_deref(), Some("s1"));
}

#[test]
fn page_info_deserializes() {
    let json = r#"{
        "id": "page123",
        "type": "page",
        "title": "Test",
        "url": "https://example.com",
        "webSocketDebuggerUrl": "ws://localhost:9222/devtools/page/page123"
    }"#;
    let info: PageInfo = serde_json::from_str(json).unwrap();
    assert_eq!(info.id, "page123");
    assert_eq!(info.page_type, "page");
}

#[test]
fn remote_object_nullish_detection() {
    let undefined: RemoteObject =
        serde_json::from_str(r#"{"type": "undefined"}"#).unwrap();
    assert!(undefined.is_nullish());

    let null: RemoteObject =
        serde_json::from_str(r#"{"type": "object", "subtype": "null", "value": null}"#).unwrap();
    assert!(null.is_nullish());

    let node: RemoteObject = serde_json::from_str(
        r#"{"type": "object", "subtype": "node", "objectId": "obj-1"}"#,
    )
    .unwrap();
    assert!(!node.is_nullish());
    assert_eq!(node.object_id.as_deref(), Some("obj-1"));
}

#[test]
fn call_arguments_encode_values_and_references() {
    let value = CallArgument::from("text").to_json();
    assert_eq!(value, serde_json::json!({"value": "text"}));

    let reference = CallArgument::ObjectId("obj-7".to_string()).to_json();
    assert_eq!(reference, serde_json::json!({"objectId": "obj-7"}));
}
