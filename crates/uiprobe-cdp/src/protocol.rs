//! DevTools protocol message types.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Protocol request message.
#[derive(Debug, Serialize)]
pub struct CdpRequest {
    pub id: u64,
    pub method: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[serde(rename = "sessionId")]
    pub session_id: Option<String>,
}

/// Protocol response or event message.
#[derive(Debug, Deserialize)]
pub struct CdpResponse {
    pub id: Option<u64>,
    pub result: Option<Value>,
    pub error: Option<CdpErrorResponse>,
    pub method: Option<String>,
    pub params: Option<Value>,
    #[serde(rename = "sessionId")]
    pub session_id: Option<String>,
}

/// Error payload in a response.
#[derive(Debug, Deserialize)]
pub struct CdpErrorResponse {
    pub code: i64,
    pub message: String,
    pub data: Option<String>,
}

/// Browser version info.
///
/// Note: the browser returns PascalCase field names for this endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct BrowserVersion {
    #[serde(rename = "Browser")]
    pub browser: String,
    #[serde(rename = "Protocol-Version")]
    pub protocol_version: String,
    #[serde(rename = "webSocketDebuggerUrl")]
    pub web_socket_debugger_url: String,
}

/// Page info from the /json endpoint.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageInfo {
    pub id: String,
    #[serde(rename = "type")]
    pub page_type: String,
    pub title: String,
    pub url: String,
    pub web_socket_debugger_url: Option<String>,
}

/// Remote object from the Runtime domain.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteObject {
    #[serde(rename = "type")]
    pub object_type: String,
    pub subtype: Option<String>,
    pub class_name: Option<String>,
    pub value: Option<Value>,
    pub description: Option<String>,
    pub object_id: Option<String>,
}

impl RemoteObject {
    /// Whether the object references nothing (`null`/`undefined`).
    pub fn is_nullish(&self) -> bool {
        self.object_type == "undefined" || self.subtype.as_deref() == Some("null")
    }
}

/// Argument to `Runtime.callFunctionOn`: a plain value or a reference
/// to another remote object.
#[derive(Debug, Clone)]
pub enum CallArgument {
    Value(Value),
    ObjectId(String),
}

impl CallArgument {
    pub(crate) fn to_json(&self) -> Value {
        match self {
            CallArgument::Value(value) => serde_json::json!({"value": value}),
            CallArgument::ObjectId(id) => serde_json::json!({"objectId": id}),
        }
    }
}

impl From<&str> for CallArgument {
    fn from(v: &str) -> Self {
        CallArgument::Value(Value::String(v.to_string()))
    }
}

impl From<bool> for CallArgument {
    fn from(v: bool) -> Self {
        CallArgument::Value(Value::Bool(v))
    }
}

#[cfg(test)]
#[path = "protocol_tests.rs"]
mod tests;
