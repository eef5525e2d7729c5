//! A session attached to a single page target.

use std::sync::Arc;

use serde_json::{json, Value};
use tracing::debug;

use uiprobe_core::{Error, Result};

use crate::client::CdpClient;
use crate::protocol::{CallArgument, RemoteObject};

/// Command surface for one attached page.
pub struct Page {
    client: Arc<CdpClient>,
    target_id: String,
    session_id: String,
}

impl Page {
    /// Attach to an existing target and enable the domains the harness
    /// relies on.
    pub async fn attach(client: Arc<CdpClient>, target_id: &str) -> Result<Self> {
        let session_id = client.attach(target_id).await?;
        let page = Self {
            client,
            target_id: target_id.to_string(),
            session_id,
        };
        page.enable_domains().await?;
        Ok(page)
    }

    pub fn target_id(&self) -> &str {
        &self.target_id
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub async fn call(&self, method: &str, params: Option<Value>) -> Result<Value> {
        self.client
            .call(method, params, Some(&self.session_id))
            .await
    }

    async fn enable_domains(&self) -> Result<()> {
        self.call("Page.enable", None).await?;
        self.call("DOM.enable", None).await?;
        self.call("Runtime.enable", None).await?;
        self.call("Network.enable", None).await?;
        debug!("enabled protocol domains for session {}", self.session_id);
        Ok(())
    }

    /// Evaluate an expression, returning its value. A thrown exception
    /// becomes a page error.
    pub async fn evaluate(&self, expression: &str) -> Result<Value> {
        let result = self
            .call(
                "Runtime.evaluate",
                Some(json!({
                    "expression": expression,
                    "returnByValue": true,
                    "awaitPromise": true,
                })),
            )
            .await?;
        check_exception(&result)?;
        Ok(result["result"]["value"].clone())
    }

    /// Evaluate an expression, returning a remote object handle.
    pub async fn evaluate_handle(&self, expression: &str) -> Result<RemoteObject> {
        let result = self
            .call(
                "Runtime.evaluate",
                Some(json!({
                    "expression": expression,
                    "returnByValue": false,
                })),
            )
            .await?;
        check_exception(&result)?;
        let object: RemoteObject = serde_json::from_value(result["result"].clone())?;
        Ok(object)
    }

    /// Call a function with a remote object as `this`, returning the
    /// result by value.
    pub async fn call_function_on(
        &self,
        object_id: &str,
        function: &str,
        args: Vec<CallArgument>,
    ) -> Result<Value> {
        let result = self
            .call(
                "Runtime.callFunctionOn",
                Some(function_params(object_id, function, args, true)),
            )
            .await?;
        check_exception(&result)?;
        Ok(result["result"]["value"].clone())
    }

    /// Like [`Page::call_function_on`] but returning a handle, for
    /// functions that produce elements.
    pub async fn call_function_on_handle(
        &self,
        object_id: &str,
        function: &str,
        args: Vec<CallArgument>,
    ) -> Result<RemoteObject> {
        let result = self
            .call(
                "Runtime.callFunctionOn",
                Some(function_params(object_id, function, args, false)),
            )
            .await?;
        check_exception(&result)?;
        let object: RemoteObject = serde_json::from_value(result["result"].clone())?;
        Ok(object)
    }

    /// Element handles inside an array remote object, in index order.
    pub async fn array_elements(&self, object_id: &str) -> Result<Vec<RemoteObject>> {
        let result = self
            .call(
                "Runtime.getProperties",
                Some(json!({
                    "objectId": object_id,
                    "ownProperties": true,
                })),
            )
            .await?;

        let mut indexed: Vec<(usize, RemoteObject)> = Vec::new();
        if let Some(props) = result["result"].as_array() {
            for prop in props {
                let Some(index) = prop["name"].as_str().and_then(|n| n.parse::<usize>().ok())
                else {
                    continue;
                };
                let object: RemoteObject = serde_json::from_value(prop["value"].clone())?;
                indexed.push((index, object));
            }
        }
        indexed.sort_by_key(|(index, _)| *index);
        Ok(indexed.into_iter().map(|(_, object)| object).collect())
    }

    /// Release a remote object handle.
    pub async fn release_object(&self, object_id: &str) -> Result<()> {
        self.call(
            "Runtime.releaseObject",
            Some(json!({"objectId": object_id})),
        )
        .await?;
        Ok(())
    }

    /// Start a navigation. Completion is signalled by the load event,
    /// not by this call returning.
    pub async fn navigate(&self, url: &str) -> Result<()> {
        let result = self
            .call("Page.navigate", Some(json!({"url": url})))
            .await?;
        if let Some(error) = result.get("errorText").and_then(Value::as_str) {
            if !error.is_empty() {
                return Err(Error::Navigation(error.to_string()));
            }
        }
        Ok(())
    }

    /// Serialized markup of the current document.
    pub async fn content(&self) -> Result<String> {
        let value = self
            .evaluate("document.documentElement.outerHTML")
            .await?;
        Ok(value.as_str().unwrap_or_default().to_string())
    }

    /// Current page URL.
    pub async fn current_url(&self) -> Result<String> {
        let value = self.evaluate("window.location.href").await?;
        Ok(value.as_str().unwrap_or_default().to_string())
    }

    /// Capture a PNG screenshot, returned base64-encoded.
    pub async fn screenshot(&self) -> Result<String> {
        let result = self
            .call("Page.captureScreenshot", Some(json!({"format": "png"})))
            .await?;
        result["data"]
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| Error::Backend("missing screenshot data".to_string()))
    }
}

fn function_params(
    object_id: &str,
    function: &str,
    args: Vec<CallArgument>,
    return_by_value: bool,
) -> Value {
    let mut params = json!({
        "objectId": object_id,
        "functionDeclaration": function,
        "returnByValue": return_by_value,
        "awaitPromise": true,
    });
    if !args.is_empty() {
        params["arguments"] = Value::Array(args.iter().map(CallArgument::to_json).collect());
    }
    params
}

fn check_exception(result: &Value) -> Result<()> {
    if let Some(exception) = result.get("exceptionDetails") {
        let text = exception["exception"]["description"]
            .as_str()
            .or_else(|| exception["text"].as_str())
            .unwrap_or("unknown error");
        return Err(Error::Page(text.to_string()));
    }
    Ok(())
}
