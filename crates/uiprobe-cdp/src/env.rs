//! Remote-control implementation of the capability environment.
//!
//! Every capability is expressed as a small page-context function
//! invoked on a remote object handle; the browser does the real DOM
//! work. One page session is held for the lifetime of the environment.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use base64::{engine::general_purpose, Engine as _};
use parking_lot::Mutex;
use serde_json::Value;
use tracing::debug;
use url::Url;

use uiprobe_core::navigation::{navigate, NavigationTarget};
use uiprobe_core::{
    Elem, Environment, Error, HttpClient, HttpResponse, NavAction, NavigationHooks, Reporter,
    RequestBody, Result, Scalar, SelectorWaitOptions, VisibilityTarget, WaitOptions,
};

use crate::client::CdpClient;
use crate::js;
use crate::page::Page;
use crate::protocol::CallArgument;

/// Handle table mapping opaque element handles to remote object ids.
/// Navigation bumps the generation, invalidating earlier handles.
#[derive(Default)]
struct HandleTable {
    next: u64,
    generation: u64,
    map: HashMap<u64, (u64, String)>,
}

impl HandleTable {
    fn issue(&mut self, object_id: String) -> Elem {
        self.next += 1;
        self.map.insert(self.next, (self.generation, object_id));
        Elem::new(self.next)
    }

    fn resolve(&self, elem: &Elem) -> Result<String> {
        match self.map.get(&elem.id()) {
            Some((generation, object_id)) if *generation == self.generation => {
                Ok(object_id.clone())
            }
            Some(_) => Err(Error::Backend(
                "stale element handle: the page has navigated".to_string(),
            )),
            None => Err(Error::Backend("unknown element handle".to_string())),
        }
    }
}

/// Environment backed by a real browser page.
pub struct RemoteEnv {
    base_url: Url,
    client: Arc<CdpClient>,
    page: Page,
    hooks: NavigationHooks,
    handles: Mutex<HandleTable>,
    /// Document object id for the current generation.
    doc: Mutex<Option<String>>,
    reporter: Reporter,
    http: HttpClient,
}

impl RemoteEnv {
    /// Connect to a browser debugging endpoint and open a fresh page.
    pub async fn connect(endpoint: &str, base_url: &str) -> Result<Self> {
        let base_url = Url::parse(base_url)
            .map_err(|e| Error::Config(format!("invalid base URL {base_url}: {e}")))?;
        let client = Arc::new(CdpClient::connect(endpoint).await?);
        let page_info = client.new_page().await?;
        let page = Page::attach(client.clone(), &page_info.id).await?;

        Ok(Self {
            base_url,
            client,
            page,
            hooks: NavigationHooks::default(),
            handles: Mutex::new(HandleTable::default()),
            doc: Mutex::new(None),
            reporter: Reporter::new(),
            // Redirects are reported, not followed, and the session
            // cookie jar carries logins across requests.
            http: HttpClient::with_cookie_jar()?,
        })
    }

    pub fn with_hooks(mut self, hooks: NavigationHooks) -> Self {
        self.hooks = hooks;
        self
    }

    /// Close the page this environment drives.
    pub async fn close(&self) -> Result<()> {
        self.client.close_page(self.page.target_id()).await
    }

    fn doc_id(&self) -> Result<String> {
        self.doc
            .lock()
            .clone()
            .ok_or_else(|| Error::Backend("no document loaded".to_string()))
    }

    fn object_of(&self, elem: &Elem) -> Result<String> {
        self.handles.lock().resolve(elem)
    }

    fn scope_of(&self, parent: Option<&Elem>) -> Result<String> {
        match parent {
            Some(elem) => self.object_of(elem),
            None => self.doc_id(),
        }
    }

    /// Wrap a remote node object into an element handle; nullish
    /// results become `None`.
    fn wrap(&self, object: crate::protocol::RemoteObject) -> Result<Option<Elem>> {
        if object.is_nullish() {
            return Ok(None);
        }
        let object_id = object
            .object_id
            .ok_or_else(|| Error::Backend("remote node without object id".to_string()))?;
        Ok(Some(self.handles.lock().issue(object_id)))
    }

    async fn elem_call(&self, elem: &Elem, function: &str, args: Vec<CallArgument>) -> Result<Value> {
        let object_id = self.object_of(elem)?;
        self.page.call_function_on(&object_id, function, args).await
    }
}

#[async_trait]
impl NavigationTarget for RemoteEnv {
    async fn acquire_document(&self) -> Result<()> {
        let object = self.page.evaluate_handle("document").await?;
        let object_id = object
            .object_id
            .ok_or_else(|| Error::Navigation("document handle unavailable".to_string()))?;
        self.handles.lock().generation += 1;
        *self.doc.lock() = Some(object_id);
        debug!("document re-acquired");
        Ok(())
    }

    async fn content(&self) -> Result<String> {
        self.page.content().await
    }

    async fn current_url(&self) -> Result<String> {
        self.page.current_url().await
    }
}

#[async_trait]
impl Environment for RemoteEnv {
    fn base_url(&self) -> String {
        self.base_url.to_string()
    }

    async fn url(&self) -> Result<String> {
        self.page.current_url().await
    }

    async fn query(&self, parent: Option<&Elem>, selector: &str) -> Result<Option<Elem>> {
        let scope = self.scope_of(parent)?;
        let object = self
            .page
            .call_function_on_handle(&scope, js::QUERY, vec![CallArgument::from(selector)])
            .await?;
        self.wrap(object)
    }

    async fn query_all(&self, parent: Option<&Elem>, selector: &str) -> Result<Vec<Elem>> {
        let scope = self.scope_of(parent)?;
        let array = self
            .page
            .call_function_on_handle(&scope, js::QUERY_ALL, vec![CallArgument::from(selector)])
            .await?;
        let Some(array_id) = array.object_id else {
            return Ok(Vec::new());
        };

        let mut out = Vec::new();
        for object in self.page.array_elements(&array_id).await? {
            if let Some(elem) = self.wrap(object)? {
                out.push(elem);
            }
        }
        self.page.release_object(&array_id).await?;
        Ok(out)
    }

    async fn closest(&self, elem: &Elem, selector: &str) -> Result<Option<Elem>> {
        let object_id = self.object_of(elem)?;
        let object = self
            .page
            .call_function_on_handle(&object_id, js::CLOSEST, vec![CallArgument::from(selector)])
            .await?;
        self.wrap(object)
    }

    async fn parent_node(&self, elem: &Elem) -> Result<Option<Elem>> {
        let object_id = self.object_of(elem)?;
        let object = self
            .page
            .call_function_on_handle(&object_id, js::PARENT, vec![])
            .await?;
        self.wrap(object)
    }

    async fn prop(&self, elem: &Elem, path: &str) -> Result<Option<Scalar>> {
        let value = self
            .elem_call(elem, js::PROP, vec![CallArgument::from(path)])
            .await?;
        if value.is_null() {
            return Ok(None);
        }
        Ok(Scalar::from_json(&value))
    }

    async fn attr(&self, elem: &Elem, name: &str) -> Result<Option<String>> {
        let value = self
            .elem_call(elem, js::ATTR, vec![CallArgument::from(name)])
            .await?;
        Ok(value.as_str().map(str::to_string))
    }

    async fn has_attr(&self, elem: &Elem, name: &str) -> Result<bool> {
        let value = self
            .elem_call(elem, js::HAS_ATTR, vec![CallArgument::from(name)])
            .await?;
        Ok(value.as_bool().unwrap_or(false))
    }

    async fn has_class(&self, elem: &Elem, name: &str) -> Result<bool> {
        let value = self
            .elem_call(elem, js::HAS_CLASS, vec![CallArgument::from(name)])
            .await?;
        Ok(value.as_bool().unwrap_or(false))
    }

    async fn is_visible(&self, target: VisibilityTarget<'_>, recursive: bool) -> Result<bool> {
        let value = match target {
            VisibilityTarget::Elem(elem) => {
                self.elem_call(elem, js::IS_VISIBLE, vec![CallArgument::from(recursive)])
                    .await?
            }
            VisibilityTarget::Id(id) => {
                let doc = self.doc_id()?;
                self.page
                    .call_function_on(
                        &doc,
                        js::IS_VISIBLE_BY_ID,
                        vec![CallArgument::from(id), CallArgument::from(recursive)],
                    )
                    .await?
            }
        };
        Ok(value.as_bool().unwrap_or(false))
    }

    async fn resolve_visibility(&self, elems: &[Option<Elem>]) -> Result<Vec<bool>> {
        if elems.is_empty() {
            return Ok(Vec::new());
        }

        // One round trip for the whole batch.
        let mut args = Vec::with_capacity(elems.len());
        for elem in elems {
            args.push(match elem {
                Some(elem) => CallArgument::ObjectId(self.object_of(elem)?),
                None => CallArgument::Value(Value::Null),
            });
        }

        let doc = self.doc_id()?;
        let value = self
            .page
            .call_function_on(&doc, js::RESOLVE_VISIBILITY, args)
            .await?;
        let resolved: Vec<bool> = value
            .as_array()
            .map(|arr| arr.iter().map(|v| v.as_bool().unwrap_or(false)).collect())
            .unwrap_or_default();

        if resolved.len() != elems.len() {
            return Err(Error::Backend(
                "visibility batch result length mismatch".to_string(),
            ));
        }
        Ok(resolved)
    }

    async fn select(&self, elem: &Elem, value: &str, additive: bool) -> Result<()> {
        let result = self
            .elem_call(
                elem,
                js::SELECT,
                vec![CallArgument::from(value), CallArgument::from(additive)],
            )
            .await;
        match result {
            Err(Error::Page(message)) if message.contains("option not found") => {
                Err(Error::NotFound(message))
            }
            other => other.map(|_| ()),
        }
    }

    async fn input(&self, elem: &Elem, value: &str) -> Result<()> {
        self.elem_call(elem, js::INPUT, vec![CallArgument::from(value)])
            .await?;
        Ok(())
    }

    async fn click(&self, elem: &Elem) -> Result<()> {
        self.elem_call(elem, js::CLICK, vec![]).await?;
        Ok(())
    }

    async fn on_change(&self, elem: &Elem) -> Result<()> {
        self.elem_call(elem, js::CHANGE, vec![]).await?;
        Ok(())
    }

    async fn on_blur(&self, elem: &Elem) -> Result<()> {
        self.elem_call(elem, js::BLUR, vec![]).await?;
        Ok(())
    }

    async fn wait_for_selector(
        &self,
        selector: &str,
        options: SelectorWaitOptions,
    ) -> Result<Option<Elem>> {
        options.validate()?;

        let wait = WaitOptions {
            timeout: options.timeout,
            ..WaitOptions::default()
        };
        let satisfied = uiprobe_core::wait_for(wait, || async move {
            let doc = self.doc_id()?;
            let state = self
                .page
                .call_function_on(
                    &doc,
                    js::SELECTOR_STATE,
                    vec![CallArgument::from(selector), CallArgument::from(true)],
                )
                .await?;
            let found = state["found"].as_bool().unwrap_or(false);
            let visible = state["visible"].as_bool().unwrap_or(false);

            if options.visible {
                return Ok((found && visible).then_some(true));
            }
            if !found {
                return Ok(Some(false));
            }
            Ok((!visible).then_some(true))
        })
        .await?;

        if satisfied {
            self.query(None, selector).await
        } else {
            Ok(None)
        }
    }

    async fn navigation(&self, action: NavAction<'_>) -> Result<()> {
        let signal = self.client.arm_load();
        let result = navigate(signal, action, self, &self.hooks).await;
        if result.is_err() {
            self.client.disarm_load();
        }
        result
    }

    async fn goto(&self, url: &str) -> Result<()> {
        let absolute = self
            .base_url
            .join(url)
            .map_err(|e| Error::Config(format!("invalid URL {url}: {e}")))?
            .to_string();
        let action: NavAction<'_> = Box::pin(async move { self.page.navigate(&absolute).await });
        self.navigation(action).await
    }

    async fn get_content(&self) -> Result<String> {
        self.page.content().await
    }

    async fn http_req(
        &self,
        method: &str,
        url: &str,
        data: Option<RequestBody>,
        headers: &[(String, String)],
    ) -> Result<HttpResponse> {
        self.http.request(method, url, data, headers).await
    }

    async fn capture_artifact(&self, path: &Path) -> Result<()> {
        let encoded = self.page.screenshot().await?;
        let bytes = general_purpose::STANDARD
            .decode(encoded)
            .map_err(|e| Error::Backend(format!("invalid screenshot payload: {e}")))?;
        tokio::fs::write(path, bytes)
            .await
            .map_err(|e| Error::Backend(format!("failed to write {}: {e}", path.display())))?;
        debug!(path = %path.display(), "screenshot captured");
        Ok(())
    }

    fn reporter(&self) -> &Reporter {
        &self.reporter
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn handles_expire_on_generation_bump() {
        let mut table = HandleTable::default();
        let elem = table.issue("obj-1".to_string());
        assert_eq!(table.resolve(&elem).unwrap(), "obj-1");

        table.generation += 1;
        let err = table.resolve(&elem).unwrap_err();
        assert!(matches!(err, Error::Backend(_)));

        let fresh = table.issue("obj-2".to_string());
        assert_eq!(table.resolve(&fresh).unwrap(), "obj-2");
    }

    #[test]
    fn unknown_handles_are_rejected() {
        let table = HandleTable::default();
        let err = table.resolve(&Elem::new(99)).unwrap_err();
        assert!(matches!(err, Error::Backend(_)));
    }
}
