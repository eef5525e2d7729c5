//! In-process implementation of the capability environment.
//!
//! The whole page lives inside the test process: markup is fetched by a
//! [`PageLoader`], parsed into the arena document, and every capability
//! operates on that document directly. No browser is involved, which
//! makes this backend fast and fully deterministic.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::json;
use tracing::debug;
use url::Url;

use uiprobe_core::navigation::{load_channel, navigate, LoadNotifier, NavigationTarget};
use uiprobe_core::{
    prop_path, Elem, Environment, Error, HttpClient, HttpResponse, NavAction, NavigationHooks,
    Reporter, RequestBody, Result, Scalar, SelectorWaitOptions, VisibilityTarget, WaitOptions,
};

use crate::dom::selector::Selector;
use crate::dom::{parser, Dom, NodeId};
use crate::events::{EventBus, Listener};
use crate::loader::PageLoader;

/// The active document plus its event machinery.
struct PageState {
    dom: Dom,
    events: EventBus,
    url: String,
}

/// Handle table. Handles carry the generation they were created in;
/// navigation bumps the generation, invalidating everything issued
/// against the previous document.
#[derive(Default)]
struct HandleTable {
    next: u64,
    generation: u64,
    map: HashMap<u64, (u64, NodeId)>,
}

impl HandleTable {
    fn issue(&mut self, node: NodeId) -> Elem {
        self.next += 1;
        self.map.insert(self.next, (self.generation, node));
        Elem::new(self.next)
    }

    fn resolve(&self, elem: &Elem) -> Result<NodeId> {
        match self.map.get(&elem.id()) {
            Some((generation, node)) if *generation == self.generation => Ok(*node),
            Some(_) => Err(Error::Backend(
                "stale element handle: the document was replaced".to_string(),
            )),
            None => Err(Error::Backend("unknown element handle".to_string())),
        }
    }
}

/// Environment backed by the embedded document.
pub struct InProcessEnv {
    base_url: Url,
    loader: Arc<dyn PageLoader>,
    hooks: NavigationHooks,
    state: Mutex<Option<PageState>>,
    handles: Mutex<HandleTable>,
    pending_load: Mutex<Option<LoadNotifier>>,
    reporter: Reporter,
    http: HttpClient,
}

impl InProcessEnv {
    pub fn new(base_url: &str, loader: Arc<dyn PageLoader>) -> Result<Self> {
        let base_url = Url::parse(base_url)
            .map_err(|e| Error::Config(format!("invalid base URL {base_url}: {e}")))?;
        Ok(Self {
            base_url,
            loader,
            hooks: NavigationHooks::default(),
            state: Mutex::new(None),
            handles: Mutex::new(HandleTable::default()),
            pending_load: Mutex::new(None),
            reporter: Reporter::new(),
            http: HttpClient::new()?,
        })
    }

    pub fn with_hooks(mut self, hooks: NavigationHooks) -> Self {
        self.hooks = hooks;
        self
    }

    /// Register an event listener on an element. Used by suites that
    /// simulate application behavior.
    pub fn listen(&self, elem: &Elem, event: &str, listener: Listener) -> Result<()> {
        let node = self.handles.lock().resolve(elem)?;
        self.with_state_mut(|state| {
            state.events.listen(node, event, listener);
            Ok(())
        })
    }

    /// Number of times `event` fired with the element as its target.
    pub fn event_count(&self, elem: &Elem, event: &str) -> Result<usize> {
        let node = self.handles.lock().resolve(elem)?;
        self.with_state(|state| Ok(state.events.count(node, event)))
    }

    /// Mutate the live document directly, outside any event flow. Used
    /// by suites that simulate application behavior (showing a dialog,
    /// filling a list) without a script engine.
    pub fn mutate<R>(&self, f: impl FnOnce(&mut Dom) -> R) -> Result<R> {
        self.with_state_mut(|state| Ok(f(&mut state.dom)))
    }

    fn with_state<R>(&self, f: impl FnOnce(&PageState) -> Result<R>) -> Result<R> {
        let state = self.state.lock();
        let state = state
            .as_ref()
            .ok_or_else(|| Error::Backend("no document loaded".to_string()))?;
        f(state)
    }

    fn with_state_mut<R>(&self, f: impl FnOnce(&mut PageState) -> Result<R>) -> Result<R> {
        let mut state = self.state.lock();
        let state = state
            .as_mut()
            .ok_or_else(|| Error::Backend("no document loaded".to_string()))?;
        f(state)
    }

    fn node_of(&self, elem: &Elem) -> Result<NodeId> {
        self.handles.lock().resolve(elem)
    }

    fn scope_of(&self, parent: Option<&Elem>, dom: &Dom) -> Result<NodeId> {
        match parent {
            Some(elem) => self.handles.lock().resolve(elem),
            None => Ok(dom.root()),
        }
    }

    /// Fetch, parse and install a new document, then complete the armed
    /// load signal.
    async fn perform_load(&self, url: &str) -> Result<()> {
        let html = self.loader.load(url).await?;
        let dom = parser::parse(&html)?;

        let generation = {
            let mut handles = self.handles.lock();
            handles.generation += 1;
            handles.generation
        };
        *self.state.lock() = Some(PageState {
            dom,
            events: EventBus::new(),
            url: url.to_string(),
        });
        debug!(url, generation, "document installed");

        if let Some(notifier) = self.pending_load.lock().take() {
            notifier.loaded();
        }
        Ok(())
    }

    fn visibility_of(&self, elem: &Elem, recursive: bool) -> Result<bool> {
        let node = self.node_of(elem)?;
        self.with_state(|state| Ok(state.dom.is_visible(node, recursive)))
    }
}

#[async_trait]
impl NavigationTarget for InProcessEnv {
    async fn acquire_document(&self) -> Result<()> {
        self.with_state(|_| Ok(()))
            .map_err(|_| Error::Navigation("no document after load".to_string()))
    }

    async fn content(&self) -> Result<String> {
        self.with_state(|state| Ok(state.dom.to_html(state.dom.root())))
    }

    async fn current_url(&self) -> Result<String> {
        self.with_state(|state| Ok(state.url.clone()))
    }
}

#[async_trait]
impl Environment for InProcessEnv {
    fn base_url(&self) -> String {
        self.base_url.to_string()
    }

    async fn url(&self) -> Result<String> {
        self.with_state(|state| Ok(state.url.clone()))
    }

    async fn query(&self, parent: Option<&Elem>, selector: &str) -> Result<Option<Elem>> {
        let selector = Selector::parse(selector)?;
        let found = self.with_state(|state| {
            let scope = self.scope_of(parent, &state.dom)?;
            Ok(selector.query(&state.dom, scope))
        })?;
        Ok(found.map(|node| self.handles.lock().issue(node)))
    }

    async fn query_all(&self, parent: Option<&Elem>, selector: &str) -> Result<Vec<Elem>> {
        let selector = Selector::parse(selector)?;
        let found = self.with_state(|state| {
            let scope = self.scope_of(parent, &state.dom)?;
            Ok(selector.query_all(&state.dom, scope))
        })?;
        let mut handles = self.handles.lock();
        Ok(found.into_iter().map(|node| handles.issue(node)).collect())
    }

    async fn closest(&self, elem: &Elem, selector: &str) -> Result<Option<Elem>> {
        let selector = Selector::parse(selector)?;
        let node = self.node_of(elem)?;
        let found = self.with_state(|state| {
            Ok(std::iter::once(node)
                .chain(state.dom.ancestors(node))
                .find(|n| selector.matches(&state.dom, *n, state.dom.root())))
        })?;
        Ok(found.map(|node| self.handles.lock().issue(node)))
    }

    async fn parent_node(&self, elem: &Elem) -> Result<Option<Elem>> {
        let node = self.node_of(elem)?;
        let parent = self.with_state(|state| Ok(state.dom.parent_element(node)))?;
        Ok(parent.map(|node| self.handles.lock().issue(node)))
    }

    async fn prop(&self, elem: &Elem, path: &str) -> Result<Option<Scalar>> {
        let node = self.node_of(elem)?;
        self.with_state(|state| {
            let data = state
                .dom
                .element(node)
                .ok_or_else(|| Error::Backend("handle does not reference an element".to_string()))?;
            let props = json!({
                "tagName": data.tag.to_uppercase(),
                "id": data.attrs.get("id").cloned().unwrap_or_default(),
                "className": data.attrs.get("class").cloned().unwrap_or_default(),
                "value": data.value,
                "checked": data.checked,
                "selected": data.selected,
                "disabled": data.disabled,
                "hidden": data.attrs.contains_key("hidden"),
                "textContent": state.dom.text_content(node),
                "attributes": data.attrs,
                "style": {
                    "display": data.style("display").unwrap_or_default(),
                    "visibility": data.style("visibility").unwrap_or_default(),
                },
            });
            Ok(prop_path::lookup(&props, path).and_then(Scalar::from_json))
        })
    }

    async fn attr(&self, elem: &Elem, name: &str) -> Result<Option<String>> {
        let node = self.node_of(elem)?;
        self.with_state(|state| {
            Ok(state
                .dom
                .element(node)
                .and_then(|data| data.attrs.get(name).cloned()))
        })
    }

    async fn has_attr(&self, elem: &Elem, name: &str) -> Result<bool> {
        let node = self.node_of(elem)?;
        self.with_state(|state| {
            Ok(state
                .dom
                .element(node)
                .is_some_and(|data| data.attrs.contains_key(name)))
        })
    }

    async fn has_class(&self, elem: &Elem, name: &str) -> Result<bool> {
        let node = self.node_of(elem)?;
        self.with_state(|state| {
            Ok(state
                .dom
                .element(node)
                .is_some_and(|data| data.has_class(name)))
        })
    }

    async fn is_visible(&self, target: VisibilityTarget<'_>, recursive: bool) -> Result<bool> {
        match target {
            VisibilityTarget::Elem(elem) => self.visibility_of(elem, recursive),
            VisibilityTarget::Id(id) => self.with_state(|state| {
                Ok(state
                    .dom
                    .by_id(id)
                    .is_some_and(|node| state.dom.is_visible(node, recursive)))
            }),
        }
    }

    async fn resolve_visibility(&self, elems: &[Option<Elem>]) -> Result<Vec<bool>> {
        let mut memo: HashMap<u64, bool> = HashMap::new();
        let mut out = Vec::with_capacity(elems.len());
        for elem in elems {
            match elem {
                None => out.push(false),
                Some(elem) => {
                    let visible = match memo.get(&elem.id()) {
                        Some(cached) => *cached,
                        None => {
                            let visible = self.visibility_of(elem, true)?;
                            memo.insert(elem.id(), visible);
                            visible
                        }
                    };
                    out.push(visible);
                }
            }
        }
        Ok(out)
    }

    async fn select(&self, elem: &Elem, value: &str, additive: bool) -> Result<()> {
        let node = self.node_of(elem)?;
        self.with_state_mut(|state| {
            let PageState { dom, events, .. } = state;

            let options: Vec<NodeId> = dom
                .descendants(node)
                .into_iter()
                .filter(|n| dom.tag_name(*n) == Some("option"))
                .collect();
            let matched = options
                .iter()
                .copied()
                .find(|n| dom.option_value(*n) == value)
                .ok_or_else(|| Error::NotFound(format!("option with value '{value}'")))?;

            let multiple = dom
                .element(node)
                .is_some_and(|data| data.attrs.contains_key("multiple"));
            if multiple {
                if let Some(data) = dom.element_mut(matched) {
                    data.selected = additive;
                }
            } else {
                for option in options {
                    if let Some(data) = dom.element_mut(option) {
                        data.selected = option == matched;
                    }
                }
                if let Some(data) = dom.element_mut(node) {
                    data.value = value.to_string();
                }
            }

            events.dispatch(dom, node, "change", true);
            Ok(())
        })
    }

    async fn input(&self, elem: &Elem, value: &str) -> Result<()> {
        let node = self.node_of(elem)?;
        self.with_state_mut(|state| {
            let PageState { dom, events, .. } = state;
            let data = dom
                .element_mut(node)
                .ok_or_else(|| Error::Backend("handle does not reference an element".to_string()))?;

            if value.is_empty() {
                if data.value.is_empty() {
                    return Ok(());
                }
                data.value.clear();
                events.dispatch(dom, node, "input", true);
                return Ok(());
            }

            data.value.clear();
            for ch in value.chars() {
                if let Some(data) = dom.element_mut(node) {
                    data.value.push(ch);
                }
                events.dispatch(dom, node, "input", true);
            }
            Ok(())
        })
    }

    async fn click(&self, elem: &Elem) -> Result<()> {
        let node = self.node_of(elem)?;
        self.with_state_mut(|state| {
            let PageState { dom, events, .. } = state;

            let control = dom
                .element(node)
                .filter(|data| data.tag == "input")
                .map(|data| {
                    (
                        data.attrs.get("type").cloned().unwrap_or_default(),
                        data.attrs.get("name").cloned(),
                    )
                });
            match control.as_ref().map(|(t, n)| (t.as_str(), n)) {
                Some(("checkbox", _)) => {
                    if let Some(data) = dom.element_mut(node) {
                        data.checked = !data.checked;
                    }
                }
                Some(("radio", name)) => {
                    // Checking one radio unchecks the rest of its group.
                    if let Some(name) = name.clone() {
                        let group: Vec<NodeId> = dom
                            .descendants(dom.root())
                            .into_iter()
                            .filter(|n| {
                                dom.element(*n).is_some_and(|d| {
                                    d.tag == "input"
                                        && d.attrs.get("type").map(String::as_str)
                                            == Some("radio")
                                        && d.attrs.get("name") == Some(&name)
                                })
                            })
                            .collect();
                        for radio in group {
                            if let Some(data) = dom.element_mut(radio) {
                                data.checked = radio == node;
                            }
                        }
                    } else if let Some(data) = dom.element_mut(node) {
                        data.checked = true;
                    }
                }
                _ => {}
            }

            events.dispatch(dom, node, "click", true);
            Ok(())
        })
    }

    async fn on_change(&self, elem: &Elem) -> Result<()> {
        let node = self.node_of(elem)?;
        self.with_state_mut(|state| {
            let PageState { dom, events, .. } = state;
            events.dispatch(dom, node, "change", true);
            Ok(())
        })
    }

    async fn on_blur(&self, elem: &Elem) -> Result<()> {
        let node = self.node_of(elem)?;
        self.with_state_mut(|state| {
            let PageState { dom, events, .. } = state;
            events.dispatch(dom, node, "blur", false);
            Ok(())
        })
    }

    async fn wait_for_selector(
        &self,
        selector: &str,
        options: SelectorWaitOptions,
    ) -> Result<Option<Elem>> {
        options.validate()?;
        let parsed = Selector::parse(selector)?;

        let wait = WaitOptions {
            timeout: options.timeout,
            ..WaitOptions::default()
        };
        wait_for_state(self, wait, move |env| {
            let found = env.with_state(|state| {
                Ok(parsed
                    .query(&state.dom, state.dom.root())
                    .map(|node| (node, state.dom.is_visible(node, true))))
            })?;

            if options.visible {
                if let Some((node, true)) = found {
                    return Ok(Some(Some(env.handles.lock().issue(node))));
                }
                return Ok(None);
            }
            match found {
                None => Ok(Some(None)),
                Some((node, false)) => Ok(Some(Some(env.handles.lock().issue(node)))),
                Some((_, true)) => Ok(None),
            }
        })
        .await
    }

    async fn navigation(&self, action: NavAction<'_>) -> Result<()> {
        let (notifier, signal) = load_channel();
        *self.pending_load.lock() = Some(notifier);

        let result = navigate(signal, action, self, &self.hooks).await;
        // Disarm on failure so the next navigation starts clean.
        self.pending_load.lock().take();
        result
    }

    async fn goto(&self, url: &str) -> Result<()> {
        let absolute = self
            .base_url
            .join(url)
            .map_err(|e| Error::Config(format!("invalid URL {url}: {e}")))?
            .to_string();
        let action: NavAction<'_> = Box::pin(async move { self.perform_load(&absolute).await });
        self.navigation(action).await
    }

    async fn get_content(&self) -> Result<String> {
        self.with_state(|state| Ok(state.dom.to_html(state.dom.root())))
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

    fn reporter(&self) -> &Reporter {
        &self.reporter
    }
}

/// Poll a synchronous condition against the environment.
async fn wait_for_state<T: Send>(
    env: &InProcessEnv,
    options: WaitOptions,
    mut condition: impl FnMut(&InProcessEnv) -> Result<Option<T>> + Send,
) -> Result<T> {
    uiprobe_core::wait_for(options, move || {
        let tick = condition(env);
        async move { tick }
    })
    .await
}

#[cfg(test)]
#[path = "env_tests.rs"]
mod tests;
