//! The capability environment contract.
//!
//! Every backend (in-process document or remote-controlled browser)
//! implements [`Environment`]; component and test code is written against
//! the trait and stays backend-agnostic.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use futures::future::BoxFuture;

use crate::error::{Error, Result};
use crate::http::{HttpResponse, RequestBody};
use crate::report::{BlockCategory, Reporter};
use crate::value::Scalar;

/// Opaque element handle.
///
/// Handles are only meaningful to the backend that produced them and are
/// invalidated by navigation; a stale handle yields a backend error
/// instead of touching the wrong document.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Elem {
    id: u64,
}

impl Elem {
    pub fn new(id: u64) -> Self {
        Self { id }
    }

    pub fn id(&self) -> u64 {
        self.id
    }
}

/// Target of a visibility query: an element handle or an element id.
#[derive(Debug, Clone, Copy)]
pub enum VisibilityTarget<'a> {
    Elem(&'a Elem),
    Id(&'a str),
}

impl<'a> From<&'a Elem> for VisibilityTarget<'a> {
    fn from(elem: &'a Elem) -> Self {
        VisibilityTarget::Elem(elem)
    }
}

impl<'a> From<&'a str> for VisibilityTarget<'a> {
    fn from(id: &'a str) -> Self {
        VisibilityTarget::Id(id)
    }
}

/// Options for [`Environment::wait_for_selector`].
///
/// Exactly one of `visible`/`hidden` must be set; anything else is a
/// configuration error raised before any polling begins.
#[derive(Debug, Clone, Copy)]
pub struct SelectorWaitOptions {
    pub timeout: Duration,
    pub visible: bool,
    pub hidden: bool,
}

impl Default for SelectorWaitOptions {
    fn default() -> Self {
        Self {
            timeout: Duration::from_millis(30_000),
            visible: false,
            hidden: false,
        }
    }
}

impl SelectorWaitOptions {
    pub fn visible() -> Self {
        Self {
            visible: true,
            ..Self::default()
        }
    }

    pub fn hidden() -> Self {
        Self {
            hidden: true,
            ..Self::default()
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.visible == self.hidden {
            return Err(Error::Config(
                "exactly one of `visible` and `hidden` must be set".to_string(),
            ));
        }
        Ok(())
    }
}

/// An action that triggers a navigation, passed to
/// [`Environment::navigation`]. The future is created lazily by the
/// caller and only runs after the load listener is armed.
pub type NavAction<'a> = BoxFuture<'a, Result<()>>;

/// The uniform capability interface over both execution backends.
///
/// Operations return `None`/empty rather than erroring when a query has
/// no match; errors are reserved for invalid input, lost handles and
/// transport failures.
#[async_trait]
pub trait Environment: Send + Sync {
    /// Base URL of the application under test.
    fn base_url(&self) -> String;

    /// Current URL of the active view.
    async fn url(&self) -> Result<String>;

    /// Resolve the first element matching `selector` under `parent`
    /// (document root when `parent` is `None`).
    async fn query(&self, parent: Option<&Elem>, selector: &str) -> Result<Option<Elem>>;

    /// Resolve all elements matching `selector` under `parent`.
    async fn query_all(&self, parent: Option<&Elem>, selector: &str) -> Result<Vec<Elem>>;

    /// Closest ancestor (or self) matching `selector`.
    async fn closest(&self, elem: &Elem, selector: &str) -> Result<Option<Elem>>;

    /// Parent node, `None` at the document root.
    async fn parent_node(&self, elem: &Elem) -> Result<Option<Elem>>;

    /// Read a property through a dotted path (`style.display`), stopping
    /// at the first missing segment. Total: never errors on a miss.
    async fn prop(&self, elem: &Elem, path: &str) -> Result<Option<Scalar>>;

    /// Read an attribute value.
    async fn attr(&self, elem: &Elem, name: &str) -> Result<Option<String>>;

    /// Whether the attribute is present at all.
    async fn has_attr(&self, elem: &Elem, name: &str) -> Result<bool>;

    /// Whether the class list contains `name`.
    async fn has_class(&self, elem: &Elem, name: &str) -> Result<bool>;

    /// Resolve visibility: no `hidden` attribute, display not `none`,
    /// visibility not `hidden`. With `recursive` the requirement
    /// propagates up to the document root. Unresolvable targets are not
    /// visible.
    async fn is_visible(&self, target: VisibilityTarget<'_>, recursive: bool) -> Result<bool>;

    /// Resolve visibility for a batch of handles in one backend round
    /// trip. `None` entries resolve to `false`. An element appearing more
    /// than once is evaluated once.
    async fn resolve_visibility(&self, elems: &[Option<Elem>]) -> Result<Vec<bool>>;

    /// Select the option with the given value. On multi-select controls
    /// the matched option's selected flag is set to `additive`; on
    /// single-select controls the option becomes the sole selection.
    /// Errors when no option carries the value; fires change on success.
    async fn select(&self, elem: &Elem, value: &str, additive: bool) -> Result<()>;

    /// Simulate text entry. Clearing an already-empty control is a no-op;
    /// non-empty text emits one input notification per appended character.
    async fn input(&self, elem: &Elem, value: &str) -> Result<()>;

    /// Dispatch a click in the page context.
    async fn click(&self, elem: &Elem) -> Result<()>;

    /// Dispatch a change notification.
    async fn on_change(&self, elem: &Elem) -> Result<()>;

    /// Dispatch a blur notification.
    async fn on_blur(&self, elem: &Elem) -> Result<()>;

    /// Click a checkbox/radio control and fire its change notification.
    async fn check(&self, elem: &Elem) -> Result<()> {
        self.click(elem).await?;
        self.on_change(elem).await
    }

    /// Poll until the selector's visibility matches the requested state.
    /// Returns the matched element (`None` when waiting for `hidden` and
    /// the element is absent).
    async fn wait_for_selector(
        &self,
        selector: &str,
        options: SelectorWaitOptions,
    ) -> Result<Option<Elem>>;

    /// Plain delay.
    async fn timeout(&self, ms: u64) -> Result<()> {
        tokio::time::sleep(Duration::from_millis(ms)).await;
        Ok(())
    }

    /// Run `action` with a one-shot page-load listener armed beforehand,
    /// then re-acquire the document and run the post-navigation hooks.
    /// A page error reported during load rejects the navigation.
    async fn navigation(&self, action: NavAction<'_>) -> Result<()>;

    /// Navigate to a URL through the full navigation sequence.
    async fn goto(&self, url: &str) -> Result<()>;

    /// Serialized markup of the active document.
    async fn get_content(&self) -> Result<String>;

    /// Raw HTTP request outside the page. See [`crate::http::HttpClient`].
    async fn http_req(
        &self,
        method: &str,
        url: &str,
        data: Option<RequestBody>,
        headers: &[(String, String)],
    ) -> Result<HttpResponse>;

    /// Capture a diagnostic artifact (screenshot) to `path`. Only the
    /// remote-control backend supports this.
    async fn capture_artifact(&self, _path: &Path) -> Result<()> {
        Err(Error::Backend(
            "artifact capture is not supported by this backend".to_string(),
        ))
    }

    /// The reporting sink owned by this environment.
    fn reporter(&self) -> &Reporter;

    /// Record a named pass/fail result.
    fn add_result(&self, descr: &str, res: bool) {
        self.reporter().add_result(descr, res);
    }

    /// Record an error as a failing result; its message becomes the line.
    fn add_error(&self, err: &Error) {
        self.reporter().add_error(err);
    }

    /// Open a titled block in the report.
    fn set_block(&self, title: &str, category: BlockCategory) {
        self.reporter().set_block(title, category);
    }

    /// Record the total run duration in milliseconds.
    fn set_duration(&self, ms: u64) {
        self.reporter().set_duration(ms);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn selector_wait_options_enforce_xor() {
        assert!(SelectorWaitOptions::default().validate().is_err());
        assert!(SelectorWaitOptions::visible().validate().is_ok());
        assert!(SelectorWaitOptions::hidden().validate().is_ok());

        let both = SelectorWaitOptions {
            visible: true,
            hidden: true,
            ..Default::default()
        };
        let err = both.validate().unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }
}
