//! The testable component model.
//!
//! A component owns a region of the live UI: it parses that region into
//! a content tree, derives an application-level model from it, and
//! checks the result against an expected-state literal. Content is
//! rebuilt wholesale on every [`TestComponent::parse`]; nothing is
//! patched incrementally, so a check always sees a coherent snapshot.

use std::sync::Arc;

use async_trait::async_trait;
use futures::future::BoxFuture;
use tracing::debug;

use uiprobe_core::{Elem, Environment, Error, Expected, Result};
use uiprobe_core::{ContentNode, TestableNode};

use crate::visibility::{self, VisibilityExpectation};

/// State shared by every component: the environment it reads through,
/// the backing element, and the last parsed content tree.
pub struct ComponentCore {
    env: Arc<dyn Environment>,
    elem: Option<Elem>,
    content: ContentNode,
    parsed: bool,
}

impl ComponentCore {
    pub fn new(env: Arc<dyn Environment>, elem: Option<Elem>) -> Self {
        let content = ContentNode::new(elem.clone());
        Self {
            env,
            elem,
            content,
            parsed: false,
        }
    }

    /// Resolve a backing element under `parent` and build a core around
    /// it. Yields `None` when the selector has no match, so optional
    /// page regions can be probed without erroring.
    pub async fn create(
        env: Arc<dyn Environment>,
        parent: Option<&Elem>,
        selector: &str,
    ) -> Result<Option<Self>> {
        let elem = env.query(parent, selector).await?;
        Ok(elem.map(|elem| Self::new(env, Some(elem))))
    }

    pub fn env(&self) -> &Arc<dyn Environment> {
        &self.env
    }

    pub fn elem(&self) -> Option<&Elem> {
        self.elem.as_ref()
    }

    pub fn content(&self) -> &ContentNode {
        &self.content
    }

    pub fn content_mut(&mut self) -> &mut ContentNode {
        &mut self.content
    }

    /// Whether [`TestComponent::parse`] has completed at least once.
    pub fn is_parsed(&self) -> bool {
        self.parsed
    }

    /// Replace the content snapshot. Only called at the end of a fully
    /// successful parse, so a failed refresh leaves the previous
    /// snapshot in place and the component still unusable for checks
    /// until a parse succeeds.
    fn install(&mut self, content: ContentNode) {
        self.content = content;
        self.parsed = true;
    }
}

/// A component that can parse itself and verify its state.
///
/// Implementors provide [`TestComponent::parse_content`] and forward
/// [`TestableNode`] to their [`ComponentCore`]; the refresh sequence,
/// visibility resolution and state checking are provided here.
#[async_trait]
pub trait TestComponent: TestableNode {
    fn core(&self) -> &ComponentCore;

    fn core_mut(&mut self) -> &mut ComponentCore;

    /// Derive a fresh content tree from the live UI.
    async fn parse_content(&mut self) -> Result<ContentNode>;

    /// Hook run on the freshly parsed content before visibility
    /// resolution. Default no-op.
    async fn post_parse(&mut self, _content: &mut ContentNode) -> Result<()> {
        Ok(())
    }

    /// Rebuild the derived model from the parsed content. Default no-op
    /// for components without a model.
    async fn build_model(&mut self, _content: &ContentNode) -> Result<()> {
        Ok(())
    }

    /// The component's own expected state, used by
    /// [`TestComponent::check_state`] when the caller passes none.
    fn expected_state(&self) -> Option<Expected> {
        None
    }

    /// Atomic refresh: parse content, run the post-parse hook, resolve
    /// visibility for every node not already carrying a `visible`
    /// field, rebuild the model, then swap the snapshot in. A failure
    /// at any step aborts the refresh without installing partial
    /// content.
    async fn parse(&mut self) -> Result<()> {
        let mut content = self.parse_content().await?;
        self.post_parse(&mut content).await?;
        visibility::resolve_content_visibility(self.core().env().as_ref(), &mut content).await?;
        self.build_model(&content).await?;
        debug!(
            target: "uiprobe::view",
            fields = content.fields.len(),
            "component parsed"
        );
        self.core_mut().install(content);
        Ok(())
    }

    /// Parse once if no snapshot exists yet.
    async fn ensure_parsed(&mut self) -> Result<()> {
        if !self.core().is_parsed() {
            self.parse().await?;
        }
        Ok(())
    }

    /// Run a mutating action between a guaranteed-fresh parse and a
    /// reparse, so subsequent checks never see a pre-action snapshot.
    async fn perform_action<F>(&mut self, action: F) -> Result<()>
    where
        Self: Sized,
        F: for<'a> FnOnce(&'a mut Self) -> BoxFuture<'a, Result<()>> + Send,
    {
        self.ensure_parsed().await?;
        action(self).await?;
        self.parse().await
    }

    /// Compare the parsed content against `expected`, falling back to
    /// the component's own [`TestComponent::expected_state`]. Having
    /// neither is a configuration error.
    async fn check_state(&mut self, expected: Option<&Expected>) -> Result<()> {
        self.ensure_parsed().await?;
        match expected {
            Some(expected) => self.check_values(expected, "").map_err(Error::from),
            None => {
                let own = self.expected_state().ok_or_else(|| {
                    Error::Config(
                        "check_state called without an expected state and the component \
                         defines none"
                            .to_string(),
                    )
                })?;
                self.check_values(&own, "").map_err(Error::from)
            }
        }
    }

    /// Compare live visibility of the parsed content against a parallel
    /// expectation tree.
    async fn check_visibility(&mut self, expected: &VisibilityExpectation) -> Result<()> {
        self.ensure_parsed().await?;
        visibility::check_visibility(
            self.core().env().as_ref(),
            self.core().content(),
            expected,
            "",
        )
        .await
    }
}

#[cfg(test)]
#[path = "component_tests.rs"]
mod tests;
