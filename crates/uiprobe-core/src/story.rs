//! Test stories and the sequential runner.

use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::env::Environment;
use crate::error::{Error, Result};
use crate::report::{BlockCategory, Results};

/// One named test scenario.
///
/// `before_run`/`after_run` bracket the scenario; a failure in either
/// aborts the story, while check failures inside `run` are expected to
/// be recorded through the environment's reporter and not abort it.
#[async_trait]
pub trait Story: Send + Sync {
    fn name(&self) -> &str;

    async fn before_run(&self, _env: &Arc<dyn Environment>) -> Result<()> {
        Ok(())
    }

    async fn run(&self, env: &Arc<dyn Environment>) -> Result<()>;

    async fn after_run(&self, _env: &Arc<dyn Environment>) -> Result<()> {
        Ok(())
    }
}

/// Registered stories, kept in registration order.
#[derive(Default)]
pub struct StoryRegistry {
    stories: Vec<Arc<dyn Story>>,
}

impl StoryRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, story: Arc<dyn Story>) {
        self.stories.push(story);
    }

    pub fn names(&self) -> Vec<&str> {
        self.stories.iter().map(|s| s.name()).collect()
    }

    /// Stories to execute: the named one, or all of them in registration
    /// order when no name is given. An unknown name is an error listing
    /// the registered stories.
    pub fn select(&self, name: Option<&str>) -> Result<Vec<Arc<dyn Story>>> {
        match name {
            None => Ok(self.stories.clone()),
            Some(name) => {
                let story = self
                    .stories
                    .iter()
                    .find(|s| s.name() == name)
                    .cloned()
                    .ok_or_else(|| {
                        Error::NotFound(format!(
                            "story '{name}' (registered: {})",
                            self.names().join(", ")
                        ))
                    })?;
                Ok(vec![story])
            }
        }
    }
}

/// Executes stories one after another against a single environment.
pub struct Runner {
    env: Arc<dyn Environment>,
}

impl Runner {
    pub fn new(env: Arc<dyn Environment>) -> Self {
        Self { env }
    }

    /// Run the selected stories sequentially. A story that errors is
    /// recorded as a failed result and the run continues with the next
    /// one. Returns the final counters.
    pub async fn run(&self, stories: &[Arc<dyn Story>]) -> Result<Results> {
        let started = Instant::now();

        for story in stories {
            self.env.set_block(story.name(), BlockCategory::Story);
            if let Err(err) = self.run_story(story.as_ref()).await {
                debug!(story = story.name(), error = %err, "story failed");
                self.env.add_error(&err);
            }
        }

        self.env.set_duration(started.elapsed().as_millis() as u64);
        Ok(self.env.reporter().results())
    }

    async fn run_story(&self, story: &dyn Story) -> Result<()> {
        story.before_run(&self.env).await?;
        let result = story.run(&self.env).await;
        match story.after_run(&self.env).await {
            Ok(()) => result,
            // A cleanup failure must not mask the story's own error.
            Err(cleanup) if result.is_err() => {
                warn!(story = story.name(), error = %cleanup, "cleanup failed");
                result
            }
            Err(cleanup) => Err(cleanup),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::env::{Elem, NavAction, SelectorWaitOptions, VisibilityTarget};
    use crate::http::{HttpResponse, RequestBody};
    use crate::report::Reporter;
    use crate::value::Scalar;

    /// Environment stub for runner tests: stories here never touch the
    /// page, so every capability is unreachable.
    #[derive(Default)]
    struct NullEnv {
        reporter: Reporter,
    }

    fn unreachable_call<T>() -> Result<T> {
        Err(Error::Backend("not driven by this test".to_string()))
    }

    #[async_trait]
    impl Environment for NullEnv {
        fn base_url(&self) -> String {
            String::new()
        }

        async fn url(&self) -> Result<String> {
            unreachable_call()
        }

        async fn query(&self, _parent: Option<&Elem>, _selector: &str) -> Result<Option<Elem>> {
            unreachable_call()
        }

        async fn query_all(&self, _parent: Option<&Elem>, _selector: &str) -> Result<Vec<Elem>> {
            unreachable_call()
        }

        async fn closest(&self, _elem: &Elem, _selector: &str) -> Result<Option<Elem>> {
            unreachable_call()
        }

        async fn parent_node(&self, _elem: &Elem) -> Result<Option<Elem>> {
            unreachable_call()
        }

        async fn prop(&self, _elem: &Elem, _path: &str) -> Result<Option<Scalar>> {
            unreachable_call()
        }

        async fn attr(&self, _elem: &Elem, _name: &str) -> Result<Option<String>> {
            unreachable_call()
        }

        async fn has_attr(&self, _elem: &Elem, _name: &str) -> Result<bool> {
            unreachable_call()
        }

        async fn has_class(&self, _elem: &Elem, _name: &str) -> Result<bool> {
            unreachable_call()
        }

        async fn is_visible(
            &self,
            _target: VisibilityTarget<'_>,
            _recursive: bool,
        ) -> Result<bool> {
            unreachable_call()
        }

        async fn resolve_visibility(&self, _elems: &[Option<Elem>]) -> Result<Vec<bool>> {
            unreachable_call()
        }

        async fn select(&self, _elem: &Elem, _value: &str, _additive: bool) -> Result<()> {
            unreachable_call()
        }

        async fn input(&self, _elem: &Elem, _value: &str) -> Result<()> {
            unreachable_call()
        }

        async fn click(&self, _elem: &Elem) -> Result<()> {
            unreachable_call()
        }

        async fn on_change(&self, _elem: &Elem) -> Result<()> {
            unreachable_call()
        }

        async fn on_blur(&self, _elem: &Elem) -> Result<()> {
            unreachable_call()
        }

        async fn wait_for_selector(
            &self,
            _selector: &str,
            _options: SelectorWaitOptions,
        ) -> Result<Option<Elem>> {
            unreachable_call()
        }

        async fn navigation(&self, _action: NavAction<'_>) -> Result<()> {
            unreachable_call()
        }

        async fn goto(&self, _url: &str) -> Result<()> {
            unreachable_call()
        }

        async fn get_content(&self) -> Result<String> {
            unreachable_call()
        }

        async fn http_req(
            &self,
            _method: &str,
            _url: &str,
            _data: Option<RequestBody>,
            _headers: &[(String, String)],
        ) -> Result<HttpResponse> {
            unreachable_call()
        }

        fn reporter(&self) -> &Reporter {
            &self.reporter
        }
    }

    struct Named(&'static str);

    #[async_trait]
    impl Story for Named {
        fn name(&self) -> &str {
            self.0
        }

        async fn run(&self, _env: &Arc<dyn Environment>) -> Result<()> {
            Ok(())
        }
    }

    #[test]
    fn selects_all_in_registration_order() {
        let mut registry = StoryRegistry::new();
        registry.register(Arc::new(Named("security")));
        registry.register(Arc::new(Named("profile")));

        let selected = registry.select(None).unwrap();
        let names: Vec<&str> = selected.iter().map(|s| s.name()).collect();
        assert_eq!(names, vec!["security", "profile"]);
    }

    #[test]
    fn selects_single_story_by_name() {
        let mut registry = StoryRegistry::new();
        registry.register(Arc::new(Named("security")));
        registry.register(Arc::new(Named("profile")));

        let selected = registry.select(Some("profile")).unwrap();
        assert_eq!(selected.len(), 1);
        assert_eq!(selected[0].name(), "profile");
    }

    #[test]
    fn unknown_story_lists_registered_names() {
        let mut registry = StoryRegistry::new();
        registry.register(Arc::new(Named("security")));

        let err = registry.select(Some("missing")).map(|_| ()).unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
        assert!(err.to_string().contains("security"));
    }

    struct Flaky {
        fail_run: bool,
    }

    #[async_trait]
    impl Story for Flaky {
        fn name(&self) -> &str {
            "flaky"
        }

        async fn run(&self, _env: &Arc<dyn Environment>) -> Result<()> {
            if self.fail_run {
                Err(Error::Page("main failure".to_string()))
            } else {
                Ok(())
            }
        }

        async fn after_run(&self, _env: &Arc<dyn Environment>) -> Result<()> {
            Err(Error::Backend("cleanup failure".to_string()))
        }
    }

    #[tokio::test]
    async fn cleanup_failure_does_not_mask_the_run_error() {
        let runner = Runner::new(Arc::new(NullEnv::default()));
        let err = runner
            .run_story(&Flaky { fail_run: true })
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Page(_)));
        assert!(err.to_string().contains("main failure"));
    }

    #[tokio::test]
    async fn cleanup_failure_alone_fails_the_story() {
        let runner = Runner::new(Arc::new(NullEnv::default()));
        let err = runner
            .run_story(&Flaky { fail_run: false })
            .await
            .unwrap_err();
        assert!(err.to_string().contains("cleanup failure"));
    }
}
