//! Shared navigation sequence.
//!
//! Both backends drive navigation through the same state machine:
//! arm a one-shot load signal, fire the triggering action, wait for the
//! load (or a page error), re-acquire the document, apply polyfills, then
//! run the post-navigation hooks. Arming before acting removes the race
//! between the trigger and the listener registration.

use std::sync::Arc;

use async_trait::async_trait;
use futures::future::BoxFuture;
use tokio::sync::oneshot;
use tracing::{debug, trace};

use crate::env::NavAction;
use crate::error::{Error, Result};

/// Phases of one navigation. Any failed step moves to `Failed` and the
/// error propagates to the awaiting caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NavigationPhase {
    Idle,
    AwaitingLoad,
    DocumentAcquired,
    PolyfillsApplied,
    RouteResolved,
    Failed,
}

/// Sender half of the one-shot load signal, held by the backend's page
/// machinery. Consuming it (success or failure) deregisters the listener.
pub struct LoadNotifier {
    tx: oneshot::Sender<Result<()>>,
}

impl LoadNotifier {
    pub fn loaded(self) {
        let _ = self.tx.send(Ok(()));
    }

    pub fn failed(self, err: Error) {
        let _ = self.tx.send(Err(err));
    }
}

/// Receiver half, awaited by the navigation sequence.
pub struct LoadSignal {
    rx: oneshot::Receiver<Result<()>>,
}

impl LoadSignal {
    pub async fn wait(self) -> Result<()> {
        self.rx
            .await
            .map_err(|_| Error::Navigation("load signal dropped".to_string()))?
    }
}

/// Create an armed load signal pair.
pub fn load_channel() -> (LoadNotifier, LoadSignal) {
    let (tx, rx) = oneshot::channel();
    (LoadNotifier { tx }, LoadSignal { rx })
}

/// Validates the raw markup of a freshly loaded page.
pub type ContentValidator = Arc<dyn Fn(&str) -> Result<()> + Send + Sync>;

/// Builds the active view for the loaded URL.
pub type RouteHandler = Arc<dyn Fn(String) -> BoxFuture<'static, Result<()>> + Send + Sync>;

/// Post-navigation hooks: content validation, then route resolution.
#[derive(Clone, Default)]
pub struct NavigationHooks {
    pub validate_content: Option<ContentValidator>,
    pub route_handler: Option<RouteHandler>,
}

/// Backend side of the navigation sequence: document re-acquisition and
/// environment polyfills.
#[async_trait]
pub trait NavigationTarget: Send + Sync {
    /// Re-acquire the document/page handle after a load.
    async fn acquire_document(&self) -> Result<()>;

    /// Apply polyfills the harness needs but the application does not.
    async fn apply_polyfills(&self) -> Result<()> {
        Ok(())
    }

    /// Serialized markup, fed to the content validator.
    async fn content(&self) -> Result<String>;

    /// URL after the load, fed to the route handler.
    async fn current_url(&self) -> Result<String>;
}

/// Drive one navigation: `signal` must have been armed with the backend's
/// load machinery before `action` was created.
pub async fn navigate(
    signal: LoadSignal,
    action: NavAction<'_>,
    target: &dyn NavigationTarget,
    hooks: &NavigationHooks,
) -> Result<()> {
    let result = run(signal, action, target, hooks).await;
    if let Err(err) = &result {
        debug!(error = %err, phase = ?NavigationPhase::Failed, "navigation failed");
    }
    result
}

async fn run(
    signal: LoadSignal,
    action: NavAction<'_>,
    target: &dyn NavigationTarget,
    hooks: &NavigationHooks,
) -> Result<()> {
    trace!(phase = ?NavigationPhase::AwaitingLoad, "navigation started");
    action.await?;
    signal.wait().await?;

    target.acquire_document().await?;
    trace!(phase = ?NavigationPhase::DocumentAcquired, "document acquired");

    target.apply_polyfills().await?;
    trace!(phase = ?NavigationPhase::PolyfillsApplied, "polyfills applied");

    if let Some(validate) = &hooks.validate_content {
        let content = target.content().await?;
        validate(&content)?;
    }

    if let Some(route) = &hooks.route_handler {
        let url = target.current_url().await?;
        route(url).await?;
    }
    trace!(phase = ?NavigationPhase::RouteResolved, "navigation complete");

    Ok(())
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    struct Target {
        acquired: AtomicUsize,
    }

    #[async_trait]
    impl NavigationTarget for Target {
        async fn acquire_document(&self) -> Result<()> {
            self.acquired.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        async fn content(&self) -> Result<String> {
            Ok("<html></html>".to_string())
        }

        async fn current_url(&self) -> Result<String> {
            Ok("http://localhost/".to_string())
        }
    }

    #[tokio::test]
    async fn listener_armed_before_action_runs() {
        let (notifier, signal) = load_channel();
        let target = Target {
            acquired: AtomicUsize::new(0),
        };

        // The action itself completes the load, which is only possible
        // because the signal was armed first.
        let action = Box::pin(async move {
            notifier.loaded();
            Ok(())
        });

        navigate(signal, action, &target, &NavigationHooks::default())
            .await
            .unwrap();
        assert_eq!(target.acquired.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn page_error_rejects_navigation() {
        let (notifier, signal) = load_channel();
        let target = Target {
            acquired: AtomicUsize::new(0),
        };

        let action = Box::pin(async move {
            notifier.failed(Error::Page("boom".to_string()));
            Ok(())
        });

        let err = navigate(signal, action, &target, &NavigationHooks::default())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Page(_)));
        assert_eq!(target.acquired.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn content_validator_failure_aborts_route() {
        let (notifier, signal) = load_channel();
        let target = Target {
            acquired: AtomicUsize::new(0),
        };

        let hooks = NavigationHooks {
            validate_content: Some(Arc::new(|_content| {
                Err(Error::Page("invalid content".to_string()))
            })),
            route_handler: Some(Arc::new(|_url| {
                Box::pin(async { panic!("route handler must not run") })
            })),
        };

        let action = Box::pin(async move {
            notifier.loaded();
            Ok(())
        });

        let err = navigate(signal, action, &target, &hooks).await.unwrap_err();
        assert!(matches!(err, Error::Page(_)));
    }
}
