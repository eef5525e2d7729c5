//! Generic cooperative poll loop shared by both backends.

use std::future::Future;
use std::time::Duration;

use crate::error::{Error, Result};

/// Polling parameters. Defaults mirror the classic 30s/200ms pair.
#[derive(Debug, Clone, Copy)]
pub struct WaitOptions {
    pub timeout: Duration,
    pub polling: Duration,
}

impl Default for WaitOptions {
    fn default() -> Self {
        Self {
            timeout: Duration::from_millis(30_000),
            polling: Duration::from_millis(200),
        }
    }
}

impl WaitOptions {
    pub fn new(timeout: Duration, polling: Duration) -> Self {
        Self { timeout, polling }
    }
}

/// Repeatedly invoke `condition` until it yields a value or the timeout
/// elapses.
///
/// Checks are strictly sequential: a new check starts only after the
/// previous one settled, and the first check runs immediately. The hard
/// ceiling cancels any in-flight check, so no late condition result can
/// resolve the wait after the timeout fired.
pub async fn wait_for<T, F, Fut>(options: WaitOptions, mut condition: F) -> Result<T>
where
    T: Send,
    F: FnMut() -> Fut + Send,
    Fut: Future<Output = Result<Option<T>>> + Send,
{
    let poll_loop = async {
        loop {
            if let Some(value) = condition().await? {
                return Ok(value);
            }
            tokio::time::sleep(options.polling).await;
        }
    };

    match tokio::time::timeout(options.timeout, poll_loop).await {
        Ok(result) => result,
        Err(_) => Err(Error::Timeout("Wait timeout".to_string())),
    }
}

/// Wait until a boolean condition turns true.
pub async fn wait_for_true<F, Fut>(options: WaitOptions, mut condition: F) -> Result<()>
where
    F: FnMut() -> Fut + Send,
    Fut: Future<Output = Result<bool>> + Send,
{
    wait_for(options, move || {
        let check = condition();
        async move { Ok(check.await?.then_some(())) }
    })
    .await
}
