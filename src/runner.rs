//! Run-loop glue: environment construction, story execution and the
//! process exit contract.
//!
//! A test binary registers its stories and hands control to
//! [`run_cli`], which selects the backend, runs the stories, prints the
//! summary line and yields the exit code.

use std::future::Future;
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use uiprobe_cdp::RemoteEnv;
use uiprobe_core::{Environment, Error, Result, Results, Runner, StoryRegistry};
use uiprobe_dom::{HttpLoader, InProcessEnv};

use crate::cli::Cli;
use crate::config::{Backend, HarnessConfig};

/// Initialize tracing with console output, honoring `RUST_LOG`.
pub fn init_tracing() {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(env_filter).init();
}

/// Construct the configured backend.
pub async fn build_env(config: &HarnessConfig) -> Result<Arc<dyn Environment>> {
    match config.target.backend {
        Backend::Dom => {
            let loader = Arc::new(HttpLoader::new()?);
            let env = InProcessEnv::new(&config.target.base_url, loader)?;
            Ok(Arc::new(env))
        }
        Backend::Cdp => {
            let env = RemoteEnv::connect(&config.target.endpoint, &config.target.base_url).await?;
            Ok(Arc::new(env))
        }
    }
}

/// Run the selected stories against an environment and return the final
/// counters.
pub async fn run_stories(
    env: &Arc<dyn Environment>,
    registry: &StoryRegistry,
    story: Option<&str>,
    expected: u32,
) -> Result<Results> {
    env.reporter().reset(expected);
    let selected = registry.select(story)?;
    info!(stories = selected.len(), "starting test run");
    Runner::new(env.clone()).run(&selected).await
}

/// Run one named check: a passing action is recorded as an OK result, a
/// failing one propagates with the description folded into the error so
/// the report names the step that broke.
pub async fn test_step<T, F>(env: &Arc<dyn Environment>, descr: &str, action: F) -> Result<T>
where
    F: Future<Output = Result<T>> + Send,
{
    match action.await {
        Ok(value) => {
            env.add_result(descr, true);
            Ok(value)
        }
        Err(err) => Err(annotate(descr, err)),
    }
}

// Fold the step description into message-carrying errors; structured
// errors (mismatch paths, protocol codes) already name their subject.
fn annotate(descr: &str, err: Error) -> Error {
    match err {
        Error::Config(msg) => Error::Config(format!("{descr}: {msg}")),
        Error::NotFound(msg) => Error::NotFound(format!("{descr}: {msg}")),
        Error::Timeout(msg) => Error::Timeout(format!("{descr}: {msg}")),
        Error::Page(msg) => Error::Page(format!("{descr}: {msg}")),
        Error::Navigation(msg) => Error::Navigation(format!("{descr}: {msg}")),
        Error::Http(msg) => Error::Http(format!("{descr}: {msg}")),
        Error::WebSocket(msg) => Error::WebSocket(format!("{descr}: {msg}")),
        Error::Backend(msg) => Error::Backend(format!("{descr}: {msg}")),
        other => other,
    }
}

/// Exit code for a finished run: zero only when nothing failed.
pub fn exit_code(results: &Results) -> u8 {
    if results.fail == 0 {
        0
    } else {
        1
    }
}

/// Full command-line entry point for a test binary: parse arguments,
/// build the backend, run the stories, print `Total/Passed/Failed` and
/// return the exit code. Initialization failures exit with code 2.
pub async fn run_cli(registry: &StoryRegistry) -> ExitCode {
    init_tracing();
    let cli = Cli::parse();

    let config = match cli.resolve() {
        Ok(config) => config,
        Err(err) => {
            error!("invalid configuration: {err}");
            return ExitCode::from(2);
        }
    };

    let env = match build_env(&config).await {
        Ok(env) => env,
        Err(err) => {
            error!("backend initialization failed: {err}");
            return ExitCode::from(2);
        }
    };

    let results = match run_stories(&env, registry, cli.story.as_deref(), config.report.expected)
        .await
    {
        Ok(results) => results,
        Err(err) => {
            env.add_error(&err);
            env.reporter().results()
        }
    };

    if results.fail > 0 {
        capture_failure_artifact(env.as_ref(), &config).await;
    }

    println!("{}", results.summary());
    ExitCode::from(exit_code(&results))
}

async fn capture_failure_artifact(env: &dyn Environment, config: &HarnessConfig) {
    let Some(dir) = &config.report.screenshot_dir else {
        return;
    };
    let path = dir.join("failure.png");
    match env.capture_artifact(&path).await {
        Ok(()) => info!("failure screenshot written to {}", path.display()),
        Err(err) => warn!("failure screenshot not captured: {err}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use async_trait::async_trait;
    use uiprobe_core::Story;
    use uiprobe_dom::FixtureLoader;

    fn dom_env() -> Arc<dyn Environment> {
        let loader = Arc::new(FixtureLoader::new());
        Arc::new(InProcessEnv::new("http://app.test/", loader).unwrap())
    }

    struct Smoke;

    #[async_trait]
    impl Story for Smoke {
        fn name(&self) -> &str {
            "smoke"
        }

        async fn run(&self, env: &Arc<dyn Environment>) -> Result<()> {
            test_step(env, "first check", async { Ok(()) }).await?;
            test_step(env, "second check", async {
                Err::<(), _>(Error::Page("boom".to_string()))
            })
            .await
        }
    }

    #[tokio::test]
    async fn steps_record_and_annotate() {
        let env = dom_env();

        test_step(&env, "passes", async { Ok(()) }).await.unwrap();

        let err = test_step(&env, "fails", async {
            Err::<(), _>(Error::Timeout("Wait timeout".to_string()))
        })
        .await
        .unwrap_err();
        assert_eq!(err.to_string(), "Timeout: fails: Wait timeout");

        let results = env.reporter().results();
        assert_eq!(results.total, 1);
        assert_eq!(results.ok, 1);
    }

    #[tokio::test]
    async fn failed_story_is_recorded_and_counted() {
        let env = dom_env();
        let mut registry = StoryRegistry::new();
        registry.register(Arc::new(Smoke));

        let results = run_stories(&env, &registry, None, 0).await.unwrap();
        // One passing step, plus the annotated step error recorded by
        // the runner.
        assert_eq!(results.total, 2);
        assert_eq!(results.ok, 1);
        assert_eq!(results.fail, 1);
        assert_eq!(results.summary(), "Total: 2 Passed: 1 Failed: 1");
        assert_eq!(exit_code(&results), 1);
    }

    #[tokio::test]
    async fn unknown_story_selection_errors() {
        let env = dom_env();
        let registry = StoryRegistry::new();

        let err = run_stories(&env, &registry, Some("missing"), 0)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }

    #[test]
    fn all_pass_exits_zero() {
        let results = Results {
            total: 3,
            ok: 3,
            fail: 0,
            expected: 0,
        };
        assert_eq!(exit_code(&results), 0);
    }
}
