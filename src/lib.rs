//! uiprobe — browser/DOM end-to-end test harness.
//!
//! One capability contract ([`Environment`]) over two execution
//! backends: an in-process document ([`uiprobe_dom::InProcessEnv`]) and
//! a remote-controlled browser ([`uiprobe_cdp::RemoteEnv`]). On top of
//! it, a component model ([`uiprobe_view::TestComponent`]) parses UI
//! regions into content trees and checks them against expected-state
//! literals through the structural comparator.
//!
//! A test binary registers stories and delegates to [`run_cli`]:
//!
//! ```no_run
//! use std::process::ExitCode;
//! use std::sync::Arc;
//!
//! use async_trait::async_trait;
//! use uiprobe::{run_cli, Environment, Result, Story, StoryRegistry};
//!
//! struct Login;
//!
//! #[async_trait]
//! impl Story for Login {
//!     fn name(&self) -> &str {
//!         "login"
//!     }
//!
//!     async fn run(&self, env: &Arc<dyn Environment>) -> Result<()> {
//!         env.goto("/login").await
//!     }
//! }
//!
//! #[tokio::main]
//! async fn main() -> ExitCode {
//!     let mut registry = StoryRegistry::new();
//!     registry.register(Arc::new(Login));
//!     run_cli(&registry).await
//! }
//! ```

pub mod cli;
pub mod config;
pub mod runner;

pub use cli::Cli;
pub use config::{Backend, ConfigError, HarnessConfig};
pub use runner::{build_env, exit_code, init_tracing, run_cli, run_stories, test_step};

pub use uiprobe_cdp;
pub use uiprobe_core;
pub use uiprobe_dom;
pub use uiprobe_view;

pub use uiprobe_core::{
    assert_meet, deep_meet, Content, ContentMap, ContentNode, Elem, Environment, Error, Expected,
    ExpectedMap, Mismatch, Result, Results, Scalar, SelectorWaitOptions, Story, StoryRegistry,
    TestableNode, VisibilityTarget,
};
pub use uiprobe_view::{ComponentCore, TestComponent, VisibilityExpectation};
