//! Core of the uiprobe end-to-end test harness.
//!
//! Defines the backend-agnostic [`Environment`] capability trait, the
//! structural state comparator ([`compare::deep_meet`]), the shared wait
//! and navigation engines, the HTTP client with its session cookie jar,
//! and the story runner with its reporting sink. Backends live in their
//! own crates and implement [`Environment`].

pub mod compare;
pub mod content;
pub mod env;
pub mod error;
pub mod http;
pub mod navigation;
pub mod prop_path;
pub mod report;
pub mod story;
pub mod value;
pub mod wait;

pub use compare::{assert_meet, check_values, deep_meet, Mismatch};
pub use content::{Content, ContentMap, ContentNode, Expected, ExpectedMap, TestableNode};
pub use env::{Elem, Environment, NavAction, SelectorWaitOptions, VisibilityTarget};
pub use error::{Error, Result};
pub use http::{HttpClient, HttpResponse, RequestBody};
pub use navigation::{
    load_channel, navigate, LoadNotifier, LoadSignal, NavigationHooks, NavigationTarget,
};
pub use report::{BlockCategory, Reporter, Results};
pub use story::{Runner, Story, StoryRegistry};
pub use value::Scalar;
pub use wait::{wait_for, wait_for_true, WaitOptions};
