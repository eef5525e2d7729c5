//! Component/view state model of the uiprobe harness.
//!
//! Components parse regions of the live UI into content trees through
//! a [`uiprobe_core::Environment`], resolve visibility in batched
//! round trips, and assert against expected-state literals via the
//! structural comparator in `uiprobe-core`.

pub mod component;
pub mod visibility;

pub use component::{ComponentCore, TestComponent};
pub use visibility::{check_visibility, resolve_content_visibility, VisibilityExpectation};
