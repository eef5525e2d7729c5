//! In-process backend of the uiprobe harness.
//!
//! Pages are fetched by a [`PageLoader`], parsed into an arena document
//! and driven entirely inside the test process. The backend implements
//! the [`uiprobe_core::Environment`] contract, so suites written against
//! the trait run here unchanged.

pub mod dom;
pub mod env;
pub mod events;
pub mod loader;

pub use dom::{Dom, ElementData, NodeId};
pub use env::InProcessEnv;
pub use events::{EventBus, EventRecord, Listener};
pub use loader::{FixtureLoader, HttpLoader, PageLoader};
