//! Remote-control backend of the uiprobe harness.
//!
//! Talks to a real browser over the DevTools protocol: a WebSocket
//! client multiplexes commands, a page session wraps the Runtime and
//! Page domains, and [`RemoteEnv`] implements the
//! [`uiprobe_core::Environment`] contract on top of them.

pub mod client;
pub mod env;
pub mod js;
pub mod page;
pub mod protocol;

pub use client::CdpClient;
pub use env::RemoteEnv;
pub use page::Page;
pub use protocol::{BrowserVersion, CallArgument, PageInfo, RemoteObject};
