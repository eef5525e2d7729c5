//! Event dispatch for the embedded document.
//!
//! Events bubble from the target through its element ancestors.
//! Listeners observe dispatches; default actions (toggling a checkbox,
//! updating a selection) are applied by the environment before the
//! event is dispatched, mirroring how a browser sequences them.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::trace;

use crate::dom::{Dom, NodeId};

/// One dispatched event as seen by a listener: the listening node and
/// the original target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventRecord {
    pub target: NodeId,
    pub current: NodeId,
    pub event: String,
}

pub type Listener = Arc<dyn Fn(&EventRecord) + Send + Sync>;

/// Per-document listener registry and dispatch log.
#[derive(Default)]
pub struct EventBus {
    listeners: HashMap<(NodeId, String), Vec<Listener>>,
    log: Vec<EventRecord>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn listen(&mut self, node: NodeId, event: &str, listener: Listener) {
        self.listeners
            .entry((node, event.to_string()))
            .or_default()
            .push(listener);
    }

    /// Dispatch an event at `target`, bubbling through its ancestors
    /// when `bubbles` is set.
    pub fn dispatch(&mut self, dom: &Dom, target: NodeId, event: &str, bubbles: bool) {
        trace!(?target, event, "dispatch");
        let mut path = vec![target];
        if bubbles {
            path.extend(dom.ancestors(target));
        }

        for current in path {
            let record = EventRecord {
                target,
                current,
                event: event.to_string(),
            };
            if let Some(listeners) = self.listeners.get(&(current, event.to_string())) {
                for listener in listeners {
                    listener(&record);
                }
            }
            self.log.push(record);
        }
    }

    /// Number of times `event` was dispatched with `node` as the target.
    pub fn count(&self, node: NodeId, event: &str) -> usize {
        self.log
            .iter()
            .filter(|r| r.target == node && r.current == node && r.event == event)
            .count()
    }

    pub fn log(&self) -> &[EventRecord] {
        &self.log
    }
}
