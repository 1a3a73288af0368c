//! Observer callbacks for workflow runs
//!
//! Hosts pass these in as a record of function values; the engine calls
//! them on state transitions and log appends. Observers are assumed
//! idempotent and must not block.

use std::fmt;
use std::sync::Arc;

use crate::execution::{LogEntry, NodeStatus};

/// Called with `(status, node_id)` on every node status transition
pub type StatusChangeFn = dyn Fn(NodeStatus, &str) + Send + Sync;

/// Called for every appended run log entry
pub type LogAddFn = dyn Fn(&LogEntry) + Send + Sync;

/// UI-facing observer hooks for a single run
#[derive(Clone, Default)]
pub struct RunCallbacks {
    pub on_status_change: Option<Arc<StatusChangeFn>>,
    pub on_log_add: Option<Arc<LogAddFn>>,
}

impl RunCallbacks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_status_change<F>(mut self, f: F) -> Self
    where
        F: Fn(NodeStatus, &str) + Send + Sync + 'static,
    {
        self.on_status_change = Some(Arc::new(f));
        self
    }

    pub fn with_log_add<F>(mut self, f: F) -> Self
    where
        F: Fn(&LogEntry) + Send + Sync + 'static,
    {
        self.on_log_add = Some(Arc::new(f));
        self
    }

    /// Fire the status-change observer, if any
    pub fn notify_status(&self, status: NodeStatus, node_id: &str) {
        if let Some(cb) = &self.on_status_change {
            cb(status, node_id);
        }
    }

    /// Fire the log observer, if any
    pub fn notify_log(&self, entry: &LogEntry) {
        if let Some(cb) = &self.on_log_add {
            cb(entry);
        }
    }
}

impl fmt::Debug for RunCallbacks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RunCallbacks")
            .field("on_status_change", &self.on_status_change.is_some())
            .field("on_log_add", &self.on_log_add.is_some())
            .finish()
    }
}
