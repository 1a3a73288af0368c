//! Core types shared across the orchid workflow engine
//!
//! - Error type and result alias used by every crate
//! - Node/run execution state and lifecycle types
//! - Structured per-node feedback
//! - Observer callback records

pub mod callbacks;
pub mod error;
pub mod execution;

pub use callbacks::RunCallbacks;
pub use error::{Error, Result};
pub use execution::{
    Feedback, FeedbackDetail, FeedbackDetailKind, FeedbackSource, LogEntry, LogLevel,
    NodeExecutionState, NodeStatus, RunStatus, TokenUsage,
};
