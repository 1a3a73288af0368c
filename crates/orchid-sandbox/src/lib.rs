//! Sandboxed code execution for workflow code nodes
//!
//! User-authored JavaScript snippets run inside an embedded interpreter
//! with a textual denylist screen, interpreter loop/recursion limits, and
//! a wall-clock timeout. The sandbox is explicitly best-effort: the
//! contract is stable so a process-level isolate can replace the
//! interpreter without touching callers.

pub mod denylist;
pub mod runner;

pub use runner::{
    CapturedLog, CodeFailure, CodeMetrics, CodeOutcome, CodeRequest, CodeRunner, RunnerConfig,
};
