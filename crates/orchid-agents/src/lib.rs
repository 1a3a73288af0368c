//! Multi-agent orchestration
//!
//! Runs a set of named AI personas against one task in one of three
//! modes: sequential (chain), parallel (fan-out), or supervisor
//! (planner + workers). Agent execution itself is behind the
//! `AgentRunner` trait; the engine plugs its AI call path in, tests plug
//! in fakes.

pub mod orchestrator;
pub mod task;

pub use orchestrator::{
    AgentOutput, AgentRunner, OrchestrationCallbacks, Orchestrator,
};
pub use task::{
    AgentProfile, AgentResult, AgentStatus, OrchestrationMode, OrchestrationTask, TaskStatus,
};
