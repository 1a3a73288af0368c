//! orchid workflow engine
//!
//! Interprets a user-authored directed graph of typed computation nodes
//! (AI calls, tool invocations, branching, looping, transforms) and
//! drives it to completion with live per-node state, structured
//! feedback, cancellation, and multi-agent orchestration.
//!
//! The embedding surface is [`run`] for one-shot execution, or
//! [`Engine`] directly when the host needs a handle for cancellation:
//!
//! ```no_run
//! use orchid_core::RunCallbacks;
//! use orchid_engine::graph::{Edge, Node, NodeKind};
//! use serde_json::json;
//!
//! # async fn demo() -> orchid_core::Result<()> {
//! let nodes = vec![
//!     Node::new("start", NodeKind::Start, json!({})),
//!     Node::new("shout", NodeKind::Code, json!({ "code": "return input.toUpperCase();" })),
//!     Node::new("end", NodeKind::End, json!({})),
//! ];
//! let edges = vec![Edge::new("start", "shout"), Edge::new("shout", "end")];
//!
//! let result = orchid_engine::run(
//!     "wf-demo",
//!     nodes,
//!     edges,
//!     Some(json!("hi")),
//!     None,
//!     RunCallbacks::default(),
//! )
//! .await?;
//! assert_eq!(result.output, Some(json!("HI")));
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod context;
pub mod engine;
pub mod executors;
pub mod graph;
pub mod resolve;
pub mod services;

pub use config::EngineConfig;
pub use context::ExecutionContext;
pub use engine::{Engine, RunResult};
pub use graph::{Edge, Node, NodeKind, WorkflowGraph};
pub use resolve::{resolve_value, ResolveScope};
pub use services::Services;

use orchid_core::{Result, RunCallbacks};
use serde_json::{Map, Value};

/// Run a workflow to completion
///
/// Builds the default service bundle from the environment, validates
/// the graph, and executes it. Hosts that need cooperative cancellation
/// construct an [`Engine`] instead and keep a handle for
/// [`Engine::cancel`].
pub async fn run(
    workflow_id: &str,
    nodes: Vec<Node>,
    edges: Vec<Edge>,
    input: Option<Value>,
    variables: Option<Map<String, Value>>,
    callbacks: RunCallbacks,
) -> Result<RunResult> {
    let services = Services::initialize(EngineConfig::from_env()).await;
    let graph = WorkflowGraph::new(nodes, edges)?;
    let engine = Engine::new(
        workflow_id,
        graph,
        input.unwrap_or(Value::Null),
        variables.unwrap_or_default(),
        callbacks,
        services,
    );
    Ok(engine.run().await)
}
