//! Workflow engine
//!
//! Drives a run: discovers start nodes, advances chains along edges,
//! honours branch labels, fans out to concurrent successors and joins
//! them, detects cycles, and aggregates the result. Node state
//! bookkeeping lives in the run context; this module owns control flow.
//!
//! Fan-in: a chain spawned as one of several concurrent successors stops
//! before a node with more than one incoming edge. When every sibling
//! stops at the same join node, the parent continues from that node once
//! with the ordered vector of sibling outputs as its input. Each node
//! therefore runs at most once per run.

use futures::future::join_all;
use orchid_core::{Error, LogEntry, NodeExecutionState, Result, RunCallbacks, RunStatus};
use serde_json::{Map, Value};
use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::context::ExecutionContext;
use crate::executors;
use crate::graph::{Node, NodeKind, WorkflowGraph};
use crate::resolve::{resolve_value, ResolveScope};
use crate::services::Services;

/// Hard cap on sub-workflow nesting
pub const MAX_SUBWORKFLOW_DEPTH: usize = 8;

/// Final result of a run
#[derive(Debug, Clone)]
pub struct RunResult {
    pub execution_id: String,
    pub status: RunStatus,
    pub output: Option<Value>,
    pub error: Option<String>,
    pub node_states: HashMap<String, NodeExecutionState>,
    pub logs: Vec<LogEntry>,
    pub total_tokens: u64,
    pub duration_ms: u64,
}

/// Where a chain ended up
struct ChainOutcome {
    output: Value,
    /// Set when a fan-out child stopped before a join node
    stopped_at: Option<String>,
}

/// Workflow engine for a single run
pub struct Engine {
    graph: WorkflowGraph,
    context: Arc<ExecutionContext>,
    services: Arc<Services>,
    initial_input: Value,
    depth: usize,
}

impl Engine {
    /// Create an engine for a top-level run
    pub fn new(
        workflow_id: &str,
        graph: WorkflowGraph,
        input: Value,
        variables: Map<String, Value>,
        callbacks: RunCallbacks,
        services: Arc<Services>,
    ) -> Self {
        let context = Arc::new(ExecutionContext::new(
            workflow_id,
            &graph.node_ids(),
            variables,
            input.clone(),
            CancellationToken::new(),
            callbacks,
        ));
        Self {
            graph,
            context,
            services,
            initial_input: input,
            depth: 0,
        }
    }

    /// Create a nested engine for a sub-workflow run
    ///
    /// The child shares nothing with the parent but a derived
    /// cancellation token, so cancelling the parent cancels the child.
    pub(crate) fn nested(
        workflow_id: &str,
        graph: WorkflowGraph,
        input: Value,
        variables: Map<String, Value>,
        services: Arc<Services>,
        parent_cancel: &CancellationToken,
        depth: usize,
    ) -> Self {
        let context = Arc::new(ExecutionContext::new(
            workflow_id,
            &graph.node_ids(),
            variables,
            input.clone(),
            parent_cancel.child_token(),
            RunCallbacks::default(),
        ));
        Self {
            graph,
            context,
            services,
            initial_input: input,
            depth,
        }
    }

    /// The run context (observable state)
    pub fn context(&self) -> &Arc<ExecutionContext> {
        &self.context
    }

    /// Cooperative abort: in-flight executors observe the token at their
    /// next suspension point; not-yet-started nodes never start
    pub fn cancel(&self) {
        self.context.cancel_token().cancel();
    }

    /// Execute the workflow to completion
    pub async fn run(&self) -> RunResult {
        let started = Instant::now();
        info!(workflow_id = %self.context.workflow_id, execution_id = %self.context.execution_id, "workflow run started");
        self.context.log_info(None, "workflow run started").await;

        let outcome = self.run_inner().await;

        let (status, output, error) = match outcome {
            Ok(output) => {
                self.context.log_info(None, "workflow run completed").await;
                (RunStatus::Completed, Some(output), None)
            }
            Err(error) if error.is_cancelled() => {
                warn!(workflow_id = %self.context.workflow_id, "workflow run cancelled");
                self.context.log_warn(None, "workflow run cancelled").await;
                (RunStatus::Cancelled, None, Some(error.to_string()))
            }
            Err(error) => {
                self.context
                    .log_error(None, &format!("workflow run failed: {}", error))
                    .await;
                (RunStatus::Failed, None, Some(error.to_string()))
            }
        };

        RunResult {
            execution_id: self.context.execution_id.clone(),
            status,
            output,
            error,
            node_states: self.context.states_snapshot().await,
            logs: self.context.logs_snapshot().await,
            total_tokens: self.context.total_tokens().await,
            duration_ms: started.elapsed().as_millis() as u64,
        }
    }

    async fn run_inner(&self) -> Result<Value> {
        let starts = self.graph.start_nodes();
        if starts.is_empty() {
            return Err(Error::execution("workflow has no start nodes"));
        }

        if starts.len() == 1 {
            let outcome = self
                .execute_chain(starts[0], self.initial_input.clone(), HashSet::new(), false, false)
                .await?;
            return Ok(outcome.output);
        }

        // Multiple start nodes run concurrently like a fan-out; their
        // outputs aggregate to a vector unless they converge on a join.
        let chains = starts.iter().map(|&start| {
            self.execute_chain(start, self.initial_input.clone(), HashSet::new(), true, false)
        });
        let outcomes = collect(join_all(chains).await)?;
        self.continue_after_fanout(outcomes, HashSet::new(), false)
            .await
            .map(|outcome| outcome.output)
    }

    /// Execute a chain from one node
    ///
    /// `fanout_child` marks chains spawned as one of several concurrent
    /// successors; such chains stop before join nodes. `skip_join_stop`
    /// suppresses that check for the continuation call that executes the
    /// join itself.
    fn execute_chain<'a>(
        &'a self,
        node: &'a Node,
        input: Value,
        mut visited: HashSet<String>,
        fanout_child: bool,
        skip_join_stop: bool,
    ) -> Pin<Box<dyn Future<Output = Result<ChainOutcome>> + Send + 'a>> {
        Box::pin(async move {
            if fanout_child && !skip_join_stop && self.graph.incoming_count(&node.id) > 1 {
                return Ok(ChainOutcome {
                    output: input,
                    stopped_at: Some(node.id.clone()),
                });
            }

            if !visited.insert(node.id.clone()) {
                return Err(Error::CycleDetected(node.id.clone()));
            }

            let output = self.execute_node(node, input).await?;

            if node.kind == NodeKind::End {
                return Ok(ChainOutcome {
                    output,
                    stopped_at: None,
                });
            }

            // A `{value, branch}` discriminant selects labelled edges.
            let (next_input, successors) = match branch_of(&output) {
                Some((branch, value)) => {
                    (value, self.graph.successors(&node.id, Some(&branch)))
                }
                None => (output, self.graph.successors(&node.id, None)),
            };

            match successors.len() {
                0 => Ok(ChainOutcome {
                    output: next_input,
                    stopped_at: None,
                }),
                1 => {
                    self.execute_chain(successors[0], next_input, visited, fanout_child, false)
                        .await
                }
                _ => {
                    let children = successors.iter().map(|&successor| {
                        self.execute_chain(
                            successor,
                            next_input.clone(),
                            visited.clone(),
                            true,
                            false,
                        )
                    });
                    let outcomes = collect(join_all(children).await)?;
                    self.continue_after_fanout(outcomes, visited, fanout_child)
                        .await
                }
            }
        })
    }

    /// Join or aggregate the outcomes of concurrent sibling chains
    async fn continue_after_fanout(
        &self,
        outcomes: Vec<ChainOutcome>,
        visited: HashSet<String>,
        fanout_child: bool,
    ) -> Result<ChainOutcome> {
        let join_target = common_join(&outcomes);
        let outputs: Vec<Value> = outcomes.into_iter().map(|o| o.output).collect();

        match join_target {
            Some(join_id) => {
                let join_node = self
                    .graph
                    .node(&join_id)
                    .ok_or_else(|| Error::execution(format!("join node '{}' vanished", join_id)))?;
                self.execute_chain(join_node, Value::Array(outputs), visited, fanout_child, true)
                    .await
            }
            None => Ok(ChainOutcome {
                output: Value::Array(outputs),
                stopped_at: None,
            }),
        }
    }

    /// Resolve, dispatch, and record one node execution
    async fn execute_node(&self, node: &Node, input: Value) -> Result<Value> {
        let scope = ResolveScope {
            input: input.clone(),
            variables: self.context.variables_snapshot().await,
            node_outputs: self.context.completed_outputs().await,
            env: std::env::vars().map(|(k, v)| (k, Value::String(v))).collect(),
        };
        let mut data = resolve_value(&node.data, &scope);

        // The mcp `params` field is a JSON-envelope template; its
        // executor substitutes `{{input}}` with JSON escaping before
        // parsing. The generic pass splices raw text and would corrupt
        // the envelope, so the raw template must reach it untouched.
        if node.kind == NodeKind::Mcp {
            if let (Some(resolved), Some(raw)) = (data.as_object_mut(), node.data.get("params")) {
                resolved.insert("params".to_string(), raw.clone());
            }
        }

        self.context.mark_running(&node.id, &input).await?;
        self.context
            .log_debug(Some(&node.id), &format!("executing {:?} node", node.kind))
            .await;

        match executors::execute(node, &data, input, &self.context, &self.services, self.depth)
            .await
        {
            Ok(output) => {
                self.context.mark_completed(&node.id, &output).await;
                Ok(output)
            }
            Err(error) => {
                self.context.mark_failed(&node.id, &error.to_string()).await;
                self.context
                    .log_error(Some(&node.id), &format!("node failed: {}", error))
                    .await;
                Err(error)
            }
        }
    }
}

/// Extract a `{value, branch}` discriminant from a node output
fn branch_of(output: &Value) -> Option<(String, Value)> {
    let object = output.as_object()?;
    let branch = object.get("branch")?.as_str()?.to_string();
    let value = object.get("value")?.clone();
    Some((branch, value))
}

/// The join node shared by all sibling chains, if any
fn common_join(outcomes: &[ChainOutcome]) -> Option<String> {
    let first = outcomes.first()?.stopped_at.as_ref()?;
    outcomes
        .iter()
        .all(|o| o.stopped_at.as_ref() == Some(first))
        .then(|| first.clone())
}

/// Propagate the first chain error, preferring cancellation
fn collect(results: Vec<Result<ChainOutcome>>) -> Result<Vec<ChainOutcome>> {
    let mut outcomes = Vec::with_capacity(results.len());
    let mut first_error: Option<Error> = None;
    for result in results {
        match result {
            Ok(outcome) => outcomes.push(outcome),
            Err(error) => {
                if error.is_cancelled() {
                    return Err(error);
                }
                if first_error.is_none() {
                    first_error = Some(error);
                }
            }
        }
    }
    match first_error {
        Some(error) => Err(error),
        None => Ok(outcomes),
    }
}
