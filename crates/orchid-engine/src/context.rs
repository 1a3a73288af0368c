//! Per-run execution context
//!
//! Owned exclusively by the engine for the duration of one run. Node
//! state transitions and log appends go through here so observer
//! callbacks fire consistently; callbacks are invoked with the locks
//! already released.

use chrono::{DateTime, Utc};
use orchid_core::{
    Error, Feedback, LogEntry, LogLevel, NodeExecutionState, NodeStatus, Result, RunCallbacks,
    TokenUsage,
};
use serde_json::{Map, Value};
use std::collections::HashMap;
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Execution context for one workflow run
pub struct ExecutionContext {
    pub workflow_id: String,
    pub execution_id: String,
    pub start_time: DateTime<Utc>,
    variables: RwLock<Map<String, Value>>,
    node_states: RwLock<HashMap<String, NodeExecutionState>>,
    logs: RwLock<Vec<LogEntry>>,
    cancel: CancellationToken,
    callbacks: RunCallbacks,
}

impl ExecutionContext {
    /// Create a context with every node pending
    pub fn new(
        workflow_id: &str,
        node_ids: &[String],
        mut variables: Map<String, Value>,
        input: Value,
        cancel: CancellationToken,
        callbacks: RunCallbacks,
    ) -> Self {
        // `input` is a reserved variable holding the initial payload.
        variables.insert("input".to_string(), input);

        let node_states = node_ids
            .iter()
            .map(|id| (id.clone(), NodeExecutionState::default()))
            .collect();

        Self {
            workflow_id: workflow_id.to_string(),
            execution_id: uuid::Uuid::new_v4().to_string(),
            start_time: Utc::now(),
            variables: RwLock::new(variables),
            node_states: RwLock::new(node_states),
            logs: RwLock::new(Vec::new()),
            cancel,
            callbacks,
        }
    }

    // ---- cancellation ----

    pub fn cancel_token(&self) -> &CancellationToken {
        &self.cancel
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Raise `Cancelled` if the run has been cancelled
    pub fn check_cancelled(&self) -> Result<()> {
        if self.cancel.is_cancelled() {
            Err(Error::Cancelled)
        } else {
            Ok(())
        }
    }

    // ---- variables ----

    pub async fn get_variable(&self, name: &str) -> Option<Value> {
        let variables = self.variables.read().await;
        variables.get(name).cloned()
    }

    pub async fn set_variable(&self, name: &str, value: Value) {
        let mut variables = self.variables.write().await;
        variables.insert(name.to_string(), value);
    }

    pub async fn variables_snapshot(&self) -> Map<String, Value> {
        let variables = self.variables.read().await;
        variables.clone()
    }

    // ---- node state ----

    /// Transition a node to running; refuses to start after cancellation
    pub async fn mark_running(&self, node_id: &str, input: &Value) -> Result<()> {
        self.check_cancelled()?;
        {
            let mut states = self.node_states.write().await;
            let state = states.entry(node_id.to_string()).or_default();
            state.status = NodeStatus::Running;
            state.input = Some(input.clone());
            state.started_at = Some(Utc::now());
        }
        debug!(node_id = %node_id, "node running");
        self.callbacks.notify_status(NodeStatus::Running, node_id);
        Ok(())
    }

    pub async fn mark_completed(&self, node_id: &str, output: &Value) {
        {
            let mut states = self.node_states.write().await;
            let state = states.entry(node_id.to_string()).or_default();
            state.status = NodeStatus::Completed;
            state.output = Some(output.clone());
            state.ended_at = Some(Utc::now());
        }
        self.callbacks.notify_status(NodeStatus::Completed, node_id);
    }

    pub async fn mark_failed(&self, node_id: &str, error: &str) {
        {
            let mut states = self.node_states.write().await;
            let state = states.entry(node_id.to_string()).or_default();
            state.status = NodeStatus::Failed;
            state.error = Some(error.to_string());
            state.ended_at = Some(Utc::now());
        }
        self.callbacks.notify_status(NodeStatus::Failed, node_id);
    }

    pub async fn mark_skipped(&self, node_id: &str) {
        {
            let mut states = self.node_states.write().await;
            let state = states.entry(node_id.to_string()).or_default();
            state.status = NodeStatus::Skipped;
            state.ended_at = Some(Utc::now());
        }
        self.callbacks.notify_status(NodeStatus::Skipped, node_id);
    }

    pub async fn set_feedback(&self, node_id: &str, feedback: Feedback) {
        let mut states = self.node_states.write().await;
        if let Some(state) = states.get_mut(node_id) {
            state.feedback = Some(feedback);
        }
    }

    pub async fn set_token_usage(&self, node_id: &str, usage: TokenUsage) {
        let mut states = self.node_states.write().await;
        if let Some(state) = states.get_mut(node_id) {
            state.token_usage = Some(usage);
        }
    }

    pub async fn node_state(&self, node_id: &str) -> Option<NodeExecutionState> {
        let states = self.node_states.read().await;
        states.get(node_id).cloned()
    }

    pub async fn node_status(&self, node_id: &str) -> Option<NodeStatus> {
        let states = self.node_states.read().await;
        states.get(node_id).map(|s| s.status)
    }

    pub async fn states_snapshot(&self) -> HashMap<String, NodeExecutionState> {
        let states = self.node_states.read().await;
        states.clone()
    }

    /// Committed outputs of completed nodes, keyed by node id
    pub async fn completed_outputs(&self) -> Map<String, Value> {
        let states = self.node_states.read().await;
        states
            .iter()
            .filter(|(_, s)| s.status == NodeStatus::Completed)
            .filter_map(|(id, s)| s.output.clone().map(|o| (id.clone(), o)))
            .collect()
    }

    /// Sum token usage across all nodes
    pub async fn total_tokens(&self) -> u64 {
        let states = self.node_states.read().await;
        states
            .values()
            .filter_map(|s| s.token_usage)
            .map(|u| u.total_tokens)
            .sum()
    }

    // ---- logging ----

    pub async fn log(&self, level: LogLevel, node_id: Option<&str>, message: &str) {
        let entry = LogEntry::new(level, node_id, message);
        {
            let mut logs = self.logs.write().await;
            logs.push(entry.clone());
        }
        self.callbacks.notify_log(&entry);
    }

    pub async fn log_debug(&self, node_id: Option<&str>, message: &str) {
        self.log(LogLevel::Debug, node_id, message).await;
    }

    pub async fn log_info(&self, node_id: Option<&str>, message: &str) {
        self.log(LogLevel::Info, node_id, message).await;
    }

    pub async fn log_warn(&self, node_id: Option<&str>, message: &str) {
        self.log(LogLevel::Warn, node_id, message).await;
    }

    pub async fn log_error(&self, node_id: Option<&str>, message: &str) {
        self.log(LogLevel::Error, node_id, message).await;
    }

    pub async fn logs_snapshot(&self) -> Vec<LogEntry> {
        let logs = self.logs.read().await;
        logs.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn context() -> ExecutionContext {
        ExecutionContext::new(
            "wf",
            &["a".to_string(), "b".to_string()],
            Map::new(),
            json!("payload"),
            CancellationToken::new(),
            RunCallbacks::default(),
        )
    }

    #[tokio::test]
    async fn input_is_reserved_variable() {
        let ctx = context();
        assert_eq!(ctx.get_variable("input").await, Some(json!("payload")));
    }

    #[tokio::test]
    async fn lifecycle_stamps_times_and_fires_callbacks() {
        let transitions = Arc::new(AtomicUsize::new(0));
        let counter = transitions.clone();
        let callbacks = RunCallbacks::new().with_status_change(move |_, _| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        let ctx = ExecutionContext::new(
            "wf",
            &["a".to_string()],
            Map::new(),
            Value::Null,
            CancellationToken::new(),
            callbacks,
        );

        ctx.mark_running("a", &json!(1)).await.unwrap();
        ctx.mark_completed("a", &json!(2)).await;

        let state = ctx.node_state("a").await.unwrap();
        assert_eq!(state.status, NodeStatus::Completed);
        assert_eq!(state.input, Some(json!(1)));
        assert_eq!(state.output, Some(json!(2)));
        assert!(state.started_at.unwrap() <= state.ended_at.unwrap());
        assert_eq!(transitions.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn cancelled_context_refuses_to_start_nodes() {
        let ctx = context();
        ctx.cancel_token().cancel();
        let err = ctx.mark_running("a", &Value::Null).await.unwrap_err();
        assert!(err.is_cancelled());
        assert_eq!(ctx.node_status("a").await, Some(NodeStatus::Pending));
    }

    #[tokio::test]
    async fn completed_outputs_only_cover_completed_nodes() {
        let ctx = context();
        ctx.mark_running("a", &Value::Null).await.unwrap();
        ctx.mark_completed("a", &json!("done")).await;
        ctx.mark_running("b", &Value::Null).await.unwrap();
        ctx.mark_failed("b", "boom").await;

        let outputs = ctx.completed_outputs().await;
        assert_eq!(outputs.len(), 1);
        assert_eq!(outputs["a"], json!("done"));
    }

    #[tokio::test]
    async fn token_totals_sum_across_nodes() {
        let ctx = context();
        ctx.set_token_usage("a", TokenUsage::new(10, 2)).await;
        ctx.set_token_usage("b", TokenUsage::new(5, 5)).await;
        assert_eq!(ctx.total_tokens().await, 22);
    }

    #[tokio::test]
    async fn logs_append_in_order() {
        let ctx = context();
        ctx.log_info(None, "one").await;
        ctx.log_warn(Some("a"), "two").await;
        let logs = ctx.logs_snapshot().await;
        assert_eq!(logs.len(), 2);
        assert_eq!(logs[0].message, "one");
        assert!(logs[0].ts <= logs[1].ts);
        assert_eq!(logs[1].node_id.as_deref(), Some("a"));
    }
}
