//! Execution state for workflow runs
//!
//! Tracks the lifecycle of every node in a run plus the run itself:
//! status transitions, captured input/output, token accounting, and the
//! structured feedback record shown to the workflow author.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Status of a single node within a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum NodeStatus {
    /// Waiting to be scheduled
    #[default]
    Pending,
    /// Currently executing
    Running,
    /// Completed successfully
    Completed,
    /// Failed with an error
    Failed,
    /// Skipped (branch not taken)
    Skipped,
}

impl NodeStatus {
    /// Whether this status is terminal
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            NodeStatus::Completed | NodeStatus::Failed | NodeStatus::Skipped
        )
    }
}

/// Overall status of a workflow run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    /// Not started
    #[default]
    Idle,
    /// Currently executing
    Running,
    /// Completed successfully
    Completed,
    /// Failed
    Failed,
    /// Cancelled by the host
    Cancelled,
}

/// Token accounting for an AI call
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct TokenUsage {
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
    pub total_tokens: u64,
}

impl TokenUsage {
    pub fn new(prompt_tokens: u64, completion_tokens: u64) -> Self {
        Self {
            prompt_tokens,
            completion_tokens,
            total_tokens: prompt_tokens + completion_tokens,
        }
    }

    /// Accumulate another usage record into this one
    pub fn add(&mut self, other: &TokenUsage) {
        self.prompt_tokens += other.prompt_tokens;
        self.completion_tokens += other.completion_tokens;
        self.total_tokens += other.total_tokens;
    }
}

/// Rendering hint for a feedback detail value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum FeedbackDetailKind {
    #[default]
    Text,
    Code,
    Json,
    Link,
}

/// A single labelled detail on a feedback record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedbackDetail {
    pub label: String,
    pub value: String,
    #[serde(default)]
    pub kind: FeedbackDetailKind,
}

impl FeedbackDetail {
    pub fn text(label: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            value: value.into(),
            kind: FeedbackDetailKind::Text,
        }
    }

    pub fn code(label: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            value: value.into(),
            kind: FeedbackDetailKind::Code,
        }
    }

    pub fn json(label: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            value: value.into(),
            kind: FeedbackDetailKind::Json,
        }
    }
}

/// A source reference attached to feedback (search result, document, ...)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedbackSource {
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub snippet: Option<String>,
}

/// Structured, user-facing summary attached to a node state
///
/// Independent of the raw output: the output feeds downstream nodes, the
/// feedback feeds the human reading the run.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Feedback {
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub input_summary: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_summary: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub details: Vec<FeedbackDetail>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub sources: Vec<FeedbackSource>,
}

impl Feedback {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Default::default()
        }
    }

    pub fn with_input_summary(mut self, summary: impl Into<String>) -> Self {
        self.input_summary = Some(summary.into());
        self
    }

    pub fn with_output_summary(mut self, summary: impl Into<String>) -> Self {
        self.output_summary = Some(summary.into());
        self
    }

    pub fn with_detail(mut self, detail: FeedbackDetail) -> Self {
        self.details.push(detail);
        self
    }

    pub fn with_sources(mut self, sources: Vec<FeedbackSource>) -> Self {
        self.sources = sources;
        self
    }
}

/// Execution state of a single node within a run
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct NodeExecutionState {
    pub status: NodeStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub input: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ended_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token_usage: Option<TokenUsage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub feedback: Option<Feedback>,
}

/// Log level for run-scoped log entries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogLevel {
    Debug,
    Info,
    Warn,
    Error,
}

/// A single entry in a run's append-only log
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogEntry {
    pub ts: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub node_id: Option<String>,
    pub level: LogLevel,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl LogEntry {
    pub fn new(level: LogLevel, node_id: Option<&str>, message: impl Into<String>) -> Self {
        Self {
            ts: Utc::now(),
            node_id: node_id.map(String::from),
            level,
            message: message.into(),
            data: None,
        }
    }

    pub fn with_data(mut self, data: Value) -> Self {
        self.data = Some(data);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_usage_totals() {
        let mut usage = TokenUsage::new(10, 5);
        assert_eq!(usage.total_tokens, 15);

        usage.add(&TokenUsage::new(1, 2));
        assert_eq!(usage.prompt_tokens, 11);
        assert_eq!(usage.completion_tokens, 7);
        assert_eq!(usage.total_tokens, 18);
    }

    #[test]
    fn node_status_terminality() {
        assert!(!NodeStatus::Pending.is_terminal());
        assert!(!NodeStatus::Running.is_terminal());
        assert!(NodeStatus::Completed.is_terminal());
        assert!(NodeStatus::Failed.is_terminal());
        assert!(NodeStatus::Skipped.is_terminal());
    }

    #[test]
    fn feedback_serializes_compactly() {
        let fb = Feedback::new("AI Model Call")
            .with_detail(FeedbackDetail::text("Model", "gpt-4o-mini"));
        let json = serde_json::to_value(&fb).unwrap();
        assert_eq!(json["title"], "AI Model Call");
        assert!(json.get("sources").is_none());
    }
}
