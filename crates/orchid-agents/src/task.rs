//! Orchestration task and agent types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::str::FromStr;

/// Execution mode for a multi-agent task
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum OrchestrationMode {
    /// Chain: each agent receives the previous agent's output
    #[default]
    Sequential,
    /// Fan-out: all agents receive the task input concurrently
    Parallel,
    /// Planner + workers: agent 0 assigns subtasks to the rest
    Supervisor,
}

impl FromStr for OrchestrationMode {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "sequential" => Ok(OrchestrationMode::Sequential),
            "parallel" => Ok(OrchestrationMode::Parallel),
            "supervisor" => Ok(OrchestrationMode::Supervisor),
            other => Err(format!("Unknown orchestration mode: {}", other)),
        }
    }
}

/// A named AI persona that can be composed into a task
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AgentProfile {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub role: String,
    #[serde(default)]
    pub system_prompt: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tools: Vec<String>,
}

/// Per-agent execution status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum AgentStatus {
    #[default]
    Pending,
    Running,
    Completed,
    Failed,
}

/// Outcome of one agent's step within a task
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentResult {
    pub agent_id: String,
    pub agent_name: String,
    pub status: AgentStatus,
    pub input: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub tokens_used: u64,
    pub duration_ms: u64,
}

/// Overall status of an orchestration task
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    #[default]
    Pending,
    Running,
    Completed,
    Failed,
}

/// A multi-agent orchestration run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrchestrationTask {
    pub id: String,
    pub name: String,
    pub mode: OrchestrationMode,
    pub agents: Vec<AgentProfile>,
    pub input: Value,
    pub status: TaskStatus,
    pub results: Vec<AgentResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub final_output: Option<Value>,
    pub started_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ended_at: Option<DateTime<Utc>>,
}

impl OrchestrationTask {
    pub fn new(name: &str, mode: OrchestrationMode, agents: Vec<AgentProfile>, input: Value) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            name: name.to_string(),
            mode,
            agents,
            input,
            status: TaskStatus::Pending,
            results: Vec::new(),
            final_output: None,
            started_at: Utc::now(),
            ended_at: None,
        }
    }

    /// Sum of tokens across all agent results
    pub fn total_tokens(&self) -> u64 {
        self.results.iter().map(|r| r.tokens_used).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mode_parses_known_values() {
        assert_eq!(
            "supervisor".parse::<OrchestrationMode>().unwrap(),
            OrchestrationMode::Supervisor
        );
        assert!("vote".parse::<OrchestrationMode>().is_err());
    }

    #[test]
    fn task_totals_tokens() {
        let mut task = OrchestrationTask::new(
            "t",
            OrchestrationMode::Parallel,
            vec![],
            Value::Null,
        );
        for tokens in [10, 20] {
            task.results.push(AgentResult {
                agent_id: "a".into(),
                agent_name: "a".into(),
                status: AgentStatus::Completed,
                input: Value::Null,
                output: None,
                error: None,
                tokens_used: tokens,
                duration_ms: 1,
            });
        }
        assert_eq!(task.total_tokens(), 30);
    }
}
