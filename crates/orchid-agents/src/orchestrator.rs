//! Agent orchestrator
//!
//! Drives N agents through one task. Failure propagation differs by
//! mode: sequential aborts the chain, parallel records per-agent
//! failures without touching siblings, supervisor aborts the workers if
//! the planner fails.

use async_trait::async_trait;
use chrono::Utc;
use futures::future::join_all;
use orchid_core::{Error, Result};
use regex::RegexBuilder;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

use crate::task::{
    AgentProfile, AgentResult, AgentStatus, OrchestrationMode, OrchestrationTask, TaskStatus,
};

/// What one agent produced
#[derive(Debug, Clone)]
pub struct AgentOutput {
    pub content: Value,
    pub tokens_used: u64,
}

/// Executes a single agent step; implemented by the engine's AI path
#[async_trait]
pub trait AgentRunner: Send + Sync {
    async fn run_agent(&self, agent: &AgentProfile, input: &Value) -> Result<AgentOutput>;
}

/// Observer hooks for a task
#[derive(Clone, Default)]
pub struct OrchestrationCallbacks {
    pub on_agent_start: Option<Arc<dyn Fn(&AgentProfile) + Send + Sync>>,
    pub on_agent_complete: Option<Arc<dyn Fn(&AgentResult) + Send + Sync>>,
    pub on_task_complete: Option<Arc<dyn Fn(&OrchestrationTask) + Send + Sync>>,
}

/// Multi-agent orchestrator over a pluggable runner
pub struct Orchestrator {
    runner: Arc<dyn AgentRunner>,
}

impl Orchestrator {
    pub fn new(runner: Arc<dyn AgentRunner>) -> Self {
        Self { runner }
    }

    /// Run a task to completion in the given mode
    pub async fn run(
        &self,
        name: &str,
        agents: Vec<AgentProfile>,
        input: Value,
        mode: OrchestrationMode,
        callbacks: OrchestrationCallbacks,
    ) -> Result<OrchestrationTask> {
        if agents.is_empty() {
            return Err(Error::execution("orchestration requires at least one agent"));
        }
        if mode == OrchestrationMode::Supervisor && agents.len() < 2 {
            return Err(Error::execution(
                "supervisor mode requires a supervisor and at least one worker",
            ));
        }

        let mut task = OrchestrationTask::new(name, mode, agents, input);
        task.status = TaskStatus::Running;
        info!(task = %task.name, mode = ?mode, agents = task.agents.len(), "starting orchestration");

        match mode {
            OrchestrationMode::Sequential => self.run_sequential(&mut task, &callbacks).await,
            OrchestrationMode::Parallel => self.run_parallel(&mut task, &callbacks).await,
            OrchestrationMode::Supervisor => self.run_supervisor(&mut task, &callbacks).await,
        }

        task.ended_at = Some(Utc::now());
        if let Some(cb) = &callbacks.on_task_complete {
            cb(&task);
        }
        Ok(task)
    }

    async fn run_sequential(&self, task: &mut OrchestrationTask, callbacks: &OrchestrationCallbacks) {
        let agents = task.agents.clone();
        let original = task.input.clone();
        let mut current = task.input.clone();

        for (index, agent) in agents.iter().enumerate() {
            let input = if index == 0 {
                current.clone()
            } else {
                chain_input(&original, &agents[index - 1], &current)
            };

            let result = self.step(agent, &input, callbacks).await;
            let failed = result.status == AgentStatus::Failed;
            if !failed {
                current = result.output.clone().unwrap_or(Value::Null);
            }
            task.results.push(result);

            if failed {
                warn!(agent = %agent.name, "sequential chain aborted on agent failure");
                task.status = TaskStatus::Failed;
                return;
            }
        }

        task.status = TaskStatus::Completed;
        task.final_output = Some(current);
    }

    async fn run_parallel(&self, task: &mut OrchestrationTask, callbacks: &OrchestrationCallbacks) {
        let agents = task.agents.clone();
        let input = task.input.clone();

        let results = join_all(
            agents
                .iter()
                .map(|agent| self.step(agent, &input, callbacks)),
        )
        .await;

        let any_failed = results.iter().any(|r| r.status == AgentStatus::Failed);
        task.results = results;
        task.status = if any_failed {
            TaskStatus::Failed
        } else {
            TaskStatus::Completed
        };
        task.final_output = Some(summarize(task));
    }

    async fn run_supervisor(&self, task: &mut OrchestrationTask, callbacks: &OrchestrationCallbacks) {
        let supervisor = task.agents[0].clone();
        let workers: Vec<AgentProfile> = task.agents[1..].to_vec();

        let prompt = supervisor_prompt(&supervisor, &workers, &task.input);
        let plan_result = self.step(&supervisor, &Value::String(prompt), callbacks).await;
        let plan_failed = plan_result.status == AgentStatus::Failed;
        let plan_text = plan_result
            .output
            .as_ref()
            .map(value_as_text)
            .unwrap_or_default();
        task.results.push(plan_result);

        if plan_failed {
            warn!(supervisor = %supervisor.name, "supervisor failed; workers not started");
            task.status = TaskStatus::Failed;
            return;
        }

        let assignments = parse_worker_assignments(&plan_text, &workers);
        let worker_inputs: Vec<Value> = workers
            .iter()
            .map(|w| {
                assignments
                    .get(&w.name.to_lowercase())
                    .map(|subtask| Value::String(subtask.clone()))
                    .unwrap_or_else(|| task.input.clone())
            })
            .collect();

        let results = join_all(
            workers
                .iter()
                .zip(worker_inputs.iter())
                .map(|(worker, input)| self.step(worker, input, callbacks)),
        )
        .await;

        let any_failed = results.iter().any(|r| r.status == AgentStatus::Failed);
        task.results.extend(results);
        task.status = if any_failed {
            TaskStatus::Failed
        } else {
            TaskStatus::Completed
        };
        task.final_output = Some(summarize(task));
    }

    /// Run one agent and record its result
    async fn step(
        &self,
        agent: &AgentProfile,
        input: &Value,
        callbacks: &OrchestrationCallbacks,
    ) -> AgentResult {
        if let Some(cb) = &callbacks.on_agent_start {
            cb(agent);
        }
        debug!(agent = %agent.name, "agent step starting");
        let started = Instant::now();

        let result = match self.runner.run_agent(agent, input).await {
            Ok(output) => AgentResult {
                agent_id: agent.id.clone(),
                agent_name: agent.name.clone(),
                status: AgentStatus::Completed,
                input: input.clone(),
                output: Some(output.content),
                error: None,
                tokens_used: output.tokens_used,
                duration_ms: started.elapsed().as_millis() as u64,
            },
            Err(error) => AgentResult {
                agent_id: agent.id.clone(),
                agent_name: agent.name.clone(),
                status: AgentStatus::Failed,
                input: input.clone(),
                output: None,
                error: Some(error.to_string()),
                tokens_used: 0,
                duration_ms: started.elapsed().as_millis() as u64,
            },
        };

        if let Some(cb) = &callbacks.on_agent_complete {
            cb(&result);
        }
        result
    }
}

/// Chain input fed to agent i>0 in sequential mode
fn chain_input(original: &Value, previous: &AgentProfile, previous_output: &Value) -> Value {
    Value::String(format!(
        "Original task: {}\n\nOutput from {}: {}",
        value_as_text(original),
        previous.name,
        value_as_text(previous_output)
    ))
}

/// Prompt asking the supervisor to assign one subtask per worker
fn supervisor_prompt(supervisor: &AgentProfile, workers: &[AgentProfile], input: &Value) -> String {
    let roster = workers
        .iter()
        .map(|w| {
            if w.role.is_empty() {
                format!("- {}", w.name)
            } else {
                format!("- {}: {}", w.name, w.role)
            }
        })
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        "You are {}, coordinating a team of workers.\n\nWorkers:\n{}\n\nTask:\n{}\n\n\
         Assign one subtask per worker. Respond with one block per worker in exactly \
         this form:\n[WorkerName]: subtask description",
        supervisor.name,
        roster,
        value_as_text(input)
    )
}

/// Parse `[Name]: subtask` blocks from the supervisor's plan
///
/// A block runs from the worker's bracket tag to the next bracket (or
/// end of plan). Keys are lowercased worker names; a worker with no
/// block simply has no entry.
fn parse_worker_assignments(plan: &str, workers: &[AgentProfile]) -> HashMap<String, String> {
    let mut assignments = HashMap::new();
    for worker in workers {
        let pattern = format!(r"\[{}\][:\s]*([^\[]*)", regex::escape(&worker.name));
        let regex = match RegexBuilder::new(&pattern).case_insensitive(true).build() {
            Ok(r) => r,
            Err(_) => continue,
        };
        if let Some(captures) = regex.captures(plan) {
            let subtask = captures
                .get(1)
                .map(|m| m.as_str().trim().to_string())
                .unwrap_or_default();
            if !subtask.is_empty() {
                assignments.insert(worker.name.to_lowercase(), subtask);
            }
        }
    }
    assignments
}

/// Aggregate summary for parallel/supervisor tasks
fn summarize(task: &OrchestrationTask) -> Value {
    let total_duration: u64 = task.results.iter().map(|r| r.duration_ms).sum();
    json!({
        "summary": task
            .results
            .iter()
            .map(|r| {
                json!({
                    "agent": r.agent_name,
                    "status": r.status,
                    "output": r.output,
                })
            })
            .collect::<Vec<_>>(),
        "totalTokens": task.total_tokens(),
        "totalDuration": total_duration,
    })
}

fn value_as_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    /// Echoes its input, or fails for agents whose name starts with `bad`
    struct FakeRunner {
        calls: Mutex<Vec<(String, Value)>>,
    }

    impl FakeRunner {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                calls: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl AgentRunner for FakeRunner {
        async fn run_agent(&self, agent: &AgentProfile, input: &Value) -> Result<AgentOutput> {
            self.calls
                .lock()
                .unwrap()
                .push((agent.name.clone(), input.clone()));
            if agent.name.starts_with("bad") {
                return Err(Error::execution("agent exploded"));
            }
            Ok(AgentOutput {
                content: json!(format!("{} handled {}", agent.name, value_as_text(input))),
                tokens_used: 7,
            })
        }
    }

    fn agent(name: &str) -> AgentProfile {
        AgentProfile {
            id: name.to_string(),
            name: name.to_string(),
            role: "worker".to_string(),
            ..Default::default()
        }
    }

    /// Returns a fixed plan, used as the supervisor
    struct PlanRunner {
        plan: String,
        inner: Arc<FakeRunner>,
    }

    #[async_trait]
    impl AgentRunner for PlanRunner {
        async fn run_agent(&self, agent: &AgentProfile, input: &Value) -> Result<AgentOutput> {
            if agent.name == "boss" {
                return Ok(AgentOutput {
                    content: json!(self.plan.clone()),
                    tokens_used: 3,
                });
            }
            self.inner.run_agent(agent, input).await
        }
    }

    #[tokio::test]
    async fn sequential_chains_outputs() {
        let runner = FakeRunner::new();
        let orchestrator = Orchestrator::new(runner.clone());
        let task = orchestrator
            .run(
                "chain",
                vec![agent("first"), agent("second")],
                json!("do the thing"),
                OrchestrationMode::Sequential,
                OrchestrationCallbacks::default(),
            )
            .await
            .unwrap();

        assert_eq!(task.status, TaskStatus::Completed);
        assert_eq!(task.results.len(), 2);
        assert_eq!(task.total_tokens(), 14);

        let calls = runner.calls.lock().unwrap();
        assert_eq!(calls[0].1, json!("do the thing"));
        let second_input = calls[1].1.as_str().unwrap();
        assert!(second_input.contains("Original task: do the thing"));
        assert!(second_input.contains("Output from first"));
    }

    #[tokio::test]
    async fn sequential_aborts_on_failure() {
        let runner = FakeRunner::new();
        let orchestrator = Orchestrator::new(runner.clone());
        let task = orchestrator
            .run(
                "chain",
                vec![agent("bad-apple"), agent("never-runs")],
                json!("task"),
                OrchestrationMode::Sequential,
                OrchestrationCallbacks::default(),
            )
            .await
            .unwrap();

        assert_eq!(task.status, TaskStatus::Failed);
        assert_eq!(task.results.len(), 1);
        assert_eq!(runner.calls.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn parallel_surfaces_failures_without_aborting() {
        let runner = FakeRunner::new();
        let orchestrator = Orchestrator::new(runner.clone());
        let task = orchestrator
            .run(
                "fanout",
                vec![agent("ok-1"), agent("bad-2"), agent("ok-3")],
                json!("task"),
                OrchestrationMode::Parallel,
                OrchestrationCallbacks::default(),
            )
            .await
            .unwrap();

        assert_eq!(task.status, TaskStatus::Failed);
        assert_eq!(task.results.len(), 3);
        assert_eq!(
            task.results
                .iter()
                .filter(|r| r.status == AgentStatus::Completed)
                .count(),
            2
        );
        let summary = task.final_output.unwrap();
        assert_eq!(summary["summary"].as_array().unwrap().len(), 3);
        assert_eq!(summary["totalTokens"], 14);
    }

    #[tokio::test]
    async fn supervisor_assigns_parsed_subtasks() {
        let inner = FakeRunner::new();
        let runner = Arc::new(PlanRunner {
            plan: "[Worker1]: taskA\n[Worker2]: taskB".to_string(),
            inner: inner.clone(),
        });
        let orchestrator = Orchestrator::new(runner);
        let task = orchestrator
            .run(
                "team",
                vec![agent("boss"), agent("Worker1"), agent("Worker2")],
                json!("build it"),
                OrchestrationMode::Supervisor,
                OrchestrationCallbacks::default(),
            )
            .await
            .unwrap();

        assert_eq!(task.status, TaskStatus::Completed);
        assert_eq!(task.results.len(), 3);

        let calls = inner.calls.lock().unwrap();
        let worker1 = calls.iter().find(|(n, _)| n == "Worker1").unwrap();
        let worker2 = calls.iter().find(|(n, _)| n == "Worker2").unwrap();
        assert_eq!(worker1.1, json!("taskA"));
        assert_eq!(worker2.1, json!("taskB"));
    }

    #[tokio::test]
    async fn supervisor_falls_back_to_raw_task_for_unplanned_workers() {
        let inner = FakeRunner::new();
        let runner = Arc::new(PlanRunner {
            plan: "[Worker1]: only this one".to_string(),
            inner: inner.clone(),
        });
        let orchestrator = Orchestrator::new(runner);
        orchestrator
            .run(
                "team",
                vec![agent("boss"), agent("Worker1"), agent("Worker2")],
                json!("the raw task"),
                OrchestrationMode::Supervisor,
                OrchestrationCallbacks::default(),
            )
            .await
            .unwrap();

        let calls = inner.calls.lock().unwrap();
        let worker2 = calls.iter().find(|(n, _)| n == "Worker2").unwrap();
        assert_eq!(worker2.1, json!("the raw task"));
    }

    #[tokio::test]
    async fn supervisor_requires_two_agents() {
        let orchestrator = Orchestrator::new(FakeRunner::new());
        let err = orchestrator
            .run(
                "team",
                vec![agent("solo")],
                json!("task"),
                OrchestrationMode::Supervisor,
                OrchestrationCallbacks::default(),
            )
            .await
            .unwrap_err();
        assert_eq!(err.code(), "EXECUTION_ERROR");
    }

    #[test]
    fn assignment_parsing_handles_multiline_blocks() {
        let workers = vec![agent("Researcher"), agent("Writer")];
        let plan = "[Researcher]: find sources\nwith citations\n[Writer]: draft the summary";
        let assignments = parse_worker_assignments(plan, &workers);
        assert_eq!(
            assignments["researcher"],
            "find sources\nwith citations"
        );
        assert_eq!(assignments["writer"], "draft the summary");
    }
}
