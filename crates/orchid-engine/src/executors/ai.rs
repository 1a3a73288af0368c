//! AI node
//!
//! Resolves the model configuration (node data, optionally overridden by
//! the workspace's active AI config), derives the user content from the
//! incoming value, and dispatches to the Gemini or OpenAI-compatible
//! path. When the node carries an orchestration mode and worker agents
//! it delegates to the multi-agent orchestrator instead of making a
//! single call; the orchestrator drives each agent back through the same
//! chat path.

use async_trait::async_trait;
use orchid_agents::{
    AgentOutput, AgentProfile, AgentRunner, OrchestrationCallbacks, OrchestrationMode,
    Orchestrator, TaskStatus,
};
use orchid_core::{Error, Feedback, FeedbackDetail, Result, TokenUsage};
use orchid_llm::{AiConfig, ChatMessage};
use serde_json::Value;
use std::str::FromStr;
use std::sync::{Arc, Mutex};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::{f64_field, preview, str_field, u64_field};
use crate::context::ExecutionContext;
use crate::graph::Node;
use crate::services::Services;

pub async fn execute(
    node: &Node,
    data: &Value,
    input: Value,
    ctx: &Arc<ExecutionContext>,
    services: &Arc<Services>,
) -> Result<Value> {
    ctx.check_cancelled()?;

    let (config, config_source) = resolve_config(data, ctx, services).await;

    if let Some((mode, workers)) = orchestration_request(data) {
        return orchestrate(node, data, input, ctx, services, config, mode, workers).await;
    }

    let mut messages = Vec::new();
    if let Some(system_prompt) = str_field(data, "systemPrompt") {
        messages.push(ChatMessage::system(system_prompt));
    }
    let user_content = derive_user_content(&input);
    messages.push(ChatMessage::user(user_content.clone()));

    debug!(node_id = %node.id, model = %config.model, "ai node chat call");
    let outcome = services.llm.chat(&config, &messages).await?;
    ctx.check_cancelled()?;

    ctx.set_token_usage(&node.id, outcome.usage).await;
    ctx.set_feedback(&node.id, single_call_feedback(data, &config, &config_source, &user_content, &outcome.content, outcome.usage))
        .await;

    Ok(Value::String(outcome.content))
}

/// Resolve model config from node data, then apply the workspace's
/// active config when the node opts in
async fn resolve_config(
    data: &Value,
    ctx: &Arc<ExecutionContext>,
    services: &Arc<Services>,
) -> (AiConfig, String) {
    let mut config = AiConfig {
        provider: str_field(data, "provider").unwrap_or("openai").to_string(),
        model: str_field(data, "model").unwrap_or("gpt-4o-mini").to_string(),
        api_key: str_field(data, "apiKey").unwrap_or("").to_string(),
        base_url: str_field(data, "baseUrl").map(String::from),
        temperature: f64_field(data, "temperature"),
        max_tokens: u64_field(data, "maxTokens"),
    };
    let mut source = "node".to_string();

    if str_field(data, "configSource") == Some("workspace") {
        if let Some(workspace_id) = services.config.workspace_id.as_deref() {
            match services.collaborator.active_ai_config(workspace_id).await {
                Ok(workspace) => {
                    if !workspace.provider.is_empty() {
                        config.provider = workspace.provider;
                    }
                    if !workspace.model.is_empty() {
                        config.model = workspace.model;
                    }
                    if !workspace.api_key.is_empty() {
                        config.api_key = workspace.api_key;
                    }
                    if workspace.base_url.is_some() {
                        config.base_url = workspace.base_url;
                    }
                    if workspace.temperature.is_some() {
                        config.temperature = workspace.temperature;
                    }
                    if workspace.max_tokens.is_some() {
                        config.max_tokens = workspace.max_tokens;
                    }
                    source = "workspace".to_string();
                }
                Err(e) => {
                    ctx.log_warn(
                        None,
                        &format!("workspace AI config unavailable ({}); using node config", e),
                    )
                    .await;
                }
            }
        }
    }

    (config, source)
}

/// Derive the user-message text from an arbitrary incoming value
///
/// Upstream search and knowledge nodes leave assembled context strings
/// on their outputs; those win over raw JSON.
fn derive_user_content(input: &Value) -> String {
    match input {
        Value::String(text) => text.clone(),
        Value::Object(map) => map
            .get("searchContext")
            .or_else(|| map.get("synthesizedContext"))
            .or_else(|| map.get("ragContext"))
            .and_then(Value::as_str)
            .map(String::from)
            .unwrap_or_else(|| input.to_string()),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

fn single_call_feedback(
    data: &Value,
    config: &AiConfig,
    config_source: &str,
    user_content: &str,
    content: &str,
    usage: TokenUsage,
) -> Feedback {
    let mut feedback = Feedback::new("AI Model Call")
        .with_input_summary(preview(&Value::String(user_content.to_string()), 160))
        .with_output_summary(preview(&Value::String(content.to_string()), 160))
        .with_detail(FeedbackDetail::text("Model", config.model.clone()))
        .with_detail(FeedbackDetail::text("Provider", config.provider.clone()))
        .with_detail(FeedbackDetail::text("Config source", config_source));
    if let Some(system_prompt) = str_field(data, "systemPrompt") {
        feedback = feedback.with_detail(FeedbackDetail::code(
            "System prompt",
            preview(&Value::String(system_prompt.to_string()), 120),
        ));
    }
    feedback.with_detail(FeedbackDetail::text(
        "Tokens",
        format!(
            "{} prompt + {} completion = {}",
            usage.prompt_tokens, usage.completion_tokens, usage.total_tokens
        ),
    ))
}

/// Pull mode and workers out of node data, if orchestration is requested
fn orchestration_request(data: &Value) -> Option<(OrchestrationMode, Vec<AgentProfile>)> {
    let mode = OrchestrationMode::from_str(str_field(data, "orchestrationMode")?).ok()?;
    let workers: Vec<AgentProfile> = data
        .get("workerAgents")
        .and_then(Value::as_array)?
        .iter()
        .enumerate()
        .map(|(index, raw)| agent_profile(index, raw))
        .collect();
    if workers.is_empty() {
        return None;
    }
    Some((mode, workers))
}

/// Tolerant agent mapping: authored documents use camelCase keys
fn agent_profile(index: usize, raw: &Value) -> AgentProfile {
    let name = str_field(raw, "name")
        .map(String::from)
        .unwrap_or_else(|| format!("agent-{}", index + 1));
    AgentProfile {
        id: str_field(raw, "id").map(String::from).unwrap_or_else(|| name.clone()),
        name,
        role: str_field(raw, "role").unwrap_or("").to_string(),
        system_prompt: str_field(raw, "systemPrompt")
            .or_else(|| str_field(raw, "system_prompt"))
            .unwrap_or("")
            .to_string(),
        model: str_field(raw, "model").map(String::from),
        provider: str_field(raw, "provider").map(String::from),
        temperature: f64_field(raw, "temperature"),
        tools: raw
            .get("tools")
            .and_then(Value::as_array)
            .map(|tools| {
                tools
                    .iter()
                    .filter_map(Value::as_str)
                    .map(String::from)
                    .collect()
            })
            .unwrap_or_default(),
    }
}

#[allow(clippy::too_many_arguments)]
async fn orchestrate(
    node: &Node,
    data: &Value,
    input: Value,
    ctx: &Arc<ExecutionContext>,
    services: &Arc<Services>,
    config: AiConfig,
    mode: OrchestrationMode,
    workers: Vec<AgentProfile>,
) -> Result<Value> {
    let task_name = str_field(data, "taskName").unwrap_or(&node.id).to_string();
    ctx.log_info(
        Some(&node.id),
        &format!("orchestrating {} agents in {:?} mode", workers.len(), mode),
    )
    .await;

    let runner = Arc::new(EngineAgentRunner {
        services: services.clone(),
        base_config: config,
        cancel: ctx.cancel_token().clone(),
        usage: Mutex::new(TokenUsage::default()),
    });
    let orchestrator = Orchestrator::new(runner.clone());

    let task = orchestrator
        .run(
            &task_name,
            workers,
            input,
            mode,
            OrchestrationCallbacks::default(),
        )
        .await?;

    ctx.check_cancelled()?;

    let usage = *runner.usage.lock().expect("usage lock poisoned");
    ctx.set_token_usage(&node.id, usage).await;

    let mut feedback = Feedback::new("Agent Orchestration")
        .with_output_summary(format!(
            "{} agents, {:?}, {} tokens",
            task.results.len(),
            mode,
            task.total_tokens()
        ))
        .with_detail(FeedbackDetail::text("Mode", format!("{:?}", mode)));
    for result in &task.results {
        feedback = feedback.with_detail(FeedbackDetail::text(
            result.agent_name.clone(),
            format!("{:?} ({} tokens)", result.status, result.tokens_used),
        ));
    }
    ctx.set_feedback(&node.id, feedback).await;

    // Parallel mode surfaces per-agent failures in the summary; the
    // other modes abort the node.
    if task.status == TaskStatus::Failed && mode != OrchestrationMode::Parallel {
        let failed = task
            .results
            .iter()
            .filter_map(|r| r.error.as_ref().map(|e| format!("{}: {}", r.agent_name, e)))
            .collect::<Vec<_>>()
            .join("; ");
        return Err(Error::execution(format!("orchestration failed: {}", failed)));
    }

    Ok(task.final_output.clone().unwrap_or(Value::Null))
}

/// Agent runner backed by the engine's chat path
struct EngineAgentRunner {
    services: Arc<Services>,
    base_config: AiConfig,
    cancel: CancellationToken,
    usage: Mutex<TokenUsage>,
}

#[async_trait]
impl AgentRunner for EngineAgentRunner {
    async fn run_agent(&self, agent: &AgentProfile, input: &Value) -> Result<AgentOutput> {
        if self.cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }

        let mut config = self.base_config.clone();
        if let Some(model) = &agent.model {
            config.model = model.clone();
        }
        if let Some(provider) = &agent.provider {
            config.provider = provider.clone();
        }
        if let Some(temperature) = agent.temperature {
            config.temperature = Some(temperature);
        }

        let mut messages = Vec::new();
        if !agent.system_prompt.is_empty() {
            messages.push(ChatMessage::system(agent.system_prompt.clone()));
        } else if !agent.role.is_empty() {
            messages.push(ChatMessage::system(format!(
                "You are {}, acting as: {}",
                agent.name, agent.role
            )));
        }
        messages.push(ChatMessage::user(derive_user_content(input)));

        let outcome = self.services.llm.chat(&config, &messages).await?;

        {
            let mut usage = self.usage.lock().expect("usage lock poisoned");
            usage.add(&outcome.usage);
        }

        Ok(AgentOutput {
            content: Value::String(outcome.content),
            tokens_used: outcome.usage.total_tokens,
        })
    }
}
