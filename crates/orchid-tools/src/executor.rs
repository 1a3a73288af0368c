//! Tool call executor
//!
//! The single entry point shared by workflow tool nodes and AI function
//! calling: validates a call against the registry, dispatches by
//! transport, and records usage stats. Builtin providers resolve through
//! a handler map keyed by provider id so tests can substitute fakes.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use orchid_core::{Error, Result};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::RwLock;
use tracing::{debug, warn};

use crate::descriptor::{ToolStatus, ToolTransport};
use crate::registry::ToolRegistry;

/// A tool call addressed by provider id and tool name
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ToolCallRequest {
    pub tool_id: String,
    pub tool: String,
    #[serde(default)]
    pub params: Map<String, Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<Value>,
}

/// Error details on a failed call
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolError {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
}

/// Call timing metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallMetadata {
    pub duration_ms: u64,
    pub timestamp: DateTime<Utc>,
}

/// Outcome of a tool call; `success` holds exactly when `result` is set
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCallResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ToolError>,
    pub metadata: CallMetadata,
}

impl ToolCallResponse {
    fn ok(result: Value, duration_ms: u64) -> Self {
        Self {
            success: true,
            result: Some(result),
            error: None,
            metadata: CallMetadata {
                duration_ms,
                timestamp: Utc::now(),
            },
        }
    }

    fn err(error: &Error, duration_ms: u64) -> Self {
        Self {
            success: false,
            result: None,
            error: Some(ToolError {
                code: error.code().to_string(),
                message: error.to_string(),
                details: Some(json!({ "stack": format!("{:?}", error) })),
            }),
            metadata: CallMetadata {
                duration_ms,
                timestamp: Utc::now(),
            },
        }
    }
}

/// Compiled-in handler backing a builtin provider
#[async_trait]
pub trait BuiltinHandler: Send + Sync {
    async fn handle(&self, tool: &str, params: &Map<String, Value>) -> Result<Value>;
}

/// Validates and dispatches tool calls
pub struct ToolExecutor {
    registry: Arc<ToolRegistry>,
    handlers: RwLock<HashMap<String, Arc<dyn BuiltinHandler>>>,
    http: reqwest::Client,
}

impl ToolExecutor {
    pub fn new(registry: Arc<ToolRegistry>) -> Self {
        Self {
            registry,
            handlers: RwLock::new(HashMap::new()),
            http: reqwest::Client::new(),
        }
    }

    /// Attach a builtin handler for a provider id
    pub async fn register_handler(&self, id: &str, handler: Arc<dyn BuiltinHandler>) {
        let mut handlers = self.handlers.write().await;
        handlers.insert(id.to_string(), handler);
    }

    pub fn registry(&self) -> &Arc<ToolRegistry> {
        &self.registry
    }

    /// Validate and execute a tool call
    pub async fn call(&self, request: ToolCallRequest) -> ToolCallResponse {
        let started = Instant::now();
        let outcome = self.dispatch(&request).await;
        let duration_ms = started.elapsed().as_millis() as u64;

        self.registry.record_call(&request.tool_id, duration_ms).await;

        match outcome {
            Ok(result) => {
                debug!(tool_id = %request.tool_id, tool = %request.tool, duration_ms, "tool call completed");
                ToolCallResponse::ok(result, duration_ms)
            }
            Err(error) => {
                warn!(tool_id = %request.tool_id, tool = %request.tool, error = %error, "tool call failed");
                ToolCallResponse::err(&error, duration_ms)
            }
        }
    }

    async fn dispatch(&self, request: &ToolCallRequest) -> Result<Value> {
        let descriptor = self
            .registry
            .get(&request.tool_id)
            .await
            .ok_or_else(|| Error::tool_not_found(format!("no provider '{}'", request.tool_id)))?;

        if descriptor.status != ToolStatus::Active {
            return Err(Error::ToolInactive(descriptor.id.clone()));
        }

        let tool = descriptor.tool(&request.tool).ok_or_else(|| {
            Error::tool_not_found(format!(
                "provider '{}' has no tool '{}'",
                request.tool_id, request.tool
            ))
        })?;

        for param in &tool.parameters {
            if param.required && !request.params.contains_key(&param.name) {
                return Err(Error::missing_param(&param.name));
            }
        }

        match descriptor.transport {
            ToolTransport::Builtin => {
                let handler = {
                    let handlers = self.handlers.read().await;
                    handlers.get(&descriptor.id).cloned()
                };
                let handler = handler.ok_or_else(|| {
                    Error::execution(format!(
                        "no builtin handler bound for provider '{}'",
                        descriptor.id
                    ))
                })?;
                handler.handle(&request.tool, &request.params).await
            }
            ToolTransport::Http => {
                let endpoint = descriptor.endpoint.as_deref().ok_or_else(|| {
                    Error::config_missing(format!(
                        "provider '{}' has http transport but no endpoint",
                        descriptor.id
                    ))
                })?;
                self.call_http(endpoint, request).await
            }
            ToolTransport::Stdio => Err(Error::not_implemented(
                "stdio transport is reserved and not yet available",
            )),
            ToolTransport::Websocket => Err(Error::not_implemented(
                "websocket transport is reserved and not yet available",
            )),
        }
    }

    /// POST `{tool, params}` to the provider endpoint, decode JSON or text
    async fn call_http(&self, endpoint: &str, request: &ToolCallRequest) -> Result<Value> {
        let response = self
            .http
            .post(endpoint)
            .json(&json!({
                "tool": request.tool,
                "params": request.params,
            }))
            .send()
            .await?;

        let status = response.status();
        let is_json = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|v| v.contains("json"))
            .unwrap_or(false);

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::execution(format!(
                "tool endpoint returned {}: {}",
                status, body
            )));
        }

        if is_json {
            Ok(response.json().await?)
        } else {
            Ok(Value::String(response.text().await?))
        }
    }
}
