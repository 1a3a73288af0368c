//! HTTP node
//!
//! Routes through the shared tool executor's builtin `http` provider so
//! request validation and telemetry match tool-node calls. Template
//! substitution in URL and body has already happened during node data
//! resolution.

use orchid_core::{Error, Feedback, Result};
use orchid_tools::ToolCallRequest;
use serde_json::{Map, Value};
use std::sync::Arc;

use super::{preview, str_field};
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

    let url = str_field(data, "url")
        .ok_or_else(|| Error::config_missing(format!("http node '{}' has no url", node.id)))?;

    let mut params = Map::new();
    params.insert("url".to_string(), Value::String(url.to_string()));
    if let Some(method) = str_field(data, "method") {
        params.insert("method".to_string(), Value::String(method.to_string()));
    }
    if let Some(headers) = data.get("headers").filter(|v| v.is_object()) {
        params.insert("headers".to_string(), headers.clone());
    }
    if let Some(body) = data.get("body").filter(|v| !v.is_null()) {
        params.insert("body".to_string(), body.clone());
    }

    ctx.log_info(Some(&node.id), &format!("http request to {}", url)).await;

    let response = services
        .tools
        .call(ToolCallRequest {
            tool_id: "http".to_string(),
            tool: "request".to_string(),
            params,
            context: None,
        })
        .await;

    match response.result {
        Some(result) if response.success => {
            ctx.set_feedback(
                &node.id,
                Feedback::new("HTTP Request")
                    .with_input_summary(preview(&input, 120))
                    .with_output_summary(format!(
                        "{} {}",
                        result.get("status").and_then(Value::as_u64).unwrap_or(0),
                        preview(result.get("data").unwrap_or(&Value::Null), 120)
                    )),
            )
            .await;
            Ok(result)
        }
        _ => {
            let message = response
                .error
                .map(|e| e.message)
                .unwrap_or_else(|| "http request failed".to_string());
            Err(Error::execution(message))
        }
    }
}
