//! Tool (mcp) node
//!
//! Resolves `{toolId, tool, params}` from node data and routes through
//! the shared tool executor. `params` is authored as a JSON template
//! string; `{{input}}`/`{{input.key}}` substitutions are applied before
//! parsing, and a parse failure degrades to empty params with a warning
//! rather than failing the node. Search-shaped results additionally get
//! their top hits lifted into feedback sources and a synthesized
//! `searchContext` for downstream AI nodes.

use orchid_core::{Error, Feedback, FeedbackSource, Result};
use orchid_tools::{ToolCallRequest, ToolError};
use serde_json::{json, Map, Value};
use std::sync::Arc;

use super::{preview, str_field, value_text};
use crate::context::ExecutionContext;
use crate::graph::Node;
use crate::services::Services;

const MAX_FEEDBACK_SOURCES: usize = 5;

pub async fn execute(
    node: &Node,
    data: &Value,
    input: Value,
    ctx: &Arc<ExecutionContext>,
    services: &Arc<Services>,
) -> Result<Value> {
    ctx.check_cancelled()?;

    let tool_id = str_field(data, "toolId")
        .ok_or_else(|| Error::config_missing(format!("tool node '{}' has no toolId", node.id)))?
        .to_string();
    let tool = str_field(data, "tool")
        .ok_or_else(|| Error::config_missing(format!("tool node '{}' has no tool name", node.id)))?
        .to_string();

    let mut params = match data.get("params") {
        Some(Value::String(template)) => {
            let substituted = substitute_input(template, &input);
            match serde_json::from_str::<Map<String, Value>>(&substituted) {
                Ok(parsed) => parsed,
                Err(e) => {
                    ctx.log_warn(
                        Some(&node.id),
                        &format!("tool params were not valid JSON ({}); using empty params", e),
                    )
                    .await;
                    Map::new()
                }
            }
        }
        Some(Value::Object(object)) => object.clone(),
        _ => Map::new(),
    };

    // Search-shaped tools get the incoming value as their query when the
    // author did not wire one explicitly.
    if (tool.contains("search") || tool == "query") && !params.contains_key("query") {
        params.insert("query".to_string(), Value::String(value_text(&input)));
    }

    ctx.log_info(
        Some(&node.id),
        &format!("calling tool '{}' on provider '{}'", tool, tool_id),
    )
    .await;

    let response = services
        .tools
        .call(ToolCallRequest {
            tool_id: tool_id.clone(),
            tool: tool.clone(),
            params,
            context: Some(json!({
                "workflowId": ctx.workflow_id,
                "executionId": ctx.execution_id,
                "nodeId": node.id,
            })),
        })
        .await;

    if !response.success {
        let error = response.error.unwrap_or(ToolError {
            code: "EXECUTION_ERROR".to_string(),
            message: "tool call failed".to_string(),
            details: None,
        });
        return Err(tool_error(&error));
    }

    let result = response.result.unwrap_or(Value::Null);
    let mut feedback = Feedback::new(format!("Tool: {}", tool))
        .with_input_summary(preview(&input, 120))
        .with_output_summary(preview(&result, 160));

    let output = match search_shaped(&result) {
        Some(hits) => {
            feedback = feedback.with_sources(sources_from(hits));
            let query = result
                .get("query")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string();
            let search_context = synthesize_search_context(&query, hits);

            let mut merged = result.as_object().cloned().unwrap_or_default();
            merged.insert("searchContext".to_string(), Value::String(search_context));
            Value::Object(merged)
        }
        None => result,
    };

    ctx.set_feedback(&node.id, feedback).await;
    Ok(output)
}

/// Apply `{{input}}` / `{{input.key}}` substitutions to a params
/// template
///
/// This is the only substitution pass over `params`; the scheduler
/// exempts the field from generic config resolution so the envelope
/// reaches here with its templates intact.
fn substitute_input(template: &str, input: &Value) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(open) = rest.find("{{") {
        out.push_str(&rest[..open]);
        let after = &rest[open + 2..];
        match after.find("}}") {
            Some(close) => {
                let path = after[..close].trim();
                let replacement = if path == "input" {
                    Some(input.clone())
                } else if let Some(key) = path.strip_prefix("input.") {
                    input.get(key).cloned()
                } else {
                    None
                };
                match replacement {
                    Some(value) => out.push_str(&embed_json_text(&value)),
                    None => {
                        out.push_str("{{");
                        out.push_str(&after[..close]);
                        out.push_str("}}");
                    }
                }
                rest = &after[close + 2..];
            }
            None => {
                out.push_str(&rest[open..]);
                rest = "";
            }
        }
    }
    out.push_str(rest);
    out
}

/// Render a value for splicing into JSON template text
///
/// Strings are escaped but unquoted so `"{{input}}"` stays one JSON
/// string; other values insert their raw JSON text.
fn embed_json_text(value: &Value) -> String {
    match value {
        Value::String(s) => {
            let quoted = serde_json::to_string(s).unwrap_or_default();
            quoted[1..quoted.len() - 1].to_string()
        }
        other => other.to_string(),
    }
}

/// A result is search-shaped when it carries a `results` array
fn search_shaped(result: &Value) -> Option<&Vec<Value>> {
    result.get("results").and_then(Value::as_array)
}

fn sources_from(hits: &[Value]) -> Vec<FeedbackSource> {
    hits.iter()
        .take(MAX_FEEDBACK_SOURCES)
        .map(|hit| FeedbackSource {
            title: hit
                .get("title")
                .and_then(Value::as_str)
                .unwrap_or("Untitled")
                .to_string(),
            url: hit.get("url").and_then(Value::as_str).map(String::from),
            snippet: hit
                .get("snippet")
                .and_then(Value::as_str)
                .map(String::from),
        })
        .collect()
}

fn synthesize_search_context(query: &str, hits: &[Value]) -> String {
    let mut lines = vec![format!("Search results for \"{}\":", query)];
    for (index, hit) in hits.iter().take(MAX_FEEDBACK_SOURCES).enumerate() {
        let title = hit.get("title").and_then(Value::as_str).unwrap_or("Untitled");
        let snippet = hit.get("snippet").and_then(Value::as_str).unwrap_or("");
        let url = hit.get("url").and_then(Value::as_str).unwrap_or("");
        lines.push(format!("{}. {} - {} ({})", index + 1, title, snippet, url));
    }
    lines.join("\n")
}

fn tool_error(error: &ToolError) -> Error {
    match error.code.as_str() {
        "TOOL_NOT_FOUND" => Error::ToolNotFound(error.message.clone()),
        "TOOL_INACTIVE" => Error::ToolInactive(error.message.clone()),
        "MISSING_PARAM" => Error::MissingParam(error.message.clone()),
        "NOT_IMPLEMENTED" => Error::NotImplemented(error.message.clone()),
        "TIMEOUT" => Error::Timeout(error.message.clone()),
        "DENYLISTED_CONSTRUCT" => Error::DenylistedConstruct(error.message.clone()),
        "UNSUPPORTED_LANGUAGE" => Error::UnsupportedLanguage(error.message.clone()),
        "PATH_TRAVERSAL" => Error::PathTraversal(error.message.clone()),
        "CONFIG_MISSING" => Error::ConfigMissing(error.message.clone()),
        _ => Error::Execution(error.message.clone()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn substitution_handles_whole_and_keyed_input() {
        assert_eq!(
            substitute_input(r#"{"query":"{{input}}"}"#, &json!("golang")),
            r#"{"query":"golang"}"#
        );
        assert_eq!(
            substitute_input(r#"{"q":"{{input.term}}","n":{{input.count}}}"#,
                &json!({ "term": "rust", "count": 3 })),
            r#"{"q":"rust","n":3}"#
        );
    }

    #[test]
    fn substitution_escapes_string_content() {
        let out = substitute_input(r#"{"query":"{{input}}"}"#, &json!("say \"hi\""));
        let parsed: Value = serde_json::from_str(&out).unwrap();
        assert_eq!(parsed["query"], "say \"hi\"");
    }

    #[test]
    fn unknown_paths_stay_literal() {
        assert_eq!(
            substitute_input("{{variables.x}}", &json!("v")),
            "{{variables.x}}"
        );
    }

    #[test]
    fn search_context_lists_top_hits() {
        let hits = vec![
            json!({ "title": "A", "snippet": "first", "url": "https://a" }),
            json!({ "title": "B", "snippet": "second", "url": "https://b" }),
        ];
        let context = synthesize_search_context("golang", &hits);
        assert!(context.starts_with("Search results for \"golang\""));
        assert!(context.contains("1. A - first"));
        assert!(context.contains("2. B - second"));
    }

    #[test]
    fn source_extraction_caps_at_five() {
        let hits: Vec<Value> = (0..8)
            .map(|i| json!({ "title": format!("t{}", i), "url": "https://x" }))
            .collect();
        assert_eq!(sources_from(&hits).len(), 5);
    }
}
