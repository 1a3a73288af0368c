//! Knowledge (RAG) node
//!
//! Sends a query to the collaborator's knowledge endpoint and returns
//! the hits plus an assembled `ragContext` for downstream AI nodes. Top
//! results become feedback sources.

use orchid_core::{Feedback, FeedbackSource, Result};
use serde_json::{json, Value};
use std::sync::Arc;

use super::{f64_field, preview, str_field, u64_field, value_text};
use crate::context::ExecutionContext;
use crate::graph::Node;
use crate::services::Services;

const DEFAULT_TOP_K: u64 = 5;
const DEFAULT_WORKSPACE: &str = "default";

pub async fn execute(
    node: &Node,
    data: &Value,
    input: Value,
    ctx: &Arc<ExecutionContext>,
    services: &Arc<Services>,
) -> Result<Value> {
    ctx.check_cancelled()?;

    let query = str_field(data, "query")
        .map(String::from)
        .unwrap_or_else(|| value_text(&input));

    let workspace_id = str_field(data, "workspaceId")
        .or(services.config.workspace_id.as_deref())
        .unwrap_or(DEFAULT_WORKSPACE)
        .to_string();

    let request = json!({
        "query": query,
        "apiKey": str_field(data, "apiKey").unwrap_or(""),
        "provider": str_field(data, "provider").unwrap_or("openai"),
        "embeddingModel": str_field(data, "embeddingModel").unwrap_or("text-embedding-3-small"),
        "topK": u64_field(data, "topK").unwrap_or(DEFAULT_TOP_K),
        "threshold": f64_field(data, "threshold").unwrap_or(0.0),
    });

    ctx.log_info(Some(&node.id), &format!("knowledge query: {}", preview(&json!(query.clone()), 80)))
        .await;

    let response = services
        .collaborator
        .query_knowledge(&workspace_id, &request)
        .await?;

    let context_text = response.context.clone().unwrap_or_else(|| {
        response
            .results
            .iter()
            .filter_map(result_text)
            .collect::<Vec<_>>()
            .join("\n\n")
    });

    let sources: Vec<FeedbackSource> = response
        .results
        .iter()
        .take(5)
        .map(|result| FeedbackSource {
            title: result
                .get("documentName")
                .and_then(Value::as_str)
                .unwrap_or("Document")
                .to_string(),
            url: None,
            snippet: result_text(result).map(|t| {
                let cut: String = t.chars().take(200).collect();
                cut
            }),
        })
        .collect();

    ctx.set_feedback(
        &node.id,
        Feedback::new("Knowledge Base")
            .with_input_summary(query.clone())
            .with_output_summary(format!("{} results", response.results.len()))
            .with_sources(sources),
    )
    .await;

    Ok(json!({
        "query": query,
        "results": response.results,
        "context": context_text,
        "resultCount": response.results.len(),
        "ragContext": context_text,
    }))
}

fn result_text(result: &Value) -> Option<String> {
    result
        .get("content")
        .or_else(|| result.get("text"))
        .and_then(Value::as_str)
        .map(String::from)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;
    use crate::graph::NodeKind;
    use orchid_core::RunCallbacks;
    use serde_json::Map;
    use tokio_util::sync::CancellationToken;

    #[tokio::test]
    async fn no_backend_fails_with_config_missing() {
        let ctx = Arc::new(ExecutionContext::new(
            "wf",
            &["k".to_string()],
            Map::new(),
            Value::Null,
            CancellationToken::new(),
            RunCallbacks::default(),
        ));
        let services = Services::initialize(EngineConfig::default()).await;
        let node = Node::new("k", NodeKind::Knowledge, json!({}));

        let err = execute(&node, &json!({ "query": "q" }), Value::Null, &ctx, &services)
            .await
            .unwrap_err();
        assert_eq!(err.code(), "CONFIG_MISSING");
    }

    #[test]
    fn result_text_prefers_content() {
        assert_eq!(
            result_text(&json!({ "content": "a", "text": "b" })),
            Some("a".to_string())
        );
        assert_eq!(result_text(&json!({ "text": "b" })), Some("b".to_string()));
        assert_eq!(result_text(&json!({})), None);
    }
}
