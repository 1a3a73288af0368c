//! Sub-workflow node
//!
//! Fetches a stored workflow by id and runs it on a nested engine with
//! derived variables (`parentInput` plus the parent's scratch space) and
//! a child cancellation token, so cancelling the outer run cancels the
//! nested one. The nested run gets its own execution id.

use orchid_core::{Error, Feedback, FeedbackDetail, Result, RunStatus};
use serde_json::Value;
use std::sync::Arc;

use super::{preview, str_field};
use crate::context::ExecutionContext;
use crate::engine::{Engine, MAX_SUBWORKFLOW_DEPTH};
use crate::graph::{Node, WorkflowGraph};
use crate::services::Services;

pub async fn execute(
    node: &Node,
    data: &Value,
    input: Value,
    ctx: &Arc<ExecutionContext>,
    services: &Arc<Services>,
    depth: usize,
) -> Result<Value> {
    ctx.check_cancelled()?;

    if depth >= MAX_SUBWORKFLOW_DEPTH {
        return Err(Error::execution(format!(
            "sub-workflow nesting exceeded {} levels",
            MAX_SUBWORKFLOW_DEPTH
        )));
    }

    let workflow_id = str_field(data, "workflowId").ok_or_else(|| {
        Error::config_missing(format!("subworkflow node '{}' has no workflowId", node.id))
    })?;

    let document = services.collaborator.fetch_workflow(workflow_id).await?;
    let graph = WorkflowGraph::new(document.nodes, document.edges)?;

    let mut variables = ctx.variables_snapshot().await;
    variables.insert("parentInput".to_string(), input.clone());

    ctx.log_info(
        Some(&node.id),
        &format!("running sub-workflow '{}' ({})", workflow_id, document.name),
    )
    .await;

    let engine = Engine::nested(
        workflow_id,
        graph,
        input,
        variables,
        services.clone(),
        ctx.cancel_token(),
        depth + 1,
    );
    let result = engine.run().await;

    ctx.set_feedback(
        &node.id,
        Feedback::new("Sub-workflow")
            .with_output_summary(format!("{:?}, {} ms", result.status, result.duration_ms))
            .with_detail(FeedbackDetail::text("Workflow", workflow_id))
            .with_detail(FeedbackDetail::text("Execution", result.execution_id.clone())),
    )
    .await;

    match result.status {
        RunStatus::Completed => {
            let output = result.output.unwrap_or(Value::Null);
            ctx.log_debug(
                Some(&node.id),
                &format!("sub-workflow output: {}", preview(&output, 120)),
            )
            .await;
            Ok(output)
        }
        RunStatus::Cancelled => Err(Error::Cancelled),
        _ => Err(Error::execution(format!(
            "sub-workflow '{}' failed: {}",
            workflow_id,
            result.error.unwrap_or_else(|| "unknown error".to_string())
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;
    use crate::graph::NodeKind;
    use orchid_core::RunCallbacks;
    use serde_json::{json, Map};
    use tokio_util::sync::CancellationToken;

    #[tokio::test]
    async fn missing_workflow_id_is_config_missing() {
        let ctx = Arc::new(ExecutionContext::new(
            "wf",
            &["sub".to_string()],
            Map::new(),
            Value::Null,
            CancellationToken::new(),
            RunCallbacks::default(),
        ));
        let services = Services::initialize(EngineConfig::default()).await;
        let node = Node::new("sub", NodeKind::Subworkflow, json!({}));

        let err = execute(&node, &json!({}), Value::Null, &ctx, &services, 0)
            .await
            .unwrap_err();
        assert_eq!(err.code(), "CONFIG_MISSING");
    }

    #[tokio::test]
    async fn depth_limit_stops_runaway_nesting() {
        let ctx = Arc::new(ExecutionContext::new(
            "wf",
            &["sub".to_string()],
            Map::new(),
            Value::Null,
            CancellationToken::new(),
            RunCallbacks::default(),
        ));
        let services = Services::initialize(EngineConfig::default()).await;
        let node = Node::new("sub", NodeKind::Subworkflow, json!({}));

        let err = execute(
            &node,
            &json!({ "workflowId": "wf-child" }),
            Value::Null,
            &ctx,
            &services,
            MAX_SUBWORKFLOW_DEPTH,
        )
        .await
        .unwrap_err();
        assert!(err.to_string().contains("nesting"));
    }
}
