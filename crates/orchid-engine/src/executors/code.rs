//! Code node: user snippet through the sandbox runner

use orchid_core::{Feedback, FeedbackDetail, Result};
use orchid_sandbox::CodeRequest;
use serde_json::Value;
use std::sync::Arc;

use super::{preview, str_field, u64_field};
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

    let code = str_field(data, "code").unwrap_or("").to_string();
    let request = CodeRequest {
        code,
        language: str_field(data, "language").unwrap_or("javascript").to_string(),
        timeout_ms: u64_field(data, "timeout"),
        input: input.clone(),
        variables: ctx.variables_snapshot().await,
    };

    let outcome = services.sandbox.run(request).await;

    for log in &outcome.logs {
        ctx.log_debug(Some(&node.id), &format!("console.{}: {}", log.level, log.message))
            .await;
    }

    let mut feedback = Feedback::new("Code")
        .with_input_summary(preview(&input, 120))
        .with_detail(FeedbackDetail::text(
            "Execution time",
            format!("{} ms", outcome.metrics.execution_time_ms),
        ));
    if !outcome.logs.is_empty() {
        feedback = feedback.with_detail(FeedbackDetail::text(
            "Console",
            format!("{} entries", outcome.logs.len()),
        ));
    }

    if outcome.success {
        let result = outcome.result.unwrap_or(Value::Null);
        ctx.set_feedback(
            &node.id,
            feedback.with_output_summary(preview(&result, 120)),
        )
        .await;
        Ok(result)
    } else {
        let failure = outcome.error.unwrap_or_else(|| {
            orchid_sandbox::CodeFailure {
                code: "EXECUTION_ERROR".to_string(),
                message: "code execution failed".to_string(),
            }
        });
        ctx.set_feedback(&node.id, feedback.with_output_summary(failure.message.clone()))
            .await;
        Err(failure.into_error())
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

    async fn setup() -> (Arc<ExecutionContext>, Arc<Services>) {
        let ctx = Arc::new(ExecutionContext::new(
            "wf",
            &["code".to_string()],
            Map::new(),
            Value::Null,
            CancellationToken::new(),
            RunCallbacks::default(),
        ));
        let services = Services::initialize(EngineConfig::default()).await;
        (ctx, services)
    }

    #[tokio::test]
    async fn code_sees_input_and_variables() {
        let (ctx, services) = setup().await;
        ctx.set_variable("suffix", json!("!")).await;
        let node = Node::new("code", NodeKind::Code, json!({}));
        let data = json!({ "code": "return input + variables.suffix;" });

        let out = execute(&node, &data, json!("hey"), &ctx, &services)
            .await
            .unwrap();
        assert_eq!(out, json!("hey!"));
    }

    #[tokio::test]
    async fn denylisted_code_raises_typed_error() {
        let (ctx, services) = setup().await;
        let node = Node::new("code", NodeKind::Code, json!({}));
        let data = json!({ "code": "return eval('1');" });

        let err = execute(&node, &data, Value::Null, &ctx, &services)
            .await
            .unwrap_err();
        assert_eq!(err.code(), "DENYLISTED_CONSTRUCT");
    }

    #[tokio::test]
    async fn console_output_lands_in_run_logs() {
        let (ctx, services) = setup().await;
        let node = Node::new("code", NodeKind::Code, json!({}));
        let data = json!({ "code": "console.log('traced'); return 1;" });

        execute(&node, &data, Value::Null, &ctx, &services)
            .await
            .unwrap();
        let logs = ctx.logs_snapshot().await;
        assert!(logs.iter().any(|l| l.message.contains("traced")));
    }
}
