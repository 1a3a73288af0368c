//! Condition node
//!
//! Evaluation is deliberately limited: literal `"true"/"1"` and
//! `"false"/"0"` short-circuit; every other condition string (including
//! expressions that mention `input`, parseable or not) evaluates to the
//! truthiness of the incoming value. The scheduler reads the returned
//! `branch` label to select outgoing edges.

use orchid_core::{Feedback, FeedbackDetail, Result};
use serde_json::{json, Value};
use std::sync::Arc;

use super::{preview, str_field, truthy};
use crate::context::ExecutionContext;
use crate::graph::Node;

pub async fn execute(
    node: &Node,
    data: &Value,
    input: Value,
    ctx: &Arc<ExecutionContext>,
) -> Result<Value> {
    let condition = str_field(data, "condition").unwrap_or("").trim().to_string();

    let result = match condition.as_str() {
        "true" | "1" => true,
        "false" | "0" => false,
        _ => truthy(&input),
    };
    let branch = if result { "true" } else { "false" };

    ctx.log_debug(
        Some(&node.id),
        &format!("condition '{}' took branch '{}'", condition, branch),
    )
    .await;
    ctx.set_feedback(
        &node.id,
        Feedback::new("Condition")
            .with_input_summary(preview(&input, 120))
            .with_output_summary(format!("branch: {}", branch))
            .with_detail(FeedbackDetail::code("Condition", condition.clone())),
    )
    .await;

    Ok(json!({ "value": input, "branch": branch }))
}
