//! Entry, exit, and variable plumbing nodes

use orchid_core::{Error, Result};
use serde_json::{json, Value};
use std::sync::Arc;

use super::str_field;
use crate::context::ExecutionContext;
use crate::graph::Node;

/// start: the run's entry payload
pub async fn start(input: Value, ctx: &Arc<ExecutionContext>) -> Result<Value> {
    if !input.is_null() {
        return Ok(input);
    }
    match ctx.get_variable("input").await {
        Some(value) if !value.is_null() => Ok(value),
        _ => Ok(json!({})),
    }
}

/// end: records the final output and passes it through
pub async fn end(input: Value, ctx: &Arc<ExecutionContext>) -> Result<Value> {
    ctx.set_variable("output", input.clone()).await;
    Ok(input)
}

/// trigger: like start, with an optional seeded trigger payload
pub async fn trigger(input: Value, ctx: &Arc<ExecutionContext>) -> Result<Value> {
    if !input.is_null() {
        return Ok(input);
    }
    match ctx.get_variable("triggerData").await {
        Some(value) if !value.is_null() => Ok(value),
        _ => Ok(json!({})),
    }
}

/// input: reads a named variable, falling back to the run input
pub async fn input(data: &Value, input: Value, ctx: &Arc<ExecutionContext>) -> Result<Value> {
    if let Some(name) = str_field(data, "variableName") {
        return Ok(ctx.get_variable(name).await.unwrap_or(Value::Null));
    }
    match ctx.get_variable("input").await {
        Some(value) if !value.is_null() => Ok(value),
        _ => Ok(input),
    }
}

/// output: writes the incoming value to a named variable
pub async fn output(data: &Value, input: Value, ctx: &Arc<ExecutionContext>) -> Result<Value> {
    if let Some(name) = str_field(data, "variableName") {
        ctx.set_variable(name, input.clone()).await;
    }
    Ok(input)
}

/// variable: explicit get/set on the run's variable scratch space
pub async fn variable(
    node: &Node,
    data: &Value,
    input: Value,
    ctx: &Arc<ExecutionContext>,
) -> Result<Value> {
    let name = str_field(data, "variableName")
        .or_else(|| str_field(data, "name"))
        .ok_or_else(|| {
            Error::config_missing(format!("variable node '{}' has no variable name", node.id))
        })?;

    match str_field(data, "operation").unwrap_or("get") {
        "set" => {
            let value = data
                .get("value")
                .filter(|v| !v.is_null())
                .cloned()
                .unwrap_or_else(|| input.clone());
            ctx.set_variable(name, value.clone()).await;
            Ok(value)
        }
        _ => Ok(ctx.get_variable(name).await.unwrap_or(input)),
    }
}
