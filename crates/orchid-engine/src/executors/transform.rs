//! Transform node
//!
//! Pure functions of the incoming value. `filter` and `map` evaluate the
//! user's expression body through the sandbox as a function of
//! `(item, index)`.

use orchid_core::{Error, Result};
use orchid_sandbox::CodeRequest;
use serde_json::{json, Map, Value};
use std::sync::Arc;

use super::{str_field, value_text};
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
    let transform_type = str_field(data, "transformType").unwrap_or("json");

    match transform_type {
        "json" => to_json(input),
        "text" => Ok(Value::String(value_text(&input))),
        "split" => Ok(split(data, input)),
        "merge" => Ok(merge_text(data, input)),
        "filter" | "map" => {
            per_item(node, data, input, ctx, services, transform_type).await
        }
        other => Err(Error::execution(format!(
            "unknown transform type '{}'",
            other
        ))),
    }
}

/// Parse string input as JSON; structured input passes through
fn to_json(input: Value) -> Result<Value> {
    match input {
        Value::String(text) => serde_json::from_str(&text)
            .map_err(|e| Error::execution(format!("input is not valid JSON: {}", e))),
        other => Ok(other),
    }
}

fn separator(data: &Value) -> String {
    str_field(data, "separator").unwrap_or("\n").to_string()
}

/// Split string input into an array of trimmed, non-empty parts
fn split(data: &Value, input: Value) -> Value {
    let sep = separator(data);
    let text = value_text(&input);
    Value::Array(
        text.split(sep.as_str())
            .map(str::trim)
            .filter(|part| !part.is_empty())
            .map(|part| Value::String(part.to_string()))
            .collect(),
    )
}

/// Join array input into one string
fn merge_text(data: &Value, input: Value) -> Value {
    match input {
        Value::Array(items) => {
            let sep = separator(data);
            Value::String(
                items
                    .iter()
                    .map(value_text)
                    .collect::<Vec<_>>()
                    .join(&sep),
            )
        }
        other => other,
    }
}

/// filter/map over array input using the user's expression
async fn per_item(
    node: &Node,
    data: &Value,
    input: Value,
    ctx: &Arc<ExecutionContext>,
    services: &Arc<Services>,
    kind: &str,
) -> Result<Value> {
    let items = match input {
        Value::Array(items) => items,
        other => return Ok(other),
    };
    let expression = str_field(data, "expression").unwrap_or("item").to_string();

    // Expressions without an explicit return are wrapped as one.
    let body = if expression.contains("return") {
        expression
    } else {
        format!("return ({});", expression)
    };

    let code = format!(
        "var __fn = function (item, index) {{\n{}\n}};\nreturn input.{}(__fn);",
        body, kind
    );

    let outcome = services
        .sandbox
        .run(CodeRequest {
            code,
            language: "javascript".to_string(),
            timeout_ms: None,
            input: Value::Array(items),
            variables: Map::new(),
        })
        .await;

    if outcome.success {
        Ok(outcome.result.unwrap_or(Value::Null))
    } else {
        let failure = outcome
            .error
            .map(|f| f.into_error())
            .unwrap_or_else(|| Error::execution("transform expression failed"));
        ctx.log_warn(Some(&node.id), &format!("transform failed: {}", failure))
            .await;
        Err(failure)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;
    use crate::graph::NodeKind;
    use orchid_core::RunCallbacks;
    use tokio_util::sync::CancellationToken;

    async fn setup() -> (Arc<ExecutionContext>, Arc<Services>, Node) {
        let ctx = Arc::new(ExecutionContext::new(
            "wf",
            &["t".to_string()],
            Map::new(),
            Value::Null,
            CancellationToken::new(),
            RunCallbacks::default(),
        ));
        let services = Services::initialize(EngineConfig::default()).await;
        let node = Node::new("t", NodeKind::Transform, json!({}));
        (ctx, services, node)
    }

    #[tokio::test]
    async fn json_parses_strings_and_passes_structures() {
        let (ctx, services, node) = setup().await;
        let data = json!({ "transformType": "json" });
        let parsed = execute(&node, &data, json!("{\"a\":1}"), &ctx, &services)
            .await
            .unwrap();
        assert_eq!(parsed, json!({ "a": 1 }));

        let passthrough = execute(&node, &data, json!([1, 2]), &ctx, &services)
            .await
            .unwrap();
        assert_eq!(passthrough, json!([1, 2]));

        let err = execute(&node, &data, json!("not json"), &ctx, &services)
            .await
            .unwrap_err();
        assert_eq!(err.code(), "EXECUTION_ERROR");
    }

    #[tokio::test]
    async fn text_stringifies() {
        let (ctx, services, node) = setup().await;
        let data = json!({ "transformType": "text" });
        let out = execute(&node, &data, json!({ "a": 1 }), &ctx, &services)
            .await
            .unwrap();
        assert_eq!(out, json!("{\"a\":1}"));
    }

    #[tokio::test]
    async fn split_and_merge_round_trip() {
        let (ctx, services, node) = setup().await;
        let split = execute(
            &node,
            &json!({ "transformType": "split", "separator": "," }),
            json!("a, b, c"),
            &ctx,
            &services,
        )
        .await
        .unwrap();
        assert_eq!(split, json!(["a", "b", "c"]));

        let merged = execute(
            &node,
            &json!({ "transformType": "merge", "separator": "-" }),
            split,
            &ctx,
            &services,
        )
        .await
        .unwrap();
        assert_eq!(merged, json!("a-b-c"));
    }

    #[tokio::test]
    async fn filter_evaluates_expression_per_item() {
        let (ctx, services, node) = setup().await;
        let data = json!({ "transformType": "filter", "expression": "item > 2" });
        let out = execute(&node, &data, json!([1, 2, 3, 4]), &ctx, &services)
            .await
            .unwrap();
        assert_eq!(out, json!([3, 4]));
    }

    #[tokio::test]
    async fn map_receives_item_and_index() {
        let (ctx, services, node) = setup().await;
        let data = json!({ "transformType": "map", "expression": "item * 10 + index" });
        let out = execute(&node, &data, json!([1, 2]), &ctx, &services)
            .await
            .unwrap();
        assert_eq!(out, json!([10, 21]));
    }

    #[tokio::test]
    async fn per_item_passes_non_arrays_through() {
        let (ctx, services, node) = setup().await;
        let data = json!({ "transformType": "map", "expression": "item" });
        let out = execute(&node, &data, json!("scalar"), &ctx, &services)
            .await
            .unwrap();
        assert_eq!(out, json!("scalar"));
    }
}
