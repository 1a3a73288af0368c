//! Flow-control nodes: delay, loop, parallel split, merge

use orchid_core::{Error, Feedback, Result};
use orchid_sandbox::CodeRequest;
use serde_json::{json, Map, Value};
use std::sync::Arc;
use std::time::Duration;

use super::{str_field, u64_field, value_text};
use crate::context::ExecutionContext;
use crate::graph::Node;
use crate::services::Services;

/// Iteration caps for loop nodes
const MIN_LOOP_COUNT: u64 = 1;
const MAX_LOOP_COUNT: u64 = 100;

/// delay: suspend for `delay × unit`, observing cancellation
pub async fn delay(
    node: &Node,
    data: &Value,
    input: Value,
    ctx: &Arc<ExecutionContext>,
) -> Result<Value> {
    let amount = data
        .get("delay")
        .and_then(Value::as_f64)
        .filter(|n| *n >= 0.0)
        .unwrap_or(1.0);
    let millis = match str_field(data, "unit").unwrap_or("s") {
        "ms" => amount,
        "m" => amount * 60_000.0,
        _ => amount * 1_000.0,
    } as u64;

    ctx.log_debug(Some(&node.id), &format!("delaying {} ms", millis)).await;

    tokio::select! {
        _ = tokio::time::sleep(Duration::from_millis(millis)) => Ok(input),
        _ = ctx.cancel_token().cancelled() => Err(Error::Cancelled),
    }
}

/// loop: emit iteration descriptors; bodies are wired downstream
///
/// The node never drives downstream nodes itself. `count` is clamped to
/// [1, 100]; `while` re-evaluates its condition up to the same hard cap.
pub async fn run_loop(
    node: &Node,
    data: &Value,
    input: Value,
    ctx: &Arc<ExecutionContext>,
    services: &Arc<Services>,
) -> Result<Value> {
    let loop_type = str_field(data, "loopType").unwrap_or("count");

    let iterations: Vec<Value> = match loop_type {
        "foreach" => {
            let items = match &input {
                Value::Array(items) => items.clone(),
                other => vec![other.clone()],
            };
            items
                .into_iter()
                .take(MAX_LOOP_COUNT as usize)
                .enumerate()
                .map(|(index, item)| json!({ "index": index, "item": item }))
                .collect()
        }
        "while" => {
            let condition = str_field(data, "loopCondition").unwrap_or("false").to_string();
            evaluate_while(&condition, &input, ctx, services).await?
        }
        _ => {
            let count = u64_field(data, "loopCount")
                .unwrap_or(1)
                .clamp(MIN_LOOP_COUNT, MAX_LOOP_COUNT);
            (0..count)
                .map(|index| json!({ "index": index, "input": input.clone() }))
                .collect()
        }
    };

    let count = iterations.len();
    ctx.set_feedback(
        &node.id,
        Feedback::new("Loop").with_output_summary(format!("{} iterations ({})", count, loop_type)),
    )
    .await;

    Ok(json!({
        "iterations": iterations,
        "count": count,
        "originalInput": input,
    }))
}

/// Evaluate a while-loop condition in the sandbox, capped
async fn evaluate_while(
    condition: &str,
    input: &Value,
    ctx: &Arc<ExecutionContext>,
    services: &Arc<Services>,
) -> Result<Vec<Value>> {
    let body = if condition.contains("return") {
        condition.to_string()
    } else {
        format!("return ({});", condition)
    };
    let code = format!(
        "var __cond = function (input, index, variables) {{\n{}\n}};\n\
         var iterations = [];\n\
         for (var index = 0; index < {}; index++) {{\n\
             if (!__cond(input, index, variables)) break;\n\
             iterations.push({{ index: index, input: input }});\n\
         }}\n\
         return iterations;",
        body, MAX_LOOP_COUNT
    );

    let outcome = services
        .sandbox
        .run(CodeRequest {
            code,
            language: "javascript".to_string(),
            timeout_ms: None,
            input: input.clone(),
            variables: ctx.variables_snapshot().await,
        })
        .await;

    if outcome.success {
        match outcome.result {
            Some(Value::Array(items)) => Ok(items),
            _ => Ok(Vec::new()),
        }
    } else {
        Err(outcome
            .error
            .map(|f| f.into_error())
            .unwrap_or_else(|| Error::execution("loop condition failed")))
    }
}

/// parallel: emit the split marker; fan-out itself is authored as edges
pub async fn parallel(node: &Node, data: &Value, input: Value) -> Result<Value> {
    let branch_count = u64_field(data, "branchCount").unwrap_or(2).max(1) as usize;
    let merge_strategy = str_field(data, "mergeStrategy").unwrap_or("array").to_string();

    let branches: Vec<Value> = (0..branch_count)
        .map(|index| {
            json!({
                "input": input.clone(),
                "branchIndex": index,
                "branchId": format!("{}-branch-{}", node.id, index),
                "totalBranches": branch_count,
            })
        })
        .collect();

    Ok(json!({
        "branches": branches,
        "branchCount": branch_count,
        "mergeStrategy": merge_strategy,
        "isParallelSplit": true,
    }))
}

/// merge: combine an array input; anything else passes through unchanged
pub async fn merge(_node: &Node, data: &Value, input: Value) -> Result<Value> {
    let items = match input {
        Value::Array(items) => items,
        other => return Ok(other),
    };

    let strategy = str_field(data, "mergeStrategy").unwrap_or("array");
    let merged = match strategy {
        "object" => {
            let mut object = Map::new();
            for (index, item) in items.into_iter().enumerate() {
                match item {
                    Value::Object(map) => object.extend(map),
                    other => {
                        object.insert(index.to_string(), other);
                    }
                }
            }
            Value::Object(object)
        }
        "text" => Value::String(
            items
                .iter()
                .map(value_text)
                .collect::<Vec<_>>()
                .join("\n"),
        ),
        "first" => items.into_iter().next().unwrap_or(Value::Null),
        "last" => items.into_iter().next_back().unwrap_or(Value::Null),
        _ => Value::Array(items),
    };

    Ok(merged)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;
    use crate::graph::NodeKind;
    use orchid_core::RunCallbacks;
    use tokio_util::sync::CancellationToken;

    fn node(kind: NodeKind) -> Node {
        Node::new("n", kind, json!({}))
    }

    fn ctx() -> Arc<ExecutionContext> {
        Arc::new(ExecutionContext::new(
            "wf",
            &["n".to_string()],
            Map::new(),
            Value::Null,
            CancellationToken::new(),
            RunCallbacks::default(),
        ))
    }

    #[tokio::test]
    async fn count_loop_clamps_both_ends() {
        let ctx = ctx();
        let services = Services::initialize(EngineConfig::default()).await;
        let n = node(NodeKind::Loop);

        let zero = run_loop(
            &n,
            &json!({ "loopType": "count", "loopCount": 0 }),
            json!("x"),
            &ctx,
            &services,
        )
        .await
        .unwrap();
        assert_eq!(zero["count"], 1);

        let million = run_loop(
            &n,
            &json!({ "loopType": "count", "loopCount": 1_000_000 }),
            json!("x"),
            &ctx,
            &services,
        )
        .await
        .unwrap();
        assert_eq!(million["count"], 100);
        assert_eq!(million["originalInput"], "x");
        assert_eq!(million["iterations"].as_array().unwrap().len(), 100);
    }

    #[tokio::test]
    async fn foreach_loop_describes_items() {
        let ctx = ctx();
        let services = Services::initialize(EngineConfig::default()).await;
        let out = run_loop(
            &node(NodeKind::Loop),
            &json!({ "loopType": "foreach" }),
            json!(["a", "b"]),
            &ctx,
            &services,
        )
        .await
        .unwrap();
        assert_eq!(out["count"], 2);
        assert_eq!(out["iterations"][1]["item"], "b");
    }

    #[tokio::test]
    async fn while_loop_respects_condition_and_cap() {
        let ctx = ctx();
        let services = Services::initialize(EngineConfig::default()).await;
        let n = node(NodeKind::Loop);

        let bounded = run_loop(
            &n,
            &json!({ "loopType": "while", "loopCondition": "index < 3" }),
            json!(null),
            &ctx,
            &services,
        )
        .await
        .unwrap();
        assert_eq!(bounded["count"], 3);

        let capped = run_loop(
            &n,
            &json!({ "loopType": "while", "loopCondition": "true" }),
            json!(null),
            &ctx,
            &services,
        )
        .await
        .unwrap();
        assert_eq!(capped["count"], 100);
    }

    #[tokio::test]
    async fn parallel_emits_split_marker() {
        let out = parallel(
            &node(NodeKind::Parallel),
            &json!({ "branchCount": 3, "mergeStrategy": "text" }),
            json!("seed"),
        )
        .await
        .unwrap();
        assert_eq!(out["isParallelSplit"], true);
        assert_eq!(out["branchCount"], 3);
        let branches = out["branches"].as_array().unwrap();
        assert_eq!(branches.len(), 3);
        assert_eq!(branches[2]["branchIndex"], 2);
        assert_eq!(branches[2]["input"], "seed");
    }

    #[tokio::test]
    async fn merge_strategies() {
        let n = node(NodeKind::Merge);

        let array = merge(&n, &json!({ "mergeStrategy": "array" }), json!(["A", "B"]))
            .await
            .unwrap();
        assert_eq!(array, json!(["A", "B"]));

        let object = merge(
            &n,
            &json!({ "mergeStrategy": "object" }),
            json!([{ "a": 1 }, { "b": 2 }, 7]),
        )
        .await
        .unwrap();
        assert_eq!(object, json!({ "a": 1, "b": 2, "2": 7 }));

        let text = merge(&n, &json!({ "mergeStrategy": "text" }), json!(["x", 1]))
            .await
            .unwrap();
        assert_eq!(text, json!("x\n1"));

        let first = merge(&n, &json!({ "mergeStrategy": "first" }), json!([9, 8]))
            .await
            .unwrap();
        assert_eq!(first, json!(9));

        let last = merge(&n, &json!({ "mergeStrategy": "last" }), json!([9, 8]))
            .await
            .unwrap();
        assert_eq!(last, json!(8));
    }

    #[tokio::test]
    async fn merge_passes_non_arrays_through() {
        let out = merge(
            &node(NodeKind::Merge),
            &json!({ "mergeStrategy": "array" }),
            json!("single"),
        )
        .await
        .unwrap();
        assert_eq!(out, json!("single"));
    }

    #[tokio::test]
    async fn delay_is_cancellable() {
        let ctx = ctx();
        let n = node(NodeKind::Delay);
        let data = json!({ "delay": 5, "unit": "s" });

        let token = ctx.cancel_token().clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            token.cancel();
        });

        let started = std::time::Instant::now();
        let err = delay(&n, &data, json!(1), &ctx).await.unwrap_err();
        assert!(err.is_cancelled());
        assert!(started.elapsed() < Duration::from_secs(2));
    }

    #[tokio::test]
    async fn delay_passes_input_through() {
        let ctx = ctx();
        let out = delay(
            &node(NodeKind::Delay),
            &json!({ "delay": 5, "unit": "ms" }),
            json!("v"),
            &ctx,
        )
        .await
        .unwrap();
        assert_eq!(out, json!("v"));
    }
}
