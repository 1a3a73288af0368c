//! Per-node-type executors
//!
//! Every executor has the same shape: `(node, resolved data, input,
//! context, services) -> output`. The returned value is exactly what
//! downstream nodes receive as their input. Failures propagate to the
//! scheduler, which marks the node and the run.

pub mod ai;
pub mod basic;
pub mod code;
pub mod condition;
pub mod flow;
pub mod http;
pub mod knowledge;
pub mod media;
pub mod subworkflow;
pub mod tool;
pub mod transform;

use orchid_core::{Error, Result};
use serde_json::Value;
use std::sync::Arc;

use crate::context::ExecutionContext;
use crate::graph::{Node, NodeKind};
use crate::services::{MediaKind, Services};

/// Dispatch a node to its executor
pub async fn execute(
    node: &Node,
    data: &Value,
    input: Value,
    ctx: &Arc<ExecutionContext>,
    services: &Arc<Services>,
    depth: usize,
) -> Result<Value> {
    match node.kind {
        NodeKind::Start => basic::start(input, ctx).await,
        NodeKind::End => basic::end(input, ctx).await,
        NodeKind::Trigger => basic::trigger(input, ctx).await,
        NodeKind::Input => basic::input(data, input, ctx).await,
        NodeKind::Output => basic::output(data, input, ctx).await,
        NodeKind::Variable => basic::variable(node, data, input, ctx).await,
        NodeKind::Condition => condition::execute(node, data, input, ctx).await,
        NodeKind::Code => code::execute(node, data, input, ctx, services).await,
        NodeKind::Ai => ai::execute(node, data, input, ctx, services).await,
        NodeKind::Knowledge => knowledge::execute(node, data, input, ctx, services).await,
        NodeKind::Mcp => tool::execute(node, data, input, ctx, services).await,
        NodeKind::Http => http::execute(node, data, input, ctx, services).await,
        NodeKind::Transform => transform::execute(node, data, input, ctx, services).await,
        NodeKind::Delay => flow::delay(node, data, input, ctx).await,
        NodeKind::Loop => flow::run_loop(node, data, input, ctx, services).await,
        NodeKind::Parallel => flow::parallel(node, data, input).await,
        NodeKind::Merge => flow::merge(node, data, input).await,
        NodeKind::Subworkflow => subworkflow::execute(node, data, input, ctx, services, depth).await,
        NodeKind::ImageGen => media::execute(node, data, input, ctx, services, MediaKind::Image).await,
        NodeKind::VideoGen => media::execute(node, data, input, ctx, services, MediaKind::Video).await,
        NodeKind::AudioTts => media::execute(node, data, input, ctx, services, MediaKind::Audio).await,
        NodeKind::Unknown => Err(Error::UnknownNodeType(node.id.clone())),
    }
}

// ---- shared helpers ----

/// String field from node data
pub(crate) fn str_field<'a>(data: &'a Value, key: &str) -> Option<&'a str> {
    data.get(key).and_then(Value::as_str).filter(|s| !s.is_empty())
}

pub(crate) fn u64_field(data: &Value, key: &str) -> Option<u64> {
    data.get(key).and_then(Value::as_u64)
}

pub(crate) fn f64_field(data: &Value, key: &str) -> Option<f64> {
    data.get(key).and_then(Value::as_f64)
}

/// JavaScript-style truthiness over JSON values
pub(crate) fn truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map(|f| f != 0.0).unwrap_or(true),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

/// Plain-text rendering of a value (strings unquoted)
pub(crate) fn value_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// Short preview of a value for feedback summaries
pub(crate) fn preview(value: &Value, max_chars: usize) -> String {
    let text = value_text(value);
    if text.chars().count() <= max_chars {
        text
    } else {
        let cut: String = text.chars().take(max_chars).collect();
        format!("{}…", cut)
    }
}
