//! Media generation nodes: image_gen, video_gen, audio_tts
//!
//! All three dispatch to the collaborator's generation endpoint for
//! their media family and return `{mediaUrl, ...params}`.

use orchid_core::{Error, Feedback, FeedbackDetail, FeedbackDetailKind, Result};
use serde_json::{json, Map, Value};
use std::sync::Arc;

use super::{preview, str_field, value_text};
use crate::context::ExecutionContext;
use crate::graph::Node;
use crate::services::{MediaKind, Services};

pub async fn execute(
    node: &Node,
    data: &Value,
    input: Value,
    ctx: &Arc<ExecutionContext>,
    services: &Arc<Services>,
    kind: MediaKind,
) -> Result<Value> {
    ctx.check_cancelled()?;

    // The prompt (or TTS text) comes from node config, falling back to
    // the incoming value.
    let prompt = str_field(data, "prompt")
        .or_else(|| str_field(data, "text"))
        .map(String::from)
        .unwrap_or_else(|| value_text(&input));
    if prompt.is_empty() {
        return Err(Error::config_missing(format!(
            "{} node '{}' has no prompt",
            kind.as_str(),
            node.id
        )));
    }

    let mut params = data.as_object().cloned().unwrap_or_default();
    params.insert("prompt".to_string(), Value::String(prompt.clone()));

    ctx.log_info(
        Some(&node.id),
        &format!("generating {} for prompt: {}", kind.as_str(), preview(&json!(prompt.clone()), 80)),
    )
    .await;

    let mut result = services
        .collaborator
        .generate_media(kind, &Value::Object(params))
        .await?;

    // Credentials ride the request but never the echoed output.
    if let Some(object) = result.as_object_mut() {
        object.remove("apiKey");
    }

    let media_url = result
        .get("mediaUrl")
        .and_then(Value::as_str)
        .unwrap_or("")
        .to_string();
    ctx.set_feedback(
        &node.id,
        Feedback::new(match kind {
            MediaKind::Image => "Image Generation",
            MediaKind::Video => "Video Generation",
            MediaKind::Audio => "Text To Speech",
        })
        .with_input_summary(preview(&json!(prompt), 120))
        .with_detail(FeedbackDetail {
            label: "Media URL".to_string(),
            value: media_url,
            kind: FeedbackDetailKind::Link,
        }),
    )
    .await;

    Ok(result)
}
