//! OpenAI-compatible chat completion client
//!
//! Speaks the `/chat/completions` protocol used by OpenAI itself and by
//! most compatible gateways. The base URL is configurable per call.

use orchid_core::{Error, Result, TokenUsage};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::provider::{AiConfig, ChatMessage, ChatOutcome};

/// Default API base when the config does not override it
pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
    #[serde(default)]
    usage: Option<Usage>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Usage {
    #[serde(default)]
    prompt_tokens: u64,
    #[serde(default)]
    completion_tokens: u64,
    #[serde(default)]
    total_tokens: u64,
}

/// Send a chat request to an OpenAI-compatible endpoint
pub async fn chat(
    http: &reqwest::Client,
    config: &AiConfig,
    messages: &[ChatMessage],
) -> Result<ChatOutcome> {
    if config.api_key.is_empty() {
        return Err(Error::config_missing(format!(
            "no API key configured for provider '{}'",
            config.provider
        )));
    }

    let base = config.base_url.as_deref().unwrap_or(DEFAULT_BASE_URL);
    let url = format!("{}/chat/completions", base.trim_end_matches('/'));

    let request = ChatRequest {
        model: &config.model,
        messages,
        temperature: config.temperature,
        max_tokens: config.max_tokens,
    };

    debug!(model = %config.model, url = %url, "openai chat request");

    let response = http
        .post(&url)
        .bearer_auth(&config.api_key)
        .json(&request)
        .send()
        .await?;

    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(Error::execution(format!(
            "chat endpoint returned {}: {}",
            status,
            truncate(&body, 500)
        )));
    }

    let parsed: ChatResponse = response.json().await?;

    let content = parsed
        .choices
        .into_iter()
        .next()
        .and_then(|c| c.message.content)
        .ok_or_else(|| Error::execution("chat response contained no choices"))?;

    let usage = match parsed.usage {
        Some(u) if u.total_tokens > 0 => TokenUsage {
            prompt_tokens: u.prompt_tokens,
            completion_tokens: u.completion_tokens,
            total_tokens: u.total_tokens,
        },
        Some(u) => TokenUsage::new(u.prompt_tokens, u.completion_tokens),
        None => TokenUsage::default(),
    };

    Ok(ChatOutcome { content, usage })
}

fn truncate(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn missing_api_key_is_config_error() {
        let http = reqwest::Client::new();
        let config = AiConfig {
            provider: "openai".into(),
            model: "gpt-4o-mini".into(),
            ..Default::default()
        };
        let err = chat(&http, &config, &[ChatMessage::user("hi")])
            .await
            .unwrap_err();
        assert_eq!(err.code(), "CONFIG_MISSING");
    }

    #[test]
    fn request_omits_unset_fields() {
        let messages = vec![ChatMessage::user("hi")];
        let request = ChatRequest {
            model: "gpt-4o-mini",
            messages: &messages,
            temperature: None,
            max_tokens: None,
        };
        let json = serde_json::to_value(&request).unwrap();
        assert!(json.get("temperature").is_none());
        assert!(json.get("max_tokens").is_none());
    }
}
