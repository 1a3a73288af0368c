//! Google Gemini chat client
//!
//! ## API Endpoints
//!
//! | Endpoint | URL |
//! |----------|-----|
//! | Base URL | `https://generativelanguage.googleapis.com/v1beta` |
//! | Chat | `/models/{model}:generateContent?key={API_KEY}` |
//!
//! Authentication is a query parameter, not a header.

use orchid_core::{Error, Result, TokenUsage};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::provider::{AiConfig, ChatMessage, ChatOutcome};

/// Default API base when the config does not override it
pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

#[derive(Debug, Serialize)]
struct GenerateRequest {
    contents: Vec<Content>,
    #[serde(rename = "systemInstruction", skip_serializing_if = "Option::is_none")]
    system_instruction: Option<Content>,
    #[serde(rename = "generationConfig", skip_serializing_if = "Option::is_none")]
    generation_config: Option<GenerationConfig>,
}

#[derive(Debug, Serialize, Deserialize)]
struct Content {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    parts: Vec<Part>,
}

#[derive(Debug, Serialize, Deserialize)]
struct Part {
    text: String,
}

#[derive(Debug, Serialize)]
struct GenerationConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f64>,
    #[serde(rename = "maxOutputTokens", skip_serializing_if = "Option::is_none")]
    max_output_tokens: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    #[serde(rename = "usageMetadata", default)]
    usage_metadata: Option<UsageMetadata>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Content,
}

#[derive(Debug, Deserialize, Default)]
struct UsageMetadata {
    #[serde(rename = "promptTokenCount", default)]
    prompt_token_count: u64,
    #[serde(rename = "candidatesTokenCount", default)]
    candidates_token_count: u64,
    #[serde(rename = "totalTokenCount", default)]
    total_token_count: u64,
}

/// Send a chat request to the Gemini generateContent endpoint
///
/// Messages with role `system` become the system instruction; assistant
/// messages map to Gemini's `model` role.
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

    let mut system_instruction = None;
    let mut contents = Vec::new();
    for message in messages {
        match message.role.as_str() {
            "system" => {
                system_instruction = Some(Content {
                    role: None,
                    parts: vec![Part {
                        text: message.content.clone(),
                    }],
                });
            }
            role => {
                contents.push(Content {
                    role: Some(if role == "assistant" {
                        "model".to_string()
                    } else {
                        "user".to_string()
                    }),
                    parts: vec![Part {
                        text: message.content.clone(),
                    }],
                });
            }
        }
    }

    let generation_config = if config.temperature.is_some() || config.max_tokens.is_some() {
        Some(GenerationConfig {
            temperature: config.temperature,
            max_output_tokens: config.max_tokens,
        })
    } else {
        None
    };

    let base = config.base_url.as_deref().unwrap_or(DEFAULT_BASE_URL);
    let url = format!(
        "{}/models/{}:generateContent?key={}",
        base.trim_end_matches('/'),
        config.model,
        config.api_key
    );

    debug!(model = %config.model, "gemini chat request");

    let response = http
        .post(&url)
        .json(&GenerateRequest {
            contents,
            system_instruction,
            generation_config,
        })
        .send()
        .await?;

    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(Error::execution(format!(
            "gemini endpoint returned {}: {}",
            status,
            body.chars().take(500).collect::<String>()
        )));
    }

    let parsed: GenerateResponse = response.json().await?;

    let content = parsed
        .candidates
        .into_iter()
        .next()
        .map(|c| {
            c.content
                .parts
                .into_iter()
                .map(|p| p.text)
                .collect::<Vec<_>>()
                .join("")
        })
        .ok_or_else(|| Error::execution("gemini response contained no candidates"))?;

    let usage = parsed
        .usage_metadata
        .map(|u| TokenUsage {
            prompt_tokens: u.prompt_token_count,
            completion_tokens: u.candidates_token_count,
            total_tokens: if u.total_token_count > 0 {
                u.total_token_count
            } else {
                u.prompt_token_count + u.candidates_token_count
            },
        })
        .unwrap_or_default();

    Ok(ChatOutcome { content, usage })
}
