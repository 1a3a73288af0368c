//! Provider types and chat message primitives

use orchid_core::TokenUsage;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Known provider families
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProviderType {
    OpenAi,
    Gemini,
}

impl fmt::Display for ProviderType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProviderType::OpenAi => write!(f, "openai"),
            ProviderType::Gemini => write!(f, "gemini"),
        }
    }
}

impl FromStr for ProviderType {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "openai" | "open_ai" | "openai-compatible" => Ok(ProviderType::OpenAi),
            "gemini" | "google" | "google-gemini" => Ok(ProviderType::Gemini),
            other => Err(format!("Unknown provider type: {}", other)),
        }
    }
}

/// Resolved configuration for a single AI call
///
/// Accepts both snake_case and the camelCase keys used by workspace
/// config payloads.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AiConfig {
    #[serde(default)]
    pub provider: String,
    #[serde(default)]
    pub model: String,
    #[serde(default, alias = "apiKey")]
    pub api_key: String,
    #[serde(default, alias = "baseUrl", skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    #[serde(default, alias = "maxTokens", skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u64>,
}

impl AiConfig {
    /// Whether this call should use the Gemini wire protocol
    ///
    /// Either the provider names Google/Gemini or the model id does; some
    /// gateways expose Gemini models under a generic provider name.
    pub fn is_gemini(&self) -> bool {
        let provider = self.provider.to_lowercase();
        provider.contains("gemini")
            || provider.contains("google")
            || self.model.to_lowercase().starts_with("gemini")
    }
}

/// Chat message
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: "assistant".to_string(),
            content: content.into(),
        }
    }
}

/// Result of a chat call: extracted content plus token accounting
#[derive(Debug, Clone, Default)]
pub struct ChatOutcome {
    pub content: String,
    pub usage: TokenUsage,
}
