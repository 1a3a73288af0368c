//! AI chat clients for the orchid workflow engine
//!
//! Two wire protocols are supported:
//! - OpenAI-compatible `/chat/completions` (also covers most hosted and
//!   self-hosted gateways)
//! - Google Gemini `generateContent`
//!
//! `LlmClient::chat` routes between them based on the resolved provider
//! and model name.

pub mod gemini;
pub mod openai;
pub mod provider;

pub use provider::{AiConfig, ChatMessage, ChatOutcome, ProviderType};

use orchid_core::Result;

/// Chat client that routes to the protocol matching the config
#[derive(Clone, Default)]
pub struct LlmClient {
    http: reqwest::Client,
}

impl LlmClient {
    pub fn new() -> Self {
        Self {
            http: reqwest::Client::new(),
        }
    }

    pub fn with_http(http: reqwest::Client) -> Self {
        Self { http }
    }

    /// Send a chat request using the protocol implied by the config
    pub async fn chat(&self, config: &AiConfig, messages: &[ChatMessage]) -> Result<ChatOutcome> {
        if config.is_gemini() {
            gemini::chat(&self.http, config, messages).await
        } else {
            openai::chat(&self.http, config, messages).await
        }
    }
}
