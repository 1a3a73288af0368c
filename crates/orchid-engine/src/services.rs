//! Collaborator services and the shared service bundle
//!
//! The engine consumes a handful of backend endpoints owned by external
//! collaborators: workspace AI config, knowledge (RAG) queries, stored
//! workflow documents for sub-workflow nodes, and media generation. All
//! of them hang off one configured base URL; an engine without a base
//! URL simply fails those node types with `CONFIG_MISSING`.

use orchid_core::{Error, Result};
use orchid_llm::{AiConfig, LlmClient};
use orchid_sandbox::CodeRunner;
use orchid_tools::{builtin, ToolExecutor, ToolRegistry};
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use crate::config::EngineConfig;
use crate::graph::{Edge, Node};

/// Media generation families
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    Image,
    Video,
    Audio,
}

impl MediaKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MediaKind::Image => "image",
            MediaKind::Video => "video",
            MediaKind::Audio => "audio",
        }
    }
}

/// A stored workflow document fetched for a sub-workflow node
#[derive(Debug, Clone, Deserialize)]
pub struct WorkflowDocument {
    #[serde(default)]
    pub name: String,
    pub nodes: Vec<Node>,
    pub edges: Vec<Edge>,
}

/// Response of a knowledge query
#[derive(Debug, Clone, Deserialize, Default)]
pub struct KnowledgeResponse {
    #[serde(default)]
    pub results: Vec<Value>,
    #[serde(default)]
    pub context: Option<String>,
}

/// HTTP client over the collaborator backend
#[derive(Clone)]
pub struct CollaboratorClient {
    http: reqwest::Client,
    api_base: Option<String>,
}

impl CollaboratorClient {
    pub fn new(api_base: Option<String>) -> Self {
        Self {
            http: reqwest::Client::builder()
                .timeout(Duration::from_secs(60))
                .build()
                .unwrap_or_default(),
            api_base,
        }
    }

    fn base(&self) -> Result<&str> {
        self.api_base
            .as_deref()
            .ok_or_else(|| Error::config_missing("no collaborator API base configured"))
    }

    /// Active AI config for a workspace
    pub async fn active_ai_config(&self, workspace_id: &str) -> Result<AiConfig> {
        let url = format!(
            "{}/workspace-config/{}/ai/active",
            self.base()?,
            workspace_id
        );
        debug!(url = %url, "fetching workspace AI config");

        #[derive(Deserialize)]
        struct Envelope {
            config: AiConfig,
        }

        let envelope: Envelope = self
            .http
            .get(&url)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok(envelope.config)
    }

    /// Query the workspace knowledge base
    pub async fn query_knowledge(
        &self,
        workspace_id: &str,
        request: &Value,
    ) -> Result<KnowledgeResponse> {
        let url = format!("{}/knowledge/{}/query", self.base()?, workspace_id);
        debug!(url = %url, "knowledge query");

        let response = self
            .http
            .post(&url)
            .json(request)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok(response)
    }

    /// Fetch a stored workflow by id
    pub async fn fetch_workflow(&self, workflow_id: &str) -> Result<WorkflowDocument> {
        let url = format!("{}/workflows/{}", self.base()?, workflow_id);
        debug!(url = %url, "fetching workflow document");

        let document = self
            .http
            .get(&url)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok(document)
    }

    /// Dispatch a media generation request, returning `{mediaUrl, ...}`
    pub async fn generate_media(&self, kind: MediaKind, params: &Value) -> Result<Value> {
        let url = format!("{}/generate/{}", self.base()?, kind.as_str());
        debug!(url = %url, "media generation request");

        let response: Value = self
            .http
            .post(&url)
            .json(params)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        // Echo the request parameters alongside the generated URL.
        let mut merged = params.as_object().cloned().unwrap_or_default();
        if let Some(object) = response.as_object() {
            for (key, value) in object {
                merged.insert(key.clone(), value.clone());
            }
        }
        if !merged.contains_key("mediaUrl") {
            if let Some(url) = response.as_str() {
                merged.insert("mediaUrl".to_string(), json!(url));
            }
        }
        Ok(Value::Object(merged))
    }
}

/// Everything node executors need beyond the run context
pub struct Services {
    pub config: EngineConfig,
    pub llm: LlmClient,
    pub sandbox: CodeRunner,
    pub tools: Arc<ToolExecutor>,
    pub collaborator: CollaboratorClient,
}

impl Services {
    /// Build the default service bundle: seeded registry, builtin tool
    /// handlers, shared LLM client, sandbox runner
    pub async fn initialize(config: EngineConfig) -> Arc<Self> {
        let registry = Arc::new(ToolRegistry::new());
        registry.initialize().await;

        let tools = Arc::new(ToolExecutor::new(registry));
        builtin::bind_default_handlers(&tools, config.workspace_files_root.clone()).await;

        let collaborator = CollaboratorClient::new(config.api_base.clone());

        Arc::new(Self {
            config,
            llm: LlmClient::new(),
            sandbox: CodeRunner::new(),
            tools,
            collaborator,
        })
    }

    /// Service bundle around an existing executor (tests, embedding)
    pub fn with_tools(config: EngineConfig, tools: Arc<ToolExecutor>) -> Arc<Self> {
        let collaborator = CollaboratorClient::new(config.api_base.clone());
        Arc::new(Self {
            config,
            llm: LlmClient::new(),
            sandbox: CodeRunner::new(),
            tools,
            collaborator,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn missing_base_url_is_config_missing() {
        let client = CollaboratorClient::new(None);
        let err = client.fetch_workflow("wf-1").await.unwrap_err();
        assert_eq!(err.code(), "CONFIG_MISSING");

        let err = client
            .query_knowledge("ws", &json!({ "query": "q" }))
            .await
            .unwrap_err();
        assert_eq!(err.code(), "CONFIG_MISSING");
    }

    #[tokio::test]
    async fn initialize_seeds_builtin_tools() {
        let services = Services::initialize(EngineConfig::default()).await;
        let all = services.tools.registry().get_all().await;
        assert!(all.iter().any(|d| d.id == "web-search"));
        assert!(all.iter().any(|d| d.id == "code-exec"));
    }
}
