//! Tool provider descriptors
//!
//! A descriptor is the registry entry for one provider: a uniformly
//! addressed capability exposing one or more named tools, each with a
//! parameter schema. The transport discriminates how calls are
//! dispatched.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// How calls to a provider are dispatched
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ToolTransport {
    /// Compiled-in handler selected by provider id
    #[default]
    Builtin,
    /// JSON POST to `endpoint`
    Http,
    /// Reserved
    Stdio,
    /// Reserved
    Websocket,
}

/// Provider lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ToolStatus {
    #[default]
    Active,
    Inactive,
    Error,
    Loading,
}

/// One parameter of a tool
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParamSpec {
    pub name: String,
    #[serde(rename = "type")]
    pub param_type: String,
    #[serde(default)]
    pub required: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
    #[serde(rename = "enum", default, skip_serializing_if = "Option::is_none")]
    pub allowed: Option<Vec<String>>,
    #[serde(default)]
    pub description: String,
}

impl ParamSpec {
    pub fn required(name: &str, param_type: &str, description: &str) -> Self {
        Self {
            name: name.to_string(),
            param_type: param_type.to_string(),
            required: true,
            default: None,
            allowed: None,
            description: description.to_string(),
        }
    }

    pub fn optional(name: &str, param_type: &str, description: &str) -> Self {
        Self {
            name: name.to_string(),
            param_type: param_type.to_string(),
            required: false,
            default: None,
            allowed: None,
            description: description.to_string(),
        }
    }

    pub fn with_default(mut self, value: Value) -> Self {
        self.default = Some(value);
        self
    }

    pub fn with_allowed(mut self, values: &[&str]) -> Self {
        self.allowed = Some(values.iter().map(|v| v.to_string()).collect());
        self
    }
}

/// One named tool exposed by a provider
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolSpec {
    pub name: String,
    pub description: String,
    #[serde(default)]
    pub parameters: Vec<ParamSpec>,
}

impl ToolSpec {
    pub fn new(name: &str, description: &str) -> Self {
        Self {
            name: name.to_string(),
            description: description.to_string(),
            parameters: Vec::new(),
        }
    }

    pub fn with_param(mut self, param: ParamSpec) -> Self {
        self.parameters.push(param);
        self
    }
}

/// Capabilities a provider is allowed to use
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default)]
pub struct ToolPermissions {
    #[serde(default)]
    pub network: bool,
    #[serde(default)]
    pub filesystem: bool,
    #[serde(default)]
    pub exec: bool,
}

/// Usage statistics, updated by the executor after every call
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ToolStats {
    pub call_count: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_used: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avg_latency_ms: Option<f64>,
}

/// Registry entry for a tool provider
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDescriptor {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub tags: Vec<String>,
    pub tools: Vec<ToolSpec>,
    #[serde(default)]
    pub transport: ToolTransport,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,
    #[serde(default)]
    pub status: ToolStatus,
    #[serde(default)]
    pub permissions: ToolPermissions,
    #[serde(default)]
    pub stats: ToolStats,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ToolDescriptor {
    pub fn new(id: &str, name: &str, description: &str, transport: ToolTransport) -> Self {
        let now = Utc::now();
        Self {
            id: id.to_string(),
            name: name.to_string(),
            description: description.to_string(),
            tags: Vec::new(),
            tools: Vec::new(),
            transport,
            endpoint: None,
            status: ToolStatus::Active,
            permissions: ToolPermissions::default(),
            stats: ToolStats::default(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn builtin(id: &str, name: &str, description: &str) -> Self {
        Self::new(id, name, description, ToolTransport::Builtin)
    }

    pub fn with_tool(mut self, tool: ToolSpec) -> Self {
        self.tools.push(tool);
        self
    }

    pub fn with_tags(mut self, tags: &[&str]) -> Self {
        self.tags = tags.iter().map(|t| t.to_string()).collect();
        self
    }

    pub fn with_endpoint(mut self, endpoint: &str) -> Self {
        self.endpoint = Some(endpoint.to_string());
        self
    }

    pub fn with_permissions(mut self, permissions: ToolPermissions) -> Self {
        self.permissions = permissions;
        self
    }

    /// Find a tool by name
    pub fn tool(&self, name: &str) -> Option<&ToolSpec> {
        self.tools.iter().find(|t| t.name == name)
    }
}
