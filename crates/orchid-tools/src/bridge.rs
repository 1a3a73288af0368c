//! Function-calling bridge
//!
//! Flattens every `(provider, tool)` pair into a function descriptor
//! named `{providerId}__{tool}` so an LLM can call registry tools, and
//! routes inbound calls back through the executor. Tool nodes and AI
//! function calls therefore share one validation and telemetry path.

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use crate::executor::{ToolCallRequest, ToolCallResponse, ToolExecutor};
use crate::registry::ToolRegistry;

/// Separator between provider id and tool name in a function name
pub const FUNCTION_NAME_SEPARATOR: &str = "__";

/// A JSON-Schema-flavoured function descriptor
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FunctionDescriptor {
    pub name: String,
    pub description: String,
    pub parameters: Value,
}

/// Descriptors for every active tool in the registry
pub async fn function_descriptors(registry: &ToolRegistry) -> Vec<FunctionDescriptor> {
    let mut descriptors = Vec::new();
    for provider in registry.get_all().await {
        for tool in &provider.tools {
            let mut properties = Map::new();
            let mut required = Vec::new();
            for param in &tool.parameters {
                let mut schema = Map::new();
                schema.insert("type".to_string(), json!(param.param_type));
                if !param.description.is_empty() {
                    schema.insert("description".to_string(), json!(param.description));
                }
                if let Some(allowed) = &param.allowed {
                    schema.insert("enum".to_string(), json!(allowed));
                }
                if let Some(default) = &param.default {
                    schema.insert("default".to_string(), default.clone());
                }
                properties.insert(param.name.clone(), Value::Object(schema));
                if param.required {
                    required.push(param.name.clone());
                }
            }

            descriptors.push(FunctionDescriptor {
                name: format!("{}{}{}", provider.id, FUNCTION_NAME_SEPARATOR, tool.name),
                description: tool.description.clone(),
                parameters: json!({
                    "type": "object",
                    "properties": properties,
                    "required": required,
                }),
            });
        }
    }
    descriptors
}

/// Split `providerId__tool` on the first separator
pub fn split_function_name(name: &str) -> Option<(&str, &str)> {
    name.split_once(FUNCTION_NAME_SEPARATOR)
        .filter(|(id, tool)| !id.is_empty() && !tool.is_empty())
}

/// Route an inbound function call through the shared executor
pub async fn dispatch_function_call(
    executor: &ToolExecutor,
    name: &str,
    arguments: Map<String, Value>,
) -> Option<ToolCallResponse> {
    let (tool_id, tool) = split_function_name(name)?;
    Some(
        executor
            .call(ToolCallRequest {
                tool_id: tool_id.to_string(),
                tool: tool.to_string(),
                params: arguments,
                context: None,
            })
            .await,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn split_takes_first_separator() {
        assert_eq!(
            split_function_name("web-search__search"),
            Some(("web-search", "search"))
        );
        assert_eq!(
            split_function_name("a__b__c"),
            Some(("a", "b__c"))
        );
        assert_eq!(split_function_name("no-separator"), None);
        assert_eq!(split_function_name("__tool"), None);
    }

    #[tokio::test]
    async fn descriptors_cover_every_tool() {
        let registry = ToolRegistry::new();
        registry.initialize().await;

        let descriptors = function_descriptors(&registry).await;
        let names: Vec<&str> = descriptors.iter().map(|d| d.name.as_str()).collect();
        assert!(names.contains(&"web-search__search"));
        assert!(names.contains(&"file-system__read"));
        assert!(names.contains(&"http__request"));

        let search = descriptors
            .iter()
            .find(|d| d.name == "web-search__search")
            .unwrap();
        assert_eq!(search.parameters["type"], "object");
        assert!(search.parameters["properties"]["query"].is_object());
        assert_eq!(search.parameters["required"][0], "query");
    }

    #[tokio::test]
    async fn dispatch_rejects_unsplittable_names() {
        let registry = Arc::new(ToolRegistry::new());
        let executor = ToolExecutor::new(registry);
        let response = dispatch_function_call(&executor, "plain", Map::new()).await;
        assert!(response.is_none());
    }
}
