//! Compiled-in tool providers
//!
//! Four providers ship with the engine: web search, a workspace-scoped
//! filesystem, sandboxed code execution, and a generic HTTP client. Each
//! has a descriptor seeded by the registry and a handler bound to the
//! executor under the same id.

mod code_exec;
mod file_system;
mod http;
mod web_search;

pub use code_exec::CodeExecHandler;
pub use file_system::FileSystemHandler;
pub use http::HttpRequestHandler;
pub use web_search::WebSearchHandler;

use std::path::PathBuf;
use std::sync::Arc;

use crate::descriptor::{ParamSpec, ToolDescriptor, ToolPermissions, ToolSpec};
use crate::executor::ToolExecutor;

/// Descriptors for all builtin providers
pub fn descriptors() -> Vec<ToolDescriptor> {
    vec![
        web_search_descriptor(),
        file_system_descriptor(),
        code_exec_descriptor(),
        http_descriptor(),
    ]
}

/// Bind the default handlers for every builtin provider
pub async fn bind_default_handlers(executor: &ToolExecutor, workspace_files_root: PathBuf) {
    executor
        .register_handler("web-search", Arc::new(WebSearchHandler::new()))
        .await;
    executor
        .register_handler(
            "file-system",
            Arc::new(FileSystemHandler::new(workspace_files_root)),
        )
        .await;
    executor
        .register_handler("code-exec", Arc::new(CodeExecHandler::new()))
        .await;
    executor
        .register_handler("http", Arc::new(HttpRequestHandler::new()))
        .await;
}

fn web_search_descriptor() -> ToolDescriptor {
    ToolDescriptor::builtin("web-search", "Web Search", "Search the web for current information")
        .with_tags(&["search", "web", "research"])
        .with_permissions(ToolPermissions {
            network: true,
            ..Default::default()
        })
        .with_tool(
            ToolSpec::new("search", "Run a web search and return ranked results")
                .with_param(ParamSpec::required("query", "string", "Search query"))
                .with_param(
                    ParamSpec::optional("engine", "string", "Search engine to use")
                        .with_default(serde_json::json!("duckduckgo"))
                        .with_allowed(&["duckduckgo", "google", "bing"]),
                )
                .with_param(
                    ParamSpec::optional("limit", "number", "Maximum number of results")
                        .with_default(serde_json::json!(5)),
                ),
        )
}

fn file_system_descriptor() -> ToolDescriptor {
    let path = ParamSpec::required("path", "string", "Path relative to the workspace files root");
    ToolDescriptor::builtin(
        "file-system",
        "File System",
        "Read and write files inside the workspace sandbox",
    )
    .with_tags(&["files", "storage"])
    .with_permissions(ToolPermissions {
        filesystem: true,
        ..Default::default()
    })
    .with_tool(ToolSpec::new("read", "Read a file").with_param(path.clone()))
    .with_tool(
        ToolSpec::new("write", "Write a file")
            .with_param(path.clone())
            .with_param(ParamSpec::required("content", "string", "File content")),
    )
    .with_tool(ToolSpec::new("list", "List a directory").with_param(path.clone()))
    .with_tool(ToolSpec::new("delete", "Delete a file or directory").with_param(path.clone()))
    .with_tool(ToolSpec::new("mkdir", "Create a directory").with_param(path))
}

fn code_exec_descriptor() -> ToolDescriptor {
    ToolDescriptor::builtin(
        "code-exec",
        "Code Execution",
        "Run a JavaScript snippet in the sandbox",
    )
    .with_tags(&["code", "sandbox"])
    .with_permissions(ToolPermissions {
        exec: true,
        ..Default::default()
    })
    .with_tool(
        ToolSpec::new("run", "Execute a snippet and return its result")
            .with_param(ParamSpec::required("code", "string", "Source code"))
            .with_param(
                ParamSpec::optional("language", "string", "Language of the snippet")
                    .with_default(serde_json::json!("javascript")),
            )
            .with_param(ParamSpec::optional("timeout", "number", "Timeout in milliseconds"))
            .with_param(ParamSpec::optional("input", "object", "Value exposed as `input`")),
    )
}

fn http_descriptor() -> ToolDescriptor {
    ToolDescriptor::builtin("http", "HTTP Request", "Perform an HTTP request")
        .with_tags(&["http", "network"])
        .with_permissions(ToolPermissions {
            network: true,
            ..Default::default()
        })
        .with_tool(
            ToolSpec::new("request", "Send a request and decode the response")
                .with_param(ParamSpec::required("url", "string", "Request URL"))
                .with_param(
                    ParamSpec::optional("method", "string", "HTTP method")
                        .with_default(serde_json::json!("GET")),
                )
                .with_param(ParamSpec::optional("headers", "object", "Request headers"))
                .with_param(ParamSpec::optional("body", "object", "Request body")),
        )
}
