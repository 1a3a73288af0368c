//! Workspace-scoped filesystem provider
//!
//! All operations resolve inside `{root}/{workspaceId}/files/`. Paths are
//! normalised lexically before use; anything that would escape the
//! sandbox root is rejected with `PATH_TRAVERSAL` before touching disk.

use async_trait::async_trait;
use orchid_core::{Error, Result};
use serde_json::{json, Map, Value};
use std::path::{Component, Path, PathBuf};
use tracing::debug;

use crate::executor::BuiltinHandler;

const DEFAULT_WORKSPACE: &str = "default";

pub struct FileSystemHandler {
    root: PathBuf,
}

impl FileSystemHandler {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    /// Resolve a user path inside the workspace sandbox
    fn resolve(&self, workspace_id: &str, path: &str) -> Result<PathBuf> {
        if workspace_id.contains('/') || workspace_id.contains("..") {
            return Err(Error::PathTraversal(workspace_id.to_string()));
        }

        let requested = Path::new(path);
        if requested.is_absolute() {
            return Err(Error::PathTraversal(path.to_string()));
        }

        let mut depth: i32 = 0;
        let mut normalized = PathBuf::new();
        for component in requested.components() {
            match component {
                Component::Normal(part) => {
                    depth += 1;
                    normalized.push(part);
                }
                Component::CurDir => {}
                Component::ParentDir => {
                    depth -= 1;
                    if depth < 0 {
                        return Err(Error::PathTraversal(path.to_string()));
                    }
                    normalized.pop();
                }
                Component::RootDir | Component::Prefix(_) => {
                    return Err(Error::PathTraversal(path.to_string()));
                }
            }
        }

        let sandbox = self.root.join(workspace_id).join("files");
        let resolved = sandbox.join(&normalized);
        if !resolved.starts_with(&sandbox) {
            return Err(Error::PathTraversal(path.to_string()));
        }
        Ok(resolved)
    }
}

#[async_trait]
impl BuiltinHandler for FileSystemHandler {
    async fn handle(&self, tool: &str, params: &Map<String, Value>) -> Result<Value> {
        let path = params
            .get("path")
            .and_then(Value::as_str)
            .ok_or_else(|| Error::missing_param("path"))?;
        let workspace_id = params
            .get("workspaceId")
            .and_then(Value::as_str)
            .unwrap_or(DEFAULT_WORKSPACE);

        let resolved = self.resolve(workspace_id, path)?;
        debug!(tool = %tool, path = %resolved.display(), "file system operation");

        match tool {
            "read" => {
                let content = tokio::fs::read_to_string(&resolved).await?;
                Ok(json!({ "path": path, "content": content }))
            }
            "write" => {
                let content = params
                    .get("content")
                    .and_then(Value::as_str)
                    .ok_or_else(|| Error::missing_param("content"))?;
                if let Some(parent) = resolved.parent() {
                    tokio::fs::create_dir_all(parent).await?;
                }
                tokio::fs::write(&resolved, content).await?;
                Ok(json!({ "path": path, "bytesWritten": content.len() }))
            }
            "list" => {
                let mut entries = Vec::new();
                let mut dir = tokio::fs::read_dir(&resolved).await?;
                while let Some(entry) = dir.next_entry().await? {
                    let meta = entry.metadata().await?;
                    entries.push(json!({
                        "name": entry.file_name().to_string_lossy(),
                        "isDirectory": meta.is_dir(),
                        "size": meta.len(),
                    }));
                }
                Ok(json!({ "path": path, "entries": entries }))
            }
            "delete" => {
                let meta = tokio::fs::metadata(&resolved).await?;
                if meta.is_dir() {
                    tokio::fs::remove_dir_all(&resolved).await?;
                } else {
                    tokio::fs::remove_file(&resolved).await?;
                }
                Ok(json!({ "path": path, "deleted": true }))
            }
            "mkdir" => {
                tokio::fs::create_dir_all(&resolved).await?;
                Ok(json!({ "path": path, "created": true }))
            }
            other => Err(Error::tool_not_found(format!(
                "file-system has no tool '{}'",
                other
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn params(pairs: &[(&str, Value)]) -> Map<String, Value> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[tokio::test]
    async fn write_then_read_round_trip() {
        let dir = TempDir::new().unwrap();
        let handler = FileSystemHandler::new(dir.path().to_path_buf());

        let written = handler
            .handle(
                "write",
                &params(&[
                    ("path", json!("notes/hello.txt")),
                    ("content", json!("hi there")),
                ]),
            )
            .await
            .unwrap();
        assert_eq!(written["bytesWritten"], 8);

        let read = handler
            .handle("read", &params(&[("path", json!("notes/hello.txt"))]))
            .await
            .unwrap();
        assert_eq!(read["content"], "hi there");
    }

    #[tokio::test]
    async fn traversal_is_rejected() {
        let dir = TempDir::new().unwrap();
        let handler = FileSystemHandler::new(dir.path().to_path_buf());

        let err = handler
            .handle("read", &params(&[("path", json!("../../etc/passwd"))]))
            .await
            .unwrap_err();
        assert_eq!(err.code(), "PATH_TRAVERSAL");

        let err = handler
            .handle("read", &params(&[("path", json!("/etc/passwd"))]))
            .await
            .unwrap_err();
        assert_eq!(err.code(), "PATH_TRAVERSAL");

        // dot-dot below the sandbox that never escapes is fine
        let ok = handler
            .handle(
                "write",
                &params(&[("path", json!("a/../b.txt")), ("content", json!("x"))]),
            )
            .await;
        assert!(ok.is_ok());
    }

    #[tokio::test]
    async fn list_mkdir_delete() {
        let dir = TempDir::new().unwrap();
        let handler = FileSystemHandler::new(dir.path().to_path_buf());

        handler
            .handle("mkdir", &params(&[("path", json!("data"))]))
            .await
            .unwrap();
        handler
            .handle(
                "write",
                &params(&[("path", json!("data/a.txt")), ("content", json!("a"))]),
            )
            .await
            .unwrap();

        let listing = handler
            .handle("list", &params(&[("path", json!("data"))]))
            .await
            .unwrap();
        assert_eq!(listing["entries"].as_array().unwrap().len(), 1);

        let deleted = handler
            .handle("delete", &params(&[("path", json!("data"))]))
            .await
            .unwrap();
        assert_eq!(deleted["deleted"], true);

        let err = handler
            .handle("list", &params(&[("path", json!("data"))]))
            .await;
        assert!(err.is_err());
    }

    #[tokio::test]
    async fn workspaces_are_isolated() {
        let dir = TempDir::new().unwrap();
        let handler = FileSystemHandler::new(dir.path().to_path_buf());

        handler
            .handle(
                "write",
                &params(&[
                    ("path", json!("secret.txt")),
                    ("content", json!("w1")),
                    ("workspaceId", json!("ws1")),
                ]),
            )
            .await
            .unwrap();

        let err = handler
            .handle(
                "read",
                &params(&[
                    ("path", json!("secret.txt")),
                    ("workspaceId", json!("ws2")),
                ]),
            )
            .await;
        assert!(err.is_err());

        let err = handler
            .handle(
                "read",
                &params(&[
                    ("path", json!("secret.txt")),
                    ("workspaceId", json!("../ws1")),
                ]),
            )
            .await
            .unwrap_err();
        assert_eq!(err.code(), "PATH_TRAVERSAL");
    }
}
