//! Engine configuration
//!
//! Environment-driven with programmatic overrides. Nothing here is
//! required for offline runs; the collaborator base URL only matters for
//! nodes that call out (knowledge, subworkflow fetch, media generation,
//! workspace AI config).

use std::path::PathBuf;

/// Environment variable naming the workspace files root
pub const WORKSPACE_FILES_PATH_VAR: &str = "WORKSPACE_FILES_PATH";

/// Environment variable naming the collaborator API base URL
pub const API_BASE_VAR: &str = "ORCHID_API_BASE";

/// Configuration for an engine instance
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Base URL of the collaborator backend, if any
    pub api_base: Option<String>,
    /// Root directory for the per-workspace file sandbox
    pub workspace_files_root: PathBuf,
    /// Workspace the run belongs to, used for workspace-scoped lookups
    pub workspace_id: Option<String>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            api_base: None,
            workspace_files_root: PathBuf::from("./workspace-files"),
            workspace_id: None,
        }
    }
}

impl EngineConfig {
    /// Build a config from the process environment
    pub fn from_env() -> Self {
        Self {
            api_base: std::env::var(API_BASE_VAR).ok().filter(|v| !v.is_empty()),
            workspace_files_root: std::env::var(WORKSPACE_FILES_PATH_VAR)
                .ok()
                .filter(|v| !v.is_empty())
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("./workspace-files")),
            workspace_id: None,
        }
    }

    pub fn with_api_base(mut self, base: impl Into<String>) -> Self {
        self.api_base = Some(base.into());
        self
    }

    pub fn with_workspace_files_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.workspace_files_root = root.into();
        self
    }

    pub fn with_workspace_id(mut self, id: impl Into<String>) -> Self {
        self.workspace_id = Some(id.into());
        self
    }
}
