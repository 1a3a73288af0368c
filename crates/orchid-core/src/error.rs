//! Error types for orchid
//!
//! Every failure surfaced by the engine, the tool substrate, or the
//! sandbox maps to one of these variants. `Display` always leads with the
//! stable error code so run results and logs can be matched on it.

use thiserror::Error;

/// Main error type for orchid operations
#[derive(Error, Debug)]
pub enum Error {
    #[error("UNKNOWN_NODE_TYPE: unknown node type for node '{0}'")]
    UnknownNodeType(String),

    #[error("CYCLE_DETECTED: execution re-entered node '{0}'")]
    CycleDetected(String),

    #[error("TOOL_NOT_FOUND: {0}")]
    ToolNotFound(String),

    #[error("TOOL_INACTIVE: tool provider '{0}' is not active")]
    ToolInactive(String),

    #[error("MISSING_PARAM: required parameter '{0}' missing")]
    MissingParam(String),

    #[error("EXECUTION_ERROR: {0}")]
    Execution(String),

    #[error("TIMEOUT: {0}")]
    Timeout(String),

    #[error("UNSUPPORTED_LANGUAGE: {0}")]
    UnsupportedLanguage(String),

    #[error("DENYLISTED_CONSTRUCT: code contains forbidden construct '{0}'")]
    DenylistedConstruct(String),

    #[error("PATH_TRAVERSAL: path '{0}' escapes the workspace sandbox")]
    PathTraversal(String),

    #[error("CONFIG_MISSING: {0}")]
    ConfigMissing(String),

    #[error("CANCELLED: execution was cancelled")]
    Cancelled,

    #[error("NOT_IMPLEMENTED: {0}")]
    NotImplemented(String),

    #[error("EXECUTION_ERROR: http request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("EXECUTION_ERROR: serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("EXECUTION_ERROR: io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Create an execution error
    pub fn execution(msg: impl Into<String>) -> Self {
        Error::Execution(msg.into())
    }

    /// Create a tool-not-found error
    pub fn tool_not_found(msg: impl Into<String>) -> Self {
        Error::ToolNotFound(msg.into())
    }

    /// Create a missing-parameter error
    pub fn missing_param(name: impl Into<String>) -> Self {
        Error::MissingParam(name.into())
    }

    /// Create a timeout error
    pub fn timeout(msg: impl Into<String>) -> Self {
        Error::Timeout(msg.into())
    }

    /// Create a config-missing error
    pub fn config_missing(msg: impl Into<String>) -> Self {
        Error::ConfigMissing(msg.into())
    }

    /// Create a not-implemented error
    pub fn not_implemented(msg: impl Into<String>) -> Self {
        Error::NotImplemented(msg.into())
    }

    /// Stable machine-readable code for this error
    pub fn code(&self) -> &'static str {
        match self {
            Error::UnknownNodeType(_) => "UNKNOWN_NODE_TYPE",
            Error::CycleDetected(_) => "CYCLE_DETECTED",
            Error::ToolNotFound(_) => "TOOL_NOT_FOUND",
            Error::ToolInactive(_) => "TOOL_INACTIVE",
            Error::MissingParam(_) => "MISSING_PARAM",
            Error::Execution(_) => "EXECUTION_ERROR",
            Error::Timeout(_) => "TIMEOUT",
            Error::UnsupportedLanguage(_) => "UNSUPPORTED_LANGUAGE",
            Error::DenylistedConstruct(_) => "DENYLISTED_CONSTRUCT",
            Error::PathTraversal(_) => "PATH_TRAVERSAL",
            Error::ConfigMissing(_) => "CONFIG_MISSING",
            Error::Cancelled => "CANCELLED",
            Error::NotImplemented(_) => "NOT_IMPLEMENTED",
            Error::Http(_) | Error::Serialization(_) | Error::Io(_) => "EXECUTION_ERROR",
        }
    }

    /// Whether this error represents cooperative cancellation
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Error::Cancelled)
    }
}
