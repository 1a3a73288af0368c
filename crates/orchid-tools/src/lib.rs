//! Tool substrate for the orchid workflow engine
//!
//! - `descriptor`: tool provider metadata (tools, parameter schemas,
//!   transport, permissions, stats)
//! - `registry`: process-wide catalogue, mutated only through
//!   register/unregister
//! - `executor`: the single validation + dispatch path shared by tool
//!   nodes and AI function calling
//! - `builtin`: compiled-in providers (web-search, file-system,
//!   code-exec, http)
//! - `bridge`: conversion to function-calling descriptors and inbound
//!   call routing

pub mod bridge;
pub mod builtin;
pub mod descriptor;
pub mod executor;
pub mod registry;

pub use descriptor::{
    ParamSpec, ToolDescriptor, ToolPermissions, ToolSpec, ToolStats, ToolStatus, ToolTransport,
};
pub use executor::{
    BuiltinHandler, CallMetadata, ToolCallRequest, ToolCallResponse, ToolError, ToolExecutor,
};
pub use registry::ToolRegistry;
