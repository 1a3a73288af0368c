//! Sandboxed code execution provider
//!
//! Thin adapter over the sandbox runner so code is uniformly addressable
//! as a tool call.

use async_trait::async_trait;
use orchid_core::{Error, Result};
use orchid_sandbox::{CodeRequest, CodeRunner};
use serde_json::{Map, Value};

use crate::executor::BuiltinHandler;

pub struct CodeExecHandler {
    runner: CodeRunner,
}

impl CodeExecHandler {
    pub fn new() -> Self {
        Self {
            runner: CodeRunner::new(),
        }
    }

    pub fn with_runner(runner: CodeRunner) -> Self {
        Self { runner }
    }
}

impl Default for CodeExecHandler {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl BuiltinHandler for CodeExecHandler {
    async fn handle(&self, _tool: &str, params: &Map<String, Value>) -> Result<Value> {
        let code = params
            .get("code")
            .and_then(Value::as_str)
            .ok_or_else(|| Error::missing_param("code"))?;

        let request = CodeRequest {
            code: code.to_string(),
            language: params
                .get("language")
                .and_then(Value::as_str)
                .unwrap_or("javascript")
                .to_string(),
            timeout_ms: params.get("timeout").and_then(Value::as_u64),
            input: params.get("input").cloned().unwrap_or(Value::Null),
            variables: params
                .get("variables")
                .and_then(Value::as_object)
                .cloned()
                .unwrap_or_default(),
        };

        let outcome = self.runner.run(request).await;
        if outcome.success {
            Ok(serde_json::to_value(outcome)?)
        } else {
            Err(outcome
                .error
                .map(|f| f.into_error())
                .unwrap_or_else(|| Error::execution("code execution failed")))
        }
    }
}
