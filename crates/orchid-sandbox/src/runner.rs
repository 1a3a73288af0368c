//! Code runner: denylist screen, interpreter setup, timeout race
//!
//! The interpreter runs on a blocking thread raced against a tokio
//! timeout. Data crosses the boundary as JSON text in both directions so
//! the embedding surface stays small.

use boa_engine::{
    js_string, native_function::NativeFunction, Context, JsArgs, JsResult, JsValue, Source,
};
use orchid_core::Error;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::time::{Duration, Instant};
use tracing::{debug, warn};

use crate::denylist;

/// Longest a single `utils.sleep` call may block the sandbox thread
const MAX_SLEEP_MS: u64 = 1_000;

/// Interpreter loop iteration ceiling
const LOOP_ITERATION_LIMIT: u64 = 10_000_000;

/// Interpreter recursion ceiling
const RECURSION_LIMIT: usize = 512;

/// Runner configuration
#[derive(Debug, Clone)]
pub struct RunnerConfig {
    /// Hard ceiling applied to any requested timeout
    pub max_timeout_ms: u64,
    /// Timeout used when the request does not specify one
    pub default_timeout_ms: u64,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            max_timeout_ms: 30_000,
            default_timeout_ms: 5_000,
        }
    }
}

/// A code execution request
#[derive(Debug, Clone, Default)]
pub struct CodeRequest {
    pub code: String,
    /// Only `javascript` is supported
    pub language: String,
    pub timeout_ms: Option<u64>,
    /// Exposed to the snippet as `input`
    pub input: Value,
    /// Exposed to the snippet as `variables`
    pub variables: Map<String, Value>,
}

/// One captured `console.*` call
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CapturedLog {
    pub level: String,
    pub message: String,
}

/// Execution metrics
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct CodeMetrics {
    pub execution_time_ms: u64,
}

/// Failure details carrying a stable error code
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CodeFailure {
    pub code: String,
    pub message: String,
}

impl CodeFailure {
    fn new(code: &str, message: impl Into<String>) -> Self {
        Self {
            code: code.to_string(),
            message: message.into(),
        }
    }

    /// Convert into the engine error type
    pub fn into_error(self) -> Error {
        match self.code.as_str() {
            "TIMEOUT" => Error::Timeout(self.message),
            "UNSUPPORTED_LANGUAGE" => Error::UnsupportedLanguage(self.message),
            "DENYLISTED_CONSTRUCT" => Error::DenylistedConstruct(self.message),
            _ => Error::Execution(self.message),
        }
    }
}

/// Result of a code execution
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CodeOutcome {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(default)]
    pub logs: Vec<CapturedLog>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<CodeFailure>,
    pub metrics: CodeMetrics,
}

impl CodeOutcome {
    fn failure(failure: CodeFailure, logs: Vec<CapturedLog>, elapsed_ms: u64) -> Self {
        Self {
            success: false,
            result: None,
            logs,
            error: Some(failure),
            metrics: CodeMetrics {
                execution_time_ms: elapsed_ms,
            },
        }
    }
}

/// Sandboxed code runner
#[derive(Debug, Clone, Default)]
pub struct CodeRunner {
    config: RunnerConfig,
}

impl CodeRunner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: RunnerConfig) -> Self {
        Self { config }
    }

    /// Execute a snippet, screening it first and racing a timeout
    pub async fn run(&self, request: CodeRequest) -> CodeOutcome {
        let started = Instant::now();

        let language = if request.language.is_empty() {
            "javascript"
        } else {
            request.language.as_str()
        };
        if language != "javascript" && language != "js" {
            return CodeOutcome::failure(
                CodeFailure::new(
                    "UNSUPPORTED_LANGUAGE",
                    format!("language '{}' is not supported", language),
                ),
                Vec::new(),
                0,
            );
        }

        if let Some(token) = denylist::screen(&request.code) {
            warn!(construct = token, "rejected code snippet before execution");
            return CodeOutcome::failure(
                CodeFailure::new(
                    "DENYLISTED_CONSTRUCT",
                    format!("code contains forbidden construct '{}'", token),
                ),
                Vec::new(),
                0,
            );
        }

        let timeout_ms = request
            .timeout_ms
            .unwrap_or(self.config.default_timeout_ms)
            .clamp(1, self.config.max_timeout_ms);

        let code = request.code.clone();
        let input = request.input.clone();
        let variables = Value::Object(request.variables.clone());

        let task = tokio::task::spawn_blocking(move || execute_blocking(&code, &input, &variables));

        match tokio::time::timeout(Duration::from_millis(timeout_ms), task).await {
            Ok(Ok(Ok((result, logs)))) => {
                let elapsed = started.elapsed().as_millis() as u64;
                debug!(elapsed_ms = elapsed, "code snippet completed");
                CodeOutcome {
                    success: true,
                    result,
                    logs,
                    error: None,
                    metrics: CodeMetrics {
                        execution_time_ms: elapsed,
                    },
                }
            }
            Ok(Ok(Err((message, logs)))) => CodeOutcome::failure(
                CodeFailure::new("EXECUTION_ERROR", message),
                logs,
                started.elapsed().as_millis() as u64,
            ),
            Ok(Err(join_err)) => CodeOutcome::failure(
                CodeFailure::new("EXECUTION_ERROR", format!("sandbox worker died: {}", join_err)),
                Vec::new(),
                started.elapsed().as_millis() as u64,
            ),
            Err(_) => CodeOutcome::failure(
                CodeFailure::new(
                    "TIMEOUT",
                    format!("code execution exceeded {} ms", timeout_ms),
                ),
                Vec::new(),
                started.elapsed().as_millis() as u64,
            ),
        }
    }
}

/// `utils.sleep` backing: blocks the sandbox thread, clamped
fn sleep_native(_this: &JsValue, args: &[JsValue], context: &mut Context) -> JsResult<JsValue> {
    let ms = args.get_or_undefined(0).to_number(context)?;
    let ms = if ms.is_finite() && ms > 0.0 {
        (ms as u64).min(MAX_SLEEP_MS)
    } else {
        0
    };
    std::thread::sleep(Duration::from_millis(ms));
    Ok(JsValue::undefined())
}

/// Prelude installed before user code: captured console plus safe utils
const PRELUDE: &str = r#"
const __logs = [];
const __format = (args) => args.map((a) => {
    if (typeof a === "string") return a;
    try { return JSON.stringify(a); } catch (e) { return String(a); }
}).join(" ");
const console = {
    log: (...args) => __logs.push({ level: "log", message: __format(args) }),
    info: (...args) => __logs.push({ level: "info", message: __format(args) }),
    warn: (...args) => __logs.push({ level: "warn", message: __format(args) }),
    error: (...args) => __logs.push({ level: "error", message: __format(args) }),
};
const utils = {
    parseJSON: (text) => { try { return JSON.parse(text); } catch (e) { return null; } },
    stringify: (value) => JSON.stringify(value),
    sleep: (ms) => __sleep(ms),
    now: () => Date.now(),
};
"#;

type BlockingResult =
    std::result::Result<(Option<Value>, Vec<CapturedLog>), (String, Vec<CapturedLog>)>;

/// Run the interpreter to completion on the current thread
fn execute_blocking(code: &str, input: &Value, variables: &Value) -> BlockingResult {
    let mut context = Context::default();
    context.runtime_limits_mut().set_loop_iteration_limit(LOOP_ITERATION_LIMIT);
    context.runtime_limits_mut().set_recursion_limit(RECURSION_LIMIT);

    context
        .register_global_builtin_callable(
            js_string!("__sleep"),
            1,
            NativeFunction::from_fn_ptr(sleep_native),
        )
        .map_err(|e| (format!("sandbox setup failed: {}", e), Vec::new()))?;

    // Inject input/variables as parsed JSON so no user-controlled text is
    // ever spliced into source as code.
    let bindings = format!(
        "const input = JSON.parse({});\nconst variables = JSON.parse({});",
        json_literal(input),
        json_literal(variables)
    );
    let setup = format!("{}\n{}", PRELUDE, bindings);
    context
        .eval(Source::from_bytes(setup.as_bytes()))
        .map_err(|e| (format!("sandbox setup failed: {}", e), Vec::new()))?;

    let wrapped = format!(
        "var __result = (function (input, variables) {{\n{}\n}}).call(undefined, input, variables);",
        code
    );

    let run_error = context
        .eval(Source::from_bytes(wrapped.as_bytes()))
        .err()
        .map(|e| e.to_string());

    let logs = collect_logs(&mut context);

    if let Some(message) = run_error {
        return Err((message, logs));
    }

    let result = context
        .eval(Source::from_bytes(
            br#"JSON.stringify(typeof __result === "undefined" ? null : __result)"#,
        ))
        .map_err(|e| (format!("result extraction failed: {}", e), logs.clone()))?;

    // JSON.stringify returns undefined for bare functions/symbols.
    if result.is_undefined() {
        return Ok((None, logs));
    }

    let text = js_to_string(result, &mut context)
        .map_err(|e| (format!("result extraction failed: {}", e), logs.clone()))?;
    let value: Value = serde_json::from_str(&text)
        .map_err(|e| (format!("result was not valid JSON: {}", e), logs.clone()))?;

    Ok((Some(value), logs))
}

/// Pull the captured console entries back out of the interpreter
fn collect_logs(context: &mut Context) -> Vec<CapturedLog> {
    let extracted = context
        .eval(Source::from_bytes(b"JSON.stringify(__logs)"))
        .ok()
        .and_then(|v| js_to_string(v, context).ok())
        .and_then(|text| serde_json::from_str::<Vec<CapturedLog>>(&text).ok());
    extracted.unwrap_or_default()
}

fn js_to_string(value: JsValue, context: &mut Context) -> JsResult<String> {
    Ok(value.to_string(context)?.to_std_string_escaped())
}

/// Encode a JSON value as a JS string literal containing its JSON text
fn json_literal(value: &Value) -> String {
    let payload = serde_json::to_string(value).unwrap_or_else(|_| "null".to_string());
    serde_json::to_string(&payload).unwrap_or_else(|_| "\"null\"".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn request(code: &str, input: Value) -> CodeRequest {
        CodeRequest {
            code: code.to_string(),
            language: "javascript".to_string(),
            input,
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn returns_value_from_snippet() {
        let runner = CodeRunner::new();
        let outcome = runner
            .run(request("return input.toUpperCase();", json!("hi")))
            .await;
        assert!(outcome.success, "error: {:?}", outcome.error);
        assert_eq!(outcome.result, Some(json!("HI")));
    }

    #[tokio::test]
    async fn exposes_variables_and_console() {
        let runner = CodeRunner::new();
        let mut variables = Map::new();
        variables.insert("greeting".to_string(), json!("hello"));
        let outcome = runner
            .run(CodeRequest {
                code: "console.log('got', variables.greeting); return variables.greeting;"
                    .to_string(),
                language: "javascript".to_string(),
                variables,
                ..Default::default()
            })
            .await;
        assert!(outcome.success);
        assert_eq!(outcome.result, Some(json!("hello")));
        assert_eq!(outcome.logs.len(), 1);
        assert!(outcome.logs[0].message.contains("got"));
    }

    #[tokio::test]
    async fn rejects_denylisted_code_without_executing() {
        let runner = CodeRunner::new();
        let outcome = runner
            .run(request("return eval('6*7');", json!(null)))
            .await;
        assert!(!outcome.success);
        let failure = outcome.error.unwrap();
        assert_eq!(failure.code, "DENYLISTED_CONSTRUCT");
        assert_eq!(failure.into_error().code(), "DENYLISTED_CONSTRUCT");
    }

    #[tokio::test]
    async fn rejects_unsupported_language() {
        let runner = CodeRunner::new();
        let outcome = runner
            .run(CodeRequest {
                code: "print('hi')".to_string(),
                language: "python".to_string(),
                ..Default::default()
            })
            .await;
        assert!(!outcome.success);
        assert_eq!(outcome.error.unwrap().code, "UNSUPPORTED_LANGUAGE");
    }

    #[tokio::test]
    async fn runtime_errors_surface_with_logs() {
        let runner = CodeRunner::new();
        let outcome = runner
            .run(request(
                "console.warn('before'); return missing.field;",
                json!(null),
            ))
            .await;
        assert!(!outcome.success);
        assert_eq!(outcome.error.as_ref().unwrap().code, "EXECUTION_ERROR");
        assert_eq!(outcome.logs.len(), 1);
        assert_eq!(outcome.logs[0].level, "warn");
    }

    #[tokio::test]
    async fn times_out_on_long_sleep() {
        let runner = CodeRunner::new();
        let outcome = runner
            .run(CodeRequest {
                code: "utils.sleep(900); utils.sleep(900); return 1;".to_string(),
                language: "javascript".to_string(),
                timeout_ms: Some(100),
                ..Default::default()
            })
            .await;
        assert!(!outcome.success);
        assert_eq!(outcome.error.unwrap().code, "TIMEOUT");
    }

    #[tokio::test]
    async fn utils_parse_json_is_safe() {
        let runner = CodeRunner::new();
        let outcome = runner
            .run(request(
                "return [utils.parseJSON('{\"a\":1}').a, utils.parseJSON('nope')];",
                json!(null),
            ))
            .await;
        assert!(outcome.success);
        assert_eq!(outcome.result, Some(json!([1, null])));
    }

    #[tokio::test]
    async fn undefined_result_maps_to_null() {
        let runner = CodeRunner::new();
        let outcome = runner.run(request("const x = 1;", json!(null))).await;
        assert!(outcome.success);
        assert_eq!(outcome.result, Some(Value::Null));
    }
}
