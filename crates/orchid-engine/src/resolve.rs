//! Variable resolution
//!
//! Replaces `{{path}}` templates in node configuration against the four
//! namespaces: `input`, `variables`, `nodeOutputs`, and `env`. A string
//! that is exactly one template takes the referenced value with its type
//! preserved; templates embedded in longer strings coerce to string.
//! Missing paths resolve to the empty string. Resolution walks objects,
//! arrays, and strings; other scalars pass through untouched, which also
//! makes resolution idempotent.

use serde_json::{Map, Value};

/// The namespaces a template path can be rooted at
#[derive(Debug, Clone, Default)]
pub struct ResolveScope {
    pub input: Value,
    pub variables: Map<String, Value>,
    pub node_outputs: Map<String, Value>,
    pub env: Map<String, Value>,
}

impl ResolveScope {
    /// Capture the process environment into the `env` namespace
    pub fn with_process_env(mut self) -> Self {
        self.env = std::env::vars()
            .map(|(k, v)| (k, Value::String(v)))
            .collect();
        self
    }
}

/// Resolve every template in `value`, returning a deep copy
pub fn resolve_value(value: &Value, scope: &ResolveScope) -> Value {
    match value {
        Value::String(s) => resolve_string(s, scope),
        Value::Object(map) => Value::Object(
            map.iter()
                .map(|(k, v)| (k.clone(), resolve_value(v, scope)))
                .collect(),
        ),
        Value::Array(items) => {
            Value::Array(items.iter().map(|v| resolve_value(v, scope)).collect())
        }
        other => other.clone(),
    }
}

/// Resolve templates within one string
fn resolve_string(s: &str, scope: &ResolveScope) -> Value {
    // Whole-string template: preserve the referenced value's type.
    if let Some(path) = sole_template(s) {
        return lookup(scope, path).unwrap_or(Value::String(String::new()));
    }

    if !s.contains("{{") {
        return Value::String(s.to_string());
    }

    let mut out = String::with_capacity(s.len());
    let mut rest = s;
    while let Some(open) = rest.find("{{") {
        out.push_str(&rest[..open]);
        let after = &rest[open + 2..];
        match after.find("}}") {
            Some(close) => {
                let path = after[..close].trim();
                if let Some(value) = lookup(scope, path) {
                    out.push_str(&value_to_text(&value));
                }
                rest = &after[close + 2..];
            }
            None => {
                // Unterminated template: emit literally.
                out.push_str(&rest[open..]);
                rest = "";
            }
        }
    }
    out.push_str(rest);
    Value::String(out)
}

/// If the trimmed string is exactly `{{path}}`, return the path
fn sole_template(s: &str) -> Option<&str> {
    let trimmed = s.trim();
    let inner = trimmed.strip_prefix("{{")?.strip_suffix("}}")?;
    if inner.contains("{{") || inner.contains("}}") {
        return None;
    }
    Some(inner.trim())
}

/// Look a dotted/bracketed path up in the scope
fn lookup(scope: &ResolveScope, path: &str) -> Option<Value> {
    let mut segments = parse_path(path).into_iter();
    let root = segments.next()?;

    let mut current: Value = match root {
        PathSegment::Key(ref name) => match name.as_str() {
            "input" => scope.input.clone(),
            "variables" => Value::Object(scope.variables.clone()),
            "nodeOutputs" => Value::Object(scope.node_outputs.clone()),
            "env" => Value::Object(scope.env.clone()),
            _ => return None,
        },
        PathSegment::Index(_) => return None,
    };

    for segment in segments {
        current = match (&segment, &current) {
            (PathSegment::Key(name), Value::Object(map)) => map.get(name)?.clone(),
            (PathSegment::Index(index), Value::Array(items)) => items.get(*index)?.clone(),
            _ => return None,
        };
    }
    Some(current)
}

#[derive(Debug, Clone, PartialEq)]
enum PathSegment {
    Key(String),
    Index(usize),
}

/// Split `a.b[0].c` into key/index segments
fn parse_path(path: &str) -> Vec<PathSegment> {
    let mut segments = Vec::new();
    for part in path.split('.') {
        let mut rest = part;
        while let Some(bracket) = rest.find('[') {
            if bracket > 0 {
                segments.push(PathSegment::Key(rest[..bracket].to_string()));
            }
            match rest[bracket + 1..].find(']') {
                Some(close) => {
                    let raw = &rest[bracket + 1..bracket + 1 + close];
                    match raw.trim_matches(|c| c == '"' || c == '\'').parse::<usize>() {
                        Ok(index) => segments.push(PathSegment::Index(index)),
                        Err(_) => segments.push(PathSegment::Key(
                            raw.trim_matches(|c| c == '"' || c == '\'').to_string(),
                        )),
                    }
                    rest = &rest[bracket + 1 + close + 1..];
                }
                None => {
                    segments.push(PathSegment::Key(rest[bracket..].to_string()));
                    rest = "";
                }
            }
        }
        if !rest.is_empty() {
            segments.push(PathSegment::Key(rest.to_string()));
        }
    }
    segments
}

/// Stringify a value for embedding into a mixed template
fn value_to_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn scope() -> ResolveScope {
        let mut variables = Map::new();
        variables.insert("count".to_string(), json!(3));
        variables.insert("name".to_string(), json!("ada"));
        let mut node_outputs = Map::new();
        node_outputs.insert(
            "n3".to_string(),
            json!({ "text": "summary", "items": [10, 20] }),
        );
        let mut env = Map::new();
        env.insert("API_BASE".to_string(), json!("http://localhost:4000"));
        ResolveScope {
            input: json!({ "user": "grace", "tags": ["a", "b"] }),
            variables,
            node_outputs,
            env,
        }
    }

    #[test]
    fn whole_template_preserves_type() {
        let resolved = resolve_value(&json!("{{variables.count}}"), &scope());
        assert_eq!(resolved, json!(3));

        let resolved = resolve_value(&json!("{{input.tags}}"), &scope());
        assert_eq!(resolved, json!(["a", "b"]));
    }

    #[test]
    fn mixed_template_coerces_to_string() {
        let resolved = resolve_value(&json!("hello {{input.user}}, n={{variables.count}}"), &scope());
        assert_eq!(resolved, json!("hello grace, n=3"));
    }

    #[test]
    fn missing_path_resolves_to_empty_string() {
        assert_eq!(resolve_value(&json!("{{input.nope}}"), &scope()), json!(""));
        assert_eq!(
            resolve_value(&json!("x={{variables.nope}}!"), &scope()),
            json!("x=!")
        );
    }

    #[test]
    fn traverses_objects_and_arrays() {
        let value = json!({
            "url": "{{env.API_BASE}}/users/{{input.user}}",
            "nested": [{ "text": "{{nodeOutputs.n3.text}}" }],
            "second": "{{nodeOutputs.n3.items[1]}}",
            "flag": true,
            "n": 42
        });
        let resolved = resolve_value(&value, &scope());
        assert_eq!(resolved["url"], "http://localhost:4000/users/grace");
        assert_eq!(resolved["nested"][0]["text"], "summary");
        assert_eq!(resolved["second"], json!(20));
        assert_eq!(resolved["flag"], true);
        assert_eq!(resolved["n"], 42);
    }

    #[test]
    fn resolution_is_idempotent() {
        let value = json!({ "a": "{{input.user}}", "b": "{{variables.count}} items" });
        let once = resolve_value(&value, &scope());
        let twice = resolve_value(&once, &scope());
        assert_eq!(once, twice);
    }

    #[test]
    fn unknown_namespace_is_left_empty() {
        assert_eq!(resolve_value(&json!("{{secrets.key}}"), &scope()), json!(""));
    }

    #[test]
    fn unterminated_template_is_literal() {
        assert_eq!(
            resolve_value(&json!("broken {{input.user"), &scope()),
            json!("broken {{input.user")
        );
    }

    #[test]
    fn bare_input_template() {
        let resolved = resolve_value(&json!("{{input}}"), &scope());
        assert_eq!(resolved, json!({ "user": "grace", "tags": ["a", "b"] }));
    }
}
