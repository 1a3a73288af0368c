//! Generic HTTP request provider

use async_trait::async_trait;
use orchid_core::{Error, Result};
use reqwest::Method;
use serde_json::{json, Map, Value};
use std::str::FromStr;
use std::time::Duration;
use tracing::debug;

use crate::executor::BuiltinHandler;

pub struct HttpRequestHandler {
    http: reqwest::Client,
}

impl HttpRequestHandler {
    pub fn new() -> Self {
        Self {
            http: reqwest::Client::builder()
                .timeout(Duration::from_secs(30))
                .build()
                .unwrap_or_default(),
        }
    }
}

impl Default for HttpRequestHandler {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl BuiltinHandler for HttpRequestHandler {
    async fn handle(&self, _tool: &str, params: &Map<String, Value>) -> Result<Value> {
        let url = params
            .get("url")
            .and_then(Value::as_str)
            .ok_or_else(|| Error::missing_param("url"))?;
        let method = params
            .get("method")
            .and_then(Value::as_str)
            .unwrap_or("GET");
        let method = Method::from_str(&method.to_uppercase())
            .map_err(|_| Error::execution(format!("invalid http method '{}'", method)))?;

        debug!(method = %method, url = %url, "http tool request");

        let mut builder = self.http.request(method, url);

        if let Some(headers) = params.get("headers").and_then(Value::as_object) {
            for (name, value) in headers {
                if let Some(value) = value.as_str() {
                    builder = builder.header(name.as_str(), value);
                }
            }
        }

        if let Some(body) = params.get("body") {
            if !body.is_null() {
                builder = match body {
                    Value::String(text) => builder.body(text.clone()),
                    other => builder.json(other),
                };
            }
        }

        let response = builder.send().await?;

        let status = response.status();
        let headers: Map<String, Value> = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|v| (name.to_string(), Value::String(v.to_string())))
            })
            .collect();

        let is_json = headers
            .get("content-type")
            .and_then(Value::as_str)
            .map(|v| v.contains("json"))
            .unwrap_or(false);

        let data = if is_json {
            let text = response.text().await?;
            serde_json::from_str(&text).unwrap_or(Value::String(text))
        } else {
            Value::String(response.text().await?)
        };

        Ok(json!({
            "status": status.as_u16(),
            "statusText": status.canonical_reason().unwrap_or(""),
            "headers": headers,
            "data": data,
        }))
    }
}
