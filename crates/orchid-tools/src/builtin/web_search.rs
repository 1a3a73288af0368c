//! Web search provider
//!
//! Queries the DuckDuckGo instant-answer API and maps the response to a
//! uniform result list. Any failure degrades to a single result pointing
//! at the engine's public search page for the query, so downstream nodes
//! always receive a well-formed result set.

use async_trait::async_trait;
use orchid_core::{Error, Result};
use serde::Deserialize;
use serde_json::{json, Map, Value};
use std::time::Duration;
use tracing::{debug, warn};

use crate::executor::BuiltinHandler;

const INSTANT_ANSWER_URL: &str = "https://api.duckduckgo.com/";
const DEFAULT_ENGINE: &str = "duckduckgo";
const DEFAULT_LIMIT: usize = 5;

pub struct WebSearchHandler {
    http: reqwest::Client,
}

impl WebSearchHandler {
    pub fn new() -> Self {
        Self {
            http: reqwest::Client::builder()
                .timeout(Duration::from_secs(10))
                .build()
                .unwrap_or_default(),
        }
    }
}

impl Default for WebSearchHandler {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Deserialize, Default)]
struct InstantAnswer {
    #[serde(rename = "Heading", default)]
    heading: String,
    #[serde(rename = "AbstractText", default)]
    abstract_text: String,
    #[serde(rename = "AbstractURL", default)]
    abstract_url: String,
    #[serde(rename = "AbstractSource", default)]
    abstract_source: String,
    #[serde(rename = "RelatedTopics", default)]
    related_topics: Vec<RelatedTopic>,
}

#[derive(Debug, Deserialize, Default)]
struct RelatedTopic {
    #[serde(rename = "Text", default)]
    text: String,
    #[serde(rename = "FirstURL", default)]
    first_url: String,
    #[serde(rename = "Topics", default)]
    topics: Vec<RelatedTopic>,
}

#[async_trait]
impl BuiltinHandler for WebSearchHandler {
    async fn handle(&self, _tool: &str, params: &Map<String, Value>) -> Result<Value> {
        let query = params
            .get("query")
            .and_then(Value::as_str)
            .ok_or_else(|| Error::missing_param("query"))?;
        let engine = params
            .get("engine")
            .and_then(Value::as_str)
            .unwrap_or(DEFAULT_ENGINE);
        let limit = params
            .get("limit")
            .and_then(Value::as_u64)
            .map(|n| n as usize)
            .unwrap_or(DEFAULT_LIMIT)
            .max(1);

        match self.query_instant_answers(query, limit).await {
            Ok(results) if !results.is_empty() => {
                debug!(query = %query, count = results.len(), "web search completed");
                Ok(json!({
                    "query": query,
                    "engine": engine,
                    "totalResults": results.len(),
                    "results": results,
                }))
            }
            Ok(_) | Err(_) => {
                warn!(query = %query, "web search degraded to engine link fallback");
                Ok(fallback_response(query, engine))
            }
        }
    }
}

impl WebSearchHandler {
    async fn query_instant_answers(&self, query: &str, limit: usize) -> Result<Vec<Value>> {
        let response = self
            .http
            .get(INSTANT_ANSWER_URL)
            .query(&[("q", query), ("format", "json"), ("no_html", "1")])
            .send()
            .await?
            .error_for_status()?;

        let answer: InstantAnswer = response.json().await?;
        let mut results = Vec::new();

        if !answer.abstract_text.is_empty() {
            results.push(json!({
                "title": if answer.heading.is_empty() { query } else { &answer.heading },
                "url": answer.abstract_url,
                "snippet": answer.abstract_text,
                "source": answer.abstract_source,
            }));
        }

        collect_topics(&answer.related_topics, limit, &mut results);
        results.truncate(limit);
        Ok(results)
    }
}

fn collect_topics(topics: &[RelatedTopic], limit: usize, out: &mut Vec<Value>) {
    for topic in topics {
        if out.len() >= limit {
            return;
        }
        if !topic.text.is_empty() && !topic.first_url.is_empty() {
            out.push(json!({
                "title": topic.text,
                "url": topic.first_url,
                "snippet": topic.text,
                "source": "duckduckgo",
            }));
        }
        collect_topics(&topic.topics, limit, out);
    }
}

/// Engine's public search URL for a query
fn engine_search_url(engine: &str, query: &str) -> String {
    let base = match engine {
        "google" => "https://www.google.com/search",
        "bing" => "https://www.bing.com/search",
        _ => "https://duckduckgo.com/",
    };
    reqwest::Url::parse_with_params(base, &[("q", query)])
        .map(|u| u.to_string())
        .unwrap_or_else(|_| base.to_string())
}

fn fallback_response(query: &str, engine: &str) -> Value {
    json!({
        "query": query,
        "engine": engine,
        "totalResults": 1,
        "results": [{
            "title": format!("Search results for \"{}\"", query),
            "url": engine_search_url(engine, query),
            "snippet": format!("Open the {} results page for this query.", engine),
            "source": engine,
        }],
    })
}
