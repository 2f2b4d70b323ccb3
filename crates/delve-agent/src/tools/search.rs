//! Web search through the Serper API (`google.serper.dev`).
//!
//! [`SerperClient`] is shared with the scholar capability; only the endpoint
//! and the result formatting differ.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};
use tracing::{debug, warn};

use delve_core::types::Arguments;
use delve_core::utils::collapse_whitespace;

use super::base::{string_or_list, Capability};

/// Default Serper API host.
pub const SERPER_BASE_URL: &str = "https://google.serper.dev";

/// Environment variable consulted when no key is configured.
pub const SERPER_KEY_ENV: &str = "SERPER_KEY_ID";

/// Results requested per query.
const RESULTS_PER_QUERY: u32 = 10;

/// Separator between the sections of a multi-query result.
pub(crate) const QUERY_SEPARATOR: &str = "\n=======\n";

// ─────────────────────────────────────────────
// SerperClient
// ─────────────────────────────────────────────

/// Thin client for Serper's JSON endpoints.
#[derive(Clone)]
pub struct SerperClient {
    api_key: Option<String>,
    base_url: String,
    client: Client,
}

impl SerperClient {
    /// `api_key` may be `None` or empty; it then falls back to `SERPER_KEY_ID`.
    pub fn new(api_key: Option<String>) -> Self {
        Self {
            api_key: api_key.filter(|k| !k.is_empty()),
            base_url: SERPER_BASE_URL.to_string(),
            client: Client::builder()
                .timeout(Duration::from_secs(30))
                .build()
                .unwrap_or_default(),
        }
    }

    /// Point the client at another host (used by tests).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    fn resolve_api_key(&self) -> Option<String> {
        self.api_key
            .clone()
            .or_else(|| std::env::var(SERPER_KEY_ENV).ok().filter(|k| !k.is_empty()))
    }

    /// POST `{q, num}` to `endpoint` and return the parsed body.
    pub async fn query(&self, endpoint: &str, query: &str) -> anyhow::Result<Value> {
        let api_key = self.resolve_api_key().ok_or_else(|| {
            anyhow::anyhow!("No Serper API key configured (set SERPER_KEY_ID env var)")
        })?;

        let url = format!("{}{}", self.base_url.trim_end_matches('/'), endpoint);
        debug!(url = %url, query = %query, "serper request");

        let resp = self
            .client
            .post(&url)
            .header("X-API-KEY", api_key)
            .json(&json!({ "q": query, "num": RESULTS_PER_QUERY }))
            .send()
            .await
            .map_err(|e| anyhow::anyhow!("Serper request failed: {e}"))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            anyhow::bail!("Serper API returned {status}: {body}");
        }

        resp.json()
            .await
            .map_err(|e| anyhow::anyhow!("Failed to parse Serper response: {e}"))
    }

    /// Run every query, formatting each body with `format`.
    ///
    /// Fails only when every query fails; otherwise failed queries show up as
    /// a line of text in their section.
    pub(crate) async fn query_all(
        &self,
        endpoint: &str,
        queries: &[String],
        format: fn(&str, &Value) -> String,
    ) -> anyhow::Result<String> {
        let mut sections = Vec::with_capacity(queries.len());
        let mut first_error = None;
        let mut failures = 0;

        for query in queries {
            match self.query(endpoint, query).await {
                Ok(body) => sections.push(format(query, &body)),
                Err(e) => {
                    warn!(query = %query, error = %e, "serper query failed");
                    sections.push(format!("Search for '{query}' failed: {e}"));
                    failures += 1;
                    first_error.get_or_insert(e);
                }
            }
        }

        if failures == queries.len() {
            if let Some(e) = first_error {
                return Err(e);
            }
        }
        Ok(sections.join(QUERY_SEPARATOR))
    }
}

/// `(total results, search time)` from Serper's `searchInformation` block.
pub(crate) fn search_information(body: &Value, fallback_total: usize) -> (String, String) {
    let info = &body["searchInformation"];
    let total = match &info["totalResults"] {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        _ => fallback_total.to_string(),
    };
    let time = match &info["formattedSearchTime"] {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        _ => "N/A".to_string(),
    };
    (total, time)
}

// ─────────────────────────────────────────────
// SearchTool
// ─────────────────────────────────────────────

/// Google web search.
pub struct SearchTool {
    serper: SerperClient,
}

impl SearchTool {
    pub fn new(serper: SerperClient) -> Self {
        Self { serper }
    }
}

#[async_trait]
impl Capability for SearchTool {
    fn name(&self) -> &str {
        "search"
    }

    fn description(&self) -> &str {
        "Search Google for information. Returns organic results with titles, snippets and links. \
         Accepts a single query or a list of queries."
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "query": {
                    "type": ["string", "array"],
                    "items": { "type": "string" },
                    "description": "The search query, or a list of queries"
                }
            },
            "required": ["query"]
        })
    }

    async fn invoke(&self, arguments: Arguments) -> anyhow::Result<String> {
        let queries = string_or_list(&arguments, "query")?;
        self.serper.query_all("/search", &queries, format_web_results).await
    }
}

fn format_web_results(query: &str, body: &Value) -> String {
    let organic = body["organic"].as_array().cloned().unwrap_or_default();
    if organic.is_empty() {
        return format!("A Google search for '{query}' found no organic results.");
    }

    let pages: Vec<String> = organic
        .iter()
        .enumerate()
        .map(|(i, r)| {
            let title = r["title"].as_str().unwrap_or("No title");
            let snippet = collapse_whitespace(r["snippet"].as_str().unwrap_or("No description available"));
            let link = r["link"].as_str().unwrap_or("");
            format!("### {}. {}\n\n{}\n\n🔗 {}", i + 1, title, snippet, link)
        })
        .collect();

    let (total, time) = search_information(body, organic.len());
    format!(
        "A Google search for '{query}' found {total} results (search time: {time}s):\n\n## Web Results\n\n{}",
        pages.join("\n")
    )
}
