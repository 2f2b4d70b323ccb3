//! Academic search through Serper's Google Scholar endpoint.

use async_trait::async_trait;
use serde_json::{json, Value};

use delve_core::types::Arguments;
use delve_core::utils::collapse_whitespace;

use super::base::{string_or_list, Capability};
use super::search::{search_information, SerperClient};

/// Google Scholar search.
pub struct ScholarTool {
    serper: SerperClient,
}

impl ScholarTool {
    pub fn new(serper: SerperClient) -> Self {
        Self { serper }
    }
}

#[async_trait]
impl Capability for ScholarTool {
    fn name(&self) -> &str {
        "google_scholar"
    }

    fn description(&self) -> &str {
        "Search Google Scholar for academic literature. Returns scholarly results with \
         publication info, citations and PDF links."
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "query": {
                    "type": ["string", "array"],
                    "items": { "type": "string" },
                    "description": "The academic search query, or a list of queries"
                }
            },
            "required": ["query"]
        })
    }

    async fn invoke(&self, arguments: Arguments) -> anyhow::Result<String> {
        let queries = string_or_list(&arguments, "query")?;
        self.serper
            .query_all("/scholar", &queries, format_scholar_results)
            .await
    }
}

fn format_scholar_results(query: &str, body: &Value) -> String {
    let organic = body["organic"].as_array().cloned().unwrap_or_default();
    if organic.is_empty() {
        return format!("A Google Scholar search for '{query}' found no academic results.");
    }

    let mut pages = Vec::with_capacity(organic.len());
    for (i, r) in organic.iter().enumerate() {
        let mut page = format!("### {}. {}\n\n", i + 1, r["title"].as_str().unwrap_or("No title"));

        if let Some(snippet) = r["snippet"].as_str().filter(|s| !s.is_empty()) {
            page.push_str(&format!("{}\n\n", collapse_whitespace(snippet)));
        }
        if let Some(info) = r["publicationInfo"].as_str().filter(|s| !s.is_empty()) {
            page.push_str(&format!("**Publication:** {info}\n"));
        }
        if let Some(year) = scalar(&r["year"]) {
            page.push_str(&format!("**Year:** {year}\n"));
        }
        if let Some(cited) = scalar(&r["citedBy"]) {
            page.push_str(&format!("**Cited by:** {cited}\n"));
        }
        if let Some(pdf) = r["pdfUrl"].as_str().filter(|s| !s.is_empty()) {
            page.push_str(&format!("**PDF:** {pdf}\n"));
        }
        page.push_str(&format!("🔗 {}", r["link"].as_str().unwrap_or("")));
        pages.push(page);
    }

    let (total, time) = search_information(body, organic.len());
    format!(
        "A Google Scholar search for '{query}' found {total} results (search time: {time}s):\n\n## Academic Results\n\n{}",
        pages.join("\n\n")
    )
}

fn scalar(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}
