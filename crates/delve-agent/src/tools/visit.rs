//! Page visits through the Jina reader (`r.jina.ai`), optionally condensed
//! toward a goal by a summarizing generator.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde_json::{json, Value};
use tracing::{debug, warn};

use delve_core::types::{Arguments, Turn};
use delve_core::utils::truncate_string;
use delve_providers::Generator;

use super::base::{require_string, string_or_list, Capability};

/// Default Jina reader host.
pub const JINA_READER_URL: &str = "https://r.jina.ai";

/// Environment variable consulted when no key is configured.
pub const JINA_KEY_ENV: &str = "JINA_API_KEY";

/// URLs accepted per call.
const MAX_URLS: usize = 5;

/// Reader requests made per URL before giving up.
const FETCH_ATTEMPTS: u32 = 5;

enum FetchError {
    /// Worth another attempt.
    Transient(String),
    Fatal(anyhow::Error),
}

// ─────────────────────────────────────────────
// VisitTool
// ─────────────────────────────────────────────

/// Fetches web pages as readable text.
pub struct VisitTool {
    api_key: Option<String>,
    reader_url: String,
    max_chars: usize,
    client: Client,
    summarizer: Option<Arc<dyn Generator>>,
    retry_delay: Duration,
}

impl VisitTool {
    /// `api_key` may be `None` or empty; it then falls back to `JINA_API_KEY`.
    pub fn new(api_key: Option<String>, max_chars: usize) -> Self {
        Self {
            api_key: api_key.filter(|k| !k.is_empty()),
            reader_url: JINA_READER_URL.to_string(),
            max_chars,
            client: Client::builder()
                .timeout(Duration::from_secs(60))
                .build()
                .unwrap_or_default(),
            summarizer: None,
            retry_delay: Duration::from_millis(500),
        }
    }

    /// Condense page content toward the goal through `generator`.
    pub fn with_summarizer(mut self, generator: Arc<dyn Generator>) -> Self {
        self.summarizer = Some(generator);
        self
    }

    /// Point the tool at another reader host (used by tests).
    pub fn with_reader_url(mut self, reader_url: impl Into<String>) -> Self {
        self.reader_url = reader_url.into();
        self
    }

    /// Base pause between reader attempts; attempt `n` waits `n` times this.
    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }

    fn resolve_api_key(&self) -> Option<String> {
        self.api_key
            .clone()
            .or_else(|| std::env::var(JINA_KEY_ENV).ok().filter(|k| !k.is_empty()))
    }

    /// Fetch `url` through the reader. Transport errors and 429/5xx answers
    /// are retried up to `FETCH_ATTEMPTS` times with a growing pause.
    async fn fetch(&self, url: &str) -> anyhow::Result<String> {
        let mut attempt = 1;
        loop {
            match self.fetch_once(url).await {
                Ok(text) => return Ok(text),
                Err(FetchError::Transient(reason)) if attempt < FETCH_ATTEMPTS => {
                    warn!(url = %url, attempt, reason = %reason, "reader fetch failed, retrying");
                    tokio::time::sleep(self.retry_delay * attempt).await;
                    attempt += 1;
                }
                Err(FetchError::Transient(reason)) => {
                    anyhow::bail!("Failed to fetch {url} after {attempt} attempts: {reason}")
                }
                Err(FetchError::Fatal(e)) => return Err(e),
            }
        }
    }

    async fn fetch_once(&self, url: &str) -> Result<String, FetchError> {
        let reader = format!("{}/{}", self.reader_url.trim_end_matches('/'), url);
        debug!(url = %url, "fetching through reader");

        let mut request = self.client.get(&reader);
        if let Some(key) = self.resolve_api_key() {
            request = request.bearer_auth(key);
        }

        let resp = request
            .send()
            .await
            .map_err(|e| FetchError::Transient(format!("reader request failed: {e}")))?;

        let status = resp.status();
        if status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS {
            return Err(FetchError::Transient(format!("reader returned {status}")));
        }
        if !status.is_success() {
            return Err(FetchError::Fatal(anyhow::anyhow!(
                "Reader returned {status} for {url}"
            )));
        }

        let text = resp
            .text()
            .await
            .map_err(|e| FetchError::Transient(format!("failed to read page body: {e}")))?;

        if text.trim().is_empty() {
            return Err(FetchError::Fatal(anyhow::anyhow!(
                "Reader returned an empty page for {url}"
            )));
        }
        Ok(truncate_string(&text, self.max_chars))
    }

    async fn visit_one(&self, url: &str, goal: &str) -> anyhow::Result<String> {
        let content = self.fetch(url).await?;

        let Some(summarizer) = &self.summarizer else {
            return Ok(format!(
                "## Content of: {url}\n\n**Goal:** {goal}\n\n{content}\n\n🔗 **Original URL:** {url}"
            ));
        };

        let prompt = summary_prompt(&content, goal);
        match summarizer.generate(&[Turn::user(prompt)]).await {
            Ok(reply) => Ok(format_summary(url, goal, &reply)),
            Err(e) => {
                warn!(url = %url, error = %e, "summary failed, returning raw content");
                Ok(format!(
                    "## Content of: {url}\n\n**Goal:** {goal}\n\n{content}\n\n🔗 **Original URL:** {url}\n\n\
                     ⚠️ *Summary unavailable: {e}*"
                ))
            }
        }
    }
}

#[async_trait]
impl Capability for VisitTool {
    fn name(&self) -> &str {
        "visit"
    }

    fn description(&self) -> &str {
        "Visit web pages and extract their content, summarized toward a specific goal."
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "url": {
                    "type": ["string", "array"],
                    "items": { "type": "string" },
                    "maxItems": MAX_URLS,
                    "description": "The URL to visit, or a list of up to 5 URLs"
                },
                "goal": {
                    "type": "string",
                    "description": "What information to look for on the page"
                }
            },
            "required": ["url", "goal"]
        })
    }

    async fn invoke(&self, arguments: Arguments) -> anyhow::Result<String> {
        let mut urls = string_or_list(&arguments, "url")?;
        let goal = require_string(&arguments, "goal")?;
        let goal = goal.trim();
        if goal.is_empty() {
            anyhow::bail!("Goal cannot be empty");
        }

        urls.retain(|u| {
            let valid = u.starts_with("http://") || u.starts_with("https://");
            if !valid {
                warn!(url = %u, "skipping non-http url");
            }
            valid
        });
        if urls.is_empty() {
            anyhow::bail!("No valid URLs provided (must start with http:// or https://)");
        }
        if urls.len() > MAX_URLS {
            warn!(given = urls.len(), "too many urls, keeping the first {MAX_URLS}");
            urls.truncate(MAX_URLS);
        }

        if urls.len() == 1 {
            return self.visit_one(&urls[0], goal).await;
        }

        let mut sections = Vec::with_capacity(urls.len());
        for (i, url) in urls.iter().enumerate() {
            let body = match self.visit_one(url, goal).await {
                Ok(body) => body,
                Err(e) => format!("Error processing URL {url}: {e}"),
            };
            sections.push(format!("## URL {}: {url}\n\n{body}", i + 1));
        }

        Ok(format!(
            "## Batch URL Report\n\n**Goal:** {goal}\n\n{}\n\n---\n**Summary:** Processed {} URLs",
            sections.join("\n\n"),
            urls.len()
        ))
    }
}

// ─────────────────────────────────────────────
// Summaries
// ─────────────────────────────────────────────

fn summary_prompt(content: &str, goal: &str) -> String {
    format!(
        "## Task Guidelines\n\
         1. Rational: locate the specific sections of the page that relate to the goal.\n\
         2. Evidence: extract the most relevant information with its full original context.\n\
         3. Summary: write a concise paragraph that answers the goal.\n\n\
         **Web Content:**\n{content}\n\n\
         **Goal:** {goal}\n\n\
         Reply with a JSON object with the fields \"rational\", \"evidence\" and \"summary\"."
    )
}

/// Render the summarizer's reply; replies that are not the expected JSON
/// object are shown verbatim.
fn format_summary(url: &str, goal: &str, reply: &str) -> String {
    let parsed = reply
        .find('{')
        .zip(reply.rfind('}'))
        .filter(|(start, end)| start < end)
        .and_then(|(start, end)| serde_json::from_str::<Value>(&reply[start..=end]).ok())
        .filter(|v| v.is_object());

    match parsed {
        Some(v) => {
            let field = |k: &str| v[k].as_str().unwrap_or("(not provided)").to_string();
            format!(
                "## URL Analysis for: {url}\n\n**Goal:** {goal}\n\n\
                 ### Rational\n{}\n\n### Evidence\n{}\n\n### Summary\n{}\n\n\
                 🔗 **Original URL:** {url}",
                field("rational"),
                field("evidence"),
                field("summary"),
            )
        }
        None => format!(
            "## URL Summary for: {url}\n\n**Goal:** {goal}\n\n{}\n\n🔗 **Original URL:** {url}",
            reply.trim()
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use delve_providers::ProviderError;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    struct CannedSummarizer {
        reply: Result<String, String>,
        prompts: std::sync::Mutex<Vec<String>>,
    }

    #[async_trait]
    impl Generator for CannedSummarizer {
        async fn generate(&self, transcript: &[Turn]) -> Result<String, ProviderError> {
            self.prompts
                .lock()
                .unwrap()
                .push(transcript[0].text().to_string());
            self.reply.clone().map_err(ProviderError::Decode)
        }
        fn display_name(&self) -> &str {
            "canned"
        }
    }

    fn args(value: Value) -> Arguments {
        serde_json::from_value(value).unwrap()
    }

    async fn reader_with_page(body: &str) -> MockServer {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/https://example.com/page"))
            .respond_with(ResponseTemplate::new(200).set_body_string(body))
            .mount(&server)
            .await;
        server
    }

    #[tokio::test]
    async fn test_visit_without_summarizer_truncates() {
        let server = reader_with_page(&"x".repeat(500)).await;
        let tool = VisitTool::new(Some("jina".into()), 100).with_reader_url(server.uri());

        let out = tool
            .invoke(args(json!({"url": "https://example.com/page", "goal": "read it"})))
            .await
            .unwrap();
        assert!(out.starts_with("## Content of: https://example.com/page"));
        assert!(out.contains(&format!("{}...", "x".repeat(97))));
        assert!(!out.contains(&"x".repeat(101)));
    }

    #[tokio::test]
    async fn test_visit_sends_bearer() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/https://example.com/page"))
            .and(header("Authorization", "Bearer jina-key"))
            .respond_with(ResponseTemplate::new(200).set_body_string("hello"))
            .expect(1)
            .mount(&server)
            .await;

        let tool = VisitTool::new(Some("jina-key".into()), 1000).with_reader_url(server.uri());
        let out = tool
            .invoke(args(json!({"url": "https://example.com/page", "goal": "g"})))
            .await
            .unwrap();
        assert!(out.contains("hello"));
    }

    #[tokio::test]
    async fn test_visit_with_summarizer() {
        let server = reader_with_page("Rust 1.0 was released in May 2015.").await;
        let summarizer = Arc::new(CannedSummarizer {
            reply: Ok("```json\n{\"rational\": \"r\", \"evidence\": \"May 2015\", \"summary\": \"2015\"}\n```".into()),
            prompts: std::sync::Mutex::new(Vec::new()),
        });
        let tool = VisitTool::new(None, 1000)
            .with_reader_url(server.uri())
            .with_summarizer(summarizer.clone());

        let out = tool
            .invoke(args(json!({"url": "https://example.com/page", "goal": "release date"})))
            .await
            .unwrap();
        assert!(out.contains("### Evidence\nMay 2015"));
        assert!(out.contains("### Summary\n2015"));

        let prompts = summarizer.prompts.lock().unwrap();
        assert!(prompts[0].contains("Rust 1.0 was released"));
        assert!(prompts[0].contains("**Goal:** release date"));
    }

    #[tokio::test]
    async fn test_visit_summarizer_failure_falls_back() {
        let server = reader_with_page("plain page").await;
        let summarizer = Arc::new(CannedSummarizer {
            reply: Err("boom".into()),
            prompts: std::sync::Mutex::new(Vec::new()),
        });
        let tool = VisitTool::new(None, 1000)
            .with_reader_url(server.uri())
            .with_summarizer(summarizer);

        let out = tool
            .invoke(args(json!({"url": "https://example.com/page", "goal": "g"})))
            .await
            .unwrap();
        assert!(out.contains("plain page"));
        assert!(out.contains("Summary unavailable"));
    }

    #[tokio::test]
    async fn test_visit_rejects_non_http() {
        let tool = VisitTool::new(None, 1000);
        let err = tool
            .invoke(args(json!({"url": "ftp://example.com", "goal": "g"})))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("No valid URLs"));
    }

    #[tokio::test]
    async fn test_visit_requires_goal() {
        let tool = VisitTool::new(None, 1000);
        let err = tool
            .invoke(args(json!({"url": "https://example.com"})))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("goal"));
    }

    #[tokio::test]
    async fn test_visit_batch_reports_each_url() {
        let server = reader_with_page("first page").await;
        let tool = VisitTool::new(None, 1000).with_reader_url(server.uri());

        let out = tool
            .invoke(args(json!({
                "url": ["https://example.com/page", "https://example.com/missing"],
                "goal": "g"
            })))
            .await
            .unwrap();
        assert!(out.starts_with("## Batch URL Report"));
        assert!(out.contains("## URL 1: https://example.com/page"));
        assert!(out.contains("first page"));
        assert!(out.contains("Error processing URL https://example.com/missing"));
        assert!(out.ends_with("Processed 2 URLs"));
    }

    #[tokio::test]
    async fn test_visit_retries_server_errors() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/https://example.com/flaky"))
            .respond_with(ResponseTemplate::new(503))
            .up_to_n_times(2)
            .expect(2)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/https://example.com/flaky"))
            .respond_with(ResponseTemplate::new(200).set_body_string("finally"))
            .expect(1)
            .mount(&server)
            .await;

        let tool = VisitTool::new(None, 1000)
            .with_reader_url(server.uri())
            .with_retry_delay(Duration::from_millis(1));
        let out = tool
            .invoke(args(json!({"url": "https://example.com/flaky", "goal": "g"})))
            .await
            .unwrap();
        assert!(out.contains("finally"));
    }

    #[tokio::test]
    async fn test_visit_gives_up_after_attempts() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(502))
            .expect(u64::from(FETCH_ATTEMPTS))
            .mount(&server)
            .await;

        let tool = VisitTool::new(None, 1000)
            .with_reader_url(server.uri())
            .with_retry_delay(Duration::from_millis(1));
        let err = tool
            .invoke(args(json!({"url": "https://example.com/down", "goal": "g"})))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("after 5 attempts"));
    }

    #[tokio::test]
    async fn test_visit_does_not_retry_not_found() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .expect(1)
            .mount(&server)
            .await;

        let tool = VisitTool::new(None, 1000).with_reader_url(server.uri());
        let err = tool
            .invoke(args(json!({"url": "https://example.com/gone", "goal": "g"})))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("404"));
    }

    #[test]
    fn test_format_summary_non_json() {
        let out = format_summary("https://a.example", "g", "just prose");
        assert!(out.starts_with("## URL Summary for: https://a.example"));
        assert!(out.contains("just prose"));
    }
}
