//! `delve search` — run one web or scholar search without the reasoning loop.

use anyhow::{Context, Result};
use clap::ValueEnum;
use colored::Colorize;
use serde_json::{json, Value};

use delve_agent::ToolRegistry;
use delve_core::types::Arguments;

/// Which search capability to call.
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum SearchKind {
    /// Google web search
    Web,
    /// Google Scholar
    Scholar,
}

impl SearchKind {
    /// Registered capability name.
    pub fn tool_name(self) -> &'static str {
        match self {
            SearchKind::Web => "search",
            SearchKind::Scholar => "google_scholar",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            SearchKind::Web => "Google",
            SearchKind::Scholar => "Google Scholar",
        }
    }
}

/// Run `query` through the matching capability in `registry`.
pub async fn search(registry: &ToolRegistry, kind: SearchKind, query: &str) -> Result<String> {
    let tool = registry
        .get(kind.tool_name())
        .with_context(|| format!("capability '{}' is not registered", kind.tool_name()))?;

    let mut arguments = Arguments::new();
    arguments.insert("query".to_string(), Value::String(query.to_string()));
    tool.invoke(arguments)
        .await
        .with_context(|| format!("{} search failed", kind.label()))
}

/// Run the search command and print the result.
pub async fn run(registry: &ToolRegistry, kind: SearchKind, query: &str, as_json: bool) -> Result<()> {
    if !as_json {
        println!();
        println!("{} {}", "🔍".bold(), query.bold());
        println!("{}", format!("source: {}", kind.label()).dimmed());
        println!("{}", "─".repeat(60).dimmed());
    }

    let result = search(registry, kind, query).await?;

    if as_json {
        println!("{}", serde_json::to_string_pretty(&to_json(kind, query, &result))?);
    } else {
        println!("{result}");
        println!();
        println!("  {} {} search complete", "✓".green(), kind.label());
    }
    Ok(())
}

fn to_json(kind: SearchKind, query: &str, result: &str) -> Value {
    let kind_name = match kind {
        SearchKind::Web => "web",
        SearchKind::Scholar => "scholar",
    };
    json!({
        "query": query,
        "type": kind_name,
        "source": kind.label(),
        "result": result,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use async_trait::async_trait;
    use delve_agent::Capability;

    struct StaticSearch;

    #[async_trait]
    impl Capability for StaticSearch {
        fn name(&self) -> &str {
            "search"
        }
        fn description(&self) -> &str {
            "static"
        }
        fn parameters(&self) -> Value {
            json!({"type": "object", "properties": {"query": {"type": "string"}}, "required": ["query"]})
        }
        async fn invoke(&self, arguments: Arguments) -> anyhow::Result<String> {
            Ok(format!("results for {}", arguments["query"].as_str().unwrap_or_default()))
        }
    }

    fn registry() -> ToolRegistry {
        let mut registry = ToolRegistry::new();
        registry.register(Arc::new(StaticSearch));
        registry
    }

    #[tokio::test]
    async fn web_search_uses_search_capability() {
        let out = search(&registry(), SearchKind::Web, "rust").await.unwrap();
        assert_eq!(out, "results for rust");
    }

    #[tokio::test]
    async fn missing_capability_is_an_error() {
        let err = search(&registry(), SearchKind::Scholar, "rust").await.unwrap_err();
        assert!(err.to_string().contains("google_scholar"));
    }

    #[test]
    fn json_output_shape() {
        let value = to_json(SearchKind::Scholar, "q", "r");
        assert_eq!(value["type"], "scholar");
        assert_eq!(value["source"], "Google Scholar");
        assert_eq!(value["result"], "r");
    }
}
