//! Configuration schema.
//!
//! Hierarchy: `Config` → `AgentConfig`, `ProviderConfig`, `ToolsConfig`.
//!
//! JSON on disk uses **camelCase** keys; Rust uses snake_case.
//! We use `#[serde(rename_all = "camelCase")]` to handle the conversion.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

// ─────────────────────────────────────────────
// Root Config
// ─────────────────────────────────────────────

/// Root configuration — loaded from `~/.delve/config.json` + env vars.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Config {
    pub agent: AgentConfig,
    pub provider: ProviderConfig,
    pub tools: ToolsConfig,
}

// ─────────────────────────────────────────────
// Agent
// ─────────────────────────────────────────────

/// Budgets for one reasoning run.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AgentConfig {
    /// Generation calls allowed before the forced final answer.
    pub call_budget: u32,
    /// Estimated-token budget for the transcript.
    pub context_budget: usize,
    /// Turns kept (besides the instruction) when the budget is exceeded.
    pub recent_window: usize,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            call_budget: 100,
            context_budget: 12_000,
            recent_window: 16,
        }
    }
}

// ─────────────────────────────────────────────
// Provider
// ─────────────────────────────────────────────

/// The OpenAI-compatible endpoint used as the generator.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ProviderConfig {
    /// API key for Bearer authentication.
    pub api_key: String,
    /// API base URL (without `/chat/completions`).
    pub api_base: String,
    /// Model identifier.
    pub model: String,
    /// Sampling temperature (0.0 – 2.0).
    pub temperature: f64,
    /// Maximum tokens to generate per response.
    pub max_tokens: u32,
    /// HTTP timeout for one generation call.
    pub timeout_secs: u64,
    /// Extra HTTP headers to send with each request.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extra_headers: Option<HashMap<String, String>>,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            api_base: "https://open.bigmodel.cn/api/paas/v4".to_string(),
            model: "glm-4.5-air".to_string(),
            temperature: 0.7,
            max_tokens: 4096,
            timeout_secs: 120,
            extra_headers: None,
        }
    }
}

impl ProviderConfig {
    /// Whether this provider has a configured API key.
    pub fn is_configured(&self) -> bool {
        !self.api_key.is_empty()
    }
}

// ─────────────────────────────────────────────
// Tools
// ─────────────────────────────────────────────

/// Built-in capability settings.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ToolsConfig {
    pub serper: SerperConfig,
    pub jina: JinaConfig,
    pub sandbox: SandboxConfig,
    pub research: ResearchToolConfig,
}

/// Serper (Google web + scholar search).
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SerperConfig {
    pub api_key: String,
}

/// Jina reader (URL content extraction).
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct JinaConfig {
    pub api_key: String,
    /// Page text is truncated to this many characters.
    pub max_chars: usize,
}

impl Default for JinaConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            max_chars: 40_000,
        }
    }
}

/// SandboxFusion code execution endpoint.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SandboxConfig {
    pub endpoint: String,
    pub timeout_secs: u64,
}

impl Default for SandboxConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://localhost:8081".to_string(),
            timeout_secs: 30,
        }
    }
}

/// The nested `research` capability (a reasoning loop exposed as a tool).
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ResearchToolConfig {
    pub enabled: bool,
}

// ─────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────
