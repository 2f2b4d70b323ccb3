//! Capability trait — the interface every research tool implements.

use async_trait::async_trait;
use serde_json::{json, Value};

use delve_core::types::Arguments;

// ─────────────────────────────────────────────
// Capability trait
// ─────────────────────────────────────────────

/// A named, self-describing action the reasoning loop can invoke.
///
/// The registry exposes capabilities by `name()`, the prompt builder lists
/// their signatures, and the executor dispatches calls to `invoke()`.
#[async_trait]
pub trait Capability: Send + Sync {
    /// Unique name the model uses to call this capability (e.g. `"search"`).
    fn name(&self) -> &str;

    /// Human-readable description shown to the model.
    fn description(&self) -> &str;

    /// JSON Schema describing the arguments.
    ///
    /// Must be `{"type": "object", "properties": {...}, "required": [...]}`.
    fn parameters(&self) -> Value;

    /// Run the capability.
    ///
    /// Errors are turned into transcript text by the executor, so the message
    /// should read well to the model.
    async fn invoke(&self, arguments: Arguments) -> anyhow::Result<String>;

    /// Function signature listed in the instruction turn.
    fn to_signature(&self) -> Value {
        json!({
            "type": "function",
            "function": {
                "name": self.name(),
                "description": self.description(),
                "parameters": self.parameters(),
            }
        })
    }

    /// First entry of the schema's `required` list, if any.
    fn primary_argument(&self) -> Option<String> {
        self.parameters()
            .get("required")
            .and_then(|r| r.as_array())
            .and_then(|r| r.first())
            .and_then(|v| v.as_str())
            .map(|s| s.to_string())
    }
}

// ─────────────────────────────────────────────
// Param helpers
// ─────────────────────────────────────────────

/// Extract a required `String` param, returning a user-friendly error.
pub fn require_string(params: &Arguments, key: &str) -> anyhow::Result<String> {
    params
        .get(key)
        .and_then(|v| v.as_str())
        .map(|s| s.to_string())
        .ok_or_else(|| anyhow::anyhow!("Missing required parameter: {key}"))
}

/// Extract a param that may be a single string or a list of strings.
///
/// Non-string list entries and blank strings are skipped; an empty result is
/// an error.
pub fn string_or_list(params: &Arguments, key: &str) -> anyhow::Result<Vec<String>> {
    let items: Vec<String> = match params.get(key) {
        Some(Value::String(s)) => vec![s.clone()],
        Some(Value::Array(values)) => values
            .iter()
            .filter_map(|v| v.as_str())
            .map(|s| s.to_string())
            .collect(),
        Some(_) => anyhow::bail!("Parameter '{key}' must be a string or a list of strings"),
        None => anyhow::bail!("Missing required parameter: {key}"),
    };

    let items: Vec<String> = items
        .into_iter()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect();

    if items.is_empty() {
        anyhow::bail!("Parameter '{key}' is empty");
    }
    Ok(items)
}
