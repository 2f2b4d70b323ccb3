//! Tool registry — capabilities keyed by name.
//!
//! Built once at startup, then shared read-only behind an `Arc`.

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Value;
use tracing::info;

use super::base::Capability;

// ─────────────────────────────────────────────
// Registry
// ─────────────────────────────────────────────

/// Stores capabilities keyed by name.
///
/// Owns `Arc<dyn Capability>` so capabilities can be shared across tasks.
#[derive(Clone)]
pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn Capability>>,
}

impl ToolRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            tools: HashMap::new(),
        }
    }

    /// Register a capability. Overwrites any previous one with the same name.
    pub fn register(&mut self, tool: Arc<dyn Capability>) {
        info!(tool = tool.name(), "registered capability");
        self.tools.insert(tool.name().to_string(), tool);
    }

    /// Look up a capability by name.
    pub fn get(&self, name: &str) -> Option<&Arc<dyn Capability>> {
        self.tools.get(name)
    }

    pub fn has(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    /// Names of all registered capabilities, sorted for determinism.
    pub fn tool_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.tools.keys().cloned().collect();
        names.sort();
        names
    }

    /// Function signatures for all capabilities, sorted by name.
    pub fn signatures(&self) -> Vec<Value> {
        self.tool_names()
            .iter()
            .filter_map(|name| self.tools.get(name))
            .map(|t| t.to_signature())
            .collect()
    }

    /// `(name, description)` pairs, sorted by name.
    pub fn descriptions(&self) -> Vec<(String, String)> {
        self.tool_names()
            .into_iter()
            .filter_map(|name| {
                let desc = self.tools.get(&name)?.description().to_string();
                Some((name, desc))
            })
            .collect()
    }

    /// First required parameter of every capability, deduplicated and sorted.
    pub fn primary_argument_keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self
            .tools
            .values()
            .filter_map(|t| t.primary_argument())
            .collect();
        keys.sort();
        keys.dedup();
        keys
    }

    /// Number of registered capabilities.
    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}
