//! Capabilities, the registry that holds them, and the executor that runs them.

pub mod base;
pub mod executor;
pub mod registry;
pub mod research;
pub mod sandbox;
pub mod scholar;
pub mod search;
pub mod visit;

use std::sync::Arc;

use delve_core::config::Config;
use delve_providers::Generator;
use tracing::warn;

pub use base::{require_string, string_or_list, Capability};
pub use executor::ToolExecutor;
pub use registry::ToolRegistry;

use crate::agent_loop::ReasoningLoop;

/// Registry with the built-in research capabilities.
///
/// `generator` condenses visited pages and, when `tools.research.enabled` is
/// set, drives the nested run behind the `research` capability. Without one,
/// pages come back as truncated text and `research` is left out.
pub fn builtin_registry(config: &Config, generator: Option<Arc<dyn Generator>>) -> ToolRegistry {
    let tools = &config.tools;
    let serper = search::SerperClient::new(Some(tools.serper.api_key.clone()));

    let mut visit = visit::VisitTool::new(Some(tools.jina.api_key.clone()), tools.jina.max_chars);
    if let Some(generator) = &generator {
        visit = visit.with_summarizer(generator.clone());
    }

    let mut registry = ToolRegistry::new();
    registry.register(Arc::new(search::SearchTool::new(serper.clone())));
    registry.register(Arc::new(scholar::ScholarTool::new(serper)));
    registry.register(Arc::new(visit));
    registry.register(Arc::new(sandbox::SandboxTool::new(
        &tools.sandbox.endpoint,
        tools.sandbox.timeout_secs,
    )));

    match (tools.research.enabled, generator) {
        (true, Some(generator)) => {
            // The nested run gets the plain tools only, so research cannot recurse.
            let inner = Arc::new(ReasoningLoop::new(
                generator,
                Arc::new(registry.clone()),
                &config.agent,
            ));
            registry.register(Arc::new(research::ResearchTool::new(inner)));
        }
        (true, None) => warn!("research capability enabled but no generator available, skipping"),
        _ => {}
    }

    registry
}
