//! Research capability — a whole reasoning run behind one tool call.
//!
//! Lets an outer agent delegate a question to a nested [`ReasoningLoop`]
//! and get back a formatted report.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::info;

use delve_core::types::Arguments;

use super::base::{require_string, Capability};
use crate::agent_loop::{ReasoningLoop, RunOutcome};

pub struct ResearchTool {
    agent: Arc<ReasoningLoop>,
}

impl ResearchTool {
    /// `agent` should not have this tool in its own registry.
    pub fn new(agent: Arc<ReasoningLoop>) -> Self {
        Self { agent }
    }
}

#[async_trait]
impl Capability for ResearchTool {
    fn name(&self) -> &str {
        "research"
    }

    fn description(&self) -> &str {
        "Conduct in-depth research on a topic with search, page visits and analysis, \
         returning a structured report."
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "research_quest": {
                    "type": "string",
                    "description": "The research question or topic to investigate. Be specific."
                }
            },
            "required": ["research_quest"]
        })
    }

    async fn invoke(&self, arguments: Arguments) -> anyhow::Result<String> {
        let quest = require_string(&arguments, "research_quest")?;
        let quest = quest.trim();
        if quest.is_empty() {
            anyhow::bail!("Research question cannot be empty");
        }

        info!(quest = %quest, "nested research started");
        let outcome = self.agent.run(quest).await?;
        Ok(format_report(quest, &outcome))
    }
}

fn format_report(quest: &str, outcome: &RunOutcome) -> String {
    let header = format!("📋 Research Report: {quest}");
    let rule = "=".repeat(header.chars().count());
    format!(
        "{header}\n{rule}\n\n\
         📊 Research Statistics:\n\
         • Generation calls: {}\n\
         • Tool executions: {}\n\
         • Transcript turns: {}\n\n\
         {}\n\n\
         {}\n\
         🔍 Research completed by a nested reasoning run",
        outcome.generation_calls,
        outcome.tool_executions,
        outcome.transcript.len(),
        outcome.answer,
        "=".repeat(50),
    )
}
