//! Chat agent — a conversation that hands deep questions to the `research`
//! capability.
//!
//! Each user message is one generation call over the conversation so far.
//! When the model answers with a `research` call, the nested run executes
//! right away and its report becomes the reply. Vague research requests get
//! a clarification prompt instead of a generation call.

use std::sync::Arc;

use tracing::{debug, info, warn};

use delve_core::config::AgentConfig;
use delve_core::types::{Role, Turn};
use delve_providers::Generator;

use crate::context::ContextManager;
use crate::extractor::CallExtractor;
use crate::tools::{Capability, ToolExecutor, ToolRegistry};

/// Instruction turn of every conversation.
pub const CHAT_INSTRUCTION: &str = r#"You are a helpful assistant with deep research capabilities. You hold natural conversations and run thorough research when a question calls for it.

What you do:
1. Conversation: answer general questions and casual messages directly.
2. Clarification: when a research request is broad or ambiguous, help the user narrow it down first.
3. Research: for current events, scientific or technical topics, historical analysis and anything that needs several sources, delegate to the research tool.

To start research, reply with ONLY this JSON object:
{"name": "research", "arguments": {"research_quest": "the clarified research question"}}

Guidelines:
- Keep the conversation friendly and concise.
- Ask follow-up questions when the research goal is unclear.
- Present research findings in an accessible way.
- Use earlier messages for context.
- Be honest about what you do and do not know."#;

/// Extra instruction added to the request when a message looks like research.
pub const RESEARCH_HINT: &str = r#"The user is asking for research. Clarify the question if needed, then call the research tool:
{"name": "research", "arguments": {"research_quest": "the clarified research question"}}"#;

/// Reply to an empty message.
pub const EMPTY_MESSAGE_REPLY: &str = "Please provide a message to continue our conversation.";

/// Reply to a research request that is too vague to run.
pub const CLARIFICATION_REPLY: &str = "I'd be happy to research that! To make the results useful, could you tell me a bit more:

1. **Focus**: which aspect of the topic interests you most?
2. **Time range**: current information, historical context, or both?
3. **Purpose**: academic work, a business decision, general curiosity?
4. **Depth**: a broad overview or technical detail?

For example, instead of \"tell me about AI\" you could ask:
- \"Current applications of AI in healthcare\"
- \"Ethical implications of AI in hiring\"
- \"Technical challenges in training large language models\"

What would you like me to research?";

/// Phrases that mark a message as a research request.
const RESEARCH_INDICATORS: &[&str] = &[
    "research",
    "investigate",
    "study",
    "analyze",
    "find information about",
    "look into",
    "explore",
    "examine",
    "investigation",
    "tell me about",
    "what is",
    "how does",
    "why is",
    "where can i find",
    "latest developments",
    "current status",
    "recent advances",
    "state of the art",
    "comprehensive",
];

/// Openings of research requests that need more detail unless they are long.
const VAGUE_OPENINGS: &[&str] = &[
    "tell me about ",
    "what is ",
    "how does ",
    "why is ",
    "research ",
    "information about ",
];

/// Messages shorter than this (in characters) are too vague to research.
const MIN_RESEARCH_CHARS: usize = 10;

/// Vague openings with more words than this count as specific enough.
const SPECIFIC_WORD_COUNT: usize = 6;

/// Name of the capability the chat agent delegates to.
const RESEARCH_TOOL: &str = "research";

/// Conversation counters.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ChatStats {
    /// User and assistant turns, excluding the instruction.
    pub turns: usize,
    pub research_runs: usize,
}

// ─────────────────────────────────────────────
// ChatAgent
// ─────────────────────────────────────────────

pub struct ChatAgent {
    generator: Arc<dyn Generator>,
    executor: ToolExecutor,
    extractor: CallExtractor,
    context: ContextManager,
    transcript: Vec<Turn>,
    research_runs: usize,
}

impl ChatAgent {
    /// `research` is normally a [`ResearchTool`](crate::tools::research::ResearchTool);
    /// it must be named `research`.
    pub fn new(generator: Arc<dyn Generator>, research: Arc<dyn Capability>, config: &AgentConfig) -> Self {
        let mut registry = ToolRegistry::new();
        registry.register(research);
        let extractor = CallExtractor::for_registry(&registry);

        Self {
            generator,
            executor: ToolExecutor::new(Arc::new(registry)),
            extractor,
            context: ContextManager::new(config.context_budget, config.recent_window),
            transcript: vec![Turn::instruction(CHAT_INSTRUCTION)],
            research_runs: 0,
        }
    }

    /// Reply to one user message.
    pub async fn chat(&mut self, message: &str) -> String {
        let message = message.trim();
        if message.is_empty() {
            return EMPTY_MESSAGE_REPLY.to_string();
        }

        self.transcript.push(Turn::user(message));

        let research = is_research_request(message);
        if research && needs_clarification(message) {
            debug!("research request too vague, asking for details");
            return self.reply(CLARIFICATION_REPLY.to_string());
        }

        self.context.prune(&mut self.transcript);
        let output = match self.generate(research).await {
            Ok(text) => text,
            Err(e) => {
                warn!(error = %e, "chat generation failed");
                return self.reply(format!("I apologize, but I encountered an error: {e}"));
            }
        };

        let quest = self
            .extractor
            .extract(&output)
            .into_iter()
            .find(|inv| inv.name == RESEARCH_TOOL && inv.arguments.contains_key("research_quest"));

        let Some(invocation) = quest else {
            return self.reply(output);
        };

        info!(quest = ?invocation.arguments.get("research_quest"), "delegating to research");
        let result = self.executor.execute(&invocation).await;
        self.research_runs += 1;
        self.reply(format_research_for_chat(&result.output))
    }

    /// Turns of the conversation, instruction first.
    pub fn history(&self) -> &[Turn] {
        &self.transcript
    }

    /// Forget everything but the instruction.
    pub fn reset(&mut self) {
        self.transcript.truncate(1);
        self.research_runs = 0;
    }

    pub fn stats(&self) -> ChatStats {
        ChatStats {
            turns: self.transcript.len() - 1,
            research_runs: self.research_runs,
        }
    }

    async fn generate(&self, research: bool) -> Result<String, delve_providers::ProviderError> {
        if !research {
            return self.generator.generate(&self.transcript).await;
        }
        let mut request = Vec::with_capacity(self.transcript.len() + 1);
        request.push(self.transcript[0].clone());
        request.push(Turn::instruction(RESEARCH_HINT));
        request.extend(self.transcript[1..].iter().cloned());
        self.generator.generate(&request).await
    }

    fn reply(&mut self, text: String) -> String {
        self.transcript.push(Turn::new(Role::Assistant, text.clone()));
        text
    }
}

// ─────────────────────────────────────────────
// Message classification
// ─────────────────────────────────────────────

/// Whether `message` asks for research.
pub fn is_research_request(message: &str) -> bool {
    let lower = message.to_lowercase();
    RESEARCH_INDICATORS.iter().any(|phrase| lower.contains(phrase))
}

/// Whether a research request is too short or too generic to run.
pub fn needs_clarification(message: &str) -> bool {
    let lower = message.trim().to_lowercase();
    if lower.chars().count() < MIN_RESEARCH_CHARS {
        return true;
    }
    VAGUE_OPENINGS.iter().any(|opening| lower.starts_with(opening))
        && lower.split_whitespace().count() <= SPECIFIC_WORD_COUNT
}

/// Present a research report as a chat reply.
///
/// The report body sits between the rule under its header and the closing
/// rule; anything that is not a report (such as an error) is shown as is.
pub fn format_research_for_chat(report: &str) -> String {
    let mut lines = report.lines();
    let body = if lines.any(|l| l.starts_with('=')) {
        lines
            .take_while(|l| !l.starts_with('='))
            .collect::<Vec<_>>()
            .join("\n")
            .trim()
            .to_string()
    } else {
        report.trim().to_string()
    };

    let body = if body.is_empty() {
        "Research completed but no content was generated.".to_string()
    } else {
        body
    };

    format!(
        "📊 **Research Results**\n\n{body}\n\n---\n\n\
         💡 *Ask me to dig deeper or explore another angle anytime.*"
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use delve_core::types::Arguments;
    use delve_providers::ProviderError;
    use serde_json::{json, Value};

    /// Returns canned replies in order and records every request.
    struct ScriptedGenerator {
        replies: std::sync::Mutex<Vec<Result<String, String>>>,
        seen: std::sync::Mutex<Vec<Vec<Turn>>>,
    }

    impl ScriptedGenerator {
        fn new(replies: Vec<Result<&str, &str>>) -> Arc<Self> {
            Arc::new(Self {
                replies: std::sync::Mutex::new(
                    replies
                        .into_iter()
                        .map(|r| r.map(str::to_string).map_err(str::to_string))
                        .collect(),
                ),
                seen: std::sync::Mutex::new(Vec::new()),
            })
        }

        fn calls(&self) -> usize {
            self.seen.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl Generator for ScriptedGenerator {
        async fn generate(&self, transcript: &[Turn]) -> Result<String, ProviderError> {
            self.seen.lock().unwrap().push(transcript.to_vec());
            let mut replies = self.replies.lock().unwrap();
            if replies.is_empty() {
                return Ok("ok".into());
            }
            replies.remove(0).map_err(ProviderError::Decode)
        }

        fn display_name(&self) -> &str {
            "scripted"
        }
    }

    /// Stands in for the nested research run.
    #[derive(Default)]
    struct FakeResearch {
        quests: std::sync::Mutex<Vec<String>>,
    }

    #[async_trait]
    impl Capability for FakeResearch {
        fn name(&self) -> &str {
            "research"
        }
        fn description(&self) -> &str {
            "research"
        }
        fn parameters(&self) -> Value {
            json!({"type": "object", "properties": {"research_quest": {"type": "string"}}, "required": ["research_quest"]})
        }
        async fn invoke(&self, arguments: Arguments) -> anyhow::Result<String> {
            let quest = crate::tools::require_string(&arguments, "research_quest")?;
            self.quests.lock().unwrap().push(quest.clone());
            Ok(format!(
                "📋 Research Report: {quest}\n=====\n\n• Generation calls: 2\n\nRust 1.0 shipped in May 2015.\n\n{}\n🔍 done",
                "=".repeat(10)
            ))
        }
    }

    fn chat_agent(generator: Arc<ScriptedGenerator>, research: Arc<FakeResearch>) -> ChatAgent {
        ChatAgent::new(generator, research, &AgentConfig::default())
    }

    #[tokio::test]
    async fn test_plain_conversation() {
        let generator = ScriptedGenerator::new(vec![Ok("Hello! How can I help?")]);
        let mut agent = chat_agent(generator.clone(), Arc::default());

        let reply = agent.chat("hi there, good morning").await;
        assert_eq!(reply, "Hello! How can I help?");
        assert_eq!(agent.stats(), ChatStats { turns: 2, research_runs: 0 });

        let seen = generator.seen.lock().unwrap();
        assert_eq!(seen[0].len(), 2);
        assert_eq!(seen[0][0].text(), CHAT_INSTRUCTION);
    }

    #[tokio::test]
    async fn test_empty_message_skips_generation() {
        let generator = ScriptedGenerator::new(vec![]);
        let mut agent = chat_agent(generator.clone(), Arc::default());

        assert_eq!(agent.chat("   ").await, EMPTY_MESSAGE_REPLY);
        assert_eq!(generator.calls(), 0);
        assert_eq!(agent.stats().turns, 0);
    }

    #[tokio::test]
    async fn test_vague_research_asks_for_clarification() {
        let generator = ScriptedGenerator::new(vec![]);
        let mut agent = chat_agent(generator.clone(), Arc::default());

        assert_eq!(agent.chat("tell me about AI").await, CLARIFICATION_REPLY);
        assert_eq!(generator.calls(), 0);
    }

    #[tokio::test]
    async fn test_research_call_is_delegated() {
        let generator = ScriptedGenerator::new(vec![Ok(
            "{\"name\": \"research\", \"arguments\": {\"research_quest\": \"When did Rust 1.0 ship?\"}}",
        )]);
        let research = Arc::new(FakeResearch::default());
        let mut agent = chat_agent(generator.clone(), research.clone());

        let reply = agent
            .chat("Please research the release history of the Rust programming language")
            .await;

        assert!(reply.starts_with("📊 **Research Results**"));
        assert!(reply.contains("Rust 1.0 shipped in May 2015."));
        assert!(reply.contains("• Generation calls: 2"));
        assert!(!reply.contains("🔍 done"));
        assert_eq!(*research.quests.lock().unwrap(), vec!["When did Rust 1.0 ship?".to_string()]);
        assert_eq!(agent.stats().research_runs, 1);

        // Research-looking messages carry the extra hint.
        let seen = generator.seen.lock().unwrap();
        assert_eq!(seen[0][1].text(), RESEARCH_HINT);
        assert_eq!(seen[0][1].role(), Role::Instruction);
    }

    #[tokio::test]
    async fn test_loose_research_call_is_delegated() {
        let generator = ScriptedGenerator::new(vec![Ok(
            "Sure. {\"name\": \"research\", \"research_quest\": \"tokio scheduler design\"}",
        )]);
        let research = Arc::new(FakeResearch::default());
        let mut agent = chat_agent(generator, research.clone());

        agent.chat("Can you investigate how the tokio scheduler works in depth?").await;
        assert_eq!(*research.quests.lock().unwrap(), vec!["tokio scheduler design".to_string()]);
    }

    #[tokio::test]
    async fn test_other_calls_are_plain_replies() {
        let text = "{\"name\": \"search\", \"arguments\": {\"query\": \"rust\"}}";
        let generator = ScriptedGenerator::new(vec![Ok(text)]);
        let research = Arc::new(FakeResearch::default());
        let mut agent = chat_agent(generator, research.clone());

        assert_eq!(agent.chat("good evening to you").await, text);
        assert!(research.quests.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_generation_error_becomes_reply() {
        let generator = ScriptedGenerator::new(vec![Err("rate limited")]);
        let mut agent = chat_agent(generator, Arc::default());

        let reply = agent.chat("hello again, friend").await;
        assert!(reply.starts_with("I apologize, but I encountered an error:"));
        assert!(reply.contains("rate limited"));
        assert_eq!(agent.history().last().unwrap().text(), reply);
    }

    #[tokio::test]
    async fn test_history_and_reset() {
        let generator = ScriptedGenerator::new(vec![Ok("first"), Ok("second")]);
        let mut agent = chat_agent(generator.clone(), Arc::default());

        agent.chat("my name is Ferris").await;
        agent.chat("what did I just say?").await;
        assert_eq!(agent.stats().turns, 4);

        // The second request carried the whole conversation.
        assert_eq!(generator.seen.lock().unwrap()[1].len(), 4);

        agent.reset();
        assert_eq!(agent.history().len(), 1);
        assert_eq!(agent.history()[0].role(), Role::Instruction);
        assert_eq!(agent.stats(), ChatStats { turns: 0, research_runs: 0 });
    }

    #[test]
    fn test_research_detection() {
        assert!(is_research_request("Please INVESTIGATE solar panels"));
        assert!(is_research_request("what is the state of the art in OCR?"));
        assert!(!is_research_request("good morning"));
    }

    #[test]
    fn test_clarification_rules() {
        assert!(needs_clarification("research"));
        assert!(needs_clarification("what is quantum computing"));
        assert!(!needs_clarification(
            "what is the current status of quantum error correction hardware"
        ));
        assert!(!needs_clarification("investigate battery recycling economics in Europe"));
    }

    #[test]
    fn test_format_non_report_verbatim() {
        let out = format_research_for_chat("Error executing research: boom");
        assert!(out.contains("Error executing research: boom"));

        let empty = format_research_for_chat("📋 Research Report: x\n===\n\n===\nfooter");
        assert!(empty.contains("no content was generated"));
    }
}
