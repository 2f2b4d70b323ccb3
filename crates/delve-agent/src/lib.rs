//! Delve agent — the reasoning loop and everything it drives.
//!
//! - **extractor**: finds tool invocations in free-form model output
//! - **context**: keeps the transcript inside the context budget
//! - **tools**: capability trait, registry, executor and built-in capabilities
//! - **prompt**: the instruction turn
//! - **agent_loop**: generate → extract → execute until an answer or the budget runs out
//! - **chat**: a conversation that delegates deep questions to the research capability

pub mod agent_loop;
pub mod chat;
pub mod context;
pub mod extractor;
pub mod prompt;
pub mod tools;

pub use agent_loop::{AgentError, ReasoningLoop, RunOutcome, RunState, Termination};
pub use chat::{ChatAgent, ChatStats};
pub use context::ContextManager;
pub use extractor::CallExtractor;
pub use tools::{builtin_registry, Capability, ToolExecutor, ToolRegistry};
