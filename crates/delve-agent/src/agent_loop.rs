//! Reasoning loop — generate, extract, execute, repeat.
//!
//! One run owns one [`RunState`]. Each iteration prunes the transcript,
//! asks the generator for the next completion and either stops on an answer,
//! runs the extracted invocations in order, or nudges the model to use its
//! tools. When the call budget is spent the model gets one last request to
//! answer with what it has.

use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, info, warn};

use delve_core::config::AgentConfig;
use delve_core::types::{Turn, ANSWER_MARKERS};
use delve_providers::Generator;

use crate::context::ContextManager;
use crate::extractor::CallExtractor;
use crate::prompt::build_instruction;
use crate::tools::{ToolExecutor, ToolRegistry};

/// User turn appended when a completion has neither an answer nor a call.
pub const NO_CALL_NUDGE: &str =
    "Please use the available tools to gather more information for your research.";

/// User turn appended once the call budget is spent.
pub const FORCE_ANSWER_PROMPT: &str = "Please provide a comprehensive answer based on the information gathered so far, wrapping it in <answer></answer> tags.";

/// Answer returned when the transcript holds no assistant turn at all.
pub const NO_ANSWER_SENTINEL: &str = "No answer could be generated.";

/// Errors that end a run early. Everything else degrades to transcript text.
#[derive(Debug, Error)]
pub enum AgentError {
    #[error("the model requested tools but no capabilities are registered")]
    NoCapabilities,
}

/// How a run ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Termination {
    /// A completion contained a delimited answer.
    Answered,
    /// The call budget ran out and the forced final call was made.
    BudgetExhausted,
}

/// Result of one research run.
#[derive(Clone, Debug)]
pub struct RunOutcome {
    pub answer: String,
    pub generation_calls: u32,
    pub tool_executions: usize,
    pub termination: Termination,
    pub transcript: Vec<Turn>,
}

// ─────────────────────────────────────────────
// RunState
// ─────────────────────────────────────────────

/// Mutable state of a single run. Never shared between runs.
#[derive(Debug)]
pub struct RunState {
    transcript: Vec<Turn>,
    generation_calls_made: u32,
    call_budget: u32,
    tool_executions: usize,
}

impl RunState {
    pub fn new(instruction: String, question: &str, call_budget: u32) -> Self {
        Self {
            transcript: vec![Turn::instruction(instruction), Turn::user(question)],
            generation_calls_made: 0,
            call_budget,
            tool_executions: 0,
        }
    }

    pub fn transcript(&self) -> &[Turn] {
        &self.transcript
    }

    pub fn generation_calls_made(&self) -> u32 {
        self.generation_calls_made
    }

    pub fn budget_exhausted(&self) -> bool {
        self.generation_calls_made >= self.call_budget
    }

    fn into_outcome(self, termination: Termination) -> RunOutcome {
        RunOutcome {
            answer: final_answer(&self.transcript),
            generation_calls: self.generation_calls_made,
            tool_executions: self.tool_executions,
            termination,
            transcript: self.transcript,
        }
    }
}

/// Newest assistant turn with a complete answer pair (inner text, trimmed),
/// else the newest assistant turn verbatim, else the sentinel.
pub fn final_answer(transcript: &[Turn]) -> String {
    let mut assistant_turns = transcript.iter().rev().filter(|t| t.is_assistant());

    if let Some(answer) = assistant_turns
        .clone()
        .find_map(|t| ANSWER_MARKERS.find_enclosed(t.text()))
    {
        return answer.trim().to_string();
    }

    assistant_turns
        .next()
        .map(|t| t.text().to_string())
        .unwrap_or_else(|| NO_ANSWER_SENTINEL.to_string())
}

// ─────────────────────────────────────────────
// ReasoningLoop
// ─────────────────────────────────────────────

/// Drives research runs against one generator and one capability registry.
pub struct ReasoningLoop {
    generator: Arc<dyn Generator>,
    registry: Arc<ToolRegistry>,
    executor: ToolExecutor,
    extractor: CallExtractor,
    context: ContextManager,
    call_budget: u32,
    instruction: Option<String>,
}

impl ReasoningLoop {
    pub fn new(generator: Arc<dyn Generator>, registry: Arc<ToolRegistry>, config: &AgentConfig) -> Self {
        let extractor = CallExtractor::for_registry(&registry);
        info!(
            generator = generator.display_name(),
            tools = registry.len(),
            call_budget = config.call_budget,
            context_budget = config.context_budget,
            "reasoning loop initialized"
        );
        Self {
            generator,
            executor: ToolExecutor::new(registry.clone()),
            registry,
            extractor,
            context: ContextManager::new(config.context_budget, config.recent_window),
            call_budget: config.call_budget,
            instruction: None,
        }
    }

    /// Use a fixed instruction turn instead of the generated prompt.
    pub fn with_instruction(mut self, instruction: impl Into<String>) -> Self {
        self.instruction = Some(instruction.into());
        self
    }

    pub fn registry(&self) -> &ToolRegistry {
        &self.registry
    }

    pub fn call_budget(&self) -> u32 {
        self.call_budget
    }

    /// Answer `question`, returning only the answer text.
    pub async fn research(&self, question: &str) -> Result<String, AgentError> {
        Ok(self.run(question).await?.answer)
    }

    /// Answer `question` with the configured call budget.
    pub async fn run(&self, question: &str) -> Result<RunOutcome, AgentError> {
        self.run_with_budget(question, self.call_budget).await
    }

    /// Answer `question` with an explicit call budget.
    pub async fn run_with_budget(&self, question: &str, call_budget: u32) -> Result<RunOutcome, AgentError> {
        let instruction = self
            .instruction
            .clone()
            .unwrap_or_else(|| build_instruction(&self.registry));
        let mut state = RunState::new(instruction, question, call_budget);

        info!(call_budget, "research run started");

        let termination = loop {
            if state.budget_exhausted() {
                break self.force_answer(&mut state).await;
            }

            self.context.prune(&mut state.transcript);
            let output = self.generate(&mut state).await;

            if ANSWER_MARKERS.is_enclosed(&output) {
                break Termination::Answered;
            }

            let invocations = self.extractor.extract(&output);
            if invocations.is_empty() {
                debug!(calls = state.generation_calls_made, "no call detected");
                state.transcript.push(Turn::user(NO_CALL_NUDGE));
                continue;
            }

            if self.registry.is_empty() {
                warn!(requested = invocations.len(), "invocations extracted with an empty registry");
                return Err(AgentError::NoCapabilities);
            }

            for invocation in &invocations {
                let result = self.executor.execute(invocation).await;
                state.tool_executions += 1;
                state.transcript.push(ToolExecutor::to_turn(&result));
            }
        };

        let outcome = state.into_outcome(termination);
        info!(
            calls = outcome.generation_calls,
            tool_executions = outcome.tool_executions,
            termination = ?outcome.termination,
            "research run finished"
        );
        Ok(outcome)
    }

    /// Ask once more for an answer, ignoring the budget.
    async fn force_answer(&self, state: &mut RunState) -> Termination {
        warn!(calls = state.generation_calls_made, "call budget exhausted, forcing an answer");
        state.transcript.push(Turn::user(FORCE_ANSWER_PROMPT));
        self.context.prune(&mut state.transcript);
        self.generate(state).await;
        Termination::BudgetExhausted
    }

    /// One generation call. Failures become the assistant turn text.
    async fn generate(&self, state: &mut RunState) -> String {
        state.generation_calls_made += 1;
        debug!(
            call = state.generation_calls_made,
            turns = state.transcript.len(),
            "calling generator"
        );

        let output = match self.generator.generate(&state.transcript).await {
            Ok(text) => text,
            Err(e) => {
                warn!(error = %e, "generation failed");
                format!("LLM API Error: {e}")
            }
        };
        state.transcript.push(Turn::assistant(output.clone()));
        output
    }
}
