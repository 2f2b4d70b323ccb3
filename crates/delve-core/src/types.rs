//! Core types for Delve — transcript turns, tool invocations, and the
//! OpenAI-compatible wire format used to talk to the generator.
//!
//! A transcript is a plain `Vec<Turn>`. Turns are immutable once built: the
//! fields are private and only exposed through accessors.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

// ─────────────────────────────────────────────
// Transcript
// ─────────────────────────────────────────────

/// Who produced a turn.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// The instruction (system) turn. Always first, never pruned.
    Instruction,
    /// The user question, or a synthetic nudge from the loop.
    User,
    /// Raw generator output.
    Assistant,
    /// Wrapped capability output.
    ToolResult,
}

impl Role {
    /// Role name in the OpenAI chat format.
    ///
    /// Tool results are plain text in the transcript, so they go out as `user`.
    pub fn wire_name(self) -> &'static str {
        match self {
            Role::Instruction => "system",
            Role::User | Role::ToolResult => "user",
            Role::Assistant => "assistant",
        }
    }
}

/// One entry of the transcript.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct Turn {
    role: Role,
    text: String,
}

impl Turn {
    /// Create a turn with an explicit role.
    pub fn new(role: Role, text: impl Into<String>) -> Self {
        Turn {
            role,
            text: text.into(),
        }
    }

    /// Create the instruction turn.
    pub fn instruction(text: impl Into<String>) -> Self {
        Self::new(Role::Instruction, text)
    }

    /// Create a user turn.
    pub fn user(text: impl Into<String>) -> Self {
        Self::new(Role::User, text)
    }

    /// Create an assistant turn.
    pub fn assistant(text: impl Into<String>) -> Self {
        Self::new(Role::Assistant, text)
    }

    /// Create a tool-result turn. `text` should already be wrapped.
    pub fn tool_result(text: impl Into<String>) -> Self {
        Self::new(Role::ToolResult, text)
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn is_assistant(&self) -> bool {
        self.role == Role::Assistant
    }
}

// ─────────────────────────────────────────────
// Invocations
// ─────────────────────────────────────────────

/// Arguments passed to a capability.
pub type Arguments = HashMap<String, Value>;

/// A tool-agnostic request to run one capability with named arguments.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Invocation {
    pub name: String,
    pub arguments: Arguments,
}

impl Invocation {
    pub fn new(name: impl Into<String>, arguments: Arguments) -> Self {
        Invocation {
            name: name.into(),
            arguments,
        }
    }

    /// Stable textual identity: name plus arguments with keys sorted at every
    /// nesting level. Two invocations with the same key are duplicates.
    pub fn canonical_key(&self) -> String {
        let mut keys: Vec<&String> = self.arguments.keys().collect();
        keys.sort();
        let args: Vec<String> = keys
            .into_iter()
            .map(|k| format!("{}:{}", Value::String(k.clone()), canonical_json(&self.arguments[k])))
            .collect();
        format!("{}({})", self.name, args.join(","))
    }
}

/// Serialize a JSON value with object keys sorted recursively.
pub fn canonical_json(value: &Value) -> String {
    match value {
        Value::Object(map) => {
            let mut entries: Vec<(&String, &Value)> = map.iter().collect();
            entries.sort_by(|a, b| a.0.cmp(b.0));
            let inner: Vec<String> = entries
                .into_iter()
                .map(|(k, v)| format!("{}:{}", Value::String(k.clone()), canonical_json(v)))
                .collect();
            format!("{{{}}}", inner.join(","))
        }
        Value::Array(items) => {
            let inner: Vec<String> = items.iter().map(canonical_json).collect();
            format!("[{}]", inner.join(","))
        }
        other => other.to_string(),
    }
}

/// Outcome of running one invocation.
#[derive(Clone, Debug, PartialEq)]
pub struct ExecutionResult {
    pub invocation: Invocation,
    pub output: String,
    pub failed: bool,
}

// ─────────────────────────────────────────────
// Delimiter pairs
// ─────────────────────────────────────────────

/// A fixed open/close marker pair that locates a span inside free text.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DelimiterPair {
    pub open: &'static str,
    pub close: &'static str,
}

/// Marks the final answer in generator output.
pub const ANSWER_MARKERS: DelimiterPair = DelimiterPair {
    open: "<answer>",
    close: "</answer>",
};

/// Marks capability output in the transcript.
pub const TOOL_RESPONSE_MARKERS: DelimiterPair = DelimiterPair {
    open: "<tool_response>",
    close: "</tool_response>",
};

impl DelimiterPair {
    /// Text strictly between the first opening marker and the first closing
    /// marker that follows it. `None` unless both appear in that order.
    pub fn find_enclosed<'a>(&self, text: &'a str) -> Option<&'a str> {
        let start = text.find(self.open)? + self.open.len();
        let len = text[start..].find(self.close)?;
        Some(&text[start..start + len])
    }

    /// Whether `text` contains a complete, well-ordered pair.
    pub fn is_enclosed(&self, text: &str) -> bool {
        self.find_enclosed(text).is_some()
    }

    /// Put `body` between the markers, each marker on its own line.
    pub fn wrap(&self, body: &str) -> String {
        format!("{}\n{}\n{}", self.open, body, self.close)
    }

    /// Escape any literal occurrence of either marker so it no longer reads
    /// as a delimiter.
    pub fn neutralize(&self, text: &str) -> String {
        let mut out = text.to_string();
        for marker in [self.close, self.open] {
            if out.contains(marker) {
                out = out.replace(marker, &escape_angle(marker));
            }
        }
        out
    }
}

fn escape_angle(marker: &str) -> String {
    marker.replace('<', "&lt;").replace('>', "&gt;")
}

// ─────────────────────────────────────────────
// Wire format (OpenAI chat completions)
// ─────────────────────────────────────────────

/// A message as sent to an OpenAI-compatible endpoint.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl From<&Turn> for ChatMessage {
    fn from(turn: &Turn) -> Self {
        ChatMessage {
            role: turn.role().wire_name().to_string(),
            content: turn.text().to_string(),
        }
    }
}

/// Request body for an OpenAI-compatible chat completion API.
#[derive(Debug, Serialize)]
pub struct ChatCompletionRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    pub stream: bool,
}

/// Raw chat completion response. Used internally for deserialization.
#[derive(Debug, Deserialize)]
pub struct ChatCompletionResponse {
    pub id: Option<String>,
    pub choices: Vec<ChatChoice>,
    pub usage: Option<UsageInfo>,
}

/// A single choice in a chat completion response.
#[derive(Debug, Deserialize)]
pub struct ChatChoice {
    pub message: AssistantMessage,
    pub finish_reason: Option<String>,
}

/// The assistant message within a chat completion choice.
#[derive(Debug, Deserialize)]
pub struct AssistantMessage {
    pub content: Option<String>,
}

/// Token usage statistics from the API.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct UsageInfo {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

impl ChatCompletionResponse {
    /// Content of the first choice, if any.
    pub fn into_content(self) -> Option<String> {
        self.choices
            .into_iter()
            .next()
            .map(|c| c.message.content.unwrap_or_default())
    }
}

// ─────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────
