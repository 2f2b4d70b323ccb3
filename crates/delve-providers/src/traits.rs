//! Generator trait — the text-generation collaborator of the reasoning loop.
//!
//! The loop only ever asks for "the next completion for this transcript".
//! Any backend (an OpenAI-compatible HTTP API, a local model, a scripted mock
//! in tests) implements this trait.

use async_trait::async_trait;
use delve_core::types::Turn;

use crate::error::ProviderError;

/// Trait that all generators must implement.
#[async_trait]
pub trait Generator: Send + Sync {
    /// Produce the next completion for `transcript`.
    ///
    /// Errors are returned, not retried. The reasoning loop turns them into
    /// transcript text so a run can continue after a failed call.
    async fn generate(&self, transcript: &[Turn]) -> Result<String, ProviderError>;

    /// Display name for logging.
    fn display_name(&self) -> &str;
}
