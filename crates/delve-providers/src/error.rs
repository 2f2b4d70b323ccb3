//! Provider errors.

use thiserror::Error;

/// Failures of one generation call.
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("no API key configured (set DELVE_PROVIDER__API_KEY or GLM_API_KEY)")]
    MissingApiKey,

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("failed to decode response: {0}")]
    Decode(String),

    #[error("response contained no choices")]
    EmptyChoices,
}
