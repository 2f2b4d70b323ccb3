//! Generator layer for Delve.
//!
//! # Architecture
//!
//! - [`traits::Generator`] — trait that every text-generation backend implements
//! - [`http_provider::HttpGenerator`] — OpenAI-compatible HTTP client
//! - [`error::ProviderError`] — failures of a single generation call

pub mod error;
pub mod http_provider;
pub mod traits;

// Re-export main types for convenience
pub use error::ProviderError;
pub use http_provider::HttpGenerator;
pub use traits::Generator;
