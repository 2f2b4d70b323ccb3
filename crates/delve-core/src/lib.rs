//! Delve core — transcript types, wire format, configuration, and utilities.
//!
//! This crate has no knowledge of tools or providers; every other crate in the
//! workspace builds on it.

pub mod config;
pub mod types;
pub mod utils;

pub use types::{
    Arguments, DelimiterPair, ExecutionResult, Invocation, Role, Turn, ANSWER_MARKERS,
    TOOL_RESPONSE_MARKERS,
};
