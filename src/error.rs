//! Error types for diffscribe operations.
//!
//! Parsing and processing are infallible; errors only arise at the generator
//! boundary:
//! - LLM API interactions
//! - Commit message generation and dispatch

use thiserror::Error;

/// Errors that can occur during LLM operations.
#[derive(Debug, Error)]
pub enum LlmError {
    #[error("Missing API key: set OPENROUTER_API_KEY or LITELLM_API_KEY")]
    MissingApiKey,

    #[error("Missing API base URL: LITELLM_API_BASE environment variable not set")]
    MissingApiBase,

    #[error("HTTP request failed: {0}")]
    RequestFailed(String),

    #[error("Failed to parse LLM response: {0}")]
    ParseError(String),

    #[error("Rate limited: {0}")]
    RateLimited(String),

    #[error("API error ({code}): {message}")]
    ApiError { code: u16, message: String },

    #[error("LLM returned no content")]
    EmptyResponse,
}

/// Errors that can occur while generating a commit message.
#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("Generation cancelled")]
    Cancelled,

    #[error("No changes to describe after filtering")]
    NoChanges,

    #[error("LLM error: {0}")]
    Llm(#[from] LlmError),

    #[error("Invalid generator response: {0}")]
    InvalidResponse(String),

    #[error("Generation task for group {group} failed: {reason}")]
    TaskFailed { group: usize, reason: String },
}

impl GenerationError {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, GenerationError::Cancelled)
    }
}
