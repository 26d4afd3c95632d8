//! The commit-message generator capability.
//!
//! The orchestrator only knows the [`CommitGenerator`] trait. Implementations
//! must be safe to call concurrently from several tasks and should honor the
//! cancellation token they receive.
//!
//! - [`LlmCommitWriter`] asks an [`LlmProvider`](crate::llm::LlmProvider) for a
//!   Conventional Commits message.
//! - [`CachingGenerator`] wraps any generator with a typed response cache.

pub mod cached;
pub mod llm_writer;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use crate::diff::ChangeRecord;
use crate::error::GenerationError;

pub use cached::CachingGenerator;
pub use llm_writer::{parse_commit_response, LlmCommitWriter, COMMIT_SYSTEM_PROMPT};

/// Caller-supplied context shared by every request of one invocation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerationContext {
    /// Free-form hints from the user (ticket, motivation, ...).
    pub free_text: Option<String>,
    /// A previously generated message the user rejected.
    pub previous_attempt: Option<String>,
}

impl GenerationContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_free_text(mut self, text: impl Into<String>) -> Self {
        let text: String = text.into();
        self.free_text = (!text.trim().is_empty()).then_some(text);
        self
    }

    pub fn with_previous_attempt(mut self, text: impl Into<String>) -> Self {
        let text: String = text.into();
        self.previous_attempt = (!text.trim().is_empty()).then_some(text);
        self
    }
}

/// One unit of work handed to a generator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitRequest {
    pub records: Vec<ChangeRecord>,
    /// Digest of the whole change set; empty for unpartitioned diffs.
    pub stats_summary: String,
    pub context: GenerationContext,
}

impl CommitRequest {
    pub fn new(records: Vec<ChangeRecord>, stats_summary: impl Into<String>, context: GenerationContext) -> Self {
        Self {
            records,
            stats_summary: stats_summary.into(),
            context,
        }
    }
}

/// A generated commit message.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitMessage {
    pub subject: String,
    pub body: String,
    pub footer: String,
    /// Subject, body and footer joined by blank lines.
    pub raw: String,
}

impl CommitMessage {
    /// Builds a message and its raw text from the three parts.
    ///
    /// Empty body or footer sections are left out of the raw text.
    pub fn compose(subject: impl Into<String>, body: impl Into<String>, footer: impl Into<String>) -> Self {
        let subject = subject.into().trim().to_string();
        let body = body.into().trim().to_string();
        let footer = footer.into().trim().to_string();

        let mut raw = subject.clone();
        for section in [&body, &footer] {
            if !section.is_empty() {
                raw.push_str("\n\n");
                raw.push_str(section);
            }
        }

        Self {
            subject,
            body,
            footer,
            raw,
        }
    }
}

/// Something that can turn change records into a commit message.
#[async_trait]
pub trait CommitGenerator: Send + Sync {
    /// Generates a message for `request`.
    ///
    /// Implementations should return [`GenerationError::Cancelled`] promptly
    /// once `cancel` fires.
    async fn generate(
        &self,
        cancel: &CancellationToken,
        request: CommitRequest,
    ) -> Result<CommitMessage, GenerationError>;
}
