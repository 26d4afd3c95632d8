//! diffscribe: Conventional Commits messages from git diffs.
//!
//! The library parses unified diffs and numstat output into change records,
//! filters and partitions them, and dispatches the partitions to a commit
//! message generator with bounded concurrency.

pub mod cli;
pub mod diff;
pub mod error;
pub mod generator;
pub mod llm;
pub mod pipeline;
pub mod processor;

// Re-export commonly used types
pub use diff::{ChangeRecord, ChangeType, DiffParser};
pub use error::{GenerationError, LlmError};
pub use generator::{CommitGenerator, CommitMessage, CommitRequest, GenerationContext};
pub use pipeline::{CommitPipeline, GenerationOrchestrator, PipelineConfig};
pub use processor::{DiffProcessor, ProcessingConfig, ProcessingResult};
