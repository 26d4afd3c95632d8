//! Generation pipeline.
//!
//! Wires the diff parser and processor to a [`CommitGenerator`](crate::generator::CommitGenerator)
//! and merges per-group results.
//!
//! # Flow
//!
//! 1. **Parse**: raw diff and numstat text become change records
//! 2. **Process**: lock files are dropped and large change sets are partitioned
//! 3. **Dispatch**: one generator call, or one bounded concurrent call per group
//! 4. **Aggregate**: surviving group messages are merged in group order
//!
//! # Example
//!
//! ```rust,ignore
//! use diffscribe::llm::LiteLlmClient;
//! use diffscribe::pipeline::{CommitPipeline, PipelineConfig};
//! use diffscribe::generator::GenerationContext;
//! use tokio_util::sync::CancellationToken;
//! use std::sync::Arc;
//!
//! let config = PipelineConfig::from_env()?;
//! let pipeline = CommitPipeline::with_llm(Arc::new(LiteLlmClient::from_env()?), &config);
//!
//! let cancel = CancellationToken::new();
//! let outcome = pipeline
//!     .run(&cancel, &diff, &numstat, &GenerationContext::new().with_free_text("JIRA-12"))
//!     .await?;
//! println!("{}", outcome.message.raw);
//! ```
//!
//! # Failure policy
//!
//! When several groups are dispatched, the call only fails if every group
//! failed. Otherwise the failed groups are left out of the merged message and
//! logged at `warn` level.

pub mod aggregate;
pub mod config;
pub mod orchestrator;
pub mod runner;

pub use aggregate::{aggregate_messages, commit_type, CommitTypePriority, DEFAULT_TYPE_PRIORITY};
pub use config::{ConfigError, PipelineConfig, DEFAULT_TIMEOUT};
pub use orchestrator::GenerationOrchestrator;
pub use runner::{CommitPipeline, PipelineOutcome};
