//! Dispatch of processed change sets to a commit generator.
//!
//! Small change sets go through a single generator call. Partitioned change
//! sets make one call per group, bounded by a semaphore, and the results
//! are merged back in group-index order.

use std::sync::Arc;
use std::time::Instant;

use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::aggregate::{aggregate_messages, CommitTypePriority};
use crate::error::GenerationError;
use crate::generator::{CommitGenerator, CommitMessage, CommitRequest, GenerationContext};
use crate::processor::{Group, ProcessingResult, DEFAULT_MAX_CONCURRENCY};

type SlotResult = Result<CommitMessage, GenerationError>;

/// Turns a [`ProcessingResult`] into one commit message.
///
/// The orchestrator holds no per-invocation state; every call to
/// [`generate`](Self::generate) is an independent dispatch.
#[derive(Clone)]
pub struct GenerationOrchestrator {
    generator: Arc<dyn CommitGenerator>,
    max_concurrent_calls: usize,
    priority: CommitTypePriority,
}

impl GenerationOrchestrator {
    pub fn new(generator: Arc<dyn CommitGenerator>) -> Self {
        Self {
            generator,
            max_concurrent_calls: DEFAULT_MAX_CONCURRENCY,
            priority: CommitTypePriority::default(),
        }
    }

    /// Caps the number of generator calls in flight at once.
    pub fn with_max_concurrent_calls(mut self, max: usize) -> Self {
        self.max_concurrent_calls = max;
        self
    }

    /// Replaces the tie-break table used when merging subjects.
    pub fn with_priority(mut self, priority: CommitTypePriority) -> Self {
        self.priority = priority;
        self
    }

    pub fn max_concurrent_calls(&self) -> usize {
        self.max_concurrent_calls
    }

    /// Generates a message for `result`.
    ///
    /// # Errors
    ///
    /// - [`GenerationError::NoChanges`] if nothing survived filtering.
    /// - [`GenerationError::Cancelled`] if `cancel` fired before or during
    ///   the dispatch.
    /// - On the single-call path, the generator's error unchanged.
    /// - On the multi-group path, the error of the lowest-indexed group,
    ///   only when every group failed.
    pub async fn generate(
        &self,
        cancel: &CancellationToken,
        result: &ProcessingResult,
        context: &GenerationContext,
    ) -> Result<CommitMessage, GenerationError> {
        if result.is_empty() {
            return Err(GenerationError::NoChanges);
        }

        if !result.requires_chunking || result.groups.len() <= 1 {
            return self.generate_single(cancel, result, context).await;
        }

        self.generate_groups(cancel, &result.groups, &result.summary, context)
            .await
    }

    async fn generate_single(
        &self,
        cancel: &CancellationToken,
        result: &ProcessingResult,
        context: &GenerationContext,
    ) -> Result<CommitMessage, GenerationError> {
        if cancel.is_cancelled() {
            return Err(GenerationError::Cancelled);
        }

        // A lone group carries the shrunk copies of oversized records.
        let records = match result.groups.as_slice() {
            [group] => group.records.clone(),
            _ => result.records.clone(),
        };
        debug!(records = records.len(), "Single generator call");

        let request = CommitRequest::new(records, result.summary.clone(), context.clone());
        self.generator.generate(cancel, request).await
    }

    async fn generate_groups(
        &self,
        cancel: &CancellationToken,
        groups: &[Group],
        summary: &str,
        context: &GenerationContext,
    ) -> Result<CommitMessage, GenerationError> {
        let dispatch_id = Uuid::new_v4();
        let worker_limit = self.max_concurrent_calls.min(groups.len()).max(1);
        let semaphore = Semaphore::new(worker_limit);
        let start = Instant::now();

        info!(
            %dispatch_id,
            groups = groups.len(),
            worker_limit,
            "Dispatching commit generation"
        );

        // Group futures are polled in place, so dropping this call drops
        // every pending group with it.
        let semaphore = &semaphore;
        let tasks = groups.iter().map(|group| {
            let index = group.index;
            let request =
                CommitRequest::new(group.records.clone(), summary.to_string(), context.clone());
            async move {
                let outcome: SlotResult = async move {
                    let _permit = tokio::select! {
                        biased;
                        _ = cancel.cancelled() => return Err(GenerationError::Cancelled),
                        permit = semaphore.acquire() => match permit {
                            Ok(permit) => permit,
                            Err(e) => {
                                return Err(GenerationError::TaskFailed {
                                    group: index,
                                    reason: e.to_string(),
                                })
                            }
                        },
                    };
                    if cancel.is_cancelled() {
                        return Err(GenerationError::Cancelled);
                    }
                    debug!(group = index, records = request.records.len(), "Generating group");
                    self.generator.generate(cancel, request).await
                }
                .await;
                (index, outcome)
            }
        });

        // Every slot is written exactly once, by the group that owns its index.
        let mut slots: Vec<Option<SlotResult>> = (0..groups.len()).map(|_| None).collect();
        for (index, outcome) in futures::future::join_all(tasks).await {
            if let Some(slot) = slots.get_mut(index) {
                *slot = Some(outcome);
            }
        }

        let mut messages = Vec::with_capacity(slots.len());
        let mut first_error = None;
        let mut failed = 0usize;
        let mut cancelled = false;

        for (index, slot) in slots.into_iter().enumerate() {
            match slot {
                Some(Ok(message)) => messages.push(message),
                Some(Err(err)) => {
                    failed += 1;
                    cancelled |= err.is_cancelled();
                    warn!(%dispatch_id, group = index, error = %err, "Group generation failed");
                    first_error.get_or_insert(err);
                }
                None => {
                    failed += 1;
                    first_error.get_or_insert(GenerationError::TaskFailed {
                        group: index,
                        reason: "no result recorded".to_string(),
                    });
                }
            }
        }

        info!(
            %dispatch_id,
            succeeded = messages.len(),
            failed,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Dispatch finished"
        );

        if cancelled {
            return Err(GenerationError::Cancelled);
        }
        if messages.is_empty() {
            return Err(first_error.unwrap_or(GenerationError::NoChanges));
        }

        Ok(aggregate_messages(&messages, &self.priority))
    }
}
