//! Filtering, sizing and partitioning of change records.

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::config::ProcessingConfig;
use super::summary::{shrink_record, summarize};
use crate::diff::ChangeRecord;

/// A disjoint slice of the change set dispatched as one unit of work.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Group {
    /// Position of this group in the partition.
    pub index: usize,
    pub records: Vec<ChangeRecord>,
    /// Sum of the content lengths of `records`.
    pub total_size: usize,
}

impl Group {
    fn new(index: usize, records: Vec<ChangeRecord>) -> Self {
        let total_size = records.iter().map(ChangeRecord::content_len).sum();
        Self {
            index,
            records,
            total_size,
        }
    }
}

/// Outcome of processing one parsed diff.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessingResult {
    /// Records that survived filtering, in input order, with their original
    /// content.
    pub records: Vec<ChangeRecord>,
    /// Sum of the content lengths of `records`.
    pub total_size: usize,
    /// Whether `total_size` exceeded the configured threshold.
    pub requires_chunking: bool,
    /// Partition of `records`; empty unless `requires_chunking`.
    /// Oversized records appear here in their shrunk form.
    pub groups: Vec<Group>,
    /// Digest of the change set; empty unless `requires_chunking`.
    pub summary: String,
}

impl ProcessingResult {
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Applies the processing policy to parsed records.
#[derive(Debug, Clone, Default)]
pub struct DiffProcessor {
    config: ProcessingConfig,
}

impl DiffProcessor {
    pub fn new(config: ProcessingConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ProcessingConfig {
        &self.config
    }

    /// Filters lock files, measures the remainder and, when it is too large,
    /// shrinks oversized records and deals them round-robin into groups.
    pub fn process(&self, records: Vec<ChangeRecord>) -> ProcessingResult {
        let input_count = records.len();
        let records: Vec<ChangeRecord> = records.into_iter().filter(|r| !r.is_lock_file).collect();
        let total_size: usize = records.iter().map(ChangeRecord::content_len).sum();
        let requires_chunking = total_size > self.config.size_threshold;

        debug!(
            input = input_count,
            kept = records.len(),
            lock_files = input_count - records.len(),
            total_size,
            threshold = self.config.size_threshold,
            requires_chunking,
            "Processed change records"
        );

        if !requires_chunking {
            return ProcessingResult {
                records,
                total_size,
                requires_chunking,
                groups: Vec::new(),
                summary: String::new(),
            };
        }

        let limit = self.config.max_chunk_content_size;
        let bounded: Vec<ChangeRecord> = records
            .iter()
            .map(|record| {
                if record.content_len() > limit {
                    debug!(
                        file = %record.file_path,
                        size = record.content_len(),
                        limit,
                        "Replacing oversized record content with statistics"
                    );
                    shrink_record(record, limit)
                } else {
                    record.clone()
                }
            })
            .collect();

        let summary = summarize(&bounded);
        let groups = partition(bounded, self.config.max_concurrency);

        debug!(groups = groups.len(), "Partitioned change records");

        ProcessingResult {
            records,
            total_size,
            requires_chunking,
            groups,
            summary,
        }
    }
}

/// Deals records round-robin into at most `max_groups` groups, preserving
/// input order within each group and dropping empty ones.
fn partition(records: Vec<ChangeRecord>, max_groups: usize) -> Vec<Group> {
    let count = max_groups.max(1).min(records.len());
    let mut buckets: Vec<Vec<ChangeRecord>> = vec![Vec::new(); count];
    for (i, record) in records.into_iter().enumerate() {
        buckets[i % count].push(record);
    }

    buckets
        .into_iter()
        .filter(|bucket| !bucket.is_empty())
        .enumerate()
        .map(|(index, bucket)| Group::new(index, bucket))
        .collect()
}
