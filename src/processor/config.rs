//! Sizing knobs for the diff processor.

use serde::{Deserialize, Serialize};

/// Default total diff size (bytes) above which records are partitioned.
pub const DEFAULT_SIZE_THRESHOLD: usize = 10 * 1024;
/// Default per-record content size (bytes) above which content is replaced
/// by a statistics-only summary.
pub const DEFAULT_MAX_CHUNK_CONTENT_SIZE: usize = 100 * 1024;
/// Default cap on the number of groups.
pub const DEFAULT_MAX_CONCURRENCY: usize = 3;

/// Configuration for [`DiffProcessor`](super::DiffProcessor).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessingConfig {
    /// Total content size that triggers partitioning.
    pub size_threshold: usize,
    /// Largest content a single record may carry once partitioning kicks in.
    pub max_chunk_content_size: usize,
    /// Maximum number of groups produced.
    pub max_concurrency: usize,
}

impl Default for ProcessingConfig {
    fn default() -> Self {
        Self {
            size_threshold: DEFAULT_SIZE_THRESHOLD,
            max_chunk_content_size: DEFAULT_MAX_CHUNK_CONTENT_SIZE,
            max_concurrency: DEFAULT_MAX_CONCURRENCY,
        }
    }
}

impl ProcessingConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_size_threshold(mut self, bytes: usize) -> Self {
        self.size_threshold = bytes;
        self
    }

    pub fn with_max_chunk_content_size(mut self, bytes: usize) -> Self {
        self.max_chunk_content_size = bytes;
        self
    }

    pub fn with_max_concurrency(mut self, max: usize) -> Self {
        self.max_concurrency = max;
        self
    }
}
