//! Processing policy applied between parsing and generation.
//!
//! The processor drops lock files, measures what is left and, when the change
//! set is larger than the configured threshold, partitions it into groups that
//! can be sent to the generator concurrently:
//!
//! 1. **Filter**: records flagged as lock files are removed.
//! 2. **Measure**: total content size of the remaining records.
//! 3. **Decide**: partition only when the size exceeds `size_threshold`.
//! 4. **Shrink**: records larger than `max_chunk_content_size` keep only a
//!    statistics summary.
//! 5. **Group**: round-robin into at most `max_concurrency` groups.
//! 6. **Summarize**: a digest of every record for context.

pub mod chunker;
pub mod config;
pub mod summary;

pub use chunker::{DiffProcessor, Group, ProcessingResult};
pub use config::{
    ProcessingConfig, DEFAULT_MAX_CHUNK_CONTENT_SIZE, DEFAULT_MAX_CONCURRENCY,
    DEFAULT_SIZE_THRESHOLD,
};
pub use summary::{shrink_record, summarize};
