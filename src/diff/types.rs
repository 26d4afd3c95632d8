//! Structured change records produced by the diff parser.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Kind of change applied to a single file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeType {
    Added,
    Modified,
    Deleted,
    Renamed,
}

impl ChangeType {
    /// One-letter marker used in digests (`A`, `M`, `D`, `R`).
    pub fn marker(&self) -> char {
        match self {
            ChangeType::Added => 'A',
            ChangeType::Modified => 'M',
            ChangeType::Deleted => 'D',
            ChangeType::Renamed => 'R',
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ChangeType::Added => "added",
            ChangeType::Modified => "modified",
            ChangeType::Deleted => "deleted",
            ChangeType::Renamed => "renamed",
        }
    }
}

impl fmt::Display for ChangeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Line statistics for one file, as reported by `git diff --numstat`.
///
/// Only lives long enough to be merged into a [`ChangeRecord`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FileStat {
    pub additions: u32,
    pub deletions: u32,
    pub is_binary: bool,
}

/// One file's change within a diff.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeRecord {
    /// Final path of the file.
    pub file_path: String,
    /// Previous path. Non-empty exactly when `change_type` is `Renamed`.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub old_path: String,
    pub change_type: ChangeType,
    pub additions: u32,
    pub deletions: u32,
    /// Raw per-file diff text, starting at its `diff --git` header.
    pub content: String,
    pub is_lock_file: bool,
    pub is_binary: bool,
}

impl ChangeRecord {
    /// Creates a record with zero counts and no flags set.
    pub fn new(file_path: impl Into<String>, change_type: ChangeType) -> Self {
        Self {
            file_path: file_path.into(),
            old_path: String::new(),
            change_type,
            additions: 0,
            deletions: 0,
            content: String::new(),
            is_lock_file: false,
            is_binary: false,
        }
    }

    /// Marks this record as a rename from `old_path`.
    ///
    /// An empty `old_path` leaves the change type untouched so the
    /// rename/old-path pairing always holds.
    pub fn renamed_from(mut self, old_path: impl Into<String>) -> Self {
        let old_path = old_path.into();
        if !old_path.is_empty() {
            self.old_path = old_path;
            self.change_type = ChangeType::Renamed;
        }
        self
    }

    pub fn with_content(mut self, content: impl Into<String>) -> Self {
        self.content = content.into();
        self
    }

    pub fn with_counts(mut self, additions: u32, deletions: u32) -> Self {
        self.additions = additions;
        self.deletions = deletions;
        self
    }

    pub fn with_binary(mut self, is_binary: bool) -> Self {
        self.is_binary = is_binary;
        self
    }

    pub fn with_lock_file(mut self, is_lock_file: bool) -> Self {
        self.is_lock_file = is_lock_file;
        self
    }

    /// Size of the payload this record contributes downstream.
    pub fn content_len(&self) -> usize {
        self.content.len()
    }

    pub fn is_rename(&self) -> bool {
        self.change_type == ChangeType::Renamed
    }
}
