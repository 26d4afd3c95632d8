//! Best-effort parser for `git diff` and `git diff --numstat` output.
//!
//! The parser never fails: malformed headers degrade to a `Modified` record
//! with whatever path could be recovered, and files missing from the numstat
//! output keep zero counts.

use std::collections::HashMap;

use tracing::debug;

use super::lockfiles::LockFilePolicy;
use super::types::{ChangeRecord, ChangeType, FileStat};

const DIFF_HEADER: &str = "diff --git ";
const RENAME_MARKER: &str = " => ";

/// Converts raw diff and numstat text into ordered [`ChangeRecord`]s.
#[derive(Debug, Clone, Default)]
pub struct DiffParser {
    lock_policy: LockFilePolicy,
}

impl DiffParser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the lock-file rules used to flag records.
    pub fn with_lock_policy(mut self, policy: LockFilePolicy) -> Self {
        self.lock_policy = policy;
        self
    }

    /// Parses a unified diff plus its numstat companion.
    ///
    /// Records come out in the order their segments appear in `diff`.
    pub fn parse(&self, diff: &str, numstat: &str) -> Vec<ChangeRecord> {
        let stats = parse_numstat(numstat);

        let records: Vec<ChangeRecord> = split_segments(diff)
            .into_iter()
            .filter_map(parse_segment)
            .map(|mut record| {
                if let Some(stat) = stats.get(&record.file_path) {
                    record.additions = stat.additions;
                    record.deletions = stat.deletions;
                    record.is_binary |= stat.is_binary;
                }
                record.is_lock_file = self.lock_policy.is_lock_file(&record.file_path);
                record
            })
            .collect();

        debug!(
            records = records.len(),
            stats = stats.len(),
            diff_bytes = diff.len(),
            "Parsed diff"
        );

        records
    }
}

/// Parses numstat lines into a map keyed by each file's final path.
///
/// Lines that do not have three tab-separated fields are ignored.
pub fn parse_numstat(numstat: &str) -> HashMap<String, FileStat> {
    let mut stats = HashMap::new();

    for line in numstat.lines() {
        let mut fields = line.splitn(3, '\t');
        let (Some(additions), Some(deletions), Some(path)) =
            (fields.next(), fields.next(), fields.next())
        else {
            continue;
        };

        let path = path.trim();
        if path.is_empty() {
            continue;
        }

        let stat = if additions.trim() == "-" && deletions.trim() == "-" {
            FileStat {
                is_binary: true,
                ..FileStat::default()
            }
        } else {
            FileStat {
                additions: additions.trim().parse().unwrap_or(0),
                deletions: deletions.trim().parse().unwrap_or(0),
                is_binary: false,
            }
        };

        stats.insert(normalize_rename_path(path), stat);
    }

    stats
}

/// Resolves numstat rename notation to the final path.
///
/// Handles `old => new` as well as the brace forms `{old => new}/tail`,
/// `head/{old => new}` and `head/{old => new}/tail`.
pub fn normalize_rename_path(path: &str) -> String {
    if !path.contains(RENAME_MARKER) {
        return path.to_string();
    }

    if let (Some(open), Some(close)) = (path.find('{'), path.find('}')) {
        if open < close {
            let inner = &path[open + 1..close];
            if let Some((_, new)) = inner.split_once(RENAME_MARKER) {
                let mut joined = format!("{}{}{}", &path[..open], new.trim(), &path[close + 1..]);
                // An empty side of the brace leaves a doubled separator behind.
                while joined.contains("//") {
                    joined = joined.replace("//", "/");
                }
                return joined.trim_start_matches('/').to_string();
            }
        }
    }

    match path.split_once(RENAME_MARKER) {
        Some((_, new)) => new.trim().to_string(),
        None => path.to_string(),
    }
}

/// Splits a diff into per-file segments at each `diff --git ` line.
///
/// Every segment but a leading preamble starts with the header line.
/// Whitespace-only segments are dropped.
fn split_segments(diff: &str) -> Vec<String> {
    let mut segments = Vec::new();
    let mut current = String::new();

    for line in diff.split_inclusive('\n') {
        if line.starts_with(DIFF_HEADER) && !current.is_empty() {
            segments.push(std::mem::take(&mut current));
        }
        current.push_str(line);
    }
    if !current.is_empty() {
        segments.push(current);
    }

    segments.retain(|segment| !segment.trim().is_empty());
    segments
}

/// Classifies one segment. Returns `None` when no path can be recovered.
fn parse_segment(segment: String) -> Option<ChangeRecord> {
    let mut lines = segment.lines();
    let header = lines.next()?;
    let mut file_path = header
        .strip_prefix(DIFF_HEADER)
        .map(path_from_header)
        .unwrap_or_default();

    let mut added = false;
    let mut deleted = false;
    let mut binary = false;
    let mut rename_from = String::new();

    for line in lines {
        if line.starts_with("@@") {
            break;
        }
        if line.starts_with("new file mode") {
            added = true;
        } else if line.starts_with("deleted file mode") {
            deleted = true;
        } else if let Some(from) = line.strip_prefix("rename from ") {
            rename_from = unquote(from);
        } else if let Some(to) = line.strip_prefix("rename to ") {
            let to = unquote(to);
            if !to.is_empty() {
                file_path = to;
            }
        } else if line.starts_with("Binary files") || line.starts_with("GIT binary patch") {
            binary = true;
        }
    }

    if file_path.is_empty() {
        debug!(
            header = %header,
            "Skipping diff segment without a recoverable path"
        );
        return None;
    }

    let change_type = if deleted {
        ChangeType::Deleted
    } else if added {
        ChangeType::Added
    } else {
        ChangeType::Modified
    };

    let record = ChangeRecord::new(file_path, change_type)
        .renamed_from(rename_from)
        .with_binary(binary)
        .with_content(segment);

    Some(record)
}

/// Extracts the file path from the text after `diff --git `.
fn path_from_header(rest: &str) -> String {
    let rest = rest.trim_end();
    if let Some(idx) = rest.find(" \"b/") {
        let quoted = unquote(&rest[idx + 1..]);
        return quoted.strip_prefix("b/").unwrap_or(&quoted).to_string();
    }
    if let Some(idx) = rest.find(" b/") {
        return rest[idx + 3..].to_string();
    }
    if let Some(idx) = rest.find("a/") {
        return unquote(&rest[idx + 2..]);
    }
    String::new()
}

fn unquote(value: &str) -> String {
    let value = value.trim();
    value
        .strip_prefix('"')
        .and_then(|v| v.strip_suffix('"'))
        .unwrap_or(value)
        .to_string()
}
