//! Merging per-group commit messages into one.

use regex::Regex;
use std::collections::HashMap;
use std::collections::HashSet;
use std::sync::OnceLock;

use crate::generator::CommitMessage;

/// Commit types in descending tie-break priority.
pub const DEFAULT_TYPE_PRIORITY: &[&str] = &[
    "feat", "fix", "perf", "refactor", "docs", "test", "style", "ci", "build", "chore", "revert",
];

/// Type used when no subject carries a recognized prefix.
pub const FALLBACK_TYPE: &str = "chore";

/// Ordered table of recognized commit types.
///
/// Only types listed here are counted when picking the aggregated subject
/// prefix. Earlier entries win ties.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitTypePriority {
    types: Vec<String>,
}

impl Default for CommitTypePriority {
    fn default() -> Self {
        Self::new(DEFAULT_TYPE_PRIORITY.iter().copied())
    }
}

impl CommitTypePriority {
    pub fn new<I, S>(types: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            types: types.into_iter().map(|t| t.into().to_lowercase()).collect(),
        }
    }

    /// Position of `commit_type` in the table, lower is stronger.
    pub fn rank(&self, commit_type: &str) -> Option<usize> {
        self.types.iter().position(|t| t == commit_type)
    }

    /// Most frequent recognized type among `subjects`, ties broken by rank.
    pub fn dominant_type<'a, I>(&self, subjects: I) -> Option<&str>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut counts: HashMap<usize, usize> = HashMap::new();
        for subject in subjects {
            if let Some(rank) = commit_type(subject).and_then(|t| self.rank(&t)) {
                *counts.entry(rank).or_default() += 1;
            }
        }

        counts
            .into_iter()
            .max_by(|(rank_a, count_a), (rank_b, count_b)| {
                count_a.cmp(count_b).then(rank_b.cmp(rank_a))
            })
            .map(|(rank, _)| self.types[rank].as_str())
    }
}

fn type_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^(\w+)(\([^)]*\))?!?:\s*").expect("valid commit type regex"))
}

/// Lowercased type prefix of a `type(scope): text` or `type: text` subject.
pub fn commit_type(subject: &str) -> Option<String> {
    type_regex()
        .captures(subject.trim())
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_lowercase())
}

/// Merges successful group messages, given in group-index order.
pub fn aggregate_messages(messages: &[CommitMessage], priority: &CommitTypePriority) -> CommitMessage {
    let subjects: Vec<&str> = messages
        .iter()
        .map(|m| m.subject.trim())
        .filter(|s| !s.is_empty())
        .collect();

    let subject = match subjects.as_slice() {
        [] => String::new(),
        [only] => only.to_string(),
        many => {
            let commit_type = priority
                .dominant_type(many.iter().copied())
                .unwrap_or(FALLBACK_TYPE);
            format!("{}: multiple changes across {} files", commit_type, many.len())
        }
    };

    let body = messages
        .iter()
        .map(|m| m.body.trim())
        .filter(|b| !b.is_empty())
        .collect::<Vec<_>>()
        .join("\n\n");

    CommitMessage::compose(subject, body, merge_footers(messages))
}

/// Trimmed footer lines with duplicates removed, first occurrence kept.
fn merge_footers(messages: &[CommitMessage]) -> String {
    let mut seen = HashSet::new();
    messages
        .iter()
        .flat_map(|m| m.footer.lines())
        .map(str::trim)
        .filter(|line| !line.is_empty() && seen.insert(*line))
        .collect::<Vec<_>>()
        .join("\n")
}
