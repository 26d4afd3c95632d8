//! Human-readable digests of change records.

use std::fmt::Write;

use crate::diff::ChangeRecord;

/// Builds the digest sent alongside each group so every generator call sees
/// the shape of the whole change set.
///
/// One line per record with its change marker and counts, preceded by the
/// aggregate totals.
pub fn summarize(records: &[ChangeRecord]) -> String {
    if records.is_empty() {
        return String::new();
    }

    let additions: u64 = records.iter().map(|r| u64::from(r.additions)).sum();
    let deletions: u64 = records.iter().map(|r| u64::from(r.deletions)).sum();

    let mut out = format!(
        "Changed files: {} (+{} -{})\n",
        records.len(),
        additions,
        deletions
    );
    for record in records {
        let _ = write!(
            out,
            "{} {} (+{} -{})",
            record.change_type.marker(),
            record.file_path,
            record.additions,
            record.deletions
        );
        if record.is_rename() {
            let _ = write!(out, " renamed from {}", record.old_path);
        }
        if record.is_binary {
            out.push_str(" [binary]");
        }
        out.push('\n');
    }
    out
}

/// Replaces a record's content with a statistics-only description.
pub fn shrink_record(record: &ChangeRecord, limit: usize) -> ChangeRecord {
    let mut content = format!(
        "File: {}\nChange: {}\nLines: +{} -{}\n",
        record.file_path, record.change_type, record.additions, record.deletions
    );
    if record.is_binary {
        content.push_str("Note: binary file\n");
    }
    if record.is_rename() {
        let _ = writeln!(content, "Note: renamed from {}", record.old_path);
    }
    let _ = writeln!(
        content,
        "Diff omitted: {} bytes exceeds the {} byte limit",
        record.content_len(),
        limit
    );

    ChangeRecord {
        content,
        ..record.clone()
    }
}
