//! Diff parsing.
//!
//! Turns the raw text produced by `git diff` and `git diff --numstat` into an
//! ordered sequence of [`ChangeRecord`]s:
//!
//! ```ignore
//! use diffscribe::diff::DiffParser;
//!
//! let records = DiffParser::new().parse(&raw_diff, &raw_numstat);
//! for record in &records {
//!     println!("{} {} (+{} -{})", record.change_type.marker(), record.file_path,
//!         record.additions, record.deletions);
//! }
//! ```

pub mod lockfiles;
pub mod parser;
pub mod types;

pub use lockfiles::{LockFilePolicy, DEFAULT_LOCK_FILES};
pub use parser::{normalize_rename_path, parse_numstat, DiffParser};
pub use types::{ChangeRecord, ChangeType, FileStat};
