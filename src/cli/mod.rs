//! Command-line interface for diffscribe.
//!
//! Provides the `generate` and `inspect` commands.

mod commands;

pub use commands::{parse_cli, run, run_with_cli, Cli, Commands};
