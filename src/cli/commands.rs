//! CLI command definitions for diffscribe.
//!
//! `generate` turns the staged (or unstaged) changes of a repository, or a
//! diff read from files, into a Conventional Commits message. `inspect`
//! shows how a diff would be parsed and partitioned without calling an LLM.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::diff::DiffParser;
use crate::generator::{CommitMessage, GenerationContext};
use crate::llm::{LiteLlmClient, LlmProvider, OPENROUTER_API_BASE};
use crate::pipeline::{CommitPipeline, PipelineConfig};
use crate::processor::{DiffProcessor, ProcessingResult};

/// Generate commit messages from git diffs with an LLM.
#[derive(Parser)]
#[command(name = "diffscribe")]
#[command(about = "Generate Conventional Commits messages from git diffs")]
#[command(version)]
#[command(
    long_about = "diffscribe reads a git diff, drops lock files, splits large change sets into groups and asks an LLM for a Conventional Commits message.\n\nExample usage:\n  git add -p && diffscribe generate --context \"fixes JIRA-42\"\n  diffscribe inspect --diff-file change.diff --numstat-file change.numstat --json"
)]
pub struct Cli {
    /// The subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,

    /// Log level (trace, debug, info, warn, error).
    #[arg(short, long, default_value = "info", global = true)]
    pub log_level: String,
}

/// Available CLI subcommands.
#[derive(clap::Subcommand)]
pub enum Commands {
    /// Generate a commit message for the current changes.
    #[command(alias = "gen")]
    Generate(GenerateArgs),

    /// Show parsed records, groups and summary without generating.
    Inspect(InspectArgs),
}

/// Where the diff comes from.
#[derive(clap::Args, Debug, Clone, Default)]
pub struct DiffSourceArgs {
    /// Read the unified diff from this file instead of running git.
    #[arg(long, requires = "numstat_file")]
    pub diff_file: Option<PathBuf>,

    /// Read the numstat output from this file instead of running git.
    #[arg(long, requires = "diff_file")]
    pub numstat_file: Option<PathBuf>,

    /// Use unstaged working-tree changes instead of the index.
    #[arg(long, conflicts_with = "diff_file")]
    pub unstaged: bool,

    /// Repository to run git in (default: current directory).
    #[arg(short = 'C', long)]
    pub repo: Option<PathBuf>,
}

/// Partitioning knobs shared by both subcommands.
#[derive(clap::Args, Debug, Clone, Default)]
pub struct ProcessingArgs {
    /// Partition the diff when its content exceeds this many bytes.
    #[arg(long)]
    pub size_threshold: Option<usize>,

    /// Replace a record's content with statistics above this many bytes.
    #[arg(long)]
    pub max_chunk_size: Option<usize>,

    /// Maximum number of groups and concurrent LLM calls.
    #[arg(long)]
    pub max_concurrent: Option<usize>,
}

/// Arguments for `diffscribe generate`.
#[derive(Parser, Debug)]
pub struct GenerateArgs {
    #[command(flatten)]
    pub source: DiffSourceArgs,

    #[command(flatten)]
    pub processing: ProcessingArgs,

    /// Extra context for the message (ticket, motivation, ...).
    #[arg(short = 'c', long)]
    pub context: Option<String>,

    /// A previously generated message to avoid repeating.
    #[arg(long)]
    pub previous: Option<String>,

    /// LLM model to use (default: DIFFSCRIBE_MODEL or anthropic/claude-sonnet-4).
    #[arg(short = 'm', long)]
    pub model: Option<String>,

    /// API key (can also be set via OPENROUTER_API_KEY or LITELLM_API_KEY env var).
    #[arg(long)]
    pub api_key: Option<String>,

    /// OpenAI-compatible API base URL (can also be set via LITELLM_API_BASE).
    #[arg(long)]
    pub api_base: Option<String>,

    /// Overall deadline in seconds.
    #[arg(long)]
    pub timeout_secs: Option<u64>,

    /// Disable the in-memory response cache.
    #[arg(long)]
    pub no_cache: bool,

    /// Output JSON instead of the raw message.
    #[arg(short = 'j', long)]
    pub json: bool,
}

/// Arguments for `diffscribe inspect`.
#[derive(Parser, Debug)]
pub struct InspectArgs {
    #[command(flatten)]
    pub source: DiffSourceArgs,

    #[command(flatten)]
    pub processing: ProcessingArgs,

    /// Output JSON.
    #[arg(short = 'j', long)]
    pub json: bool,
}

/// Parse CLI arguments and return the Cli struct.
///
/// This allows main.rs to access CLI arguments (like log_level) before running commands.
pub fn parse_cli() -> Cli {
    Cli::parse()
}

/// Run the CLI by parsing arguments and executing the command.
pub async fn run() -> anyhow::Result<()> {
    run_with_cli(parse_cli()).await
}

/// Run the CLI with the parsed arguments.
pub async fn run_with_cli(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Commands::Generate(args) => run_generate_command(args).await,
        Commands::Inspect(args) => run_inspect_command(args).await,
    }
}

// ============================================================================
// Generate
// ============================================================================

#[derive(Debug, Serialize)]
struct GenerateOutput<'a> {
    subject: &'a str,
    body: &'a str,
    footer: &'a str,
    raw: &'a str,
    files: usize,
    groups: usize,
    elapsed_ms: u64,
}

async fn run_generate_command(args: GenerateArgs) -> anyhow::Result<()> {
    let config = build_config(&args)?;
    let llm = build_llm_client(&args, &config)?;
    let pipeline = CommitPipeline::with_llm(llm, &config);

    let (diff, numstat) = load_diff(&args.source).await?;
    let mut context = GenerationContext::new();
    if let Some(text) = args.context.as_deref() {
        context = context.with_free_text(text);
    }
    if let Some(text) = args.previous.as_deref() {
        context = context.with_previous_attempt(text);
    }

    let cancel = CancellationToken::new();
    let watchdog = spawn_cancel_watchdog(cancel.clone(), config.timeout);

    let result = pipeline.run(&cancel, &diff, &numstat, &context).await;
    watchdog.abort();

    let outcome = result.with_context(|| {
        if cancel.is_cancelled() {
            format!(
                "commit message generation cancelled (deadline {}s or interrupt)",
                config.timeout.as_secs()
            )
        } else {
            "commit message generation failed".to_string()
        }
    })?;

    info!(
        files = outcome.processing.records.len(),
        elapsed_ms = outcome.elapsed_ms,
        "Commit message generated"
    );

    if args.json {
        let output = GenerateOutput {
            subject: &outcome.message.subject,
            body: &outcome.message.body,
            footer: &outcome.message.footer,
            raw: &outcome.message.raw,
            files: outcome.processing.records.len(),
            groups: outcome.processing.groups.len(),
            elapsed_ms: outcome.elapsed_ms,
        };
        println!("{}", serde_json::to_string_pretty(&output)?);
    } else {
        print_message(&outcome.message);
    }

    Ok(())
}

fn print_message(message: &CommitMessage) {
    println!("{}", message.raw);
}

/// Fires `cancel` on Ctrl-C or once `timeout` elapses.
fn spawn_cancel_watchdog(cancel: CancellationToken, timeout: Duration) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        tokio::select! {
            _ = tokio::time::sleep(timeout) => {
                warn!(timeout_secs = timeout.as_secs(), "Deadline reached, cancelling generation");
            }
            _ = tokio::signal::ctrl_c() => {
                warn!("Interrupted, cancelling generation");
            }
            _ = cancel.cancelled() => {}
        }
        cancel.cancel();
    })
}

fn build_config(args: &GenerateArgs) -> anyhow::Result<PipelineConfig> {
    let mut config = apply_processing_args(PipelineConfig::from_env()?, &args.processing);

    if let Some(ref model) = args.model {
        config = config.with_model(model.clone());
    }
    if let Some(secs) = args.timeout_secs {
        config = config.with_timeout(Duration::from_secs(secs));
    }
    if args.no_cache {
        config = config.with_cache_enabled(false);
    }

    config.validate()?;
    Ok(config)
}

fn apply_processing_args(mut config: PipelineConfig, args: &ProcessingArgs) -> PipelineConfig {
    if let Some(bytes) = args.size_threshold {
        config = config.with_size_threshold(bytes);
    }
    if let Some(bytes) = args.max_chunk_size {
        config = config.with_max_chunk_content_size(bytes);
    }
    if let Some(max) = args.max_concurrent {
        config = config.with_max_concurrency(max);
    }
    config
}

fn build_llm_client(
    args: &GenerateArgs,
    config: &PipelineConfig,
) -> anyhow::Result<Arc<dyn LlmProvider>> {
    let api_key = args
        .api_key
        .clone()
        .or_else(|| std::env::var("LITELLM_API_KEY").ok())
        .or_else(|| std::env::var("OPENROUTER_API_KEY").ok());

    let api_base = match args
        .api_base
        .clone()
        .or_else(|| std::env::var("LITELLM_API_BASE").ok())
    {
        Some(base) => base,
        None if api_key.is_some() => OPENROUTER_API_BASE.to_string(),
        None => anyhow::bail!(
            "No LLM endpoint configured.\n\
             Provide --api-key <KEY> (OpenRouter), or --api-base <URL> / LITELLM_API_BASE for a LiteLLM gateway."
        ),
    };

    info!(api_base = %api_base, model = %config.model, "Using LLM endpoint");
    let client = LiteLlmClient::new(api_base, api_key, config.model.clone())?;
    Ok(Arc::new(client))
}

// ============================================================================
// Inspect
// ============================================================================

async fn run_inspect_command(args: InspectArgs) -> anyhow::Result<()> {
    let config = apply_processing_args(PipelineConfig::from_env()?, &args.processing);
    config.validate()?;

    let (diff, numstat) = load_diff(&args.source).await?;
    let records = DiffParser::new().parse(&diff, &numstat);
    let result = DiffProcessor::new(config.processing).process(records);

    if args.json {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        print!("{}", render_inspection(&result));
    }
    Ok(())
}

fn render_inspection(result: &ProcessingResult) -> String {
    let mut out = String::new();
    out.push_str(&format!(
        "Records: {}  Total size: {} bytes  Chunking: {}\n",
        result.records.len(),
        result.total_size,
        if result.requires_chunking { "yes" } else { "no" }
    ));
    for record in &result.records {
        out.push_str(&format!(
            "  {} {} (+{} -{}) {} bytes\n",
            record.change_type.marker(),
            record.file_path,
            record.additions,
            record.deletions,
            record.content_len()
        ));
    }
    for group in &result.groups {
        let paths: Vec<&str> = group.records.iter().map(|r| r.file_path.as_str()).collect();
        out.push_str(&format!(
            "Group {} ({} bytes): {}\n",
            group.index,
            group.total_size,
            paths.join(", ")
        ));
    }
    if !result.summary.is_empty() {
        out.push_str("\nSummary:\n");
        out.push_str(&result.summary);
        if !result.summary.ends_with('\n') {
            out.push('\n');
        }
    }
    out
}

// ============================================================================
// Diff input
// ============================================================================

/// Pins the output format the parser expects, whatever the user's git config
/// says about colors, external diff drivers or path prefixes.
const GIT_DIFF_FORMAT_ARGS: &[&str] = &[
    "--no-color",
    "--no-ext-diff",
    "--src-prefix=a/",
    "--dst-prefix=b/",
];

/// Reads diff and numstat text from files or from git.
async fn load_diff(source: &DiffSourceArgs) -> anyhow::Result<(String, String)> {
    match (&source.diff_file, &source.numstat_file) {
        (Some(diff_path), Some(numstat_path)) => read_input_files(diff_path, numstat_path),
        _ => {
            let repo = source.repo.as_deref().unwrap_or_else(|| Path::new("."));
            let mut base = vec!["diff"];
            if !source.unstaged {
                base.push("--cached");
            }
            base.extend_from_slice(GIT_DIFF_FORMAT_ARGS);
            let diff = run_git(repo, &base, &[]).await?;
            let numstat = run_git(repo, &base, &["--numstat"]).await?;
            Ok((diff, numstat))
        }
    }
}

fn read_input_files(diff_path: &Path, numstat_path: &Path) -> anyhow::Result<(String, String)> {
    let diff = std::fs::read_to_string(diff_path)
        .with_context(|| format!("Failed to read diff file {}", diff_path.display()))?;
    let numstat = std::fs::read_to_string(numstat_path)
        .with_context(|| format!("Failed to read numstat file {}", numstat_path.display()))?;
    Ok((diff, numstat))
}

async fn run_git(repo: &Path, base: &[&str], extra: &[&str]) -> anyhow::Result<String> {
    let output = tokio::process::Command::new("git")
        .args(base)
        .args(extra)
        .current_dir(repo)
        .stdin(Stdio::null())
        .output()
        .await
        .context("Failed to run git")?;

    if !output.status.success() {
        anyhow::bail!(
            "git {} failed: {}",
            base.iter().chain(extra).copied().collect::<Vec<_>>().join(" "),
            String::from_utf8_lossy(&output.stderr).trim()
        );
    }
    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diff::{ChangeRecord, ChangeType};
    use crate::processor::ProcessingConfig;
    use clap::CommandFactory;
    use std::io::Write;

    #[test]
    fn test_cli_parses() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_generate_defaults() {
        let cli = Cli::try_parse_from(["diffscribe", "generate"]).expect("should parse");
        assert_eq!(cli.log_level, "info");
        match cli.command {
            Commands::Generate(args) => {
                assert!(args.source.diff_file.is_none());
                assert!(!args.source.unstaged);
                assert!(args.model.is_none());
                assert!(args.processing.max_concurrent.is_none());
                assert!(!args.no_cache);
                assert!(!args.json);
            }
            _ => panic!("Expected Generate command"),
        }
    }

    #[test]
    fn test_generate_with_options() {
        let cli = Cli::try_parse_from([
            "diffscribe",
            "gen",
            "--diff-file",
            "a.diff",
            "--numstat-file",
            "a.numstat",
            "--context",
            "JIRA-7",
            "--max-concurrent",
            "5",
            "--timeout-secs",
            "30",
            "--json",
        ])
        .expect("should parse");

        match cli.command {
            Commands::Generate(args) => {
                assert_eq!(args.source.diff_file, Some(PathBuf::from("a.diff")));
                assert_eq!(args.context.as_deref(), Some("JIRA-7"));
                assert_eq!(args.processing.max_concurrent, Some(5));
                assert_eq!(args.timeout_secs, Some(30));
                assert!(args.json);
            }
            _ => panic!("Expected Generate command"),
        }
    }

    #[test]
    fn test_diff_file_requires_numstat_file() {
        let result = Cli::try_parse_from(["diffscribe", "inspect", "--diff-file", "a.diff"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_unstaged_conflicts_with_files() {
        let result = Cli::try_parse_from([
            "diffscribe",
            "inspect",
            "--unstaged",
            "--diff-file",
            "a.diff",
            "--numstat-file",
            "a.numstat",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn test_apply_processing_args() {
        let args = ProcessingArgs {
            size_threshold: Some(100),
            max_chunk_size: None,
            max_concurrent: Some(2),
        };
        let config = apply_processing_args(PipelineConfig::default(), &args);
        assert_eq!(config.processing.size_threshold, 100);
        assert_eq!(config.processing.max_chunk_content_size, 100 * 1024);
        assert_eq!(config.processing.max_concurrency, 2);
        assert_eq!(config.max_concurrent_calls, 2);
    }

    #[test]
    fn test_read_input_files() {
        let mut diff = tempfile::NamedTempFile::new().expect("temp file");
        let mut numstat = tempfile::NamedTempFile::new().expect("temp file");
        writeln!(diff, "diff --git a/x b/x").expect("write");
        writeln!(numstat, "1\t0\tx").expect("write");

        let (d, n) = read_input_files(diff.path(), numstat.path()).expect("read");
        assert!(d.starts_with("diff --git"));
        assert_eq!(n, "1\t0\tx\n");
    }

    #[test]
    fn test_read_input_files_missing() {
        let dir = tempfile::tempdir().expect("temp dir");
        let missing = dir.path().join("nope.diff");
        let err = read_input_files(&missing, &missing).unwrap_err();
        assert!(err.to_string().contains("nope.diff"));
    }

    #[tokio::test]
    async fn test_load_diff_prefers_files() {
        let dir = tempfile::tempdir().expect("temp dir");
        let diff_path = dir.path().join("c.diff");
        let numstat_path = dir.path().join("c.numstat");
        std::fs::write(&diff_path, "diff --git a/y b/y\n").expect("write");
        std::fs::write(&numstat_path, "2\t1\ty\n").expect("write");

        let source = DiffSourceArgs {
            diff_file: Some(diff_path),
            numstat_file: Some(numstat_path),
            ..Default::default()
        };
        let (_, numstat) = load_diff(&source).await.expect("load");
        assert_eq!(numstat, "2\t1\ty\n");
    }

    fn git(dir: &Path, args: &[&str]) {
        let status = std::process::Command::new("git")
            .args(args)
            .current_dir(dir)
            .stdout(Stdio::null())
            .status()
            .expect("git should run");
        assert!(status.success(), "git {:?} failed", args);
    }

    #[tokio::test]
    async fn test_load_diff_ignores_user_diff_config() {
        if std::process::Command::new("git").arg("--version").output().is_err() {
            return;
        }
        let dir = tempfile::tempdir().expect("temp dir");
        git(dir.path(), &["init", "--quiet"]);
        git(dir.path(), &["config", "diff.noprefix", "true"]);
        git(dir.path(), &["config", "color.ui", "always"]);
        git(dir.path(), &["config", "color.diff", "always"]);
        std::fs::write(dir.path().join("notes.txt"), "first\nsecond\n").expect("write");
        git(dir.path(), &["add", "notes.txt"]);

        let source = DiffSourceArgs {
            repo: Some(dir.path().to_path_buf()),
            ..Default::default()
        };
        let (diff, numstat) = load_diff(&source).await.expect("load");
        assert!(diff.contains("diff --git a/notes.txt b/notes.txt"));
        assert!(!diff.contains('\u{1b}'));

        let records = DiffParser::new().parse(&diff, &numstat);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].file_path, "notes.txt");
        assert_eq!(records[0].change_type, ChangeType::Added);
        assert_eq!(records[0].additions, 2);
    }

    #[test]
    fn test_render_inspection_lists_groups() {
        let records = vec![
            ChangeRecord::new("a.rs", ChangeType::Added)
                .with_counts(3, 0)
                .with_content("+a\n+b\n+c\n"),
            ChangeRecord::new("b.rs", ChangeType::Modified)
                .with_counts(1, 1)
                .with_content("-x\n+y\n"),
        ];
        let result = DiffProcessor::new(
            ProcessingConfig::default()
                .with_size_threshold(1)
                .with_max_concurrency(2),
        )
        .process(records);

        let text = render_inspection(&result);
        assert!(text.contains("Records: 2"));
        assert!(text.contains("A a.rs (+3 -0)"));
        assert!(text.contains("Group 0"));
        assert!(text.contains("Group 1"));
        assert!(text.contains("Summary:"));
    }
}
