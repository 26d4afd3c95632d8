//! Commit message generation backed by an [`LlmProvider`].

use async_trait::async_trait;
use regex::Regex;
use serde::Deserialize;
use std::fmt::Write;
use std::sync::{Arc, OnceLock};
use tokio_util::sync::CancellationToken;

use super::{CommitGenerator, CommitMessage, CommitRequest};
use crate::error::{GenerationError, LlmError};
use crate::llm::{ChatRequest, LlmProvider, Message};

/// System prompt for commit message generation.
pub const COMMIT_SYSTEM_PROMPT: &str = r#"You write git commit messages following the Conventional Commits specification.

Given a set of file changes, produce:
- subject: `type(scope): summary` or `type: summary`, imperative mood, at most 72 characters.
  type is one of feat, fix, perf, refactor, docs, test, style, ci, build, chore, revert.
- body: what changed and why, wrapped at 72 columns. May be empty for trivial changes.
- footer: trailers such as `Refs: #123`, `Closes: #45` or `BREAKING CHANGE: ...`, one per line. Usually empty.

You may only see part of a larger change; describe the files you are given, using the overall summary for context.

Respond with a single JSON object and nothing else:
{"subject": "...", "body": "...", "footer": "..."}"#;

const DEFAULT_TEMPERATURE: f64 = 0.3;
const DEFAULT_MAX_TOKENS: u32 = 1024;

/// Generates commit messages by prompting an LLM.
pub struct LlmCommitWriter {
    llm: Arc<dyn LlmProvider>,
    /// Empty means the provider's default model.
    model: String,
    temperature: f64,
    max_tokens: u32,
}

impl LlmCommitWriter {
    pub fn new(llm: Arc<dyn LlmProvider>) -> Self {
        Self {
            llm,
            model: String::new(),
            temperature: DEFAULT_TEMPERATURE,
            max_tokens: DEFAULT_MAX_TOKENS,
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_temperature(mut self, temperature: f64) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    /// Model and sampling settings, as a cache key prefix.
    pub fn settings_key(&self) -> String {
        format!("{}|{}|{}", self.model, self.temperature, self.max_tokens)
    }

    fn build_chat(&self, request: &CommitRequest) -> ChatRequest {
        ChatRequest::new(
            self.model.clone(),
            vec![
                Message::system(COMMIT_SYSTEM_PROMPT),
                Message::user(build_user_prompt(request)),
            ],
        )
        .with_temperature(self.temperature)
        .with_max_tokens(self.max_tokens)
    }
}

#[async_trait]
impl CommitGenerator for LlmCommitWriter {
    async fn generate(
        &self,
        cancel: &CancellationToken,
        request: CommitRequest,
    ) -> Result<CommitMessage, GenerationError> {
        if cancel.is_cancelled() {
            return Err(GenerationError::Cancelled);
        }

        let chat = self.build_chat(&request);
        let response = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(GenerationError::Cancelled),
            result = self.llm.generate(chat) => result?,
        };

        tracing::debug!(
            model = %response.model,
            files = request.records.len(),
            total_tokens = response.usage.total_tokens,
            "Commit message generated"
        );

        let content = response
            .first_content()
            .filter(|c| !c.trim().is_empty())
            .ok_or(LlmError::EmptyResponse)?;
        parse_commit_response(content)
    }
}

/// Renders the records and context of a request as the user prompt.
pub fn build_user_prompt(request: &CommitRequest) -> String {
    let mut prompt = String::new();

    if !request.stats_summary.is_empty() {
        prompt.push_str("Overall change summary (you are seeing a subset of these files):\n");
        prompt.push_str(&request.stats_summary);
        prompt.push('\n');
    }
    if let Some(ref context) = request.context.free_text {
        let _ = write!(prompt, "Additional context from the author:\n{}\n\n", context.trim());
    }
    if let Some(ref previous) = request.context.previous_attempt {
        let _ = write!(
            prompt,
            "A previous attempt was rejected; write a noticeably different message:\n{}\n\n",
            previous.trim()
        );
    }

    let _ = writeln!(prompt, "Changes ({} files):", request.records.len());
    for record in &request.records {
        let _ = write!(
            prompt,
            "\n### {} {} (+{} -{})",
            record.change_type.marker(),
            record.file_path,
            record.additions,
            record.deletions
        );
        if record.is_rename() {
            let _ = write!(prompt, " renamed from {}", record.old_path);
        }
        if record.is_binary {
            prompt.push_str(" [binary]");
        }
        prompt.push('\n');
        if !record.content.is_empty() {
            let _ = write!(prompt, "```diff\n{}\n```\n", record.content.trim_end());
        }
    }

    prompt
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum FooterField {
    Text(String),
    Lines(Vec<String>),
}

#[derive(Debug, Deserialize)]
struct RawCommit {
    subject: String,
    #[serde(default)]
    body: Option<String>,
    #[serde(default)]
    footer: Option<FooterField>,
}

/// Parses an LLM reply into a [`CommitMessage`].
///
/// Accepts a JSON object (optionally wrapped in prose or code fences) and
/// falls back to reading a plain-text commit message.
pub fn parse_commit_response(text: &str) -> Result<CommitMessage, GenerationError> {
    let message = parse_json_reply(text).unwrap_or_else(|| parse_plain_reply(text));
    if message.subject.is_empty() {
        return Err(GenerationError::InvalidResponse(
            "response contained no subject line".to_string(),
        ));
    }
    Ok(message)
}

fn parse_json_reply(text: &str) -> Option<CommitMessage> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    if end <= start {
        return None;
    }
    let raw: RawCommit = serde_json::from_str(&text[start..=end]).ok()?;
    let footer = match raw.footer {
        Some(FooterField::Text(text)) => text,
        Some(FooterField::Lines(lines)) => lines.join("\n"),
        None => String::new(),
    };
    Some(CommitMessage::compose(
        raw.subject,
        raw.body.unwrap_or_default(),
        footer,
    ))
}

fn parse_plain_reply(text: &str) -> CommitMessage {
    let lines: Vec<&str> = text
        .lines()
        .filter(|line| !line.trim_start().starts_with("```"))
        .map(str::trim_end)
        .collect();

    let Some(start) = lines.iter().position(|line| !line.trim().is_empty()) else {
        return CommitMessage::default();
    };
    let subject = lines[start].trim();

    let mut paragraphs: Vec<Vec<&str>> = Vec::new();
    let mut current: Vec<&str> = Vec::new();
    for line in &lines[start + 1..] {
        if line.trim().is_empty() {
            if !current.is_empty() {
                paragraphs.push(std::mem::take(&mut current));
            }
        } else {
            current.push(*line);
        }
    }
    if !current.is_empty() {
        paragraphs.push(current);
    }

    let footer = match paragraphs.last() {
        Some(last) if last.iter().all(|line| is_trailer(line)) => {
            paragraphs.pop().map(|p| p.join("\n")).unwrap_or_default()
        }
        _ => String::new(),
    };
    let body = paragraphs
        .iter()
        .map(|p| p.join("\n"))
        .collect::<Vec<_>>()
        .join("\n\n");

    CommitMessage::compose(subject, body, footer)
}

fn is_trailer(line: &str) -> bool {
    static TRAILER: OnceLock<Regex> = OnceLock::new();
    TRAILER
        .get_or_init(|| {
            Regex::new(r"^(BREAKING[ -]CHANGE|[A-Za-z][A-Za-z0-9-]*)(: | #)\S")
                .expect("Invalid trailer regex")
        })
        .is_match(line.trim())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diff::{ChangeRecord, ChangeType};
    use crate::generator::GenerationContext;
    use crate::llm::{ChatResponse, Choice, Usage};
    use std::sync::Mutex;
    use std::time::Duration;

    struct MockProvider {
        reply: String,
        delay: Duration,
        seen: Mutex<Vec<ChatRequest>>,
    }

    impl MockProvider {
        fn new(reply: &str) -> Self {
            Self {
                reply: reply.to_string(),
                delay: Duration::ZERO,
                seen: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl LlmProvider for MockProvider {
        async fn generate(&self, request: ChatRequest) -> Result<ChatResponse, LlmError> {
            self.seen.lock().expect("lock").push(request);
            tokio::time::sleep(self.delay).await;
            Ok(ChatResponse {
                id: "mock".to_string(),
                model: "mock-model".to_string(),
                choices: vec![Choice {
                    index: 0,
                    message: Message::assistant(self.reply.clone()),
                    finish_reason: "stop".to_string(),
                }],
                usage: Usage::default(),
            })
        }
    }

    fn sample_request() -> CommitRequest {
        CommitRequest::new(
            vec![
                ChangeRecord::new("src/parser.rs", ChangeType::Added)
                    .with_counts(40, 0)
                    .with_content("diff --git a/src/parser.rs b/src/parser.rs\n+fn parse() {}\n"),
                ChangeRecord::new("docs/new.md", ChangeType::Modified)
                    .renamed_from("docs/old.md")
                    .with_counts(1, 1),
            ],
            "Changed files: 5 (+50 -3)\n",
            GenerationContext::new()
                .with_free_text("Part of the parser rewrite")
                .with_previous_attempt("feat: stuff"),
        )
    }

    #[test]
    fn test_user_prompt_contents() {
        let prompt = build_user_prompt(&sample_request());
        assert!(prompt.contains("Changed files: 5 (+50 -3)"));
        assert!(prompt.contains("Part of the parser rewrite"));
        assert!(prompt.contains("previous attempt was rejected"));
        assert!(prompt.contains("feat: stuff"));
        assert!(prompt.contains("### A src/parser.rs (+40 -0)"));
        assert!(prompt.contains("### R docs/new.md (+1 -1) renamed from docs/old.md"));
        assert!(prompt.contains("```diff\ndiff --git a/src/parser.rs"));
    }

    #[test]
    fn test_settings_key_tracks_sampling() {
        let llm: Arc<dyn LlmProvider> = Arc::new(MockProvider::new("feat: x"));
        let base = LlmCommitWriter::new(llm.clone()).with_model("m1");
        assert_eq!(base.settings_key(), "m1|0.3|1024");

        let hotter = LlmCommitWriter::new(llm.clone()).with_model("m1").with_temperature(0.9);
        let longer = LlmCommitWriter::new(llm).with_model("m1").with_max_tokens(64);
        assert_ne!(base.settings_key(), hotter.settings_key());
        assert_ne!(base.settings_key(), longer.settings_key());
    }

    #[test]
    fn test_parse_json_reply() {
        let msg = parse_commit_response(
            "Here you go:\n```json\n{\"subject\": \"feat(diff): add parser\", \"body\": \"Adds it.\", \"footer\": \"Refs: #7\"}\n```",
        )
        .expect("should parse");
        assert_eq!(msg.subject, "feat(diff): add parser");
        assert_eq!(msg.body, "Adds it.");
        assert_eq!(msg.footer, "Refs: #7");
        assert_eq!(msg.raw, "feat(diff): add parser\n\nAdds it.\n\nRefs: #7");
    }

    #[test]
    fn test_parse_json_reply_with_footer_list_and_null_body() {
        let msg = parse_commit_response(
            r#"{"subject": "fix: guard", "body": null, "footer": ["Closes: #1", "Refs: #2"]}"#,
        )
        .expect("should parse");
        assert_eq!(msg.body, "");
        assert_eq!(msg.footer, "Closes: #1\nRefs: #2");
    }

    #[test]
    fn test_parse_plain_reply() {
        let msg = parse_commit_response(
            "refactor: split parser\n\nMove numstat handling into its own function.\nKeeps the diff walker small.\n\nCloses #42\nBREAKING CHANGE: parse_numstat is now public\n",
        )
        .expect("should parse");
        assert_eq!(msg.subject, "refactor: split parser");
        assert_eq!(
            msg.body,
            "Move numstat handling into its own function.\nKeeps the diff walker small."
        );
        assert_eq!(msg.footer, "Closes #42\nBREAKING CHANGE: parse_numstat is now public");
    }

    #[test]
    fn test_parse_plain_reply_without_footer() {
        let msg = parse_commit_response("docs: fix typo\n\nIt was wrong.\n").expect("should parse");
        assert_eq!(msg.body, "It was wrong.");
        assert!(msg.footer.is_empty());
    }

    #[test]
    fn test_parse_empty_reply_is_invalid() {
        let result = parse_commit_response("  \n```\n```\n");
        assert!(matches!(result, Err(GenerationError::InvalidResponse(_))));
    }

    #[tokio::test]
    async fn test_generate_uses_provider_reply() {
        let provider = Arc::new(MockProvider::new(
            r#"{"subject":"feat: add parser","body":"","footer":""}"#,
        ));
        let writer = LlmCommitWriter::new(provider.clone())
            .with_model("test-model")
            .with_temperature(0.1)
            .with_max_tokens(64);

        let msg = writer
            .generate(&CancellationToken::new(), sample_request())
            .await
            .expect("generation should succeed");
        assert_eq!(msg.raw, "feat: add parser");

        let seen = provider.seen.lock().expect("lock");
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].model, "test-model");
        assert_eq!(seen[0].max_tokens, Some(64));
        assert_eq!(seen[0].messages[0].content, COMMIT_SYSTEM_PROMPT);
    }

    #[tokio::test]
    async fn test_generate_empty_content_is_error() {
        let writer = LlmCommitWriter::new(Arc::new(MockProvider::new("   ")));
        let result = writer.generate(&CancellationToken::new(), sample_request()).await;
        assert!(matches!(result, Err(GenerationError::Llm(LlmError::EmptyResponse))));
    }

    #[tokio::test]
    async fn test_generate_respects_prior_cancellation() {
        let provider = Arc::new(MockProvider::new("feat: x"));
        let writer = LlmCommitWriter::new(provider.clone());
        let cancel = CancellationToken::new();
        cancel.cancel();

        let result = writer.generate(&cancel, sample_request()).await;
        assert!(matches!(result, Err(GenerationError::Cancelled)));
        assert!(provider.seen.lock().expect("lock").is_empty());
    }

    #[tokio::test]
    async fn test_generate_aborts_in_flight_call_on_cancel() {
        let mut provider = MockProvider::new("feat: x");
        provider.delay = Duration::from_secs(30);
        let writer = LlmCommitWriter::new(Arc::new(provider));
        let cancel = CancellationToken::new();

        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            trigger.cancel();
        });

        let started = std::time::Instant::now();
        let result = writer.generate(&cancel, sample_request()).await;
        assert!(matches!(result, Err(GenerationError::Cancelled)));
        assert!(started.elapsed() < Duration::from_secs(5));
    }
}
