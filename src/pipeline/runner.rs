//! End-to-end run: parse, process, generate.

use std::sync::Arc;
use std::time::Instant;

use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::info;

use super::aggregate::CommitTypePriority;
use super::config::PipelineConfig;
use super::orchestrator::GenerationOrchestrator;
use crate::diff::DiffParser;
use crate::error::GenerationError;
use crate::generator::{
    CachingGenerator, CommitGenerator, CommitMessage, GenerationContext, LlmCommitWriter,
};
use crate::llm::{CacheConfig, LlmProvider, ResponseCache};
use crate::processor::{DiffProcessor, ProcessingResult};

/// Result of one [`CommitPipeline::run`].
#[derive(Debug, Clone, Serialize)]
pub struct PipelineOutcome {
    pub message: CommitMessage,
    pub processing: ProcessingResult,
    pub elapsed_ms: u64,
}

/// Parser, processor and orchestrator wired together.
#[derive(Clone)]
pub struct CommitPipeline {
    parser: DiffParser,
    processor: DiffProcessor,
    orchestrator: GenerationOrchestrator,
}

impl CommitPipeline {
    pub fn new(generator: Arc<dyn CommitGenerator>, config: &PipelineConfig) -> Self {
        Self {
            parser: DiffParser::new(),
            processor: DiffProcessor::new(config.processing),
            orchestrator: GenerationOrchestrator::new(generator)
                .with_max_concurrent_calls(config.max_concurrent_calls),
        }
    }

    /// Builds a pipeline around an LLM provider, with the response cache
    /// in front of it when enabled.
    pub fn with_llm(llm: Arc<dyn LlmProvider>, config: &PipelineConfig) -> Self {
        let writer = LlmCommitWriter::new(llm)
            .with_model(config.model.clone())
            .with_temperature(config.temperature)
            .with_max_tokens(config.max_tokens);

        let generator: Arc<dyn CommitGenerator> = if config.cache_enabled {
            let cache = Arc::new(ResponseCache::with_config(CacheConfig::default()));
            let prefix = writer.settings_key();
            Arc::new(CachingGenerator::new(writer, cache).with_key_prefix(prefix))
        } else {
            Arc::new(writer)
        };
        Self::new(generator, config)
    }

    pub fn with_parser(mut self, parser: DiffParser) -> Self {
        self.parser = parser;
        self
    }

    pub fn with_priority(mut self, priority: CommitTypePriority) -> Self {
        self.orchestrator = self.orchestrator.with_priority(priority);
        self
    }

    /// Parses and processes without generating.
    pub fn inspect(&self, diff: &str, numstat: &str) -> ProcessingResult {
        let records = self.parser.parse(diff, numstat);
        self.processor.process(records)
    }

    /// Runs the whole flow for one diff.
    ///
    /// # Errors
    ///
    /// Returns the orchestrator's [`GenerationError`].
    pub async fn run(
        &self,
        cancel: &CancellationToken,
        diff: &str,
        numstat: &str,
        context: &GenerationContext,
    ) -> Result<PipelineOutcome, GenerationError> {
        let start = Instant::now();
        let processing = self.inspect(diff, numstat);

        info!(
            records = processing.records.len(),
            total_size = processing.total_size,
            requires_chunking = processing.requires_chunking,
            groups = processing.groups.len(),
            "Diff processed"
        );

        let message = self.orchestrator.generate(cancel, &processing, context).await?;

        Ok(PipelineOutcome {
            message,
            processing,
            elapsed_ms: start.elapsed().as_millis() as u64,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::LlmError;
    use crate::llm::{ChatRequest, ChatResponse, Choice, Message, Usage};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    const DIFF: &str = "diff --git a/src/lib.rs b/src/lib.rs\n\
index 1..2 100644\n\
--- a/src/lib.rs\n\
+++ b/src/lib.rs\n\
@@ -1 +1,2 @@\n\
 pub mod a;\n\
+pub mod b;\n\
diff --git a/Cargo.lock b/Cargo.lock\n\
index 3..4 100644\n\
--- a/Cargo.lock\n\
+++ b/Cargo.lock\n\
@@ -1 +1 @@\n\
-old\n\
+new\n";

    const NUMSTAT: &str = "1\t0\tsrc/lib.rs\n1\t1\tCargo.lock\n";

    struct FixedProvider {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl LlmProvider for FixedProvider {
        async fn generate(&self, _request: ChatRequest) -> Result<ChatResponse, LlmError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(ChatResponse {
                id: "1".to_string(),
                model: "test".to_string(),
                choices: vec![Choice {
                    index: 0,
                    message: Message::assistant(
                        r#"{"subject": "feat: expose module b", "body": "", "footer": ""}"#,
                    ),
                    finish_reason: "stop".to_string(),
                }],
                usage: Usage::default(),
            })
        }
    }

    #[test]
    fn test_inspect_filters_lock_files() {
        let pipeline = CommitPipeline::with_llm(
            Arc::new(FixedProvider {
                calls: AtomicUsize::new(0),
            }),
            &PipelineConfig::default(),
        );
        let result = pipeline.inspect(DIFF, NUMSTAT);
        assert_eq!(result.records.len(), 1);
        assert_eq!(result.records[0].file_path, "src/lib.rs");
        assert!(!result.requires_chunking);
    }

    #[tokio::test]
    async fn test_run_uses_cache_for_repeat_diffs() {
        let provider = Arc::new(FixedProvider {
            calls: AtomicUsize::new(0),
        });
        let pipeline = CommitPipeline::with_llm(provider.clone(), &PipelineConfig::default());
        let cancel = CancellationToken::new();

        let first = pipeline
            .run(&cancel, DIFF, NUMSTAT, &GenerationContext::new())
            .await
            .expect("first run");
        let second = pipeline
            .run(&cancel, DIFF, NUMSTAT, &GenerationContext::new())
            .await
            .expect("second run");

        assert_eq!(first.message.subject, "feat: expose module b");
        assert_eq!(first.message, second.message);
        assert_eq!(provider.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_run_without_cache_calls_every_time() {
        let provider = Arc::new(FixedProvider {
            calls: AtomicUsize::new(0),
        });
        let config = PipelineConfig::default().with_cache_enabled(false);
        let pipeline = CommitPipeline::with_llm(provider.clone(), &config);
        let cancel = CancellationToken::new();

        for _ in 0..2 {
            pipeline
                .run(&cancel, DIFF, NUMSTAT, &GenerationContext::new())
                .await
                .expect("run");
        }
        assert_eq!(provider.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_lock_only_diff_has_no_changes() {
        let pipeline = CommitPipeline::with_llm(
            Arc::new(FixedProvider {
                calls: AtomicUsize::new(0),
            }),
            &PipelineConfig::default(),
        );
        let lock_only = "diff --git a/Cargo.lock b/Cargo.lock\n@@ -1 +1 @@\n-a\n+b\n";
        let err = pipeline
            .run(
                &CancellationToken::new(),
                lock_only,
                "1\t1\tCargo.lock\n",
                &GenerationContext::new(),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, GenerationError::NoChanges));
    }
}
