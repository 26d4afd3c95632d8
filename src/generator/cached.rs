//! Response caching at the generator boundary.

use async_trait::async_trait;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use super::{CommitGenerator, CommitMessage, CommitRequest};
use crate::error::GenerationError;
use crate::llm::{ContentHash, ResponseCache};

/// Wraps a generator so identical requests are answered from memory.
///
/// Requests carrying a previous attempt always go to the inner generator,
/// since the caller is explicitly asking for a different answer.
///
/// Keys are prefixed with the inner generator's settings (see
/// [`with_key_prefix`](Self::with_key_prefix)), so one cache can be shared by
/// writers using different models or sampling parameters.
pub struct CachingGenerator<G> {
    inner: G,
    cache: Arc<ResponseCache<CommitMessage>>,
    key_prefix: String,
}

impl<G: CommitGenerator> CachingGenerator<G> {
    pub fn new(inner: G, cache: Arc<ResponseCache<CommitMessage>>) -> Self {
        Self {
            inner,
            cache,
            key_prefix: String::new(),
        }
    }

    /// Mixes `prefix` into every cache key.
    pub fn with_key_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.key_prefix = prefix.into();
        self
    }

    pub fn cache(&self) -> &Arc<ResponseCache<CommitMessage>> {
        &self.cache
    }
}

/// Cache key covering everything that influences the generated message.
///
/// `prefix` identifies the generator settings the request is answered with.
pub fn request_key(prefix: &str, request: &CommitRequest) -> ContentHash {
    let counts: Vec<String> = request
        .records
        .iter()
        .map(|r| format!("{}:{}:{}", r.change_type, r.additions, r.deletions))
        .collect();

    let mut parts: Vec<&str> = Vec::with_capacity(request.records.len() * 4 + 3);
    parts.push(prefix);
    parts.push(&request.stats_summary);
    parts.push(request.context.free_text.as_deref().unwrap_or_default());
    for (record, counts) in request.records.iter().zip(&counts) {
        parts.push(&record.file_path);
        parts.push(&record.old_path);
        parts.push(counts);
        parts.push(&record.content);
    }
    ContentHash::from_parts(parts)
}

#[async_trait]
impl<G: CommitGenerator> CommitGenerator for CachingGenerator<G> {
    async fn generate(
        &self,
        cancel: &CancellationToken,
        request: CommitRequest,
    ) -> Result<CommitMessage, GenerationError> {
        if request.context.previous_attempt.is_some() {
            return self.inner.generate(cancel, request).await;
        }

        let key = request_key(&self.key_prefix, &request);
        if let Some(hit) = self.cache.get(&key) {
            tracing::debug!(key = %key, "Commit message served from cache");
            return Ok(hit);
        }

        let message = self.inner.generate(cancel, request).await?;
        self.cache.insert(key, message.clone());
        Ok(message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diff::{ChangeRecord, ChangeType};
    use crate::generator::GenerationContext;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingGenerator {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl CommitGenerator for CountingGenerator {
        async fn generate(
            &self,
            _cancel: &CancellationToken,
            request: CommitRequest,
        ) -> Result<CommitMessage, GenerationError> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(CommitMessage::compose(
                format!("feat: call {} for {}", n, request.records.len()),
                "",
                "",
            ))
        }
    }

    fn request(content: &str) -> CommitRequest {
        CommitRequest::new(
            vec![ChangeRecord::new("a.rs", ChangeType::Modified).with_content(content)],
            "",
            GenerationContext::new(),
        )
    }

    fn caching() -> CachingGenerator<CountingGenerator> {
        CachingGenerator::new(
            CountingGenerator {
                calls: AtomicUsize::new(0),
            },
            Arc::new(ResponseCache::new(16)),
        )
    }

    #[tokio::test]
    async fn test_identical_requests_hit_cache() {
        let generator = caching();
        let cancel = CancellationToken::new();

        let first = generator.generate(&cancel, request("+x")).await.expect("first");
        let second = generator.generate(&cancel, request("+x")).await.expect("second");
        assert_eq!(first, second);
        assert_eq!(generator.inner.calls.load(Ordering::SeqCst), 1);
        assert_eq!(generator.cache().stats().hits, 1);
    }

    #[tokio::test]
    async fn test_different_content_misses() {
        let generator = caching();
        let cancel = CancellationToken::new();

        generator.generate(&cancel, request("+x")).await.expect("first");
        generator.generate(&cancel, request("+y")).await.expect("second");
        assert_eq!(generator.inner.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_previous_attempt_bypasses_cache() {
        let generator = caching();
        let cancel = CancellationToken::new();

        generator.generate(&cancel, request("+x")).await.expect("first");
        let mut retry = request("+x");
        retry.context = GenerationContext::new().with_previous_attempt("feat: call 0 for 1");
        let msg = generator.generate(&cancel, retry).await.expect("retry");

        assert_eq!(msg.subject, "feat: call 1 for 1");
        assert_eq!(generator.inner.calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_request_key_depends_on_counts() {
        let a = request("+x");
        let mut b = request("+x");
        b.records[0].additions = 3;
        assert_ne!(request_key("", &a), request_key("", &b));
        assert_eq!(request_key("", &a), request_key("", &request("+x")));
    }

    #[tokio::test]
    async fn test_shared_cache_is_keyed_by_prefix() {
        let cache = Arc::new(ResponseCache::new(16));
        let counting = || CountingGenerator {
            calls: AtomicUsize::new(0),
        };
        let small = CachingGenerator::new(counting(), cache.clone()).with_key_prefix("small|0.3|256");
        let large = CachingGenerator::new(counting(), cache.clone()).with_key_prefix("large|0.3|256");
        let cancel = CancellationToken::new();

        small.generate(&cancel, request("+x")).await.expect("small");
        large.generate(&cancel, request("+x")).await.expect("large");
        small.generate(&cancel, request("+x")).await.expect("small again");

        assert_eq!(small.inner.calls.load(Ordering::SeqCst), 1);
        assert_eq!(large.inner.calls.load(Ordering::SeqCst), 1);
        assert_eq!(cache.stats().hits, 1);
        assert_ne!(
            request_key("small|0.3|256", &request("+x")),
            request_key("small|0.7|256", &request("+x"))
        );
    }
}
