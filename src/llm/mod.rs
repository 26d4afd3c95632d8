//! LLM integration for diffscribe.
//!
//! Provides the [`LlmProvider`] abstraction used by the commit writer, an
//! OpenAI-compatible HTTP client, and a typed response cache.
//!
//! ```ignore
//! use diffscribe::llm::{ChatRequest, LiteLlmClient, LlmProvider, Message};
//!
//! let client = LiteLlmClient::from_env()?;
//! let request = ChatRequest::new("", vec![Message::user("Hello!")]).with_max_tokens(50);
//! let response = client.generate(request).await?;
//! println!("{}", response.first_content().unwrap_or_default());
//! ```

pub mod cache;
pub mod litellm;

pub use cache::{CacheConfig, CacheStats, ContentHash, ResponseCache};
pub use litellm::{
    ChatRequest, ChatResponse, Choice, LiteLlmClient, LlmProvider, Message, Usage, DEFAULT_MODEL,
    OPENROUTER_API_BASE,
};
