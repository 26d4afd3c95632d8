//! Configuration for one diffscribe invocation.
//!
//! Groups the processing policy, the concurrency bound of the orchestrator,
//! LLM request settings and the overall deadline.

use std::time::Duration;
use thiserror::Error;

use crate::llm::DEFAULT_MODEL;
use crate::processor::ProcessingConfig;

/// Errors that can occur during configuration operations.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// An environment variable has an invalid value.
    #[error("Invalid value for {key}: {message}")]
    InvalidValue { key: String, message: String },

    /// Configuration validation failed.
    #[error("Configuration validation failed: {0}")]
    ValidationFailed(String),
}

/// Default deadline for a whole generation.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(120);

/// All tunables of the pipeline.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Filtering, threshold and partitioning policy.
    pub processing: ProcessingConfig,
    /// Upper bound on in-flight generator calls.
    pub max_concurrent_calls: usize,

    // LLM settings
    pub model: String,
    pub temperature: f64,
    pub max_tokens: u32,

    /// Deadline after which the shared cancellation token fires.
    pub timeout: Duration,
    /// Whether identical requests are answered from the response cache.
    pub cache_enabled: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        let processing = ProcessingConfig::default();
        Self {
            max_concurrent_calls: processing.max_concurrency,
            processing,
            model: DEFAULT_MODEL.to_string(),
            temperature: 0.3,
            max_tokens: 1024,
            timeout: DEFAULT_TIMEOUT,
            cache_enabled: true,
        }
    }
}

impl PipelineConfig {
    /// Creates a new configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates configuration from environment variables.
    ///
    /// # Environment Variables
    ///
    /// - `DIFFSCRIBE_SIZE_THRESHOLD`: Bytes above which the diff is partitioned (default: 10240)
    /// - `DIFFSCRIBE_MAX_CHUNK_SIZE`: Per-record content limit when partitioning (default: 102400)
    /// - `DIFFSCRIBE_MAX_CONCURRENCY`: Group count and in-flight call bound (default: 3)
    /// - `DIFFSCRIBE_MODEL`: LLM model (default: anthropic/claude-sonnet-4)
    /// - `DIFFSCRIBE_TEMPERATURE`: LLM temperature (default: 0.3)
    /// - `DIFFSCRIBE_MAX_TOKENS`: Completion token limit (default: 1024)
    /// - `DIFFSCRIBE_TIMEOUT_SECS`: Overall deadline in seconds (default: 120)
    /// - `DIFFSCRIBE_CACHE_ENABLED`: Enable the response cache (default: true)
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if a variable has an invalid value.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`from_env`](Self::from_env) but reading values through `lookup`.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        // Processing settings
        if let Some(val) = lookup("DIFFSCRIBE_SIZE_THRESHOLD") {
            config.processing.size_threshold = parse_env_value(&val, "DIFFSCRIBE_SIZE_THRESHOLD")?;
        }

        if let Some(val) = lookup("DIFFSCRIBE_MAX_CHUNK_SIZE") {
            config.processing.max_chunk_content_size =
                parse_env_value(&val, "DIFFSCRIBE_MAX_CHUNK_SIZE")?;
        }

        if let Some(val) = lookup("DIFFSCRIBE_MAX_CONCURRENCY") {
            let max: usize = parse_env_value(&val, "DIFFSCRIBE_MAX_CONCURRENCY")?;
            config = config.with_max_concurrency(max);
        }

        // LLM settings
        if let Some(val) = lookup("DIFFSCRIBE_MODEL") {
            config.model = val;
        }

        if let Some(val) = lookup("DIFFSCRIBE_TEMPERATURE") {
            config.temperature = parse_env_value(&val, "DIFFSCRIBE_TEMPERATURE")?;
        }

        if let Some(val) = lookup("DIFFSCRIBE_MAX_TOKENS") {
            config.max_tokens = parse_env_value(&val, "DIFFSCRIBE_MAX_TOKENS")?;
        }

        if let Some(val) = lookup("DIFFSCRIBE_TIMEOUT_SECS") {
            let secs: u64 = parse_env_value(&val, "DIFFSCRIBE_TIMEOUT_SECS")?;
            config.timeout = Duration::from_secs(secs);
        }

        if let Some(val) = lookup("DIFFSCRIBE_CACHE_ENABLED") {
            config.cache_enabled = parse_env_bool(&val, "DIFFSCRIBE_CACHE_ENABLED")?;
        }

        config.validate()?;
        Ok(config)
    }

    /// Validates the configuration values.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::ValidationFailed` if any values are invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.processing.size_threshold == 0 {
            return Err(ConfigError::ValidationFailed(
                "size_threshold must be greater than 0".to_string(),
            ));
        }

        if self.processing.max_chunk_content_size == 0 {
            return Err(ConfigError::ValidationFailed(
                "max_chunk_content_size must be greater than 0".to_string(),
            ));
        }

        if self.processing.max_concurrency == 0 {
            return Err(ConfigError::ValidationFailed(
                "max_concurrency must be greater than 0".to_string(),
            ));
        }

        if self.max_concurrent_calls == 0 {
            return Err(ConfigError::ValidationFailed(
                "max_concurrent_calls must be greater than 0".to_string(),
            ));
        }

        if self.timeout.is_zero() {
            return Err(ConfigError::ValidationFailed(
                "timeout must be greater than 0".to_string(),
            ));
        }

        if !(0.0..=2.0).contains(&self.temperature) {
            return Err(ConfigError::ValidationFailed(
                "temperature must be between 0.0 and 2.0".to_string(),
            ));
        }

        if self.max_tokens == 0 {
            return Err(ConfigError::ValidationFailed(
                "max_tokens must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }

    pub fn with_processing(mut self, processing: ProcessingConfig) -> Self {
        self.processing = processing;
        self
    }

    pub fn with_size_threshold(mut self, bytes: usize) -> Self {
        self.processing.size_threshold = bytes;
        self
    }

    pub fn with_max_chunk_content_size(mut self, bytes: usize) -> Self {
        self.processing.max_chunk_content_size = bytes;
        self
    }

    /// Sets both the group count and the in-flight call bound.
    pub fn with_max_concurrency(mut self, max: usize) -> Self {
        self.processing.max_concurrency = max;
        self.max_concurrent_calls = max;
        self
    }

    /// Sets only the in-flight call bound.
    pub fn with_max_concurrent_calls(mut self, max: usize) -> Self {
        self.max_concurrent_calls = max;
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_temperature(mut self, temp: f64) -> Self {
        self.temperature = temp;
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_cache_enabled(mut self, enabled: bool) -> Self {
        self.cache_enabled = enabled;
        self
    }
}

/// Parse an environment variable value into a type.
fn parse_env_value<T: std::str::FromStr>(value: &str, key: &str) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::InvalidValue {
        key: key.to_string(),
        message: format!("could not parse '{}'", value),
    })
}

/// Parse an environment variable as a boolean.
fn parse_env_bool(value: &str, key: &str) -> Result<bool, ConfigError> {
    match value.trim().to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Ok(true),
        "false" | "0" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::InvalidValue {
            key: key.to_string(),
            message: format!("expected boolean value, got '{}'", value),
        }),
    }
}
