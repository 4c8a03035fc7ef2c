use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub chunking: ChunkingConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub completion: CompletionConfig,
    #[serde(default)]
    pub math: MathConfig,
    #[serde(default)]
    pub ocr: OcrConfig,
    #[serde(default)]
    pub crawl: CrawlConfig,
    #[serde(default)]
    pub report: ReportConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ChunkingConfig {
    #[serde(default = "default_chunk_size")]
    pub chunk_size_tokens: usize,
    #[serde(default = "default_overlap")]
    pub overlap_tokens: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_size_tokens: default_chunk_size(),
            overlap_tokens: default_overlap(),
        }
    }
}

fn default_chunk_size() -> usize {
    500
}
fn default_overlap() -> usize {
    50
}

#[derive(Debug, Deserialize, Clone)]
pub struct RetrievalConfig {
    #[serde(default = "default_top_k")]
    pub top_k: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: default_top_k(),
        }
    }
}

fn default_top_k() -> usize {
    4
}

#[derive(Debug, Deserialize, Clone)]
pub struct EmbeddingConfig {
    #[serde(default = "default_embedding_provider")]
    pub provider: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub dims: Option<usize>,
    /// Base URL for OpenAI-compatible or Ollama endpoints.
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Fixed delay between retries of a rate-limited batch.
    #[serde(default = "default_retry_delay_secs")]
    pub retry_delay_secs: u64,
    /// Total time a batch may spend retrying before it is skipped.
    #[serde(default = "default_max_retry_secs")]
    pub max_retry_secs: u64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: default_embedding_provider(),
            model: None,
            dims: None,
            url: None,
            batch_size: default_batch_size(),
            timeout_secs: default_timeout_secs(),
            retry_delay_secs: default_retry_delay_secs(),
            max_retry_secs: default_max_retry_secs(),
        }
    }
}

fn default_embedding_provider() -> String {
    "hash".to_string()
}
fn default_batch_size() -> usize {
    64
}
fn default_timeout_secs() -> u64 {
    30
}
fn default_retry_delay_secs() -> u64 {
    20
}
fn default_max_retry_secs() -> u64 {
    600
}

impl EmbeddingConfig {
    pub fn retry_delay(&self) -> Duration {
        Duration::from_secs(self.retry_delay_secs)
    }

    pub fn max_retry(&self) -> Duration {
        Duration::from_secs(self.max_retry_secs)
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct CompletionConfig {
    /// `openai`, `ollama` or `debug`.
    #[serde(default = "default_backend")]
    pub backend: String,
    #[serde(default = "default_completion_model")]
    pub model: String,
    #[serde(default)]
    pub temperature: f32,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default = "default_completion_timeout")]
    pub timeout_secs: u64,
}

impl Default for CompletionConfig {
    fn default() -> Self {
        Self {
            backend: default_backend(),
            model: default_completion_model(),
            temperature: 0.0,
            url: None,
            timeout_secs: default_completion_timeout(),
        }
    }
}

fn default_backend() -> String {
    "openai".to_string()
}
fn default_completion_model() -> String {
    "gpt-3.5-turbo-1106".to_string()
}
fn default_completion_timeout() -> u64 {
    120
}

#[derive(Debug, Deserialize, Clone)]
pub struct MathConfig {
    /// `local`, `wolfram` or `disabled`.
    #[serde(default = "default_math_provider")]
    pub provider: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for MathConfig {
    fn default() -> Self {
        Self {
            provider: default_math_provider(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_math_provider() -> String {
    "local".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct OcrConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default = "default_max_rounds")]
    pub max_rounds: u32,
    /// Delay after each individual poll.
    #[serde(default = "default_poll_delay_ms")]
    pub poll_delay_ms: u64,
    /// Delay between polling rounds.
    #[serde(default = "default_round_delay_ms")]
    pub round_delay_ms: u64,
    /// Delay after each image submission.
    #[serde(default = "default_submit_delay_ms")]
    pub submit_delay_ms: u64,
    /// Overall budget for the polling phase of one document.
    #[serde(default)]
    pub deadline_secs: Option<u64>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for OcrConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            url: None,
            max_rounds: default_max_rounds(),
            poll_delay_ms: default_poll_delay_ms(),
            round_delay_ms: default_round_delay_ms(),
            submit_delay_ms: default_submit_delay_ms(),
            deadline_secs: None,
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_max_rounds() -> u32 {
    10
}
fn default_poll_delay_ms() -> u64 {
    1_000
}
fn default_round_delay_ms() -> u64 {
    10_000
}
fn default_submit_delay_ms() -> u64 {
    5_000
}

#[derive(Debug, Deserialize, Clone)]
pub struct CrawlConfig {
    #[serde(default = "default_max_pages")]
    pub max_pages: usize,
    #[serde(default = "default_crawl_timeout")]
    pub timeout_secs: u64,
}

impl Default for CrawlConfig {
    fn default() -> Self {
        Self {
            max_pages: default_max_pages(),
            timeout_secs: default_crawl_timeout(),
        }
    }
}

fn default_max_pages() -> usize {
    50
}
fn default_crawl_timeout() -> u64 {
    20
}

#[derive(Debug, Deserialize, Clone)]
pub struct ReportConfig {
    /// Passages retrieved per topic.
    #[serde(default = "default_context_k")]
    pub context_k: usize,
    /// Custom outline. Empty means the built-in company analysis outline.
    #[serde(default)]
    pub topics: Vec<TopicConfig>,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            context_k: default_context_k(),
            topics: Vec::new(),
        }
    }
}

fn default_context_k() -> usize {
    8
}

#[derive(Debug, Deserialize, Clone)]
pub struct TopicConfig {
    pub title: String,
    pub description: String,
}

/// Load and validate a TOML config. A missing file yields the defaults.
pub fn load_config(path: &Path) -> Result<Config> {
    if !path.exists() {
        tracing::debug!("config {} not found, using defaults", path.display());
        let config = Config::default();
        validate(&config)?;
        return Ok(config);
    }

    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;
    validate(&config)?;
    Ok(config)
}

pub fn validate(config: &Config) -> Result<()> {
    // Validate chunking
    if config.chunking.chunk_size_tokens == 0 {
        anyhow::bail!("chunking.chunk_size_tokens must be > 0");
    }
    if config.chunking.overlap_tokens >= config.chunking.chunk_size_tokens {
        anyhow::bail!("chunking.overlap_tokens must be < chunking.chunk_size_tokens");
    }

    // Validate retrieval
    if config.retrieval.top_k < 1 {
        anyhow::bail!("retrieval.top_k must be >= 1");
    }
    if config.report.context_k < 1 {
        anyhow::bail!("report.context_k must be >= 1");
    }

    // Validate embedding
    if config.embedding.batch_size == 0 {
        anyhow::bail!("embedding.batch_size must be > 0");
    }
    match config.embedding.provider.as_str() {
        "hash" | "openai" | "ollama" | "local" => {}
        other => anyhow::bail!(
            "Unknown embedding provider: '{}'. Must be hash, openai, ollama, or local.",
            other
        ),
    }
    if matches!(config.embedding.provider.as_str(), "openai" | "ollama")
        && config.embedding.model.is_none()
    {
        anyhow::bail!(
            "embedding.model must be specified when provider is '{}'",
            config.embedding.provider
        );
    }

    match config.math.provider.as_str() {
        "local" | "wolfram" | "disabled" => {}
        other => anyhow::bail!(
            "Unknown math provider: '{}'. Must be local, wolfram, or disabled.",
            other
        ),
    }

    if config.ocr.enabled && config.ocr.url.is_none() {
        anyhow::bail!("ocr.url must be set when ocr.enabled = true");
    }

    if config.crawl.max_pages == 0 {
        anyhow::bail!("crawl.max_pages must be > 0");
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = Config::default();
        validate(&config).unwrap();
        assert_eq!(config.retrieval.top_k, 4);
        assert_eq!(config.completion.backend, "openai");
        assert_eq!(config.ocr.max_rounds, 10);
    }

    #[test]
    fn parses_partial_toml() {
        let config: Config = toml::from_str(
            r#"
            [chunking]
            chunk_size_tokens = 120
            overlap_tokens = 10

            [completion]
            backend = "debug"

            [[report.topics]]
            title = "Pricing"
            description = "The pricing of the company"
            "#,
        )
        .unwrap();
        validate(&config).unwrap();
        assert_eq!(config.chunking.chunk_size_tokens, 120);
        assert_eq!(config.embedding.provider, "hash");
        assert_eq!(config.report.topics.len(), 1);
    }

    #[test]
    fn overlap_must_be_smaller_than_chunk() {
        let mut config = Config::default();
        config.chunking.overlap_tokens = config.chunking.chunk_size_tokens;
        assert!(validate(&config).is_err());
    }

    #[test]
    fn ocr_requires_url() {
        let mut config = Config::default();
        config.ocr.enabled = true;
        assert!(validate(&config).is_err());
        config.ocr.url = Some("http://localhost:9000".into());
        validate(&config).unwrap();
    }

    #[test]
    fn missing_file_yields_defaults() {
        let config = load_config(Path::new("/nonexistent/docqa.toml")).unwrap();
        assert_eq!(config.chunking.chunk_size_tokens, 500);
    }
}
