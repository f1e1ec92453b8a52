use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use sage_index::document::DEFAULT_MAX_FILE_SIZE;
use sage_index::{ChunkerConfig, SearchParams, TermModelConfig, TextEncoding};
use sage_llm::{ChatParams, RetryPolicy};
use serde::{Deserialize, Serialize};

use crate::context::ContextBudget;

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub index: IndexConfig,
    #[serde(default)]
    pub chunking: ChunkingConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub queue: QueueConfig,
    #[serde(skip)]
    pub secrets: ResolvedSecrets,
}

fn default_endpoint() -> String {
    "https://api.siliconflow.cn/v1/chat/completions".into()
}

fn default_provider_name() -> String {
    "siliconflow".into()
}

fn default_model() -> String {
    "Qwen/Qwen2.5-72B-Instruct".into()
}

fn default_temperature() -> f32 {
    0.7
}

fn default_max_tokens() -> u32 {
    2000
}

fn default_top_p() -> f32 {
    0.9
}

fn default_max_retries() -> u32 {
    3
}

fn default_retry_delay_secs() -> u64 {
    2
}

fn default_request_timeout_secs() -> u64 {
    30
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LlmConfig {
    /// Full chat-completions URL.
    #[serde(default = "default_endpoint")]
    pub endpoint: String,
    /// Label used in logs.
    #[serde(default = "default_provider_name")]
    pub provider_name: String,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_top_p")]
    pub top_p: f32,
    #[serde(default)]
    pub frequency_penalty: f32,
    #[serde(default)]
    pub presence_penalty: f32,
    /// Total attempts per model call.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_retry_delay_secs")]
    pub retry_delay_secs: u64,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            provider_name: default_provider_name(),
            model: default_model(),
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
            top_p: default_top_p(),
            frequency_penalty: 0.0,
            presence_penalty: 0.0,
            max_retries: default_max_retries(),
            retry_delay_secs: default_retry_delay_secs(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

impl LlmConfig {
    #[must_use]
    pub fn chat_params(&self) -> ChatParams {
        ChatParams {
            model: self.model.clone(),
            temperature: self.temperature,
            max_tokens: self.max_tokens,
            top_p: self.top_p,
            frequency_penalty: self.frequency_penalty,
            presence_penalty: self.presence_penalty,
        }
    }

    #[must_use]
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_retries: self.max_retries,
            delay: Duration::from_secs(self.retry_delay_secs),
            timeout: Duration::from_secs(self.request_timeout_secs),
        }
    }
}

fn default_index_path() -> PathBuf {
    PathBuf::from("./data/index.json")
}

fn default_max_features() -> usize {
    5000
}

fn default_ngram_range() -> (usize, usize) {
    (1, 2)
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct IndexConfig {
    #[serde(default = "default_index_path")]
    pub path: PathBuf,
    #[serde(default = "default_max_features")]
    pub max_features: usize,
    #[serde(default = "default_ngram_range")]
    pub ngram_range: (usize, usize),
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            path: default_index_path(),
            max_features: default_max_features(),
            ngram_range: default_ngram_range(),
        }
    }
}

impl IndexConfig {
    #[must_use]
    pub fn term_model(&self) -> TermModelConfig {
        TermModelConfig {
            max_features: self.max_features,
            ngram_range: self.ngram_range,
        }
    }
}

fn default_chunk_size() -> usize {
    500
}

fn default_chunk_overlap() -> usize {
    50
}

fn default_max_file_size() -> u64 {
    DEFAULT_MAX_FILE_SIZE
}

fn default_encodings() -> Vec<String> {
    TextEncoding::DEFAULT_CHAIN
        .iter()
        .map(|e| e.name().to_owned())
        .collect()
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ChunkingConfig {
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
    /// Validated but not applied; chunks never overlap.
    #[serde(default = "default_chunk_overlap")]
    pub chunk_overlap: usize,
    #[serde(default = "default_max_file_size")]
    pub max_file_size: u64,
    /// Text decoding order, e.g. `["utf-8", "gbk", "latin-1"]`.
    #[serde(default = "default_encodings")]
    pub encodings: Vec<String>,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_size: default_chunk_size(),
            chunk_overlap: default_chunk_overlap(),
            max_file_size: default_max_file_size(),
            encodings: default_encodings(),
        }
    }
}

impl ChunkingConfig {
    #[must_use]
    pub fn chunker(&self) -> ChunkerConfig {
        ChunkerConfig {
            chunk_size: self.chunk_size,
            chunk_overlap: self.chunk_overlap,
        }
    }

    /// Known encodings in configured order; unknown labels are skipped with a warning.
    #[must_use]
    pub fn encoding_chain(&self) -> Vec<TextEncoding> {
        self.encodings
            .iter()
            .filter_map(|label| {
                let encoding = TextEncoding::from_label(label);
                if encoding.is_none() {
                    tracing::warn!("ignoring unknown text encoding: {label}");
                }
                encoding
            })
            .collect()
    }
}

fn default_top_k() -> usize {
    5
}

fn default_similarity_threshold() -> f32 {
    0.01
}

fn default_max_context_length() -> usize {
    2000
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RetrievalConfig {
    #[serde(default = "default_top_k", alias = "max_results")]
    pub top_k: usize,
    #[serde(default = "default_similarity_threshold")]
    pub similarity_threshold: f32,
    /// Context budget in characters.
    #[serde(default = "default_max_context_length")]
    pub max_context_length: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: default_top_k(),
            similarity_threshold: default_similarity_threshold(),
            max_context_length: default_max_context_length(),
        }
    }
}

impl RetrievalConfig {
    #[must_use]
    pub fn search_params(&self) -> SearchParams {
        SearchParams {
            top_k: self.top_k,
            threshold: self.similarity_threshold,
        }
    }

    #[must_use]
    pub fn context_budget(&self) -> ContextBudget {
        ContextBudget {
            max_chars: self.max_context_length,
        }
    }
}

fn default_queue_capacity() -> usize {
    16
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct QueueConfig {
    #[serde(default = "default_queue_capacity")]
    pub capacity: usize,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            capacity: default_queue_capacity(),
        }
    }
}

/// A string that never prints its value.
#[derive(Clone, Default)]
pub struct Secret(String);

impl Secret {
    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    #[must_use]
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("<redacted>")
    }
}

impl fmt::Display for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("<redacted>")
    }
}

/// Values taken from the environment only, never from the config file.
#[derive(Debug, Default)]
pub struct ResolvedSecrets {
    pub api_key: Option<Secret>,
}
