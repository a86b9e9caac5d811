use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::error::{RagError, Result};

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    pub corpus: CorpusConfig,
    #[serde(default)]
    pub chunking: ChunkingConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub index: IndexConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub chat: ChatConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct CorpusConfig {
    pub dir: PathBuf,
    #[serde(default = "default_include_globs")]
    pub include_globs: Vec<String>,
    #[serde(default)]
    pub exclude_globs: Vec<String>,
}

impl Default for CorpusConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("./data"),
            include_globs: default_include_globs(),
            exclude_globs: Vec::new(),
        }
    }
}

fn default_include_globs() -> Vec<String> {
    vec![
        "**/*.md".to_string(),
        "**/*.txt".to_string(),
        "**/*.pdf".to_string(),
    ]
}

#[derive(Debug, Deserialize, Clone)]
pub struct ChunkingConfig {
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
    #[serde(default = "default_overlap")]
    pub overlap: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self { chunk_size: default_chunk_size(), overlap: default_overlap() }
    }
}

fn default_chunk_size() -> usize {
    1024
}
fn default_overlap() -> usize {
    100
}

#[derive(Debug, Deserialize, Clone)]
pub struct RetrievalConfig {
    #[serde(default = "default_top_k")]
    pub top_k: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self { top_k: default_top_k() }
    }
}

fn default_top_k() -> usize {
    3
}

#[derive(Debug, Deserialize, Clone)]
pub struct IndexConfig {
    #[serde(default = "default_index_dir")]
    pub dir: PathBuf,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self { dir: default_index_dir() }
    }
}

fn default_index_dir() -> PathBuf {
    PathBuf::from("./storage")
}

#[derive(Debug, Deserialize, Clone)]
pub struct EmbeddingConfig {
    #[serde(default = "default_embedding_model")]
    pub model: String,
    #[serde(default = "default_dims")]
    pub dims: usize,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            model: default_embedding_model(),
            dims: default_dims(),
            batch_size: default_batch_size(),
            max_retries: default_max_retries(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_embedding_model() -> String {
    "text-embedding-3-small".to_string()
}
fn default_dims() -> usize {
    1536
}
fn default_batch_size() -> usize {
    64
}
fn default_max_retries() -> u32 {
    5
}
fn default_timeout_secs() -> u64 {
    30
}

#[derive(Debug, Deserialize, Clone)]
pub struct LlmConfig {
    #[serde(default = "default_llm_model")]
    pub model: String,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    /// Token budget for the retrieved-context block in a single LLM call.
    #[serde(default = "default_context_token_budget")]
    pub context_token_budget: usize,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            model: default_llm_model(),
            temperature: default_temperature(),
            context_token_budget: default_context_token_budget(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_llm_model() -> String {
    "gpt-3.5-turbo".to_string()
}
fn default_temperature() -> f32 {
    0.2
}
fn default_context_token_budget() -> usize {
    3000
}

#[derive(Debug, Deserialize, Clone)]
pub struct ChatConfig {
    /// Token budget for the conversation history; oldest turns are evicted
    /// first once it is exceeded.
    #[serde(default = "default_history_token_budget")]
    pub history_token_budget: usize,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self { history_token_budget: default_history_token_budget() }
    }
}

fn default_history_token_budget() -> usize {
    4096
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path).map_err(|e| {
        RagError::Configuration(format!("failed to read config file {}: {e}", path.display()))
    })?;

    let config: Config = toml::from_str(&content).map_err(|e| {
        RagError::Configuration(format!("failed to parse config file {}: {e}", path.display()))
    })?;

    validate(&config)?;
    Ok(config)
}

/// Reject inconsistent values before any work starts.
pub fn validate(config: &Config) -> Result<()> {
    if config.chunking.chunk_size == 0 {
        return Err(RagError::Configuration(
            "chunking.chunk_size must be > 0".to_string(),
        ));
    }

    // An overlap >= chunk size would never let chunking progress.
    if config.chunking.overlap >= config.chunking.chunk_size {
        return Err(RagError::Configuration(format!(
            "chunking.overlap ({}) must be less than chunking.chunk_size ({})",
            config.chunking.overlap, config.chunking.chunk_size
        )));
    }

    if config.retrieval.top_k == 0 {
        return Err(RagError::Configuration(
            "retrieval.top_k must be >= 1".to_string(),
        ));
    }

    if config.embedding.dims == 0 {
        return Err(RagError::Configuration(
            "embedding.dims must be > 0".to_string(),
        ));
    }
    if config.embedding.batch_size == 0 {
        return Err(RagError::Configuration(
            "embedding.batch_size must be > 0".to_string(),
        ));
    }

    if !(0.0..=2.0).contains(&config.llm.temperature) {
        return Err(RagError::Configuration(format!(
            "llm.temperature ({}) must be in [0.0, 2.0]",
            config.llm.temperature
        )));
    }
    if config.llm.context_token_budget == 0 {
        return Err(RagError::Configuration(
            "llm.context_token_budget must be > 0".to_string(),
        ));
    }

    if config.chat.history_token_budget == 0 {
        return Err(RagError::Configuration(
            "chat.history_token_budget must be > 0".to_string(),
        ));
    }

    Ok(())
}
