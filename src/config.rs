use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::models::SubscriptionPlan;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub db: DbConfig,
    pub server: ServerConfig,
    #[serde(default)]
    pub blob: BlobConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub plans: PlansConfig,
    #[serde(default)]
    pub ingest: IngestConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DbConfig {
    pub path: PathBuf,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub bind: String,
}

/// Where uploaded blobs are fetched from: `{base_url}/{storage_key}`.
#[derive(Debug, Deserialize, Clone)]
pub struct BlobConfig {
    #[serde(default = "default_blob_base_url")]
    pub base_url: String,
}

impl Default for BlobConfig {
    fn default() -> Self {
        Self {
            base_url: default_blob_base_url(),
        }
    }
}

fn default_blob_base_url() -> String {
    "https://utfs.io/f".to_string()
}

/// Fan-out and history-window tunables for the answer engine. Product
/// tunables, not protocol invariants.
#[derive(Debug, Deserialize, Clone)]
pub struct RetrievalConfig {
    /// Top-k similar passages per question. Bounds prompt size.
    #[serde(default = "default_top_k")]
    pub top_k: usize,
    /// Prior messages included in the transcript, oldest-to-newest.
    #[serde(default = "default_history_limit")]
    pub history_limit: i64,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: default_top_k(),
            history_limit: default_history_limit(),
        }
    }
}

fn default_top_k() -> usize {
    4
}
fn default_history_limit() -> i64 {
    6
}

#[derive(Debug, Deserialize, Clone)]
pub struct EmbeddingConfig {
    #[serde(default = "default_provider")]
    pub provider: String,
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
    /// API base, overridable for tests.
    #[serde(default = "default_openai_base_url")]
    pub base_url: String,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: default_embedding_model(),
            dims: default_dims(),
            batch_size: default_batch_size(),
            max_retries: default_max_retries(),
            timeout_secs: default_timeout_secs(),
            base_url: default_openai_base_url(),
        }
    }
}

fn default_provider() -> String {
    "openai".to_string()
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
fn default_openai_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct LlmConfig {
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default = "default_llm_model")]
    pub model: String,
    /// Fixed at 0 by default: deterministic-leaning answers are a product
    /// choice, not an incidental default.
    #[serde(default)]
    pub temperature: f64,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_openai_base_url")]
    pub base_url: String,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: default_llm_model(),
            temperature: 0.0,
            max_tokens: default_max_tokens(),
            timeout_secs: default_timeout_secs(),
            base_url: default_openai_base_url(),
        }
    }
}

fn default_llm_model() -> String {
    "gpt-4o-mini".to_string()
}
fn default_max_tokens() -> u32 {
    1024
}

/// Subscription tiers. The upload event says whether the owner is
/// subscribed; the evaluator picks the matching tier.
#[derive(Debug, Deserialize, Clone)]
pub struct PlansConfig {
    #[serde(default = "default_free_plan")]
    pub free: PlanTier,
    #[serde(default = "default_pro_plan")]
    pub pro: PlanTier,
}

#[derive(Debug, Deserialize, Clone)]
pub struct PlanTier {
    pub max_files: i64,
    pub units_per_file: usize,
}

impl Default for PlansConfig {
    fn default() -> Self {
        Self {
            free: default_free_plan(),
            pro: default_pro_plan(),
        }
    }
}

fn default_free_plan() -> PlanTier {
    PlanTier {
        max_files: 10,
        units_per_file: 5,
    }
}
fn default_pro_plan() -> PlanTier {
    PlanTier {
        max_files: 50,
        units_per_file: 25,
    }
}

impl PlansConfig {
    /// Resolve the plan for a caller: subscribed → pro, otherwise free.
    pub fn resolve(&self, is_subscribed: bool) -> SubscriptionPlan {
        let (name, tier) = if is_subscribed {
            ("pro", &self.pro)
        } else {
            ("free", &self.free)
        };
        SubscriptionPlan {
            name: name.to_string(),
            is_subscribed,
            max_files: tier.max_files,
            units_per_file: tier.units_per_file,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct IngestConfig {
    /// Timeout for fetching the uploaded blob.
    #[serde(default = "default_fetch_timeout_secs")]
    pub fetch_timeout_secs: u64,
    /// Timeout applied to each pipeline step (parse, index).
    #[serde(default = "default_step_timeout_secs")]
    pub step_timeout_secs: u64,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            fetch_timeout_secs: default_fetch_timeout_secs(),
            step_timeout_secs: default_step_timeout_secs(),
        }
    }
}

fn default_fetch_timeout_secs() -> u64 {
    30
}
fn default_step_timeout_secs() -> u64 {
    120
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;

    validate(&config)?;
    Ok(config)
}

fn validate(config: &Config) -> Result<()> {
    if config.retrieval.top_k == 0 {
        anyhow::bail!("retrieval.top_k must be >= 1");
    }
    if config.retrieval.history_limit < 0 {
        anyhow::bail!("retrieval.history_limit must be >= 0");
    }
    if config.embedding.dims == 0 {
        anyhow::bail!("embedding.dims must be > 0");
    }
    if config.embedding.batch_size == 0 {
        anyhow::bail!("embedding.batch_size must be > 0");
    }
    if !(0.0..=2.0).contains(&config.llm.temperature) {
        anyhow::bail!("llm.temperature must be in [0.0, 2.0]");
    }
    if config.plans.free.units_per_file == 0 || config.plans.pro.units_per_file == 0 {
        anyhow::bail!("plans.*.units_per_file must be > 0");
    }

    match config.embedding.provider.as_str() {
        "openai" => {}
        other => anyhow::bail!("Unknown embedding provider: '{}'. Must be openai.", other),
    }
    match config.llm.provider.as_str() {
        "openai" => {}
        other => anyhow::bail!("Unknown llm provider: '{}'. Must be openai.", other),
    }

    Ok(())
}
