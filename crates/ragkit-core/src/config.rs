//! Layered configuration loader, typed settings and path helpers.
//!
//! Uses Figment to merge built-in defaults + `config.toml` +
//! `config.<env>.toml` + `APP_*` env vars (nested keys split on `__`, e.g.
//! `APP_CHUNKING__CHUNK_SIZE=400`). `RagConfig::validate` rejects invalid
//! combinations before anything is constructed from them.

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{Error, Result};

pub struct Config {
    figment: Figment,
}

impl Config {
    pub fn load() -> anyhow::Result<Self> {
        let env_name = env::var("RUST_ENV").unwrap_or_else(|_| "dev".to_string());

        let mut figment = Figment::from(Serialized::defaults(RagConfig::default()))
            .merge(Toml::file("config.toml"));
        match env_name.as_str() {
            "dev" | "development" => figment = figment.merge(Toml::file("config.dev.toml")),
            "prod" | "production" => figment = figment.merge(Toml::file("config.prod.toml")),
            "test" | "testing" => figment = figment.merge(Toml::file("config.test.toml")),
            _ => {}
        }
        figment = figment.merge(Env::prefixed("APP_").split("__"));

        Ok(Self { figment })
    }

    pub fn from_figment(figment: Figment) -> Self {
        Self { figment }
    }

    pub fn get<T>(&self, key: &str) -> anyhow::Result<T>
    where
        T: serde::de::DeserializeOwned,
    {
        self.figment
            .extract_inner(key)
            .map_err(|e| anyhow::anyhow!("Failed to get '{}': {}", key, e))
    }

    /// Extract and validate the full typed configuration.
    pub fn rag(&self) -> Result<RagConfig> {
        let cfg: RagConfig = self
            .figment
            .extract()
            .map_err(|e| Error::config(e.to_string()))?;
        cfg.validate()?;
        Ok(cfg)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RagConfig {
    pub chunking: ChunkingConfig,
    pub rerank: RerankConfig,
    pub retrieval: RetrievalConfig,
    pub generation: GenerationConfig,
    pub cache: CacheConfig,
    pub breaker: BreakerConfig,
    pub rate_limit: RateLimitConfig,
    pub data: DataConfig,
}

impl RagConfig {
    pub fn validate(&self) -> Result<()> {
        self.chunking.validate()?;
        self.rerank.validate()?;
        self.retrieval.validate()?;
        self.generation.validate()?;
        self.cache.validate()?;
        self.breaker.validate()?;
        self.rate_limit.validate()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChunkStrategyKind {
    #[default]
    Sentence,
    Fixed,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkingConfig {
    pub strategy: ChunkStrategyKind,
    /// Target chunk length in characters.
    pub chunk_size: usize,
    pub overlap: usize,
    /// Chunks whose trimmed length is at or below this are dropped.
    pub min_chunk_len: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            strategy: ChunkStrategyKind::Sentence,
            chunk_size: 800,
            overlap: 200,
            min_chunk_len: 50,
        }
    }
}

impl ChunkingConfig {
    pub fn validate(&self) -> Result<()> {
        if self.chunk_size == 0 {
            return Err(Error::config("chunking.chunk_size must be greater than 0"));
        }
        if self.overlap >= self.chunk_size {
            return Err(Error::config(format!(
                "chunking.overlap ({}) must be smaller than chunk_size ({})",
                self.overlap, self.chunk_size
            )));
        }
        Ok(())
    }
}

/// Weight of each re-ranking signal. Weights need not sum to 1.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RerankWeights {
    pub semantic: f64,
    pub keyword: f64,
    pub position: f64,
    pub length: f64,
    pub completeness: f64,
}

impl Default for RerankWeights {
    fn default() -> Self {
        WeightPreset::Balanced.weights()
    }
}

impl RerankWeights {
    fn components(&self) -> [(&'static str, f64); 5] {
        [
            ("semantic", self.semantic),
            ("keyword", self.keyword),
            ("position", self.position),
            ("length", self.length),
            ("completeness", self.completeness),
        ]
    }

    pub fn validate(&self) -> Result<()> {
        for (name, w) in self.components() {
            if !w.is_finite() || w < 0.0 {
                return Err(Error::config(format!(
                    "rerank weight '{name}' must be a finite non-negative number, got {w}"
                )));
            }
        }
        if self.components().iter().all(|(_, w)| *w == 0.0) {
            return Err(Error::config("at least one rerank weight must be positive"));
        }
        Ok(())
    }

    /// Stable textual identity of the weights, part of every cache key.
    pub fn fingerprint(&self) -> String {
        self.components()
            .iter()
            .map(|(name, w)| format!("{name}={w:.6}"))
            .collect::<Vec<_>>()
            .join(",")
    }
}

/// Named weight sets for common tuning goals.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WeightPreset {
    Balanced,
    KeywordFocused,
    QualityFocused,
}

impl WeightPreset {
    pub fn weights(self) -> RerankWeights {
        let (semantic, keyword, position, length, completeness) = match self {
            WeightPreset::Balanced => (0.40, 0.25, 0.10, 0.10, 0.15),
            WeightPreset::KeywordFocused => (0.30, 0.40, 0.05, 0.10, 0.15),
            WeightPreset::QualityFocused => (0.35, 0.20, 0.05, 0.15, 0.25),
        };
        RerankWeights { semantic, keyword, position, length, completeness }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RerankConfig {
    /// When set, overrides `weights`.
    pub preset: Option<WeightPreset>,
    pub weights: RerankWeights,
    /// Length in characters that scores 1.0 on the length signal.
    pub optimal_length: usize,
}

impl Default for RerankConfig {
    fn default() -> Self {
        Self {
            preset: None,
            weights: RerankWeights::default(),
            optimal_length: 500,
        }
    }
}

impl RerankConfig {
    pub fn effective_weights(&self) -> RerankWeights {
        self.preset.map_or(self.weights, WeightPreset::weights)
    }

    pub fn validate(&self) -> Result<()> {
        if self.optimal_length == 0 {
            return Err(Error::config("rerank.optimal_length must be greater than 0"));
        }
        self.effective_weights().validate()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalConfig {
    /// Results returned to the caller.
    pub top_k: usize,
    /// Candidates fetched per returned result, before re-ranking.
    pub candidate_multiplier: usize,
    pub timeout_ms: u64,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self { top_k: 5, candidate_multiplier: 2, timeout_ms: 30_000 }
    }
}

impl RetrievalConfig {
    pub fn candidate_count(&self) -> usize {
        self.top_k.saturating_mul(self.candidate_multiplier)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn validate(&self) -> Result<()> {
        if self.top_k == 0 {
            return Err(Error::config("retrieval.top_k must be greater than 0"));
        }
        if self.candidate_multiplier == 0 {
            return Err(Error::config("retrieval.candidate_multiplier must be at least 1"));
        }
        if self.timeout_ms == 0 {
            return Err(Error::config("retrieval.timeout_ms must be greater than 0"));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationConfig {
    pub backend: String,
    pub temperature: f32,
    pub max_tokens: usize,
    pub timeout_ms: u64,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            backend: "extractive".to_string(),
            temperature: 0.3,
            max_tokens: 250,
            timeout_ms: 30_000,
        }
    }
}

impl GenerationConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// The settings that shape a generated answer, part of every cache key.
    /// The call timeout is left out.
    pub fn fingerprint(&self) -> String {
        format!("temperature={:.6},max_tokens={}", self.temperature, self.max_tokens)
    }

    pub fn validate(&self) -> Result<()> {
        if !(0.0..=2.0).contains(&self.temperature) {
            return Err(Error::config(format!(
                "generation.temperature must be within [0, 2], got {}",
                self.temperature
            )));
        }
        if self.max_tokens == 0 {
            return Err(Error::config("generation.max_tokens must be greater than 0"));
        }
        if self.timeout_ms == 0 {
            return Err(Error::config("generation.timeout_ms must be greater than 0"));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub enabled: bool,
    pub l1_capacity: usize,
    pub l1_ttl_secs: u64,
    pub l2_enabled: bool,
    pub l2_ttl_secs: u64,
    pub l2_timeout_ms: u64,
    pub key_prefix: String,
    pub semantic_enabled: bool,
    pub semantic_threshold: f32,
    pub semantic_capacity: usize,
    /// Seconds between shared-tier pings. 0 disables the probe.
    pub health_interval_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            l1_capacity: 100,
            l1_ttl_secs: 300,
            l2_enabled: false,
            l2_ttl_secs: 3600,
            l2_timeout_ms: 250,
            key_prefix: "rag:".to_string(),
            semantic_enabled: false,
            semantic_threshold: 0.85,
            semantic_capacity: 256,
            health_interval_secs: 30,
        }
    }
}

impl CacheConfig {
    pub fn l1_ttl(&self) -> Duration {
        Duration::from_secs(self.l1_ttl_secs)
    }

    pub fn l2_ttl(&self) -> Duration {
        Duration::from_secs(self.l2_ttl_secs)
    }

    pub fn l2_timeout(&self) -> Duration {
        Duration::from_millis(self.l2_timeout_ms)
    }

    pub fn validate(&self) -> Result<()> {
        if self.l1_capacity == 0 {
            return Err(Error::config("cache.l1_capacity must be greater than 0"));
        }
        if !(0.0..=1.0).contains(&self.semantic_threshold) {
            return Err(Error::config(format!(
                "cache.semantic_threshold must be within [0, 1], got {}",
                self.semantic_threshold
            )));
        }
        if self.semantic_enabled && self.semantic_capacity == 0 {
            return Err(Error::config("cache.semantic_capacity must be greater than 0"));
        }
        if self.l2_enabled && self.l2_timeout_ms == 0 {
            return Err(Error::config("cache.l2_timeout_ms must be greater than 0"));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BreakerConfig {
    pub failure_threshold: u32,
    pub recovery_timeout_secs: u64,
}

impl Default for BreakerConfig {
    fn default() -> Self {
        Self { failure_threshold: 5, recovery_timeout_secs: 60 }
    }
}

impl BreakerConfig {
    pub fn recovery_timeout(&self) -> Duration {
        Duration::from_secs(self.recovery_timeout_secs)
    }

    pub fn validate(&self) -> Result<()> {
        if self.failure_threshold == 0 {
            return Err(Error::config("breaker.failure_threshold must be greater than 0"));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TierLimit {
    pub max_requests: u32,
    pub window_secs: u64,
}

impl TierLimit {
    pub fn window(&self) -> Duration {
        Duration::from_secs(self.window_secs)
    }
}

pub const DEFAULT_TIER: &str = "default";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RateLimitConfig {
    pub enabled: bool,
    pub tiers: BTreeMap<String, TierLimit>,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        let mut tiers = BTreeMap::new();
        tiers.insert(DEFAULT_TIER.to_string(), TierLimit { max_requests: 10, window_secs: 60 });
        tiers.insert("premium".to_string(), TierLimit { max_requests: 100, window_secs: 60 });
        Self { enabled: true, tiers }
    }
}

impl RateLimitConfig {
    pub fn validate(&self) -> Result<()> {
        if !self.tiers.contains_key(DEFAULT_TIER) {
            return Err(Error::config("rate_limit.tiers must define a 'default' tier"));
        }
        for (name, limit) in &self.tiers {
            if limit.max_requests == 0 || limit.window_secs == 0 {
                return Err(Error::config(format!(
                    "rate_limit tier '{name}' needs max_requests > 0 and window_secs > 0"
                )));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DataConfig {
    pub raw_txt_dir: String,
    pub lancedb_dir: String,
    pub documents_table: String,
    pub cache_table: String,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            raw_txt_dir: "../dev_data/txt".to_string(),
            lancedb_dir: "../dev_data/indexes/lancedb".to_string(),
            documents_table: "documents".to_string(),
            cache_table: "rag_cache".to_string(),
        }
    }
}

/// Expand a user-provided path string:
/// - Expands leading '~' to the user's home directory
/// - Expands ${VAR} and $VAR environment variables
/// - Returns a PathBuf without attempting to canonicalize
pub fn expand_path<S: AsRef<str>>(input: S) -> PathBuf {
    let s = input.as_ref();
    let expanded_env = shellexpand::env(s).unwrap_or(std::borrow::Cow::Borrowed(s));
    let expanded = shellexpand::tilde(&expanded_env);
    PathBuf::from(expanded.as_ref())
}

/// Resolve a possibly relative path against a given base directory after expansion.
/// If `p` is absolute, it's returned as-is; otherwise `base.join(p)` is returned.
pub fn resolve_with_base<S: AsRef<str>>(base: &Path, p: S) -> PathBuf {
    let p = expand_path(p);
    if p.is_absolute() { p } else { base.join(p) }
}
