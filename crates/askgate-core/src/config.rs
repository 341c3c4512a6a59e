use crate::{AskError, RiskProfile};
use anyhow::{Context, Result};
use config as cfg;
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".into(),
            port: 8080,
        }
    }
}

/// Candidate pool sizes and per-backend budgets for hybrid retrieval.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalSettings {
    #[serde(default = "RetrievalSettings::default_semantic_top_k")]
    pub semantic_top_k: usize,
    #[serde(default = "RetrievalSettings::default_keyword_top_k")]
    pub keyword_top_k: usize,
    #[serde(default = "RetrievalSettings::default_rerank_final_k")]
    pub rerank_final_k: usize,
    #[serde(default = "RetrievalSettings::default_backend_timeout_ms")]
    pub semantic_timeout_ms: u64,
    #[serde(default = "RetrievalSettings::default_backend_timeout_ms")]
    pub lexical_timeout_ms: u64,
    #[serde(default = "RetrievalSettings::default_embedding_timeout_ms")]
    pub embedding_timeout_ms: u64,
    /// Keep answering from the lexical list alone when the query embedding
    /// cannot be obtained.
    #[serde(default)]
    pub allow_lexical_only: bool,
}

impl RetrievalSettings {
    fn default_semantic_top_k() -> usize {
        20
    }

    fn default_keyword_top_k() -> usize {
        20
    }

    fn default_rerank_final_k() -> usize {
        8
    }

    fn default_backend_timeout_ms() -> u64 {
        2_000
    }

    fn default_embedding_timeout_ms() -> u64 {
        5_000
    }

    pub fn semantic_timeout(&self) -> Duration {
        Duration::from_millis(self.semantic_timeout_ms)
    }

    pub fn lexical_timeout(&self) -> Duration {
        Duration::from_millis(self.lexical_timeout_ms)
    }

    pub fn embedding_timeout(&self) -> Duration {
        Duration::from_millis(self.embedding_timeout_ms)
    }
}

impl Default for RetrievalSettings {
    fn default() -> Self {
        Self {
            semantic_top_k: Self::default_semantic_top_k(),
            keyword_top_k: Self::default_keyword_top_k(),
            rerank_final_k: Self::default_rerank_final_k(),
            semantic_timeout_ms: Self::default_backend_timeout_ms(),
            lexical_timeout_ms: Self::default_backend_timeout_ms(),
            embedding_timeout_ms: Self::default_embedding_timeout_ms(),
            allow_lexical_only: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FusionStrategy {
    /// `sum(1 / (k + rank))` over the lists a chunk appears in.
    ReciprocalRank,
    /// Weighted sum of per-list min-max normalized scores.
    WeightedSum,
}

impl Default for FusionStrategy {
    fn default() -> Self {
        Self::ReciprocalRank
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FusionConfig {
    #[serde(default)]
    pub strategy: FusionStrategy,
    #[serde(default = "FusionConfig::default_rrf_k")]
    pub rrf_k: u32,
    #[serde(default = "FusionConfig::default_weight")]
    pub semantic_weight: f32,
    #[serde(default = "FusionConfig::default_weight")]
    pub lexical_weight: f32,
    /// The top `list_leaders` hits of each path always survive the final-k
    /// cut, even when chunks found by both paths outscore them. 0 disables.
    #[serde(default = "FusionConfig::default_list_leaders")]
    pub list_leaders: usize,
}

impl FusionConfig {
    fn default_rrf_k() -> u32 {
        60
    }

    fn default_weight() -> f32 {
        0.5
    }

    fn default_list_leaders() -> usize {
        1
    }

    pub fn reciprocal_rank(k: u32) -> Self {
        Self {
            strategy: FusionStrategy::ReciprocalRank,
            rrf_k: k,
            ..Self::default()
        }
    }

    pub fn weighted_sum(semantic_weight: f32, lexical_weight: f32) -> Self {
        Self {
            strategy: FusionStrategy::WeightedSum,
            semantic_weight,
            lexical_weight,
            ..Self::default()
        }
    }
}

impl Default for FusionConfig {
    fn default() -> Self {
        Self {
            strategy: FusionStrategy::default(),
            rrf_k: Self::default_rrf_k(),
            semantic_weight: Self::default_weight(),
            lexical_weight: Self::default_weight(),
            list_leaders: Self::default_list_leaders(),
        }
    }
}

/// Strategist tolerance for one risk profile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RiskThresholds {
    /// Unsupported claims tolerated before the answer is rewritten.
    pub max_unsupported_claims: usize,
    /// Refuse outright (instead of rewriting) when the gatekeeper failed.
    pub refuse_on_gatekeeper_failure: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationSettings {
    #[serde(default = "ValidationSettings::default_true")]
    pub allow_regeneration: bool,
    /// Fraction of a claim's content terms that must appear, in order, in one
    /// chunk sentence for the claim to count as grounded. Figures and
    /// negations are always required.
    #[serde(default = "ValidationSettings::default_min_claim_coverage")]
    pub min_claim_coverage: f32,
    #[serde(default = "ValidationSettings::default_strict")]
    pub strict: RiskThresholds,
    #[serde(default = "ValidationSettings::default_balanced")]
    pub balanced: RiskThresholds,
    #[serde(default = "ValidationSettings::default_permissive")]
    pub permissive: RiskThresholds,
}

impl ValidationSettings {
    fn default_true() -> bool {
        true
    }

    fn default_min_claim_coverage() -> f32 {
        1.0
    }

    fn default_strict() -> RiskThresholds {
        RiskThresholds {
            max_unsupported_claims: 0,
            refuse_on_gatekeeper_failure: true,
        }
    }

    fn default_balanced() -> RiskThresholds {
        RiskThresholds {
            max_unsupported_claims: 1,
            refuse_on_gatekeeper_failure: false,
        }
    }

    fn default_permissive() -> RiskThresholds {
        RiskThresholds {
            max_unsupported_claims: 3,
            refuse_on_gatekeeper_failure: false,
        }
    }

    pub fn thresholds(&self, profile: RiskProfile) -> RiskThresholds {
        match profile {
            RiskProfile::Strict => self.strict,
            RiskProfile::Balanced => self.balanced,
            RiskProfile::Permissive => self.permissive,
        }
    }
}

impl Default for ValidationSettings {
    fn default() -> Self {
        Self {
            allow_regeneration: true,
            min_claim_coverage: Self::default_min_claim_coverage(),
            strict: Self::default_strict(),
            balanced: Self::default_balanced(),
            permissive: Self::default_permissive(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrySettings {
    #[serde(default = "RetrySettings::default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "RetrySettings::default_base_delay_ms")]
    pub base_delay_ms: u64,
    #[serde(default = "RetrySettings::default_max_delay_ms")]
    pub max_delay_ms: u64,
}

impl RetrySettings {
    fn default_max_attempts() -> u32 {
        3
    }

    fn default_base_delay_ms() -> u64 {
        250
    }

    fn default_max_delay_ms() -> u64 {
        4_000
    }
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_attempts: Self::default_max_attempts(),
            base_delay_ms: Self::default_base_delay_ms(),
            max_delay_ms: Self::default_max_delay_ms(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationSettings {
    /// Provider calls allowed in flight across all requests.
    #[serde(default = "GenerationSettings::default_concurrency_limit")]
    pub concurrency_limit: usize,
    #[serde(default = "GenerationSettings::default_call_timeout_ms")]
    pub call_timeout_ms: u64,
    /// Overall budget for one request, queueing included.
    #[serde(default = "GenerationSettings::default_request_deadline_ms")]
    pub request_deadline_ms: u64,
    #[serde(default)]
    pub retry: RetrySettings,
    #[serde(default = "GenerationSettings::default_temperature")]
    pub temperature: f32,
    #[serde(default = "GenerationSettings::default_max_tokens")]
    pub max_tokens: usize,
}

impl GenerationSettings {
    fn default_concurrency_limit() -> usize {
        8
    }

    fn default_call_timeout_ms() -> u64 {
        30_000
    }

    fn default_request_deadline_ms() -> u64 {
        120_000
    }

    fn default_temperature() -> f32 {
        0.0
    }

    fn default_max_tokens() -> usize {
        1024
    }

    pub fn call_timeout(&self) -> Duration {
        Duration::from_millis(self.call_timeout_ms)
    }

    pub fn request_deadline(&self) -> Duration {
        Duration::from_millis(self.request_deadline_ms)
    }
}

impl Default for GenerationSettings {
    fn default() -> Self {
        Self {
            concurrency_limit: Self::default_concurrency_limit(),
            call_timeout_ms: Self::default_call_timeout_ms(),
            request_deadline_ms: Self::default_request_deadline_ms(),
            retry: RetrySettings::default(),
            temperature: Self::default_temperature(),
            max_tokens: Self::default_max_tokens(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmbeddingBackend {
    /// `/embeddings` on the configured OpenAI-compatible endpoint.
    OpenaiCompatible,
    /// Local feature-hashing embedder; no network.
    Hashing,
}

impl Default for EmbeddingBackend {
    fn default() -> Self {
        Self::OpenaiCompatible
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderSettings {
    #[serde(default = "ProviderSettings::default_base_url")]
    pub base_url: String,
    #[serde(default = "ProviderSettings::default_chat_model")]
    pub chat_model: String,
    #[serde(default = "ProviderSettings::default_embedding_model")]
    pub embedding_model: String,
    #[serde(default)]
    pub embedding_backend: EmbeddingBackend,
    #[serde(default = "ProviderSettings::default_embedding_dimension")]
    pub embedding_dimension: usize,
    // Never serialized back out; config/env only.
    #[serde(default, skip_serializing)]
    pub api_key: Option<SecretString>,
}

impl ProviderSettings {
    fn default_base_url() -> String {
        "http://localhost:11434/v1".to_string()
    }

    fn default_chat_model() -> String {
        "gpt-4o-mini".to_string()
    }

    fn default_embedding_model() -> String {
        "text-embedding-3-small".to_string()
    }

    fn default_embedding_dimension() -> usize {
        1536
    }
}

impl Default for ProviderSettings {
    fn default() -> Self {
        Self {
            base_url: Self::default_base_url(),
            chat_model: Self::default_chat_model(),
            embedding_model: Self::default_embedding_model(),
            embedding_backend: EmbeddingBackend::default(),
            embedding_dimension: Self::default_embedding_dimension(),
            api_key: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct CorpusSettings {
    /// JSONL snapshot produced by the ingestion side.
    #[serde(default)]
    pub path: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "LoggingConfig::default_level")]
    pub level: String,
}

impl LoggingConfig {
    fn default_level() -> String {
        "info".to_string()
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: Self::default_level(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default = "Settings::default_env")]
    pub env: String,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub retrieval: RetrievalSettings,
    #[serde(default)]
    pub fusion: FusionConfig,
    #[serde(default)]
    pub validation: ValidationSettings,
    #[serde(default)]
    pub generation: GenerationSettings,
    #[serde(default)]
    pub provider: ProviderSettings,
    #[serde(default)]
    pub corpus: CorpusSettings,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            env: Self::default_env(),
            server: ServerConfig::default(),
            retrieval: RetrievalSettings::default(),
            fusion: FusionConfig::default(),
            validation: ValidationSettings::default(),
            generation: GenerationSettings::default(),
            provider: ProviderSettings::default(),
            corpus: CorpusSettings::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Settings {
    fn default_env() -> String {
        std::env::var("ASKGATE_ENV").unwrap_or_else(|_| "development".into())
    }

    /// Layered load:
    /// 1. `default.{toml,yaml,json}`
    /// 2. `{env}.toml`
    /// 3. `local.toml`
    /// 4. Environment variables (`ASKGATE__*`)
    pub fn load_from_sources(config_dir: &Path, env_name: &str) -> Result<Settings> {
        let _ = dotenv::dotenv();
        let builder = cfg::Config::builder()
            .add_source(cfg::File::from(config_dir.join("default.toml")).required(false))
            .add_source(cfg::File::from(config_dir.join("default.yaml")).required(false))
            .add_source(cfg::File::from(config_dir.join("default.json")).required(false))
            .add_source(
                cfg::File::from(config_dir.join(format!("{}.toml", env_name))).required(false),
            )
            .add_source(cfg::File::from(config_dir.join("local.toml")).required(false))
            .add_source(cfg::Environment::with_prefix("ASKGATE").separator("__"));

        let mut settings: Settings = builder
            .build()
            .context("building configuration")?
            .try_deserialize()
            .context("deserializing configuration")?;
        settings.env = env_name.to_string();
        settings.validate().context("validating configuration")?;
        info!(
            config_dir = %config_dir.display(),
            env = env_name,
            "configuration loaded"
        );
        Ok(settings)
    }

    pub fn validate(&self) -> std::result::Result<(), AskError> {
        let r = &self.retrieval;
        if r.semantic_top_k == 0 || r.keyword_top_k == 0 {
            return Err(AskError::config(
                "semantic_top_k and keyword_top_k must be greater than 0",
            ));
        }
        if r.rerank_final_k == 0 {
            return Err(AskError::config("rerank_final_k must be greater than 0"));
        }
        if r.semantic_timeout_ms == 0 || r.lexical_timeout_ms == 0 || r.embedding_timeout_ms == 0 {
            return Err(AskError::config("retrieval timeouts must be greater than 0"));
        }

        let f = &self.fusion;
        match f.strategy {
            FusionStrategy::ReciprocalRank if f.rrf_k == 0 => {
                return Err(AskError::config("fusion rrf_k must be greater than 0"));
            }
            FusionStrategy::WeightedSum => {
                let valid = |w: f32| w.is_finite() && w >= 0.0;
                if !valid(f.semantic_weight) || !valid(f.lexical_weight) {
                    return Err(AskError::config(
                        "fusion weights must be finite and non-negative",
                    ));
                }
                if f.semantic_weight == 0.0 && f.lexical_weight == 0.0 {
                    return Err(AskError::config("fusion weights must not both be zero"));
                }
            }
            _ => {}
        }

        let v = &self.validation;
        if !(v.min_claim_coverage > 0.0 && v.min_claim_coverage <= 1.0) {
            return Err(AskError::config("min_claim_coverage must be in (0, 1]"));
        }
        if v.strict.max_unsupported_claims != 0 {
            return Err(AskError::config(
                "strict profile must tolerate zero unsupported claims",
            ));
        }
        if v.strict.max_unsupported_claims > v.balanced.max_unsupported_claims
            || v.balanced.max_unsupported_claims > v.permissive.max_unsupported_claims
        {
            return Err(AskError::config(
                "unsupported-claim thresholds must satisfy strict <= balanced <= permissive",
            ));
        }

        let g = &self.generation;
        if g.concurrency_limit == 0 {
            return Err(AskError::config("concurrency_limit must be greater than 0"));
        }
        if g.call_timeout_ms == 0 || g.request_deadline_ms == 0 {
            return Err(AskError::config("generation timeouts must be greater than 0"));
        }
        if g.retry.max_attempts == 0 {
            return Err(AskError::config("retry max_attempts must be at least 1"));
        }
        if self.provider.embedding_dimension == 0 {
            return Err(AskError::config("embedding_dimension must be greater than 0"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_validate() {
        Settings::default().validate().unwrap();
    }

    #[test]
    fn strict_profile_cannot_tolerate_unsupported_claims() {
        let mut settings = Settings::default();
        settings.validation.strict.max_unsupported_claims = 1;
        let err = settings.validate().unwrap_err();
        assert!(err.to_string().contains("strict"));
    }

    #[test]
    fn thresholds_must_be_monotone() {
        let mut settings = Settings::default();
        settings.validation.balanced.max_unsupported_claims = 5;
        settings.validation.permissive.max_unsupported_claims = 2;
        assert!(settings.validate().is_err());
    }

    #[test]
    fn weighted_sum_rejects_degenerate_weights() {
        let mut settings = Settings::default();
        settings.fusion = FusionConfig::weighted_sum(0.0, 0.0);
        assert!(settings.validate().is_err());
        settings.fusion = FusionConfig::weighted_sum(f32::NAN, 1.0);
        assert!(settings.validate().is_err());
        settings.fusion = FusionConfig::weighted_sum(0.7, 0.3);
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn zero_final_k_is_rejected() {
        let mut settings = Settings::default();
        settings.retrieval.rerank_final_k = 0;
        assert!(settings.validate().is_err());
    }
}
