use std::path::Path;
use std::time::Duration;

use serde::Deserialize;
use serde::Serialize;

use crate::errors::CohortMatchError;
use crate::models::CategoryLimits;
use crate::router::ExperimentConfig;
use crate::scoring::ScoringWeights;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default = "default_log_dir")]
    pub log_dir: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_dir() -> String {
    "logs".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            log_dir: default_log_dir(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CorpusConfig {
    #[serde(default = "default_corpus_path")]
    pub path: String,
}

fn default_corpus_path() -> String {
    "data/corpus.json".to_string()
}

impl Default for CorpusConfig {
    fn default() -> Self {
        Self {
            path: default_corpus_path(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingsConfig {
    /// Semantic retrieval runs only when enabled
    #[serde(default)]
    pub enabled: bool,
    /// "openai" or "ollama"
    #[serde(default = "default_embedding_provider")]
    pub provider: String,
    #[serde(default = "default_embedding_endpoint")]
    pub endpoint: String,
    #[serde(default = "default_embedding_model")]
    pub model: String,
    #[serde(default = "default_embedding_dimension")]
    pub dimension: usize,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default = "default_embedding_cache_path")]
    pub cache_path: String,
    #[serde(default = "default_embedding_timeout")]
    pub timeout_secs: u64,
}

fn default_embedding_provider() -> String {
    "ollama".to_string()
}

fn default_embedding_endpoint() -> String {
    "http://localhost:11434".to_string()
}

fn default_embedding_model() -> String {
    "nomic-embed-text".to_string()
}

const fn default_embedding_dimension() -> usize {
    768
}

fn default_embedding_cache_path() -> String {
    "data/embedding_cache.json".to_string()
}

const fn default_embedding_timeout() -> u64 {
    30
}

impl Default for EmbeddingsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            provider: default_embedding_provider(),
            endpoint: default_embedding_endpoint(),
            model: default_embedding_model(),
            dimension: default_embedding_dimension(),
            api_key: None,
            cache_path: default_embedding_cache_path(),
            timeout_secs: default_embedding_timeout(),
        }
    }
}

/// One text-generation provider in the fallback chain
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmProviderConfig {
    pub name: String,
    /// "openai" (any chat-completions compatible endpoint) or "ollama"
    pub kind: String,
    pub endpoint: String,
    pub model: String,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default = "default_llm_timeout")]
    pub timeout_secs: u64,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: usize,
}

const fn default_llm_timeout() -> u64 {
    20
}

const fn default_temperature() -> f32 {
    0.3
}

const fn default_max_tokens() -> usize {
    800
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    /// Tried in order; empty disables generative selection
    #[serde(default)]
    pub providers: Vec<LlmProviderConfig>,
    /// Shared budget across the whole provider chain
    #[serde(default = "default_llm_budget")]
    pub budget_secs: u64,
}

const fn default_llm_budget() -> u64 {
    30
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            providers: Vec::new(),
            budget_secs: default_llm_budget(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalConfig {
    #[serde(default = "default_member_top_k")]
    pub current_member_top_k: usize,
    #[serde(default = "default_alumni_top_k")]
    pub alumni_top_k: usize,
    #[serde(default = "default_staff_top_k")]
    pub staff_top_k: usize,
    #[serde(default = "default_min_similarity")]
    pub min_similarity: f32,
}

const fn default_member_top_k() -> usize {
    6
}

const fn default_alumni_top_k() -> usize {
    4
}

const fn default_staff_top_k() -> usize {
    6
}

const fn default_min_similarity() -> f32 {
    0.25
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            current_member_top_k: default_member_top_k(),
            alumni_top_k: default_alumni_top_k(),
            staff_top_k: default_staff_top_k(),
            min_similarity: default_min_similarity(),
        }
    }
}

impl RetrievalConfig {
    pub fn limits(&self) -> CategoryLimits {
        CategoryLimits {
            current_members: self.current_member_top_k,
            alumni: self.alumni_top_k,
            staff: self.staff_top_k,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheBackend {
    Memory,
    Redis,
    None,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheSettings {
    #[serde(default = "default_cache_backend")]
    pub backend: CacheBackend,
    #[serde(default = "default_cache_ttl")]
    pub ttl_secs: u64,
    #[serde(default = "default_read_timeout")]
    pub read_timeout_ms: u64,
    #[serde(default = "default_max_entries")]
    pub max_entries: usize,
    #[serde(default)]
    pub redis_url: Option<String>,
    #[serde(default = "default_namespace")]
    pub namespace: String,
}

const fn default_cache_backend() -> CacheBackend {
    CacheBackend::Memory
}

const fn default_cache_ttl() -> u64 {
    6 * 3600
}

const fn default_read_timeout() -> u64 {
    150
}

const fn default_max_entries() -> usize {
    10_000
}

fn default_namespace() -> String {
    "cohort-match:".to_string()
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            backend: default_cache_backend(),
            ttl_secs: default_cache_ttl(),
            read_timeout_ms: default_read_timeout(),
            max_entries: default_max_entries(),
            redis_url: None,
            namespace: default_namespace(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Ceiling for the optional stages of one request
    #[serde(default = "default_request_ceiling")]
    pub request_ceiling_ms: u64,
}

const fn default_request_ceiling() -> u64 {
    12_000
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            request_ceiling_ms: default_request_ceiling(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VocabularySource {
    /// TOML file replacing the built-in tables
    #[serde(default)]
    pub path: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub corpus: CorpusConfig,
    #[serde(default)]
    pub embeddings: EmbeddingsConfig,
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub cache: CacheSettings,
    #[serde(default)]
    pub experiment: ExperimentConfig,
    #[serde(default)]
    pub pipeline: PipelineConfig,
    #[serde(default)]
    pub scoring: ScoringWeights,
    #[serde(default)]
    pub vocabulary: VocabularySource,
}

impl AppConfig {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> crate::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Parse and validate configuration text
    pub fn from_toml_str(content: &str) -> crate::Result<Self> {
        let config: AppConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from default config file path
    pub fn load() -> crate::Result<Self> {
        // Try to load from config.toml first, then fall back to config.example.toml
        if Path::new("config.toml").exists() {
            Self::from_file("config.toml")
        } else if Path::new("config.example.toml").exists() {
            tracing::warn!(
                "Using config.example.toml. Please create config.toml for production use."
            );
            Self::from_file("config.example.toml")
        } else {
            Err(CohortMatchError::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                "No config file found. Please create config.toml or config.example.toml",
            )))
        }
    }

    /// Check cross-field constraints serde cannot express
    pub fn validate(&self) -> crate::Result<()> {
        if self.embeddings.enabled {
            validate_endpoint("embeddings.endpoint", &self.embeddings.endpoint)?;
            if self.embeddings.dimension == 0 {
                return Err(CohortMatchError::ConfigError(
                    "embeddings.dimension must be positive".to_string(),
                ));
            }
            if !matches!(self.embeddings.provider.as_str(), "openai" | "ollama") {
                return Err(CohortMatchError::ConfigError(format!(
                    "unknown embeddings.provider '{}'",
                    self.embeddings.provider
                )));
            }
        }

        for provider in &self.llm.providers {
            validate_endpoint(&format!("llm.providers[{}]", provider.name), &provider.endpoint)?;
            if !matches!(provider.kind.as_str(), "openai" | "ollama") {
                return Err(CohortMatchError::ConfigError(format!(
                    "unknown kind '{}' for llm provider {}",
                    provider.kind, provider.name
                )));
            }
        }

        if !(0.0..=1.0).contains(&self.retrieval.min_similarity) {
            return Err(CohortMatchError::ConfigError(
                "retrieval.min_similarity must be within [0, 1]".to_string(),
            ));
        }

        if self.cache.backend == CacheBackend::Redis {
            let url = self.cache.redis_url.as_deref().ok_or_else(|| {
                CohortMatchError::ConfigError("cache.redis_url required for redis backend".into())
            })?;
            validate_endpoint("cache.redis_url", url)?;
        }

        self.experiment.validate()?;

        if !self.scoring.preserves_precedence() {
            return Err(CohortMatchError::ConfigError(
                "[scoring] weights must rank media above interests above values above persona, \
                 and composite_min must not exceed composite_max"
                    .to_string(),
            ));
        }

        Ok(())
    }

    pub fn request_ceiling(&self) -> Duration {
        Duration::from_millis(self.pipeline.request_ceiling_ms)
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache.ttl_secs)
    }

    pub fn cache_read_timeout(&self) -> Duration {
        Duration::from_millis(self.cache.read_timeout_ms)
    }

    pub fn llm_budget(&self) -> Duration {
        Duration::from_secs(self.llm.budget_secs)
    }
}

fn validate_endpoint(field: &str, value: &str) -> crate::Result<()> {
    url::Url::parse(value)
        .map(|_| ())
        .map_err(|e| CohortMatchError::ConfigError(format!("{field}: invalid URL '{value}': {e}")))
}

/// Mask credentials embedded in a URL for display
pub fn mask_url(value: &str) -> String {
    match url::Url::parse(value) {
        Ok(mut parsed) => {
            if parsed.password().is_some() {
                let _ = parsed.set_password(Some("***"));
            }
            parsed.to_string()
        }
        Err(_) => "***invalid***".to_string(),
    }
}

/// Mask an API key, keeping a short prefix for recognition
pub fn mask_secret(secret: Option<&str>) -> String {
    match secret {
        Some(s) if s.chars().count() > 4 => format!("{}***", s.chars().take(4).collect::<String>()),
        Some(_) => "***".to_string(),
        None => "(none)".to_string(),
    }
}
