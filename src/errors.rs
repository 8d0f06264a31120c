use thiserror::Error;

#[derive(Error, Debug)]
pub enum CohortMatchError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("TOML parsing error: {0}")]
    TomlParsing(#[from] toml::de::Error),

    #[error("Invalid configuration: {0}")]
    ConfigError(String),

    #[error("HTTP error: {0}")]
    HttpError(String),

    #[error("Embedding error: {0}")]
    EmbeddingError(String),

    #[error("LLM error: {0}")]
    LlmError(String),

    /// The generative stage returned text that does not satisfy the selection contract
    #[error("Invalid selection output: {0}")]
    InvalidSelection(String),

    #[error("Cache error: {0}")]
    CacheError(String),

    /// Corpus or embedding index cannot be loaded at all; aborts startup
    #[error("Corpus unavailable: {0}")]
    CorpusFatal(String),

    #[error("Timed out after {0}ms")]
    Timeout(u64),

    #[error("{0}")]
    Custom(String),
}

impl CohortMatchError {
    /// Whether this error must abort startup rather than degrade the pipeline
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::CorpusFatal(_))
    }
}

impl From<reqwest::Error> for CohortMatchError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::HttpError(format!("request timed out: {err}"))
        } else {
            Self::HttpError(err.to_string())
        }
    }
}

impl From<redis::RedisError> for CohortMatchError {
    fn from(err: redis::RedisError) -> Self {
        Self::CacheError(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, CohortMatchError>;
