//! Main settings module

use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::constants::{endpoints, judge, models, paths, retrieval, timeouts, verification};
use crate::ConfigError;

/// Main application settings
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Settings {
    /// Text generation service
    #[serde(default)]
    pub llm: LlmConfig,

    /// Embedding service used for indexing and search
    #[serde(default)]
    pub embedding: EmbeddingConfig,

    /// Qdrant connection
    #[serde(default)]
    pub vector_store: VectorStoreConfig,

    #[serde(default)]
    pub retrieval: RetrievalConfig,

    #[serde(default)]
    pub verification: VerificationConfig,

    #[serde(default)]
    pub judge: JudgeConfig,

    #[serde(default)]
    pub paths: PathsConfig,

    #[serde(default)]
    pub observability: ObservabilityConfig,
}

impl Settings {
    /// Create default settings
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate settings
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.validate_llm()?;
        self.validate_retrieval()?;
        self.validate_verification()?;
        self.validate_judge()?;
        Ok(())
    }

    fn validate_llm(&self) -> Result<(), ConfigError> {
        if !(0.0..=2.0).contains(&self.llm.temperature) {
            return Err(ConfigError::InvalidValue {
                field: "llm.temperature".to_string(),
                message: format!("Must be between 0.0 and 2.0, got {}", self.llm.temperature),
            });
        }

        if self.llm.model.trim().is_empty() {
            return Err(ConfigError::MissingField("llm.model".to_string()));
        }

        Ok(())
    }

    fn validate_retrieval(&self) -> Result<(), ConfigError> {
        let r = &self.retrieval;

        if r.top_k == 0 {
            return Err(ConfigError::InvalidValue {
                field: "retrieval.top_k".to_string(),
                message: "Must be at least 1".to_string(),
            });
        }

        if r.num_sub_queries == 0 {
            return Err(ConfigError::InvalidValue {
                field: "retrieval.num_sub_queries".to_string(),
                message: "Must be at least 1".to_string(),
            });
        }

        if r.rrf_k <= 0.0 {
            return Err(ConfigError::InvalidValue {
                field: "retrieval.rrf_k".to_string(),
                message: format!("Must be positive, got {}", r.rrf_k),
            });
        }

        if r.chunk_size == 0 {
            return Err(ConfigError::InvalidValue {
                field: "retrieval.chunk_size".to_string(),
                message: "Must be at least 1".to_string(),
            });
        }

        if !(0.0..1.0).contains(&r.chunk_overlap) {
            return Err(ConfigError::InvalidValue {
                field: "retrieval.chunk_overlap".to_string(),
                message: format!("Must be in [0.0, 1.0), got {}", r.chunk_overlap),
            });
        }

        Ok(())
    }

    fn validate_verification(&self) -> Result<(), ConfigError> {
        if self.verification.top_k == 0 {
            return Err(ConfigError::InvalidValue {
                field: "verification.top_k".to_string(),
                message: "Must be at least 1".to_string(),
            });
        }

        if self.verification.extraction_attempts == 0 {
            return Err(ConfigError::InvalidValue {
                field: "verification.extraction_attempts".to_string(),
                message: "Must be at least 1".to_string(),
            });
        }

        Ok(())
    }

    fn validate_judge(&self) -> Result<(), ConfigError> {
        if self.judge.attempts == 0 {
            return Err(ConfigError::InvalidValue {
                field: "judge.attempts".to_string(),
                message: "Must be at least 1".to_string(),
            });
        }

        Ok(())
    }
}

/// Which chat API the LLM endpoint speaks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LlmProviderKind {
    /// OpenAI-compatible `/chat/completions` (OpenAI, vLLM, LM Studio)
    #[default]
    OpenAI,
    /// Native Ollama `/api/chat`
    Ollama,
}

/// Text generation settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    #[serde(default)]
    pub provider: LlmProviderKind,

    /// Base URL; the provider default is used when unset
    #[serde(default)]
    pub endpoint: Option<String>,

    /// API key, falls back to `OPENAI_API_KEY`
    #[serde(default = "default_api_key")]
    pub api_key: Option<String>,

    #[serde(default = "default_model")]
    pub model: String,

    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Completion length cap; unset leaves the provider default
    #[serde(default)]
    pub max_tokens: Option<u32>,

    #[serde(default = "default_llm_timeout")]
    pub timeout_secs: u64,

    /// Transport-level retries inside the backend (network and timeout only)
    #[serde(default)]
    pub max_retries: u32,
}

fn default_api_key() -> Option<String> {
    std::env::var("OPENAI_API_KEY").ok()
}

fn default_model() -> String {
    models::CHAT_DEFAULT.to_string()
}

fn default_temperature() -> f32 {
    models::TEMPERATURE
}

fn default_llm_timeout() -> u64 {
    timeouts::LLM_REQUEST_SECS
}

impl LlmConfig {
    /// Endpoint to use, resolving the provider default
    pub fn resolved_endpoint(&self) -> String {
        match (&self.endpoint, self.provider) {
            (Some(endpoint), _) => endpoint.clone(),
            (None, LlmProviderKind::OpenAI) => endpoints::OPENAI_DEFAULT.to_string(),
            (None, LlmProviderKind::Ollama) => endpoints::OLLAMA_DEFAULT.to_string(),
        }
    }
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: LlmProviderKind::default(),
            endpoint: None,
            api_key: default_api_key(),
            model: default_model(),
            temperature: default_temperature(),
            max_tokens: None,
            timeout_secs: default_llm_timeout(),
            max_retries: 0,
        }
    }
}

/// Embedding service settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    #[serde(default = "default_embedding_endpoint")]
    pub endpoint: String,

    #[serde(default = "default_embedding_model")]
    pub model: String,

    #[serde(default = "default_embedding_dim")]
    pub dimension: usize,

    #[serde(default = "default_embedding_timeout")]
    pub timeout_secs: u64,
}

fn default_embedding_endpoint() -> String {
    endpoints::OLLAMA_DEFAULT.to_string()
}

fn default_embedding_model() -> String {
    models::EMBEDDING_DEFAULT.to_string()
}

fn default_embedding_dim() -> usize {
    models::EMBEDDING_DIM
}

fn default_embedding_timeout() -> u64 {
    timeouts::EMBEDDING_REQUEST_SECS
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            endpoint: default_embedding_endpoint(),
            model: default_embedding_model(),
            dimension: default_embedding_dim(),
            timeout_secs: default_embedding_timeout(),
        }
    }
}

/// Qdrant connection settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VectorStoreConfig {
    #[serde(default = "default_qdrant_endpoint")]
    pub endpoint: String,

    /// Optional, for cloud deployments
    #[serde(default)]
    pub api_key: Option<String>,

    #[serde(default = "default_collection_prefix")]
    pub collection_prefix: String,
}

fn default_qdrant_endpoint() -> String {
    endpoints::QDRANT_DEFAULT.to_string()
}

fn default_collection_prefix() -> String {
    retrieval::COLLECTION_PREFIX.to_string()
}

impl Default for VectorStoreConfig {
    fn default() -> Self {
        Self {
            endpoint: default_qdrant_endpoint(),
            api_key: None,
            collection_prefix: default_collection_prefix(),
        }
    }
}

/// Retrieval and indexing settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalConfig {
    #[serde(default = "default_top_k")]
    pub top_k: usize,

    #[serde(default = "default_num_sub_queries")]
    pub num_sub_queries: usize,

    #[serde(default = "default_rrf_k")]
    pub rrf_k: f32,

    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,

    /// Fraction of `chunk_size`
    #[serde(default = "default_chunk_overlap")]
    pub chunk_overlap: f32,
}

fn default_top_k() -> usize {
    retrieval::TOP_K
}

fn default_num_sub_queries() -> usize {
    retrieval::NUM_SUB_QUERIES
}

fn default_rrf_k() -> f32 {
    retrieval::RRF_K
}

fn default_chunk_size() -> usize {
    retrieval::CHUNK_SIZE
}

fn default_chunk_overlap() -> f32 {
    retrieval::CHUNK_OVERLAP
}

impl RetrievalConfig {
    /// Overlap in tokens
    pub fn overlap_tokens(&self) -> usize {
        (self.chunk_size as f32 * self.chunk_overlap) as usize
    }
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: default_top_k(),
            num_sub_queries: default_num_sub_queries(),
            rrf_k: default_rrf_k(),
            chunk_size: default_chunk_size(),
            chunk_overlap: default_chunk_overlap(),
        }
    }
}

/// Detail verification settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerificationConfig {
    #[serde(default = "default_verification_top_k")]
    pub top_k: usize,

    #[serde(default = "default_extraction_attempts")]
    pub extraction_attempts: u32,

    #[serde(default = "default_verification_backoff")]
    pub backoff_ms: u64,
}

fn default_verification_top_k() -> usize {
    verification::TOP_K
}

fn default_extraction_attempts() -> u32 {
    verification::EXTRACTION_ATTEMPTS
}

fn default_verification_backoff() -> u64 {
    verification::BACKOFF_MS
}

impl Default for VerificationConfig {
    fn default() -> Self {
        Self {
            top_k: default_verification_top_k(),
            extraction_attempts: default_extraction_attempts(),
            backoff_ms: default_verification_backoff(),
        }
    }
}

/// Judge settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JudgeConfig {
    /// Judge model, defaults to `llm.model`
    #[serde(default)]
    pub model: Option<String>,

    #[serde(default = "default_judge_attempts")]
    pub attempts: u32,

    #[serde(default = "default_judge_backoff")]
    pub backoff_ms: u64,
}

fn default_judge_attempts() -> u32 {
    judge::ATTEMPTS
}

fn default_judge_backoff() -> u64 {
    judge::BACKOFF_MS
}

impl Default for JudgeConfig {
    fn default() -> Self {
        Self {
            model: None,
            attempts: default_judge_attempts(),
            backoff_ms: default_judge_backoff(),
        }
    }
}

/// Input and output locations
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathsConfig {
    #[serde(default = "default_results_dir")]
    pub results_dir: PathBuf,

    /// Source dataset (JSONL)
    #[serde(default = "default_source_path")]
    pub source_path: PathBuf,

    /// File of sampled line numbers; every line is used when unset
    #[serde(default = "default_sample_ids_path")]
    pub sample_ids_path: Option<PathBuf>,

    #[serde(default = "default_sample_limit")]
    pub sample_limit: usize,
}

fn default_results_dir() -> PathBuf {
    PathBuf::from(paths::RESULTS_DIR)
}

fn default_source_path() -> PathBuf {
    PathBuf::from(paths::SOURCE_PATH)
}

fn default_sample_ids_path() -> Option<PathBuf> {
    Some(PathBuf::from(paths::SAMPLE_IDS_PATH))
}

fn default_sample_limit() -> usize {
    paths::SAMPLE_LIMIT
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            results_dir: default_results_dir(),
            source_path: default_source_path(),
            sample_ids_path: default_sample_ids_path(),
            sample_limit: default_sample_limit(),
        }
    }
}

/// Observability configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservabilityConfig {
    /// Log level
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Enable JSON logging
    #[serde(default)]
    pub log_json: bool,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            log_json: false,
        }
    }
}

/// Load settings from files and environment
///
/// Sources, lowest precedence first: `config/default`, `config/{env}`,
/// `config_path`, then `RAG_EVAL__*` environment variables.
pub fn load_settings(config_path: Option<&Path>, env: Option<&str>) -> Result<Settings, ConfigError> {
    let mut builder = Config::builder();

    // Load default config
    builder = builder.add_source(File::with_name("config/default").required(false));

    // Load environment-specific config
    if let Some(env_name) = env {
        builder =
            builder.add_source(File::with_name(&format!("config/{}", env_name)).required(false));
    }

    // Explicit file must exist
    if let Some(path) = config_path {
        if !path.exists() {
            return Err(ConfigError::FileNotFound(path.display().to_string()));
        }
        builder = builder.add_source(File::from(path).required(true));
    }

    // Load from environment variables
    builder = builder.add_source(
        Environment::with_prefix("RAG_EVAL")
            .separator("__")
            .try_parsing(true),
    );

    let config = builder.build()?;
    let settings: Settings = config.try_deserialize()?;

    settings.validate()?;

    Ok(settings)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_settings() {
        let settings = Settings::default();
        assert_eq!(settings.retrieval.top_k, 6);
        assert_eq!(settings.retrieval.num_sub_queries, 4);
        assert_eq!(settings.verification.extraction_attempts, 5);
        assert_eq!(settings.judge.attempts, 3);
        assert_eq!(settings.paths.sample_limit, 300);
        assert_eq!(settings.llm.temperature, 0.0);
        assert_eq!(settings.llm.max_tokens, None);
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn test_overlap_tokens() {
        let retrieval = RetrievalConfig::default();
        assert_eq!(retrieval.overlap_tokens(), 614);
    }

    #[test]
    fn test_retrieval_validation() {
        let mut settings = Settings::default();

        settings.retrieval.chunk_overlap = 1.0;
        assert!(settings.validate().is_err());

        settings.retrieval.chunk_overlap = 0.2;
        settings.retrieval.rrf_k = 0.0;
        assert!(settings.validate().is_err());

        settings.retrieval.rrf_k = 60.0;
        settings.retrieval.top_k = 0;
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_attempts_validation() {
        let mut settings = Settings::default();
        settings.judge.attempts = 0;
        assert!(matches!(
            settings.validate(),
            Err(ConfigError::InvalidValue { ref field, .. }) if field == "judge.attempts"
        ));
    }

    #[test]
    fn test_temperature_validation() {
        let mut settings = Settings::default();
        settings.llm.temperature = 2.5;
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_resolved_endpoint() {
        let mut llm = LlmConfig {
            provider: LlmProviderKind::Ollama,
            ..LlmConfig::default()
        };
        assert_eq!(llm.resolved_endpoint(), endpoints::OLLAMA_DEFAULT);

        llm.endpoint = Some("http://vllm:8000/v1".to_string());
        assert_eq!(llm.resolved_endpoint(), "http://vllm:8000/v1");
    }

    #[test]
    fn test_load_from_yaml_file() {
        let mut file = tempfile::Builder::new().suffix(".yaml").tempfile().unwrap();
        writeln!(
            file,
            "llm:\n  provider: ollama\n  model: qwen2.5:7b\n  max_tokens: 2048\nretrieval:\n  top_k: 3\njudge:\n  model: gpt-4o"
        )
        .unwrap();

        let settings = load_settings(Some(file.path()), None).unwrap();
        assert_eq!(settings.llm.provider, LlmProviderKind::Ollama);
        assert_eq!(settings.llm.model, "qwen2.5:7b");
        assert_eq!(settings.llm.max_tokens, Some(2048));
        assert_eq!(settings.retrieval.top_k, 3);
        assert_eq!(settings.retrieval.num_sub_queries, 4);
        assert_eq!(settings.judge.model.as_deref(), Some("gpt-4o"));
    }

    #[test]
    fn test_missing_config_file() {
        let result = load_settings(Some(Path::new("/nonexistent/rag-eval.yaml")), None);
        assert!(matches!(result, Err(ConfigError::FileNotFound(_))));
    }
}
