//! Configuration management for the evaluation pipeline
//!
//! Supports loading configuration from:
//! - YAML/TOML files (`config/default`, `config/{env}`, an explicit path)
//! - Environment variables (`RAG_EVAL__` prefix, `__` separator)

pub mod constants;
pub mod settings;

pub use settings::{
    load_settings, EmbeddingConfig, JudgeConfig, LlmConfig, LlmProviderKind, ObservabilityConfig,
    PathsConfig, RetrievalConfig, Settings, VectorStoreConfig, VerificationConfig,
};

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Configuration file not found: {0}")]
    FileNotFound(String),

    #[error("Failed to parse configuration: {0}")]
    ParseError(String),

    #[error("Missing required field: {0}")]
    MissingField(String),

    #[error("Invalid value for {field}: {message}")]
    InvalidValue { field: String, message: String },
}

impl From<config::ConfigError> for ConfigError {
    fn from(err: config::ConfigError) -> Self {
        ConfigError::ParseError(err.to_string())
    }
}

impl From<ConfigError> for rag_eval_core::Error {
    fn from(err: ConfigError) -> Self {
        rag_eval_core::Error::Config(err.to_string())
    }
}
