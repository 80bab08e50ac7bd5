//! LLM Integration
//!
//! Features:
//! - Multiple backend support (OpenAI-compatible, Ollama)
//! - JSON-object response mode
//! - Transport-level retries with exponential backoff

pub mod backend;
pub mod factory;
pub mod prompt;

pub use backend::{
    FinishReason, GenerationResult, LlmBackend, LlmConfig, OllamaBackend, OpenAIBackend,
    OpenAIConfig, ResponseFormat,
};
pub use factory::{LlmFactory, LlmProvider, LlmProviderConfig};
pub use prompt::{Message, PromptBuilder, Role};

use thiserror::Error;

/// LLM errors
#[derive(Error, Debug)]
pub enum LlmError {
    #[error("API error: {0}")]
    Api(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Timeout")]
    Timeout,

    #[error("Model not found: {0}")]
    ModelNotFound(String),

    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl From<reqwest::Error> for LlmError {
    fn from(err: reqwest::Error) -> Self {
        LlmError::Network(err.to_string())
    }
}

impl From<LlmError> for rag_eval_core::Error {
    fn from(err: LlmError) -> Self {
        rag_eval_core::Error::Llm(err.to_string())
    }
}
