//! Error types shared across the workspace

use thiserror::Error;

/// Pipeline-wide error
///
/// Crate-local errors (`LlmError`, `RagError`, `PersistenceError`,
/// `ConfigError`) convert into this type at crate boundaries.
#[derive(Error, Debug)]
pub enum Error {
    #[error("LLM error: {0}")]
    Llm(String),

    #[error("RAG error: {0}")]
    Rag(String),

    #[error("Persistence error: {0}")]
    Persistence(String),

    #[error("Configuration error: {0}")]
    Config(String),

    /// Stage selector outside the eight known combinations
    #[error("Invalid stage selected: {0:?}. Expected 1-8 or one of none, pre-retrieval, cot, rig, pre-retrieval+cot, cot+rig, pre-retrieval+rig, pre-retrieval+cot+rig")]
    InvalidStage(String),

    /// Retrieval collection for a case has not been built
    #[error("Collection not found: {0}")]
    CollectionMissing(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
