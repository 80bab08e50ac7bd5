//! Retrieval for the evaluation pipeline
//!
//! Features:
//! - Per-case Qdrant collections built from search result pages
//! - HTML stripping and sentence-aligned chunking
//! - Ollama embeddings
//! - Sub-query generation with reciprocal rank fusion
//! - `ContextRetriever` over the core `PassageStore` trait

pub mod chunker;
pub mod embeddings;
pub mod fusion;
pub mod html;
pub mod indexer;
pub mod ollama_embeddings;
pub mod query_expansion;
pub mod retriever;
pub mod vector_store;

pub use chunker::{Chunk, ChunkConfig, SentenceChunker};
pub use embeddings::Embedder;
pub use fusion::reciprocal_rank_fusion;
pub use html::strip_html;
pub use indexer::{IndexedPassage, PassageIndexer};
pub use ollama_embeddings::{OllamaEmbedder, OllamaEmbeddingConfig};
pub use query_expansion::SubQueryGenerator;
pub use retriever::{ContextRetriever, RetrieverConfig};
pub use vector_store::{QdrantCollectionStore, VectorStoreConfig};

use thiserror::Error;

/// RAG errors
#[derive(Error, Debug)]
pub enum RagError {
    #[error("Embedding error: {0}")]
    Embedding(String),

    #[error("Vector store error: {0}")]
    VectorStore(String),

    #[error("Search error: {0}")]
    Search(String),

    #[error("Index error: {0}")]
    Index(String),

    #[error("Query generation error: {0}")]
    QueryGeneration(String),

    #[error("Connection error: {0}")]
    Connection(String),
}

impl From<RagError> for rag_eval_core::Error {
    fn from(err: RagError) -> Self {
        rag_eval_core::Error::Rag(err.to_string())
    }
}
