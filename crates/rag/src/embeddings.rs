//! Text Embeddings
//!
//! Dense embeddings for semantic search. Implementations call an external
//! service; see [`crate::ollama_embeddings::OllamaEmbedder`].

use async_trait::async_trait;

use crate::RagError;

/// Async text embedder
#[async_trait]
pub trait Embedder: Send + Sync + 'static {
    /// Embed documents in order
    async fn embed_documents(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, RagError>;

    /// Embed a search query
    async fn embed_query(&self, query: &str) -> Result<Vec<f32>, RagError> {
        self.embed_documents(&[query.to_string()])
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| RagError::Embedding("No embedding returned".to_string()))
    }

    /// Embedding dimension
    fn dim(&self) -> usize;
}
