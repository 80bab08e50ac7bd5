//! Retrieval traits

use crate::{CaseId, Result, SourceEntry};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// A passage returned by similarity search
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredPassage {
    pub text: String,
    /// Similarity score, higher is better
    pub score: f32,
}

impl ScoredPassage {
    pub fn new(text: impl Into<String>, score: f32) -> Self {
        Self {
            text: text.into(),
            score,
        }
    }
}

/// Per-case passage index
///
/// Each case owns one collection built from the web pages attached to its
/// source entry. Searches never cross collections.
///
/// # Example
///
/// ```ignore
/// let store: Arc<dyn PassageStore> = Arc::new(QdrantCollectionStore::new(config, embedder, indexer)?);
/// let passages = store.search(42, "who directed the film?", 6).await?;
/// ```
#[async_trait]
pub trait PassageStore: Send + Sync + 'static {
    /// Top `top_k` passages for `query`, best first
    ///
    /// Returns [`crate::Error::CollectionMissing`] when the case has no
    /// collection.
    async fn search(&self, case_id: CaseId, query: &str, top_k: usize)
        -> Result<Vec<ScoredPassage>>;

    /// Backend name for logging
    fn name(&self) -> &str;
}

/// Builds a case's collection from its source entry
#[async_trait]
pub trait CollectionBuilder: Send + Sync + 'static {
    /// Create the collection if it does not exist yet
    ///
    /// Returns the number of passages indexed, zero when the collection
    /// already existed.
    async fn ensure_collection(&self, case_id: CaseId, entry: &SourceEntry) -> Result<usize>;
}
