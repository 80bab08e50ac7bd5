//! Vector Store using Qdrant
//!
//! One collection per case, named `{collection_prefix}{case_id}`, with
//! cosine distance. The store embeds queries itself, so callers search with
//! plain text.
//!
//! A collection only exists once it holds a complete index: passages are
//! embedded before it is created, and a failed upsert drops it again.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use qdrant_client::{
    qdrant::{
        value::Kind, CreateCollectionBuilder, Distance, PointStruct, SearchPointsBuilder,
        UpsertPointsBuilder, VectorParamsBuilder,
    },
    Qdrant,
};

use rag_eval_config::VectorStoreConfig as VectorStoreSettings;
use rag_eval_core::{CaseId, CollectionBuilder, PassageStore, ScoredPassage, SourceEntry};

use crate::embeddings::Embedder;
use crate::indexer::{IndexedPassage, PassageIndexer};
use crate::RagError;

/// Payload key holding the passage text
const TEXT_KEY: &str = "text";

/// Points per upsert request
const UPSERT_BATCH: usize = 256;

/// Vector store configuration
#[derive(Debug, Clone)]
pub struct VectorStoreConfig {
    /// Qdrant endpoint
    pub endpoint: String,
    /// API key (optional)
    pub api_key: Option<String>,
    /// Collection name prefix
    pub collection_prefix: String,
}

impl Default for VectorStoreConfig {
    fn default() -> Self {
        Self::from(&VectorStoreSettings::default())
    }
}

impl From<&VectorStoreSettings> for VectorStoreConfig {
    fn from(settings: &VectorStoreSettings) -> Self {
        Self {
            endpoint: settings.endpoint.clone(),
            api_key: settings.api_key.clone(),
            collection_prefix: settings.collection_prefix.clone(),
        }
    }
}

/// Collection-level operations used while indexing a case
#[async_trait]
trait CollectionOps: Send + Sync {
    async fn collection_exists(&self, name: &str) -> Result<bool, RagError>;

    async fn create_collection(&self, name: &str, dim: usize) -> Result<(), RagError>;

    async fn upsert(
        &self,
        name: &str,
        passages: &[IndexedPassage],
        embeddings: Vec<Vec<f32>>,
    ) -> Result<(), RagError>;

    async fn delete_collection(&self, name: &str) -> Result<(), RagError>;
}

/// Build collection `name` from `entry` unless it already exists
///
/// Returns the number of passages indexed.
async fn index_collection(
    ops: &dyn CollectionOps,
    embedder: &dyn Embedder,
    indexer: &PassageIndexer,
    name: &str,
    entry: &SourceEntry,
) -> Result<usize, RagError> {
    if ops.collection_exists(name).await? {
        tracing::debug!(collection = %name, "Reusing existing collection");
        return Ok(0);
    }

    let passages = indexer.prepare(entry);
    if passages.is_empty() {
        ops.create_collection(name, embedder.dim()).await?;
        tracing::warn!(collection = %name, "No indexable text in search results");
        return Ok(0);
    }

    let texts: Vec<String> = passages.iter().map(|p| p.text.clone()).collect();
    let embeddings = embedder.embed_documents(&texts).await?;
    if embeddings.len() != passages.len() {
        return Err(RagError::Index(format!(
            "{} passages but {} embeddings",
            passages.len(),
            embeddings.len()
        )));
    }

    ops.create_collection(name, embedder.dim()).await?;
    if let Err(e) = ops.upsert(name, &passages, embeddings).await {
        if let Err(cleanup) = ops.delete_collection(name).await {
            tracing::warn!(collection = %name, error = %cleanup, "Failed to drop partial collection");
        }
        return Err(e);
    }

    tracing::info!(collection = %name, passages = passages.len(), "Indexed collection");
    Ok(passages.len())
}

/// Qdrant client wrapper implementing [`CollectionOps`]
struct QdrantCollections {
    client: Qdrant,
}

#[async_trait]
impl CollectionOps for QdrantCollections {
    async fn collection_exists(&self, name: &str) -> Result<bool, RagError> {
        self.client
            .collection_exists(name)
            .await
            .map_err(|e| RagError::VectorStore(e.to_string()))
    }

    async fn create_collection(&self, name: &str, dim: usize) -> Result<(), RagError> {
        self.client
            .create_collection(
                CreateCollectionBuilder::new(name)
                    .vectors_config(VectorParamsBuilder::new(dim as u64, Distance::Cosine)),
            )
            .await
            .map_err(|e| RagError::VectorStore(e.to_string()))?;
        Ok(())
    }

    async fn upsert(
        &self,
        name: &str,
        passages: &[IndexedPassage],
        embeddings: Vec<Vec<f32>>,
    ) -> Result<(), RagError> {
        let points: Vec<PointStruct> = passages
            .iter()
            .zip(embeddings)
            .map(|(passage, embedding)| {
                let mut payload: HashMap<String, qdrant_client::qdrant::Value> = HashMap::new();
                payload.insert(TEXT_KEY.to_string(), passage.text.clone().into());
                payload.insert("source_id".to_string(), passage.source_id.clone().into());
                for (k, v) in &passage.metadata {
                    payload.insert(k.clone(), v.clone().into());
                }

                PointStruct::new(passage.id.clone(), embedding, payload)
            })
            .collect();

        for batch in points.chunks(UPSERT_BATCH) {
            self.client
                .upsert_points(UpsertPointsBuilder::new(name, batch.to_vec()).wait(true))
                .await
                .map_err(|e| RagError::VectorStore(e.to_string()))?;
        }

        Ok(())
    }

    async fn delete_collection(&self, name: &str) -> Result<(), RagError> {
        self.client
            .delete_collection(name)
            .await
            .map_err(|e| RagError::VectorStore(e.to_string()))?;
        Ok(())
    }
}

/// Qdrant-backed passage store with one collection per case
pub struct QdrantCollectionStore {
    collections: QdrantCollections,
    config: VectorStoreConfig,
    embedder: Arc<dyn Embedder>,
    indexer: PassageIndexer,
}

impl QdrantCollectionStore {
    /// Create a new vector store connection
    pub fn new(
        config: VectorStoreConfig,
        embedder: Arc<dyn Embedder>,
        indexer: PassageIndexer,
    ) -> Result<Self, RagError> {
        let mut builder = Qdrant::from_url(&config.endpoint);

        if let Some(ref api_key) = config.api_key {
            builder = builder.api_key(api_key.clone());
            tracing::info!("Qdrant connection using API key authentication");
        }

        let client = builder
            .build()
            .map_err(|e| RagError::Connection(e.to_string()))?;

        Ok(Self {
            collections: QdrantCollections { client },
            config,
            embedder,
            indexer,
        })
    }

    /// Collection name for a case
    pub fn collection_name(&self, case_id: CaseId) -> String {
        collection_name(&self.config.collection_prefix, case_id)
    }

    async fn search_collection(
        &self,
        collection: &str,
        query: &str,
        top_k: usize,
    ) -> Result<Vec<ScoredPassage>, RagError> {
        let embedding = self.embedder.embed_query(query).await?;

        let results = self
            .collections
            .client
            .search_points(
                SearchPointsBuilder::new(collection, embedding, top_k as u64).with_payload(true),
            )
            .await
            .map_err(|e| RagError::Search(e.to_string()))?;

        Ok(results
            .result
            .into_iter()
            .filter_map(|point| {
                let text = point.payload.get(TEXT_KEY).and_then(|v| match &v.kind {
                    Some(Kind::StringValue(s)) => Some(s.clone()),
                    _ => None,
                })?;
                Some(ScoredPassage {
                    text,
                    score: point.score,
                })
            })
            .collect())
    }
}

/// `{prefix}{case_id}`
pub fn collection_name(prefix: &str, case_id: CaseId) -> String {
    format!("{}{}", prefix, case_id)
}

#[async_trait]
impl PassageStore for QdrantCollectionStore {
    async fn search(
        &self,
        case_id: CaseId,
        query: &str,
        top_k: usize,
    ) -> rag_eval_core::Result<Vec<ScoredPassage>> {
        let name = self.collection_name(case_id);
        if !self.collections.collection_exists(&name).await? {
            return Err(rag_eval_core::Error::CollectionMissing(name));
        }

        Ok(self.search_collection(&name, query, top_k).await?)
    }

    fn name(&self) -> &str {
        "qdrant"
    }
}

#[async_trait]
impl CollectionBuilder for QdrantCollectionStore {
    async fn ensure_collection(
        &self,
        case_id: CaseId,
        entry: &SourceEntry,
    ) -> rag_eval_core::Result<usize> {
        let name = self.collection_name(case_id);
        Ok(index_collection(
            &self.collections,
            self.embedder.as_ref(),
            &self.indexer,
            &name,
            entry,
        )
        .await?)
    }
}
