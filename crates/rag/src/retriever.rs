//! Context retrieval
//!
//! Direct mode runs one similarity search against the case's collection.
//! Fusion mode expands the query into sub-queries, searches each, and
//! merges the lists with reciprocal rank fusion.

use std::sync::Arc;

use rag_eval_core::{CaseId, PassageStore, Result, ScoredPassage};

use crate::fusion::reciprocal_rank_fusion;
use crate::query_expansion::SubQueryGenerator;

/// Retriever configuration
#[derive(Debug, Clone)]
pub struct RetrieverConfig {
    /// RRF constant
    pub rrf_k: f32,
}

impl Default for RetrieverConfig {
    fn default() -> Self {
        Self {
            rrf_k: rag_eval_config::constants::retrieval::RRF_K,
        }
    }
}

impl From<&rag_eval_config::RetrievalConfig> for RetrieverConfig {
    fn from(settings: &rag_eval_config::RetrievalConfig) -> Self {
        Self {
            rrf_k: settings.rrf_k,
        }
    }
}

/// Retrieves passages for a case's question
pub struct ContextRetriever {
    store: Arc<dyn PassageStore>,
    sub_queries: Option<SubQueryGenerator>,
    config: RetrieverConfig,
}

impl ContextRetriever {
    /// Direct-mode retriever
    pub fn new(store: Arc<dyn PassageStore>, config: RetrieverConfig) -> Self {
        Self {
            store,
            sub_queries: None,
            config,
        }
    }

    /// Enable fusion mode
    pub fn with_sub_queries(mut self, generator: SubQueryGenerator) -> Self {
        self.sub_queries = Some(generator);
        self
    }

    /// Ordered passage texts for `query`, at most `top_k`
    ///
    /// Returns `[""]` when nothing was found. A missing collection is an
    /// error. Fusion requires a sub-query generator; without one the
    /// direct path is used.
    pub async fn retrieve(
        &self,
        case_id: CaseId,
        query: &str,
        top_k: usize,
        use_fusion: bool,
    ) -> Result<Vec<String>> {
        let passages = match (&self.sub_queries, use_fusion) {
            (Some(generator), true) => self.fused_search(generator, case_id, query, top_k).await?,
            _ => self.store.search(case_id, query, top_k).await?,
        };

        let mut texts: Vec<String> = passages.into_iter().take(top_k).map(|p| p.text).collect();
        if texts.is_empty() {
            texts.push(String::new());
        }
        Ok(texts)
    }

    async fn fused_search(
        &self,
        generator: &SubQueryGenerator,
        case_id: CaseId,
        query: &str,
        top_k: usize,
    ) -> Result<Vec<ScoredPassage>> {
        let queries = match generator.generate(query).await {
            Ok(queries) => queries,
            Err(e) => {
                tracing::warn!(case_id, error = %e, "Sub-query generation failed, using original query");
                metrics::counter!("rag_eval_degraded_total", "site" => "sub_queries").increment(1);
                vec![query.to_string()]
            }
        };

        let mut lists = Vec::with_capacity(queries.len());
        for sub_query in &queries {
            let hits = self.store.search(case_id, sub_query, top_k).await?;
            tracing::debug!(
                case_id,
                store = self.store.name(),
                sub_query = %sub_query,
                hits = hits.len(),
                "Sub-query searched"
            );
            lists.push(hits);
        }

        Ok(reciprocal_rank_fusion(&lists, self.config.rrf_k))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use rag_eval_llm::{GenerationResult, LlmBackend, LlmError, Message, ResponseFormat};
    use std::collections::HashMap;

    /// Returns a fixed list per query string
    struct FixedStore {
        collections: HashMap<CaseId, HashMap<String, Vec<ScoredPassage>>>,
    }

    #[async_trait]
    impl PassageStore for FixedStore {
        async fn search(
            &self,
            case_id: CaseId,
            query: &str,
            top_k: usize,
        ) -> Result<Vec<ScoredPassage>> {
            let collection = self.collections.get(&case_id).ok_or_else(|| {
                rag_eval_core::Error::CollectionMissing(format!("collection_{}", case_id))
            })?;
            Ok(collection
                .get(query)
                .map(|hits| hits.iter().take(top_k).cloned().collect())
                .unwrap_or_default())
        }

        fn name(&self) -> &str {
            "fixed"
        }
    }

    struct FixedLlm(Option<String>);

    #[async_trait]
    impl LlmBackend for FixedLlm {
        async fn generate_with_format(
            &self,
            _messages: &[Message],
            _format: ResponseFormat,
        ) -> std::result::Result<GenerationResult, LlmError> {
            match &self.0 {
                Some(text) => Ok(GenerationResult::from_text(text.clone())),
                None => Err(LlmError::Network("down".to_string())),
            }
        }

        fn model_name(&self) -> &str {
            "fixed"
        }
    }

    fn store() -> Arc<dyn PassageStore> {
        let hits = |items: &[(&str, f32)]| {
            items
                .iter()
                .map(|(t, s)| ScoredPassage::new(*t, *s))
                .collect::<Vec<_>>()
        };
        let queries = HashMap::from([
            ("q".to_string(), hits(&[("p1", 0.9), ("p2", 0.8), ("p3", 0.7)])),
            ("a".to_string(), hits(&[("p2", 0.9), ("p4", 0.5)])),
            ("b".to_string(), hits(&[("p2", 0.8), ("p1", 0.6)])),
        ]);
        Arc::new(FixedStore {
            collections: HashMap::from([(1, queries), (2, HashMap::new())]),
        })
    }

    #[tokio::test]
    async fn test_direct_mode() {
        let retriever = ContextRetriever::new(store(), RetrieverConfig::default());
        let contexts = retriever.retrieve(1, "q", 2, false).await.unwrap();
        assert_eq!(contexts, vec!["p1", "p2"]);
    }

    #[tokio::test]
    async fn test_empty_results_yield_single_empty_string() {
        let retriever = ContextRetriever::new(store(), RetrieverConfig::default());
        let contexts = retriever.retrieve(2, "q", 6, false).await.unwrap();
        assert_eq!(contexts, vec![String::new()]);
    }

    #[tokio::test]
    async fn test_missing_collection_is_error() {
        let retriever = ContextRetriever::new(store(), RetrieverConfig::default());
        let err = retriever.retrieve(99, "q", 6, false).await.unwrap_err();
        assert!(matches!(err, rag_eval_core::Error::CollectionMissing(_)));
    }

    #[tokio::test]
    async fn test_fusion_mode() {
        let llm = Arc::new(FixedLlm(Some("1. a\n2. b\n3. missing".to_string())));
        let retriever = ContextRetriever::new(store(), RetrieverConfig::default())
            .with_sub_queries(SubQueryGenerator::new(llm, 4));

        let contexts = retriever.retrieve(1, "q", 6, true).await.unwrap();
        // p2 ranks first in both lists, p4 and p1 tie and keep first-seen order
        assert_eq!(contexts, vec!["p2", "p4", "p1"]);
    }

    #[tokio::test]
    async fn test_fusion_falls_back_to_original_query() {
        let llm = Arc::new(FixedLlm(None));
        let retriever = ContextRetriever::new(store(), RetrieverConfig::default())
            .with_sub_queries(SubQueryGenerator::new(llm, 4));

        let contexts = retriever.retrieve(1, "q", 2, true).await.unwrap();
        assert_eq!(contexts, vec!["p1", "p2"]);
    }
}
