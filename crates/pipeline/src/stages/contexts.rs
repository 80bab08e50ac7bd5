use std::sync::Arc;

use rag_eval_core::{Case, CollectionBuilder, PipelineVariant, Result};
use rag_eval_persistence::{RecordWriter, ResultsLayout, SourceReader};
use rag_eval_rag::ContextRetriever;

use super::{record_case, StageReport};

const STAGE: &str = "contexts";

/// Builds collections and retrieves contexts for every sampled source entry
pub struct ContextsStage {
    builder: Arc<dyn CollectionBuilder>,
    retriever: ContextRetriever,
    top_k: usize,
}

impl ContextsStage {
    pub fn new(builder: Arc<dyn CollectionBuilder>, retriever: ContextRetriever, top_k: usize) -> Self {
        Self {
            builder,
            retriever,
            top_k,
        }
    }

    pub async fn run(
        &self,
        source: SourceReader,
        layout: &ResultsLayout,
        pre_retrieval: bool,
    ) -> Result<StageReport> {
        let variant = PipelineVariant::new(pre_retrieval, false, false);
        let output = layout.contexts_path(variant);
        let mut writer = RecordWriter::<Case>::create(&output)?;

        for entry in source {
            let (case_id, entry) = entry?;

            let indexed = self.builder.ensure_collection(case_id, &entry).await?;
            if indexed > 0 {
                tracing::debug!(case_id, passages = indexed, "Collection built");
            }

            let contexts = self
                .retriever
                .retrieve(case_id, &entry.query, self.top_k, pre_retrieval)
                .await?;

            writer.write(&Case {
                id: case_id,
                query: entry.query,
                ground_truth: entry.answer,
                contexts,
            })?;
            record_case(STAGE, variant);
            tracing::info!(stage = STAGE, case_id, pre_retrieval, processed = writer.written(), "Generated contexts");
        }

        tracing::info!(output = %output.display(), cases = writer.written(), "Contexts generation completed");
        Ok(StageReport {
            stage: STAGE,
            variant,
            cases: writer.written(),
            output,
        })
    }
}
