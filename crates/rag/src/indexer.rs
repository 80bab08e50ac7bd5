//! Collection indexing
//!
//! Turns a source entry's search result pages into passages ready for
//! upsert: HTML is stripped, text is chunked, and every chunk gets a
//! deterministic point id derived from `{page_url}_{interaction_id}_{chunk}`.

use std::collections::HashMap;

use uuid::Uuid;

use rag_eval_core::SourceEntry;

use crate::chunker::SentenceChunker;
use crate::html::strip_html;

/// A chunk ready to be embedded and stored
#[derive(Debug, Clone, PartialEq)]
pub struct IndexedPassage {
    /// Point id (UUID v5 of `source_id`)
    pub id: String,
    /// `{page_url}_{interaction_id}_{chunk_index}`
    pub source_id: String,
    pub text: String,
    /// page_name, page_url, page_last_modified, interaction_id
    pub metadata: HashMap<String, String>,
}

/// Prepares passages from source entries
pub struct PassageIndexer {
    chunker: SentenceChunker,
}

impl PassageIndexer {
    pub fn new(chunker: SentenceChunker) -> Self {
        Self { chunker }
    }

    /// Passages for every page of `entry`, in page then chunk order
    pub fn prepare(&self, entry: &SourceEntry) -> Vec<IndexedPassage> {
        let mut passages = Vec::new();

        for page in &entry.search_results {
            let text = strip_html(&page.page_result);
            if text.is_empty() {
                continue;
            }

            for chunk in self.chunker.chunk(&text) {
                let source_id = format!(
                    "{}_{}_{}",
                    page.page_url, entry.interaction_id, chunk.index
                );

                let metadata = HashMap::from([
                    ("page_name".to_string(), page.page_name.clone()),
                    ("page_url".to_string(), page.page_url.clone()),
                    (
                        "page_last_modified".to_string(),
                        page.page_last_modified.clone(),
                    ),
                    ("interaction_id".to_string(), entry.interaction_id.clone()),
                ]);

                passages.push(IndexedPassage {
                    id: point_id(&source_id),
                    source_id,
                    text: chunk.text,
                    metadata,
                });
            }
        }

        passages
    }
}

impl Default for PassageIndexer {
    fn default() -> Self {
        Self::new(SentenceChunker::default())
    }
}

/// Deterministic UUID for a source id (Qdrant ids must be UUIDs or integers)
pub fn point_id(source_id: &str) -> String {
    Uuid::new_v5(&Uuid::NAMESPACE_URL, source_id.as_bytes()).to_string()
}
