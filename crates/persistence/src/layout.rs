//! Results directory layout

use std::fs;
use std::path::{Path, PathBuf};

use rag_eval_core::PipelineVariant;

use crate::PersistenceError;

const TEST_CASES: &str = "test_cases.jsonl";
const JUDGE_RESULTS: &str = "judge_results.jsonl";

/// Paths under the results root
///
/// ```text
/// results/
///   contexts_with_pre-retrieval.jsonl
///   contexts_without_pre-retrieval.jsonl
///   {variant}/test_cases.jsonl
///   {variant}/judge_results.jsonl
/// ```
#[derive(Debug, Clone)]
pub struct ResultsLayout {
    root: PathBuf,
}

impl ResultsLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Retrieved contexts shared by every variant with the same retrieval mode
    pub fn contexts_path(&self, variant: PipelineVariant) -> PathBuf {
        self.root.join(variant.contexts_file_name())
    }

    pub fn stage_dir(&self, variant: PipelineVariant) -> PathBuf {
        self.root.join(variant.name())
    }

    pub fn test_cases_path(&self, variant: PipelineVariant) -> PathBuf {
        self.stage_dir(variant).join(TEST_CASES)
    }

    pub fn judge_results_path(&self, variant: PipelineVariant) -> PathBuf {
        self.stage_dir(variant).join(JUDGE_RESULTS)
    }

    /// Create the root and the variant's stage directory
    pub fn ensure_stage_dir(&self, variant: PipelineVariant) -> Result<PathBuf, PersistenceError> {
        let dir = self.stage_dir(variant);
        fs::create_dir_all(&dir).map_err(|e| PersistenceError::io(&dir, e))?;
        Ok(dir)
    }
}
