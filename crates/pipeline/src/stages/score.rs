use rag_eval_core::{PipelineVariant, Result};
use rag_eval_persistence::ResultsLayout;

use crate::scorer::{score_file, ScoreReport};

/// Average judge accuracy of a variant
pub struct ScoreStage;

impl ScoreStage {
    pub fn run(layout: &ResultsLayout, variant: PipelineVariant) -> Result<ScoreReport> {
        let path = layout.judge_results_path(variant);
        let report = score_file(&path)?;

        if report.skipped > 0 {
            tracing::warn!(skipped = report.skipped, "Malformed judge results ignored");
        }
        tracing::info!(
            variant = %variant,
            score = report.score,
            accurate = report.accurate,
            total = report.total,
            "Average score of LLM as judge"
        );
        Ok(report)
    }
}
