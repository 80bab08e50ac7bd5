//! Stage runners
//!
//! Each stage reads the previous stage's record stream, processes cases
//! one at a time in input order and writes one record per case, flushed
//! immediately. The output file is truncated when the stage starts.

mod answers;
mod contexts;
mod judge;
mod score;
mod verify;

pub use answers::AnswersStage;
pub use contexts::ContextsStage;
pub use judge::JudgeStage;
pub use score::ScoreStage;
pub use verify::VerifyStage;

use std::path::PathBuf;

use rag_eval_core::PipelineVariant;

/// Outcome of a completed stage
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageReport {
    pub stage: &'static str,
    pub variant: PipelineVariant,
    /// Records written
    pub cases: usize,
    pub output: PathBuf,
}

pub(crate) fn record_case(stage: &'static str, variant: PipelineVariant) {
    metrics::counter!("rag_eval_cases_total", "stage" => stage, "variant" => variant.name())
        .increment(1);
}
