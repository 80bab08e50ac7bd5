use rag_eval_core::{AnswerRecord, PipelineVariant, Result, VerifiedRecord};
use rag_eval_persistence::{read_records, RecordWriter, ResultsLayout};

use super::{record_case, StageReport};
use crate::verifier::DetailVerifier;

const STAGE: &str = "verify";

/// Verifies the answers of a non-verified variant
pub struct VerifyStage {
    verifier: DetailVerifier,
}

impl VerifyStage {
    pub fn new(verifier: DetailVerifier) -> Self {
        Self { verifier }
    }

    /// Reads `{variant}/test_cases.jsonl` and writes `{variant}+rig/test_cases.jsonl`
    pub async fn run(
        &self,
        layout: &ResultsLayout,
        pre_retrieval: bool,
        decomposition: bool,
    ) -> Result<StageReport> {
        let variant = PipelineVariant::new(pre_retrieval, decomposition, true);
        let records: Vec<AnswerRecord> =
            read_records(layout.test_cases_path(variant.without_verification()))?;

        layout.ensure_stage_dir(variant)?;
        let output = layout.test_cases_path(variant);
        let mut writer = RecordWriter::<VerifiedRecord>::create(&output)?;

        for record in &records {
            let verified = self.verifier.verify(record).await?;
            let details = verified.details_verification.as_ref().map_or(0, Vec::len);

            writer.write(&verified)?;
            record_case(STAGE, variant);
            tracing::info!(stage = STAGE, case_id = record.id, details, processed = writer.written(), "Verified answer");
        }

        tracing::info!(output = %output.display(), cases = writer.written(), "Verification completed");
        Ok(StageReport {
            stage: STAGE,
            variant,
            cases: writer.written(),
            output,
        })
    }
}
