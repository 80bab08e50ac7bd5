use rag_eval_core::{JudgeResult, PipelineVariant, PredictionRecord, Result};
use rag_eval_persistence::{read_records, RecordWriter, ResultsLayout};

use super::{record_case, StageReport};
use crate::judge::Judge;

const STAGE: &str = "judge";

/// Judges every record of a variant's test cases
pub struct JudgeStage {
    judge: Judge,
}

impl JudgeStage {
    pub fn new(judge: Judge) -> Self {
        Self { judge }
    }

    pub async fn run(&self, layout: &ResultsLayout, variant: PipelineVariant) -> Result<StageReport> {
        let records: Vec<PredictionRecord> = read_records(layout.test_cases_path(variant))?;

        let output = layout.judge_results_path(variant);
        let mut writer = RecordWriter::<JudgeResult>::create(&output)?;

        for record in &records {
            let accuracy = self
                .judge
                .judge(&record.query, &record.ground_truth, record.prediction())
                .await;

            writer.write(&JudgeResult {
                id: record.id,
                accuracy,
            })?;
            record_case(STAGE, variant);
            tracing::info!(stage = STAGE, case_id = record.id, accuracy, "Test case evaluated");
        }

        tracing::info!(output = %output.display(), cases = writer.written(), "Judge evaluation completed");
        Ok(StageReport {
            stage: STAGE,
            variant,
            cases: writer.written(),
            output,
        })
    }
}
