use rag_eval_core::{AnswerRecord, Case, PipelineVariant, Result};
use rag_eval_persistence::{read_records, RecordWriter, ResultsLayout};

use super::{record_case, StageReport};
use crate::generator::AnswerGenerator;

const STAGE: &str = "answers";

/// Generates an answer for every case in a contexts file
pub struct AnswersStage {
    generator: AnswerGenerator,
}

impl AnswersStage {
    pub fn new(generator: AnswerGenerator) -> Self {
        Self { generator }
    }

    pub async fn run(
        &self,
        layout: &ResultsLayout,
        pre_retrieval: bool,
        decomposition: bool,
    ) -> Result<StageReport> {
        let variant = PipelineVariant::new(pre_retrieval, decomposition, false);
        let cases: Vec<Case> = read_records(layout.contexts_path(variant))?;

        layout.ensure_stage_dir(variant)?;
        let output = layout.test_cases_path(variant);
        let mut writer = RecordWriter::<AnswerRecord>::create(&output)?;

        for case in cases {
            let answer = self
                .generator
                .generate(&case.contexts, &case.query, decomposition)
                .await?;
            if answer.is_none() {
                tracing::warn!(case_id = case.id, "Model returned no content");
            }

            writer.write(&AnswerRecord {
                id: case.id,
                query: case.query,
                ground_truth: case.ground_truth,
                answer,
            })?;
            record_case(STAGE, variant);
            tracing::info!(stage = STAGE, case_id = case.id, variant = %variant, processed = writer.written(), "Generated answer");
        }

        tracing::info!(output = %output.display(), cases = writer.written(), "Answers generation completed");
        Ok(StageReport {
            stage: STAGE,
            variant,
            cases: writer.written(),
            output,
        })
    }
}
