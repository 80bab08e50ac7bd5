//! Evaluation pipeline
//!
//! Answer generation (direct or self-ask), retrieval-augmented detail
//! verification, LLM-as-judge evaluation and accuracy scoring, plus the
//! stage runners that connect them through JSONL files.

pub mod decomposition;
pub mod generator;
pub mod judge;
pub mod retry;
pub mod scorer;
pub mod stages;
pub mod verifier;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use decomposition::extract_final_answer;
pub use generator::{render_contexts, AnswerGenerator};
pub use judge::{Judge, JudgeVerdict};
pub use retry::RetryPolicy;
pub use scorer::{score, score_file, ScoreReport};
pub use stages::{AnswersStage, ContextsStage, JudgeStage, ScoreStage, StageReport, VerifyStage};
pub use verifier::{DetailVerifier, ExtractedDetails, VerifierConfig};
