//! Core traits and types for the RAG evaluation pipeline
//!
//! This crate provides foundational types used across all other crates:
//! - Persisted record types (cases, answers, verified answers, verdicts)
//! - Pipeline variants and the eight-way stage selector
//! - Traits for pluggable retrieval backends
//! - Error types

pub mod error;
pub mod records;
pub mod traits;
pub mod variant;

pub use error::{Error, Result};
pub use records::{
    AnswerRecord, Case, CaseId, Detail, DetailQuery, JudgeResult, PredictionRecord,
    SearchResultPage, SourceEntry, VerifiedRecord,
};
pub use traits::{CollectionBuilder, PassageStore, ScoredPassage};
pub use variant::PipelineVariant;
