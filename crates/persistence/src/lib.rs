//! File persistence for the evaluation pipeline
//!
//! Provides:
//! - Append-only JSONL record streams (flushed per record)
//! - Strict and lenient record readers
//! - Source dataset reader with line-number sampling
//! - Results directory layout per pipeline variant

pub mod error;
pub mod jsonl;
pub mod layout;
pub mod source;

pub use error::PersistenceError;
pub use jsonl::{read_records, read_records_lenient, RecordWriter};
pub use layout::ResultsLayout;
pub use source::{read_sample_ids, SourceReader};
