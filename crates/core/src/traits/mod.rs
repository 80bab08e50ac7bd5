//! Core traits for the evaluation pipeline
//!
//! Retrieval backends implement these traits so stages can be tested with
//! in-memory stores and run against a live vector database unchanged.
//!
//! ```text
//! Retrieval:
//!   - PassageStore: per-case similarity search over indexed passages
//!   - CollectionBuilder: build a case's collection from its source entry
//! ```

mod retriever;

pub use retriever::{CollectionBuilder, PassageStore, ScoredPassage};
