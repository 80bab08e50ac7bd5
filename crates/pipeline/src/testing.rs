//! Test doubles for pipeline components
//!
//! Available to this crate's tests and, with the `testing` feature, to
//! integration tests and downstream crates.

use std::collections::{HashMap, VecDeque};

use async_trait::async_trait;
use parking_lot::Mutex;

use rag_eval_core::{
    CaseId, CollectionBuilder, Error, PassageStore, Result, ScoredPassage, SourceEntry,
};
use rag_eval_llm::{GenerationResult, LlmBackend, LlmError, Message, ResponseFormat};
use rag_eval_rag::PassageIndexer;

type Handler = Box<dyn Fn(&[Message]) -> std::result::Result<Option<String>, LlmError> + Send + Sync>;

/// Language model answering from a script
///
/// Every request is recorded with its response format.
pub struct ScriptedLlm {
    handler: Handler,
    calls: Mutex<Vec<(Vec<Message>, ResponseFormat)>>,
}

impl ScriptedLlm {
    /// Answer with `handler`
    pub fn with_handler<F>(handler: F) -> Self
    where
        F: Fn(&[Message]) -> std::result::Result<Option<String>, LlmError> + Send + Sync + 'static,
    {
        Self {
            handler: Box::new(handler),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Answer with `responses` in order; `None` is a null completion
    ///
    /// Requests past the end fail with a network error.
    pub fn sequence<S: Into<String>>(responses: Vec<Option<S>>) -> Self {
        let queue: Mutex<VecDeque<Option<String>>> =
            Mutex::new(responses.into_iter().map(|r| r.map(Into::into)).collect());

        Self::with_handler(move |_| {
            queue
                .lock()
                .pop_front()
                .ok_or_else(|| LlmError::Network("script exhausted".to_string()))
        })
    }

    /// Every request fails
    pub fn failing() -> Self {
        Self::with_handler(|_| Err(LlmError::Network("unreachable".to_string())))
    }

    /// Messages of every request so far
    pub fn calls(&self) -> Vec<Vec<Message>> {
        self.calls.lock().iter().map(|(m, _)| m.clone()).collect()
    }

    /// Response formats of every request so far
    pub fn formats(&self) -> Vec<ResponseFormat> {
        self.calls.lock().iter().map(|(_, f)| *f).collect()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().len()
    }
}

#[async_trait]
impl LlmBackend for ScriptedLlm {
    async fn generate_with_format(
        &self,
        messages: &[Message],
        format: ResponseFormat,
    ) -> std::result::Result<GenerationResult, LlmError> {
        self.calls.lock().push((messages.to_vec(), format));

        Ok(match (self.handler)(messages)? {
            Some(text) => GenerationResult::from_text(text),
            None => GenerationResult {
                text: None,
                ..GenerationResult::from_text("")
            },
        })
    }

    fn model_name(&self) -> &str {
        "scripted"
    }
}

/// Passage store ranking by shared words with the query
#[derive(Default)]
pub struct InMemoryStore {
    collections: Mutex<HashMap<CaseId, Vec<String>>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a collection with the given passages
    pub fn with_collection<S: Into<String>>(self, case_id: CaseId, passages: Vec<S>) -> Self {
        self.collections
            .lock()
            .insert(case_id, passages.into_iter().map(Into::into).collect());
        self
    }

    pub fn passages(&self, case_id: CaseId) -> Option<Vec<String>> {
        self.collections.lock().get(&case_id).cloned()
    }
}

fn overlap(query: &str, passage: &str) -> f32 {
    let words: Vec<String> = query
        .split_whitespace()
        .map(|w| w.trim_matches(|c: char| !c.is_alphanumeric()).to_lowercase())
        .filter(|w| !w.is_empty())
        .collect();
    if words.is_empty() {
        return 0.0;
    }

    let passage = passage.to_lowercase();
    let hits = words.iter().filter(|w| passage.contains(w.as_str())).count();
    hits as f32 / words.len() as f32
}

#[async_trait]
impl PassageStore for InMemoryStore {
    async fn search(&self, case_id: CaseId, query: &str, top_k: usize) -> Result<Vec<ScoredPassage>> {
        let collections = self.collections.lock();
        let passages = collections
            .get(&case_id)
            .ok_or_else(|| Error::CollectionMissing(format!("collection_{}", case_id)))?;

        let mut scored: Vec<ScoredPassage> = passages
            .iter()
            .map(|p| ScoredPassage::new(p.clone(), overlap(query, p)))
            .filter(|p| p.score > 0.0)
            .collect();
        scored.sort_by(|a, b| b.score.total_cmp(&a.score));
        scored.truncate(top_k);
        Ok(scored)
    }

    fn name(&self) -> &str {
        "in-memory"
    }
}

#[async_trait]
impl CollectionBuilder for InMemoryStore {
    async fn ensure_collection(&self, case_id: CaseId, entry: &SourceEntry) -> Result<usize> {
        if self.collections.lock().contains_key(&case_id) {
            return Ok(0);
        }

        let passages: Vec<String> = PassageIndexer::default()
            .prepare(entry)
            .into_iter()
            .map(|p| p.text)
            .collect();
        let count = passages.len();
        self.collections.lock().insert(case_id, passages);
        Ok(count)
    }
}
