//! Record types persisted between pipeline stages
//!
//! Every stage reads the previous stage's JSONL stream and writes its own.
//! Field names match the on-disk format exactly.

use serde::{Deserialize, Deserializer, Serialize};

/// Case identifier: the 0-based line number of the entry in the source dataset
pub type CaseId = u64;

/// One evaluation unit with its retrieved passages
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Case {
    pub id: CaseId,
    pub query: String,
    pub ground_truth: String,
    pub contexts: Vec<String>,
}

/// Output of the answer generator
///
/// `answer` is `None` when the model returned no content.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnswerRecord {
    pub id: CaseId,
    pub query: String,
    pub ground_truth: String,
    pub answer: Option<String>,
}

/// A claim extracted from an answer together with its verification query
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DetailQuery {
    pub detail: String,
    pub generated_query: String,
}

/// A fully verified claim
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Detail {
    pub detail: String,
    pub generated_query: String,
    pub answer_to_generated_query: String,
    pub new_detail: String,
}

/// Output of the detail verifier
///
/// `details_verification` is `None` when no verifiable claims were found,
/// in which case `new_answer` repeats `answer`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerifiedRecord {
    pub id: CaseId,
    pub query: String,
    pub ground_truth: String,
    pub answer: Option<String>,
    pub details_verification: Option<Vec<Detail>>,
    pub new_answer: Option<String>,
}

/// Judge verdict for one case
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct JudgeResult {
    pub id: CaseId,
    pub accuracy: bool,
}

/// Judge input view over either an [`AnswerRecord`] or a [`VerifiedRecord`]
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PredictionRecord {
    pub id: CaseId,
    pub query: String,
    pub ground_truth: String,
    #[serde(default)]
    pub answer: Option<String>,
    /// Outer `Some` means the field was present, even if its value is null
    #[serde(default, deserialize_with = "present")]
    pub new_answer: Option<Option<String>>,
}

impl PredictionRecord {
    /// The answer to judge: `new_answer` whenever the record carries one
    pub fn prediction(&self) -> Option<&str> {
        match &self.new_answer {
            Some(revised) => revised.as_deref(),
            None => self.answer.as_deref(),
        }
    }
}

fn present<'de, D>(deserializer: D) -> Result<Option<Option<String>>, D::Error>
where
    D: Deserializer<'de>,
{
    Option::<String>::deserialize(deserializer).map(Some)
}

/// One line of the source question-answering dataset
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SourceEntry {
    #[serde(default, deserialize_with = "lenient_string")]
    pub interaction_id: String,
    pub query: String,
    /// Ground truth answer
    #[serde(default, deserialize_with = "lenient_string")]
    pub answer: String,
    #[serde(default)]
    pub search_results: Vec<SearchResultPage>,
}

/// A web page attached to a source entry
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SearchResultPage {
    /// Raw HTML
    #[serde(default, deserialize_with = "lenient_string")]
    pub page_result: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub page_name: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub page_url: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub page_last_modified: String,
}

/// Accept strings, numbers, booleans and null where the dataset expects text
fn lenient_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match serde_json::Value::deserialize(deserializer)? {
        serde_json::Value::Null => String::new(),
        serde_json::Value::String(s) => s,
        other => other.to_string(),
    })
}
