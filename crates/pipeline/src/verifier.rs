//! Retrieval-augmented detail verification
//!
//! Per case:
//! 1. Extract factual claims from the answer, each with a query that
//!    checks it. No claims means the case is skipped.
//! 2. For each claim, retrieve passages for its query, answer the query
//!    from them and reconcile the claim against that answer.
//! 3. Rewrite the original answer using the reconciled claims.

use std::sync::Arc;

use serde_json::Value;

use rag_eval_core::{AnswerRecord, CaseId, Detail, DetailQuery, Result, VerifiedRecord};
use rag_eval_llm::{LlmBackend, PromptBuilder};
use rag_eval_rag::ContextRetriever;

use crate::generator::AnswerGenerator;
use crate::retry::RetryPolicy;

const EXTRACTION_PROMPT: &str = r#"Given this answer, extract key factual statements and generate specific queries to verify each statement.
If the answer indicates that information is not available or cannot be found in the context, return an empty list [].
Each detail must be a complete statement with a subject and predicate, not just isolated facts like names, dates, or numbers.

Answer: {answer}
Output format: JSON list of dictionaries with 'detail' and 'generated_query' keys. Return an empty list [] if:
1. No complete statements can be extracted, OR
2. The answer indicates information is not available/found in the context (e.g., "The information is not available", "I cannot find this information", "The context doesn't provide this information", etc.)

Example:
Answer: "Yes, the use of renewables has been increasing significantly in the world. Renewable energy sources now provide over 12% of global energy consumption, up from 6% in 2000."
[
    {
        "detail": "Renewable energy sources now provide over 12% of global energy consumption",
        "generated_query": "What percentage of global energy comes from renewables?"
    },
    {
        "detail": "Renewable energy sources provide 6% of global energy consumption in 2000",
        "generated_query": "What percentage of global energy came from renewables in 2000?"
    }
]

Examples that should return an empty list []:
- "The information is not available in the provided context"
- "The provided context does not contain information about ..."
- "The context information does not provide details on ..."
- "1585" (just a number)
- "$35.78" (just a price)
- "March 15, 1985" (just a date)
- "2000-09-15" (just a date)
- "renewable energy" (just a concept)
- "the dark knight" (just a movie title)
- "John Smith, Mary Johnson, and David Chen" (just names)"#;

const RECONCILE_PROMPT: &str = "Original detail: {detail}
Verification query: {query}
Verification answer: {answer}

Based on the verification answer, please provide a corrected version of the original detail.
If the original detail is accurate, return it unchanged. If it needs correction, provide the corrected version while maintaining a similar structure.

Corrected detail: ";

const SYNTHESIS_PROMPT: &str = r#"Original answer: {answer}

I have verified each detail in the original answer. For each detail, I have:
1. Extracted the detail from the original answer ("detail" key)
2. Generated a specific query about that detail ("generated_query" key)
3. Found a new answer to that query using reliable sources ("answer_to_generated_query" key)
4. The "new_detail" key contains the corrected version of the detail based on verification

Here are all the verified details:
{details}

Please generate a new answer that:
1. Maintains the same style and tone as the original answer
2. Incorporates the verified information from "answer_to_generated_query"
3. Uses the "new_detail" when there are conflicts with the original detail
4. Remains factual and accurate based on the verification results

New answer: "#;

/// Parsed claim-extraction response
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExtractedDetails {
    Details(Vec<DetailQuery>),
    /// Not a usable claim list; the reason feeds the retry log
    Malformed(String),
}

impl ExtractedDetails {
    /// Parse a completion
    ///
    /// Accepts a bare JSON list, a list wrapped in an object (any key,
    /// `details` preferred) and fenced code blocks.
    pub fn parse(completion: &str) -> Self {
        let body = strip_code_fence(completion);
        let value: Value = match serde_json::from_str(body) {
            Ok(value) => value,
            Err(e) => return Self::Malformed(format!("invalid JSON: {}", e)),
        };

        let items = match value {
            Value::Array(items) => items,
            Value::Object(mut map) => {
                let key = if map.get("details").is_some_and(Value::is_array) {
                    Some("details".to_string())
                } else {
                    map.iter()
                        .find(|(_, v)| v.is_array())
                        .map(|(k, _)| k.clone())
                };
                match key.and_then(|k| map.remove(&k)) {
                    Some(Value::Array(items)) => items,
                    _ => return Self::Malformed("object without a list".to_string()),
                }
            }
            other => return Self::Malformed(format!("unexpected JSON value: {}", other)),
        };

        items
            .into_iter()
            .map(|item| {
                serde_json::from_value::<DetailQuery>(item)
                    .map_err(|e| format!("bad detail entry: {}", e))
            })
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_or_else(Self::Malformed, Self::Details)
    }
}

fn strip_code_fence(text: &str) -> &str {
    let text = text.trim();
    let Some(rest) = text.strip_prefix("```") else {
        return text;
    };
    // Drop the info string (e.g. "json") on the opening line
    let rest = rest.split_once('\n').map_or("", |(_, body)| body);
    rest.trim_end().strip_suffix("```").unwrap_or(rest).trim()
}

/// Verifier settings
#[derive(Debug, Clone)]
pub struct VerifierConfig {
    /// Passages retrieved per claim query
    pub top_k: usize,
    pub extraction_retry: RetryPolicy,
}

impl From<&rag_eval_config::VerificationConfig> for VerifierConfig {
    fn from(settings: &rag_eval_config::VerificationConfig) -> Self {
        Self {
            top_k: settings.top_k,
            extraction_retry: RetryPolicy::for_extraction(settings),
        }
    }
}

impl Default for VerifierConfig {
    fn default() -> Self {
        Self::from(&rag_eval_config::VerificationConfig::default())
    }
}

/// Detail verifier
pub struct DetailVerifier {
    llm: Arc<dyn LlmBackend>,
    retriever: Arc<ContextRetriever>,
    generator: AnswerGenerator,
    config: VerifierConfig,
}

impl DetailVerifier {
    pub fn new(llm: Arc<dyn LlmBackend>, retriever: Arc<ContextRetriever>, config: VerifierConfig) -> Self {
        Self {
            generator: AnswerGenerator::new(llm.clone()),
            llm,
            retriever,
            config,
        }
    }

    /// Verify one answer record
    ///
    /// Extraction problems degrade to a skipped case. Errors during claim
    /// verification or synthesis are returned.
    pub async fn verify(&self, record: &AnswerRecord) -> Result<VerifiedRecord> {
        let skipped = |record: &AnswerRecord| VerifiedRecord {
            id: record.id,
            query: record.query.clone(),
            ground_truth: record.ground_truth.clone(),
            answer: record.answer.clone(),
            details_verification: None,
            new_answer: record.answer.clone(),
        };

        let Some(answer) = record.answer.as_deref() else {
            tracing::info!(case_id = record.id, "Skipping verification, no answer");
            return Ok(skipped(record));
        };

        let detail_queries = self.extract_details(answer).await;
        if detail_queries.is_empty() {
            tracing::info!(case_id = record.id, "Skipping verification, no details extracted");
            return Ok(skipped(record));
        }

        let mut details = Vec::with_capacity(detail_queries.len());
        for detail_query in detail_queries {
            details.push(self.verify_detail(record.id, detail_query).await?);
        }

        let new_answer = self.synthesize(answer, &details).await?;

        Ok(VerifiedRecord {
            id: record.id,
            query: record.query.clone(),
            ground_truth: record.ground_truth.clone(),
            answer: record.answer.clone(),
            details_verification: Some(details),
            new_answer,
        })
    }

    /// Claims with their check queries; empty after repeated failures
    pub async fn extract_details(&self, answer: &str) -> Vec<DetailQuery> {
        let messages = PromptBuilder::new()
            .user(EXTRACTION_PROMPT.replace("{answer}", answer))
            .build();

        let llm = &self.llm;
        let messages = &messages;
        let result = self
            .config
            .extraction_retry
            .run("extract_details", move |_| async move {
                let completion = llm.generate(messages).await.map_err(|e| e.to_string())?;
                let text = completion.text.unwrap_or_default();
                match ExtractedDetails::parse(&text) {
                    ExtractedDetails::Details(details) => Ok(details),
                    ExtractedDetails::Malformed(reason) => Err(reason),
                }
            })
            .await;

        match result {
            Ok(details) => details,
            Err(_) => {
                metrics::counter!("rag_eval_degraded_total", "site" => "extract_details").increment(1);
                Vec::new()
            }
        }
    }

    /// Answer the claim's query from fresh passages and reconcile the claim
    pub async fn verify_detail(&self, case_id: CaseId, detail_query: DetailQuery) -> Result<Detail> {
        let DetailQuery {
            detail,
            generated_query,
        } = detail_query;

        let contexts = self
            .retriever
            .retrieve(case_id, &generated_query, self.config.top_k, false)
            .await?;

        let answer_to_generated_query = self
            .generator
            .generate_direct(&contexts, &generated_query)
            .await?
            .unwrap_or_default();

        let messages = PromptBuilder::new()
            .user(
                RECONCILE_PROMPT
                    .replace("{detail}", &detail)
                    .replace("{query}", &generated_query)
                    .replace("{answer}", &answer_to_generated_query),
            )
            .build();
        let new_detail = self
            .llm
            .generate(&messages)
            .await?
            .content()
            .map(str::to_string)
            .unwrap_or_else(|| detail.clone());

        tracing::debug!(case_id, detail = %detail, new_detail = %new_detail, "Detail verified");

        Ok(Detail {
            detail,
            generated_query,
            answer_to_generated_query,
            new_detail,
        })
    }

    /// Rewrite `answer` with the verified details
    pub async fn synthesize(&self, answer: &str, details: &[Detail]) -> Result<Option<String>> {
        let details_json = serde_json::to_string_pretty(details)?;
        let messages = PromptBuilder::new()
            .user(
                SYNTHESIS_PROMPT
                    .replace("{details}", &details_json)
                    .replace("{answer}", answer),
            )
            .build();

        Ok(self.llm.generate(&messages).await?.text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{InMemoryStore, ScriptedLlm};
    use rag_eval_rag::RetrieverConfig;
    use std::time::Duration;

    fn dq(detail: &str, query: &str) -> DetailQuery {
        DetailQuery {
            detail: detail.to_string(),
            generated_query: query.to_string(),
        }
    }

    fn verifier(llm: Arc<ScriptedLlm>) -> DetailVerifier {
        let store = InMemoryStore::new().with_collection(
            7,
            vec!["The Eiffel Tower is 330 metres tall.", "Paris is in France."],
        );
        let retriever = Arc::new(ContextRetriever::new(Arc::new(store), RetrieverConfig::default()));
        DetailVerifier::new(
            llm,
            retriever,
            VerifierConfig {
                top_k: 6,
                extraction_retry: RetryPolicy::new(5, Duration::ZERO),
            },
        )
    }

    fn record(answer: Option<&str>) -> AnswerRecord {
        AnswerRecord {
            id: 7,
            query: "How tall is the Eiffel Tower?".to_string(),
            ground_truth: "330 metres".to_string(),
            answer: answer.map(str::to_string),
        }
    }

    #[test]
    fn test_parse_bare_list() {
        let parsed = ExtractedDetails::parse(
            r#"[{"detail": "The tower is 300 m tall", "generated_query": "How tall is the tower?"}]"#,
        );
        assert_eq!(
            parsed,
            ExtractedDetails::Details(vec![dq("The tower is 300 m tall", "How tall is the tower?")])
        );
    }

    #[test]
    fn test_parse_fenced_and_wrapped() {
        let parsed = ExtractedDetails::parse(
            "```json\n{\"details\": [{\"detail\": \"a\", \"generated_query\": \"b\"}]}\n```",
        );
        assert_eq!(parsed, ExtractedDetails::Details(vec![dq("a", "b")]));

        assert_eq!(ExtractedDetails::parse("[]"), ExtractedDetails::Details(vec![]));
    }

    #[test]
    fn test_parse_malformed() {
        assert!(matches!(ExtractedDetails::parse("not json"), ExtractedDetails::Malformed(_)));
        assert!(matches!(
            ExtractedDetails::parse(r#"[{"detail": "only detail"}]"#),
            ExtractedDetails::Malformed(_)
        ));
        assert!(matches!(ExtractedDetails::parse("42"), ExtractedDetails::Malformed(_)));
        assert!(matches!(
            ExtractedDetails::parse(r#"{"note": "nothing"}"#),
            ExtractedDetails::Malformed(_)
        ));
    }

    #[tokio::test]
    async fn test_refusal_is_skipped() {
        let llm = Arc::new(ScriptedLlm::sequence(vec![Some("[]")]));
        let verified = verifier(llm.clone())
            .verify(&record(Some("The information is not available in the provided context.")))
            .await
            .unwrap();

        assert_eq!(verified.details_verification, None);
        assert_eq!(verified.new_answer, verified.answer);
        assert_eq!(llm.call_count(), 1);
    }

    #[tokio::test]
    async fn test_extraction_exhaustion_degrades_to_empty() {
        let llm = Arc::new(ScriptedLlm::with_handler(|_| Ok(Some("garbage".to_string()))));
        assert!(verifier(llm.clone()).extract_details("Some answer.").await.is_empty());
        assert_eq!(llm.call_count(), 5);

        let failing = Arc::new(ScriptedLlm::failing());
        assert!(verifier(failing).extract_details("x").await.is_empty());
    }

    #[tokio::test]
    async fn test_null_answer_skips_without_model_call() {
        let llm = Arc::new(ScriptedLlm::failing());
        let verified = verifier(llm.clone()).verify(&record(None)).await.unwrap();

        assert_eq!(verified.new_answer, None);
        assert_eq!(verified.details_verification, None);
        assert_eq!(llm.call_count(), 0);
    }

    #[tokio::test]
    async fn test_full_verification() {
        let llm = Arc::new(ScriptedLlm::sequence(vec![
            Some(r#"[{"detail": "The Eiffel Tower is 300 metres tall", "generated_query": "How tall is the Eiffel Tower?"}]"#),
            Some("It is 330 metres tall."),
            Some("The Eiffel Tower is 330 metres tall"),
            Some("The Eiffel Tower is 330 metres tall."),
        ]));
        let verified = verifier(llm.clone())
            .verify(&record(Some("The Eiffel Tower is 300 metres tall.")))
            .await
            .unwrap();

        let details = verified.details_verification.unwrap();
        assert_eq!(details.len(), 1);
        assert_eq!(details[0].answer_to_generated_query, "It is 330 metres tall.");
        assert_eq!(details[0].new_detail, "The Eiffel Tower is 330 metres tall");
        assert_eq!(verified.new_answer.as_deref(), Some("The Eiffel Tower is 330 metres tall."));

        let calls = llm.calls();
        assert_eq!(calls.len(), 4);
        // Re-retrieved passage reaches the verification answer prompt
        assert!(calls[1][0].content.contains("330 metres"));
        assert!(calls[2][0].content.starts_with("Original detail: The Eiffel Tower is 300 metres tall"));
        assert!(calls[3][0].content.contains("\"new_detail\": \"The Eiffel Tower is 330 metres tall\""));
    }

    #[tokio::test]
    async fn test_blank_reconcile_keeps_detail() {
        for reply in [None, Some(""), Some("  \n")] {
            let llm = Arc::new(ScriptedLlm::sequence(vec![Some("It is 330 metres tall."), reply]));
            let detail = verifier(llm)
                .verify_detail(7, dq("The tower is 300 metres tall", "How tall is the Eiffel Tower?"))
                .await
                .unwrap();
            assert_eq!(detail.new_detail, "The tower is 300 metres tall");
        }
    }

    #[tokio::test]
    async fn test_missing_collection_is_fatal() {
        let llm = Arc::new(ScriptedLlm::sequence(vec![Some(
            r#"[{"detail": "d", "generated_query": "q"}]"#,
        )]));
        let mut answer = record(Some("An answer."));
        answer.id = 99;

        let err = verifier(llm).verify(&answer).await.unwrap_err();
        assert!(matches!(err, rag_eval_core::Error::CollectionMissing(_)));
    }
}
