//! LLM-as-judge accuracy evaluation
//!
//! Decision order:
//! 1. no prediction: inaccurate
//! 2. prediction contains "i don't know": inaccurate
//! 3. prediction equals the ground truth, ignoring case: accurate
//! 4. otherwise the model decides, in JSON-object mode

use std::sync::Arc;

use serde_json::{Map, Value};

use rag_eval_llm::{LlmBackend, Message, PromptBuilder, ResponseFormat};

use crate::retry::RetryPolicy;

const INSTRUCTIONS: &str = r#"
# Task:
You are given a Question, a model Prediction, and a list of Ground Truth answers, judge whether the model Prediction matches any answer from the list of Ground Truth answers. Follow the instructions step by step to make a judgement.
1. If the model prediction matches any provided answers from the Ground Truth Answer list, "Accuracy" should be "True"; otherwise, "Accuracy" should be "False".
2. If the model prediction says that it couldn't answer the question or it doesn't have enough information, "Accuracy" should always be "False" unless the Ground Truth is "invalid question".
3. For cases where Ground Truth is "invalid question":
   - "Accuracy" should be "True" if the prediction either:
     a) States explicitly that it's an invalid question
     b) Explains why the premise of the question is incorrect
     c) States that the information is not accurate or doesn't exist
     d) Indicates that the context or available information doesn't support the premise
# Output:
Respond with only a single JSON string with an "Accuracy" field which is "True" or "False".
"#;

const IN_CONTEXT_EXAMPLES: &str = r#"
# Examples:
Question: how many seconds is 3 minutes 15 seconds?
Ground truth: ["195 seconds"]
Prediction: 3 minutes 15 seconds is 195 seconds.
Accuracy: True

Question: Who authored The Taming of the Shrew (published in 2002)?
Ground truth: ["William Shakespeare", "Roma Gill"]
Prediction: The author to The Taming of the Shrew is Roma Shakespeare.
Accuracy: False

Question: Who played Sheldon in Big Bang Theory?
Ground truth: ["Jim Parsons", "Iain Armitage"]
Prediction: I am sorry I don't know.
Accuracy: False

Question: How many gold medals did Michelle Kwan win in the Olympics?
Ground truth: "invalid question"
Prediction: Michelle Kwan has not won any Olympic gold medals.
Accuracy: True

Question: Which states have universal healthcare for all residents?
Ground truth: "invalid question"
Prediction: No U.S. state currently has a universal healthcare program for all residents.
Accuracy: True

Question: Which five states have successfully implemented universal healthcare?
Ground truth: "invalid question"
Prediction: The context information does not provide specific details about any U.S. states that have successfully implemented universal healthcare programs.
Accuracy: True
"#;

const VERDICT_KEY: &str = "accuracy";
const REFUSAL: &str = "i don't know";

/// Parsed judge response
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JudgeVerdict {
    Accurate,
    Inaccurate,
    Malformed(String),
}

impl JudgeVerdict {
    /// Parse a JSON completion
    ///
    /// Keys and string values are lower-cased after parsing. The verdict is
    /// accurate iff `accuracy` is `true` or the string `"true"`. An object
    /// without the key is inaccurate; anything that is not a JSON object is
    /// malformed.
    pub fn parse(completion: &str) -> Self {
        let value: Value = match serde_json::from_str(completion.trim()) {
            Ok(value) => value,
            Err(e) => return Self::Malformed(format!("invalid JSON: {}", e)),
        };

        let Value::Object(map) = lowercase(value) else {
            return Self::Malformed("not a JSON object".to_string());
        };

        match map.get(VERDICT_KEY) {
            Some(Value::Bool(true)) => Self::Accurate,
            Some(Value::String(s)) if s == "true" => Self::Accurate,
            _ => Self::Inaccurate,
        }
    }
}

fn lowercase(value: Value) -> Value {
    match value {
        Value::String(s) => Value::String(s.to_lowercase()),
        Value::Array(items) => Value::Array(items.into_iter().map(lowercase).collect()),
        Value::Object(map) => Value::Object(
            map.into_iter()
                .map(|(k, v)| (k.to_lowercase(), lowercase(v)))
                .collect::<Map<String, Value>>(),
        ),
        other => other,
    }
}

/// Judges predictions against ground truth
pub struct Judge {
    llm: Arc<dyn LlmBackend>,
    retry: RetryPolicy,
}

impl Judge {
    pub fn new(llm: Arc<dyn LlmBackend>, retry: RetryPolicy) -> Self {
        Self { llm, retry }
    }

    /// Whether `prediction` answers `query` correctly
    ///
    /// Never fails: model trouble after all attempts counts as inaccurate.
    pub async fn judge(&self, query: &str, ground_truth: &str, prediction: Option<&str>) -> bool {
        let Some(prediction) = prediction else {
            return false;
        };

        let ground_truth = ground_truth.trim();
        let prediction = prediction.trim();
        let prediction_lower = prediction.to_lowercase();

        if prediction_lower.contains(REFUSAL) {
            return false;
        }
        if prediction_lower == ground_truth.to_lowercase() {
            return true;
        }

        let messages = judge_messages(query, ground_truth, prediction);
        let llm = &self.llm;
        let messages = &messages;
        let verdict = self
            .retry
            .run("judge", move |_| async move {
                let result = llm
                    .generate_with_format(messages, ResponseFormat::JsonObject)
                    .await
                    .map_err(|e| e.to_string())?;
                match JudgeVerdict::parse(result.text.as_deref().unwrap_or("")) {
                    JudgeVerdict::Malformed(reason) => Err(reason),
                    verdict => Ok(verdict),
                }
            })
            .await;

        match verdict {
            Ok(verdict) => verdict == JudgeVerdict::Accurate,
            Err(_) => {
                metrics::counter!("rag_eval_degraded_total", "site" => "judge").increment(1);
                false
            }
        }
    }
}

fn judge_messages(query: &str, ground_truth: &str, prediction: &str) -> Vec<Message> {
    PromptBuilder::new()
        .system(format!("{}{}", INSTRUCTIONS, IN_CONTEXT_EXAMPLES))
        .user(format!(
            "Question: {}\n Ground truth: {}\n Prediction: {}\n",
            query, ground_truth, prediction
        ))
        .build()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::ScriptedLlm;
    use std::time::Duration;

    fn judge(llm: Arc<ScriptedLlm>) -> Judge {
        Judge::new(llm, RetryPolicy::new(3, Duration::ZERO))
    }

    #[test]
    fn test_parse_verdicts() {
        assert_eq!(JudgeVerdict::parse(r#"{"Accuracy": "True"}"#), JudgeVerdict::Accurate);
        assert_eq!(JudgeVerdict::parse(r#"{"accuracy": true}"#), JudgeVerdict::Accurate);
        assert_eq!(JudgeVerdict::parse(r#"{"ACCURACY": "FALSE"}"#), JudgeVerdict::Inaccurate);
        assert_eq!(JudgeVerdict::parse(r#"{"accuracy": 1}"#), JudgeVerdict::Inaccurate);
        assert_eq!(JudgeVerdict::parse(r#"{"verdict": "true"}"#), JudgeVerdict::Inaccurate);
        // Lower-casing happens after parsing, so literal TRUE stays invalid JSON
        assert!(matches!(JudgeVerdict::parse(r#"{"accuracy": TRUE}"#), JudgeVerdict::Malformed(_)));
        assert!(matches!(JudgeVerdict::parse("[true]"), JudgeVerdict::Malformed(_)));
    }

    #[tokio::test]
    async fn test_null_prediction() {
        let llm = Arc::new(ScriptedLlm::failing());
        assert!(!judge(llm.clone()).judge("q", "a", None).await);
        assert_eq!(llm.call_count(), 0);
    }

    #[tokio::test]
    async fn test_refusal_shortcut() {
        let llm = Arc::new(ScriptedLlm::failing());
        assert!(!judge(llm.clone()).judge("q", "Jim Parsons", Some("Sorry, I Don't Know.")).await);
        assert_eq!(llm.call_count(), 0);
    }

    #[tokio::test]
    async fn test_exact_match_shortcut() {
        let llm = Arc::new(ScriptedLlm::failing());
        assert!(judge(llm.clone()).judge("q", " Jim Parsons ", Some("jim parsons\n")).await);
        assert_eq!(llm.call_count(), 0);
    }

    #[tokio::test]
    async fn test_model_path() {
        let llm = Arc::new(ScriptedLlm::sequence(vec![Some(r#"{"Accuracy": "True"}"#)]));
        let accurate = judge(llm.clone())
            .judge(
                "how many seconds is 3 minutes 15 seconds?",
                "195 seconds",
                Some("3 minutes 15 seconds is 195 seconds."),
            )
            .await;

        assert!(accurate);
        assert_eq!(llm.formats(), vec![ResponseFormat::JsonObject]);
        let calls = llm.calls();
        assert!(calls[0][0].content.contains("# Examples:"));
        assert_eq!(
            calls[0][1].content,
            "Question: how many seconds is 3 minutes 15 seconds?\n Ground truth: 195 seconds\n Prediction: 3 minutes 15 seconds is 195 seconds.\n"
        );
    }

    #[tokio::test]
    async fn test_invalid_question_sentinel() {
        let llm = Arc::new(ScriptedLlm::with_handler(|messages| {
            let user = &messages[1].content;
            let denies_premise = user.contains("Ground truth: invalid question")
                && user.contains("has not won");
            Ok(Some(format!("{{\"accuracy\": \"{}\"}}", denies_premise)))
        }));

        let accurate = judge(llm)
            .judge(
                "How many gold medals did Michelle Kwan win in the Olympics?",
                "invalid question",
                Some("Michelle Kwan has not won any Olympic gold medals."),
            )
            .await;
        assert!(accurate);
    }

    #[tokio::test]
    async fn test_retries_then_defaults_to_false() {
        let llm = Arc::new(ScriptedLlm::with_handler(|_| Ok(Some("not json".to_string()))));
        assert!(!judge(llm.clone()).judge("q", "a", Some("b")).await);
        assert_eq!(llm.call_count(), 3);
    }

    #[tokio::test]
    async fn test_recovers_on_second_attempt() {
        let llm = Arc::new(ScriptedLlm::sequence(vec![None, Some(r#"{"accuracy": true}"#)]));
        assert!(judge(llm.clone()).judge("q", "a", Some("b")).await);
        assert_eq!(llm.call_count(), 2);
    }
}
