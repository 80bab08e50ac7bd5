//! Answer generation from retrieved contexts

use std::sync::Arc;

use rag_eval_core::Result;
use rag_eval_llm::{LlmBackend, PromptBuilder};

use crate::decomposition::{extract_final_answer, self_ask_messages};

const SEPARATOR: &str = "---------------------";

/// Render passages for a prompt: a JSON array of strings
pub fn render_contexts(contexts: &[String]) -> String {
    serde_json::to_string(contexts).unwrap_or_default()
}

/// Answers a query from passages
#[derive(Clone)]
pub struct AnswerGenerator {
    llm: Arc<dyn LlmBackend>,
}

impl AnswerGenerator {
    pub fn new(llm: Arc<dyn LlmBackend>) -> Self {
        Self { llm }
    }

    /// Generate an answer, `None` when the model returned no content
    pub async fn generate(
        &self,
        contexts: &[String],
        query: &str,
        use_decomposition: bool,
    ) -> Result<Option<String>> {
        if use_decomposition {
            self.generate_self_ask(contexts, query).await
        } else {
            self.generate_direct(contexts, query).await
        }
    }

    /// One completion with the contexts in the system message
    pub async fn generate_direct(&self, contexts: &[String], query: &str) -> Result<Option<String>> {
        let messages = PromptBuilder::new()
            .system(format!(
                "Context information is below.\n{}\n{}\n{}",
                SEPARATOR,
                render_contexts(contexts),
                SEPARATOR
            ))
            .user(format!(
                "Given the context information and not prior knowledge, answer the query.\nQuery: {}\nAnswer: ",
                query
            ))
            .build();

        let result = self.llm.generate(&messages).await?;
        tracing::debug!(tokens = result.tokens, time_ms = result.total_time_ms, "Direct answer generated");
        Ok(result.text)
    }

    async fn generate_self_ask(&self, contexts: &[String], query: &str) -> Result<Option<String>> {
        let messages = self_ask_messages(&render_contexts(contexts), query);
        let result = self.llm.generate(&messages).await?;

        Ok(result.text.map(|completion| {
            tracing::info!(completion = %completion, "Full self-ask completion");
            extract_final_answer(&completion).to_string()
        }))
    }
}
