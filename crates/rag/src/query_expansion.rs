//! Query expansion for pre-retrieval
//!
//! A language model rewrites the user question into several search queries.
//! Each one is searched separately and the result lists are fused.

use std::sync::Arc;

use once_cell::sync::Lazy;
use regex::Regex;

use rag_eval_llm::{LlmBackend, PromptBuilder};

use crate::RagError;

const SYSTEM_PROMPT: &str =
    "Generate multiple search queries based on the input query. Be specific and diverse.";

static LIST_MARKER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(?:\d+[.)]|[-*•])\s*").expect("valid regex"));

/// Generates sub-queries with a language model
pub struct SubQueryGenerator {
    llm: Arc<dyn LlmBackend>,
    num_queries: usize,
}

impl SubQueryGenerator {
    pub fn new(llm: Arc<dyn LlmBackend>, num_queries: usize) -> Self {
        Self {
            llm,
            num_queries: num_queries.max(1),
        }
    }

    pub fn num_queries(&self) -> usize {
        self.num_queries
    }

    /// Up to `num_queries` search queries for `query`
    ///
    /// Never empty: falls back to the original query when the model
    /// produced nothing usable.
    pub async fn generate(&self, query: &str) -> Result<Vec<String>, RagError> {
        let messages = PromptBuilder::new()
            .system(SYSTEM_PROMPT)
            .user(format!(
                "Generate {} different search queries related to: {}",
                self.num_queries, query
            ))
            .build();

        let result = self
            .llm
            .generate(&messages)
            .await
            .map_err(|e| RagError::QueryGeneration(e.to_string()))?;

        let queries = parse_sub_queries(result.text.as_deref().unwrap_or(""), self.num_queries, query);
        tracing::debug!(?queries, "Generated sub-queries");
        Ok(queries)
    }
}

/// Parse a completion into at most `limit` queries
///
/// Lines are trimmed, list markers and wrapping quotes removed, and blank
/// lines dropped. Returns `[original]` when nothing remains.
pub fn parse_sub_queries(completion: &str, limit: usize, original: &str) -> Vec<String> {
    let queries: Vec<String> = completion
        .lines()
        .map(clean_line)
        .filter(|line| !line.is_empty())
        .take(limit)
        .collect();

    if queries.is_empty() {
        vec![original.to_string()]
    } else {
        queries
    }
}

fn clean_line(line: &str) -> String {
    let line = line.trim();
    let line = LIST_MARKER.replace(line, "");
    let line = line.trim();

    let unquoted = ['"', '\'', '`']
        .iter()
        .find_map(|q| line.strip_prefix(*q).and_then(|l| l.strip_suffix(*q)))
        .unwrap_or(line);

    unquoted.trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_numbered_list() {
        let completion = "1. \"first query\"\n2) second query\n\n- third\n* fourth\n5. fifth";
        let queries = parse_sub_queries(completion, 4, "orig");
        assert_eq!(queries, vec!["first query", "second query", "third", "fourth"]);
    }

    #[test]
    fn test_parse_plain_lines() {
        let queries = parse_sub_queries("  alpha  \nbeta", 4, "orig");
        assert_eq!(queries, vec!["alpha", "beta"]);
    }

    #[test]
    fn test_empty_completion_falls_back() {
        assert_eq!(parse_sub_queries("\n \n", 4, "orig"), vec!["orig"]);
        assert_eq!(parse_sub_queries("1.\n-", 4, "orig"), vec!["orig"]);
    }

    #[test]
    fn test_numbers_inside_query_kept() {
        let queries = parse_sub_queries("2024 olympics host city", 4, "orig");
        assert_eq!(queries, vec!["2024 olympics host city"]);
    }
}
