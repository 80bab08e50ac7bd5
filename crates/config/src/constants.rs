//! Centralized constants for the evaluation pipeline
//!
//! Single source of truth for default values. Settings defaults and
//! component constructors read from here.

/// Service endpoints (defaults for local development)
pub mod endpoints {
    /// OpenAI-compatible chat completions endpoint
    pub const OPENAI_DEFAULT: &str = "https://api.openai.com/v1";

    /// Ollama endpoint (chat and embeddings)
    pub const OLLAMA_DEFAULT: &str = "http://localhost:11434";

    /// Qdrant endpoint (gRPC port, used by qdrant-client)
    pub const QDRANT_DEFAULT: &str = "http://127.0.0.1:6334";
}

/// Model defaults
pub mod models {
    /// Chat model used by every stage unless overridden
    pub const CHAT_DEFAULT: &str = "gpt-4o-mini";

    /// Embedding model served by Ollama
    pub const EMBEDDING_DEFAULT: &str = "nomic-embed-text";

    /// Output dimension of [`EMBEDDING_DEFAULT`]
    pub const EMBEDDING_DIM: usize = 768;

    /// Generation is deterministic by default
    pub const TEMPERATURE: f32 = 0.0;
}

/// Timeouts
pub mod timeouts {
    /// LLM request timeout (seconds)
    pub const LLM_REQUEST_SECS: u64 = 120;

    /// Embedding request timeout (seconds)
    pub const EMBEDDING_REQUEST_SECS: u64 = 60;
}

/// Retrieval defaults
pub mod retrieval {
    /// Passages returned per case
    pub const TOP_K: usize = 6;

    /// Sub-queries generated in pre-retrieval mode
    pub const NUM_SUB_QUERIES: usize = 4;

    /// Reciprocal rank fusion constant
    pub const RRF_K: f32 = 60.0;

    /// Chunk size in estimated tokens
    pub const CHUNK_SIZE: usize = 3072;

    /// Fraction of a chunk repeated at the start of the next one
    pub const CHUNK_OVERLAP: f32 = 0.2;

    /// Collection name is `{COLLECTION_PREFIX}{case_id}`
    pub const COLLECTION_PREFIX: &str = "collection_";
}

/// Detail verification defaults
pub mod verification {
    /// Passages retrieved per generated verification query
    pub const TOP_K: usize = 6;

    /// Attempts for the detail extraction call
    pub const EXTRACTION_ATTEMPTS: u32 = 5;

    pub const BACKOFF_MS: u64 = 1000;
}

/// Judge defaults
pub mod judge {
    /// Attempts for the model judgement call
    pub const ATTEMPTS: u32 = 3;

    pub const BACKOFF_MS: u64 = 1000;
}

/// Input and output locations
pub mod paths {
    pub const RESULTS_DIR: &str = "results";

    pub const SOURCE_PATH: &str = "data/crag_task_3_dev_v4.jsonl.bz2";

    pub const SAMPLE_IDS_PATH: &str = "data/random_nums.txt";

    /// Only the first N sampled ids are used
    pub const SAMPLE_LIMIT: usize = 300;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_overlap_is_fraction() {
        assert!((0.0..1.0).contains(&retrieval::CHUNK_OVERLAP));
    }

    #[test]
    fn test_attempts_nonzero() {
        assert!(verification::EXTRACTION_ATTEMPTS > 0);
        assert!(judge::ATTEMPTS > 0);
    }
}
