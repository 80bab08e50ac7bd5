//! Sentence-aligned text chunking
//!
//! Pages are split into chunks of roughly `chunk_size` tokens without
//! breaking sentences. Consecutive chunks share up to `overlap_tokens` of
//! trailing sentences. A sentence longer than a whole chunk is split on
//! word boundaries.
//!
//! # Usage
//!
//! ```ignore
//! use rag_eval_rag::chunker::{ChunkConfig, SentenceChunker};
//!
//! let chunker = SentenceChunker::new(ChunkConfig::from(&settings.retrieval));
//! let chunks = chunker.chunk("Long document text...");
//! ```

use serde::{Deserialize, Serialize};
use unicode_segmentation::UnicodeSegmentation;

use rag_eval_config::RetrievalConfig;

/// Configuration for chunking
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkConfig {
    /// Target chunk size in tokens (approximate)
    pub chunk_size: usize,
    /// Tokens carried over from the end of the previous chunk
    pub overlap_tokens: usize,
}

impl Default for ChunkConfig {
    fn default() -> Self {
        Self::from(&RetrievalConfig::default())
    }
}

impl From<&RetrievalConfig> for ChunkConfig {
    fn from(settings: &RetrievalConfig) -> Self {
        Self {
            chunk_size: settings.chunk_size,
            overlap_tokens: settings.overlap_tokens(),
        }
    }
}

/// A single chunk of text
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    pub text: String,
    /// Index of this chunk in the original document
    pub index: usize,
    /// Estimated token count
    pub token_count: usize,
}

/// Sentence-aligned chunker
pub struct SentenceChunker {
    config: ChunkConfig,
}

impl SentenceChunker {
    pub fn new(config: ChunkConfig) -> Self {
        Self { config }
    }

    /// Chunk a document
    pub fn chunk(&self, text: &str) -> Vec<Chunk> {
        let chunk_size = self.config.chunk_size.max(1);
        let units = self.split_units(text, chunk_size);

        let mut chunks = Vec::new();
        let mut current: Vec<(String, usize)> = Vec::new();
        let mut current_tokens = 0;

        for (unit, tokens) in units {
            if current_tokens + tokens > chunk_size && !current.is_empty() {
                chunks.push(Self::make_chunk(&current, chunks.len()));

                let (carried, carried_tokens) = self.carry_overlap(&current);
                if carried_tokens + tokens > chunk_size {
                    current.clear();
                    current_tokens = 0;
                } else {
                    current = carried;
                    current_tokens = carried_tokens;
                }
            }

            current.push((unit, tokens));
            current_tokens += tokens;
        }

        if !current.is_empty() {
            chunks.push(Self::make_chunk(&current, chunks.len()));
        }

        chunks
    }

    fn make_chunk(units: &[(String, usize)], index: usize) -> Chunk {
        let text = units
            .iter()
            .map(|(s, _)| s.as_str())
            .collect::<Vec<_>>()
            .join(" ");
        Chunk {
            token_count: units.iter().map(|(_, t)| t).sum(),
            text,
            index,
        }
    }

    /// Trailing sentences of `units` fitting in the overlap budget
    fn carry_overlap(&self, units: &[(String, usize)]) -> (Vec<(String, usize)>, usize) {
        let mut carried = Vec::new();
        let mut carried_tokens = 0;

        for (unit, tokens) in units.iter().rev() {
            if carried_tokens + tokens > self.config.overlap_tokens {
                break;
            }
            carried.push((unit.clone(), *tokens));
            carried_tokens += tokens;
        }

        carried.reverse();
        (carried, carried_tokens)
    }

    /// Sentences, with oversized ones broken into word windows
    fn split_units(&self, text: &str, chunk_size: usize) -> Vec<(String, usize)> {
        let mut units = Vec::new();

        for sentence in split_sentences(text) {
            let tokens = estimate_tokens(&sentence);
            if tokens <= chunk_size {
                units.push((sentence, tokens));
                continue;
            }

            let mut window = String::new();
            for word in sentence.split_whitespace() {
                let candidate_tokens = estimate_tokens(&window) + estimate_tokens(word) + 1;
                if !window.is_empty() && candidate_tokens > chunk_size {
                    let tokens = estimate_tokens(&window);
                    units.push((std::mem::take(&mut window), tokens));
                }
                if !window.is_empty() {
                    window.push(' ');
                }
                window.push_str(word);
            }
            if !window.is_empty() {
                let tokens = estimate_tokens(&window);
                units.push((window, tokens));
            }
        }

        units
    }
}

impl Default for SentenceChunker {
    fn default() -> Self {
        Self::new(ChunkConfig::default())
    }
}

/// UAX #29 sentences, trimmed, blanks dropped
fn split_sentences(text: &str) -> Vec<String> {
    text.unicode_sentences()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// Approximate token count: one token per four graphemes
pub fn estimate_tokens(text: &str) -> usize {
    let graphemes = text.graphemes(true).count();
    if graphemes == 0 {
        0
    } else {
        (graphemes / 4).max(1)
    }
}
