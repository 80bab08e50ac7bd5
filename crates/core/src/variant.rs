//! Pipeline variants
//!
//! Three independent stages can be switched on or off, giving eight
//! combinations. Selectors accept either the variant name or its 1-based
//! position in [`PipelineVariant::ALL`].

use crate::Error;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Which optional stages a run uses
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct PipelineVariant {
    /// Sub-query generation plus rank fusion at retrieval time
    pub pre_retrieval: bool,
    /// Self-ask chain-of-thought answering
    pub decomposition: bool,
    /// Post-answer detail verification
    pub verification: bool,
}

impl PipelineVariant {
    pub const fn new(pre_retrieval: bool, decomposition: bool, verification: bool) -> Self {
        Self {
            pre_retrieval,
            decomposition,
            verification,
        }
    }

    /// All variants in selector order (selector `n` is `ALL[n - 1]`)
    pub const ALL: [PipelineVariant; 8] = [
        Self::new(false, false, false),
        Self::new(true, false, false),
        Self::new(false, true, false),
        Self::new(false, false, true),
        Self::new(true, true, false),
        Self::new(false, true, true),
        Self::new(true, false, true),
        Self::new(true, true, true),
    ];

    /// Canonical name, e.g. `pre-retrieval+cot`
    pub fn name(&self) -> String {
        let parts: Vec<&str> = [
            (self.pre_retrieval, "pre-retrieval"),
            (self.decomposition, "cot"),
            (self.verification, "rig"),
        ]
        .iter()
        .filter(|(on, _)| *on)
        .map(|(_, part)| *part)
        .collect();

        if parts.is_empty() {
            "none".to_string()
        } else {
            parts.join("+")
        }
    }

    /// Contexts file this variant reads
    pub fn contexts_file_name(&self) -> &'static str {
        if self.pre_retrieval {
            "contexts_with_pre-retrieval.jsonl"
        } else {
            "contexts_without_pre-retrieval.jsonl"
        }
    }

    /// Same variant with verification switched off
    pub fn without_verification(&self) -> Self {
        Self {
            verification: false,
            ..*self
        }
    }
}

impl fmt::Display for PipelineVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name())
    }
}

impl FromStr for PipelineVariant {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();

        if let Ok(index) = trimmed.parse::<usize>() {
            return index
                .checked_sub(1)
                .and_then(|i| Self::ALL.get(i).copied())
                .ok_or_else(|| Error::InvalidStage(s.to_string()));
        }

        Self::ALL
            .iter()
            .copied()
            .find(|variant| variant.name() == trimmed.to_lowercase())
            .ok_or_else(|| Error::InvalidStage(s.to_string()))
    }
}
