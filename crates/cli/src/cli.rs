//! Command line definition

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use rag_eval_core::PipelineVariant;

/// Retrieval-augmented QA evaluation pipeline
#[derive(Parser, Debug)]
#[command(name = "rag-eval", version, about, long_about = None)]
pub struct Cli {
    /// Configuration file layered over config/default
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Results directory (overrides paths.results_dir)
    #[arg(long, global = true)]
    pub results_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Build per-case collections and retrieve contexts
    Contexts {
        /// Expand each query into sub-queries and fuse the results
        #[arg(long)]
        pre_retrieval: bool,

        /// Source dataset (JSONL)
        #[arg(long)]
        source: Option<PathBuf>,

        /// File of sampled line numbers
        #[arg(long)]
        sample_ids: Option<PathBuf>,

        /// Number of sample ids to use
        #[arg(long)]
        sample_limit: Option<usize>,
    },
    /// Generate answers from retrieved contexts
    Answers {
        /// Read contexts retrieved with pre-retrieval
        #[arg(long)]
        pre_retrieval: bool,

        /// Self-ask chain-of-thought answering
        #[arg(long)]
        cot: bool,
    },
    /// Verify generated answers detail by detail
    Verify {
        /// Verify answers of a pre-retrieval variant
        #[arg(long)]
        pre_retrieval: bool,

        /// Verify answers of a chain-of-thought variant
        #[arg(long)]
        cot: bool,
    },
    /// Judge a variant's answers against ground truth
    Judge {
        /// 1-8 or a variant name such as pre-retrieval+cot
        #[arg(long)]
        stage: PipelineVariant,
    },
    /// Average judge accuracy of a variant
    Score {
        /// 1-8 or a variant name such as cot+rig
        #[arg(long)]
        stage: PipelineVariant,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_stage_selector() {
        let cli = Cli::parse_from(["rag-eval", "judge", "--stage", "6"]);
        match cli.command {
            Command::Judge { stage } => assert_eq!(stage, PipelineVariant::new(false, true, true)),
            other => panic!("unexpected command {:?}", other),
        }

        let cli = Cli::parse_from(["rag-eval", "--results-dir", "/tmp/r", "score", "--stage", "pre-retrieval+rig"]);
        assert_eq!(cli.results_dir, Some(PathBuf::from("/tmp/r")));
        assert!(matches!(
            cli.command,
            Command::Score { stage } if stage == PipelineVariant::new(true, false, true)
        ));
    }

    #[test]
    fn test_invalid_stage_rejected() {
        assert!(Cli::try_parse_from(["rag-eval", "judge", "--stage", "9"]).is_err());
        assert!(Cli::try_parse_from(["rag-eval", "score", "--stage", "rig+cot+x"]).is_err());
    }

    #[test]
    fn test_contexts_flags() {
        let cli = Cli::parse_from([
            "rag-eval",
            "contexts",
            "--pre-retrieval",
            "--sample-limit",
            "10",
            "--config",
            "local.yaml",
        ]);
        assert_eq!(cli.config, Some(PathBuf::from("local.yaml")));
        match cli.command {
            Command::Contexts {
                pre_retrieval,
                sample_limit,
                source,
                ..
            } => {
                assert!(pre_retrieval);
                assert_eq!(sample_limit, Some(10));
                assert_eq!(source, None);
            }
            other => panic!("unexpected command {:?}", other),
        }
    }
}
