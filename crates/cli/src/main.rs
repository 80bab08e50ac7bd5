//! rag-eval: retrieval-augmented QA evaluation
//!
//! Stages communicate through JSONL files under the results directory:
//! `contexts` → `answers` → (`verify`) → `judge` → `score`.

mod cli;
mod telemetry;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;

use rag_eval_config::{load_settings, Settings};
use rag_eval_core::PipelineVariant;
use rag_eval_llm::{LlmBackend, LlmFactory};
use rag_eval_persistence::{read_sample_ids, ResultsLayout, SourceReader};
use rag_eval_pipeline::{
    AnswerGenerator, AnswersStage, ContextsStage, DetailVerifier, Judge, JudgeStage, RetryPolicy,
    ScoreStage, StageReport, VerifierConfig, VerifyStage,
};
use rag_eval_rag::{
    ChunkConfig, ContextRetriever, OllamaEmbedder, OllamaEmbeddingConfig, PassageIndexer,
    QdrantCollectionStore, RetrieverConfig, SentenceChunker, SubQueryGenerator, VectorStoreConfig,
};

use crate::cli::{Cli, Command};

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Priority: env vars > --config > config/{env} > config/default > defaults
    let env = std::env::var("RAG_EVAL_ENV").ok();
    let mut settings =
        load_settings(cli.config.as_deref(), env.as_deref()).context("Failed to load configuration")?;
    if let Some(results_dir) = cli.results_dir {
        settings.paths.results_dir = results_dir;
    }

    telemetry::init_tracing(&settings.observability);
    let metrics = telemetry::init_metrics();

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        environment = env.as_deref().unwrap_or("default"),
        model = %settings.llm.model,
        results_dir = %settings.paths.results_dir.display(),
        "Configuration loaded"
    );

    let result = run(cli.command, &settings).await;

    if let Some(handle) = metrics {
        tracing::debug!(snapshot = %handle.render(), "Run metrics");
    }
    if let Err(e) = &result {
        tracing::error!(error = %e, "Run aborted");
    }
    result
}

async fn run(command: Command, settings: &Settings) -> anyhow::Result<()> {
    let layout = ResultsLayout::new(&settings.paths.results_dir);

    match command {
        Command::Contexts {
            pre_retrieval,
            source,
            sample_ids,
            sample_limit,
        } => {
            let store = collection_store(settings)?;
            let mut retriever =
                ContextRetriever::new(store.clone(), RetrieverConfig::from(&settings.retrieval));
            if pre_retrieval {
                retriever = retriever.with_sub_queries(SubQueryGenerator::new(
                    chat_model(settings)?,
                    settings.retrieval.num_sub_queries,
                ));
            }

            let source_path = source.unwrap_or_else(|| settings.paths.source_path.clone());
            let sample_path: Option<PathBuf> = sample_ids.or_else(|| settings.paths.sample_ids_path.clone());
            let sample = match sample_path {
                Some(path) => {
                    let limit = sample_limit.unwrap_or(settings.paths.sample_limit);
                    let ids = read_sample_ids(&path, limit)
                        .with_context(|| format!("Failed to read sample ids from {}", path.display()))?;
                    tracing::info!(path = %path.display(), cases = ids.len(), "Sampling source entries");
                    Some(ids)
                }
                None => None,
            };

            let reader = SourceReader::open(&source_path, sample)
                .with_context(|| format!("Failed to open source {}", source_path.display()))?;
            let report = ContextsStage::new(store, retriever, settings.retrieval.top_k)
                .run(reader, &layout, pre_retrieval)
                .await?;
            log_report(&report);
        }

        Command::Answers { pre_retrieval, cot } => {
            let report = AnswersStage::new(AnswerGenerator::new(chat_model(settings)?))
                .run(&layout, pre_retrieval, cot)
                .await?;
            log_report(&report);
        }

        Command::Verify { pre_retrieval, cot } => {
            let store = collection_store(settings)?;
            let retriever = ContextRetriever::new(store, RetrieverConfig::from(&settings.retrieval));
            let verifier = DetailVerifier::new(
                chat_model(settings)?,
                Arc::new(retriever),
                VerifierConfig::from(&settings.verification),
            );
            let report = VerifyStage::new(verifier)
                .run(&layout, pre_retrieval, cot)
                .await?;
            log_report(&report);
        }

        Command::Judge { stage } => {
            let llm = LlmFactory::from_settings_with_model(&settings.llm, settings.judge.model.as_deref())?;
            tracing::info!(model = llm.model_name(), "Judge model initialized");
            let judge = Judge::new(llm, RetryPolicy::for_judge(&settings.judge));
            let report = JudgeStage::new(judge).run(&layout, stage).await?;
            log_report(&report);
        }

        Command::Score { stage } => {
            let report = ScoreStage::run(&layout, stage)?;
            print_score(stage, report.score);
        }
    }

    Ok(())
}

fn chat_model(settings: &Settings) -> anyhow::Result<Arc<dyn LlmBackend>> {
    let llm = LlmFactory::from_settings(&settings.llm)?;
    tracing::debug!(model = llm.model_name(), provider = ?settings.llm.provider, "LLM backend initialized");
    Ok(llm)
}

fn collection_store(settings: &Settings) -> anyhow::Result<Arc<QdrantCollectionStore>> {
    let embedder = OllamaEmbedder::new(OllamaEmbeddingConfig::from(&settings.embedding))?;
    let indexer = PassageIndexer::new(SentenceChunker::new(ChunkConfig::from(&settings.retrieval)));
    let store = QdrantCollectionStore::new(
        VectorStoreConfig::from(&settings.vector_store),
        Arc::new(embedder),
        indexer,
    )?;

    tracing::info!(
        endpoint = %settings.vector_store.endpoint,
        embedding_model = %settings.embedding.model,
        "Vector store initialized"
    );
    Ok(Arc::new(store))
}

fn log_report(report: &StageReport) {
    tracing::info!(
        stage = report.stage,
        variant = %report.variant,
        cases = report.cases,
        output = %report.output.display(),
        "Stage completed"
    );
}

fn print_score(variant: PipelineVariant, score: f64) {
    println!("Average score of LLM as judge for {}: {}", variant, score);
}
