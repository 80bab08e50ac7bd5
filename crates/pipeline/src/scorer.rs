//! Accuracy aggregation over judge results

use std::path::Path;

use serde::Deserialize;

use rag_eval_core::Result;
use rag_eval_persistence::read_records_lenient;

/// The part of a judge result that scoring reads; `id` is optional
#[derive(Debug, Deserialize)]
struct Verdict {
    accuracy: bool,
}

/// Summary of one judge results file
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoreReport {
    /// Fraction of accurate verdicts, 0 when there are none
    pub score: f64,
    pub accurate: usize,
    pub total: usize,
    /// Malformed lines left out of `total`
    pub skipped: usize,
}

/// Fraction of accurate verdicts; 0 for none
pub fn score(verdicts: impl IntoIterator<Item = bool>) -> f64 {
    let (accurate, total) = verdicts
        .into_iter()
        .fold((0usize, 0usize), |(accurate, total), v| (accurate + v as usize, total + 1));
    if total == 0 {
        return 0.0;
    }
    accurate as f64 / total as f64
}

/// Score a judge results file, skipping malformed lines
pub fn score_file(path: impl AsRef<Path>) -> Result<ScoreReport> {
    let (verdicts, skipped) = read_records_lenient::<Verdict>(path)?;
    let accuracy: Vec<bool> = verdicts.iter().map(|v| v.accuracy).collect();

    Ok(ScoreReport {
        score: score(accuracy.iter().copied()),
        accurate: accuracy.iter().filter(|a| **a).count(),
        total: accuracy.len(),
        skipped,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_score() {
        assert!((score([true, true, false]) - 2.0 / 3.0).abs() < 1e-12);
        assert_eq!(score(Vec::<bool>::new()), 0.0);
    }

    #[test]
    fn test_score_file_without_ids() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("judge_results.jsonl");
        std::fs::write(&path, "{\"accuracy\":true}\n{\"accuracy\":true}\n{\"accuracy\":false}\n").unwrap();

        let report = score_file(&path).unwrap();
        assert_eq!(report.total, 3);
        assert_eq!(report.accurate, 2);
        assert_eq!(report.skipped, 0);
        assert!((report.score - 2.0 / 3.0).abs() < 1e-12);
    }

    #[test]
    fn test_score_file_skips_malformed() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("judge_results.jsonl");
        std::fs::write(
            &path,
            "{\"id\":0,\"accuracy\":true}\n{oops\n{\"id\":1,\"accuracy\":false}\n{\"id\":2}\n",
        )
        .unwrap();

        let report = score_file(&path).unwrap();
        assert_eq!(report.total, 2);
        assert_eq!(report.accurate, 1);
        assert_eq!(report.skipped, 2);
        assert_eq!(report.score, 0.5);
    }

    #[test]
    fn test_score_empty_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("judge_results.jsonl");
        std::fs::write(&path, "").unwrap();
        assert_eq!(score_file(&path).unwrap().score, 0.0);
    }
}
