//! Source dataset reader
//!
//! The dataset is one JSON object per line; a case's id is its 0-based
//! line number. Files ending in `.bz2` are decompressed while reading. An
//! optional sample file narrows the run to a fixed set of line numbers.

use std::collections::BTreeSet;
use std::fs::{self, File};
use std::io::{BufRead, BufReader, Lines};
use std::path::{Path, PathBuf};

use bzip2::read::MultiBzDecoder;
use rag_eval_core::{CaseId, SourceEntry};

use crate::PersistenceError;

/// Line numbers to keep: the first `limit` integers of `path`
pub fn read_sample_ids(path: impl AsRef<Path>, limit: usize) -> Result<BTreeSet<CaseId>, PersistenceError> {
    let path = path.as_ref();
    let content = fs::read_to_string(path).map_err(|e| PersistenceError::io(path, e))?;

    content
        .lines()
        .take(limit)
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(index, line)| {
            line.trim()
                .parse::<CaseId>()
                .map_err(|_| PersistenceError::InvalidSampleId {
                    line: index + 1,
                    value: line.to_string(),
                })
        })
        .collect()
}

/// Iterator over `(case_id, entry)` pairs of the source dataset
///
/// With a sample set, only those lines are parsed and iteration stops as
/// soon as every sampled id has been yielded.
pub struct SourceReader {
    path: PathBuf,
    lines: Lines<Box<dyn BufRead + Send>>,
    line_number: CaseId,
    remaining: Option<BTreeSet<CaseId>>,
}

impl SourceReader {
    pub fn open(path: impl AsRef<Path>, sample: Option<BTreeSet<CaseId>>) -> Result<Self, PersistenceError> {
        let path = path.as_ref().to_path_buf();
        let file = File::open(&path).map_err(|e| PersistenceError::io(&path, e))?;

        let reader: Box<dyn BufRead + Send> = if is_bzip2(&path) {
            Box::new(BufReader::new(MultiBzDecoder::new(file)))
        } else {
            Box::new(BufReader::new(file))
        };

        Ok(Self {
            lines: reader.lines(),
            path,
            line_number: 0,
            remaining: sample,
        })
    }
}

fn is_bzip2(path: &Path) -> bool {
    path.extension().is_some_and(|ext| ext.eq_ignore_ascii_case("bz2"))
}

impl Iterator for SourceReader {
    type Item = Result<(CaseId, SourceEntry), PersistenceError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if self.remaining.as_ref().is_some_and(|ids| ids.is_empty()) {
                return None;
            }

            let line = match self.lines.next()? {
                Ok(line) => line,
                Err(e) => return Some(Err(PersistenceError::io(&self.path, e))),
            };
            let case_id = self.line_number;
            self.line_number += 1;

            if let Some(ids) = self.remaining.as_mut() {
                if !ids.remove(&case_id) {
                    continue;
                }
            }

            return Some(
                serde_json::from_str(&line)
                    .map(|entry| (case_id, entry))
                    .map_err(|source| PersistenceError::Malformed {
                        path: self.path.clone(),
                        line: case_id as usize + 1,
                        source,
                    }),
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn entry(n: usize) -> String {
        format!(
            "{{\"interaction_id\":\"i{n}\",\"query\":\"q{n}\",\"answer\":\"a{n}\",\"search_results\":[]}}"
        )
    }

    fn dataset(dir: &Path, lines: usize) -> PathBuf {
        let path = dir.join("source.jsonl");
        let content: Vec<String> = (0..lines).map(entry).collect();
        fs::write(&path, content.join("\n") + "\n").unwrap();
        path
    }

    #[test]
    fn test_reads_all_without_sample() {
        let dir = tempdir().unwrap();
        let path = dataset(dir.path(), 3);

        let entries: Vec<_> = SourceReader::open(&path, None)
            .unwrap()
            .collect::<Result<_, _>>()
            .unwrap();
        assert_eq!(entries.len(), 3);
        assert_eq!(entries[2].0, 2);
        assert_eq!(entries[2].1.query, "q2");
    }

    #[test]
    fn test_sample_filters_and_stops_early() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("source.jsonl");
        // Line 3 is malformed but never reached
        fs::write(&path, format!("{}\n{}\n{}\nnot json\n", entry(0), entry(1), entry(2))).unwrap();

        let sample = BTreeSet::from([2, 0]);
        let ids: Vec<CaseId> = SourceReader::open(&path, Some(sample))
            .unwrap()
            .map(|r| r.unwrap().0)
            .collect();
        assert_eq!(ids, vec![0, 2]);
    }

    #[test]
    fn test_reads_bzip2_source() {
        use bzip2::write::BzEncoder;
        use bzip2::Compression;
        use std::io::Write;

        let dir = tempdir().unwrap();
        let path = dir.path().join("crag_task_3_dev_v4.jsonl.bz2");
        let mut encoder = BzEncoder::new(File::create(&path).unwrap(), Compression::default());
        for n in 0..3 {
            writeln!(encoder, "{}", entry(n)).unwrap();
        }
        encoder.finish().unwrap();

        let entries: Vec<_> = SourceReader::open(&path, Some(BTreeSet::from([1, 2])))
            .unwrap()
            .collect::<Result<_, _>>()
            .unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].0, 1);
        assert_eq!(entries[1].1.interaction_id, "i2");
    }

    #[test]
    fn test_sample_ids_limit() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("random_nums.txt");
        fs::write(&path, "5\n1\n\n9\n4\n").unwrap();

        let ids = read_sample_ids(&path, 4).unwrap();
        assert_eq!(ids, BTreeSet::from([1, 5, 9]));
    }

    #[test]
    fn test_invalid_sample_id() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("random_nums.txt");
        fs::write(&path, "5\nabc\n").unwrap();

        let err = read_sample_ids(&path, 300).unwrap_err();
        assert!(matches!(err, PersistenceError::InvalidSampleId { line: 2, .. }));
    }
}
