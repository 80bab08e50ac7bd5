//! Line-delimited JSON record streams
//!
//! Writers truncate on open and flush after every record, so an
//! interrupted run leaves a valid prefix.

use std::fs::{self, File};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::marker::PhantomData;
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::PersistenceError;

/// Append-only writer for one record type
pub struct RecordWriter<T> {
    path: PathBuf,
    writer: BufWriter<File>,
    written: usize,
    _record: PhantomData<fn(&T)>,
}

impl<T: Serialize> RecordWriter<T> {
    /// Create (or truncate) `path`, creating parent directories
    pub fn create(path: impl AsRef<Path>) -> Result<Self, PersistenceError> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| PersistenceError::io(parent, e))?;
        }

        let file = File::create(&path).map_err(|e| PersistenceError::io(&path, e))?;
        tracing::debug!(path = %path.display(), "Opened record stream");

        Ok(Self {
            writer: BufWriter::new(file),
            path,
            written: 0,
            _record: PhantomData,
        })
    }

    /// Serialize one record as a line and flush it
    pub fn write(&mut self, record: &T) -> Result<(), PersistenceError> {
        let line = serde_json::to_string(record)?;
        self.writer
            .write_all(line.as_bytes())
            .and_then(|_| self.writer.write_all(b"\n"))
            .and_then(|_| self.writer.flush())
            .map_err(|e| PersistenceError::io(&self.path, e))?;
        self.written += 1;
        Ok(())
    }

    pub fn written(&self) -> usize {
        self.written
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Read every record; a malformed line is an error
pub fn read_records<T: DeserializeOwned>(path: impl AsRef<Path>) -> Result<Vec<T>, PersistenceError> {
    let path = path.as_ref();
    let mut records = Vec::new();

    for (index, line) in lines(path)?.enumerate() {
        let line = line.map_err(|e| PersistenceError::io(path, e))?;
        if line.trim().is_empty() {
            continue;
        }
        let record = serde_json::from_str(&line).map_err(|source| PersistenceError::Malformed {
            path: path.to_path_buf(),
            line: index + 1,
            source,
        })?;
        records.push(record);
    }

    Ok(records)
}

/// Records that parse, plus the number of skipped lines
pub fn read_records_lenient<T: DeserializeOwned>(
    path: impl AsRef<Path>,
) -> Result<(Vec<T>, usize), PersistenceError> {
    let path = path.as_ref();
    let mut records = Vec::new();
    let mut skipped = 0;

    for (index, line) in lines(path)?.enumerate() {
        let line = line.map_err(|e| PersistenceError::io(path, e))?;
        if line.trim().is_empty() {
            continue;
        }
        match serde_json::from_str(&line) {
            Ok(record) => records.push(record),
            Err(e) => {
                tracing::warn!(path = %path.display(), line = index + 1, error = %e, "Skipping malformed record");
                skipped += 1;
            }
        }
    }

    Ok((records, skipped))
}

fn lines(path: &Path) -> Result<std::io::Lines<BufReader<File>>, PersistenceError> {
    let file = File::open(path).map_err(|e| PersistenceError::io(path, e))?;
    Ok(BufReader::new(file).lines())
}
