//! Persistence error types

use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PersistenceError {
    #[error("File not found: {0}")]
    NotFound(PathBuf),

    #[error("IO error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Malformed record at {path}:{line}: {source}")]
    Malformed {
        path: PathBuf,
        line: usize,
        #[source]
        source: serde_json::Error,
    },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Invalid sample id {value:?} at line {line}")]
    InvalidSampleId { line: usize, value: String },
}

impl PersistenceError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        let path = path.into();
        if source.kind() == std::io::ErrorKind::NotFound {
            PersistenceError::NotFound(path)
        } else {
            PersistenceError::Io { path, source }
        }
    }
}

impl From<PersistenceError> for rag_eval_core::Error {
    fn from(err: PersistenceError) -> Self {
        rag_eval_core::Error::Persistence(err.to_string())
    }
}
