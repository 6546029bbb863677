use std::io;
use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ReportError {
    #[error("file not found: {}", path.display())]
    NotFound { path: PathBuf },

    #[error("could not decode {} with any of the encodings [{}]", path.display(), tried.join(", "))]
    UnreadableEncoding { path: PathBuf, tried: Vec<String> },

    #[error("unknown encoding label '{0}'")]
    UnknownEncoding(String),

    #[error("missing column(s) [{}]; available columns: [{}]", missing.join(", "), available.join(", "))]
    MissingColumn {
        missing: Vec<String>,
        available: Vec<String>,
    },

    #[error("line {line}: expected {expected} fields, found {found}")]
    RaggedRow { line: u64, expected: usize, found: usize },

    #[error("{metric} is undefined for partition '{key}' (zero denominator)")]
    UndefinedRatio { metric: String, key: String },

    #[error("failed to write {}: {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("invalid report configuration: {0}")]
    Config(String),

    #[error(transparent)]
    Io(#[from] io::Error),

    #[error(transparent)]
    Csv(#[from] csv::Error),
}

impl ReportError {
    pub fn missing_column(missing: Vec<String>, available: &[String]) -> Self {
        ReportError::MissingColumn {
            missing,
            available: available.to_vec(),
        }
    }
}

pub type Result<T> = std::result::Result<T, ReportError>;
