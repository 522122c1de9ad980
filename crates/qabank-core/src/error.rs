//! Error types for qabank

use std::fmt;

use thiserror::Error;

/// Position and cause of an ingestion record that could not be turned into an entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MalformedRecord {
    /// File path or other label of the input the record came from
    pub source: String,
    /// 1-based record number within the source
    pub record: usize,
    /// 1-based line on which the record starts
    pub line: usize,
    pub reason: String,
}

impl fmt::Display for MalformedRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} record #{} (line {}): {}",
            self.source, self.record, self.line, self.reason
        )
    }
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Malformed record: {0}")]
    MalformedRecord(MalformedRecord),

    #[error("Store is empty")]
    EmptyStore,

    #[error("Invalid entry: {0}")]
    InvalidEntry(String),

    #[error("Invalid tag: {0:?}")]
    InvalidTag(String),

    #[error("Corrupt log at line {line}: {reason}")]
    CorruptLog { line: usize, reason: String },

    #[error("Tag index out of sync with store: {0}")]
    IndexMismatch(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    pub fn not_found(what: impl fmt::Display) -> Self {
        Self::NotFound(what.to_string())
    }

    pub fn corrupt_log(line: usize, reason: impl Into<String>) -> Self {
        Self::CorruptLog { line, reason: reason.into() }
    }
}

impl From<MalformedRecord> for Error {
    fn from(record: MalformedRecord) -> Self {
        Self::MalformedRecord(record)
    }
}

pub type Result<T> = std::result::Result<T, Error>;
