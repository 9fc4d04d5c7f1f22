use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Error type for input loading, configuration, and scan control failures.
#[derive(Debug, Error)]
pub enum EvalError {
    /// An input file or table is absent or empty.
    #[error("required input '{}' is missing: {reason}", path.display())]
    MissingInput {
        /// File path or in-memory label.
        path: PathBuf,
        /// What was missing.
        reason: String,
    },
    /// A line could not be parsed.
    #[error("malformed record in '{}' at line {line}: {reason}", path.display())]
    MalformedRecord {
        /// File being scanned.
        path: PathBuf,
        /// 1-based line number.
        line: usize,
        /// Why the line was rejected.
        reason: String,
    },
    /// Parameters or supplied tables do not fit the run.
    #[error("configuration error: {0}")]
    Configuration(String),
    /// The scan was cancelled or hit its deadline.
    #[error("scan cancelled: {reason}")]
    Cancelled {
        /// Cancellation or timeout.
        reason: String,
    },
    /// Underlying IO failure.
    #[error(transparent)]
    Io(#[from] io::Error),
}

impl EvalError {
    /// `MissingInput` for `input`, which may be a path or an in-memory label.
    pub fn missing(input: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        EvalError::MissingInput {
            path: input.into(),
            reason: reason.into(),
        }
    }
}
