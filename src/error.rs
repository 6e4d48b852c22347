use std::path::PathBuf;

use thiserror::Error;

use crate::parser::sections::Label;

/// Per-document failures. Each one turns into a rejection record and the
/// batch moves on.
#[derive(Debug, Error)]
pub enum DocumentError {
    #[error("No {0} section")]
    MissingRequiredSection(Label),

    #[error("parse failure: {0}")]
    ParseFailure(String),

    #[error("not valid UTF-8: {0}")]
    Encoding(#[from] std::string::FromUtf8Error),

    #[error("unreadable: {0}")]
    Unreadable(#[from] std::io::Error),
}

/// Failures that abort a whole batch run.
#[derive(Debug, Error)]
pub enum RunError {
    #[error("cannot read input directory {}: {source}", .path.display())]
    InputDir {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to write {}: {source}", .path.display())]
    OutputWriteFailure {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to serialize output: {0}")]
    Serialize(#[from] serde_json::Error),
}

#[derive(Debug, Error)]
pub enum DatasetError {
    #[error("cannot read {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("{} is not a training-pair file: {source}", .path.display())]
    Format {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("No training data received")]
    Empty,

    #[error("pair {index} has an empty input")]
    EmptyInput { index: usize },
}
