use stagehand_common::{Classify, ErrorKind};
use stagehand_parser::ParseError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum HistoryError {
    #[error("Unknown log entry: {0}")]
    UnknownEntry(String),

    #[error("History chain of {id} is broken at {missing}")]
    BrokenChain { id: String, missing: String },

    #[error("Log entry {id} is already recorded")]
    DuplicateEntry { id: String },

    #[error("{block} is missing field '{field}'")]
    MissingField { block: String, field: String },

    #[error("{block} has an invalid '{field}': {message}")]
    InvalidField {
        block: String,
        field: String,
        message: String,
    },

    #[error("Snapshot encoding failed: {0}")]
    Snapshot(#[from] serde_json::Error),

    #[error(transparent)]
    Parse(#[from] ParseError),
}

impl Classify for HistoryError {
    fn kind(&self) -> ErrorKind {
        match self {
            HistoryError::UnknownEntry(_)
            | HistoryError::BrokenChain { .. }
            | HistoryError::DuplicateEntry { .. } => ErrorKind::Validation,
            HistoryError::MissingField { .. }
            | HistoryError::InvalidField { .. }
            | HistoryError::Snapshot(_)
            | HistoryError::Parse(_) => ErrorKind::Parse,
        }
    }
}

pub type HistoryResult<T> = Result<T, HistoryError>;
