//! Error types for the editor

use stagehand_common::{Classify, CommonError, ErrorKind};
use stagehand_parser::ParseError;
use thiserror::Error;

/// Rejected text edit; the document is left untouched
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EditError {
    #[error("Prim not found: {0}")]
    PrimNotFound(String),

    #[error("Parent not found: {0}")]
    ParentNotFound(String),

    #[error("Invalid prim name: '{0}'")]
    InvalidName(String),

    #[error("Invalid property name: '{0}'")]
    InvalidPropertyName(String),

    #[error("'{name}' already exists under {parent}")]
    DuplicateSibling { parent: String, name: String },

    #[error("Invalid value for '{name}': {message}")]
    InvalidValue { name: String, message: String },

    #[error("Invalid prim block: {0}")]
    InvalidBlock(String),

    #[error("Parse error: {0}")]
    Parse(#[from] ParseError),
}

impl Classify for EditError {
    fn kind(&self) -> ErrorKind {
        match self {
            EditError::Parse(_) => ErrorKind::Parse,
            _ => ErrorKind::Validation,
        }
    }
}

#[derive(Error, Debug)]
pub enum EditorError {
    #[error("Parse error: {0}")]
    Parse(#[from] ParseError),

    #[error("Edit error: {0}")]
    Edit(#[from] EditError),

    #[error("File error: {0}")]
    File(#[from] CommonError),
}

impl Classify for EditorError {
    fn kind(&self) -> ErrorKind {
        match self {
            EditorError::Parse(_) => ErrorKind::Parse,
            EditorError::Edit(e) => e.kind(),
            EditorError::File(e) => e.kind(),
        }
    }
}
