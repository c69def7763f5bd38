use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Coarse classification shared by every error in the workspace.
///
/// Callers branch on the kind; the concrete error carries the message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ErrorKind {
    /// Bad caller input (missing/invalid path, name, key). Nothing was mutated.
    Validation,
    /// Target document or layer is missing or unwritable.
    File,
    /// Text outside the supported grammar.
    Parse,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorKind::Validation => write!(f, "ValidationError"),
            ErrorKind::File => write!(f, "FileError"),
            ErrorKind::Parse => write!(f, "ParseError"),
        }
    }
}

/// Implemented by every crate error so rejections always yield a structured kind.
pub trait Classify {
    fn kind(&self) -> ErrorKind;
}

/// Common error type for document storage
#[derive(Error, Debug)]
pub enum CommonError {
    #[error("Document not found: {0}")]
    DocumentNotFound(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Generic error: {0}")]
    Generic(String),
}

impl Classify for CommonError {
    fn kind(&self) -> ErrorKind {
        match self {
            CommonError::DocumentNotFound(_) | CommonError::Io(_) => ErrorKind::File,
            CommonError::Generic(_) => ErrorKind::Validation,
        }
    }
}

impl From<String> for CommonError {
    fn from(s: String) -> Self {
        CommonError::Generic(s)
    }
}

impl From<&str> for CommonError {
    fn from(s: &str) -> Self {
        CommonError::Generic(s.to_string())
    }
}
