use stagehand_common::{Classify, ErrorKind};
use stagehand_parser::ParseError;
use thiserror::Error;

/// Problems met while composing; composition degrades instead of failing
#[derive(Error, Debug, Clone, PartialEq)]
pub enum StageError {
    #[error("Layer '{layer}' could not be parsed: {source}")]
    LayerParse {
        layer: String,
        #[source]
        source: ParseError,
    },

    #[error("Referenced document not found: {document} (from {referenced_by})")]
    DocumentNotFound {
        document: String,
        referenced_by: String,
    },

    #[error("Referent {path} not found in {document}")]
    ReferentNotFound { document: String, path: String },

    #[error("Reference cycle through {document}{path}")]
    ReferenceCycle { document: String, path: String },
}

impl Classify for StageError {
    fn kind(&self) -> ErrorKind {
        match self {
            StageError::LayerParse { .. } => ErrorKind::Parse,
            StageError::DocumentNotFound { .. } => ErrorKind::File,
            StageError::ReferentNotFound { .. } | StageError::ReferenceCycle { .. } => {
                ErrorKind::Validation
            }
        }
    }
}
