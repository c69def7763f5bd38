use stagehand_common::{Classify, CommonError, ErrorKind};
use stagehand_editor::{EditError, EditorError};
use stagehand_governance::{GuardError, PromotionError};
use stagehand_history::HistoryError;
use stagehand_parser::ParseError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum WorkspaceError {
    #[error(transparent)]
    Edit(#[from] EditError),

    #[error(transparent)]
    Editor(#[from] EditorError),

    #[error(transparent)]
    Guard(#[from] GuardError),

    #[error(transparent)]
    Promotion(#[from] PromotionError),

    #[error(transparent)]
    History(#[from] HistoryError),

    #[error(transparent)]
    Common(#[from] CommonError),

    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error("Invalid project config: {0}")]
    Config(#[from] serde_json::Error),

    #[error("Unknown user: {0}")]
    UnknownUser(String),

    #[error("No current user selected")]
    NoCurrentUser,

    #[error("Layer not found: {0}")]
    LayerNotFound(String),

    #[error("Prim not found: {0}")]
    PrimNotFound(String),

    #[error("{0} is not authored in a layer document")]
    NoSourceLayer(String),

    #[error("Permission denied: {0}")]
    PermissionDenied(String),
}

impl Classify for WorkspaceError {
    fn kind(&self) -> ErrorKind {
        match self {
            WorkspaceError::Edit(e) => e.kind(),
            WorkspaceError::Editor(e) => e.kind(),
            WorkspaceError::Guard(e) => e.kind(),
            WorkspaceError::Promotion(e) => e.kind(),
            WorkspaceError::History(e) => e.kind(),
            WorkspaceError::Common(e) => e.kind(),
            WorkspaceError::Parse(_) | WorkspaceError::Config(_) => ErrorKind::Parse,
            WorkspaceError::LayerNotFound(_) => ErrorKind::File,
            WorkspaceError::UnknownUser(_)
            | WorkspaceError::NoCurrentUser
            | WorkspaceError::PrimNotFound(_)
            | WorkspaceError::NoSourceLayer(_)
            | WorkspaceError::PermissionDenied(_) => ErrorKind::Validation,
        }
    }
}

pub type WorkspaceResult<T> = Result<T, WorkspaceError>;
