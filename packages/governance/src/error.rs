use stagehand_common::{Classify, ErrorKind};
use stagehand_stage::LayerStatus;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum GuardError {
    #[error("Prim not found in composed hierarchy: {0}")]
    PrimNotFound(String),

    #[error("{user} may not write {property} on {path}: {reason}")]
    PermissionDenied {
        user: String,
        path: String,
        property: String,
        reason: String,
    },

    #[error("Only a Project Manager may override {property} on {path} (requested by {user})")]
    OverrideNotPermitted {
        user: String,
        path: String,
        property: String,
    },
}

impl Classify for GuardError {
    fn kind(&self) -> ErrorKind {
        ErrorKind::Validation
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum PromotionError {
    #[error("Cannot promote {subject}: already {status}")]
    CannotPromote { subject: String, status: LayerStatus },

    #[error("Cannot demote {subject}: already {status}")]
    CannotDemote { subject: String, status: LayerStatus },

    #[error("Layer not found: {0}")]
    LayerNotFound(String),

    #[error("Prim not found: {0}")]
    PrimNotFound(String),

    #[error("Prim {0} has no status")]
    MissingStatus(String),

    #[error("Selected prims do not share one status: {}", describe(.0))]
    MixedStatus(Vec<(String, LayerStatus)>),

    #[error("Nothing selected")]
    EmptySelection,
}

fn describe(statuses: &[(String, LayerStatus)]) -> String {
    statuses
        .iter()
        .map(|(path, status)| format!("{} is {}", path, status))
        .collect::<Vec<_>>()
        .join(", ")
}

impl Classify for PromotionError {
    fn kind(&self) -> ErrorKind {
        ErrorKind::Validation
    }
}
