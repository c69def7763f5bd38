//! # Stagehand Governance
//!
//! Who may write what, and how statuses move.
//!
//! - [`guard`]: role and ownership permissions, cross-owner conflicts and the
//!   conflict-resolution continuation
//! - [`promotion`]: the `WIP ⇄ Shared ⇄ Published` chain at layer and object
//!   granularity

pub mod error;
pub mod guard;
pub mod promotion;
pub mod role;

pub use error::{GuardError, PromotionError};
pub use guard::{
    check_layer_permission, check_permission, detect_conflict, request_write, ApprovedWrite,
    Conflict, ConflictingLayer, PendingWrite, PermissionDecision, Resolution, WriteIntent,
    WriteRequest,
};
pub use promotion::{
    demote, plan_layers, plan_objects, promote, set_administrative, Direction, LayerBatch,
    LayerTransition, ObjectTransition,
};
pub use role::{Role, User};
