//! # Stagehand Editor
//!
//! Editing engine for layer documents.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │ parser: text → prim forest, block outline   │
//! └─────────────────────────────────────────────┘
//!                     ↓
//! ┌─────────────────────────────────────────────┐
//! │ editor: in-place text mutations             │
//! │  - set/rename/insert/remove on raw text     │
//! │  - document versions and dirty tracking     │
//! │  - staging of uncommitted changes           │
//! └─────────────────────────────────────────────┘
//!                     ↓
//! ┌─────────────────────────────────────────────┐
//! │ stage: layers → composed hierarchy          │
//! └─────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```rust,ignore
//! use stagehand_editor::{LayerDocument, Mutation};
//!
//! let mut doc = LayerDocument::load(&store, "layers/site.usda")?;
//! doc.apply(&Mutation::RenamePrim {
//!     path: "/Site/Old".to_string(),
//!     new_name: "New".to_string(),
//! })?;
//! doc.save(&mut store)?;
//! ```

mod document;
mod errors;
mod mutations;
pub mod staging;
pub mod text_edit;

pub use document::LayerDocument;
pub use errors::{EditError, EditorError};
pub use mutations::{Mutation, MutationResult};
pub use staging::{
    reconcile_placeholder, ChangeKind, ChangePayload, PlaceholderDecision, StagedChange,
    StagingArea,
};
pub use text_edit::{
    insert_prim, remove_prim, rename_prim, retarget_references, set_property, EditOutcome,
    RenameOutcome,
};
