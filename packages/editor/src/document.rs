//! # Layer Document Handle
//!
//! A `LayerDocument` is one named document (a layer file or the change log)
//! and its editing state. The text is the source of truth: mutations are
//! applied to the text in place and the parse tree is derived on demand.
//!
//! ## Lifecycle
//!
//! ```text
//! Load → Check → Edit → Save
//!   ↓      ↓       ↓      ↓
//! Store  Parse  Mutations Store
//! ```

use crate::{EditorError, Mutation, MutationResult};
use stagehand_common::DocumentStore;
use stagehand_parser::{parse, ParseResult, SceneDocument};
use tracing::debug;

/// Editable layer document
#[derive(Debug, Clone)]
pub struct LayerDocument {
    /// Document name within the store (`layers/site.usda`)
    pub path: String,

    /// Current version number (increments on each applied change)
    pub version: u64,

    source: String,
    dirty: bool,
}

impl LayerDocument {
    /// Create a document from source text; the text must parse
    pub fn from_source(path: impl Into<String>, source: impl Into<String>) -> Result<Self, EditorError> {
        let source = source.into();
        parse(&source)?;

        Ok(Self {
            path: path.into(),
            version: 0,
            source,
            dirty: false,
        })
    }

    /// Load a document from a store
    pub fn load(store: &dyn DocumentStore, path: &str) -> Result<Self, EditorError> {
        let source = store.read(path)?;
        Self::from_source(path, source)
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    /// Parse the current text
    pub fn parse(&self) -> ParseResult<SceneDocument> {
        parse(&self.source)
    }

    /// Apply a mutation; the version only advances when it succeeds
    pub fn apply(&mut self, mutation: &Mutation) -> Result<MutationResult, EditorError> {
        let result = mutation.apply(&self.source)?;
        self.replace_source(result.text.clone());
        debug!(
            document = %self.path,
            version = self.version,
            target = %mutation.target_path(),
            "applied mutation"
        );
        Ok(result)
    }

    /// Swap in new text produced elsewhere (log appends, reference retargeting)
    pub fn replace_source(&mut self, source: String) {
        if source != self.source {
            self.source = source;
            self.version += 1;
            self.dirty = true;
        }
    }

    /// Check if document has unsaved changes
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Write the document back to its store
    pub fn save(&mut self, store: &mut dyn DocumentStore) -> Result<(), EditorError> {
        store.write(&self.path, &self.source)?;
        self.dirty = false;
        Ok(())
    }
}
