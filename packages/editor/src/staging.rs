//! Uncommitted changes waiting for the next commit
//!
//! Every successful edit queues one [`StagedChange`]. Commit drains the
//! queue into the history graph.

use serde::{Deserialize, Serialize};
use stagehand_common::{ErrorKind, Warning};
use stagehand_parser::ast::{Prim, PropertyValue, ENTITY_TYPE_KEY};
use std::fmt;
use std::str::FromStr;

/// Properties that only exist to draw a placeholder
pub const PLACEHOLDER_MARKERS: [&str; 3] = ["isPlaceholder", "placeholderColor", "displayColor"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ChangeKind {
    AddPrim,
    RemovePrim,
    RenamePrim,
    SetProperty,
    Promote,
    Demote,
    SetStatus,
}

impl ChangeKind {
    /// Name written to the `type` field of a log entry
    pub fn as_str(&self) -> &'static str {
        match self {
            ChangeKind::AddPrim => "add",
            ChangeKind::RemovePrim => "remove",
            ChangeKind::RenamePrim => "rename",
            ChangeKind::SetProperty => "setProperty",
            ChangeKind::Promote => "promote",
            ChangeKind::Demote => "demote",
            ChangeKind::SetStatus => "setStatus",
        }
    }
}

impl fmt::Display for ChangeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ChangeKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "add" => Ok(ChangeKind::AddPrim),
            "remove" => Ok(ChangeKind::RemovePrim),
            "rename" => Ok(ChangeKind::RenamePrim),
            "setProperty" => Ok(ChangeKind::SetProperty),
            "promote" => Ok(ChangeKind::Promote),
            "demote" => Ok(ChangeKind::Demote),
            "setStatus" => Ok(ChangeKind::SetStatus),
            other => Err(format!("unknown change kind '{}'", other)),
        }
    }
}

/// Details carried by a staged change
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChangePayload {
    /// Layer file the change was written to
    pub layer: Option<String>,
    /// Every path the change touched
    pub paths: Vec<String>,
    pub property: Option<String>,
    pub value: Option<PropertyValue>,
    pub source_status: Option<String>,
    pub target_status: Option<String>,
    /// Path before a rename
    pub previous_path: Option<String>,
    /// State of the target prim after the change
    pub snapshot: Option<Prim>,
    /// A Project Manager overwrote another owner's property
    pub overridden: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StagedChange {
    pub kind: ChangeKind,
    pub target_path: String,
    pub payload: ChangePayload,
}

impl StagedChange {
    pub fn new(kind: ChangeKind, target_path: impl Into<String>) -> Self {
        Self {
            kind,
            target_path: target_path.into(),
            payload: ChangePayload::default(),
        }
    }

    pub fn with_payload(mut self, payload: ChangePayload) -> Self {
        self.payload = payload;
        self
    }
}

/// Ordered queue of uncommitted changes
#[derive(Debug, Clone, Default)]
pub struct StagingArea {
    changes: Vec<StagedChange>,
}

impl StagingArea {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stage(&mut self, change: StagedChange) {
        self.changes.push(change);
    }

    pub fn changes(&self) -> &[StagedChange] {
        &self.changes
    }

    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    pub fn len(&self) -> usize {
        self.changes.len()
    }

    /// Take every staged change, leaving the area empty
    pub fn drain(&mut self) -> Vec<StagedChange> {
        std::mem::take(&mut self.changes)
    }
}

/// What to do with a prim staged at a path that may already be occupied
#[derive(Debug, Clone, PartialEq)]
pub enum PlaceholderDecision {
    /// Nothing special at the path; insert as given
    Insert(Prim),
    /// A Real Element takes over an existing placeholder
    Replace(Prim),
    /// A placeholder may not cover a Real Element
    Skip(Warning),
}

/// Apply the placeholder rules to `incoming` against what exists at its path
pub fn reconcile_placeholder(existing: Option<&Prim>, incoming: Prim) -> PlaceholderDecision {
    let existing = match existing {
        Some(existing) => existing,
        None => return PlaceholderDecision::Insert(incoming),
    };

    match (existing.is_placeholder(), incoming.is_placeholder()) {
        (false, true) => PlaceholderDecision::Skip(
            Warning::new(
                ErrorKind::Validation,
                format!(
                    "placeholder not staged: '{}' already holds a real element",
                    existing.path
                ),
            )
            .about(existing.path.clone()),
        ),
        (true, false) => {
            let mut merged = incoming;
            for property in &existing.properties {
                if !merged.has_property(&property.name) {
                    merged.properties.push(property.clone());
                }
            }
            for child in &existing.children {
                if merged.child(&child.name).is_none() {
                    merged.children.push(child.clone());
                }
            }
            strip_placeholder_markers(&mut merged);
            PlaceholderDecision::Replace(merged)
        }
        _ => PlaceholderDecision::Insert(incoming),
    }
}

/// Remove the visual placeholder markers from a prim
pub fn strip_placeholder_markers(prim: &mut Prim) {
    prim.properties
        .retain(|p| !PLACEHOLDER_MARKERS.contains(&p.name.as_str()));
    if prim.is_placeholder() {
        prim.remove_property(ENTITY_TYPE_KEY);
    }
}
