use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use stagehand_editor::ChangeKind;
use stagehand_parser::ast::Prim;

/// One immutable commit in the history graph
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogEntry {
    pub id: String,
    /// Monotonic entry number; names the `Log_N` block
    pub entry: u64,
    pub timestamp: DateTime<Utc>,
    pub kind: ChangeKind,
    pub user: String,
    pub source_status: Option<String>,
    pub target_status: Option<String>,
    /// Affected paths; for renames `[old, new]`
    pub paths: Vec<String>,
    pub parent: Option<String>,
    /// Target prim (with children) after the change
    pub snapshot: Option<Prim>,
    pub message: Option<String>,
}

impl LogEntry {
    pub fn is_root(&self) -> bool {
        self.parent.is_none()
    }
}

/// Fields supplied by the caller when appending; the graph fills the rest
#[derive(Debug, Clone, PartialEq)]
pub struct NewEntry {
    pub kind: ChangeKind,
    pub user: String,
    pub source_status: Option<String>,
    pub target_status: Option<String>,
    pub paths: Vec<String>,
    pub snapshot: Option<Prim>,
    pub message: Option<String>,
}

impl NewEntry {
    pub fn new(kind: ChangeKind, user: impl Into<String>) -> Self {
        Self {
            kind,
            user: user.into(),
            source_status: None,
            target_status: None,
            paths: Vec::new(),
            snapshot: None,
            message: None,
        }
    }

    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.paths.push(path.into());
        self
    }

    pub fn with_paths(mut self, paths: impl IntoIterator<Item = String>) -> Self {
        self.paths.extend(paths);
        self
    }

    pub fn with_statuses(mut self, source: Option<String>, target: Option<String>) -> Self {
        self.source_status = source;
        self.target_status = target;
        self
    }

    pub fn with_snapshot(mut self, snapshot: Prim) -> Self {
        self.snapshot = Some(snapshot);
        self
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }
}
