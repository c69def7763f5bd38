use serde::Serialize;
use stagehand_common::Warnings;

/// What one workspace operation changed
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangeSet {
    /// Composed paths the caller should re-query
    pub affected_paths: Vec<String>,
    /// (old, new) composed paths after a rename
    pub renamed: Vec<(String, String)>,
    /// Documents whose text changed
    pub documents: Vec<String>,
    pub warnings: Warnings,
}

impl ChangeSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn touch_path(&mut self, path: impl Into<String>) {
        let path = path.into();
        if !self.affected_paths.contains(&path) {
            self.affected_paths.push(path);
        }
    }

    pub fn touch_document(&mut self, document: impl Into<String>) {
        let document = document.into();
        if !self.documents.contains(&document) {
            self.documents.push(document);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.affected_paths.is_empty() && self.documents.is_empty() && self.warnings.is_empty()
    }
}

/// Notified after every successful state change
pub trait StateObserver {
    fn on_change(&mut self, change: &ChangeSet);
}

impl<F> StateObserver for F
where
    F: FnMut(&ChangeSet),
{
    fn on_change(&mut self, change: &ChangeSet) {
        self(change)
    }
}
