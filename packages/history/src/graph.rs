//! # History Graph
//!
//! Append-only DAG of log entries linked by parent ids.
//!
//! Entries are kept in insertion order with an id index. `head` is where the
//! next entry attaches; moving it with [`History::checkout`] starts a branch.
//! Entries are never changed or removed once recorded.

use crate::entry::{LogEntry, NewEntry};
use crate::error::{HistoryError, HistoryResult};
use chrono::Utc;
use std::collections::{HashMap, HashSet};
use tracing::info;
use uuid::Uuid;

#[derive(Debug, Clone, Default)]
pub struct History {
    entries: Vec<LogEntry>,
    index: HashMap<String, usize>,
    roots: Vec<String>,
    head: Option<String>,
    /// Highest entry number handed out so far
    counter: u64,
}

impl History {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a new entry on top of the current head
    pub fn append_entry(&mut self, new: NewEntry) -> LogEntry {
        self.counter += 1;
        let entry = LogEntry {
            id: Uuid::new_v4().to_string(),
            entry: self.counter,
            timestamp: Utc::now(),
            kind: new.kind,
            user: new.user,
            source_status: new.source_status,
            target_status: new.target_status,
            paths: new.paths,
            parent: self.head.clone(),
            snapshot: new.snapshot,
            message: new.message,
        };

        info!(
            id = %entry.id,
            entry = entry.entry,
            kind = %entry.kind,
            parent = ?entry.parent,
            "History entry appended"
        );
        self.insert(entry.clone());
        entry
    }

    /// Record an entry read back from storage, keeping its id and number
    pub fn insert_loaded(&mut self, entry: LogEntry) -> HistoryResult<()> {
        if self.index.contains_key(&entry.id) {
            return Err(HistoryError::DuplicateEntry { id: entry.id });
        }
        self.counter = self.counter.max(entry.entry);
        self.insert(entry);
        Ok(())
    }

    fn insert(&mut self, entry: LogEntry) {
        if entry.parent.is_none() {
            self.roots.push(entry.id.clone());
        }
        self.head = Some(entry.id.clone());
        self.index.insert(entry.id.clone(), self.entries.len());
        self.entries.push(entry);
    }

    /// Move the head; the next append branches from `id`
    pub fn checkout(&mut self, id: &str) -> HistoryResult<()> {
        if !self.index.contains_key(id) {
            return Err(HistoryError::UnknownEntry(id.to_string()));
        }
        self.head = Some(id.to_string());
        Ok(())
    }

    pub fn get(&self, id: &str) -> Option<&LogEntry> {
        self.index.get(id).map(|&i| &self.entries[i])
    }

    pub fn head(&self) -> Option<&LogEntry> {
        self.head.as_deref().and_then(|id| self.get(id))
    }

    pub fn roots(&self) -> &[String] {
        &self.roots
    }

    /// Entries in insertion order
    pub fn entries(&self) -> &[LogEntry] {
        &self.entries
    }

    pub fn children_of(&self, id: &str) -> Vec<&LogEntry> {
        self.entries
            .iter()
            .filter(|e| e.parent.as_deref() == Some(id))
            .collect()
    }

    /// Entries from the root down to `id`, inclusive
    pub fn get_path(&self, id: &str) -> HistoryResult<Vec<&LogEntry>> {
        let mut path = Vec::new();
        let mut seen = HashSet::new();
        let mut current = self
            .get(id)
            .ok_or_else(|| HistoryError::UnknownEntry(id.to_string()))?;

        loop {
            if !seen.insert(current.id.as_str()) {
                return Err(HistoryError::BrokenChain {
                    id: id.to_string(),
                    missing: current.id.clone(),
                });
            }
            path.push(current);
            match &current.parent {
                None => break,
                Some(parent) => {
                    current = self.get(parent).ok_or_else(|| HistoryError::BrokenChain {
                        id: id.to_string(),
                        missing: parent.clone(),
                    })?;
                }
            }
        }

        path.reverse();
        Ok(path)
    }

    /// Next entry number to be handed out
    pub fn next_entry_number(&self) -> u64 {
        self.counter + 1
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stagehand_editor::ChangeKind;

    fn entry(kind: ChangeKind) -> NewEntry {
        NewEntry::new(kind, "ana").with_path("/A")
    }

    #[test]
    fn test_linear_append() {
        let mut history = History::new();
        let c1 = history.append_entry(entry(ChangeKind::AddPrim));
        let c2 = history.append_entry(entry(ChangeKind::SetProperty));

        assert_eq!(c1.entry, 1);
        assert_eq!(c2.entry, 2);
        assert!(c1.is_root());
        assert_eq!(c2.parent.as_deref(), Some(c1.id.as_str()));
        assert_eq!(history.roots(), [c1.id.clone()]);
        assert_eq!(history.head().map(|e| e.id.as_str()), Some(c2.id.as_str()));

        let path: Vec<_> = history.get_path(&c2.id).unwrap().iter().map(|e| e.entry).collect();
        assert_eq!(path, vec![1, 2]);
    }

    #[test]
    fn test_checkout_branches() {
        let mut history = History::new();
        let c1 = history.append_entry(entry(ChangeKind::AddPrim));
        let _c2 = history.append_entry(entry(ChangeKind::SetProperty));

        history.checkout(&c1.id).unwrap();
        let c3 = history.append_entry(entry(ChangeKind::Promote));
        assert_eq!(c3.parent.as_deref(), Some(c1.id.as_str()));
        assert_eq!(c3.entry, 3);
        assert_eq!(history.children_of(&c1.id).len(), 2);

        assert!(matches!(
            history.checkout("nope"),
            Err(HistoryError::UnknownEntry(_))
        ));
    }

    #[test]
    fn test_loaded_entries_keep_numbers() {
        let mut source = History::new();
        let c1 = source.append_entry(entry(ChangeKind::AddPrim));
        let mut c7 = source.append_entry(entry(ChangeKind::SetProperty));
        c7.entry = 7;

        let mut history = History::new();
        history.insert_loaded(c1.clone()).unwrap();
        history.insert_loaded(c7.clone()).unwrap();
        assert_eq!(history.next_entry_number(), 8);
        assert!(matches!(
            history.insert_loaded(c1),
            Err(HistoryError::DuplicateEntry { .. })
        ));

        let next = history.append_entry(entry(ChangeKind::Demote));
        assert_eq!(next.entry, 8);
        assert_eq!(next.parent.as_deref(), Some(c7.id.as_str()));
    }

    #[test]
    fn test_broken_chain() {
        let mut source = History::new();
        let _c1 = source.append_entry(entry(ChangeKind::AddPrim));
        let c2 = source.append_entry(entry(ChangeKind::SetProperty));

        let mut history = History::new();
        history.insert_loaded(c2.clone()).unwrap();
        assert!(matches!(
            history.get_path(&c2.id),
            Err(HistoryError::BrokenChain { .. })
        ));
    }
}
