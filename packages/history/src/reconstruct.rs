//! # Point-in-time Reconstruction
//!
//! Replays the entries from the root to a commit, folding their prim
//! snapshots into a flat path → prim set, then relinks the set into a
//! forest by path prefix.
//!
//! Entries written without a snapshot cannot be replayed faithfully. For
//! those the *current* prim at each affected path is used instead and the
//! path is reported in [`Reconstruction::lossy_paths`].

use crate::entry::LogEntry;
use crate::error::HistoryResult;
use crate::graph::History;
use serde::Serialize;
use stagehand_editor::ChangeKind;
use stagehand_parser::ast::{find_prim, find_prim_mut, Prim};
use stagehand_parser::prim_path;
use std::collections::HashMap;
use tracing::{debug, warn};

/// Access to the current composed prims
pub trait LivePrims {
    fn live_prim(&self, path: &str) -> Option<Prim>;
}

impl LivePrims for [Prim] {
    fn live_prim(&self, path: &str) -> Option<Prim> {
        find_prim(self, path).cloned()
    }
}

impl LivePrims for Vec<Prim> {
    fn live_prim(&self, path: &str) -> Option<Prim> {
        self.as_slice().live_prim(path)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Reconstruction {
    /// Entry the state was rebuilt at
    pub entry: String,
    pub roots: Vec<Prim>,
    /// Paths filled from live state because their entry had no snapshot
    pub lossy_paths: Vec<String>,
}

impl Reconstruction {
    pub fn find(&self, path: &str) -> Option<&Prim> {
        find_prim(&self.roots, path)
    }

    pub fn is_lossy(&self) -> bool {
        !self.lossy_paths.is_empty()
    }
}

/// Flat accumulation keyed by path, remembering first-insertion order
#[derive(Default)]
struct FoldSet {
    order: Vec<String>,
    nodes: HashMap<String, Prim>,
}

impl FoldSet {
    fn put(&mut self, prim: &Prim) {
        for node in prim.descendants() {
            if !self.nodes.contains_key(&node.path) {
                self.order.push(node.path.clone());
            }
            self.nodes.insert(node.path.clone(), node.shallow_clone());
        }
    }

    fn remove_subtree(&mut self, path: &str) {
        self.nodes
            .retain(|p, _| !prim_path::is_same_or_descendant(p, path));
        self.order
            .retain(|p| !prim_path::is_same_or_descendant(p, path));
    }

    fn move_subtree(&mut self, from: &str, to: &str) {
        let moved: Vec<String> = self
            .order
            .iter()
            .filter(|p| prim_path::is_same_or_descendant(p, from))
            .cloned()
            .collect();
        for old in moved {
            let new = match prim_path::rebase(&old, from, to) {
                Some(new) => new,
                None => continue,
            };
            if let Some(mut prim) = self.nodes.remove(&old) {
                prim.path = new.clone();
                if let Some(name) = prim_path::name_of(&new) {
                    prim.name = name.to_string();
                }
                self.nodes.insert(new.clone(), prim);
            }
            if let Some(slot) = self.order.iter_mut().find(|p| **p == old) {
                *slot = new;
            }
        }
    }

    /// Relink by path prefix; prims whose parent is absent become roots
    fn into_forest(self) -> Vec<Prim> {
        let mut order = self.order;
        order.sort_by_key(|p| prim_path::depth(p));

        let mut nodes = self.nodes;
        let mut roots: Vec<Prim> = Vec::new();
        for path in order {
            let prim = match nodes.remove(&path) {
                Some(prim) => prim,
                None => continue,
            };
            let parent = prim_path::parent_of(&path)
                .filter(|parent| !prim_path::is_root(parent))
                .and_then(|parent| find_prim_mut(&mut roots, parent));
            match parent {
                Some(parent) => parent.children.push(prim),
                None => roots.push(prim),
            }
        }
        roots
    }
}

/// Rebuild the prim state as of entry `id`
pub fn reconstruct_at(
    history: &History,
    id: &str,
    live: &dyn LivePrims,
) -> HistoryResult<Reconstruction> {
    let chain = history.get_path(id)?;
    let mut set = FoldSet::default();
    let mut lossy_paths = Vec::new();

    for entry in chain {
        fold_entry(&mut set, entry, live, &mut lossy_paths);
    }

    if !lossy_paths.is_empty() {
        warn!(entry = %id, lossy = lossy_paths.len(), "Reconstruction used live state for entries without snapshots");
    }

    Ok(Reconstruction {
        entry: id.to_string(),
        roots: set.into_forest(),
        lossy_paths,
    })
}

fn fold_entry(
    set: &mut FoldSet,
    entry: &LogEntry,
    live: &dyn LivePrims,
    lossy_paths: &mut Vec<String>,
) {
    match entry.kind {
        ChangeKind::RemovePrim => {
            for path in &entry.paths {
                set.remove_subtree(path);
            }
            return;
        }
        ChangeKind::RenamePrim => {
            if let [from, to, ..] = entry.paths.as_slice() {
                set.move_subtree(from, to);
            }
        }
        _ => {}
    }

    match &entry.snapshot {
        Some(snapshot) => set.put(snapshot),
        None => {
            let paths = match entry.kind {
                // Only the new path exists after a rename
                ChangeKind::RenamePrim => entry.paths.iter().skip(1).collect::<Vec<_>>(),
                _ => entry.paths.iter().collect(),
            };
            for path in paths {
                debug!(entry = entry.entry, path = %path, "No snapshot; falling back to live prim");
                if let Some(prim) = live.live_prim(path) {
                    set.put(&prim);
                }
                if !lossy_paths.contains(path) {
                    lossy_paths.push(path.clone());
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entry::NewEntry;
    use stagehand_parser::ast::{PropertyValue, Specifier};

    fn prim_a(status: &str) -> Prim {
        Prim::new("/", "A", Specifier::Def).with_property("status", PropertyValue::string(status))
    }

    #[test]
    fn test_reconstruct_each_commit() {
        let mut history = History::new();
        let c1 = history.append_entry(
            NewEntry::new(ChangeKind::AddPrim, "ana")
                .with_path("/A")
                .with_snapshot(prim_a("WIP")),
        );
        let c2 = history.append_entry(
            NewEntry::new(ChangeKind::SetProperty, "ana")
                .with_path("/A")
                .with_statuses(Some("WIP".into()), Some("Shared".into()))
                .with_snapshot(prim_a("Shared")),
        );

        let none: Vec<Prim> = Vec::new();
        let at_c2 = reconstruct_at(&history, &c2.id, &none).unwrap();
        assert_eq!(at_c2.find("/A").unwrap().status(), Some("Shared"));
        let at_c1 = reconstruct_at(&history, &c1.id, &none).unwrap();
        assert_eq!(at_c1.find("/A").unwrap().status(), Some("WIP"));
        assert!(!at_c1.is_lossy());
    }

    #[test]
    fn test_relinks_and_keeps_orphans() {
        let mut history = History::new();
        history.append_entry(
            NewEntry::new(ChangeKind::AddPrim, "ana")
                .with_snapshot(Prim::new("/", "World", Specifier::Def)),
        );
        history.append_entry(
            NewEntry::new(ChangeKind::AddPrim, "ana")
                .with_snapshot(Prim::new("/World", "Box", Specifier::Def)),
        );
        let last = history.append_entry(
            NewEntry::new(ChangeKind::AddPrim, "ana")
                .with_snapshot(Prim::new("/Site/Zone", "Pump", Specifier::Def)),
        );

        let state = reconstruct_at(&history, &last.id, &Vec::<Prim>::new()).unwrap();
        let roots: Vec<_> = state.roots.iter().map(|p| p.path.as_str()).collect();
        assert_eq!(roots, vec!["/World", "/Site/Zone/Pump"]);
        assert_eq!(state.roots[0].children[0].path, "/World/Box");
    }

    #[test]
    fn test_remove_and_rename_replay() {
        let mut history = History::new();
        let world = Prim::new("/", "World", Specifier::Def)
            .with_child(Prim::new("/World", "Old", Specifier::Def).with_child(Prim::new(
                "/World/Old",
                "Child",
                Specifier::Def,
            )))
            .with_child(Prim::new("/World", "Gone", Specifier::Def));
        history.append_entry(NewEntry::new(ChangeKind::AddPrim, "ana").with_snapshot(world));
        history.append_entry(
            NewEntry::new(ChangeKind::RenamePrim, "ana")
                .with_path("/World/Old")
                .with_path("/World/New"),
        );
        let last = history.append_entry(
            NewEntry::new(ChangeKind::RemovePrim, "ana").with_path("/World/Gone"),
        );

        let state = reconstruct_at(&history, &last.id, &Vec::<Prim>::new()).unwrap();
        assert!(state.find("/World/New/Child").is_some());
        assert!(state.find("/World/Old").is_none());
        assert!(state.find("/World/Gone").is_none());
        assert_eq!(state.lossy_paths, vec!["/World/New".to_string()]);
    }

    #[test]
    fn test_missing_snapshot_uses_live_state() {
        let mut history = History::new();
        let legacy = history.append_entry(NewEntry::new(ChangeKind::Promote, "ana").with_path("/A"));

        let live = vec![prim_a("Published")];
        let state = reconstruct_at(&history, &legacy.id, &live).unwrap();
        assert_eq!(state.find("/A").unwrap().status(), Some("Published"));
        assert_eq!(state.lossy_paths, vec!["/A".to_string()]);
    }
}
