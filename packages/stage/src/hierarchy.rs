use crate::layer::LayerStatus;
use serde::Serialize;
use stagehand_common::Warnings;
use stagehand_parser::ast::{find_prim, Prim};
use std::collections::BTreeMap;

/// Which layers author which property on which path
///
/// Layers are listed strongest first.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct OpinionIndex {
    entries: BTreeMap<String, BTreeMap<String, Vec<String>>>,
}

impl OpinionIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, path: &str, property: &str, layer_file: &str) {
        let layers = self
            .entries
            .entry(path.to_string())
            .or_default()
            .entry(property.to_string())
            .or_default();
        if !layers.iter().any(|l| l == layer_file) {
            layers.push(layer_file.to_string());
        }
    }

    /// Layer files defining `property` on `path`
    pub fn layers_for(&self, path: &str, property: &str) -> &[String] {
        self.entries
            .get(path)
            .and_then(|props| props.get(property))
            .map(|layers| layers.as_slice())
            .unwrap_or(&[])
    }

    /// Every property authored on `path` with its defining layers
    pub fn properties_of(&self, path: &str) -> Option<&BTreeMap<String, Vec<String>>> {
        self.entries.get(path)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// A same-path definition from another layer that was kept under a new name
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Collision {
    pub original_path: String,
    pub renamed_path: String,
    /// Layer file whose prim was renamed
    pub layer: String,
}

/// Result of composing the layer stack
///
/// Always rebuilt from scratch; never persisted.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ComposedHierarchy {
    pub roots: Vec<Prim>,
    pub opinions: OpinionIndex,
    pub collisions: Vec<Collision>,
    pub warnings: Warnings,
}

impl ComposedHierarchy {
    pub fn find(&self, path: &str) -> Option<&Prim> {
        find_prim(&self.roots, path)
    }

    /// Every composed prim, depth first
    pub fn flatten(&self) -> Vec<&Prim> {
        self.roots.iter().flat_map(|root| root.descendants()).collect()
    }

    pub fn paths(&self) -> Vec<String> {
        self.flatten().into_iter().map(|p| p.path.clone()).collect()
    }

    /// Paths of prims whose spec comes from `document`
    pub fn paths_from(&self, document: &str) -> Vec<String> {
        self.flatten()
            .into_iter()
            .filter(|p| p.source.as_ref().map(|s| s.document == document).unwrap_or(false))
            .map(|p| p.path.clone())
            .collect()
    }

    /// Status shown for the prim at `path` (explicit or inherited from its layer)
    pub fn effective_status(&self, path: &str) -> Option<LayerStatus> {
        self.find(path)?.status()?.parse().ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_opinion_index_deduplicates() {
        let mut index = OpinionIndex::new();
        index.record("/World/Box", "size", "a.usda");
        index.record("/World/Box", "size", "b.usda");
        index.record("/World/Box", "size", "a.usda");

        assert_eq!(index.layers_for("/World/Box", "size"), ["a.usda", "b.usda"]);
        assert!(index.layers_for("/World/Box", "color").is_empty());
        assert_eq!(index.len(), 1);
    }
}
