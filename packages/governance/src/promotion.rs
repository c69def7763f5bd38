//! # Status Promotion
//!
//! Layers and prims move one step at a time along
//! `WIP ⇄ Shared ⇄ Published`. `Archived` sits outside the chain: only an
//! administrative set reaches it, and nothing promotes or demotes out of it.
//!
//! Planning is pure. The workspace applies a plan to the documents, logs one
//! entry per affected layer or object and recomposes.

use crate::error::PromotionError;
use serde::{Deserialize, Serialize};
use stagehand_common::{Classify, Warning, Warnings};
use stagehand_parser::prim_path;
use stagehand_stage::{ComposedHierarchy, Layer, LayerStatus};
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Promote,
    Demote,
}

impl Direction {
    /// Next status in this direction, if the chain allows one
    pub fn step(self, status: LayerStatus) -> Option<LayerStatus> {
        use LayerStatus::*;
        match (self, status) {
            (Direction::Promote, Wip) => Some(Shared),
            (Direction::Promote, Shared) => Some(Published),
            (Direction::Demote, Published) => Some(Shared),
            (Direction::Demote, Shared) => Some(Wip),
            _ => None,
        }
    }

    pub fn apply(self, subject: &str, status: LayerStatus) -> Result<LayerStatus, PromotionError> {
        self.step(status).ok_or_else(|| match self {
            Direction::Promote => PromotionError::CannotPromote {
                subject: subject.to_string(),
                status,
            },
            Direction::Demote => PromotionError::CannotDemote {
                subject: subject.to_string(),
                status,
            },
        })
    }
}

pub fn promote(subject: &str, status: LayerStatus) -> Result<LayerStatus, PromotionError> {
    Direction::Promote.apply(subject, status)
}

pub fn demote(subject: &str, status: LayerStatus) -> Result<LayerStatus, PromotionError> {
    Direction::Demote.apply(subject, status)
}

/// Set a layer's status directly, bypassing the chain; returns the old status
pub fn set_administrative(layer: &mut Layer, status: LayerStatus) -> LayerStatus {
    let previous = layer.status;
    layer.status = status;
    info!(layer = %layer.id, from = %previous, to = %status, "Administrative status change");
    previous
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LayerTransition {
    pub layer_id: String,
    pub file_path: String,
    pub from: LayerStatus,
    pub to: LayerStatus,
}

impl LayerTransition {
    /// Write the new status into the matching layer descriptor
    pub fn apply(&self, layers: &mut [Layer]) {
        if let Some(layer) = layers.iter_mut().find(|l| l.id == self.layer_id) {
            layer.status = self.to;
        }
    }
}

/// Layer batch result; failed layers become warnings
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct LayerBatch {
    pub transitions: Vec<LayerTransition>,
    pub warnings: Warnings,
}

/// Plan a status step for each named layer, skipping the ones that cannot move
pub fn plan_layers(layers: &[Layer], ids: &[String], direction: Direction) -> LayerBatch {
    let mut batch = LayerBatch::default();

    for id in ids {
        let result = layers
            .iter()
            .find(|l| &l.id == id)
            .ok_or_else(|| PromotionError::LayerNotFound(id.clone()))
            .and_then(|layer| {
                let to = direction.apply(&layer.id, layer.status)?;
                Ok(LayerTransition {
                    layer_id: layer.id.clone(),
                    file_path: layer.file_path.clone(),
                    from: layer.status,
                    to,
                })
            });

        match result {
            Ok(transition) => batch.transitions.push(transition),
            Err(e) => {
                warn!(layer = %id, error = %e, "Layer skipped");
                batch
                    .warnings
                    .push(Warning::new(e.kind(), e.to_string()).about(id.clone()));
            }
        }
    }

    info!(
        ?direction,
        planned = batch.transitions.len(),
        skipped = batch.warnings.len(),
        "Layer status batch planned"
    );
    batch
}

/// An object-level status step with its cascade
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectTransition {
    pub direction: Direction,
    pub from: LayerStatus,
    pub to: LayerStatus,
    /// The selected prims
    pub targets: Vec<String>,
    /// Every prim receiving the new status: targets, their immediate parents
    /// and all their descendants
    pub affected: Vec<String>,
}

/// Plan a status step for a selection of prims
///
/// The selection must share one effective status; otherwise nothing moves.
pub fn plan_objects(
    hierarchy: &ComposedHierarchy,
    paths: &[String],
    direction: Direction,
) -> Result<ObjectTransition, PromotionError> {
    if paths.is_empty() {
        return Err(PromotionError::EmptySelection);
    }

    let mut statuses = Vec::with_capacity(paths.len());
    for path in paths {
        if hierarchy.find(path).is_none() {
            return Err(PromotionError::PrimNotFound(path.clone()));
        }
        let status = hierarchy
            .effective_status(path)
            .ok_or_else(|| PromotionError::MissingStatus(path.clone()))?;
        statuses.push((path.clone(), status));
    }

    let from = statuses[0].1;
    if statuses.iter().any(|(_, status)| *status != from) {
        return Err(PromotionError::MixedStatus(statuses));
    }
    let to = direction.apply(&paths.join(", "), from)?;

    let mut affected: Vec<String> = Vec::new();
    let mut add = |path: &str| {
        if !affected.iter().any(|p| p == path) {
            affected.push(path.to_string());
        }
    };
    for path in paths {
        if let Some(parent) = prim_path::parent_of(path) {
            if hierarchy.find(parent).is_some() {
                add(parent);
            }
        }
        if let Some(prim) = hierarchy.find(path) {
            for node in prim.descendants() {
                add(&node.path);
            }
        }
    }

    info!(?direction, from = %from, to = %to, affected = affected.len(), "Object status step planned");
    Ok(ObjectTransition {
        direction,
        from,
        to,
        targets: paths.to_vec(),
        affected,
    })
}
