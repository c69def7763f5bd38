//! # Write Guard
//!
//! Decides whether a property write may go ahead before any document is
//! touched.
//!
//! ```text
//! request_write ─► permission ─► conflict ─► Clear(ApprovedWrite)
//!                      │             │
//!                   Denied     NeedsResolution(PendingWrite)
//!                                    │ resolve(choice)
//!                                    ▼
//!                        Some(ApprovedWrite) | None
//! ```
//!
//! A pending write is a continuation value: the caller shows the conflict,
//! collects the user's choice and hands it back. Nothing blocks and nothing
//! is partially applied.

use crate::error::GuardError;
use crate::role::User;
use serde::{Deserialize, Serialize};
use stagehand_parser::ast::{Prim, PropertyType, PropertyValue};
use stagehand_stage::{find_layer, ComposedHierarchy, Layer};
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PermissionDecision {
    pub allowed: bool,
    pub reason: String,
}

impl PermissionDecision {
    fn allow(reason: impl Into<String>) -> Self {
        Self {
            allowed: true,
            reason: reason.into(),
        }
    }

    fn deny(reason: impl Into<String>) -> Self {
        Self {
            allowed: false,
            reason: reason.into(),
        }
    }
}

/// May `user` write `property` on `prim`?
///
/// Ownership is decided by the layer the prim's spec comes from.
pub fn check_permission(
    user: &User,
    prim: &Prim,
    property: &str,
    layers: &[Layer],
) -> PermissionDecision {
    if user.role.writes_everywhere() || user.role.is_read_only() {
        return role_decision(user);
    }

    let layer = prim
        .source
        .as_ref()
        .and_then(|source| find_layer(layers, &source.document));
    match layer {
        Some(layer) => owner_decision(user, layer, property),
        None => PermissionDecision::deny(format!(
            "{} does not come from a known layer",
            prim.path
        )),
    }
}

/// May `user` edit the structure of `layer` (add, remove or rename prims)?
pub fn check_layer_permission(user: &User, layer: &Layer) -> PermissionDecision {
    if user.role.writes_everywhere() || user.role.is_read_only() {
        return role_decision(user);
    }
    owner_decision(user, layer, "prims")
}

fn role_decision(user: &User) -> PermissionDecision {
    if user.role.is_read_only() {
        PermissionDecision::deny(format!("{} has read-only access", user.role))
    } else {
        PermissionDecision::allow(format!("{} may edit any layer", user.role))
    }
}

fn owner_decision(user: &User, layer: &Layer, what: &str) -> PermissionDecision {
    match &layer.owner {
        None => PermissionDecision::deny(format!(
            "layer '{}' has no owner; only Project Managers and Field Engineers may edit it",
            layer.id
        )),
        Some(owner) if owner == &user.name => {
            PermissionDecision::allow(format!("{} owns layer '{}'", user.name, layer.id))
        }
        Some(owner) => PermissionDecision::deny(format!(
            "layer '{}' is owned by {}; cannot edit {}",
            layer.id, owner, what
        )),
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConflictingLayer {
    pub layer_id: String,
    pub file_path: String,
    pub owner: String,
}

/// Another owner already defines the property being written
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Conflict {
    pub path: String,
    pub property: String,
    pub current_value: Option<PropertyValue>,
    pub new_value: String,
    pub conflicting_layers: Vec<ConflictingLayer>,
}

/// Find layers owned by someone other than `user` that define `property` on `prim`
pub fn detect_conflict(
    user: &User,
    prim: &Prim,
    property: &str,
    new_value: &str,
    hierarchy: &ComposedHierarchy,
    layers: &[Layer],
) -> Option<Conflict> {
    let conflicting_layers: Vec<ConflictingLayer> = hierarchy
        .opinions
        .layers_for(&prim.path, property)
        .iter()
        .filter_map(|file| find_layer(layers, file))
        .filter_map(|layer| match &layer.owner {
            Some(owner) if owner != &user.name => Some(ConflictingLayer {
                layer_id: layer.id.clone(),
                file_path: layer.file_path.clone(),
                owner: owner.clone(),
            }),
            _ => None,
        })
        .collect();

    if conflicting_layers.is_empty() {
        return None;
    }

    Some(Conflict {
        path: prim.path.clone(),
        property: property.to_string(),
        current_value: prim.property(property).map(|p| p.value.clone()),
        new_value: new_value.to_string(),
        conflicting_layers,
    })
}

/// A property write as requested by the property panel
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WriteIntent {
    pub path: String,
    pub property: String,
    pub value: String,
    pub value_type: PropertyType,
}

impl WriteIntent {
    pub fn new(
        path: impl Into<String>,
        property: impl Into<String>,
        value: impl Into<String>,
        value_type: PropertyType,
    ) -> Self {
        Self {
            path: path.into(),
            property: property.into(),
            value: value.into(),
            value_type,
        }
    }
}

/// A write cleared to go ahead
#[derive(Debug, Clone, PartialEq)]
pub struct ApprovedWrite {
    pub intent: WriteIntent,
    pub user: User,
    /// A Project Manager overwrote another owner's property; must be logged
    pub overridden: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub enum WriteRequest {
    Clear(ApprovedWrite),
    Denied(PermissionDecision),
    NeedsResolution(PendingWrite),
}

/// User's answer to a conflict prompt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Resolution {
    KeepCurrent,
    UseNew,
    Cancel,
}

/// A conflicting write waiting for the user's choice
#[derive(Debug, Clone, PartialEq)]
pub struct PendingWrite {
    pub intent: WriteIntent,
    pub user: User,
    pub conflict: Conflict,
}

impl PendingWrite {
    /// Continue with the user's choice; `Ok(None)` means the write is abandoned
    pub fn resolve(self, resolution: Resolution) -> Result<Option<ApprovedWrite>, GuardError> {
        match resolution {
            Resolution::KeepCurrent | Resolution::Cancel => {
                debug!(path = %self.intent.path, property = %self.intent.property, ?resolution, "Write abandoned");
                Ok(None)
            }
            Resolution::UseNew if self.user.role.may_override() => Ok(Some(ApprovedWrite {
                intent: self.intent,
                user: self.user,
                overridden: true,
            })),
            Resolution::UseNew => Err(GuardError::OverrideNotPermitted {
                user: self.user.name,
                path: self.intent.path,
                property: self.intent.property,
            }),
        }
    }
}

/// Run the permission and conflict checks for one write
pub fn request_write(
    user: &User,
    intent: WriteIntent,
    hierarchy: &ComposedHierarchy,
    layers: &[Layer],
) -> Result<WriteRequest, GuardError> {
    let prim = hierarchy
        .find(&intent.path)
        .ok_or_else(|| GuardError::PrimNotFound(intent.path.clone()))?;

    let permission = check_permission(user, prim, &intent.property, layers);
    if !permission.allowed {
        debug!(user = %user.name, path = %intent.path, reason = %permission.reason, "Write denied");
        return Ok(WriteRequest::Denied(permission));
    }

    match detect_conflict(user, prim, &intent.property, &intent.value, hierarchy, layers) {
        Some(conflict) => Ok(WriteRequest::NeedsResolution(PendingWrite {
            intent,
            user: user.clone(),
            conflict,
        })),
        None => Ok(WriteRequest::Clear(ApprovedWrite {
            intent,
            user: user.clone(),
            overridden: false,
        })),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::role::Role;
    use stagehand_stage::{compose_layers, LayerSource, LayerStatus};

    fn layers() -> Vec<Layer> {
        vec![
            Layer::new("arch", "arch.usda")
                .with_status(LayerStatus::Shared)
                .with_owner("u1"),
            Layer::new("mep", "mep.usda").with_owner("u2"),
            Layer::new("base", "base.usda"),
        ]
    }

    fn hierarchy() -> ComposedHierarchy {
        let layers = layers();
        compose_layers(&[
            LayerSource::new(
                layers[0].clone(),
                "def \"Wall\" { custom double height = 3.0 }\n",
            ),
            LayerSource::new(
                layers[1].clone(),
                "over \"Wall\" { custom string color = \"grey\" }\ndef \"Duct\" {}\n",
            ),
            LayerSource::new(layers[2].clone(), "def \"Ground\" {}\n"),
        ])
    }

    #[test]
    fn test_permissions_by_role_and_owner() {
        let hierarchy = hierarchy();
        let layers = layers();
        let wall = hierarchy.find("/Wall").unwrap();
        let ground = hierarchy.find("/Ground").unwrap();

        let pm = User::new("boss", Role::ProjectManager);
        let fe = User::new("eng", Role::FieldEngineer);
        let field = User::new("crew", Role::FieldPerson);
        let owner = User::new("u1", Role::Contributor);
        let stranger = User::new("u3", Role::Contributor);

        assert!(check_permission(&pm, ground, "x", &layers).allowed);
        assert!(check_permission(&fe, wall, "height", &layers).allowed);
        assert!(!check_permission(&field, wall, "height", &layers).allowed);
        assert!(check_permission(&owner, wall, "height", &layers).allowed);
        assert!(!check_permission(&stranger, wall, "height", &layers).allowed);

        let ownerless = check_permission(&owner, ground, "x", &layers);
        assert!(!ownerless.allowed);
        assert!(ownerless.reason.contains("no owner"));

        assert!(check_layer_permission(&owner, &layers[0]).allowed);
        assert!(!check_layer_permission(&owner, &layers[1]).allowed);
        assert!(check_layer_permission(&fe, &layers[2]).allowed);
        assert!(!check_layer_permission(&field, &layers[0]).allowed);
    }

    #[test]
    fn test_conflict_lists_other_owners() {
        let hierarchy = hierarchy();
        let layers = layers();
        let wall = hierarchy.find("/Wall").unwrap();
        let u2 = User::new("u2", Role::Contributor);

        let conflict = detect_conflict(&u2, wall, "height", "4.0", &hierarchy, &layers).unwrap();
        assert_eq!(conflict.conflicting_layers.len(), 1);
        assert_eq!(conflict.conflicting_layers[0].owner, "u1");
        assert_eq!(conflict.current_value, Some(PropertyValue::Double(3.0)));

        // Own property, or a property nobody defines yet
        assert!(detect_conflict(&u2, wall, "color", "red", &hierarchy, &layers).is_none());
        assert!(detect_conflict(&u2, wall, "width", "1", &hierarchy, &layers).is_none());
    }

    #[test]
    fn test_only_project_manager_uses_new() {
        let hierarchy = hierarchy();
        let layers = layers();
        let intent = WriteIntent::new("/Wall", "height", "4.0", PropertyType::Double);

        let fe = User::new("eng", Role::FieldEngineer);
        let pending = match request_write(&fe, intent.clone(), &hierarchy, &layers).unwrap() {
            WriteRequest::NeedsResolution(pending) => pending,
            other => panic!("expected conflict, got {:?}", other),
        };
        assert!(matches!(
            pending.clone().resolve(Resolution::UseNew),
            Err(GuardError::OverrideNotPermitted { .. })
        ));
        assert_eq!(pending.resolve(Resolution::KeepCurrent), Ok(None));

        let pm = User::new("boss", Role::ProjectManager);
        let pending = match request_write(&pm, intent, &hierarchy, &layers).unwrap() {
            WriteRequest::NeedsResolution(pending) => pending,
            other => panic!("expected conflict, got {:?}", other),
        };
        let approved = pending.resolve(Resolution::UseNew).unwrap().unwrap();
        assert!(approved.overridden);
    }

    #[test]
    fn test_clear_and_denied_requests() {
        let hierarchy = hierarchy();
        let layers = layers();
        let owner = User::new("u1", Role::Contributor);

        let clear = request_write(
            &owner,
            WriteIntent::new("/Wall", "height", "3.5", PropertyType::Double),
            &hierarchy,
            &layers,
        )
        .unwrap();
        assert!(matches!(clear, WriteRequest::Clear(ApprovedWrite { overridden: false, .. })));

        let field = User::new("crew", Role::FieldPerson);
        let denied = request_write(
            &field,
            WriteIntent::new("/Wall", "height", "3.5", PropertyType::Double),
            &hierarchy,
            &layers,
        )
        .unwrap();
        assert!(matches!(denied, WriteRequest::Denied(_)));

        assert_eq!(
            request_write(
                &owner,
                WriteIntent::new("/Nope", "height", "1", PropertyType::Double),
                &hierarchy,
                &layers
            ),
            Err(GuardError::PrimNotFound("/Nope".to_string()))
        );
    }
}
