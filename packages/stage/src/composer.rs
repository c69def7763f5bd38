//! # Layer Composition
//!
//! Merges the layer stack into one composed hierarchy.
//!
//! Composition runs in three passes over the visible layers, strongest
//! first:
//!
//! 1. **Stacking**: prims are merged path by path. The first definition wins;
//!    `over` specs, pure containers and placeholders follow their own rules,
//!    and genuine collisions between layers are kept side by side under a
//!    `_N` suffix.
//! 2. **Resolution**: references and payloads pull in the referent from the
//!    referenced document. Local opinions stay stronger than the referent.
//! 3. **Status**: prims without an explicit `status` take their layer's.
//!
//! Failures never abort composition; they end up in
//! [`ComposedHierarchy::warnings`].

use crate::error::StageError;
use crate::hierarchy::{Collision, ComposedHierarchy, OpinionIndex};
use crate::layer::{LayerSource, LayerStatus};
use crate::resolver::{normalize, Resolver};
use stagehand_common::{Classify, ErrorKind, Warning, Warnings};
use stagehand_parser::ast::{
    Prim, PropertyValue, Provenance, SceneDocument, Specifier, ENTITY_TYPE_KEY,
    PLACEHOLDER_ENTITY, STATUS_KEY,
};
use stagehand_parser::{parse, prim_path};
use std::collections::HashMap;
use tracing::{debug, info, warn};

/// Composes layer stacks, optionally with extra referenced documents
#[derive(Debug, Clone, Default)]
pub struct Composer {
    extra_documents: Vec<(String, SceneDocument)>,
}

impl Composer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make a non-layer document available to references and payloads
    ///
    /// Adding a path again replaces the earlier document.
    pub fn add_document(&mut self, path: impl Into<String>, doc: SceneDocument) {
        let path = path.into();
        match self.extra_documents.iter_mut().find(|(p, _)| *p == path) {
            Some(entry) => entry.1 = doc,
            None => self.extra_documents.push((path, doc)),
        }
    }

    /// Compose `layers`, ordered strongest first
    pub fn compose(&self, layers: &[LayerSource]) -> ComposedHierarchy {
        info!(layers = layers.len(), "Starting layer composition");

        let mut ctx = StackContext::default();
        let mut resolver = Resolver::new();
        for (path, doc) in &self.extra_documents {
            resolver.add_document(path, doc.clone());
        }

        let mut roots: Vec<Prim> = Vec::new();
        let mut layer_status: HashMap<String, LayerStatus> = HashMap::new();

        for source in layers {
            let layer = &source.layer;
            if !layer.visible {
                debug!(layer = %layer.id, "Skipping hidden layer");
                continue;
            }

            let doc = match parse(&source.content) {
                Ok(doc) => doc,
                Err(e) => {
                    warn!(layer = %layer.id, error = %e, "Layer parse failed - continuing without it");
                    ctx.push_error(
                        StageError::LayerParse {
                            layer: layer.id.clone(),
                            source: e,
                        },
                        &layer.file_path,
                    );
                    continue;
                }
            };

            layer_status.insert(normalize(&layer.file_path), layer.status);
            for prim in doc.scene_prims() {
                let stamped = stamp_provenance(prim.clone(), &layer.file_path);
                ctx.merge_into(&mut roots, stamped, &layer.file_path);
            }
            resolver.add_document(&layer.file_path, doc);
        }

        let mut stack = Vec::new();
        for root in &mut roots {
            ctx.resolve_arcs(root, &resolver, &mut stack);
        }

        for root in &mut roots {
            inherit_status(root, None, &layer_status);
        }

        info!(
            roots = roots.len(),
            collisions = ctx.collisions.len(),
            warnings = ctx.warnings.len(),
            "Layer composition complete"
        );

        ComposedHierarchy {
            roots,
            opinions: ctx.opinions,
            collisions: ctx.collisions,
            warnings: ctx.warnings,
        }
    }
}

/// Compose a layer stack (strongest first) with no extra documents
pub fn compose_layers(layers: &[LayerSource]) -> ComposedHierarchy {
    Composer::new().compose(layers)
}

#[derive(Default)]
struct StackContext {
    opinions: OpinionIndex,
    collisions: Vec<Collision>,
    warnings: Warnings,
}

impl StackContext {
    fn push_error(&mut self, error: StageError, subject: &str) {
        self.warnings
            .push(Warning::new(error.kind(), error.to_string()).about(subject));
    }

    /// Merge `incoming` (from `layer_file`) into a sibling list
    fn merge_into(&mut self, siblings: &mut Vec<Prim>, incoming: Prim, layer_file: &str) {
        let index = match siblings.iter().position(|p| p.name == incoming.name) {
            Some(index) => index,
            None => {
                self.record_subtree(&incoming, layer_file);
                siblings.push(incoming);
                return;
            }
        };

        let existing_placeholder = siblings[index].is_placeholder();
        let incoming_placeholder = incoming.is_placeholder();

        if existing_placeholder && !incoming_placeholder && incoming.specifier != Specifier::Over {
            debug!(path = %incoming.path, layer = layer_file, "Real element replaces placeholder");
            let placeholder = std::mem::replace(&mut siblings[index], incoming);
            self.record_subtree(&siblings[index], layer_file);
            // Children planned under the placeholder stay, weaker than the real ones
            let winner = &mut siblings[index];
            for child in placeholder.children {
                if winner.child(&child.name).is_none() {
                    winner.children.push(child);
                }
            }
            return;
        }

        if !existing_placeholder && incoming_placeholder {
            warn!(path = %incoming.path, layer = layer_file, "Placeholder cannot override a real element");
            self.warnings.push(
                Warning::new(
                    ErrorKind::Validation,
                    format!(
                        "placeholder from {} dropped: {} is a real element",
                        layer_file, incoming.path
                    ),
                )
                .about(incoming.path.clone()),
            );
            return;
        }

        let existing = &siblings[index];
        let same_layer = existing
            .source
            .as_ref()
            .map(|s| s.document == layer_file)
            .unwrap_or(false);
        let mergeable = same_layer
            || incoming.specifier == Specifier::Over
            || existing.specifier == Specifier::Over
            || containers_agree(existing, &incoming);

        if mergeable {
            let existing = &mut siblings[index];
            self.overlay(existing, incoming, layer_file);
            return;
        }

        // Two layers define the same prim: keep both
        let original_path = incoming.path.clone();
        let renamed = unused_name(siblings, &incoming.name);
        let parent = prim_path::parent_of(&original_path).unwrap_or("/");
        let mut moved = incoming;
        moved.rebase(&prim_path::join(parent, &renamed));

        info!(
            path = %original_path,
            renamed = %moved.path,
            layer = layer_file,
            "Layer collision kept under a new name"
        );
        self.collisions.push(Collision {
            original_path,
            renamed_path: moved.path.clone(),
            layer: layer_file.to_string(),
        });
        self.record_subtree(&moved, layer_file);
        siblings.push(moved);
    }

    /// Add the weaker `incoming` opinions to `existing`
    fn overlay(&mut self, existing: &mut Prim, incoming: Prim, layer_file: &str) {
        self.record_node(&incoming, layer_file);

        if existing.specifier == Specifier::Over && incoming.specifier != Specifier::Over {
            existing.specifier = incoming.specifier;
        }
        if existing.type_name.is_none() {
            existing.type_name = incoming.type_name.clone();
        }
        if existing.arc.is_none() {
            existing.arc = incoming.arc.clone();
        }
        for property in incoming.properties {
            if !existing.has_property(&property.name) {
                existing.properties.push(property);
            }
        }
        for child in incoming.children {
            self.merge_into(&mut existing.children, child, layer_file);
        }
    }

    fn record_node(&mut self, prim: &Prim, layer_file: &str) {
        for property in &prim.properties {
            self.opinions.record(&prim.path, &property.name, layer_file);
        }
    }

    fn record_subtree(&mut self, prim: &Prim, layer_file: &str) {
        for node in prim.descendants() {
            self.record_node(node, layer_file);
        }
    }

    /// Resolve references and payloads below `prim`
    ///
    /// `stack` holds the referents currently being expanded, to cut cycles.
    fn resolve_arcs(&mut self, prim: &mut Prim, resolver: &Resolver, stack: &mut Vec<String>) {
        let mut pushed = 0;
        let mut next = prim.arc.clone().map(|arc| (source_document(prim), arc));

        while let Some((base, arc)) = next.take() {
            match resolver.resolve(&base, &arc) {
                Ok((document, referent)) => {
                    let key = format!("{}{}", document, referent.path);
                    if stack.contains(&key) {
                        warn!(path = %prim.path, referent = %key, "Reference cycle cut");
                        self.push_error(
                            StageError::ReferenceCycle {
                                document,
                                path: referent.path.clone(),
                            },
                            &prim.path,
                        );
                        break;
                    }
                    stack.push(key);
                    pushed += 1;

                    next = referent.arc.clone().map(|arc| (document.clone(), arc));
                    apply_referent(prim, referent, &document);
                }
                Err(e) => {
                    warn!(path = %prim.path, error = %e, "Composition arc unresolved - using placeholder");
                    self.push_error(e, &prim.path);
                    if !prim.has_property(ENTITY_TYPE_KEY) {
                        prim.set_property(ENTITY_TYPE_KEY, PropertyValue::string(PLACEHOLDER_ENTITY));
                    }
                    break;
                }
            }
        }

        for child in &mut prim.children {
            self.resolve_arcs(child, resolver, stack);
        }

        for _ in 0..pushed {
            stack.pop();
        }
    }
}

/// Copy the referent's opinions under `prim`, weaker than local ones
fn apply_referent(prim: &mut Prim, referent: Prim, document: &str) {
    if prim.type_name.is_none() {
        prim.type_name = referent.type_name;
    }
    for property in referent.properties {
        if !prim.has_property(&property.name) {
            prim.properties.push(property);
        }
    }
    for child in referent.children {
        let mut child = stamp_provenance(child, document);
        child.rebase(&prim_path::join(&prim.path, &child.name));
        match prim.child_mut(&child.name) {
            Some(local) => overlay_referent_child(local, child),
            None => prim.children.push(child),
        }
    }
}

fn overlay_referent_child(local: &mut Prim, referent: Prim) {
    if local.arc.is_none() {
        local.arc = referent.arc;
    }
    if local.type_name.is_none() {
        local.type_name = referent.type_name;
    }
    for property in referent.properties {
        if !local.has_property(&property.name) {
            local.properties.push(property);
        }
    }
    for child in referent.children {
        match local.child_mut(&child.name) {
            Some(existing) => overlay_referent_child(existing, child),
            None => local.children.push(child),
        }
    }
}

/// Give every prim in the subtree its authored origin
fn stamp_provenance(mut prim: Prim, document: &str) -> Prim {
    fn stamp(prim: &mut Prim, document: &str) {
        prim.source = Some(Provenance {
            document: document.to_string(),
            path: prim.path.clone(),
        });
        for child in &mut prim.children {
            stamp(child, document);
        }
    }
    stamp(&mut prim, document);
    prim
}

fn source_document(prim: &Prim) -> String {
    prim.source
        .as_ref()
        .map(|s| s.document.clone())
        .unwrap_or_default()
}

/// Children, no own (non-reserved) properties and no classification
fn is_container(prim: &Prim) -> bool {
    !prim.children.is_empty()
        && prim.own_properties().next().is_none()
        && !prim.has_property(ENTITY_TYPE_KEY)
}

/// Two containers only merge when they author the same type and status
fn containers_agree(a: &Prim, b: &Prim) -> bool {
    let same_type = match (&a.type_name, &b.type_name) {
        (Some(x), Some(y)) => x == y,
        _ => true,
    };
    is_container(a) && is_container(b) && same_type && a.status() == b.status()
}

/// `Name_N` with the smallest N not used by a sibling
fn unused_name(siblings: &[Prim], name: &str) -> String {
    (1..)
        .map(|n| format!("{}_{}", name, n))
        .find(|candidate| !siblings.iter().any(|s| &s.name == candidate))
        .unwrap_or_else(|| name.to_string())
}

/// Fill in `status` from the prim's layer, falling back to the enclosing layer
fn inherit_status(
    prim: &mut Prim,
    inherited: Option<LayerStatus>,
    layer_status: &HashMap<String, LayerStatus>,
) {
    let own_layer = prim
        .source
        .as_ref()
        .and_then(|s| layer_status.get(&normalize(&s.document)))
        .copied();
    let effective = own_layer.or(inherited);

    if prim.status().is_none() {
        if let Some(status) = effective {
            prim.set_property(STATUS_KEY, PropertyValue::string(status.as_str()));
        }
    }
    for child in &mut prim.children {
        inherit_status(child, effective, layer_status);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layer::Layer;

    fn source(id: &str, status: LayerStatus, content: &str) -> LayerSource {
        LayerSource::new(
            Layer::new(id, format!("{}.usda", id)).with_status(status),
            content,
        )
    }

    #[test]
    fn test_container_merge_and_collision() {
        let l1 = source(
            "l1",
            LayerStatus::Published,
            "def Xform \"World\" { def Cube \"Box\" { custom double size = 1.0 } }",
        );
        let l2 = source(
            "l2",
            LayerStatus::Wip,
            "def Xform \"World\" { def Cube \"Box\" { custom double size = 2.0 } }",
        );

        let composed = compose_layers(&[l1, l2]);
        assert_eq!(composed.roots.len(), 1);
        let world = &composed.roots[0];
        let names: Vec<_> = world.children.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["Box", "Box_1"]);

        assert_eq!(composed.effective_status("/World/Box"), Some(LayerStatus::Published));
        assert_eq!(composed.effective_status("/World/Box_1"), Some(LayerStatus::Wip));
        assert_eq!(
            composed.collisions,
            vec![Collision {
                original_path: "/World/Box".to_string(),
                renamed_path: "/World/Box_1".to_string(),
                layer: "l2.usda".to_string(),
            }]
        );
        assert_eq!(composed.opinions.layers_for("/World/Box_1", "size"), ["l2.usda"]);

        let renamed = composed.find("/World/Box_1").unwrap();
        let provenance = renamed.source.as_ref().unwrap();
        assert_eq!(provenance.document, "l2.usda");
        assert_eq!(provenance.path, "/World/Box");
    }

    #[test]
    fn test_classified_elements_with_children_collide() {
        let l1 = source(
            "l1",
            LayerStatus::Wip,
            "def Xform \"World\" { def Cube \"Box\" { custom string entityType = \"IfcWall\"\n def \"Lid\" {} } }",
        );
        let l2 = source(
            "l2",
            LayerStatus::Wip,
            "def Xform \"World\" { def Cube \"Box\" { custom string entityType = \"IfcSlab\"\n def \"Lid\" {} } }",
        );

        let composed = compose_layers(&[l1, l2]);
        assert_eq!(
            composed.paths(),
            vec!["/World", "/World/Box", "/World/Box/Lid", "/World/Box_1", "/World/Box_1/Lid"]
        );
        assert_eq!(composed.find("/World/Box").unwrap().text_property("entityType"), Some("IfcWall"));
        assert_eq!(composed.find("/World/Box_1").unwrap().text_property("entityType"), Some("IfcSlab"));
        assert_eq!(composed.collisions.len(), 1);
    }

    #[test]
    fn test_containers_with_different_status_collide() {
        let l1 = source(
            "l1",
            LayerStatus::Wip,
            "def Xform \"Zone\" { custom string status = \"Shared\"\n def \"A\" {} }",
        );
        let l2 = source("l2", LayerStatus::Wip, "def Xform \"Zone\" { def \"B\" {} }");
        let composed = compose_layers(&[l1, l2]);
        assert_eq!(composed.paths(), vec!["/Zone", "/Zone/A", "/Zone_1", "/Zone_1/B"]);

        let l1 = source("l1", LayerStatus::Wip, "def Xform \"Zone\" { def \"A\" {} }");
        let l2 = source("l2", LayerStatus::Wip, "def Xform \"Zone\" { def \"B\" {} }");
        let composed = compose_layers(&[l1, l2]);
        assert_eq!(composed.paths(), vec!["/Zone", "/Zone/A", "/Zone/B"]);
    }

    #[test]
    fn test_over_adds_missing_properties() {
        let strong = source(
            "strong",
            LayerStatus::Shared,
            "over \"Box\" { custom double size = 5.0 }",
        );
        let weak = source(
            "weak",
            LayerStatus::Wip,
            "def Cube \"Box\" { custom double size = 1.0\n custom string color = \"red\" }",
        );

        let composed = compose_layers(&[strong, weak]);
        let cube = composed.find("/Box").unwrap();
        assert_eq!(cube.specifier, Specifier::Def);
        assert_eq!(cube.type_name.as_deref(), Some("Cube"));
        assert_eq!(cube.property("size").unwrap().value, PropertyValue::Double(5.0));
        assert_eq!(cube.text_property("color"), Some("red"));
        assert_eq!(
            composed.opinions.layers_for("/Box", "size"),
            ["strong.usda", "weak.usda"]
        );
    }

    #[test]
    fn test_placeholder_rules() {
        let placeholder = "def \"Wall\" { custom string entityType = \"placeholder\" }";
        let real = "def Mesh \"Wall\" { custom string entityType = \"IfcWall\" }";

        // Real element in a weaker layer still replaces the placeholder
        let composed = compose_layers(&[
            source("a", LayerStatus::Wip, placeholder),
            source("b", LayerStatus::Wip, real),
        ]);
        assert_eq!(composed.roots.len(), 1);
        assert!(!composed.roots[0].is_placeholder());
        assert!(composed.warnings.is_empty());

        // Placeholder over a real element is dropped with a warning
        let composed = compose_layers(&[
            source("a", LayerStatus::Wip, real),
            source("b", LayerStatus::Wip, placeholder),
        ]);
        assert_eq!(composed.roots.len(), 1);
        assert!(!composed.roots[0].is_placeholder());
        assert_eq!(composed.warnings.len(), 1);
    }

    #[test]
    fn test_hidden_layers_and_change_log_skipped() {
        let visible = source(
            "a",
            LayerStatus::Wip,
            "def \"A\" {}\ndef \"ChangeLog\" { def \"Log_1\" { custom int entry = 1 } }",
        );
        let mut hidden = source("b", LayerStatus::Wip, "def \"B\" {}");
        hidden.layer.visible = false;

        let composed = compose_layers(&[visible, hidden]);
        assert_eq!(composed.paths(), vec!["/A".to_string()]);
    }

    #[test]
    fn test_parse_failure_becomes_warning() {
        let composed = compose_layers(&[
            source("bad", LayerStatus::Wip, "def \"A\" {"),
            source("good", LayerStatus::Wip, "def \"B\" {}"),
        ]);
        assert_eq!(composed.paths(), vec!["/B".to_string()]);
        let warning = composed.warnings.iter().next().unwrap();
        assert_eq!(warning.kind, ErrorKind::Parse);
    }

    #[test]
    fn test_reference_resolution() {
        let mut composer = Composer::new();
        composer.add_document(
            "lib/door.usda",
            parse("def Mesh \"Door\" { custom double width = 0.9\n custom string color = \"oak\"\n def \"Handle\" {} }")
                .unwrap(),
        );
        let site = LayerSource::new(
            Layer::new("site", "site.usda").with_status(LayerStatus::Shared),
            "def \"Entry\" (\n    prepend references = @./lib/door.usda@</Door>\n)\n{\n    custom string color = \"red\"\n}\n",
        );

        let composed = composer.compose(&[site]);
        let entry = composed.find("/Entry").unwrap();
        assert_eq!(entry.type_name.as_deref(), Some("Mesh"));
        assert_eq!(entry.text_property("color"), Some("red"));
        assert_eq!(entry.property("width").unwrap().value, PropertyValue::Double(0.9));

        let handle = composed.find("/Entry/Handle").unwrap();
        assert_eq!(handle.source.as_ref().unwrap().document, "lib/door.usda");
        assert_eq!(handle.status(), Some("Shared"));
        assert!(composed.warnings.is_empty());
    }

    #[test]
    fn test_missing_referent_degrades_to_placeholder() {
        let site = source(
            "site",
            LayerStatus::Wip,
            "def \"Entry\" (\n    references = @./missing.usda@</Door>\n)\n{\n}\n",
        );
        let composed = compose_layers(&[site]);
        assert!(composed.find("/Entry").unwrap().is_placeholder());
        assert_eq!(composed.warnings.len(), 1);
    }

    #[test]
    fn test_reference_cycle_is_cut() {
        let a = source(
            "a",
            LayerStatus::Wip,
            "def \"A\" (\n    references = @./b.usda@</B>\n)\n{\n}\n",
        );
        let b = source(
            "b",
            LayerStatus::Wip,
            "def \"B\" (\n    references = @./a.usda@</A>\n)\n{\n}\n",
        );

        let composed = compose_layers(&[a, b]);
        assert_eq!(composed.roots.len(), 2);
        assert!(composed
            .warnings
            .iter()
            .any(|w| w.message.contains("cycle")));
    }

    #[test]
    fn test_explicit_status_is_kept() {
        let composed = compose_layers(&[source(
            "a",
            LayerStatus::Published,
            "def \"A\" { custom string status = \"WIP\"\n def \"B\" {} }",
        )]);
        assert_eq!(composed.effective_status("/A"), Some(LayerStatus::Wip));
        assert_eq!(composed.effective_status("/A/B"), Some(LayerStatus::Published));
    }
}
