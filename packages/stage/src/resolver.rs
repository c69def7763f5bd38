/// Reference and payload resolution
///
/// Holds the parsed documents composition may reach through composition
/// arcs: every visible layer plus any extra referenced documents.
use crate::error::StageError;
use stagehand_parser::ast::{CompositionArc, Prim, SceneDocument};
use std::collections::HashMap;

#[derive(Clone, Debug, Default)]
pub struct Resolver {
    /// Normalized document path -> parsed document
    documents: HashMap<String, SceneDocument>,
}

impl Resolver {
    pub fn new() -> Self {
        Self {
            documents: HashMap::new(),
        }
    }

    pub fn add_document(&mut self, path: &str, doc: SceneDocument) {
        self.documents.insert(normalize(path), doc);
    }

    pub fn has_document(&self, path: &str) -> bool {
        self.documents.contains_key(&normalize(path))
    }

    /// Locate the referent of `arc`, authored in document `referencing`
    ///
    /// Returns the normalized referenced document path and a copy of the
    /// referent subtree (paths as authored in that document).
    pub fn resolve(
        &self,
        referencing: &str,
        arc: &CompositionArc,
    ) -> Result<(String, Prim), StageError> {
        let document = resolve_asset_path(referencing, &arc.asset);
        let doc = self
            .documents
            .get(&document)
            .ok_or_else(|| StageError::DocumentNotFound {
                document: document.clone(),
                referenced_by: referencing.to_string(),
            })?;

        let referent = match &arc.target {
            Some(target) => doc.find_prim(target),
            None => doc.default_root(),
        };

        match referent {
            Some(prim) => Ok((document, prim.clone())),
            None => Err(StageError::ReferentNotFound {
                document,
                path: arc.target.clone().unwrap_or_else(|| "<defaultPrim>".to_string()),
            }),
        }
    }
}

/// Resolve an asset path relative to the directory of `referencing`
///
/// Paths starting with `/` are relative to the project root.
pub fn resolve_asset_path(referencing: &str, asset: &str) -> String {
    if let Some(rooted) = asset.strip_prefix('/') {
        return normalize(rooted);
    }
    let directory = match referencing.rfind('/') {
        Some(index) => &referencing[..index],
        None => "",
    };
    if directory.is_empty() {
        normalize(asset)
    } else {
        normalize(&format!("{}/{}", directory, asset))
    }
}

/// Collapse `.` and `..` segments
pub fn normalize(path: &str) -> String {
    let mut parts: Vec<&str> = Vec::new();
    for segment in path.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                if matches!(parts.last(), Some(last) if *last != "..") {
                    parts.pop();
                } else {
                    parts.push("..");
                }
            }
            other => parts.push(other),
        }
    }
    parts.join("/")
}
