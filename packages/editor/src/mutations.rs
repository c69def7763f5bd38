//! # Document Mutations
//!
//! The operations the property panel and outliner issue against a layer
//! document. Each mutation validates its target against the current text
//! before producing anything, so a rejected mutation never touches the
//! document.

use crate::errors::EditError;
use crate::text_edit::{self, is_valid_property_name};
use serde::{Deserialize, Serialize};
use stagehand_parser::ast::PropertyType;
use stagehand_parser::{prim_path, scan_outline, validate_property_value};

/// Semantic edits on a layer document
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum Mutation {
    /// Insert or replace one typed property
    SetProperty {
        path: String,
        name: String,
        value: String,
        value_type: PropertyType,
    },

    /// Rename a prim (descendant paths follow)
    RenamePrim { path: String, new_name: String },

    /// Append a raw prim block as the last child of `parent_path`
    InsertPrim { parent_path: String, block: String },

    /// Remove a prim and its children
    RemovePrim { path: String },
}

#[derive(Debug, Clone, PartialEq)]
pub struct MutationResult {
    /// Full text after the edit
    pub text: String,
    pub affected_paths: Vec<String>,
    /// (old, new) pairs for renames
    pub renamed: Vec<(String, String)>,
}

impl Mutation {
    /// Primary path the mutation targets
    pub fn target_path(&self) -> &str {
        match self {
            Mutation::SetProperty { path, .. }
            | Mutation::RenamePrim { path, .. }
            | Mutation::RemovePrim { path } => path,
            Mutation::InsertPrim { parent_path, .. } => parent_path,
        }
    }

    /// Check the mutation against `source` without applying it
    pub fn validate(&self, source: &str) -> Result<(), EditError> {
        match self {
            Mutation::SetProperty {
                path,
                name,
                value,
                value_type,
            } => {
                if !is_valid_property_name(name) {
                    return Err(EditError::InvalidPropertyName(name.clone()));
                }
                let validation = validate_property_value(value, *value_type);
                if !validation.valid {
                    return Err(EditError::InvalidValue {
                        name: name.clone(),
                        message: validation.message.unwrap_or_default(),
                    });
                }
                Self::require_prim(source, path)
            }
            Mutation::RenamePrim { path, new_name } => {
                if !prim_path::is_valid_name(new_name) {
                    return Err(EditError::InvalidName(new_name.clone()));
                }
                Self::require_prim(source, path)
            }
            Mutation::InsertPrim { parent_path, .. } => {
                if prim_path::is_root(parent_path) {
                    Ok(())
                } else {
                    Self::require_prim(source, parent_path).map_err(|_| {
                        EditError::ParentNotFound(parent_path.clone())
                    })
                }
            }
            Mutation::RemovePrim { path } => Self::require_prim(source, path),
        }
    }

    /// Apply the mutation to `source`, returning the new text
    pub fn apply(&self, source: &str) -> Result<MutationResult, EditError> {
        self.validate(source)?;

        match self {
            Mutation::SetProperty {
                path,
                name,
                value,
                value_type,
            } => {
                let text = text_edit::set_property(source, path, name, value, *value_type)?;
                Ok(MutationResult {
                    text,
                    affected_paths: vec![path.clone()],
                    renamed: Vec::new(),
                })
            }
            Mutation::RenamePrim { path, new_name } => {
                let outcome = text_edit::rename_prim(source, path, new_name)?;
                Ok(MutationResult {
                    text: outcome.text,
                    affected_paths: outcome.renamed.iter().map(|(_, new)| new.clone()).collect(),
                    renamed: outcome.renamed,
                })
            }
            Mutation::InsertPrim { parent_path, block } => {
                let outcome = text_edit::insert_prim(source, parent_path, block)?;
                Ok(MutationResult {
                    text: outcome.text,
                    affected_paths: outcome.affected,
                    renamed: Vec::new(),
                })
            }
            Mutation::RemovePrim { path } => {
                let outcome = text_edit::remove_prim(source, path)?;
                Ok(MutationResult {
                    text: outcome.text,
                    affected_paths: outcome.affected,
                    renamed: Vec::new(),
                })
            }
        }
    }

    fn require_prim(source: &str, path: &str) -> Result<(), EditError> {
        let outline = scan_outline(source)?;
        if outline.find(path).is_some() {
            Ok(())
        } else {
            Err(EditError::PrimNotFound(path.to_string()))
        }
    }
}
