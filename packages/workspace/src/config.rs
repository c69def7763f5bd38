use crate::error::WorkspaceResult;
use serde::{Deserialize, Serialize};
use stagehand_common::CommonError;
use stagehand_governance::User;
use stagehand_stage::Layer;
use std::path::Path;

pub const DEFAULT_CONFIG_NAME: &str = "stagehand.config.json";

/// Stagehand project file (`stagehand.config.json`)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectConfig {
    /// Name of the default root prim
    #[serde(default = "default_scene_name")]
    pub scene_name: String,

    /// Document holding the `ChangeLog` block
    #[serde(default = "default_change_log_file")]
    pub change_log_file: String,

    /// Layer stack, strongest first
    #[serde(default)]
    pub layers: Vec<Layer>,

    #[serde(default)]
    pub users: Vec<User>,

    /// Outline rows produced per rebuild step
    #[serde(default = "default_rebuild_chunk_size")]
    pub rebuild_chunk_size: usize,
}

fn default_scene_name() -> String {
    "World".to_string()
}

fn default_change_log_file() -> String {
    "changelog.usda".to_string()
}

fn default_rebuild_chunk_size() -> usize {
    200
}

impl ProjectConfig {
    /// Load the config from a project directory; a missing file gives defaults
    pub fn load(dir: &Path) -> WorkspaceResult<Self> {
        let config_path = dir.join(DEFAULT_CONFIG_NAME);

        if config_path.exists() {
            let content = std::fs::read_to_string(&config_path).map_err(CommonError::from)?;
            Ok(serde_json::from_str(&content)?)
        } else {
            Ok(ProjectConfig::default())
        }
    }

    /// Write the config back, e.g. after a layer status change
    pub fn save(&self, dir: &Path) -> WorkspaceResult<()> {
        std::fs::write(dir.join(DEFAULT_CONFIG_NAME), self.to_json()?)
            .map_err(CommonError::from)?;
        Ok(())
    }

    /// Pretty JSON with a trailing newline, as written to disk
    pub fn to_json(&self) -> WorkspaceResult<String> {
        Ok(serde_json::to_string_pretty(self)? + "\n")
    }

    pub fn find_user(&self, name: &str) -> Option<&User> {
        self.users.iter().find(|u| u.name == name)
    }
}

impl Default for ProjectConfig {
    fn default() -> Self {
        Self {
            scene_name: default_scene_name(),
            change_log_file: default_change_log_file(),
            layers: vec![],
            users: vec![],
            rebuild_chunk_size: default_rebuild_chunk_size(),
        }
    }
}
