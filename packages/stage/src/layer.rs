use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Lifecycle status of a layer or prim
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum LayerStatus {
    #[serde(rename = "WIP")]
    Wip,
    Shared,
    Published,
    Archived,
}

impl LayerStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            LayerStatus::Wip => "WIP",
            LayerStatus::Shared => "Shared",
            LayerStatus::Published => "Published",
            LayerStatus::Archived => "Archived",
        }
    }
}

impl fmt::Display for LayerStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LayerStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "wip" => Ok(LayerStatus::Wip),
            "shared" => Ok(LayerStatus::Shared),
            "published" => Ok(LayerStatus::Published),
            "archived" => Ok(LayerStatus::Archived),
            other => Err(format!("unknown status '{}'", other)),
        }
    }
}

/// One entry of the layer stack
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Layer {
    pub id: String,
    pub file_path: String,
    pub status: LayerStatus,
    /// Owning user; ownerless layers are writable by managers only
    #[serde(default)]
    pub owner: Option<String>,
    #[serde(default = "default_visible")]
    pub visible: bool,
}

fn default_visible() -> bool {
    true
}

impl Layer {
    pub fn new(id: impl Into<String>, file_path: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            file_path: file_path.into(),
            status: LayerStatus::Wip,
            owner: None,
            visible: true,
        }
    }

    pub fn with_status(mut self, status: LayerStatus) -> Self {
        self.status = status;
        self
    }

    pub fn with_owner(mut self, owner: impl Into<String>) -> Self {
        self.owner = Some(owner.into());
        self
    }

    pub fn hidden(mut self) -> Self {
        self.visible = false;
        self
    }
}

/// Find the layer backed by `document`
pub fn find_layer<'a>(layers: &'a [Layer], document: &str) -> Option<&'a Layer> {
    layers.iter().find(|l| l.file_path == document)
}

/// A layer together with its resident document text
#[derive(Debug, Clone)]
pub struct LayerSource {
    pub layer: Layer,
    pub content: String,
}

impl LayerSource {
    pub fn new(layer: Layer, content: impl Into<String>) -> Self {
        Self {
            layer,
            content: content.into(),
        }
    }
}
