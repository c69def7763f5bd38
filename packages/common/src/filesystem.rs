use crate::error::CommonError;
use crate::result::CommonResult;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Storage abstraction for named scene documents.
///
/// Document names are the relative file paths used in the layer stack
/// (`layers/site.usda`). The core only ever sees resident text; loading
/// happens through this trait before any core call.
pub trait DocumentStore {
    /// Check if a document exists
    fn exists(&self, name: &str) -> bool;

    /// Read the full text of a document
    fn read(&self, name: &str) -> CommonResult<String>;

    /// Replace the full text of a document, creating it if needed
    fn write(&mut self, name: &str, text: &str) -> CommonResult<()>;
}

/// Real file system implementation rooted at a project directory
pub struct RealFileSystem {
    root: PathBuf,
}

impl RealFileSystem {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn resolve(&self, name: &str) -> PathBuf {
        let path = Path::new(name);
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.root.join(path)
        }
    }
}

impl DocumentStore for RealFileSystem {
    fn exists(&self, name: &str) -> bool {
        self.resolve(name).is_file()
    }

    fn read(&self, name: &str) -> CommonResult<String> {
        let path = self.resolve(name);
        if !path.is_file() {
            return Err(CommonError::DocumentNotFound(name.to_string()));
        }
        Ok(std::fs::read_to_string(path)?)
    }

    fn write(&mut self, name: &str, text: &str) -> CommonResult<()> {
        let path = self.resolve(name);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, text)?;
        Ok(())
    }
}

/// In-memory document store for testing
#[derive(Debug, Default, Clone)]
pub struct MemoryFileSystem {
    pub documents: BTreeMap<String, String>,
}

impl MemoryFileSystem {
    pub fn new() -> Self {
        Self {
            documents: BTreeMap::new(),
        }
    }

    pub fn add_document(&mut self, name: impl Into<String>, text: impl Into<String>) {
        self.documents.insert(name.into(), text.into());
    }
}

impl DocumentStore for MemoryFileSystem {
    fn exists(&self, name: &str) -> bool {
        self.documents.contains_key(name)
    }

    fn read(&self, name: &str) -> CommonResult<String> {
        self.documents
            .get(name)
            .cloned()
            .ok_or_else(|| CommonError::DocumentNotFound(name.to_string()))
    }

    fn write(&mut self, name: &str, text: &str) -> CommonResult<()> {
        self.documents.insert(name.to_string(), text.to_string());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_store_round_trip() {
        let mut store = MemoryFileSystem::new();
        assert!(!store.exists("a.usda"));

        store.write("a.usda", "#usda 1.0\n").unwrap();
        assert!(store.exists("a.usda"));
        assert_eq!(store.read("a.usda").unwrap(), "#usda 1.0\n");
    }

    #[test]
    fn test_missing_document_error() {
        let store = MemoryFileSystem::new();
        let err = store.read("missing.usda").unwrap_err();
        assert!(matches!(err, CommonError::DocumentNotFound(_)));
    }

    #[test]
    fn test_real_store_creates_parent_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = RealFileSystem::new(dir.path());

        store.write("layers/site.usda", "#usda 1.0\n").unwrap();
        assert!(store.exists("layers/site.usda"));
        assert_eq!(store.read("layers/site.usda").unwrap(), "#usda 1.0\n");
    }
}
