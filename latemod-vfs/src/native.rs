//! Native file system store

use crate::error::{StoreError, StoreResult};
use crate::ModuleStore;
use std::path::Path;

/// A native OS file system store.
///
/// Wraps `std::fs` operations behind the `ModuleStore` interface for local
/// module sources. Reads are scoped: the underlying handle is opened and
/// closed inside `read_file`, on every exit path.
#[derive(Debug, Clone, Default)]
pub struct NativeStore {}

impl NativeStore {
    /// Create a new native store.
    pub fn new() -> Self {
        Self {}
    }
}

impl ModuleStore for NativeStore {
    fn read_file(&self, path: &Path) -> StoreResult<Vec<u8>> {
        std::fs::read(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                StoreError::NotFound {
                    path: path.to_string_lossy().to_string(),
                }
            } else {
                e.into()
            }
        })
    }

    fn write_file(&self, path: &Path, content: &[u8]) -> StoreResult<()> {
        std::fs::write(path, content).map_err(|e| e.into())
    }

    fn exists(&self, path: &Path) -> bool {
        path.exists()
    }

    fn is_file(&self, path: &Path) -> bool {
        path.is_file()
    }

    fn is_dir(&self, path: &Path) -> bool {
        path.is_dir()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_file(name: &str) -> std::path::PathBuf {
        std::env::temp_dir().join(format!("latemod_vfs_{}_{}", name, std::process::id()))
    }

    #[test]
    fn test_native_read_write() {
        let store = NativeStore::new();
        let path = temp_file("rw");
        let _ = std::fs::remove_file(&path);

        store.write_file(&path, b"var x = 1;").unwrap();
        let content = store.read_file(&path).unwrap();
        assert_eq!(content, b"var x = 1;");

        std::fs::remove_file(&path).unwrap();
    }

    #[test]
    fn test_native_exists_and_kind() {
        let store = NativeStore::new();
        let path = temp_file("kind");
        let _ = std::fs::remove_file(&path);

        assert!(!store.exists(&path));
        store.write_file(&path, b"x").unwrap();
        assert!(store.exists(&path));
        assert!(store.is_file(&path));
        assert!(!store.is_dir(&path));

        std::fs::remove_file(&path).unwrap();
    }

    #[test]
    fn test_native_read_nonexistent() {
        let store = NativeStore::new();
        let path = temp_file("missing");
        let _ = std::fs::remove_file(&path);

        let result = store.read_file(&path);
        assert!(matches!(result.unwrap_err(), StoreError::NotFound { .. }));
    }

    #[test]
    fn test_native_is_dir() {
        let store = NativeStore::new();
        assert!(store.is_dir(&std::env::temp_dir()));
    }
}
