//! In-memory store

use crate::error::{StoreError, StoreResult};
use crate::ModuleStore;
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::{Arc, RwLock};

/// An in-memory module store.
///
/// All files are stored in memory using a `BTreeMap`, making it suitable
/// for testing and embedding scenarios where disk access is not desired.
///
/// Every successful `read_file` is counted per path, so tests can assert
/// that a module source was *not* read before its first attribute access.
///
/// # Example
/// ```
/// use latemod_vfs::{MemoryStore, ModuleStore};
/// use std::path::Path;
///
/// let store = MemoryStore::new();
/// store.write_file(Path::new("/m.mod"), b"var x = 1;").unwrap();
/// assert_eq!(store.read_count(Path::new("/m.mod")), 0);
/// store.read_file(Path::new("/m.mod")).unwrap();
/// assert_eq!(store.read_count(Path::new("/m.mod")), 1);
/// ```
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    files: Arc<RwLock<BTreeMap<String, Vec<u8>>>>,
    reads: Arc<RwLock<BTreeMap<String, usize>>>,
}

impl MemoryStore {
    /// Create a new empty memory store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a new memory store pre-populated with files.
    ///
    /// # Arguments
    /// * `files` - Iterator of (path, content) tuples
    pub fn with_files<I, S>(files: I) -> Self
    where
        I: IntoIterator<Item = (S, Vec<u8>)>,
        S: AsRef<str>,
    {
        let store = Self::new();
        {
            let mut map = store.files.write().unwrap();
            for (path, content) in files {
                map.insert(path.as_ref().to_string(), content);
            }
        }
        store
    }

    /// How many times `read_file` succeeded for this path.
    pub fn read_count(&self, path: &Path) -> usize {
        let normalized = self.normalize_path(path);
        self.reads
            .read()
            .map(|r| r.get(&normalized).copied().unwrap_or(0))
            .unwrap_or(0)
    }

    /// Total successful reads across all paths.
    pub fn total_reads(&self) -> usize {
        self.reads
            .read()
            .map(|r| r.values().sum())
            .unwrap_or(0)
    }

    /// Normalize a path string for internal storage.
    /// Uses forward slashes consistently for cross-platform compatibility.
    fn normalize_path(&self, path: &Path) -> String {
        path.to_string_lossy().replace('\\', "/")
    }
}

impl ModuleStore for MemoryStore {
    fn read_file(&self, path: &Path) -> StoreResult<Vec<u8>> {
        let normalized = self.normalize_path(path);
        let files = self.files.read().map_err(|_| StoreError::Custom {
            message: String::from("Lock poisoned"),
        })?;

        let content = files
            .get(&normalized)
            .cloned()
            .ok_or_else(|| StoreError::NotFound {
                path: normalized.clone(),
            })?;

        if let Ok(mut reads) = self.reads.write() {
            *reads.entry(normalized).or_insert(0) += 1;
        }
        Ok(content)
    }

    fn write_file(&self, path: &Path, content: &[u8]) -> StoreResult<()> {
        let normalized = self.normalize_path(path);
        let mut files = self.files.write().map_err(|_| StoreError::Custom {
            message: String::from("Lock poisoned"),
        })?;
        files.insert(normalized, content.to_vec());
        Ok(())
    }

    fn exists(&self, path: &Path) -> bool {
        let normalized = self.normalize_path(path);
        match self.files.read() {
            Ok(files) => files.contains_key(&normalized),
            Err(_) => false,
        }
    }

    fn is_file(&self, path: &Path) -> bool {
        self.exists(path)
    }

    fn is_dir(&self, path: &Path) -> bool {
        // A directory exists if any stored file lives under it.
        let mut prefix = self.normalize_path(path);
        if !prefix.ends_with('/') {
            prefix.push('/');
        }
        match self.files.read() {
            Ok(files) => files.keys().any(|k| k.starts_with(&prefix)),
            Err(_) => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_store_is_empty() {
        let store = MemoryStore::new();
        assert!(!store.exists(Path::new("/anything.mod")));
    }

    #[test]
    fn test_write_and_read() {
        let store = MemoryStore::new();
        let path = Path::new("/m.mod");

        store.write_file(path, b"var x = 1;").unwrap();
        let content = store.read_file(path).unwrap();
        assert_eq!(content, b"var x = 1;");
    }

    #[test]
    fn test_with_files() {
        let store = MemoryStore::with_files([
            ("/a.mod", b"content a".to_vec()),
            ("/b.mod", b"content b".to_vec()),
        ]);

        assert_eq!(store.read_file(Path::new("/a.mod")).unwrap(), b"content a");
        assert_eq!(store.read_file(Path::new("/b.mod")).unwrap(), b"content b");
    }

    #[test]
    fn test_read_nonexistent() {
        let store = MemoryStore::new();
        let result = store.read_file(Path::new("/missing.mod"));
        assert!(matches!(result.unwrap_err(), StoreError::NotFound { .. }));
    }

    #[test]
    fn test_read_counting() {
        let store = MemoryStore::with_files([("/m.mod", b"var x = 1;".to_vec())]);
        let path = Path::new("/m.mod");

        assert_eq!(store.read_count(path), 0);
        store.read_file(path).unwrap();
        store.read_file(path).unwrap();
        assert_eq!(store.read_count(path), 2);
        assert_eq!(store.total_reads(), 2);

        // Failed reads are not counted.
        let _ = store.read_file(Path::new("/missing.mod"));
        assert_eq!(store.total_reads(), 2);
    }

    #[test]
    fn test_is_dir_by_prefix() {
        let store = MemoryStore::with_files([("/pkg/init.mod", b"".to_vec())]);
        assert!(store.is_dir(Path::new("/pkg")));
        assert!(!store.is_dir(Path::new("/pkg/init.mod")));
        assert!(!store.is_dir(Path::new("/other")));
    }

    #[test]
    fn test_clone_shares_data() {
        let store1 = MemoryStore::new();
        let path = Path::new("/shared.mod");

        store1.write_file(path, b"shared").unwrap();

        let store2 = store1.clone();
        assert!(store2.exists(path));

        store2.read_file(path).unwrap();
        assert_eq!(store1.read_count(path), 1);
    }

    #[test]
    fn test_backslash_normalization() {
        let store = MemoryStore::new();
        store.write_file(Path::new("/dir/file.mod"), b"x").unwrap();
        assert!(store.exists(Path::new("/dir\\file.mod")));
    }
}
