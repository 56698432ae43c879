//! ModuleStore trait definition

use crate::error::StoreResult;
use std::path::Path;

/// Module source store trait
///
/// Provides a unified read interface over module sources, decoupling the
/// loaders from specific backends.
///
/// # Implementations
/// - `MemoryStore`: in-memory store (tests, embedding)
/// - `NativeStore`: native OS file system
/// - `ArchiveStore`: read-only view into a `.lpk` archive image
pub trait ModuleStore: Send + Sync {
    /// Read file contents
    ///
    /// # Arguments
    /// * `path` - File path
    ///
    /// # Returns
    /// File contents as bytes, or StoreError
    fn read_file(&self, path: &Path) -> StoreResult<Vec<u8>>;

    /// Write file contents
    ///
    /// Creates the file if it doesn't exist, truncates it if it does.
    /// Read-only backends return `StoreError::ReadOnly`.
    fn write_file(&self, path: &Path, content: &[u8]) -> StoreResult<()>;

    /// Check if path exists
    fn exists(&self, path: &Path) -> bool;

    /// Check if path is a file
    fn is_file(&self, path: &Path) -> bool;

    /// Check if path is a directory
    fn is_dir(&self, path: &Path) -> bool;
}
