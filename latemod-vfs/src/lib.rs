//! Latemod module store
//!
//! A module-source store abstraction with multiple backend implementations.
//! Loaders read module sources through the [`ModuleStore`] trait and stay
//! agnostic of where the bytes live: on disk, in memory, or inside a
//! bundled `.lpk` archive.
//!
//! # Usage
//! ```rust,ignore
//! use latemod_vfs::{ModuleStore, MemoryStore};
//! use std::path::Path;
//!
//! let store = MemoryStore::new();
//! store.write_file(Path::new("/math.mod"), b"var PI = 3.14;").unwrap();
//! let content = store.read_file(Path::new("/math.mod")).unwrap();
//! ```

mod archive;
mod error;
mod memory;
mod native;
mod r#trait;

pub use archive::{ArchiveError, ArchiveImage, ArchiveStore, ArchiveWriter, ARCHIVE_EXTENSION};
pub use error::{StoreError, StoreResult};
pub use memory::MemoryStore;
pub use native::NativeStore;
pub use r#trait::ModuleStore;

/// Create a new memory-based store.
pub fn memory_store() -> MemoryStore {
    MemoryStore::new()
}

/// Create a new native file system store.
pub fn native_store() -> NativeStore {
    NativeStore::new()
}
