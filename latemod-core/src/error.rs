//! Core error types
//!
//! A failed lazy resolution must surface exactly as the same eager import
//! failure would, so `LoadError` is propagated verbatim through placeholders
//! and hooks; no error kind is introduced by laziness itself.

use std::path::PathBuf;

use latemod_vfs::{ArchiveError, StoreError};
use thiserror::Error;

/// Errors raised while finding, reading, or executing a module source
#[derive(Debug, Error)]
pub enum LoadError {
    /// No search root produced the module
    #[error("module '{name}' not found (tried {tried:?})")]
    NotFound { name: String, tried: Vec<PathBuf> },

    /// The backing store failed to produce the source bytes
    #[error("failed to read '{}': {source}", path.display())]
    Store {
        path: PathBuf,
        #[source]
        source: StoreError,
    },

    /// The archive image is malformed or missing the entry
    #[error("archive error: {0}")]
    Archive(#[from] ArchiveError),

    /// The module source does not parse
    #[error("failed to parse '{}' (line {line}): {message}", path.display())]
    Parse {
        path: PathBuf,
        line: usize,
        message: String,
    },

    /// Reload was requested for a module with no recorded loader
    #[error("module '{name}' has no loader to reload from")]
    NoLoader { name: String },
}

/// Errors surfaced by attribute access on a module slot
#[derive(Debug, Error)]
pub enum Error {
    /// The resolution itself failed
    #[error(transparent)]
    Load(#[from] LoadError),

    /// The (now resolved) module has no such attribute
    #[error("module '{module}' has no attribute '{attr}'")]
    MissingAttr { module: String, attr: String },
}
