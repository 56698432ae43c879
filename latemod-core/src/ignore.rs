//! The bypass (ignore) policy
//!
//! Some modules misbehave behind a placeholder, usually because their side
//! effects are needed at import time. Three independent sets exempt them
//! from lazy treatment: exact names, package prefixes, and source-path
//! substrings. Matching modules load eagerly through the normal path.

use std::collections::BTreeSet;
use std::path::Path;

use latemod_config::IgnoreConfig;
use once_cell::sync::Lazy;

/// Names that bypass lazy importing by default. Both run import-time side
/// effects the rest of the runtime depends on.
static DEFAULT_IGNORED_NAMES: Lazy<BTreeSet<String>> = Lazy::new(|| {
    ["encodings", "warnings"]
        .into_iter()
        .map(String::from)
        .collect()
});

/// The decision procedure for exempting a module from lazy importing.
#[derive(Debug, Clone)]
pub struct IgnorePolicy {
    names: BTreeSet<String>,
    prefixes: BTreeSet<String>,
    paths: BTreeSet<String>,
}

impl Default for IgnorePolicy {
    fn default() -> Self {
        Self {
            names: DEFAULT_IGNORED_NAMES.clone(),
            prefixes: BTreeSet::new(),
            paths: BTreeSet::new(),
        }
    }
}

impl IgnorePolicy {
    /// Defaults plus the configured extra entries. Path entries are
    /// lowercased here so the match in [`should_ignore`] stays a plain
    /// substring test.
    ///
    /// [`should_ignore`]: IgnorePolicy::should_ignore
    pub fn from_config(config: &IgnoreConfig) -> Self {
        let mut policy = Self::default();
        policy.names.extend(config.names.iter().cloned());
        policy.prefixes.extend(config.prefixes.iter().cloned());
        policy
            .paths
            .extend(config.paths.iter().map(|p| p.to_lowercase()));
        policy
    }

    pub fn add_name(&mut self, name: impl Into<String>) {
        self.names.insert(name.into());
    }

    pub fn add_prefix(&mut self, prefix: impl Into<String>) {
        self.prefixes.insert(prefix.into());
    }

    pub fn add_path(&mut self, fragment: impl Into<String>) {
        self.paths.insert(fragment.into().to_lowercase());
    }

    /// Whether `name` (resolving to `source_path`, when known) must load
    /// eagerly. A prefix entry matches the package itself and everything
    /// below it; a path entry matches case-insensitively anywhere in the
    /// source path.
    pub fn should_ignore(&self, name: &str, source_path: Option<&Path>) -> bool {
        if self.names.contains(name) {
            return true;
        }
        for prefix in &self.prefixes {
            if name == prefix || name.starts_with(&format!("{}.", prefix)) {
                return true;
            }
        }
        if let Some(path) = source_path {
            let lowered = path.to_string_lossy().to_lowercase();
            if self.paths.iter().any(|fragment| lowered.contains(fragment)) {
                return true;
            }
        }
        false
    }
}
