//! Real loader adapters
//!
//! Two adapters expose a uniform load-on-demand capability: [`FileLoader`]
//! over store-backed directory roots and [`ArchiveLoader`] over `.lpk`
//! archive images. [`OnDemandLoader`] wraps either one and, instead of
//! loading, registers a placeholder in the cache.

use std::path::{Path, PathBuf};
use std::rc::Rc;
use std::sync::Arc;

use latemod_vfs::{ArchiveStore, ModuleStore};

use crate::error::LoadError;
use crate::module::{ModuleRef, ModuleSlot};
use crate::program;
use crate::registry::ModuleRegistry;

/// Module source file extension
pub const MODULE_EXTENSION: &str = "mod";

/// Package entry file inside a package directory
pub const PACKAGE_INIT: &str = "init.mod";

/// Candidate relative paths for a dotted module name.
///
/// `a.b` probes `a/b.mod` then `a/b/init.mod`.
pub fn module_candidates(name: &str) -> Vec<PathBuf> {
    let stem = name.replace('.', "/");
    vec![
        PathBuf::from(format!("{}.{}", stem, MODULE_EXTENSION)),
        PathBuf::from(format!("{}/{}", stem, PACKAGE_INIT)),
    ]
}

/// Find-only probe under one search root. Reads no source bytes.
pub(crate) fn probe_root(store: &dyn ModuleStore, root: &Path, name: &str) -> Option<PathBuf> {
    module_candidates(name)
        .into_iter()
        .map(|candidate| root.join(candidate))
        .find(|path| store.is_file(path))
}

/// The capability to actually read and execute a module source.
///
/// Stateless beyond construction parameters; the registry's resolution
/// cache guarantees each loader is invoked at most once per identifier on
/// the happy path.
pub trait ModuleLoader {
    /// Load and execute the module, returning a fully initialized module
    /// registered in the cache. Failures propagate verbatim.
    fn load(&self, reg: &mut ModuleRegistry, name: &str) -> Result<ModuleRef, LoadError>;

    /// Re-execute the module source into an existing module object, so
    /// live references observe the reloaded state.
    fn load_into(&self, reg: &mut ModuleRegistry, module: &ModuleRef) -> Result<(), LoadError>;

    /// Where the source lives, for ignore-by-path checks and diagnostics
    fn source_path(&self) -> Option<PathBuf>;

    /// Short human-readable description for placeholder debug output
    fn describe(&self) -> String;
}

/// Loads a module from a resolved path in a module store.
///
/// The source bytes are read inside `load`; the store scopes the
/// underlying handle to the call, so it is released on every exit path.
/// Line endings are normalized by the program parser.
pub struct FileLoader {
    store: Arc<dyn ModuleStore>,
    path: PathBuf,
}

impl FileLoader {
    pub fn new(store: Arc<dyn ModuleStore>, path: PathBuf) -> Self {
        Self { store, path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_source(&self) -> Result<String, LoadError> {
        let bytes = self
            .store
            .read_file(&self.path)
            .map_err(|source| LoadError::Store {
                path: self.path.clone(),
                source,
            })?;
        String::from_utf8(bytes).map_err(|_| LoadError::Parse {
            path: self.path.clone(),
            line: 0,
            message: "source is not valid UTF-8".to_string(),
        })
    }

    fn run(
        &self,
        reg: &mut ModuleRegistry,
        name: &str,
        target: Option<&ModuleRef>,
    ) -> Result<ModuleRef, LoadError> {
        let source = self.read_source()?;
        program::execute(reg, name, &source, Some(self.path.clone()), target)
    }
}

impl ModuleLoader for FileLoader {
    fn load(&self, reg: &mut ModuleRegistry, name: &str) -> Result<ModuleRef, LoadError> {
        self.run(reg, name, None)
    }

    fn load_into(&self, reg: &mut ModuleRegistry, module: &ModuleRef) -> Result<(), LoadError> {
        let name = module.borrow().name().to_string();
        self.run(reg, &name, Some(module))?;
        Ok(())
    }

    fn source_path(&self) -> Option<PathBuf> {
        Some(self.path.clone())
    }

    fn describe(&self) -> String {
        format!("file loader ({})", self.path.display())
    }
}

/// Loads modules out of a `.lpk` archive image.
///
/// Wraps the archive store's capabilities (`is_package`, `get_source`,
/// `get_data`, `get_filename`) and forwards `load` to archive-backed
/// execution.
pub struct ArchiveLoader {
    store: ArchiveStore,
}

impl ArchiveLoader {
    pub fn new(store: ArchiveStore) -> Self {
        Self { store }
    }

    /// Path of the backing archive file
    pub fn archive_path(&self) -> &Path {
        self.store.archive_path()
    }

    /// The archive entry a dotted name resolves to, if any
    pub fn find(&self, name: &str) -> Option<PathBuf> {
        module_candidates(name)
            .into_iter()
            .find(|candidate| self.store.is_file(candidate))
    }

    /// Whether the name resolves to a package (directory with an init file)
    pub fn is_package(&self, name: &str) -> bool {
        let stem = name.replace('.', "/");
        self.store
            .is_file(Path::new(&format!("{}/{}", stem, PACKAGE_INIT)))
    }

    /// Full diagnostic filename: archive path joined with the entry
    pub fn get_filename(&self, name: &str) -> Option<PathBuf> {
        self.find(name)
            .map(|entry| self.store.archive_path().join(entry))
    }

    /// Raw bytes of an arbitrary archive entry
    pub fn get_data(&self, entry: &Path) -> Result<Vec<u8>, LoadError> {
        self.store.read_file(entry).map_err(|source| LoadError::Store {
            path: self.store.archive_path().join(entry),
            source,
        })
    }

    /// The module's source text
    pub fn get_source(&self, name: &str) -> Result<String, LoadError> {
        let entry = self.find(name).ok_or_else(|| LoadError::NotFound {
            name: name.to_string(),
            tried: module_candidates(name)
                .into_iter()
                .map(|c| self.store.archive_path().join(c))
                .collect(),
        })?;
        let bytes = self.get_data(&entry)?;
        String::from_utf8(bytes).map_err(|_| LoadError::Parse {
            path: self.store.archive_path().join(entry),
            line: 0,
            message: "source is not valid UTF-8".to_string(),
        })
    }

    fn run(
        &self,
        reg: &mut ModuleRegistry,
        name: &str,
        target: Option<&ModuleRef>,
    ) -> Result<ModuleRef, LoadError> {
        let source = self.get_source(name)?;
        let origin = self.get_filename(name);
        program::execute(reg, name, &source, origin, target)
    }
}

impl ModuleLoader for ArchiveLoader {
    fn load(&self, reg: &mut ModuleRegistry, name: &str) -> Result<ModuleRef, LoadError> {
        self.run(reg, name, None)
    }

    fn load_into(&self, reg: &mut ModuleRegistry, module: &ModuleRef) -> Result<(), LoadError> {
        let name = module.borrow().name().to_string();
        self.run(reg, &name, Some(module))?;
        Ok(())
    }

    fn source_path(&self) -> Option<PathBuf> {
        Some(self.store.archive_path().to_path_buf())
    }

    fn describe(&self) -> String {
        format!("archive loader ({})", self.store.archive_path().display())
    }
}

/// Hook-facing loader surface: produces a cache slot rather than a module.
pub trait SlotLoader {
    fn load_module(&self, reg: &mut ModuleRegistry, name: &str) -> Result<ModuleSlot, LoadError>;
}

/// "Loads" a module by installing a placeholder for it.
///
/// The real loader is only invoked later, by the resolution engine, on the
/// first attribute access.
pub struct OnDemandLoader {
    real: Rc<dyn ModuleLoader>,
}

impl OnDemandLoader {
    pub fn new(real: Rc<dyn ModuleLoader>) -> Self {
        Self { real }
    }
}

impl SlotLoader for OnDemandLoader {
    fn load_module(&self, reg: &mut ModuleRegistry, name: &str) -> Result<ModuleSlot, LoadError> {
        if let Some(slot) = reg.cached(name) {
            return Ok(slot);
        }
        let placeholder = reg.new_placeholder(name, self.real.clone());
        Ok(ModuleSlot::Lazy(placeholder))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use latemod_vfs::{ArchiveImage, ArchiveWriter, MemoryStore};

    #[test]
    fn test_module_candidates() {
        assert_eq!(
            module_candidates("math"),
            vec![PathBuf::from("math.mod"), PathBuf::from("math/init.mod")]
        );
        assert_eq!(
            module_candidates("pkg.sub"),
            vec![
                PathBuf::from("pkg/sub.mod"),
                PathBuf::from("pkg/sub/init.mod")
            ]
        );
    }

    #[test]
    fn test_probe_root_prefers_plain_file() {
        let store = MemoryStore::with_files([
            ("/mods/math.mod", b"var PI = 3.14;".to_vec()),
            ("/mods/pkg/init.mod", b"".to_vec()),
        ]);

        assert_eq!(
            probe_root(&store, Path::new("/mods"), "math"),
            Some(PathBuf::from("/mods/math.mod"))
        );
        assert_eq!(
            probe_root(&store, Path::new("/mods"), "pkg"),
            Some(PathBuf::from("/mods/pkg/init.mod"))
        );
        assert_eq!(probe_root(&store, Path::new("/mods"), "missing"), None);
        // Probing reads no bytes.
        assert_eq!(store.total_reads(), 0);
    }

    fn test_archive() -> ArchiveLoader {
        let mut writer = ArchiveWriter::new();
        writer.add_file("math.mod", b"var PI = 3.14;".to_vec());
        writer.add_file("pkg/init.mod", b"var version = 1;".to_vec());
        writer.add_file("pkg/sub.mod", b"var deep = true;".to_vec());
        let image = ArchiveImage::from_bytes(writer.finish()).unwrap();
        ArchiveLoader::new(ArchiveStore::new(image, "bundle.lpk"))
    }

    #[test]
    fn test_archive_find_and_metadata() {
        let loader = test_archive();

        assert_eq!(loader.find("math"), Some(PathBuf::from("math.mod")));
        assert_eq!(loader.find("pkg.sub"), Some(PathBuf::from("pkg/sub.mod")));
        assert_eq!(loader.find("missing"), None);

        assert!(loader.is_package("pkg"));
        assert!(!loader.is_package("math"));

        assert_eq!(
            loader.get_filename("pkg.sub"),
            Some(PathBuf::from("bundle.lpk").join("pkg/sub.mod"))
        );
        assert_eq!(loader.get_source("math").unwrap(), "var PI = 3.14;");
    }

    #[test]
    fn test_archive_get_source_missing() {
        let loader = test_archive();
        let err = loader.get_source("missing").unwrap_err();
        assert!(matches!(err, LoadError::NotFound { .. }));
    }
}
