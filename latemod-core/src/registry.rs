//! The module registry
//!
//! The explicit context object the whole system hangs off: the module
//! cache, the search roots, the hook chain, the bypass policy, the bind
//! site table for reference rewriting, and the import statistics. Every
//! operation that in a host runtime would touch interpreter globals takes
//! the registry instead.

use std::cell::RefCell;
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::rc::{Rc, Weak};
use std::sync::Arc;

use latemod_config::{RegistryConfig, ReportMode};
use latemod_vfs::{ArchiveImage, ArchiveStore, ModuleStore, NativeStore, ARCHIVE_EXTENSION};
use tracing::{debug, info};

use crate::error::{Error, LoadError};
use crate::hooks::{ArchiveHook, GeneralHook, ImportHook};
use crate::ignore::IgnorePolicy;
use crate::loader::{module_candidates, probe_root, ArchiveLoader, FileLoader, ModuleLoader};
use crate::module::{ModuleRef, ModuleSlot, Scope, ScopeRef, Value};
use crate::placeholder::Placeholder;
use crate::stats::{ImportStats, Reporter, ReportSink};

const TARGET: &str = "latemod::registry";

/// One live binding of a lazy module value: a scope plus the key under
/// which the value was stored. Held weakly so dead scopes fall out of the
/// table on the next rewrite.
struct BindSite {
    scope: Weak<RefCell<Scope>>,
    key: String,
}

/// Module cache, search path, hooks, and import bookkeeping.
pub struct ModuleRegistry {
    store: Arc<dyn ModuleStore>,
    dir_roots: Vec<PathBuf>,
    modules: BTreeMap<String, ModuleSlot>,
    hooks: Vec<Rc<dyn ImportHook>>,
    general: Option<Rc<dyn ImportHook>>,
    archives: BTreeMap<PathBuf, Rc<ArchiveLoader>>,
    ignore: IgnorePolicy,
    stats: ImportStats,
    reporter: Reporter,
    bind_sites: BTreeMap<String, Vec<BindSite>>,
    installed: bool,
}

impl ModuleRegistry {
    /// An empty registry over a store, with default policy and no roots.
    pub fn with_store(store: Arc<dyn ModuleStore>) -> Self {
        Self {
            store,
            dir_roots: Vec::new(),
            modules: BTreeMap::new(),
            hooks: Vec::new(),
            general: None,
            archives: BTreeMap::new(),
            ignore: IgnorePolicy::default(),
            stats: ImportStats::default(),
            reporter: Reporter::default(),
            bind_sites: BTreeMap::new(),
            installed: false,
        }
    }

    /// A registry over the native filesystem with default configuration.
    pub fn native() -> Self {
        Self::with_store(Arc::new(NativeStore::new()))
    }

    /// Build from configuration. Roots with the archive extension are
    /// opened and registered as archives; everything else is a directory
    /// root. Root order is preserved within each kind.
    pub fn new(store: Arc<dyn ModuleStore>, config: &RegistryConfig) -> Result<Self, LoadError> {
        let mut reg = Self::with_store(store);
        reg.ignore = IgnorePolicy::from_config(&config.ignore);
        reg.reporter.set_mode(config.report);
        for root in &config.search_roots {
            if root.extension().and_then(|e| e.to_str()) == Some(ARCHIVE_EXTENSION) {
                reg.register_archive(root)?;
            } else {
                reg.add_root(root.clone());
            }
        }
        Ok(reg)
    }

    // ---- accessors -------------------------------------------------------

    pub fn store(&self) -> Arc<dyn ModuleStore> {
        self.store.clone()
    }

    /// Directory search roots, in search order
    pub fn dir_roots(&self) -> Vec<PathBuf> {
        self.dir_roots.clone()
    }

    pub fn add_root(&mut self, root: PathBuf) {
        self.dir_roots.push(root);
    }

    pub fn is_installed(&self) -> bool {
        self.installed
    }

    pub fn stats(&self) -> &ImportStats {
        &self.stats
    }

    pub(crate) fn stats_mut(&mut self) -> &mut ImportStats {
        &mut self.stats
    }

    pub fn ignore_mut(&mut self) -> &mut IgnorePolicy {
        &mut self.ignore
    }

    pub fn should_ignore(&self, name: &str, source_path: Option<&Path>) -> bool {
        self.ignore.should_ignore(name, source_path)
    }

    pub fn set_report_mode(&mut self, mode: ReportMode) {
        self.reporter.set_mode(mode);
    }

    pub fn set_memory_probe(&mut self, probe: Box<dyn Fn() -> f64>) {
        self.reporter.set_memory_probe(probe);
    }

    pub fn set_report_sink(&mut self, sink: ReportSink) {
        self.reporter.set_sink(sink);
    }

    /// Sorted identifiers currently in the cache
    pub fn module_names(&self) -> Vec<String> {
        self.modules.keys().cloned().collect()
    }

    // ---- cache -----------------------------------------------------------

    /// The cache entry for `name`, if any. Never resolves.
    pub fn cached(&self, name: &str) -> Option<ModuleSlot> {
        self.modules.get(name).cloned()
    }

    pub(crate) fn cache_insert(&mut self, name: &str, slot: ModuleSlot) {
        self.modules.insert(name.to_string(), slot);
    }

    pub(crate) fn cache_remove(&mut self, name: &str) {
        self.modules.remove(name);
    }

    // ---- hooks and archives ---------------------------------------------

    pub fn add_hook(&mut self, hook: Rc<dyn ImportHook>) {
        self.hooks.push(hook);
    }

    /// Remove a previously added hook, by identity.
    pub fn remove_hook(&mut self, hook: &Rc<dyn ImportHook>) {
        let target = Rc::as_ptr(hook) as *const ();
        self.hooks.retain(|h| Rc::as_ptr(h) as *const () != target);
    }

    /// Open a `.lpk` archive from the store and register a hook for it.
    /// Registered archives take precedence over directory roots.
    pub fn register_archive(&mut self, path: &Path) -> Result<(), LoadError> {
        if self.archives.contains_key(path) {
            return Ok(());
        }
        let bytes = self
            .store
            .read_file(path)
            .map_err(|source| LoadError::Store {
                path: path.to_path_buf(),
                source,
            })?;
        let image = ArchiveImage::from_bytes(bytes)?;
        let loader = Rc::new(ArchiveLoader::new(ArchiveStore::new(image, path)));
        self.archives.insert(path.to_path_buf(), loader.clone());
        self.hooks.push(Rc::new(ArchiveHook::new(loader)));
        info!(target: TARGET, archive = %path.display(), "registered module archive");
        Ok(())
    }

    /// The loader for a registered archive
    pub fn archive(&self, path: &Path) -> Option<Rc<ArchiveLoader>> {
        self.archives.get(path).cloned()
    }

    // ---- install / uninstall --------------------------------------------

    /// Activate lazy importing. Idempotent. Modules already in the cache
    /// are snapshotted as preexisting for the report.
    pub fn install(&mut self) {
        if self.installed {
            return;
        }
        let preexisting: Vec<String> = self
            .modules
            .iter()
            .filter(|(_, slot)| !slot.is_lazy())
            .map(|(name, _)| name.clone())
            .collect();
        self.stats.snapshot_preexisting(preexisting);
        self.general = Some(Rc::new(GeneralHook));
        self.installed = true;
        info!(target: TARGET, "lazy import installed");
    }

    /// Deactivate lazy importing. Idempotent. Existing placeholders stay
    /// in the cache and still resolve on first access; new imports load
    /// eagerly.
    pub fn uninstall(&mut self) {
        if !self.installed {
            return;
        }
        self.general = None;
        self.installed = false;
        info!(target: TARGET, "lazy import uninstalled");
    }

    // ---- import pipeline -------------------------------------------------

    /// Import a dotted module path. Parents are imported left to right and
    /// each child is bound as an attribute of its parent, so `a.b.c` leaves
    /// `a`, `a.b`, and `a.b.c` in the cache and returns the leaf slot.
    pub fn import(&mut self, name: &str) -> Result<ModuleSlot, LoadError> {
        let mut prefix = String::new();
        let mut prev: Option<ModuleSlot> = None;
        for part in name.split('.') {
            if !prefix.is_empty() {
                prefix.push('.');
            }
            prefix.push_str(part);
            let slot = self.import_single(&prefix)?;
            if let Some(parent) = prev {
                if let Err(Error::Load(e)) =
                    parent.set_attr(self, part, Value::Module(slot.clone()))
                {
                    return Err(e);
                }
            }
            prev = Some(slot);
        }
        prev.ok_or_else(|| LoadError::NotFound {
            name: name.to_string(),
            tried: Vec::new(),
        })
    }

    /// Import one identifier (no dotted-parent handling): cache, then
    /// hooks, then the general hook, then the eager fallback.
    pub fn import_single(&mut self, name: &str) -> Result<ModuleSlot, LoadError> {
        if let Some(slot) = self.cached(name) {
            return Ok(slot);
        }
        let hooks = self.hooks.clone();
        for hook in hooks {
            if let Some(loader) = hook.find_module(self, name) {
                let slot = loader.load_module(self, name)?;
                self.cache_insert(name, slot.clone());
                return Ok(slot);
            }
        }
        if let Some(general) = self.general.clone() {
            if let Some(loader) = general.find_module(self, name) {
                let slot = loader.load_module(self, name)?;
                self.cache_insert(name, slot.clone());
                return Ok(slot);
            }
        }
        self.load_eager(name)
    }

    /// Import `name` and bind it into `scope` the way an import statement
    /// would: the root package name for a plain dotted import.
    pub fn import_into(&mut self, scope: &ScopeRef, name: &str) -> Result<ModuleSlot, LoadError> {
        let slot = self.import(name)?;
        let root = name.split('.').next().unwrap_or(name);
        let bound = if root == name {
            slot.clone()
        } else {
            self.cached(root).unwrap_or_else(|| slot.clone())
        };
        self.bind(scope, root, bound);
        Ok(slot)
    }

    fn load_eager(&mut self, name: &str) -> Result<ModuleSlot, LoadError> {
        let store = self.store.clone();
        let mut tried = Vec::new();
        for root in self.dir_roots() {
            if let Some(path) = probe_root(store.as_ref(), &root, name) {
                debug!(target: "latemod::loader", module = name, path = %path.display(), "loading eagerly");
                let loader: Rc<dyn ModuleLoader> =
                    Rc::new(FileLoader::new(store.clone(), path));
                let module = loader.load(self, name)?;
                module.borrow_mut().set_loader(loader);
                let slot = ModuleSlot::Ready(module);
                self.cache_insert(name, slot.clone());
                return Ok(slot);
            }
            for candidate in module_candidates(name) {
                tried.push(root.join(candidate));
            }
        }
        Err(LoadError::NotFound {
            name: name.to_string(),
            tried,
        })
    }

    // ---- placeholders and resolution ------------------------------------

    /// Create a placeholder for `name` backed by `loader` and account for
    /// it. The caller is responsible for putting it in a slot.
    pub(crate) fn new_placeholder(
        &mut self,
        name: &str,
        loader: Rc<dyn ModuleLoader>,
    ) -> Rc<Placeholder> {
        debug!(target: TARGET, module = name, "installing placeholder");
        self.stats.note_proxy(name);
        Rc::new(Placeholder::new(name, loader))
    }

    /// Resolve a placeholder to its real module.
    ///
    /// Idempotent through the cache: if the name already resolved (by this
    /// placeholder or another route), the cached module is returned and no
    /// load happens. On success the cache entry flips to `Ready` and every
    /// recorded bind site still holding this placeholder is rewritten. On
    /// failure the placeholder stays in the cache and the error propagates
    /// unchanged, so a later access retries the load.
    pub fn resolve(&mut self, placeholder: &Rc<Placeholder>) -> Result<ModuleRef, LoadError> {
        let name = placeholder.name().to_string();
        if let Some(ModuleSlot::Ready(module)) = self.modules.get(&name) {
            return Ok(module.clone());
        }
        debug!(target: "latemod::resolver", module = %name, "resolving lazy module");
        let loader = placeholder.loader().clone();
        let module = match loader.load(self, &name) {
            Ok(module) => module,
            Err(e) => {
                self.cache_insert(&name, ModuleSlot::Lazy(placeholder.clone()));
                return Err(e);
            }
        };
        module.borrow_mut().set_loader(loader);
        self.cache_insert(&name, ModuleSlot::Ready(module.clone()));
        self.rewrite_sites(placeholder, &module);
        self.stats.note_loaded(&name);
        debug!(target: "latemod::resolver", module = %name, "resolved");
        self.report(&format!("load {}", name));
        Ok(module)
    }

    // ---- bind sites and rewriting ---------------------------------------

    /// Store a module value in a scope and record the bind site so a later
    /// resolution can rewrite the reference in place.
    pub fn bind(&mut self, scope: &ScopeRef, key: &str, slot: ModuleSlot) {
        let value = Value::Module(slot);
        scope.borrow_mut().insert(key.to_string(), value.clone());
        self.note_bind_site(scope, key, &value);
    }

    /// Record a live binding if the value is a lazy module. Ready modules
    /// need no rewriting and are not tracked.
    pub(crate) fn note_bind_site(&mut self, scope: &ScopeRef, key: &str, value: &Value) {
        if let Value::Module(ModuleSlot::Lazy(placeholder)) = value {
            self.bind_sites
                .entry(placeholder.name().to_string())
                .or_default()
                .push(BindSite {
                    scope: Rc::downgrade(scope),
                    key: key.to_string(),
                });
        }
    }

    /// Replace this placeholder with the real module at every recorded
    /// bind site. Sites whose scope died or whose value was overwritten
    /// are dropped; sites holding a *different* placeholder under the same
    /// name are kept for that placeholder's own resolution.
    fn rewrite_sites(&mut self, placeholder: &Rc<Placeholder>, module: &ModuleRef) {
        let Some(sites) = self.bind_sites.remove(placeholder.name()) else {
            return;
        };
        let mut kept = Vec::new();
        let mut rewritten = 0usize;
        for site in sites {
            let Some(scope) = site.scope.upgrade() else {
                continue;
            };
            let mut attrs = scope.borrow_mut();
            // Decide first, then mutate, so the map borrow is not held
            // across the insert.
            let (is_this, is_other_lazy) = match attrs.get(&site.key) {
                Some(Value::Module(ModuleSlot::Lazy(p))) => (Rc::ptr_eq(p, placeholder), true),
                _ => (false, false),
            };
            if is_this {
                attrs.insert(
                    site.key.clone(),
                    Value::Module(ModuleSlot::Ready(module.clone())),
                );
                rewritten += 1;
            } else if is_other_lazy {
                // A different placeholder now lives here under the same
                // name; keep the site for its own resolution.
                drop(attrs);
                kept.push(site);
            }
        }
        if !kept.is_empty() {
            self.bind_sites
                .insert(placeholder.name().to_string(), kept);
        }
        debug!(
            target: "latemod::resolver",
            module = placeholder.name(),
            sites = rewritten,
            "rewrote bind sites"
        );
    }

    // ---- reload ----------------------------------------------------------

    /// Reload a cached module.
    ///
    /// An unresolved placeholder under an installed registry needs no
    /// work; its load is still pending and will see fresh source anyway.
    /// Uninstalled, the placeholder is resolved first, which performs the
    /// fresh load. A ready module is re-executed in place through its
    /// recorded loader, so every live reference observes the new state.
    pub fn reload(&mut self, name: &str) -> Result<ModuleSlot, LoadError> {
        let Some(slot) = self.cached(name) else {
            return Err(LoadError::NotFound {
                name: name.to_string(),
                tried: Vec::new(),
            });
        };
        match slot {
            ModuleSlot::Lazy(_) if self.installed => Ok(slot),
            ModuleSlot::Lazy(placeholder) => {
                let module = self.resolve(&placeholder)?;
                Ok(ModuleSlot::Ready(module))
            }
            ModuleSlot::Ready(module) => {
                let loader =
                    module
                        .borrow()
                        .loader()
                        .ok_or_else(|| LoadError::NoLoader {
                            name: name.to_string(),
                        })?;
                info!(target: TARGET, module = name, "reloading");
                loader.load_into(self, &module)?;
                Ok(ModuleSlot::Ready(module))
            }
        }
    }

    // ---- reporting -------------------------------------------------------

    /// Emit a report event through the configured reporter.
    pub fn report(&self, event: &str) {
        let live: BTreeSet<String> = self.modules.keys().cloned().collect();
        self.reporter.report(event, &self.stats, &live);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use latemod_vfs::MemoryStore;

    fn registry_with(files: &[(&str, &str)]) -> ModuleRegistry {
        let store = MemoryStore::with_files(
            files
                .iter()
                .map(|(path, body)| (*path, body.as_bytes().to_vec())),
        );
        let mut reg = ModuleRegistry::with_store(Arc::new(store));
        reg.add_root(PathBuf::from("/mods"));
        reg
    }

    #[test]
    fn test_eager_import_without_install() {
        let mut reg = registry_with(&[("/mods/math.mod", "var PI = 3.14;")]);
        let slot = reg.import("math").unwrap();
        assert!(!slot.is_lazy());
        let module = slot.as_ready().unwrap();
        assert_eq!(module.borrow().get_attr("PI"), Some(Value::Float(3.14)));
    }

    #[test]
    fn test_installed_import_is_lazy() {
        let mut reg = registry_with(&[("/mods/math.mod", "var PI = 3.14;")]);
        reg.install();
        let slot = reg.import("math").unwrap();
        assert!(slot.is_lazy());
    }

    #[test]
    fn test_import_is_cached() {
        let mut reg = registry_with(&[("/mods/math.mod", "var PI = 3.14;")]);
        let a = reg.import("math").unwrap();
        let b = reg.import("math").unwrap();
        assert!(a.ptr_eq(&b));
    }

    #[test]
    fn test_missing_module_lists_candidates() {
        let mut reg = registry_with(&[]);
        let err = reg.import("nope").unwrap_err();
        match err {
            LoadError::NotFound { name, tried } => {
                assert_eq!(name, "nope");
                assert!(tried.contains(&PathBuf::from("/mods/nope.mod")));
                assert!(tried.contains(&PathBuf::from("/mods/nope/init.mod")));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_install_is_idempotent() {
        let mut reg = registry_with(&[("/mods/pre.mod", "var x = 1;")]);
        reg.import("pre").unwrap();
        reg.install();
        reg.install();
        assert!(reg.is_installed());
        assert_eq!(reg.stats().preexisting().len(), 1);
        reg.uninstall();
        reg.uninstall();
        assert!(!reg.is_installed());
    }

    #[test]
    fn test_dotted_import_binds_child_on_parent() {
        let mut reg = registry_with(&[
            ("/mods/pkg/init.mod", "var version = 1;"),
            ("/mods/pkg/sub.mod", "var deep = true;"),
        ]);
        let leaf = reg.import("pkg.sub").unwrap();
        assert!(!leaf.is_lazy());

        let parent = reg.cached("pkg").unwrap();
        let child = parent.get_attr(&mut reg, "sub").unwrap();
        assert_eq!(child, Value::Module(leaf));
    }

    #[test]
    fn test_reload_refreshes_in_place() {
        let files = [("/mods/m.mod", "var x = 1;")];
        let store = MemoryStore::with_files(
            files
                .iter()
                .map(|(path, body)| (*path, body.as_bytes().to_vec())),
        );
        let mut reg = ModuleRegistry::with_store(Arc::new(store.clone()));
        reg.add_root(PathBuf::from("/mods"));

        let slot = reg.import("m").unwrap();
        let module = slot.as_ready().unwrap();
        assert_eq!(module.borrow().get_attr("x"), Some(Value::Int(1)));

        store.write_file(Path::new("/mods/m.mod"), b"var x = 2;").unwrap();
        reg.reload("m").unwrap();
        // The same module object carries the new state.
        assert_eq!(module.borrow().get_attr("x"), Some(Value::Int(2)));
    }

    #[test]
    fn test_reload_unknown_module() {
        let mut reg = registry_with(&[]);
        assert!(matches!(
            reg.reload("ghost"),
            Err(LoadError::NotFound { .. })
        ));
    }
}
