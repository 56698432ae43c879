//! Import hooks
//!
//! A hook inspects a module identifier and may claim it by returning a
//! [`SlotLoader`]. The registry consults registered hooks (archive hooks
//! and any embedder hooks) first, then the general hook while installed,
//! then falls back to eager loading.
//!
//! The two claim disciplines differ on purpose. The general hook declines
//! bypassed names so the fallback loads them normally; an archive hook
//! claims every name its index contains and handles the bypass inside its
//! loader, because nothing downstream could serve the archive entry.

use std::rc::Rc;

use tracing::debug;

use crate::error::LoadError;
use crate::loader::{probe_root, ArchiveLoader, FileLoader, ModuleLoader, OnDemandLoader, SlotLoader};
use crate::module::ModuleSlot;
use crate::registry::ModuleRegistry;

const TARGET: &str = "latemod::hooks";

/// A participant in module identifier resolution.
pub trait ImportHook {
    /// Claim `name` by returning a loader for it, or decline with `None`.
    /// Must not read module source bytes; finding is cheap, loading is not.
    fn find_module(
        &self,
        reg: &mut ModuleRegistry,
        name: &str,
    ) -> Option<Rc<dyn SlotLoader>>;
}

/// The hook installed by [`ModuleRegistry::install`]: probes the directory
/// search roots and claims hits with a placeholder-producing loader.
pub struct GeneralHook;

impl ImportHook for GeneralHook {
    fn find_module(
        &self,
        reg: &mut ModuleRegistry,
        name: &str,
    ) -> Option<Rc<dyn SlotLoader>> {
        // A submodule is only claimed once its parent package is in the
        // cache, lazy or not. Dotted imports put the parent there first;
        // a bare single-name import of a submodule falls through.
        if let Some((parent, _)) = name.rsplit_once('.') {
            if reg.cached(parent).is_none() {
                return None;
            }
        }
        let store = reg.store();
        for root in reg.dir_roots() {
            let Some(path) = probe_root(store.as_ref(), &root, name) else {
                continue;
            };
            if reg.should_ignore(name, Some(&path)) {
                debug!(target: TARGET, module = name, path = %path.display(), "bypassing lazy import");
                reg.stats_mut().note_ignored(name);
                return None;
            }
            debug!(target: TARGET, module = name, path = %path.display(), "claiming for lazy import");
            let real: Rc<dyn ModuleLoader> = Rc::new(FileLoader::new(store.clone(), path));
            return Some(Rc::new(OnDemandLoader::new(real)));
        }
        None
    }
}

/// Hook for one registered `.lpk` archive. Claims on an index hit without
/// consulting the bypass policy; [`ArchiveSlotLoader`] applies it.
pub struct ArchiveHook {
    loader: Rc<ArchiveLoader>,
}

impl ArchiveHook {
    pub fn new(loader: Rc<ArchiveLoader>) -> Self {
        Self { loader }
    }
}

impl ImportHook for ArchiveHook {
    fn find_module(
        &self,
        _reg: &mut ModuleRegistry,
        name: &str,
    ) -> Option<Rc<dyn SlotLoader>> {
        if self.loader.find(name).is_none() {
            return None;
        }
        debug!(
            target: TARGET,
            module = name,
            archive = %self.loader.archive_path().display(),
            "claiming archive entry"
        );
        Some(Rc::new(ArchiveSlotLoader {
            loader: self.loader.clone(),
        }))
    }
}

/// Slot loader for a claimed archive entry. Produces a placeholder while
/// the registry is installed and the name is not bypassed; loads eagerly
/// otherwise.
struct ArchiveSlotLoader {
    loader: Rc<ArchiveLoader>,
}

impl SlotLoader for ArchiveSlotLoader {
    fn load_module(&self, reg: &mut ModuleRegistry, name: &str) -> Result<ModuleSlot, LoadError> {
        if let Some(slot) = reg.cached(name) {
            return Ok(slot);
        }
        let source_path = self.loader.get_filename(name);
        let bypass = reg.should_ignore(name, source_path.as_deref());
        if bypass || !reg.is_installed() {
            let real: Rc<dyn ModuleLoader> = self.loader.clone();
            let module = real.load(reg, name)?;
            module.borrow_mut().set_loader(real);
            if bypass {
                reg.stats_mut().note_ignored(name);
            }
            return Ok(ModuleSlot::Ready(module));
        }
        let real: Rc<dyn ModuleLoader> = self.loader.clone();
        let placeholder = reg.new_placeholder(name, real);
        Ok(ModuleSlot::Lazy(placeholder))
    }
}
