//! The module placeholder
//!
//! The stand-in installed in the module cache in place of a real module.
//! It owns exactly its identity pair (name, loader) and nothing else; every
//! substantive operation goes through [`ModuleSlot`](crate::ModuleSlot),
//! which resolves through the registry and forwards to the real module.

use std::fmt;
use std::rc::Rc;

use crate::loader::ModuleLoader;

/// An unresolved lazy module: identifier plus the capability to load it.
pub struct Placeholder {
    name: String,
    loader: Rc<dyn ModuleLoader>,
}

impl Placeholder {
    pub(crate) fn new(name: impl Into<String>, loader: Rc<dyn ModuleLoader>) -> Self {
        Self {
            name: name.into(),
            loader,
        }
    }

    /// Identity read; never triggers resolution. The rewrite engine relies
    /// on this while scanning bind sites.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Identity read; never triggers resolution.
    pub fn loader(&self) -> &Rc<dyn ModuleLoader> {
        &self.loader
    }
}

impl fmt::Debug for Placeholder {
    /// Pure metadata read of the stored identity pair, so logging or
    /// debugging a placeholder never forces a load.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<lazy module '{}' via {}>", self.name, self.loader.describe())
    }
}
