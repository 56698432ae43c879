//! Latemod Core - On-demand module importing
//!
//! Modules claimed by the installed import hook are not loaded when
//! imported; a cheap placeholder enters the module cache instead, and the
//! real source is read and executed on the first attribute access. After
//! that single load, every recorded live reference to the placeholder is
//! rewritten to the real module, so steady-state access pays no lazy
//! overhead.
//!
//! All state lives in an explicit [`ModuleRegistry`]; nothing here touches
//! globals. The registry is single-threaded by design (module graphs are
//! `Rc`/`RefCell` cyclic) while the backing [`ModuleStore`] is shared and
//! thread-safe.
//!
//! ```
//! use std::path::PathBuf;
//! use std::sync::Arc;
//! use latemod_core::{ModuleRegistry, Value};
//! use latemod_vfs::MemoryStore;
//!
//! let store = MemoryStore::with_files([("/mods/math.mod", b"var PI = 3.14;".to_vec())]);
//! let mut reg = ModuleRegistry::with_store(Arc::new(store));
//! reg.add_root(PathBuf::from("/mods"));
//! reg.install();
//!
//! let slot = reg.import("math").unwrap();
//! assert!(slot.is_lazy()); // nothing read yet
//! let pi = slot.get_attr(&mut reg, "PI").unwrap(); // first access loads
//! assert_eq!(pi, Value::Float(3.14));
//! ```

pub mod error;
pub mod hooks;
pub mod ignore;
pub mod loader;
pub mod module;
pub mod placeholder;
mod program;
pub mod registry;
pub mod stats;

pub use error::{Error, LoadError};
pub use hooks::{ArchiveHook, GeneralHook, ImportHook};
pub use ignore::IgnorePolicy;
pub use loader::{
    module_candidates, ArchiveLoader, FileLoader, ModuleLoader, OnDemandLoader, SlotLoader,
    MODULE_EXTENSION, PACKAGE_INIT,
};
pub use module::{new_scope, Module, ModuleRef, ModuleSlot, Scope, ScopeRef, Value};
pub use placeholder::Placeholder;
pub use registry::ModuleRegistry;
pub use stats::{ImportStats, ReportSink, Reporter};

// Re-exported so embedders configure and store without extra direct deps.
pub use latemod_config::{IgnoreConfig, RegistryConfig, ReportMode, Subsystem};
pub use latemod_vfs::ModuleStore;
