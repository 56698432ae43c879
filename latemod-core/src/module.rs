//! Module objects, attribute scopes, and the tagged cache slot
//!
//! A module is an attribute table plus metadata. Cache entries are
//! [`ModuleSlot`]s: the explicitly tagged `Lazy | Ready` state behind a
//! uniform module-like surface, so attribute dispatch is an ordinary match
//! instead of implicit interception.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use crate::error::Error;
use crate::loader::ModuleLoader;
use crate::placeholder::Placeholder;
use crate::registry::ModuleRegistry;

/// An attribute table: name -> value
pub type Scope = BTreeMap<String, Value>;

/// Shared, mutable scope handle
pub type ScopeRef = Rc<RefCell<Scope>>;

/// Create an empty shared scope
pub fn new_scope() -> ScopeRef {
    Rc::new(RefCell::new(Scope::new()))
}

/// Shared module handle
pub type ModuleRef = Rc<RefCell<Module>>;

/// The attribute value vocabulary of module programs
#[derive(Debug, Clone)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    Module(ModuleSlot),
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a == b,
            (Value::Str(a), Value::Str(b)) => a == b,
            // Module values compare by identity, matching cache semantics.
            (Value::Module(a), Value::Module(b)) => a.ptr_eq(b),
            _ => false,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "null"),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Int(i) => write!(f, "{}", i),
            Value::Float(x) => write!(f, "{}", x),
            Value::Str(s) => write!(f, "{}", s),
            Value::Module(slot) => write!(f, "{:?}", slot),
        }
    }
}

/// A loaded module: name, origin, attribute scope, and the loader it came
/// from (kept for reload).
pub struct Module {
    name: String,
    path: Option<PathBuf>,
    loader: Option<Rc<dyn ModuleLoader>>,
    attrs: ScopeRef,
}

impl Module {
    /// Create a fresh module with an empty scope
    pub fn new(name: impl Into<String>, path: Option<PathBuf>) -> ModuleRef {
        Rc::new(RefCell::new(Self {
            name: name.into(),
            path,
            loader: None,
            attrs: new_scope(),
        }))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// The loader this module was produced by, if recorded
    pub fn loader(&self) -> Option<Rc<dyn ModuleLoader>> {
        self.loader.clone()
    }

    pub(crate) fn set_loader(&mut self, loader: Rc<dyn ModuleLoader>) {
        self.loader = Some(loader);
    }

    /// Shared handle to the attribute scope (bind sites point into it)
    pub fn attrs(&self) -> ScopeRef {
        self.attrs.clone()
    }

    pub fn get_attr(&self, key: &str) -> Option<Value> {
        self.attrs.borrow().get(key).cloned()
    }

    pub fn set_attr(&self, key: impl Into<String>, value: Value) {
        self.attrs.borrow_mut().insert(key.into(), value);
    }

    /// Sorted attribute names
    pub fn attr_names(&self) -> Vec<String> {
        self.attrs.borrow().keys().cloned().collect()
    }

    pub(crate) fn clear_attrs(&self) {
        self.attrs.borrow_mut().clear();
    }
}

impl fmt::Debug for Module {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Module")
            .field("name", &self.name)
            .field("path", &self.path)
            .field("attrs", &self.attrs.borrow().len())
            .finish()
    }
}

/// A module cache entry: an unresolved placeholder or the real module.
///
/// The slot transitions `Lazy -> Ready` at most once and is never
/// downgraded. Both arms expose the same attribute surface; the `Lazy` arm
/// resolves first and then forwards.
#[derive(Clone)]
pub enum ModuleSlot {
    Lazy(Rc<Placeholder>),
    Ready(ModuleRef),
}

impl ModuleSlot {
    /// The module identifier. Pure metadata read; never resolves.
    pub fn name(&self) -> String {
        match self {
            ModuleSlot::Lazy(p) => p.name().to_string(),
            ModuleSlot::Ready(m) => m.borrow().name().to_string(),
        }
    }

    pub fn is_lazy(&self) -> bool {
        matches!(self, ModuleSlot::Lazy(_))
    }

    /// The real module, if this slot is already resolved
    pub fn as_ready(&self) -> Option<ModuleRef> {
        match self {
            ModuleSlot::Ready(m) => Some(m.clone()),
            ModuleSlot::Lazy(_) => None,
        }
    }

    /// Identity comparison (used by the rewrite engine and by `Value`)
    pub fn ptr_eq(&self, other: &ModuleSlot) -> bool {
        match (self, other) {
            (ModuleSlot::Lazy(a), ModuleSlot::Lazy(b)) => Rc::ptr_eq(a, b),
            (ModuleSlot::Ready(a), ModuleSlot::Ready(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }

    /// Read an attribute, resolving the module first if necessary.
    ///
    /// A missing attribute on the resolved module is `Error::MissingAttr`,
    /// exactly as it would be on an eagerly loaded module.
    pub fn get_attr(&self, reg: &mut ModuleRegistry, key: &str) -> Result<Value, Error> {
        let module = self.force(reg)?;
        let found = module.borrow().get_attr(key);
        found.ok_or_else(|| Error::MissingAttr {
            module: self.name(),
            attr: key.to_string(),
        })
    }

    /// Write an attribute, resolving the module first if necessary.
    /// The write always lands on the real module, never the placeholder.
    pub fn set_attr(
        &self,
        reg: &mut ModuleRegistry,
        key: impl Into<String>,
        value: Value,
    ) -> Result<(), Error> {
        let module = self.force(reg)?;
        let key = key.into();
        let site_value = value.clone();
        module.borrow().set_attr(key.clone(), value);
        // A module value stored through the slot surface is a live binding;
        // register it so the rewrite engine can reach it later.
        if let Value::Module(ModuleSlot::Lazy(_)) = site_value {
            let attrs = module.borrow().attrs();
            reg.note_bind_site(&attrs, &key, &site_value);
        }
        Ok(())
    }

    /// Directory listing of the real module's attribute names.
    /// Resolves first: the placeholder's own shape is never what callers
    /// want from a listing.
    pub fn dir(&self, reg: &mut ModuleRegistry) -> Result<Vec<String>, Error> {
        let module = self.force(reg)?;
        let names = module.borrow().attr_names();
        Ok(names)
    }

    /// Resolve to the real module (idempotent through the registry cache)
    pub fn force(&self, reg: &mut ModuleRegistry) -> Result<ModuleRef, Error> {
        match self {
            ModuleSlot::Ready(m) => Ok(m.clone()),
            ModuleSlot::Lazy(p) => Ok(reg.resolve(p)?),
        }
    }
}

impl fmt::Debug for ModuleSlot {
    /// Pure metadata: formatting a slot never triggers a load.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModuleSlot::Lazy(p) => write!(f, "{:?}", p),
            ModuleSlot::Ready(m) => write!(f, "<module '{}'>", m.borrow().name()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_module_attrs() {
        let module = Module::new("math", None);
        module.borrow().set_attr("PI", Value::Float(3.14));

        assert_eq!(module.borrow().get_attr("PI"), Some(Value::Float(3.14)));
        assert_eq!(module.borrow().get_attr("TAU"), None);
        assert_eq!(module.borrow().attr_names(), vec!["PI".to_string()]);
    }

    #[test]
    fn test_ready_slot_debug() {
        let module = Module::new("math", None);
        let slot = ModuleSlot::Ready(module);
        assert_eq!(format!("{:?}", slot), "<module 'math'>");
    }

    #[test]
    fn test_value_identity_equality() {
        let a = ModuleSlot::Ready(Module::new("a", None));
        let b = ModuleSlot::Ready(Module::new("a", None));
        assert_eq!(Value::Module(a.clone()), Value::Module(a.clone()));
        assert_ne!(Value::Module(a), Value::Module(b));
    }

    #[test]
    fn test_value_display() {
        assert_eq!(format!("{}", Value::Int(42)), "42");
        assert_eq!(format!("{}", Value::Str("hi".into())), "hi");
        assert_eq!(format!("{}", Value::Null), "null");
    }
}
