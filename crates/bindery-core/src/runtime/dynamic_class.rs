//! Dynamic-side subclasses of bound classes.

use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;
use rustc_hash::FxHashMap;

use crate::entries::TypeRecord;

use super::DynCallable;

/// A class defined on the dynamic side that derives from a bound class.
///
/// Holds the override table consulted by virtual trampolines. Overrides
/// receive the instance as their first argument.
pub struct DynamicClass {
    name: String,
    base: Arc<TypeRecord>,
    overrides: RwLock<FxHashMap<String, DynCallable>>,
}

impl DynamicClass {
    /// Declare a subclass of `base`.
    pub fn new(name: impl Into<String>, base: Arc<TypeRecord>) -> Self {
        Self {
            name: name.into(),
            base,
            overrides: RwLock::new(FxHashMap::default()),
        }
    }

    /// Class name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The bound base class.
    pub fn base(&self) -> &Arc<TypeRecord> {
        &self.base
    }

    /// Install or replace an override.
    pub fn set_override(&self, method: impl Into<String>, f: DynCallable) {
        self.overrides.write().insert(method.into(), f);
    }

    /// Builder form of [`set_override`](Self::set_override).
    pub fn with_override(self, method: impl Into<String>, f: DynCallable) -> Self {
        self.set_override(method, f);
        self
    }

    /// Remove an override, returning it.
    pub fn remove_override(&self, method: &str) -> Option<DynCallable> {
        self.overrides.write().remove(method)
    }

    /// Look up an override.
    pub fn override_for(&self, method: &str) -> Option<DynCallable> {
        self.overrides.read().get(method).cloned()
    }

    /// Names of all overridden methods.
    pub fn overridden(&self) -> Vec<String> {
        let mut names: Vec<String> = self.overrides.read().keys().cloned().collect();
        names.sort();
        names
    }
}

impl fmt::Debug for DynamicClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DynamicClass")
            .field("name", &self.name)
            .field("base", &self.base.name)
            .field("overrides", &self.overridden())
            .finish()
    }
}
