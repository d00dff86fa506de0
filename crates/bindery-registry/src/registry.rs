//! TypeRegistry - native type identity to binding metadata.
//!
//! This module provides [`TypeRegistry`], the central storage for every
//! registered type record, class binding and free-function overload set.
//!
//! # Storage Model
//!
//! - **Types**: global records keyed by `TypeId`, plus per-load-unit tables
//!   for records flagged `MODULE_LOCAL`. Lookups from a unit check its local
//!   table first.
//! - **Names**: each scope maps an exposed name hash to one native identity.
//! - **Classes**: [`ClassBinding`]s keyed by record identity.
//! - **Functions**: [`OverloadSet`]s keyed by name, in registration order.
//!
//! # Thread Safety
//!
//! Registration takes `&mut self` and happens single-threaded before the
//! registry is sealed behind an `Arc`. Sealed registries are only read.
//!
//! # Example
//!
//! ```
//! use bindery_core::{TypeRecord, TypeHash};
//! use bindery_registry::TypeRegistry;
//!
//! struct Point;
//!
//! let mut registry = TypeRegistry::new();
//! registry.register(TypeRecord::named::<Point>("Point")).unwrap();
//!
//! let record = registry.lookup_name("Point", None).unwrap();
//! assert_eq!(record.hash, TypeHash::from_name("Point"));
//! assert!(registry.register(TypeRecord::named::<Point>("Point")).is_err());
//! ```

use std::any::TypeId;
use std::sync::Arc;

use rustc_hash::FxHashMap;
use tracing::debug;

use bindery_core::{
    FunctionEntry, LoadUnit, RegistrationError, TypeFlags, TypeHash, TypeLookup, TypeRecord,
};

use crate::class_binding::{ClassBinding, ClassDecl, ImplicitConversion};
use crate::inheritance::{InheritanceGraph, RecordKey};
use crate::OverloadSet;

/// Registry of type records, class bindings and free functions.
#[derive(Debug, Default)]
pub struct TypeRegistry {
    /// Global records by native identity.
    types: FxHashMap<TypeId, Arc<TypeRecord>>,
    /// Module-local records by (unit, native identity).
    local_types: FxHashMap<(LoadUnit, TypeId), Arc<TypeRecord>>,
    /// Global name index: name hash -> native identity.
    names: FxHashMap<TypeHash, TypeId>,
    /// Module-local name index.
    local_names: FxHashMap<(LoadUnit, TypeHash), TypeId>,
    /// Registration order, for iteration.
    order: Vec<Arc<TypeRecord>>,
    classes: FxHashMap<RecordKey, Arc<ClassBinding>>,
    functions: FxHashMap<String, OverloadSet>,
    function_order: Vec<String>,
    implicit: FxHashMap<TypeId, Vec<ImplicitConversion>>,
    graph: InheritanceGraph,
}

impl TypeRegistry {
    /// Create a new empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    // ==========================================================================
    // Type Registration
    // ==========================================================================

    /// Register a type record.
    ///
    /// Module-local records (see [`TypeRecord::in_unit`]) go into their unit's
    /// table; everything else is global. Fails with `DuplicateType` when the
    /// native identity is already registered in that scope and with
    /// `DuplicateRegistration` when another type already uses the name. On
    /// failure the registry is unchanged.
    pub fn register(&mut self, record: TypeRecord) -> Result<Arc<TypeRecord>, RegistrationError> {
        let scope = record
            .flags
            .contains(TypeFlags::MODULE_LOCAL)
            .then_some(record.unit)
            .flatten();

        let (identity_taken, name_owner) = match scope {
            Some(unit) => (
                self.local_types.contains_key(&(unit, record.type_id)),
                self.local_names.get(&(unit, record.hash)).copied(),
            ),
            None => (
                self.types.contains_key(&record.type_id),
                self.names.get(&record.hash).copied(),
            ),
        };

        if identity_taken {
            return Err(RegistrationError::DuplicateType(record.name.clone()));
        }
        if name_owner.is_some_and(|owner| owner != record.type_id) {
            return Err(RegistrationError::DuplicateRegistration {
                name: record.name.clone(),
                kind: "type".to_string(),
            });
        }

        self.graph.insert(&record)?;

        let record = Arc::new(record);
        match scope {
            Some(unit) => {
                self.local_types
                    .insert((unit, record.type_id), Arc::clone(&record));
                self.local_names
                    .insert((unit, record.hash), record.type_id);
            }
            None => {
                self.types.insert(record.type_id, Arc::clone(&record));
                self.names.insert(record.hash, record.type_id);
            }
        }
        self.order.push(Arc::clone(&record));

        debug!(
            name = %record.name,
            rust_name = record.rust_name,
            local = scope.is_some(),
            "registered type"
        );
        Ok(record)
    }

    /// Bind a declared class: resolve its bases, register its record and
    /// build its method-resolution order.
    pub fn bind_class(&mut self, decl: ClassDecl) -> Result<Arc<ClassBinding>, RegistrationError> {
        let ClassDecl {
            mut record,
            bases,
            constructors,
            methods,
            properties,
            implicit,
            doc,
        } = decl;

        let unit = record.unit;
        for (i, base) in bases.iter().enumerate() {
            if base.type_id == record.type_id {
                return Err(RegistrationError::CircularInheritance(record.name.clone()));
            }
            if bases[..i].iter().any(|b| b.type_id == base.type_id) {
                return Err(RegistrationError::InvalidDeclaration(format!(
                    "'{}' lists base '{}' more than once",
                    record.name, base.rust_name
                )));
            }
            let base_record = self.lookup_in(base.type_id, unit).ok_or_else(|| {
                RegistrationError::UnknownBase {
                    type_name: record.name.clone(),
                    base: base.rust_name.to_string(),
                }
            })?;
            record = record.with_base(base.link(base_record));
        }

        if methods.iter().any(FunctionEntry::is_virtual) {
            record.flags |= TypeFlags::HAS_VIRTUALS;
        }
        if record
            .bases
            .iter()
            .any(|b| b.record.flags.contains(TypeFlags::DYNAMIC_ATTR))
        {
            record.flags |= TypeFlags::DYNAMIC_ATTR;
        }

        // Validate members before touching the tables.
        ClassBinding::new(
            Arc::new(record.clone()),
            constructors.clone(),
            methods.clone(),
            properties.clone(),
            None,
        )?;

        let record = self.register(record)?;
        let binding = Arc::new(ClassBinding::new(
            Arc::clone(&record),
            constructors,
            methods,
            properties,
            doc,
        )?);
        self.classes
            .insert(RecordKey::of(&record), Arc::clone(&binding));

        for conversion in implicit {
            self.implicit
                .entry(conversion.target)
                .or_default()
                .push(conversion);
        }

        debug!(
            class = %record.name,
            bases = record.bases.len(),
            mro = ?binding.mro().iter().map(|r| r.name.as_str()).collect::<Vec<_>>(),
            "bound class"
        );
        Ok(binding)
    }

    /// Register a free function candidate under its name.
    pub fn register_function(&mut self, entry: FunctionEntry) -> Result<(), RegistrationError> {
        let name = entry.name.clone();
        if !self.functions.contains_key(&name) {
            self.function_order.push(name.clone());
        }
        let set = self
            .functions
            .entry(name.clone())
            .or_insert_with(|| OverloadSet::new(name));
        debug!(signature = %entry.signature(), "registered function");
        set.push(entry)
    }

    /// Register an implicit conversion into a bound class.
    pub fn register_implicit(&mut self, conversion: ImplicitConversion) {
        self.implicit
            .entry(conversion.target)
            .or_default()
            .push(conversion);
    }

    // ==========================================================================
    // Lookup
    // ==========================================================================

    /// Global record for a native type.
    pub fn lookup(&self, type_id: TypeId) -> Option<&Arc<TypeRecord>> {
        self.types.get(&type_id)
    }

    /// Record for a native type as seen from `unit`: local first, then global.
    pub fn lookup_in(&self, type_id: TypeId, unit: Option<LoadUnit>) -> Option<Arc<TypeRecord>> {
        unit.and_then(|u| self.local_types.get(&(u, type_id)))
            .or_else(|| self.types.get(&type_id))
            .cloned()
    }

    /// Record by exposed name hash as seen from `unit`.
    pub fn lookup_hash(&self, hash: TypeHash, unit: Option<LoadUnit>) -> Option<Arc<TypeRecord>> {
        if let Some(u) = unit
            && let Some(type_id) = self.local_names.get(&(u, hash))
        {
            return self.local_types.get(&(u, *type_id)).cloned();
        }
        self.names
            .get(&hash)
            .and_then(|type_id| self.types.get(type_id))
            .cloned()
    }

    /// Record by exposed name as seen from `unit`.
    pub fn lookup_name(&self, name: &str, unit: Option<LoadUnit>) -> Option<Arc<TypeRecord>> {
        self.lookup_hash(TypeHash::from_name(name), unit)
    }

    /// Check if a native type is registered globally.
    pub fn contains(&self, type_id: TypeId) -> bool {
        self.types.contains_key(&type_id)
    }

    /// Class binding for a record.
    pub fn class(&self, record: &TypeRecord) -> Option<&Arc<ClassBinding>> {
        self.classes.get(&RecordKey::of(record))
    }

    /// Class binding by exposed name as seen from `unit`.
    pub fn class_by_name(&self, name: &str, unit: Option<LoadUnit>) -> Option<&Arc<ClassBinding>> {
        let record = self.lookup_name(name, unit)?;
        self.class(&record)
    }

    /// Find the overload set for `name` along the record's MRO.
    ///
    /// The first class in MRO order that declares the name wins; overloads
    /// are not merged across classes.
    pub fn resolve_method(
        &self,
        record: &TypeRecord,
        name: &str,
    ) -> Option<(&Arc<ClassBinding>, &OverloadSet)> {
        let class = self.class(record)?;
        class
            .mro()
            .iter()
            .filter_map(|r| self.class(r))
            .find_map(|c| c.method(name).map(|set| (c, set)))
    }

    /// Find a property along the record's MRO.
    pub fn resolve_property(
        &self,
        record: &TypeRecord,
        name: &str,
    ) -> Option<&crate::PropertyEntry> {
        let class = self.class(record)?;
        class
            .mro()
            .iter()
            .filter_map(|r| self.class(r))
            .find_map(|c| c.property(name))
    }

    /// Free function overloads by name.
    pub fn function(&self, name: &str) -> Option<&OverloadSet> {
        self.functions.get(name)
    }

    /// Implicit conversions producing `target`.
    pub fn implicit_conversions(&self, target: TypeId) -> &[ImplicitConversion] {
        self.implicit
            .get(&target)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Check if `derived` is `base` or inherits from it.
    pub fn is_subclass(&self, derived: &TypeRecord, base: &TypeRecord) -> bool {
        self.graph
            .is_subclass(RecordKey::of(derived), RecordKey::of(base))
    }

    // ==========================================================================
    // Iteration
    // ==========================================================================

    /// Records in registration order.
    pub fn types(&self) -> impl Iterator<Item = &Arc<TypeRecord>> {
        self.order.iter()
    }

    /// Class bindings.
    pub fn classes(&self) -> impl Iterator<Item = &Arc<ClassBinding>> {
        self.classes.values()
    }

    /// Free function overload sets in registration order.
    pub fn functions(&self) -> impl Iterator<Item = &OverloadSet> {
        self.function_order
            .iter()
            .filter_map(|name| self.functions.get(name))
    }

    pub fn type_count(&self) -> usize {
        self.order.len()
    }

    pub fn class_count(&self) -> usize {
        self.classes.len()
    }

    /// Number of free function candidates.
    pub fn function_count(&self) -> usize {
        self.functions.values().map(OverloadSet::len).sum()
    }
}

impl TypeLookup for TypeRegistry {
    fn record_for(&self, type_id: TypeId, unit: Option<LoadUnit>) -> Option<Arc<TypeRecord>> {
        self.lookup_in(type_id, unit)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bindery_core::{BaseSpec, FunctionFlags, NativeFn, ParamSpec, ReturnSpec};

    struct Animal {
        legs: u32,
    }

    struct Dog {
        animal: Animal,
    }

    fn noop(name: &str) -> FunctionEntry {
        FunctionEntry::new(
            name,
            vec![],
            ReturnSpec::of::<i32>(),
            NativeFn::from_fn(|_ctx| Ok(())),
        )
    }

    fn animal_decl() -> ClassDecl {
        let mut decl = ClassDecl::new(TypeRecord::named::<Animal>("Animal"));
        let mut speak = noop("speak");
        speak.flags |= FunctionFlags::VIRTUAL;
        decl.methods.push(speak);
        decl.methods.push(noop("legs"));
        decl
    }

    fn dog_decl() -> ClassDecl {
        let mut decl = ClassDecl::new(TypeRecord::named::<Dog>("Dog"));
        decl.bases.push(BaseSpec::new::<Dog, Animal>(
            |d| &d.animal,
            |d| &mut d.animal,
        ));
        decl.methods.push(noop("speak"));
        decl
    }

    #[test]
    fn new_registry_is_empty() {
        let registry = TypeRegistry::new();
        assert_eq!(registry.type_count(), 0);
        assert_eq!(registry.function_count(), 0);
    }

    #[test]
    fn duplicate_type_leaves_original() {
        let mut registry = TypeRegistry::new();
        let first = registry
            .register(TypeRecord::named::<Animal>("Animal"))
            .unwrap();
        let err = registry
            .register(TypeRecord::named::<Animal>("Creature"))
            .unwrap_err();
        assert_eq!(err, RegistrationError::DuplicateType("Creature".into()));
        assert!(Arc::ptr_eq(registry.lookup(TypeId::of::<Animal>()).unwrap(), &first));
        assert!(registry.lookup_name("Creature", None).is_none());
    }

    #[test]
    fn name_clash_between_types() {
        let mut registry = TypeRegistry::new();
        registry
            .register(TypeRecord::named::<Animal>("Thing"))
            .unwrap();
        let err = registry
            .register(TypeRecord::named::<Dog>("Thing"))
            .unwrap_err();
        assert!(matches!(err, RegistrationError::DuplicateRegistration { .. }));
    }

    #[test]
    fn module_local_types_are_isolated() {
        let unit_a = LoadUnit::new("ext_a");
        let unit_b = LoadUnit::new("ext_b");
        let mut registry = TypeRegistry::new();

        let a = registry
            .register(TypeRecord::named::<Animal>("Animal").in_unit(unit_a))
            .unwrap();
        let b = registry
            .register(TypeRecord::named::<Animal>("Animal").in_unit(unit_b))
            .unwrap();

        assert!(!Arc::ptr_eq(&a, &b));
        assert!(Arc::ptr_eq(
            &registry.lookup_in(TypeId::of::<Animal>(), Some(unit_a)).unwrap(),
            &a
        ));
        assert!(Arc::ptr_eq(
            &registry.record_for(TypeId::of::<Animal>(), Some(unit_b)).unwrap(),
            &b
        ));
        assert!(registry.lookup(TypeId::of::<Animal>()).is_none());

        let dup = registry.register(TypeRecord::named::<Animal>("Animal").in_unit(unit_a));
        assert!(matches!(dup, Err(RegistrationError::DuplicateType(_))));
    }

    #[test]
    fn local_lookup_falls_back_to_global() {
        let mut registry = TypeRegistry::new();
        registry
            .register(TypeRecord::named::<Animal>("Animal"))
            .unwrap();
        assert!(
            registry
                .lookup_in(TypeId::of::<Animal>(), Some(LoadUnit::new("ext")))
                .is_some()
        );
    }

    #[test]
    fn bind_class_with_base() {
        let mut registry = TypeRegistry::new();
        registry.bind_class(animal_decl()).unwrap();
        let dog = registry.bind_class(dog_decl()).unwrap();

        let names: Vec<&str> = dog.mro().iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["Dog", "Animal"]);

        let animal = registry.lookup(TypeId::of::<Animal>()).unwrap();
        assert!(registry.is_subclass(dog.record(), animal));
        assert!(!registry.is_subclass(animal, dog.record()));
        assert!(animal.flags.contains(TypeFlags::HAS_VIRTUALS));

        let (owner, set) = registry.resolve_method(dog.record(), "legs").unwrap();
        assert_eq!(owner.name(), "Animal");
        assert_eq!(set.len(), 1);

        let (owner, _) = registry.resolve_method(dog.record(), "speak").unwrap();
        assert_eq!(owner.name(), "Dog");
        assert!(registry.resolve_method(dog.record(), "fly").is_none());
    }

    #[test]
    fn base_must_be_registered_first() {
        let mut registry = TypeRegistry::new();
        let err = registry.bind_class(dog_decl()).unwrap_err();
        assert!(matches!(err, RegistrationError::UnknownBase { .. }));
        assert_eq!(registry.type_count(), 0);
    }

    #[test]
    fn self_base_is_circular() {
        struct Loop;
        let mut decl = ClassDecl::new(TypeRecord::named::<Loop>("Loop"));
        decl.bases.push(BaseSpec::new::<Loop, Loop>(|l| l, |l| l));
        let mut registry = TypeRegistry::new();
        assert_eq!(
            registry.bind_class(decl).unwrap_err(),
            RegistrationError::CircularInheritance("Loop".into())
        );
    }

    #[test]
    fn function_overloads() {
        let mut registry = TypeRegistry::new();
        let mut a = noop("print");
        a.params.push(ParamSpec::of::<i32>());
        let mut b = noop("print");
        b.params.push(ParamSpec::of::<String>());
        registry.register_function(a).unwrap();
        registry.register_function(b).unwrap();

        assert_eq!(registry.function("print").unwrap().len(), 2);
        assert_eq!(registry.function_count(), 2);
        assert_eq!(registry.functions().count(), 1);
    }

    #[test]
    fn upcast_through_bound_base() {
        let mut registry = TypeRegistry::new();
        registry.bind_class(animal_decl()).unwrap();
        let dog = registry.bind_class(dog_decl()).unwrap();
        let value = Dog {
            animal: Animal { legs: 4 },
        };
        let legs = dog
            .record()
            .cast_ref(&value, TypeId::of::<Animal>())
            .and_then(|a| a.downcast_ref::<Animal>())
            .map(|a| a.legs);
        assert_eq!(legs, Some(4));
    }
}
