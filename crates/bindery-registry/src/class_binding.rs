//! Class declarations and their bound form.
//!
//! A [`ClassDecl`] is what a module builder produces: a record without
//! resolved bases plus the class's constructors, methods and properties.
//! [`TypeRegistry::bind_class`](crate::TypeRegistry::bind_class) resolves the
//! bases and turns it into a [`ClassBinding`] with a method-resolution order.

use std::any::TypeId;
use std::borrow::Cow;
use std::sync::Arc;

use rustc_hash::FxHashMap;

use bindery_core::{
    BaseSpec, FunctionEntry, FunctionFlags, NativeFn, RegistrationError, TypeRecord, TypeShape,
};

use crate::OverloadSet;

/// A property exposed on a bound class.
#[derive(Debug, Clone)]
pub struct PropertyEntry {
    /// Attribute name.
    pub name: String,
    /// Getter, called with the receiver and no arguments.
    pub getter: FunctionEntry,
    /// Setter, called with the receiver and the new value.
    pub setter: Option<FunctionEntry>,
    /// Docstring.
    pub doc: Option<String>,
}

impl PropertyEntry {
    /// Check if the property has no setter.
    pub fn is_readonly(&self) -> bool {
        self.setter.is_none()
    }
}

/// A user-defined implicit conversion into a bound class.
///
/// When an argument of `source` shape is passed where the target class is
/// expected, the dispatcher runs `convert` on it to build a temporary.
#[derive(Debug, Clone)]
pub struct ImplicitConversion {
    /// Accepted source shape.
    pub source: TypeShape,
    /// Display name of the source.
    pub source_name: Cow<'static, str>,
    /// Native identity of the produced class.
    pub target: TypeId,
    /// Constructor taking one argument.
    pub convert: NativeFn,
}

/// A class as declared by a module, before binding.
#[derive(Debug)]
pub struct ClassDecl {
    /// The record; base links are added while binding.
    pub record: TypeRecord,
    /// Bases in declaration order.
    pub bases: Vec<BaseSpec>,
    /// Constructor candidates.
    pub constructors: Vec<FunctionEntry>,
    /// Method candidates (instance and static).
    pub methods: Vec<FunctionEntry>,
    /// Properties.
    pub properties: Vec<PropertyEntry>,
    /// Implicit conversions into this class.
    pub implicit: Vec<ImplicitConversion>,
    /// Class docstring.
    pub doc: Option<String>,
}

impl ClassDecl {
    /// Declaration with no members.
    pub fn new(record: TypeRecord) -> Self {
        Self {
            record,
            bases: Vec::new(),
            constructors: Vec::new(),
            methods: Vec::new(),
            properties: Vec::new(),
            implicit: Vec::new(),
            doc: None,
        }
    }
}

/// A bound class: its record, MRO and members.
#[derive(Debug)]
pub struct ClassBinding {
    record: Arc<TypeRecord>,
    mro: Vec<Arc<TypeRecord>>,
    constructors: OverloadSet,
    methods: FxHashMap<String, OverloadSet>,
    method_order: Vec<String>,
    properties: FxHashMap<String, PropertyEntry>,
    virtuals: Vec<String>,
    doc: Option<String>,
}

impl ClassBinding {
    /// Bind a resolved record with the declaration's members.
    pub(crate) fn new(
        record: Arc<TypeRecord>,
        decl_constructors: Vec<FunctionEntry>,
        decl_methods: Vec<FunctionEntry>,
        decl_properties: Vec<PropertyEntry>,
        doc: Option<String>,
    ) -> Result<Self, RegistrationError> {
        let mro = linearize(&record);

        let mut constructors = OverloadSet::new(record.name.clone());
        for mut ctor in decl_constructors {
            stamp(&mut ctor, &record);
            ctor.flags |= FunctionFlags::CONSTRUCTOR;
            constructors.push(ctor)?;
        }

        let mut methods: FxHashMap<String, OverloadSet> = FxHashMap::default();
        let mut method_order = Vec::new();
        let mut virtuals = Vec::new();
        for mut method in decl_methods {
            stamp(&mut method, &record);
            if !method.flags.contains(FunctionFlags::STATIC) {
                method.flags |= FunctionFlags::METHOD;
            }
            if method.is_virtual() && !virtuals.contains(&method.name) {
                virtuals.push(method.name.clone());
            }
            let set = methods.entry(method.name.clone()).or_insert_with(|| {
                method_order.push(method.name.clone());
                OverloadSet::new(method.name.clone())
            });
            set.push(method)?;
        }

        let mut properties = FxHashMap::default();
        for mut property in decl_properties {
            if methods.contains_key(&property.name) || properties.contains_key(&property.name) {
                return Err(RegistrationError::DuplicateRegistration {
                    name: format!("{}.{}", record.name, property.name),
                    kind: "attribute".to_string(),
                });
            }
            stamp(&mut property.getter, &record);
            property.getter.flags |= FunctionFlags::METHOD | FunctionFlags::GETTER;
            if let Some(setter) = property.setter.as_mut() {
                stamp(setter, &record);
                setter.flags |= FunctionFlags::METHOD | FunctionFlags::SETTER;
            }
            properties.insert(property.name.clone(), property);
        }

        Ok(Self {
            record,
            mro,
            constructors,
            methods,
            method_order,
            properties,
            virtuals,
            doc,
        })
    }

    /// The bound record.
    pub fn record(&self) -> &Arc<TypeRecord> {
        &self.record
    }

    /// Exposed class name.
    pub fn name(&self) -> &str {
        &self.record.name
    }

    /// Method-resolution order, starting with this class.
    pub fn mro(&self) -> &[Arc<TypeRecord>] {
        &self.mro
    }

    /// Constructor overloads.
    pub fn constructors(&self) -> &OverloadSet {
        &self.constructors
    }

    /// Methods declared on this class (not inherited).
    pub fn method(&self, name: &str) -> Option<&OverloadSet> {
        self.methods.get(name)
    }

    /// Names of the declared methods, in declaration order.
    pub fn method_names(&self) -> impl Iterator<Item = &str> {
        self.method_order.iter().map(String::as_str)
    }

    /// A property declared on this class.
    pub fn property(&self, name: &str) -> Option<&PropertyEntry> {
        self.properties.get(name)
    }

    /// Properties declared on this class.
    pub fn properties(&self) -> impl Iterator<Item = &PropertyEntry> {
        self.properties.values()
    }

    /// Check if `name` is a virtual method of this class.
    pub fn is_virtual(&self, name: &str) -> bool {
        self.virtuals.iter().any(|v| v == name)
    }

    /// Virtual method names, in declaration order.
    pub fn virtual_methods(&self) -> &[String] {
        &self.virtuals
    }

    /// Virtual methods with no native default.
    pub fn pure_virtuals(&self) -> Vec<&str> {
        self.virtuals
            .iter()
            .filter(|name| {
                self.methods
                    .get(name.as_str())
                    .is_some_and(|set| set.iter().all(FunctionEntry::is_pure_virtual))
            })
            .map(String::as_str)
            .collect()
    }

    /// Class docstring.
    pub fn doc(&self) -> Option<&str> {
        self.doc.as_deref()
    }
}

fn stamp(entry: &mut FunctionEntry, record: &TypeRecord) {
    entry.owner = Some(record.hash);
    entry.owner_name = Some(record.name.clone());
    entry.unit = record.unit;
}

fn same_record(a: &TypeRecord, b: &TypeRecord) -> bool {
    a.type_id == b.type_id && a.unit == b.unit
}

/// Method-resolution order of a record.
///
/// The class itself, then each base's order in listed base order, skipping
/// records already present. The first listed base therefore takes priority.
pub fn linearize(record: &Arc<TypeRecord>) -> Vec<Arc<TypeRecord>> {
    let mut out = vec![Arc::clone(record)];
    for link in &record.bases {
        for base in linearize(&link.record) {
            if !out.iter().any(|seen| same_record(seen, &base)) {
                out.push(base);
            }
        }
    }
    out
}
