//! Module - a named unit of registrations.
//!
//! A [`Module`] collects class declarations and free functions while an
//! extension loads. Nothing touches a registry until [`Module::apply_to`],
//! which binds every class in declaration order and then registers the free
//! functions.
//!
//! # Load Units
//!
//! Every module owns a [`LoadUnit`] derived from its name. Classes marked
//! `module_local()` are registered in that unit's table, so two modules may
//! bind the same native type without seeing each other's binding. Functions
//! registered by the module carry its unit, so values they return are
//! wrapped with the module's local records first.
//!
//! # Example
//!
//! ```ignore
//! let mut module = Module::new("geometry");
//! module.function("area", |w: f64, h: f64| w * h);
//! module
//!     .class::<Point>()
//!     .constructor(|x: f64, y: f64| Point { x, y })
//!     .property("x", |p: &Point| p.x, |p: &mut Point, x: f64| p.x = x)
//!     .build()?;
//! ```

use std::fmt;

use tracing::debug;

use bindery_core::{FunctionEntry, IntoNativeFn, LoadUnit, NativeType, RegistrationError};
use bindery_registry::{ClassDecl, TypeRegistry};

use crate::{ClassBuilder, FunctionBuilder};

/// A named collection of classes and free functions.
pub struct Module {
    name: String,
    unit: LoadUnit,
    doc: Option<String>,
    pub(crate) classes: Vec<ClassDecl>,
    pub(crate) functions: Vec<FunctionEntry>,
}

impl Module {
    /// Create an empty module.
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            unit: LoadUnit::new(&name),
            name,
            doc: None,
            classes: Vec::new(),
            functions: Vec::new(),
        }
    }

    /// Module name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The module's load unit.
    pub fn unit(&self) -> LoadUnit {
        self.unit
    }

    /// Set the module docstring.
    pub fn set_doc(&mut self, doc: impl Into<String>) -> &mut Self {
        self.doc = Some(doc.into());
        self
    }

    /// Module docstring.
    pub fn doc(&self) -> Option<&str> {
        self.doc.as_deref()
    }

    // ==========================================================================
    // Registration
    // ==========================================================================

    /// Register a free function under `name`.
    ///
    /// Registering the same name again adds an overload.
    pub fn function<Args, R, F>(&mut self, name: &str, f: F) -> &mut Self
    where
        F: IntoNativeFn<Args, R>,
    {
        self.functions.push(function_entry(name, f));
        self
    }

    /// Register a free function, configuring its arguments and policies.
    pub fn function_with<Args, R, F>(
        &mut self,
        name: &str,
        f: F,
        configure: impl FnOnce(FunctionBuilder) -> FunctionBuilder,
    ) -> Result<&mut Self, RegistrationError>
    where
        F: IntoNativeFn<Args, R>,
    {
        let entry = configure(FunctionBuilder::new(function_entry(name, f))).build()?;
        self.functions.push(entry);
        Ok(self)
    }

    /// Register a prebuilt function entry.
    pub fn add_function(&mut self, entry: FunctionEntry) -> &mut Self {
        self.functions.push(entry);
        self
    }

    /// Start a class binding for `T` under its [`NativeType`] name.
    pub fn class<T: NativeType + Send + Sync>(&mut self) -> ClassBuilder<'_, T> {
        let name = T::type_name().into_owned();
        ClassBuilder::new(self, name)
    }

    /// Start a class binding for `T` under an explicit name.
    pub fn class_named<T: NativeType + Send + Sync>(
        &mut self,
        name: impl Into<String>,
    ) -> ClassBuilder<'_, T> {
        ClassBuilder::new(self, name.into())
    }

    /// Declared classes, in declaration order.
    pub fn classes(&self) -> &[ClassDecl] {
        &self.classes
    }

    /// Declared free functions, in declaration order.
    pub fn functions(&self) -> &[FunctionEntry] {
        &self.functions
    }

    // ==========================================================================
    // Installation
    // ==========================================================================

    /// Bind every class and register every function into `registry`.
    ///
    /// Classes are bound in declaration order, so a base must be declared
    /// (here or in an earlier module) before the classes that derive from
    /// it. Stops at the first failure; earlier registrations stay in place.
    pub fn apply_to(self, registry: &mut TypeRegistry) -> Result<(), RegistrationError> {
        let Module {
            name,
            unit,
            classes,
            functions,
            ..
        } = self;

        let class_count = classes.len();
        for decl in classes {
            registry.bind_class(decl)?;
        }

        let function_count = functions.len();
        for mut entry in functions {
            entry.unit = Some(unit);
            registry.register_function(entry)?;
        }

        debug!(
            module = %name,
            classes = class_count,
            functions = function_count,
            "applied module"
        );
        Ok(())
    }
}

impl fmt::Debug for Module {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Module")
            .field("name", &self.name)
            .field("classes", &self.classes.len())
            .field("functions", &self.functions.len())
            .finish_non_exhaustive()
    }
}

fn function_entry<Args, R, F: IntoNativeFn<Args, R>>(name: &str, f: F) -> FunctionEntry {
    FunctionEntry::new(name, F::params(), F::returns(), f.into_native_fn())
}
