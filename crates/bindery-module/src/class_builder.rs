//! ClassBuilder for binding native types as classes.
//!
//! ClassBuilder provides a fluent API for exposing a native Rust type with
//! constructors, methods, properties, bases and virtual methods.
//!
//! # Example
//!
//! ```ignore
//! module
//!     .class::<Dog>()
//!     .base::<Animal>(|d| &d.animal, |d| &mut d.animal)
//!     .constructor(|name: String| Dog::new(name))
//!     .method("bark", |d: &Dog| d.bark())
//!     .method_mut_with("rename", |d: &mut Dog, name: String| d.name = name, |m| m.arg("name"))?
//!     .virtual_method("speak", |d: &Dog| d.speak())
//!     .readonly("name", |d: &Dog| d.name.clone())
//!     .build()?;
//! ```

use std::any::{Any, TypeId};
use std::marker::PhantomData;
use std::sync::Arc;

use tracing::debug;

use bindery_core::{
    BaseSpec, DestructorHook, FunctionEntry, FunctionFlags, HolderKind, IntoConstructorFn,
    IntoMethodFn, IntoMethodMutFn, IntoNativeFn, NativeFn, NativeType, ParamSpec,
    RegistrationError, ReturnSpec, TypeFlags, TypeRecord,
};
use bindery_registry::{ClassDecl, ImplicitConversion, PropertyEntry};

use crate::{FunctionBuilder, Module};

/// Properties declared on struct fields, usually derived with
/// `#[derive(NativeType)]` and `#[bindery(get, set)]`.
pub trait FieldProperties: NativeType + Send + Sync + Sized {
    /// Add the field properties to `class`.
    fn bind_fields<'m>(class: ClassBuilder<'m, Self>) -> ClassBuilder<'m, Self>;
}

/// Builder for one bound class.
///
/// Created by [`Module::class`] or [`Module::class_named`]; nothing is
/// recorded on the module until [`build`](Self::build).
pub struct ClassBuilder<'m, T: NativeType + Send + Sync> {
    module: &'m mut Module,
    name: String,
    flags: TypeFlags,
    local: bool,
    holder: HolderKind,
    destructor: Option<DestructorHook>,
    bases: Vec<BaseSpec>,

    // === Members ===
    constructors: Vec<FunctionEntry>,
    methods: Vec<FunctionEntry>,
    properties: Vec<PropertyEntry>,
    implicit: Vec<ImplicitConversion>,
    doc: Option<String>,
    _marker: PhantomData<T>,
}

impl<'m, T: NativeType + Send + Sync> ClassBuilder<'m, T> {
    pub(crate) fn new(module: &'m mut Module, name: String) -> Self {
        Self {
            module,
            name,
            flags: TypeFlags::empty(),
            local: false,
            holder: HolderKind::default(),
            destructor: None,
            bases: Vec::new(),
            constructors: Vec::new(),
            methods: Vec::new(),
            properties: Vec::new(),
            implicit: Vec::new(),
            doc: None,
            _marker: PhantomData,
        }
    }

    // =========================================================================
    // Type traits
    // =========================================================================

    /// Register the class in the module's load unit only.
    pub fn module_local(mut self) -> Self {
        self.local = true;
        self
    }

    /// Allow arbitrary attributes on instances.
    pub fn dynamic_attr(mut self) -> Self {
        self.flags |= TypeFlags::DYNAMIC_ATTR;
        self
    }

    /// Forbid dynamic-side subclasses.
    pub fn final_class(mut self) -> Self {
        self.flags |= TypeFlags::FINAL;
        self
    }

    /// How instances created by constructors are held.
    pub fn holder(mut self, holder: HolderKind) -> Self {
        self.holder = holder;
        self
    }

    /// Run `f` on the object right before it is destroyed.
    pub fn destructor<F>(mut self, f: F) -> Self
    where
        F: Fn(&mut T) + Send + Sync + 'static,
    {
        let hook: DestructorHook = Arc::new(move |value: &mut dyn Any| {
            if let Some(value) = value.downcast_mut::<T>() {
                f(value);
            }
        });
        self.destructor = Some(hook);
        self
    }

    /// Declare `B` as a base, reached through field projections.
    ///
    /// Bases are searched in the order they are declared.
    pub fn base<B: NativeType>(mut self, up: fn(&T) -> &B, up_mut: fn(&mut T) -> &mut B) -> Self {
        self.bases.push(BaseSpec::new(up, up_mut));
        self
    }

    /// Set the class docstring.
    pub fn doc(mut self, doc: impl Into<String>) -> Self {
        self.doc = Some(doc.into());
        self
    }

    // =========================================================================
    // Constructors
    // =========================================================================

    /// Add a constructor overload.
    pub fn constructor<Args, F>(mut self, f: F) -> Self
    where
        F: IntoConstructorFn<Args, T>,
    {
        self.constructors.push(constructor_entry(&self.name, f));
        self
    }

    /// Add a constructor overload, configuring its arguments.
    pub fn constructor_with<Args, F>(
        mut self,
        f: F,
        configure: impl FnOnce(FunctionBuilder) -> FunctionBuilder,
    ) -> Result<Self, RegistrationError>
    where
        F: IntoConstructorFn<Args, T>,
    {
        let entry = configure(FunctionBuilder::new(constructor_entry(&self.name, f))).build()?;
        self.constructors.push(entry);
        Ok(self)
    }

    /// Accept values of `S` wherever this class is expected, converting
    /// them with `f`.
    pub fn implicit_from<S, F>(mut self, f: F) -> Self
    where
        S: NativeType,
        F: IntoConstructorFn<(S,), T>,
    {
        self.implicit.push(ImplicitConversion {
            source: S::shape(),
            source_name: S::type_name(),
            target: TypeId::of::<T>(),
            convert: f.into_native_fn(),
        });
        self
    }

    // =========================================================================
    // Methods
    // =========================================================================

    /// Add a method taking `&T`.
    pub fn method<Args, R, F>(mut self, name: &str, f: F) -> Self
    where
        F: IntoMethodFn<T, Args, R>,
    {
        self.methods.push(method_entry(name, f));
        self
    }

    /// Add a method taking `&T`, configuring its arguments and policies.
    pub fn method_with<Args, R, F>(
        self,
        name: &str,
        f: F,
        configure: impl FnOnce(FunctionBuilder) -> FunctionBuilder,
    ) -> Result<Self, RegistrationError>
    where
        F: IntoMethodFn<T, Args, R>,
    {
        self.push_method(configure(FunctionBuilder::new(method_entry(name, f))))
    }

    /// Add a method taking `&mut T`.
    pub fn method_mut<Args, R, F>(mut self, name: &str, f: F) -> Self
    where
        F: IntoMethodMutFn<T, Args, R>,
    {
        self.methods.push(method_mut_entry(name, f));
        self
    }

    /// Add a method taking `&mut T`, configuring its arguments and policies.
    pub fn method_mut_with<Args, R, F>(
        self,
        name: &str,
        f: F,
        configure: impl FnOnce(FunctionBuilder) -> FunctionBuilder,
    ) -> Result<Self, RegistrationError>
    where
        F: IntoMethodMutFn<T, Args, R>,
    {
        self.push_method(configure(FunctionBuilder::new(method_mut_entry(name, f))))
    }

    /// Add a method with raw [`CallContext`](bindery_core::CallContext)
    /// access and explicitly declared parameters.
    pub fn method_raw(
        mut self,
        name: &str,
        params: Vec<ParamSpec>,
        returns: ReturnSpec,
        f: NativeFn,
    ) -> Self {
        self.methods.push(FunctionEntry::new(name, params, returns, f));
        self
    }

    /// Add a static method (no receiver).
    pub fn static_method<Args, R, F>(mut self, name: &str, f: F) -> Self
    where
        F: IntoNativeFn<Args, R>,
    {
        let mut entry = FunctionEntry::new(name, F::params(), F::returns(), f.into_native_fn());
        entry.flags |= FunctionFlags::STATIC;
        self.methods.push(entry);
        self
    }

    /// Add a static method, configuring its arguments and policies.
    pub fn static_method_with<Args, R, F>(
        self,
        name: &str,
        f: F,
        configure: impl FnOnce(FunctionBuilder) -> FunctionBuilder,
    ) -> Result<Self, RegistrationError>
    where
        F: IntoNativeFn<Args, R>,
    {
        let entry = FunctionEntry::new(name, F::params(), F::returns(), f.into_native_fn());
        self.push_method(configure(FunctionBuilder::new(entry).flag(FunctionFlags::STATIC)))
    }

    /// Add a virtual method with a native default.
    ///
    /// Dynamic subclasses may override it; native callers reach the
    /// override through a trampoline.
    pub fn virtual_method<Args, R, F>(mut self, name: &str, f: F) -> Self
    where
        F: IntoMethodFn<T, Args, R>,
    {
        let mut entry = method_entry(name, f);
        entry.flags |= FunctionFlags::VIRTUAL;
        self.methods.push(entry);
        self
    }

    /// Declare a pure virtual method returning `R`.
    ///
    /// Parameters are declared on the builder with
    /// [`FunctionBuilder::param`]. Calling it on an object without an
    /// override fails with a `pure_virtual` exception.
    pub fn pure_virtual<R: NativeType>(
        self,
        name: &str,
        configure: impl FnOnce(FunctionBuilder) -> FunctionBuilder,
    ) -> Result<Self, RegistrationError> {
        let entry = FunctionEntry::abstract_method(name, Vec::new(), ReturnSpec::of::<R>());
        self.push_method(configure(FunctionBuilder::new(entry)))
    }

    fn push_method(mut self, builder: FunctionBuilder) -> Result<Self, RegistrationError> {
        self.methods.push(builder.build()?);
        Ok(self)
    }

    // =========================================================================
    // Properties
    // =========================================================================

    /// Add a read-write property.
    pub fn property<V, G, S>(mut self, name: &str, getter: G, setter: S) -> Self
    where
        G: IntoMethodFn<T, (), V>,
        S: IntoMethodMutFn<T, (V,), ()>,
    {
        self.properties.push(PropertyEntry {
            name: name.to_string(),
            getter: method_entry(name, getter),
            setter: Some(method_mut_entry(name, setter)),
            doc: None,
        });
        self
    }

    /// Add a read-only property.
    pub fn readonly<V, G>(mut self, name: &str, getter: G) -> Self
    where
        G: IntoMethodFn<T, (), V>,
    {
        self.properties.push(PropertyEntry {
            name: name.to_string(),
            getter: method_entry(name, getter),
            setter: None,
            doc: None,
        });
        self
    }

    /// Add the properties declared on the type's fields.
    pub fn fields(self) -> Self
    where
        T: FieldProperties,
    {
        T::bind_fields(self)
    }

    // =========================================================================
    // Build
    // =========================================================================

    /// Validate the class and record it on the module.
    pub fn build(self) -> Result<(), RegistrationError> {
        let ClassBuilder {
            module,
            name,
            flags,
            local,
            holder,
            destructor,
            bases,
            mut constructors,
            mut methods,
            mut properties,
            implicit,
            doc,
            ..
        } = self;

        if name.is_empty() {
            return Err(RegistrationError::InvalidDeclaration(
                "class name is empty".to_string(),
            ));
        }
        if flags.contains(TypeFlags::FINAL)
            && let Some(pure) = methods.iter().find(|m| m.is_pure_virtual())
        {
            return Err(RegistrationError::InvalidDeclaration(format!(
                "final class '{}' declares pure virtual method '{}'",
                name, pure.name
            )));
        }

        let unit = module.unit();
        let mut record = TypeRecord::named::<T>(name.clone())
            .with_holder(holder)
            .with_flags(flags);
        if local {
            record = record.in_unit(unit);
        }
        if let Some(hook) = destructor {
            record = record.with_destructor(hook);
        }

        let entries = constructors
            .iter_mut()
            .chain(methods.iter_mut())
            .chain(properties.iter_mut().flat_map(|p| {
                std::iter::once(&mut p.getter).chain(p.setter.as_mut())
            }));
        for entry in entries {
            entry.unit = Some(unit);
        }

        debug!(
            class = %name,
            module = module.name(),
            constructors = constructors.len(),
            methods = methods.len(),
            properties = properties.len(),
            "declared class"
        );

        module.classes.push(ClassDecl {
            record,
            bases,
            constructors,
            methods,
            properties,
            implicit,
            doc,
        });
        Ok(())
    }
}

fn constructor_entry<Args, T, F: IntoConstructorFn<Args, T>>(name: &str, f: F) -> FunctionEntry
where
    T: NativeType,
{
    FunctionEntry::new(name, F::params(), ReturnSpec::of::<T>(), f.into_native_fn())
}

fn method_entry<T, Args, R, F: IntoMethodFn<T, Args, R>>(name: &str, f: F) -> FunctionEntry {
    FunctionEntry::new(name, F::params(), F::returns(), f.into_native_fn())
}

fn method_mut_entry<T, Args, R, F: IntoMethodMutFn<T, Args, R>>(name: &str, f: F) -> FunctionEntry {
    FunctionEntry::new(name, F::params(), F::returns(), f.into_native_fn())
}
