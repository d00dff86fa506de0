//! The dispatcher: every call across the boundary goes through here.
//!
//! A call is resolved against an overload set, the winning native function
//! runs with the converted arguments inside the boundary lock, and its return
//! value comes back as a [`Dynamic`]. Native errors and panics become
//! `BindError::NativeException`.
//!
//! # Method Calls
//!
//! [`Dispatcher::call_method`] is the dynamic-side view of a method call:
//! an override installed on the object's [`DynamicClass`] wins, otherwise
//! the method is looked up along the class's MRO. Overrides receive the
//! object as their first argument.
//!
//! # Call Policies
//!
//! Each function entry carries a return policy, applied by the caster
//! context while wrapping the result, and keep-alive edges, applied after the
//! call. Keep-alive indices: 0 is the return value, then the receiver (for
//! methods and constructors), then the arguments.

use std::any::Any;
use std::fmt;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;

use tracing::{trace, warn};

use bindery_core::{
    BindError, BoundaryLock, CallContext, CastContext, ConversionError, Dynamic, DynamicClass,
    FunctionEntry, LifetimeManager, ObjectRef, Reentry, ToDynamic, TypeFlags, TypeRecord, tags,
};
use bindery_registry::{OverloadSet, TypeRegistry};

use crate::caster::{CastEnv, CastOptions, CasterTable};
use crate::overload::{CallArgs, TieBreak, resolve, try_match_candidate};
use crate::trampoline::Trampoline;

/// Dispatch policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DispatchConfig {
    /// Allow lossy numeric conversions (wrap and truncate).
    pub allow_narrowing: bool,
    /// Tie-break rule for equally ranked candidates.
    pub tie_break: TieBreak,
}

impl DispatchConfig {
    pub fn with_narrowing(mut self, allow: bool) -> Self {
        self.allow_narrowing = allow;
        self
    }

    pub fn with_tie_break(mut self, tie_break: TieBreak) -> Self {
        self.tie_break = tie_break;
        self
    }

    fn cast_options(&self) -> CastOptions {
        CastOptions {
            allow_narrowing: self.allow_narrowing,
        }
    }
}

/// Resolves and runs calls against a sealed registry.
pub struct Dispatcher {
    registry: Arc<TypeRegistry>,
    casters: Arc<CasterTable>,
    manager: Arc<LifetimeManager>,
    config: DispatchConfig,
}

impl Dispatcher {
    /// Dispatcher with the built-in caster table and default policy.
    pub fn new(registry: Arc<TypeRegistry>, manager: Arc<LifetimeManager>) -> Self {
        Self {
            registry,
            casters: Arc::new(CasterTable::builtin()),
            manager,
            config: DispatchConfig::default(),
        }
    }

    /// Replace the caster table.
    pub fn with_casters(mut self, casters: Arc<CasterTable>) -> Self {
        self.casters = casters;
        self
    }

    /// Replace the dispatch policy.
    pub fn with_config(mut self, config: DispatchConfig) -> Self {
        self.config = config;
        self
    }

    pub fn registry(&self) -> &Arc<TypeRegistry> {
        &self.registry
    }

    pub fn casters(&self) -> &Arc<CasterTable> {
        &self.casters
    }

    pub fn manager(&self) -> &Arc<LifetimeManager> {
        &self.manager
    }

    pub fn config(&self) -> DispatchConfig {
        self.config
    }

    /// The boundary lock held during every call.
    pub fn boundary_lock(&self) -> &BoundaryLock {
        self.manager.boundary()
    }

    fn base_cast(&self) -> CastContext<'_> {
        CastContext::new(self.registry.as_ref(), &self.manager)
    }

    fn env(&self) -> CastEnv<'_> {
        CastEnv::new(
            &self.registry,
            &self.casters,
            self.base_cast(),
            self.config.cast_options(),
        )
        .with_reentry(self)
    }

    // ==========================================================================
    // Calls
    // ==========================================================================

    /// Call a registered free function.
    pub fn call(&self, name: &str, args: impl Into<CallArgs>) -> Result<Dynamic, BindError> {
        let set = self.registry.function(name).ok_or_else(|| {
            BindError::native(tags::TYPE_ERROR, format!("no function named '{}'", name))
        })?;
        self.call_set(set, None, args.into())
    }

    /// Resolve and run a call against an overload set.
    ///
    /// `receiver` is passed to instance methods and ignored by static ones.
    #[cfg_attr(feature = "profiling", profiling::function)]
    pub fn call_set(
        &self,
        set: &OverloadSet,
        receiver: Option<&ObjectRef>,
        args: CallArgs,
    ) -> Result<Dynamic, BindError> {
        let _guard = self.boundary_lock().acquire();
        guarded(|| {
            let env = self.env();
            let matched = resolve(set, &args, &env, self.config.tie_break)?;
            let entry = set.get(matched.index).ok_or_else(|| {
                BindError::native(tags::RUNTIME_ERROR, "resolved overload vanished")
            })?;
            self.invoke(entry, receiver, matched.args)
        })
    }

    /// Call a method as the dynamic side would.
    ///
    /// An override on the object's dynamic class wins; otherwise the native
    /// method is resolved along the MRO.
    pub fn call_method(
        &self,
        obj: &ObjectRef,
        name: &str,
        args: impl Into<CallArgs>,
    ) -> Result<Dynamic, BindError> {
        let args = args.into();
        let _guard = self.boundary_lock().acquire();
        if let Some(class) = obj.dynamic_class()
            && let Some(method) = class.override_for(name)
        {
            trace!(class = class.name(), method = name, "dynamic override");
            return call_override(&method, obj, args);
        }
        self.call_native_method(obj, name, args)
    }

    /// Call the native implementation of a method, skipping overrides.
    ///
    /// This is what an override uses to reach the base implementation.
    pub fn call_native_method(
        &self,
        obj: &ObjectRef,
        name: &str,
        args: impl Into<CallArgs>,
    ) -> Result<Dynamic, BindError> {
        obj.cell()?;
        let Some((_, set)) = self.registry.resolve_method(obj.record(), name) else {
            return Err(BindError::Attribute {
                type_name: obj.class_name(),
                name: name.to_string(),
            });
        };
        self.call_set(set, Some(obj), args.into())
    }

    /// Trampoline for a virtual method.
    pub fn trampoline(&self, method: impl Into<String>) -> Trampoline<'_> {
        Trampoline::new(self, method)
    }

    // ==========================================================================
    // Construction
    // ==========================================================================

    /// Construct an instance of a globally registered class by name.
    pub fn construct(&self, class: &str, args: impl Into<CallArgs>) -> Result<ObjectRef, BindError> {
        let record = self.registry.lookup_name(class, None).ok_or_else(|| {
            BindError::native(tags::TYPE_ERROR, format!("unknown class '{}'", class))
        })?;
        self.construct_record(&record, args)
    }

    /// Construct an instance of a bound class.
    pub fn construct_record(
        &self,
        record: &TypeRecord,
        args: impl Into<CallArgs>,
    ) -> Result<ObjectRef, BindError> {
        let binding = self.registry.class(record).ok_or_else(|| {
            BindError::native(tags::TYPE_ERROR, format!("'{}' is not a bound class", record.name))
        })?;
        if binding.constructors().is_empty() {
            return Err(BindError::native(
                tags::TYPE_ERROR,
                format!("{}: No constructor defined!", record.name),
            ));
        }
        match self.call_set(binding.constructors(), None, args.into())? {
            Dynamic::Object(obj) => Ok(obj),
            other => Err(BindError::native(
                tags::TYPE_ERROR,
                format!(
                    "constructor of '{}' returned {} instead of an instance",
                    record.name,
                    other.type_name()
                ),
            )),
        }
    }

    /// Construct an instance of a dynamic subclass.
    ///
    /// The native base is constructed with `args`, then the object is tagged
    /// with `class` so its overrides take part in method calls. Fails for
    /// bases marked final.
    pub fn construct_subclass(
        &self,
        class: Arc<DynamicClass>,
        args: impl Into<CallArgs>,
    ) -> Result<ObjectRef, BindError> {
        let base = Arc::clone(class.base());
        if base.flags.contains(TypeFlags::FINAL) {
            return Err(BindError::native(
                tags::TYPE_ERROR,
                format!("type '{}' is not an acceptable base type", base.name),
            ));
        }
        let obj = self.construct_record(&base, args)?;
        trace!(class = class.name(), base = %base.name, "dynamic subclass instance");
        obj.set_dynamic_class(class);
        Ok(obj)
    }

    // ==========================================================================
    // Attributes
    // ==========================================================================

    /// Read an attribute: a property along the MRO, then a dynamic attribute.
    pub fn get_attr(&self, obj: &ObjectRef, name: &str) -> Result<Dynamic, BindError> {
        obj.cell()?;
        if let Some(property) = self.registry.resolve_property(obj.record(), name) {
            let _guard = self.boundary_lock().acquire();
            return guarded(|| self.invoke(&property.getter, Some(obj), Vec::new()));
        }
        if obj.allows_dynamic_attrs()
            && let Some(value) = obj.get_attr(name)
        {
            return Ok(value);
        }
        Err(BindError::Attribute {
            type_name: obj.class_name(),
            name: name.to_string(),
        })
    }

    /// Write an attribute: a property setter along the MRO, then a dynamic
    /// attribute if the class allows them.
    pub fn set_attr(&self, obj: &ObjectRef, name: &str, value: Dynamic) -> Result<(), BindError> {
        obj.cell()?;
        if let Some(property) = self.registry.resolve_property(obj.record(), name) {
            let Some(setter) = &property.setter else {
                return Err(BindError::native(
                    tags::ATTRIBUTE_ERROR,
                    format!("can't set attribute '{}'", name),
                ));
            };
            let _guard = self.boundary_lock().acquire();
            return guarded(|| {
                let env = self.env();
                let args = CallArgs::new(vec![value]);
                let Some(matched) = try_match_candidate(0, setter, &args, &env)? else {
                    let expected = setter
                        .params
                        .first()
                        .map(|p| env.shape_name(&p.shape))
                        .unwrap_or_default();
                    return Err(ConversionError::mismatch(expected, args.describe()).into());
                };
                self.invoke(setter, Some(obj), matched.args).map(drop)
            });
        }
        if obj.allows_dynamic_attrs() {
            obj.set_attr(name, value);
            return Ok(());
        }
        Err(BindError::Attribute {
            type_name: obj.class_name(),
            name: name.to_string(),
        })
    }

    // ==========================================================================
    // Values
    // ==========================================================================

    /// Hand a native value to the dynamic side (objects are adopted).
    pub fn to_dynamic<T: ToDynamic>(&self, value: T) -> Result<Dynamic, BindError> {
        let _guard = self.boundary_lock().acquire();
        Ok(self.casters.from_native(value, &self.base_cast())?)
    }

    /// Hand an owned native object to the dynamic side.
    pub fn adopt<T: Any + Send + Sync>(&self, value: T) -> Result<ObjectRef, BindError> {
        let _guard = self.boundary_lock().acquire();
        match self.base_cast().wrap_owned(value)? {
            Dynamic::Object(obj) => Ok(obj),
            other => Err(BindError::native(
                tags::TYPE_ERROR,
                format!("expected an instance, got {}", other.type_name()),
            )),
        }
    }

    // ==========================================================================
    // Invocation
    // ==========================================================================

    /// Run one resolved candidate with converted arguments.
    #[cfg_attr(feature = "profiling", profiling::function)]
    fn invoke(
        &self,
        entry: &FunctionEntry,
        receiver: Option<&ObjectRef>,
        args: Vec<Dynamic>,
    ) -> Result<Dynamic, BindError> {
        let Some(native) = entry.native() else {
            return Err(pure_virtual(entry));
        };
        let receiver = if entry.is_method() { receiver } else { None };
        if entry.is_method() && receiver.is_none() {
            return Err(BindError::native(
                tags::TYPE_ERROR,
                format!("{} requires a receiver", entry.qualified_name()),
            ));
        }

        let cast = self
            .base_cast()
            .with_policy(entry.policy)
            .with_parent(receiver)
            .with_unit(entry.unit);
        let mut ctx = CallContext::new(&args, cast)
            .with_this(receiver)
            .with_reentry(self);

        trace!(function = %entry.qualified_name(), args = args.len(), "dispatch");
        native.call(&mut ctx)?;
        let result = ctx.take_return();

        apply_keep_alive(entry, receiver, &args, &result);
        Ok(result)
    }
}

impl Reentry for Dispatcher {
    fn call_method(&self, obj: &ObjectRef, name: &str, args: Vec<Dynamic>) -> Result<Dynamic, BindError> {
        Dispatcher::call_method(self, obj, name, args)
    }

    fn call_function(&self, name: &str, args: Vec<Dynamic>) -> Result<Dynamic, BindError> {
        self.call(name, args)
    }

    fn boundary(&self) -> &BoundaryLock {
        self.boundary_lock()
    }
}

impl fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dispatcher")
            .field("types", &self.registry.type_count())
            .field("functions", &self.registry.function_count())
            .field("casters", &self.casters.len())
            .field("config", &self.config)
            .finish()
    }
}

/// Call a dynamic override with the object prepended.
pub(crate) fn call_override(
    method: &bindery_core::DynCallable,
    obj: &ObjectRef,
    args: CallArgs,
) -> Result<Dynamic, BindError> {
    if !args.keywords.is_empty() {
        return Err(BindError::native(
            tags::TYPE_ERROR,
            format!("{}() does not take keyword arguments", method.name()),
        ));
    }
    let mut full = Vec::with_capacity(args.positional.len() + 1);
    full.push(Dynamic::Object(obj.clone()));
    full.extend(args.positional);
    method.call(&full)
}

pub(crate) fn pure_virtual(entry: &FunctionEntry) -> BindError {
    BindError::native(
        tags::PURE_VIRTUAL,
        format!(
            "Tried to call pure virtual function \"{}\"",
            entry.qualified_name()
        ),
    )
}

/// Run `f`, turning a panic into a `panic` native exception.
fn guarded<R>(f: impl FnOnce() -> Result<R, BindError>) -> Result<R, BindError> {
    catch_unwind(AssertUnwindSafe(f)).unwrap_or_else(|payload| {
        let message = panic_message(payload.as_ref());
        warn!(message = %message, "native code panicked");
        Err(BindError::native(tags::PANIC, message))
    })
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "native code panicked".to_string()
    }
}

/// Resolve a keep-alive index to the value at that position.
fn keep_alive_slot<'v>(
    entry: &FunctionEntry,
    index: usize,
    receiver: Option<&'v ObjectRef>,
    args: &'v [Dynamic],
    result: &'v Dynamic,
) -> Option<&'v ObjectRef> {
    if index == 0 {
        return result.as_object();
    }
    if entry.is_constructor() {
        // the new instance stands in for the receiver
        return match index {
            1 => result.as_object(),
            n => args.get(n - 2).and_then(Dynamic::as_object),
        };
    }
    if entry.is_method() {
        return match index {
            1 => receiver,
            n => args.get(n - 2).and_then(Dynamic::as_object),
        };
    }
    args.get(index - 1).and_then(Dynamic::as_object)
}

fn apply_keep_alive(
    entry: &FunctionEntry,
    receiver: Option<&ObjectRef>,
    args: &[Dynamic],
    result: &Dynamic,
) {
    for policy in &entry.keep_alive {
        let nurse = keep_alive_slot(entry, policy.nurse, receiver, args, result);
        let patient = keep_alive_slot(entry, policy.patient, receiver, args, result);
        match (nurse, patient) {
            (Some(nurse), Some(patient)) if !nurse.ptr_eq(patient) => {
                trace!(
                    function = %entry.qualified_name(),
                    nurse = policy.nurse,
                    patient = policy.patient,
                    "keep alive"
                );
                nurse.keep_alive(patient.clone());
            }
            _ => {}
        }
    }
}
