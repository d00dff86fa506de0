//! Virtual method trampolines.
//!
//! Native code that calls a virtual method on an object it holds goes
//! through a [`Trampoline`]. If the object belongs to a dynamic subclass that
//! overrides the method, the override runs (re-entering the dynamic side
//! under the boundary lock); otherwise the native default runs. A pure
//! virtual method with no override fails with a `pure_virtual` exception.
//!
//! ```ignore
//! let speak = dispatcher.trampoline("speak");
//! let text: String = speak.call_as(&animal, vec![])?;
//! ```

use bindery_core::{BindError, Dynamic, FromDynamic, ObjectRef};
use tracing::trace;

use crate::dispatcher::{Dispatcher, call_override, pure_virtual};
use crate::overload::CallArgs;

/// Dispatches one virtual method by name.
#[derive(Debug)]
pub struct Trampoline<'d> {
    dispatcher: &'d Dispatcher,
    method: String,
}

impl<'d> Trampoline<'d> {
    pub fn new(dispatcher: &'d Dispatcher, method: impl Into<String>) -> Self {
        Self {
            dispatcher,
            method: method.into(),
        }
    }

    /// The method name.
    pub fn method(&self) -> &str {
        &self.method
    }

    /// Check if the method is virtual on the object's class.
    pub fn is_virtual(&self, obj: &ObjectRef) -> bool {
        self.dispatcher
            .registry()
            .resolve_method(obj.record(), &self.method)
            .is_some_and(|(class, _)| class.is_virtual(&self.method))
    }

    /// Check if a call on `obj` would run a dynamic override.
    pub fn has_override(&self, obj: &ObjectRef) -> bool {
        self.is_virtual(obj)
            && obj
                .dynamic_class()
                .is_some_and(|class| class.override_for(&self.method).is_some())
    }

    /// Call the method on `obj`: override first, then the native default.
    ///
    /// Errors raised by an override are returned unchanged.
    pub fn call(&self, obj: &ObjectRef, args: Vec<Dynamic>) -> Result<Dynamic, BindError> {
        let _guard = self.dispatcher.boundary_lock().acquire();
        let resolved = self
            .dispatcher
            .registry()
            .resolve_method(obj.record(), &self.method);

        if let Some((class, set)) = resolved
            && class.is_virtual(&self.method)
        {
            if let Some(method) = obj
                .dynamic_class()
                .and_then(|dynamic| dynamic.override_for(&self.method))
            {
                trace!(method = %self.method, class = %obj.class_name(), "trampoline override");
                return call_override(&method, obj, CallArgs::new(args));
            }
            if set.iter().all(|entry| entry.is_pure_virtual())
                && let Some(entry) = set.get(0)
            {
                return Err(pure_virtual(entry));
            }
        }
        self.dispatcher
            .call_native_method(obj, &self.method, CallArgs::new(args))
    }

    /// Call and convert the result.
    pub fn call_as<R: FromDynamic>(&self, obj: &ObjectRef, args: Vec<Dynamic>) -> Result<R, BindError> {
        let value = self.call(obj, args)?;
        Ok(R::from_dynamic(&value)?)
    }
}
