//! Call context bridging the dispatcher and native Rust functions.

use std::any::Any;

use crate::NativeType;
use crate::convert::{CastContext, FromDynamic, ToDynamic};
use crate::error::BindError;
use crate::native_error::NativeError;

use super::{BoundaryLock, Dynamic, Instance, ObjectRef};

/// Lets native code call back into the binding layer.
///
/// Implemented by the dispatcher. Calls made through it go through the same
/// overload resolution and override lookup as calls from the dynamic side.
pub trait Reentry: Send + Sync {
    /// Call a method on a bound object (dynamic overrides first).
    fn call_method(
        &self,
        obj: &ObjectRef,
        name: &str,
        args: Vec<Dynamic>,
    ) -> Result<Dynamic, BindError>;

    /// Call a registered free function.
    fn call_function(&self, name: &str, args: Vec<Dynamic>) -> Result<Dynamic, BindError>;

    /// The boundary lock held during the call.
    fn boundary(&self) -> &BoundaryLock;
}

/// Context for native function calls.
///
/// ## Typed Argument Access
///
/// ```ignore
/// let x: i32 = ctx.arg(0)?;
/// let name: String = ctx.arg(1)?;
/// ```
///
/// ## Return Values
///
/// ```ignore
/// ctx.set_return(x * 2)?;
/// ```
pub struct CallContext<'a> {
    args: &'a [Dynamic],
    this: Option<&'a ObjectRef>,
    cast: CastContext<'a>,
    reentry: Option<&'a dyn Reentry>,
    return_value: Dynamic,
}

impl<'a> CallContext<'a> {
    /// Create a call context over already-converted arguments.
    pub fn new(args: &'a [Dynamic], cast: CastContext<'a>) -> Self {
        Self {
            args,
            this: None,
            cast,
            reentry: None,
            return_value: Dynamic::None,
        }
    }

    /// Set the receiver for method calls.
    pub fn with_this(mut self, this: Option<&'a ObjectRef>) -> Self {
        self.this = this;
        self
    }

    /// Attach the dispatcher for callbacks.
    pub fn with_reentry(mut self, reentry: &'a dyn Reentry) -> Self {
        self.reentry = Some(reentry);
        self
    }

    /// Get the number of arguments (excluding the receiver).
    pub fn arg_count(&self) -> usize {
        self.args.len()
    }

    /// All arguments.
    pub fn args(&self) -> &'a [Dynamic] {
        self.args
    }

    /// Get a raw reference to an argument.
    pub fn arg_slot(&self, index: usize) -> Result<&'a Dynamic, NativeError> {
        self.args
            .get(index)
            .ok_or(NativeError::ArgumentIndexOutOfBounds {
                index,
                count: self.args.len(),
            })
    }

    /// Get a typed argument value.
    pub fn arg<T: FromDynamic>(&self, index: usize) -> Result<T, NativeError> {
        let slot = self.arg_slot(index)?;
        T::from_dynamic(slot).map_err(NativeError::Conversion)
    }

    /// The receiver object.
    pub fn this_object(&self) -> Result<&'a ObjectRef, NativeError> {
        self.this
            .ok_or_else(|| NativeError::invalid_this("method called without a receiver"))
    }

    /// The receiver viewed as `T`.
    pub fn this<T: NativeType>(&self) -> Result<Instance<T>, NativeError> {
        let obj = self.this_object()?;
        Instance::new(obj.clone()).ok_or_else(|| {
            NativeError::invalid_this(format!(
                "expected {}, got {}",
                T::type_name(),
                obj.type_name()
            ))
        })
    }

    /// Set a typed return value.
    pub fn set_return<T: ToDynamic>(&mut self, value: T) -> Result<(), NativeError> {
        self.return_value = value.to_dynamic(&self.cast)?;
        Ok(())
    }

    /// Return an owned native object, adopting it on the dynamic side.
    pub fn set_return_owned<T: Any + Send + Sync>(&mut self, value: T) -> Result<(), NativeError> {
        self.return_value = self.cast.wrap_owned(value)?;
        Ok(())
    }

    /// Set the return value directly.
    pub fn set_return_dynamic(&mut self, value: Dynamic) {
        self.return_value = value;
    }

    /// Take the return value, leaving `None`.
    pub fn take_return(&mut self) -> Dynamic {
        std::mem::take(&mut self.return_value)
    }

    /// The caster context for this call.
    pub fn cast(&self) -> &CastContext<'a> {
        &self.cast
    }

    fn reentry(&self) -> Result<&'a dyn Reentry, NativeError> {
        self.reentry
            .ok_or_else(|| NativeError::runtime("no dispatcher attached to this call"))
    }

    /// Call a method on `obj`, honoring dynamic overrides.
    pub fn call_method(
        &self,
        obj: &ObjectRef,
        name: &str,
        args: Vec<Dynamic>,
    ) -> Result<Dynamic, NativeError> {
        Ok(self.reentry()?.call_method(obj, name, args)?)
    }

    /// Call a virtual method and convert its result.
    pub fn call_virtual<R: FromDynamic>(
        &self,
        obj: &ObjectRef,
        name: &str,
        args: Vec<Dynamic>,
    ) -> Result<R, NativeError> {
        let value = self.call_method(obj, name, args)?;
        R::from_dynamic(&value).map_err(NativeError::Conversion)
    }

    /// Call a registered free function.
    pub fn call_function(&self, name: &str, args: Vec<Dynamic>) -> Result<Dynamic, NativeError> {
        Ok(self.reentry()?.call_function(name, args)?)
    }

    /// Run blocking work with the boundary lock released.
    pub fn allow_threads<R>(&self, f: impl FnOnce() -> R) -> R {
        match self.reentry {
            Some(reentry) => reentry.boundary().allow_threads(f),
            None => f(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn typed_args() {
        let args = [Dynamic::Int(3), Dynamic::from("x")];
        let ctx = CallContext::new(&args, CastContext::detached());
        assert_eq!(ctx.arg_count(), 2);
        assert_eq!(ctx.arg::<i32>(0), Ok(3));
        assert_eq!(ctx.arg::<String>(1), Ok("x".to_string()));
        assert!(matches!(
            ctx.arg::<i32>(2),
            Err(NativeError::ArgumentIndexOutOfBounds { index: 2, count: 2 })
        ));
        assert!(matches!(ctx.arg::<i32>(1), Err(NativeError::Conversion(_))));
    }

    #[test]
    fn return_value_round_trip() {
        let args = [];
        let mut ctx = CallContext::new(&args, CastContext::detached());
        ctx.set_return(41i64 + 1).unwrap();
        assert_eq!(ctx.take_return(), Dynamic::Int(42));
        assert_eq!(ctx.take_return(), Dynamic::None);
    }

    #[test]
    fn missing_receiver() {
        let args = [];
        let ctx = CallContext::new(&args, CastContext::detached());
        assert!(matches!(
            ctx.this_object(),
            Err(NativeError::InvalidThis { .. })
        ));
    }

    #[test]
    fn reentry_requires_dispatcher() {
        let args = [];
        let ctx = CallContext::new(&args, CastContext::detached());
        assert!(ctx.call_function("f", vec![]).is_err());
        assert_eq!(ctx.allow_threads(|| 5), 5);
    }
}
