//! Type-erased native functions.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::native_error::NativeError;

use super::CallContext;

static NEXT_FN_ID: AtomicU64 = AtomicU64::new(1);

/// Type-erased native function.
///
/// Wraps any [`NativeCallable`] so functions of different signatures can be
/// stored uniformly in overload sets. Cloning shares the callable.
#[derive(Clone)]
pub struct NativeFn {
    /// Unique id assigned at creation.
    pub id: u64,
    inner: Arc<dyn NativeCallable + Send + Sync>,
}

impl NativeFn {
    /// Create a new NativeFn from a callable.
    pub fn new<F>(f: F) -> Self
    where
        F: NativeCallable + Send + Sync + 'static,
    {
        Self {
            id: NEXT_FN_ID.fetch_add(1, Ordering::Relaxed),
            inner: Arc::new(f),
        }
    }

    /// Create a NativeFn from a closure over the call context.
    pub fn from_fn<F>(f: F) -> Self
    where
        F: Fn(&mut CallContext<'_>) -> Result<(), NativeError> + Send + Sync + 'static,
    {
        Self::new(f)
    }

    /// Call this native function with the given context.
    pub fn call(&self, ctx: &mut CallContext<'_>) -> Result<(), NativeError> {
        self.inner.call(ctx)
    }
}

impl fmt::Debug for NativeFn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NativeFn")
            .field("id", &self.id)
            .finish_non_exhaustive()
    }
}

/// Trait for callable native functions.
///
/// The `call` method receives a [`CallContext`] that provides the converted
/// arguments and takes the return value.
pub trait NativeCallable {
    /// Call this function with the given context.
    fn call(&self, ctx: &mut CallContext<'_>) -> Result<(), NativeError>;
}

impl<F> NativeCallable for F
where
    F: Fn(&mut CallContext<'_>) -> Result<(), NativeError>,
{
    fn call(&self, ctx: &mut CallContext<'_>) -> Result<(), NativeError> {
        (self)(ctx)
    }
}
