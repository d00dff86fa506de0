//! Runtime values, object lifetimes and the native call bridge.
//!
//! ## Key Types
//!
//! - [`Dynamic`]: value type exchanged with the dynamic side
//! - [`ObjectRef`]: dynamic-side wrapper around a bound native object
//! - [`LifetimeManager`]: generational table of instance handles
//! - [`BoundaryLock`]: re-entrant lock held across boundary crossings
//! - [`NativeFn`]: type-erased callable wrapper for native functions
//! - [`CallContext`]: bridge between the dispatcher and Rust for function calls

mod boundary;
mod call_context;
mod dynamic;
mod dynamic_class;
mod lifetime;
mod native_fn;
mod object;

pub use boundary::{BoundaryGuard, BoundaryLock};
pub use call_context::{CallContext, Reentry};
pub use dynamic::{DynCallable, Dynamic};
pub use dynamic_class::DynamicClass;
pub use lifetime::{
    InstanceHandle, LifetimeManager, LifetimeTag, NativeCell, ReleaseOutcome, SlotState, new_cell,
};
pub use native_fn::{NativeCallable, NativeFn};
pub use object::{Instance, ObjectRef, Shared, WeakObjectRef};
