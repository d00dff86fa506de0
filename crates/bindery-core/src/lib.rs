//! Core types for the bindery binding layer.
//!
//! This crate holds everything both sides of the boundary agree on:
//!
//! - [`TypeHash`] and [`NativeType`]: name-level and native type identity
//! - [`TypeRecord`] and [`FunctionEntry`]: registration metadata
//! - [`Dynamic`] and [`ObjectRef`]: values and objects on the dynamic side
//! - [`FromDynamic`] / [`ToDynamic`]: typed casters
//! - [`LifetimeManager`] and [`BoundaryLock`]: ownership and concurrency
//! - [`NativeFn`] and [`CallContext`]: the native call bridge
//! - [`version`]: library version and the host version gate

pub mod convert;
pub mod entries;
pub mod error;
pub mod into_native_fn;
pub mod native_error;
pub mod native_type;
pub mod runtime;
pub mod type_hash;
pub mod version;

pub use convert::{CastContext, FromDynamic, ToDynamic, TypeLookup, clone_object};
pub use entries::{
    BaseLink, BaseSpec, DestructorHook, FunctionEntry, FunctionFlags, FunctionImpl, HolderKind, KeepAlive,
    LoadUnit, ParamSpec, ReturnPolicy, ReturnSpec, TypeFlags, TypeRecord,
};
pub use error::{BindError, ConversionError, LifetimeViolation, RegistrationError};
pub use into_native_fn::{IntoConstructorFn, IntoMethodFn, IntoMethodMutFn, IntoNativeFn};
pub use native_error::{NativeError, tags};
pub use native_type::{NativeType, TypeShape};
pub use runtime::{
    BoundaryGuard, BoundaryLock, CallContext, DynCallable, Dynamic, DynamicClass, Instance,
    InstanceHandle, LifetimeManager, LifetimeTag, NativeCallable, NativeCell, NativeFn, ObjectRef,
    Reentry, ReleaseOutcome, Shared, SlotState, WeakObjectRef, new_cell,
};
pub use type_hash::{TypeHash, hash_constants, primitives};
pub use version::{
    MIN_HOST_VERSION, ReleaseLevel, VERSION, Version, VersionError, check_host_version,
    version_info, version_string,
};
