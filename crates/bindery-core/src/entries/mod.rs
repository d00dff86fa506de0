//! Registry entry types.
//!
//! - [`TypeRecord`]: binding metadata for one native type
//! - [`FunctionEntry`]: one candidate of an overload set

mod function;
mod type_record;

pub use function::{
    FunctionEntry, FunctionFlags, FunctionImpl, KeepAlive, ParamSpec, ReturnPolicy, ReturnSpec,
};
pub use type_record::{
    BaseLink, BaseSpec, DestructorHook, HolderKind, LoadUnit, TypeFlags, TypeRecord, UpcastFn, UpcastMutFn,
};
