//! Typed casters between Rust values and [`Dynamic`] values.
//!
//! - [`FromDynamic`]: extract a Rust value from an argument
//! - [`ToDynamic`]: turn a return value into a [`Dynamic`], wrapping native
//!   objects through the lifetime manager
//!
//! `FromDynamic` is strict: integers must fit the target width and floats
//! never become integers. The dispatcher normalizes arguments (promotion,
//! narrowing, implicit constructors) before they reach these impls.
//!
//! ```
//! use bindery_core::{CastContext, Dynamic, FromDynamic, ToDynamic};
//!
//! let value: i32 = i32::from_dynamic(&Dynamic::Int(42)).unwrap();
//! let back = value.to_dynamic(&CastContext::detached()).unwrap();
//! assert_eq!(back, Dynamic::Int(42));
//! ```

use std::any::{Any, TypeId};
use std::borrow::Cow;
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::entries::{HolderKind, LoadUnit, ReturnPolicy, TypeRecord};
use crate::error::ConversionError;
use crate::native_error::{NativeError, tags};
use crate::runtime::{
    DynCallable, Dynamic, Instance, LifetimeManager, LifetimeTag, NativeCell, ObjectRef, Shared,
    new_cell,
};
use crate::{NativeType, TypeHash, TypeShape};

/// Resolves native identities to registered type records.
///
/// Implemented by the type registry; this is the seam that lets casters wrap
/// native objects without depending on the registry crate.
pub trait TypeLookup: Send + Sync {
    /// Find the record for a native type, checking `unit`'s local types first.
    fn record_for(&self, type_id: TypeId, unit: Option<LoadUnit>) -> Option<Arc<TypeRecord>>;
}

/// Everything a return-value caster needs to wrap native objects.
#[derive(Clone, Copy)]
pub struct CastContext<'a> {
    types: Option<&'a dyn TypeLookup>,
    manager: Option<&'a Arc<LifetimeManager>>,
    policy: ReturnPolicy,
    parent: Option<&'a ObjectRef>,
    unit: Option<LoadUnit>,
}

impl<'a> CastContext<'a> {
    /// Context backed by a registry and a lifetime manager.
    pub fn new(types: &'a dyn TypeLookup, manager: &'a Arc<LifetimeManager>) -> Self {
        Self {
            types: Some(types),
            manager: Some(manager),
            policy: ReturnPolicy::Automatic,
            parent: None,
            unit: None,
        }
    }

    /// Context that can only convert plain values.
    pub fn detached() -> Self {
        Self {
            types: None,
            manager: None,
            policy: ReturnPolicy::Automatic,
            parent: None,
            unit: None,
        }
    }

    /// Set the return value policy.
    pub fn with_policy(mut self, policy: ReturnPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Set the receiver used by `ReferenceInternal`.
    pub fn with_parent(mut self, parent: Option<&'a ObjectRef>) -> Self {
        self.parent = parent;
        self
    }

    /// Set the load unit used to resolve module-local types.
    pub fn with_unit(mut self, unit: Option<LoadUnit>) -> Self {
        self.unit = unit;
        self
    }

    /// The active return value policy.
    pub fn policy(&self) -> ReturnPolicy {
        self.policy
    }

    /// The lifetime manager, if attached.
    pub fn manager(&self) -> Option<&'a Arc<LifetimeManager>> {
        self.manager
    }

    /// Find the registered record for `T`.
    pub fn record_for<T: Any>(&self) -> Result<Arc<TypeRecord>, NativeError> {
        self.types
            .and_then(|types| types.record_for(TypeId::of::<T>(), self.unit))
            .ok_or_else(|| {
                NativeError::raise(
                    tags::TYPE_ERROR,
                    format!(
                        "unable to convert return value: type '{}' is not registered",
                        std::any::type_name::<T>()
                    ),
                )
            })
    }

    fn require_manager(&self) -> Result<&'a Arc<LifetimeManager>, NativeError> {
        self.manager
            .ok_or_else(|| NativeError::runtime("no lifetime manager available for object return"))
    }

    /// Hand an owned native value to the dynamic side.
    pub fn wrap_owned<T: Any + Send + Sync>(&self, value: T) -> Result<Dynamic, NativeError> {
        let record = self.record_for::<T>()?;
        let manager = self.require_manager()?;
        let tag = match record.holder {
            HolderKind::Shared => LifetimeTag::Shared,
            HolderKind::Owning | HolderKind::Raw => LifetimeTag::Owning,
        };
        Ok(Dynamic::Object(ObjectRef::adopt(
            manager,
            new_cell(value),
            record,
            tag,
            None,
        )))
    }

    /// Hand a cell that native code still holds to the dynamic side.
    ///
    /// `Reference` and `ReferenceInternal` produce a non-owning view; every
    /// other policy shares ownership.
    pub fn wrap_cell(
        &self,
        cell: NativeCell,
        record: Arc<TypeRecord>,
    ) -> Result<Dynamic, NativeError> {
        let manager = self.require_manager()?;
        let (tag, keep_alive_of) = match self.policy {
            ReturnPolicy::Reference => (LifetimeTag::Reference, None),
            ReturnPolicy::ReferenceInternal => (LifetimeTag::Reference, self.parent),
            ReturnPolicy::Automatic | ReturnPolicy::Shared | ReturnPolicy::TakeOwnership => {
                (LifetimeTag::Shared, None)
            }
        };
        Ok(Dynamic::Object(ObjectRef::adopt(
            manager,
            cell,
            record,
            tag,
            keep_alive_of,
        )))
    }
}

/// Extract a Rust value from a dynamic argument.
pub trait FromDynamic: Sized {
    /// Convert, failing with a [`ConversionError`] on shape or range mismatch.
    fn from_dynamic(value: &Dynamic) -> Result<Self, ConversionError>;
}

/// Convert a Rust value into a dynamic value.
pub trait ToDynamic {
    /// Convert, wrapping native objects through `cx`.
    fn to_dynamic(self, cx: &CastContext<'_>) -> Result<Dynamic, NativeError>;
}

fn mismatch(expected: impl Into<String>, value: &Dynamic) -> ConversionError {
    ConversionError::mismatch(expected, value.type_name())
}

// ============================================================================
// Integer implementations
// ============================================================================

macro_rules! impl_int_casters {
    ($($ty:ty),*) => {
        $(
            impl FromDynamic for $ty {
                fn from_dynamic(value: &Dynamic) -> Result<Self, ConversionError> {
                    match value {
                        Dynamic::Int(v) => <$ty>::try_from(*v).map_err(|_| {
                            ConversionError::IntegerOverflow {
                                value: *v,
                                target_type: stringify!($ty),
                            }
                        }),
                        Dynamic::Bool(b) => Ok(<$ty>::from(*b)),
                        _ => Err(mismatch("int", value)),
                    }
                }
            }

            impl ToDynamic for $ty {
                fn to_dynamic(self, _cx: &CastContext<'_>) -> Result<Dynamic, NativeError> {
                    i64::try_from(self).map(Dynamic::Int).map_err(|_| {
                        NativeError::value_error(format!(
                            "{} value {} does not fit in int",
                            stringify!($ty),
                            self
                        ))
                    })
                }
            }
        )*
    };
}

impl_int_casters!(i8, i16, i32, i64, u8, u16, u32, u64);

// ============================================================================
// Float implementations
// ============================================================================

impl FromDynamic for f32 {
    fn from_dynamic(value: &Dynamic) -> Result<Self, ConversionError> {
        match value {
            Dynamic::Float(v) if !v.is_finite() || v.abs() <= f32::MAX as f64 => Ok(*v as f32),
            Dynamic::Float(v) => Err(ConversionError::FloatConversion {
                value: *v,
                target_type: "f32",
            }),
            Dynamic::Int(v) => Ok(*v as f32),
            _ => Err(mismatch("float", value)),
        }
    }
}

impl FromDynamic for f64 {
    fn from_dynamic(value: &Dynamic) -> Result<Self, ConversionError> {
        match value {
            Dynamic::Float(v) => Ok(*v),
            Dynamic::Int(v) => Ok(*v as f64),
            _ => Err(mismatch("float", value)),
        }
    }
}

impl ToDynamic for f32 {
    fn to_dynamic(self, _cx: &CastContext<'_>) -> Result<Dynamic, NativeError> {
        Ok(Dynamic::Float(self as f64))
    }
}

impl ToDynamic for f64 {
    fn to_dynamic(self, _cx: &CastContext<'_>) -> Result<Dynamic, NativeError> {
        Ok(Dynamic::Float(self))
    }
}

// ============================================================================
// Bool, unit and string implementations
// ============================================================================

impl FromDynamic for bool {
    fn from_dynamic(value: &Dynamic) -> Result<Self, ConversionError> {
        match value {
            Dynamic::Bool(b) => Ok(*b),
            _ => Err(mismatch("bool", value)),
        }
    }
}

impl ToDynamic for bool {
    fn to_dynamic(self, _cx: &CastContext<'_>) -> Result<Dynamic, NativeError> {
        Ok(Dynamic::Bool(self))
    }
}

impl FromDynamic for () {
    fn from_dynamic(value: &Dynamic) -> Result<Self, ConversionError> {
        match value {
            Dynamic::None => Ok(()),
            _ => Err(mismatch("None", value)),
        }
    }
}

impl ToDynamic for () {
    fn to_dynamic(self, _cx: &CastContext<'_>) -> Result<Dynamic, NativeError> {
        Ok(Dynamic::None)
    }
}

impl FromDynamic for String {
    fn from_dynamic(value: &Dynamic) -> Result<Self, ConversionError> {
        match value {
            Dynamic::Str(s) => Ok(s.clone()),
            _ => Err(mismatch("str", value)),
        }
    }
}

impl ToDynamic for String {
    fn to_dynamic(self, _cx: &CastContext<'_>) -> Result<Dynamic, NativeError> {
        Ok(Dynamic::Str(self))
    }
}

impl ToDynamic for &str {
    fn to_dynamic(self, _cx: &CastContext<'_>) -> Result<Dynamic, NativeError> {
        Ok(Dynamic::Str(self.to_string()))
    }
}

// ============================================================================
// Container implementations
// ============================================================================

impl<T: FromDynamic> FromDynamic for Vec<T> {
    fn from_dynamic(value: &Dynamic) -> Result<Self, ConversionError> {
        match value {
            Dynamic::List(items) => items.iter().map(T::from_dynamic).collect(),
            _ => Err(mismatch("list", value)),
        }
    }
}

impl<T: ToDynamic> ToDynamic for Vec<T> {
    fn to_dynamic(self, cx: &CastContext<'_>) -> Result<Dynamic, NativeError> {
        self.into_iter()
            .map(|item| item.to_dynamic(cx))
            .collect::<Result<Vec<_>, _>>()
            .map(Dynamic::List)
    }
}

impl<T: FromDynamic> FromDynamic for BTreeMap<String, T> {
    fn from_dynamic(value: &Dynamic) -> Result<Self, ConversionError> {
        match value {
            Dynamic::Dict(items) => items
                .iter()
                .map(|(k, v)| Ok((k.clone(), T::from_dynamic(v)?)))
                .collect(),
            _ => Err(mismatch("dict", value)),
        }
    }
}

impl<T: ToDynamic> ToDynamic for BTreeMap<String, T> {
    fn to_dynamic(self, cx: &CastContext<'_>) -> Result<Dynamic, NativeError> {
        self.into_iter()
            .map(|(k, v)| Ok((k, v.to_dynamic(cx)?)))
            .collect::<Result<BTreeMap<_, _>, NativeError>>()
            .map(Dynamic::Dict)
    }
}

impl<T: FromDynamic> FromDynamic for Option<T> {
    fn from_dynamic(value: &Dynamic) -> Result<Self, ConversionError> {
        match value {
            Dynamic::None => Ok(None),
            other => T::from_dynamic(other).map(Some),
        }
    }
}

impl<T: ToDynamic> ToDynamic for Option<T> {
    fn to_dynamic(self, cx: &CastContext<'_>) -> Result<Dynamic, NativeError> {
        match self {
            Some(v) => v.to_dynamic(cx),
            None => Ok(Dynamic::None),
        }
    }
}

impl<T: ToDynamic> ToDynamic for Result<T, NativeError> {
    fn to_dynamic(self, cx: &CastContext<'_>) -> Result<Dynamic, NativeError> {
        self?.to_dynamic(cx)
    }
}

impl<T: NativeType> NativeType for Result<T, NativeError> {
    fn type_hash() -> TypeHash {
        T::type_hash()
    }

    fn type_name() -> Cow<'static, str> {
        T::type_name()
    }

    fn shape() -> TypeShape {
        T::shape()
    }
}

// ============================================================================
// Dynamic passthrough
// ============================================================================

impl FromDynamic for Dynamic {
    fn from_dynamic(value: &Dynamic) -> Result<Self, ConversionError> {
        Ok(value.clone())
    }
}

impl ToDynamic for Dynamic {
    fn to_dynamic(self, _cx: &CastContext<'_>) -> Result<Dynamic, NativeError> {
        Ok(self)
    }
}

impl FromDynamic for DynCallable {
    fn from_dynamic(value: &Dynamic) -> Result<Self, ConversionError> {
        match value {
            Dynamic::Callable(c) => Ok(c.clone()),
            _ => Err(mismatch("function", value)),
        }
    }
}

impl ToDynamic for DynCallable {
    fn to_dynamic(self, _cx: &CastContext<'_>) -> Result<Dynamic, NativeError> {
        Ok(Dynamic::Callable(self))
    }
}

// ============================================================================
// Object implementations
// ============================================================================

impl FromDynamic for ObjectRef {
    fn from_dynamic(value: &Dynamic) -> Result<Self, ConversionError> {
        match value {
            Dynamic::Object(obj) => Ok(obj.clone()),
            _ => Err(mismatch("object", value)),
        }
    }
}

impl ToDynamic for ObjectRef {
    fn to_dynamic(self, _cx: &CastContext<'_>) -> Result<Dynamic, NativeError> {
        Ok(Dynamic::Object(self))
    }
}

impl NativeType for ObjectRef {
    fn type_hash() -> TypeHash {
        TypeShape::Object.hash()
    }

    fn type_name() -> Cow<'static, str> {
        Cow::Borrowed("object")
    }

    fn shape() -> TypeShape {
        TypeShape::Object
    }
}

impl<T: NativeType> FromDynamic for Instance<T> {
    fn from_dynamic(value: &Dynamic) -> Result<Self, ConversionError> {
        match value {
            Dynamic::Object(obj) => {
                Instance::new(obj.clone()).ok_or_else(|| mismatch(T::type_name(), value))
            }
            _ => Err(mismatch(T::type_name(), value)),
        }
    }
}

impl<T: NativeType> ToDynamic for Instance<T> {
    fn to_dynamic(self, _cx: &CastContext<'_>) -> Result<Dynamic, NativeError> {
        Ok(Dynamic::Object(self.into_object()))
    }
}

impl<T: NativeType> NativeType for Instance<T> {
    fn type_hash() -> TypeHash {
        T::type_hash()
    }

    fn type_name() -> Cow<'static, str> {
        T::type_name()
    }

    fn shape() -> TypeShape {
        T::shape()
    }
}

impl<T: NativeType + Send + Sync> FromDynamic for Shared<T> {
    fn from_dynamic(value: &Dynamic) -> Result<Self, ConversionError> {
        match value {
            Dynamic::Object(obj) if obj.record().type_id == TypeId::of::<T>() => {
                let cell = obj.cell()?;
                Shared::from_cell(cell).ok_or_else(|| mismatch(T::type_name(), value))
            }
            _ => Err(mismatch(T::type_name(), value)),
        }
    }
}

impl<T: NativeType + Send + Sync> ToDynamic for Shared<T> {
    fn to_dynamic(self, cx: &CastContext<'_>) -> Result<Dynamic, NativeError> {
        let record = cx.record_for::<T>()?;
        cx.wrap_cell(self.into_cell(), record)
    }
}

impl<T: NativeType> NativeType for Shared<T> {
    fn type_hash() -> TypeHash {
        T::type_hash()
    }

    fn type_name() -> Cow<'static, str> {
        T::type_name()
    }

    fn shape() -> TypeShape {
        T::shape()
    }
}

/// Clone a bound object out of a dynamic value.
///
/// Backs `FromDynamic` for types deriving `NativeType` with
/// `#[bindery(clone)]`: the object (or a derived object) is borrowed and
/// cloned, so the native function receives its own copy.
pub fn clone_object<T: NativeType + Clone>(value: &Dynamic) -> Result<T, ConversionError> {
    let Dynamic::Object(obj) = value else {
        return Err(mismatch(T::type_name(), value));
    };
    obj.with(|v: &T| v.clone()).map_err(|err| match err {
        NativeError::Lifetime(violation) => ConversionError::Lifetime(violation),
        _ => ConversionError::mismatch(T::type_name(), obj.class_name()),
    })
}
