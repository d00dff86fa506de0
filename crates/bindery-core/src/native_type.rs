//! Identity trait for types that can cross the boundary.
//!
//! Every Rust type used as a bound class, a function parameter or a return
//! value implements [`NativeType`]. It supplies the exposed name, the
//! name-level [`TypeHash`] and a [`TypeShape`] describing how dynamic values
//! are matched against it during overload resolution.
//!
//! # Example
//!
//! ```
//! use std::borrow::Cow;
//! use bindery_core::{NativeType, TypeHash};
//!
//! struct Pet {
//!     name: String,
//! }
//!
//! impl NativeType for Pet {
//!     fn type_hash() -> TypeHash {
//!         TypeHash::from_name("Pet")
//!     }
//!
//!     fn type_name() -> Cow<'static, str> {
//!         Cow::Borrowed("Pet")
//!     }
//! }
//! ```
//!
//! With the derive macro (from `bindery-macros`):
//!
//! ```ignore
//! #[derive(NativeType)]
//! #[bindery(name = "Pet")]
//! pub struct Pet {
//!     pub name: String,
//! }
//! ```

use std::any::TypeId;
use std::borrow::Cow;
use std::collections::BTreeMap;
use std::fmt;

use crate::{DynCallable, Dynamic, TypeHash, primitives};

/// Trait for types that can be registered or passed across the boundary.
pub trait NativeType: 'static {
    /// Name-level identity of the type.
    fn type_hash() -> TypeHash;

    /// Exposed type name, used in signatures and diagnostics.
    fn type_name() -> Cow<'static, str>;

    /// How dynamic values are matched against this type.
    ///
    /// Bound classes use the default, which keys on the Rust `TypeId`.
    fn shape() -> TypeShape {
        TypeShape::Class {
            type_id: TypeId::of::<Self>(),
            hash: Self::type_hash(),
        }
    }
}

/// Structural description of a parameter type.
///
/// Casters and overload ranking walk the shape to decide whether a dynamic
/// value is accepted and at what cost.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TypeShape {
    /// A built-in primitive (`bool`, integers, floats, string, void).
    Primitive(TypeHash),
    /// A homogeneous list.
    List(Box<TypeShape>),
    /// A dict with string keys.
    Dict(Box<TypeShape>),
    /// A value or `None`.
    Optional(Box<TypeShape>),
    /// A bound class, keyed by native identity.
    Class {
        /// Native identity.
        type_id: TypeId,
        /// Name-level identity.
        hash: TypeHash,
    },
    /// Any bound object, whatever its class.
    Object,
    /// A dynamic-side callable.
    Callable,
    /// Any dynamic value, matched as a catch-all.
    Any,
}

impl TypeShape {
    /// Name-level identity of the shape.
    pub fn hash(&self) -> TypeHash {
        match self {
            TypeShape::Primitive(hash) => *hash,
            TypeShape::List(elem) => {
                TypeHash::from_template_instance(primitives::LIST, &[elem.hash()])
            }
            TypeShape::Dict(elem) => {
                TypeHash::from_template_instance(primitives::DICT, &[elem.hash()])
            }
            TypeShape::Optional(inner) => {
                TypeHash::from_template_instance(primitives::NONE, &[inner.hash()])
            }
            TypeShape::Class { hash, .. } => *hash,
            TypeShape::Object => primitives::OBJECT,
            TypeShape::Callable => TypeHash::from_name("callable"),
            TypeShape::Any => primitives::VARIABLE_PARAM,
        }
    }

    /// Check if this shape is the catch-all.
    pub fn is_any(&self) -> bool {
        matches!(self, TypeShape::Any)
    }
}

impl fmt::Display for TypeShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeShape::Primitive(hash) => {
                write!(f, "{}", primitives::name_of(*hash).unwrap_or("?"))
            }
            TypeShape::List(elem) => write!(f, "list[{}]", elem),
            TypeShape::Dict(elem) => write!(f, "dict[string, {}]", elem),
            TypeShape::Optional(inner) => write!(f, "Optional[{}]", inner),
            // class names are resolved through the registry when rendering
            // signatures; this is the fallback
            TypeShape::Class { hash, .. } => write!(f, "{}", hash),
            TypeShape::Object => write!(f, "object"),
            TypeShape::Callable => write!(f, "callable"),
            TypeShape::Any => write!(f, "any"),
        }
    }
}

// === Primitive Type Implementations ===

macro_rules! impl_primitive_native_type {
    ($($ty:ty => ($hash:ident, $name:literal)),* $(,)?) => {
        $(
            impl NativeType for $ty {
                fn type_hash() -> TypeHash {
                    primitives::$hash
                }

                fn type_name() -> Cow<'static, str> {
                    Cow::Borrowed($name)
                }

                fn shape() -> TypeShape {
                    TypeShape::Primitive(primitives::$hash)
                }
            }
        )*
    };
}

impl_primitive_native_type!(
    () => (VOID, "void"),
    bool => (BOOL, "bool"),
    i8 => (INT8, "int8"),
    i16 => (INT16, "int16"),
    i32 => (INT32, "int"),
    i64 => (INT64, "int64"),
    u8 => (UINT8, "uint8"),
    u16 => (UINT16, "uint16"),
    u32 => (UINT32, "uint"),
    u64 => (UINT64, "uint64"),
    f32 => (FLOAT, "float"),
    f64 => (DOUBLE, "double"),
    String => (STRING, "string"),
);

// === Container Implementations ===

impl<T: NativeType> NativeType for Vec<T> {
    fn type_hash() -> TypeHash {
        Self::shape().hash()
    }

    fn type_name() -> Cow<'static, str> {
        Cow::Owned(format!("list[{}]", T::type_name()))
    }

    fn shape() -> TypeShape {
        TypeShape::List(Box::new(T::shape()))
    }
}

impl<T: NativeType> NativeType for BTreeMap<String, T> {
    fn type_hash() -> TypeHash {
        Self::shape().hash()
    }

    fn type_name() -> Cow<'static, str> {
        Cow::Owned(format!("dict[string, {}]", T::type_name()))
    }

    fn shape() -> TypeShape {
        TypeShape::Dict(Box::new(T::shape()))
    }
}

impl<T: NativeType> NativeType for Option<T> {
    fn type_hash() -> TypeHash {
        Self::shape().hash()
    }

    fn type_name() -> Cow<'static, str> {
        Cow::Owned(format!("Optional[{}]", T::type_name()))
    }

    fn shape() -> TypeShape {
        TypeShape::Optional(Box::new(T::shape()))
    }
}

// === Dynamic passthrough ===

impl NativeType for Dynamic {
    fn type_hash() -> TypeHash {
        primitives::VARIABLE_PARAM
    }

    fn type_name() -> Cow<'static, str> {
        Cow::Borrowed("any")
    }

    fn shape() -> TypeShape {
        TypeShape::Any
    }
}

impl NativeType for DynCallable {
    fn type_hash() -> TypeHash {
        TypeShape::Callable.hash()
    }

    fn type_name() -> Cow<'static, str> {
        Cow::Borrowed("callable")
    }

    fn shape() -> TypeShape {
        TypeShape::Callable
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Pet;

    impl NativeType for Pet {
        fn type_hash() -> TypeHash {
            TypeHash::from_name("Pet")
        }

        fn type_name() -> Cow<'static, str> {
            Cow::Borrowed("Pet")
        }
    }

    #[test]
    fn primitive_identity() {
        assert_eq!(i32::type_hash(), primitives::INT32);
        assert_eq!(i32::type_name(), "int");
        assert_eq!(f64::shape(), TypeShape::Primitive(primitives::DOUBLE));
        assert_eq!(String::type_name(), "string");
    }

    #[test]
    fn class_shape_uses_type_id() {
        assert_eq!(
            Pet::shape(),
            TypeShape::Class {
                type_id: TypeId::of::<Pet>(),
                hash: TypeHash::from_name("Pet"),
            }
        );
    }

    #[test]
    fn container_names_and_hashes() {
        assert_eq!(Vec::<i32>::type_name(), "list[int]");
        assert_eq!(Option::<Vec<f64>>::type_name(), "Optional[list[double]]");
        assert_ne!(Vec::<i32>::type_hash(), Vec::<f64>::type_hash());
        assert_eq!(Vec::<i32>::type_hash(), Vec::<i32>::type_hash());
    }

    #[test]
    fn dynamic_is_catch_all() {
        assert!(Dynamic::shape().is_any());
        assert_eq!(Dynamic::type_hash(), primitives::VARIABLE_PARAM);
    }

    #[test]
    fn shape_display() {
        assert_eq!(Vec::<i32>::shape().to_string(), "list[int]");
        assert_eq!(Option::<String>::shape().to_string(), "Optional[string]");
    }
}
