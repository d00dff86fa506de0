//! Deterministic hash-based type identity.
//!
//! [`TypeHash`] is a 64-bit hash that identifies an exposed type name, a
//! function signature, a method or a constructor. Hashes are computed from
//! names and parameter lists, so:
//!
//! - a parameter can name a type before that type is registered
//! - registration order never changes identity
//! - overloads of one function get distinct hashes
//!
//! Native identity (the Rust `TypeId`) is tracked separately by
//! [`TypeRecord`](crate::TypeRecord); the hash is the name-level identity used
//! by casters and overload resolution.
//!
//! # Examples
//!
//! ```
//! use bindery_core::TypeHash;
//!
//! let int_hash = TypeHash::from_name("int");
//! assert_eq!(int_hash, TypeHash::from_name("int"));
//!
//! let f1 = TypeHash::from_function("foo", &[TypeHash::from_name("int")]);
//! let f2 = TypeHash::from_function("foo", &[TypeHash::from_name("double")]);
//! assert_ne!(f1, f2);
//! ```

use std::fmt;
use xxhash_rust::xxh64::xxh64;

/// Domain-specific mixing constants for hash computation.
///
/// These keep types, functions, methods and constructors in separate hash
/// domains even when they share a name.
pub mod hash_constants {
    /// Separator constant for path components.
    pub const SEP: u64 = 0x4bc94d6bd06053ad;

    /// Domain marker for type hashes.
    pub const TYPE: u64 = 0x2fac10b63a6cc57c;

    /// Domain marker for free function hashes.
    pub const FUNCTION: u64 = 0x5ea77ffbcdf5f302;

    /// Domain marker for instance method hashes.
    pub const METHOD: u64 = 0x7d3c8b4a92e15f6d;

    /// Domain marker for constructor hashes.
    pub const CONSTRUCTOR: u64 = 0x9a7f3d5e2b8c4601;

    /// Parameter position mixing constants.
    /// Each position gets its own constant so parameter order matters.
    pub const PARAM_MARKERS: [u64; 16] = [
        0x9e3779b97f4a7c15,
        0xbf58476d1ce4e5b9,
        0x94d049bb133111eb,
        0xd6e8feb86659fd93,
        0xe7037ed1a0b428db,
        0xc6a4a7935bd1e995,
        0x8648dbbc94d49b8d,
        0xa2b48b2c69e0d657,
        0x7c3e9f2a5b8d1403,
        0x5d8c7b4a3e9f2106,
        0x3f1e9d8c7b5a4203,
        0x1a2b3c4d5e6f7089,
        0x9f8e7d6c5b4a3210,
        0x2468ace013579bdf,
        0xfdb97531eca86420,
        0x123456789abcdef0,
    ];
}

/// A deterministic 64-bit hash identifying a type, function, or method.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(transparent)]
pub struct TypeHash(pub u64);

#[inline]
fn mix_params(mut hash: u64, params: &[TypeHash]) -> u64 {
    for (i, param) in params.iter().enumerate() {
        let marker = hash_constants::PARAM_MARKERS
            .get(i)
            .copied()
            .unwrap_or_else(|| hash_constants::PARAM_MARKERS[0].wrapping_add(i as u64));
        // wrapping_mul keeps the mix order-dependent, unlike a plain XOR
        hash = hash.wrapping_mul(hash_constants::SEP).wrapping_add(marker ^ param.0);
    }
    hash
}

impl TypeHash {
    /// Empty/invalid hash constant.
    pub const EMPTY: TypeHash = TypeHash(0);

    /// Create a type hash from an exposed type name.
    #[inline]
    pub fn from_name(name: &str) -> Self {
        TypeHash(hash_constants::TYPE ^ xxh64(name.as_bytes(), 0))
    }

    /// Create a function hash from name and parameter type hashes.
    ///
    /// Parameter order matters: `(int, double)` differs from `(double, int)`.
    #[inline]
    pub fn from_function(name: &str, param_hashes: &[TypeHash]) -> Self {
        let hash = hash_constants::FUNCTION ^ xxh64(name.as_bytes(), 0);
        TypeHash(mix_params(hash, param_hashes))
    }

    /// Create a method hash from owner type, method name and parameter types.
    #[inline]
    pub fn from_method(owner: TypeHash, name: &str, param_hashes: &[TypeHash]) -> Self {
        let hash = hash_constants::METHOD ^ owner.0 ^ xxh64(name.as_bytes(), 0);
        TypeHash(mix_params(hash, param_hashes))
    }

    /// Create a constructor hash from owner type and parameter types.
    #[inline]
    pub fn from_constructor(owner: TypeHash, param_hashes: &[TypeHash]) -> Self {
        TypeHash(mix_params(hash_constants::CONSTRUCTOR ^ owner.0, param_hashes))
    }

    /// Create the hash of a generic container instance such as `list<int>`.
    ///
    /// Argument order matters: `dict<string, int>` differs from
    /// `dict<int, string>`.
    #[inline]
    pub fn from_template_instance(template: TypeHash, args: &[TypeHash]) -> Self {
        TypeHash(mix_params(template.0, args))
    }

    /// Check if this is an empty/invalid hash.
    #[inline]
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Get the underlying u64 value.
    #[inline]
    pub const fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Debug for TypeHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TypeHash({:#018x})", self.0)
    }
}

impl fmt::Display for TypeHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#018x}", self.0)
    }
}

/// Well-known hashes for the built-in types.
///
/// These are the full `TypeHash::from_name()` values, precomputed.
pub mod primitives {
    use super::TypeHash;

    /// `void`
    pub const VOID: TypeHash = TypeHash(0xe4b3797ddcf989ea);
    /// `bool`
    pub const BOOL: TypeHash = TypeHash(0x1e0c8fa4cced99c1);
    /// `int8`
    pub const INT8: TypeHash = TypeHash(0x2b44191092e74388);
    /// `int16`
    pub const INT16: TypeHash = TypeHash(0x95aebfc985e9b115);
    /// `int` (32-bit signed)
    pub const INT32: TypeHash = TypeHash(0x4f5e5320cd1c92bf);
    /// `int64`
    pub const INT64: TypeHash = TypeHash(0x7d6c550df59a1924);
    /// `uint8`
    pub const UINT8: TypeHash = TypeHash(0x0e8b2d31cdfa9716);
    /// `uint16`
    pub const UINT16: TypeHash = TypeHash(0x269d68dfde65ae7f);
    /// `uint` (32-bit unsigned)
    pub const UINT32: TypeHash = TypeHash(0x543fb8f520aa3e26);
    /// `uint64`
    pub const UINT64: TypeHash = TypeHash(0x32ba58d17fda82dd);
    /// `float` (32-bit)
    pub const FLOAT: TypeHash = TypeHash(0x02d5a2fddaf5bb69);
    /// `double` (64-bit)
    pub const DOUBLE: TypeHash = TypeHash(0xeb125587f6c2a79b);
    /// `string`
    pub const STRING: TypeHash = TypeHash(0x7a8d5fb1ba695978);
    /// `none`, the dynamic side's empty value
    pub const NONE: TypeHash = TypeHash(0x2748749cb820d666);
    /// `list`, the generic sequence container
    pub const LIST: TypeHash = TypeHash(0xa01b4d5b9a9cf394);
    /// `dict`, the generic string-keyed mapping
    pub const DICT: TypeHash = TypeHash(0x0e70ff830d28f78b);
    /// `object`, any wrapped native instance
    pub const OBJECT: TypeHash = TypeHash(0x7453af4894759ab5);

    /// Catch-all parameter type that accepts any dynamic value.
    /// A sentinel, not computed from a name.
    pub const VARIABLE_PARAM: TypeHash = TypeHash(0x3f3f3f3f3f3f3f3f);

    /// Check whether a hash names one of the numeric primitives.
    pub fn is_numeric(hash: TypeHash) -> bool {
        is_integer(hash) || is_float(hash)
    }

    /// Check whether a hash names an integer primitive.
    pub fn is_integer(hash: TypeHash) -> bool {
        matches!(
            hash,
            INT8 | INT16 | INT32 | INT64 | UINT8 | UINT16 | UINT32 | UINT64
        )
    }

    /// Check whether a hash names a floating point primitive.
    pub fn is_float(hash: TypeHash) -> bool {
        matches!(hash, FLOAT | DOUBLE)
    }

    /// Display name for a built-in hash, if it is one.
    pub fn name_of(hash: TypeHash) -> Option<&'static str> {
        Some(match hash {
            VOID => "void",
            BOOL => "bool",
            INT8 => "int8",
            INT16 => "int16",
            INT32 => "int",
            INT64 => "int64",
            UINT8 => "uint8",
            UINT16 => "uint16",
            UINT32 => "uint",
            UINT64 => "uint64",
            FLOAT => "float",
            DOUBLE => "double",
            STRING => "string",
            NONE => "none",
            LIST => "list",
            DICT => "dict",
            OBJECT => "object",
            VARIABLE_PARAM => "*args",
            _ => return None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn type_hash_determinism() {
        assert_eq!(TypeHash::from_name("int"), TypeHash::from_name("int"));
        assert_eq!(TypeHash::from_name("geo::Point"), TypeHash::from_name("geo::Point"));
    }

    #[test]
    fn type_hash_uniqueness() {
        let int_hash = TypeHash::from_name("int");
        let double_hash = TypeHash::from_name("double");
        let pet_hash = TypeHash::from_name("Pet");

        assert_ne!(int_hash, double_hash);
        assert_ne!(int_hash, pet_hash);
        assert_ne!(double_hash, pet_hash);
    }

    #[test]
    fn function_hash_overload_distinction() {
        let int_hash = TypeHash::from_name("int");
        let double_hash = TypeHash::from_name("double");

        let f_int = TypeHash::from_function("f", &[int_hash]);
        let f_double = TypeHash::from_function("f", &[double_hash]);
        let f_two = TypeHash::from_function("f", &[int_hash, double_hash]);

        assert_ne!(f_int, f_double);
        assert_ne!(f_int, f_two);
    }

    #[test]
    fn function_hash_parameter_order_matters() {
        let int_hash = TypeHash::from_name("int");
        let double_hash = TypeHash::from_name("double");

        let a = TypeHash::from_function("foo", &[int_hash, double_hash]);
        let b = TypeHash::from_function("foo", &[double_hash, int_hash]);
        assert_ne!(a, b);
    }

    #[test]
    fn method_hash_includes_owner() {
        let int_hash = TypeHash::from_name("int");
        let dog = TypeHash::from_name("Dog");
        let cat = TypeHash::from_name("Cat");

        assert_ne!(
            TypeHash::from_method(dog, "feed", &[int_hash]),
            TypeHash::from_method(cat, "feed", &[int_hash])
        );
        assert_ne!(
            TypeHash::from_function("feed", &[int_hash]),
            TypeHash::from_method(dog, "feed", &[int_hash])
        );
    }

    #[test]
    fn constructor_hash_overload_distinction() {
        let pet = TypeHash::from_name("Pet");
        let default_ctor = TypeHash::from_constructor(pet, &[]);
        let named_ctor = TypeHash::from_constructor(pet, &[primitives::STRING]);
        assert_ne!(default_ctor, named_ctor);
    }

    #[test]
    fn template_instance_hash() {
        let list_int = TypeHash::from_template_instance(primitives::LIST, &[primitives::INT32]);
        let list_double = TypeHash::from_template_instance(primitives::LIST, &[primitives::DOUBLE]);

        assert_ne!(list_int, list_double);
        assert_ne!(list_int, primitives::LIST);
        assert_eq!(
            list_int,
            TypeHash::from_template_instance(primitives::LIST, &[primitives::INT32])
        );
    }

    #[test]
    fn primitive_constants_match_from_name() {
        assert_eq!(primitives::VOID, TypeHash::from_name("void"));
        assert_eq!(primitives::BOOL, TypeHash::from_name("bool"));
        assert_eq!(primitives::INT8, TypeHash::from_name("int8"));
        assert_eq!(primitives::INT16, TypeHash::from_name("int16"));
        assert_eq!(primitives::INT32, TypeHash::from_name("int"));
        assert_eq!(primitives::INT64, TypeHash::from_name("int64"));
        assert_eq!(primitives::UINT8, TypeHash::from_name("uint8"));
        assert_eq!(primitives::UINT16, TypeHash::from_name("uint16"));
        assert_eq!(primitives::UINT32, TypeHash::from_name("uint"));
        assert_eq!(primitives::UINT64, TypeHash::from_name("uint64"));
        assert_eq!(primitives::FLOAT, TypeHash::from_name("float"));
        assert_eq!(primitives::DOUBLE, TypeHash::from_name("double"));
        assert_eq!(primitives::STRING, TypeHash::from_name("string"));
        assert_eq!(primitives::NONE, TypeHash::from_name("none"));
        assert_eq!(primitives::LIST, TypeHash::from_name("list"));
        assert_eq!(primitives::DICT, TypeHash::from_name("dict"));
        assert_eq!(primitives::OBJECT, TypeHash::from_name("object"));
    }

    #[test]
    fn numeric_classification() {
        assert!(primitives::is_integer(primitives::UINT8));
        assert!(!primitives::is_integer(primitives::DOUBLE));
        assert!(primitives::is_float(primitives::FLOAT));
        assert!(primitives::is_numeric(primitives::INT64));
        assert!(!primitives::is_numeric(primitives::STRING));
    }

    #[test]
    fn many_parameters_supported() {
        let params: Vec<TypeHash> = (0..40).map(|_| primitives::INT32).collect();
        assert!(!TypeHash::from_function("many", &params).is_empty());
    }

    #[test]
    fn hash_display_and_debug() {
        let hash = TypeHash::from_name("int");
        assert!(format!("{}", hash).starts_with("0x"));
        assert!(format!("{:?}", hash).starts_with("TypeHash(0x"));
    }
}
