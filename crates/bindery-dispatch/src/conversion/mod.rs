//! Argument conversion costs.
//!
//! Every argument a candidate accepts is paired with a [`Conversion`]
//! describing how the dynamic value was normalized for the parameter and
//! what that cost. Overload ranking sums the costs.
//!
//! ## Conversion Priority
//!
//! Conversions are tried in this order:
//! 1. Identity (exact match, `None` into an optional)
//! 2. Derived to base (a bound object passed where a base class is expected)
//! 3. Numeric promotion (int to float, bool to int, narrowing when enabled)
//! 4. Container conversion (element-wise)
//! 5. User-defined implicit constructors
//! 6. Catch-all (`any` parameters and variadic tails)

use bindery_core::TypeHash;

mod class;
mod container;
mod primitive;
mod user_defined;

pub use class::{catch_all, exact_callable, exact_class};
pub use container::{convert_container, exact_container};
pub use primitive::{exact_primitive, promote_numeric, wrap_integer};
pub use user_defined::find_user_conversion;

/// An argument conversion with its cost for overload resolution.
#[derive(Debug, Clone, PartialEq)]
pub struct Conversion {
    /// The kind of conversion performed.
    pub kind: ConversionKind,
    /// The cost of this conversion (lower is better).
    pub cost: u32,
    /// Whether the conversion ran without an explicit opt-in.
    pub is_implicit: bool,
}

/// The kind of conversion performed.
#[derive(Debug, Clone, PartialEq)]
pub enum ConversionKind {
    /// No conversion needed.
    Identity,

    /// Bound object passed as one of its bases.
    DerivedToBase {
        /// The base class hash.
        base: TypeHash,
        /// Inheritance steps from the object's class.
        distance: usize,
    },

    /// Any bound object accepted by an `object` parameter.
    ToObject,

    /// Primitive conversion (int -> float, bool -> int).
    Primitive {
        /// Source primitive.
        from: TypeHash,
        /// Target primitive.
        to: TypeHash,
    },

    /// Lossy primitive conversion, only with narrowing enabled.
    Narrowing {
        /// Source primitive.
        from: TypeHash,
        /// Target primitive.
        to: TypeHash,
    },

    /// Element-wise container conversion.
    Container,

    /// A registered implicit conversion built a temporary.
    UserDefined {
        /// The target class hash.
        target: TypeHash,
    },

    /// A custom caster installed in the caster table.
    Custom {
        /// The caster's name.
        caster: String,
    },

    /// Catch-all parameter.
    VarArg,
}

impl Conversion {
    // Lower cost = better match. The ordering of these constants is the
    // ranking order between conversion kinds.
    pub const COST_EXACT: u32 = 0;
    pub const COST_DERIVED_TO_BASE: u32 = 1;
    pub const COST_TO_OBJECT: u32 = 3;
    pub const COST_BOOL_TO_INT: u32 = 4;
    pub const COST_INT_TO_FLOAT: u32 = 5;
    pub const COST_NARROWING: u32 = 6;
    pub const COST_FLOAT_TO_INT: u32 = 7;
    pub const COST_CONTAINER: u32 = 8;
    pub const COST_CUSTOM: u32 = 9;
    pub const COST_USER_IMPLICIT: u32 = 10;
    pub const COST_VAR_ARG: u32 = 12;

    /// No conversion.
    pub fn identity() -> Self {
        Self {
            kind: ConversionKind::Identity,
            cost: Self::COST_EXACT,
            is_implicit: true,
        }
    }

    /// Derived-to-base cast. Each extra inheritance step costs nothing; all
    /// base casts rank between exact and numeric conversions.
    pub fn derived_to_base(base: TypeHash, distance: usize) -> Self {
        Self {
            kind: ConversionKind::DerivedToBase { base, distance },
            cost: Self::COST_DERIVED_TO_BASE,
            is_implicit: true,
        }
    }

    /// Catch-all match.
    pub fn var_arg() -> Self {
        Self {
            kind: ConversionKind::VarArg,
            cost: Self::COST_VAR_ARG,
            is_implicit: true,
        }
    }

    /// Check if this is an exact match.
    pub fn is_exact(&self) -> bool {
        matches!(self.kind, ConversionKind::Identity)
    }
}
