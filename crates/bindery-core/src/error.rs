//! Unified error types for the binding layer.
//!
//! ## Error Hierarchy
//!
//! ```text
//! BindError (boundary-level wrapper)
//! ├── RegistrationError  - type/function registration conflicts
//! ├── ConversionError    - a single cast failed (TypeMismatch)
//! ├── NoMatchingOverload - no candidate accepted every argument
//! ├── AmbiguousOverload  - strict tie mode only
//! ├── NativeException    - a native call failed or panicked
//! ├── LifetimeViolation  - double release / use after destroy (fatal)
//! └── Attribute          - unknown method or property on a class
//! ```
//!
//! Caster fallback chains absorb individual [`ConversionError`]s; everything
//! else propagates to the caller at the boundary.

use thiserror::Error;

use crate::native_error::NativeError;

// ============================================================================
// Registration Errors
// ============================================================================

/// Errors that occur while registering types, functions and classes.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RegistrationError {
    /// A referenced type was not found.
    #[error("type not found: {0}")]
    TypeNotFound(String),

    /// The same native identity was registered twice in one scope.
    #[error("duplicate type: {0}")]
    DuplicateType(String),

    /// A different registration already uses this name.
    #[error("duplicate registration: {name} already registered as {kind}")]
    DuplicateRegistration {
        /// The name that was duplicated.
        name: String,
        /// What was already registered under it (e.g. "class", "function").
        kind: String,
    },

    /// A class names a base that has not been registered.
    #[error("type '{type_name}' references unknown base type '{base}'")]
    UnknownBase {
        /// The derived type.
        type_name: String,
        /// The missing base.
        base: String,
    },

    /// Binding the class would create an inheritance cycle.
    #[error("circular inheritance for '{0}'")]
    CircularInheritance(String),

    /// The declaration is malformed.
    #[error("invalid declaration: {0}")]
    InvalidDeclaration(String),

    /// Registration attempted after the registry was sealed.
    #[error("registry is sealed - cannot register '{0}'")]
    Sealed(String),
}

// ============================================================================
// Conversion Errors
// ============================================================================

/// A single cast between a dynamic value and a native type failed.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConversionError {
    /// The dynamic value has the wrong shape for the target type.
    #[error("type mismatch: expected {expected}, got {actual}")]
    TypeMismatch {
        /// The target type name.
        expected: String,
        /// The dynamic value's type name.
        actual: String,
    },

    /// An integer does not fit the target width and narrowing is off.
    #[error("integer overflow: {value} doesn't fit in {target_type}")]
    IntegerOverflow {
        /// The value that overflowed.
        value: i64,
        /// The target type.
        target_type: &'static str,
    },

    /// A float cannot be represented in the target type.
    #[error("float conversion: {value} cannot be converted to {target_type}")]
    FloatConversion {
        /// The value.
        value: f64,
        /// The target type.
        target_type: &'static str,
    },

    /// `none` was passed where a value is required.
    #[error("none cannot be converted to {target_type}")]
    NoneValue {
        /// The target type.
        target_type: String,
    },

    /// The wrapped native object is no longer alive.
    #[error(transparent)]
    Lifetime(#[from] LifetimeViolation),
}

impl ConversionError {
    /// Shorthand for a [`ConversionError::TypeMismatch`].
    pub fn mismatch(expected: impl Into<String>, actual: impl Into<String>) -> Self {
        ConversionError::TypeMismatch {
            expected: expected.into(),
            actual: actual.into(),
        }
    }
}

// ============================================================================
// Lifetime Violations
// ============================================================================

/// Misuse of an instance handle. Always fatal, never ignored.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LifetimeViolation {
    /// The handle was already released.
    #[error("double release of instance handle #{handle}")]
    DoubleRelease {
        /// The handle id.
        handle: u64,
    },

    /// The object behind the handle was already destroyed.
    #[error("use of destroyed '{type_name}' instance (handle #{handle})")]
    UseAfterDestroy {
        /// The handle id.
        handle: u64,
        /// The exposed type name.
        type_name: String,
    },

    /// The handle does not belong to this lifetime manager.
    #[error("unknown instance handle #{handle}")]
    UnknownHandle {
        /// The handle id.
        handle: u64,
    },
}

// ============================================================================
// Boundary Error
// ============================================================================

/// The error surfaced to the dynamic side at the boundary.
///
/// Every phase-specific error converts into this type, so `?` works across
/// registration, dispatch and lifetime code.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum BindError {
    /// A registration error.
    #[error(transparent)]
    Registration(#[from] RegistrationError),

    /// A cast failed and no fallback caster claimed the value.
    #[error("{0}")]
    TypeMismatch(ConversionError),

    /// No overload accepted the arguments.
    #[error(
        "no matching overload for {name}({args}); attempted: {}",
        candidates.join(" | ")
    )]
    NoMatchingOverload {
        /// The function name.
        name: String,
        /// Argument types as seen at the call site.
        args: String,
        /// Every attempted signature.
        candidates: Vec<String>,
    },

    /// More than one overload tied under strict tie breaking.
    #[error("ambiguous call to {name}: {}", candidates.join(" and "))]
    AmbiguousOverload {
        /// The function name.
        name: String,
        /// The tied signatures.
        candidates: Vec<String>,
    },

    /// A native call failed; carries the failure type tag and message.
    #[error("{type_tag}: {message}")]
    NativeException {
        /// Failure category (e.g. `ValueError`, `panic`).
        type_tag: String,
        /// Human readable message.
        message: String,
    },

    /// A lifetime rule was broken.
    #[error(transparent)]
    LifetimeViolation(#[from] LifetimeViolation),

    /// Unknown attribute on a bound class.
    #[error("'{type_name}' object has no attribute '{name}'")]
    Attribute {
        /// The class name.
        type_name: String,
        /// The missing attribute.
        name: String,
    },
}

impl BindError {
    /// Build a [`BindError::NativeException`].
    pub fn native(type_tag: impl Into<String>, message: impl Into<String>) -> Self {
        BindError::NativeException {
            type_tag: type_tag.into(),
            message: message.into(),
        }
    }

    /// Check if this is a dispatch failure (no match or ambiguity).
    pub fn is_dispatch(&self) -> bool {
        matches!(
            self,
            BindError::NoMatchingOverload { .. } | BindError::AmbiguousOverload { .. }
        )
    }

    /// Check if this is a lifetime violation.
    pub fn is_lifetime_violation(&self) -> bool {
        matches!(self, BindError::LifetimeViolation(_))
    }
}

impl From<ConversionError> for BindError {
    fn from(err: ConversionError) -> Self {
        match err {
            ConversionError::Lifetime(violation) => BindError::LifetimeViolation(violation),
            other => BindError::TypeMismatch(other),
        }
    }
}

impl From<NativeError> for BindError {
    fn from(err: NativeError) -> Self {
        match err {
            NativeError::Conversion(conv) => conv.into(),
            NativeError::Lifetime(violation) => BindError::LifetimeViolation(violation),
            NativeError::Reentrant(inner) => *inner,
            NativeError::Raised { type_tag, message } => {
                BindError::NativeException { type_tag, message }
            }
            other @ NativeError::InvalidThis { .. } => BindError::native("TypeError", other.to_string()),
            other @ NativeError::ArgumentIndexOutOfBounds { .. } => {
                BindError::native("IndexError", other.to_string())
            }
        }
    }
}
