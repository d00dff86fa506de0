//! Errors returned by native functions.

use thiserror::Error;

use crate::error::{BindError, ConversionError, LifetimeViolation};

/// Failure type tags used for native exceptions.
pub mod tags {
    /// Generic runtime failure.
    pub const RUNTIME_ERROR: &str = "RuntimeError";
    /// Invalid argument value.
    pub const VALUE_ERROR: &str = "ValueError";
    /// Index out of range.
    pub const INDEX_ERROR: &str = "IndexError";
    /// Missing key.
    pub const KEY_ERROR: &str = "KeyError";
    /// Wrong receiver or argument type.
    pub const TYPE_ERROR: &str = "TypeError";
    /// A native function panicked.
    pub const PANIC: &str = "panic";
    /// A pure virtual method was called with no override installed.
    pub const PURE_VIRTUAL: &str = "pure_virtual";
    /// Attribute access failed (read-only property, etc.).
    pub const ATTRIBUTE_ERROR: &str = "AttributeError";
}

/// Error returned from a native function body.
///
/// Converted into [`BindError`] at the boundary; `Raised` becomes
/// `NativeException` with the same tag and message.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum NativeError {
    /// Argument index out of range.
    #[error("argument index {index} out of bounds (call has {count} arguments)")]
    ArgumentIndexOutOfBounds {
        /// Requested index.
        index: usize,
        /// Number of arguments.
        count: usize,
    },

    /// Argument conversion failed.
    #[error(transparent)]
    Conversion(#[from] ConversionError),

    /// The receiver is missing or has the wrong type.
    #[error("invalid receiver: {message}")]
    InvalidThis {
        /// Description of the problem.
        message: String,
    },

    /// Native code raised an error explicitly.
    #[error("{type_tag}: {message}")]
    Raised {
        /// Failure category.
        type_tag: String,
        /// Message.
        message: String,
    },

    /// A handle was misused.
    #[error(transparent)]
    Lifetime(#[from] LifetimeViolation),

    /// An error raised on the dynamic side while native code re-entered it.
    #[error(transparent)]
    Reentrant(Box<BindError>),
}

impl NativeError {
    /// Raise an error with an explicit type tag.
    pub fn raise(type_tag: impl Into<String>, message: impl Into<String>) -> Self {
        NativeError::Raised {
            type_tag: type_tag.into(),
            message: message.into(),
        }
    }

    /// Raise a `RuntimeError`.
    pub fn runtime(message: impl Into<String>) -> Self {
        Self::raise(tags::RUNTIME_ERROR, message)
    }

    /// Raise a `ValueError`.
    pub fn value_error(message: impl Into<String>) -> Self {
        Self::raise(tags::VALUE_ERROR, message)
    }

    /// Create an invalid receiver error.
    pub fn invalid_this(message: impl Into<String>) -> Self {
        NativeError::InvalidThis {
            message: message.into(),
        }
    }
}

impl From<BindError> for NativeError {
    fn from(err: BindError) -> Self {
        NativeError::Reentrant(Box::new(err))
    }
}
