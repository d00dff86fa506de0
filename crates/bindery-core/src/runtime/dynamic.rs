//! Dynamic-side values.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use crate::error::BindError;

use super::ObjectRef;

/// A value as seen by the dynamic side.
///
/// Native objects appear as [`Dynamic::Object`]; everything else is a plain
/// value that casters convert to and from Rust types.
#[derive(Clone, Default)]
pub enum Dynamic {
    /// The dynamic `None`.
    #[default]
    None,
    /// Boolean value.
    Bool(bool),
    /// Integer value (every integer width is carried as i64).
    Int(i64),
    /// Floating point value.
    Float(f64),
    /// String value.
    Str(String),
    /// List of values.
    List(Vec<Dynamic>),
    /// Dict with string keys.
    Dict(BTreeMap<String, Dynamic>),
    /// Wrapper around a native object.
    Object(ObjectRef),
    /// A dynamic-side function.
    Callable(DynCallable),
}

impl Dynamic {
    /// Get a human-readable name for this value's type.
    ///
    /// Objects report their bound class name.
    pub fn type_name(&self) -> &str {
        match self {
            Dynamic::None => "None",
            Dynamic::Bool(_) => "bool",
            Dynamic::Int(_) => "int",
            Dynamic::Float(_) => "float",
            Dynamic::Str(_) => "str",
            Dynamic::List(_) => "list",
            Dynamic::Dict(_) => "dict",
            Dynamic::Object(obj) => obj.type_name(),
            Dynamic::Callable(_) => "function",
        }
    }

    /// Check if this value is `None`.
    pub fn is_none(&self) -> bool {
        matches!(self, Dynamic::None)
    }

    /// Borrow the wrapped object, if this is one.
    pub fn as_object(&self) -> Option<&ObjectRef> {
        match self {
            Dynamic::Object(obj) => Some(obj),
            _ => None,
        }
    }

    /// Get the integer payload, if this is an integer.
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Dynamic::Int(v) => Some(*v),
            _ => None,
        }
    }

    /// Get the string payload, if this is a string.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Dynamic::Str(s) => Some(s),
            _ => None,
        }
    }
}

impl PartialEq for Dynamic {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Dynamic::None, Dynamic::None) => true,
            (Dynamic::Bool(a), Dynamic::Bool(b)) => a == b,
            (Dynamic::Int(a), Dynamic::Int(b)) => a == b,
            (Dynamic::Float(a), Dynamic::Float(b)) => a == b,
            (Dynamic::Str(a), Dynamic::Str(b)) => a == b,
            (Dynamic::List(a), Dynamic::List(b)) => a == b,
            (Dynamic::Dict(a), Dynamic::Dict(b)) => a == b,
            (Dynamic::Object(a), Dynamic::Object(b)) => a.ptr_eq(b),
            (Dynamic::Callable(a), Dynamic::Callable(b)) => a.ptr_eq(b),
            _ => false,
        }
    }
}

impl fmt::Debug for Dynamic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Dynamic::None => write!(f, "None"),
            Dynamic::Bool(v) => write!(f, "Bool({})", v),
            Dynamic::Int(v) => write!(f, "Int({})", v),
            Dynamic::Float(v) => write!(f, "Float({})", v),
            Dynamic::Str(s) => write!(f, "Str({:?})", s),
            Dynamic::List(items) => f.debug_tuple("List").field(items).finish(),
            Dynamic::Dict(items) => f.debug_tuple("Dict").field(items).finish(),
            Dynamic::Object(obj) => write!(f, "Object({:?})", obj),
            Dynamic::Callable(c) => write!(f, "Callable({})", c.name()),
        }
    }
}

impl From<i64> for Dynamic {
    fn from(v: i64) -> Self {
        Dynamic::Int(v)
    }
}

impl From<f64> for Dynamic {
    fn from(v: f64) -> Self {
        Dynamic::Float(v)
    }
}

impl From<bool> for Dynamic {
    fn from(v: bool) -> Self {
        Dynamic::Bool(v)
    }
}

impl From<&str> for Dynamic {
    fn from(v: &str) -> Self {
        Dynamic::Str(v.to_string())
    }
}

impl From<String> for Dynamic {
    fn from(v: String) -> Self {
        Dynamic::Str(v)
    }
}

impl From<ObjectRef> for Dynamic {
    fn from(obj: ObjectRef) -> Self {
        Dynamic::Object(obj)
    }
}

type CallableFn = dyn Fn(&[Dynamic]) -> Result<Dynamic, BindError> + Send + Sync;

/// A function living on the dynamic side.
///
/// Used for overrides installed on dynamic subclasses and for callbacks
/// passed into native code.
#[derive(Clone)]
pub struct DynCallable {
    name: Arc<str>,
    inner: Arc<CallableFn>,
}

impl DynCallable {
    /// Wrap a closure as a dynamic callable.
    pub fn new<F>(name: impl Into<Arc<str>>, f: F) -> Self
    where
        F: Fn(&[Dynamic]) -> Result<Dynamic, BindError> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            inner: Arc::new(f),
        }
    }

    /// Call with positional arguments.
    pub fn call(&self, args: &[Dynamic]) -> Result<Dynamic, BindError> {
        (self.inner)(args)
    }

    /// The callable's name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Identity comparison.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl fmt::Debug for DynCallable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DynCallable")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}
