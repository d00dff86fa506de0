//! Function entries: one candidate of an overload set.

use std::borrow::Cow;
use std::fmt::Write as _;

use bitflags::bitflags;

use crate::{Dynamic, LoadUnit, NativeFn, NativeType, TypeHash, TypeShape};

bitflags! {
    /// Function traits.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct FunctionFlags: u32 {
        /// Bound method with a receiver.
        const METHOD = 1 << 0;
        /// Class constructor.
        const CONSTRUCTOR = 1 << 1;
        /// Static method (no receiver).
        const STATIC = 1 << 2;
        /// The last parameter collects every extra positional argument.
        const VARIADIC = 1 << 3;
        /// Overridable from a dynamic subclass.
        const VIRTUAL = 1 << 4;
        /// Virtual with no native default.
        const PURE_VIRTUAL = 1 << 5;
        /// Property getter.
        const GETTER = 1 << 6;
        /// Property setter.
        const SETTER = 1 << 7;
    }
}

/// How a returned native object is handed to the dynamic side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ReturnPolicy {
    /// Owned values are adopted, shared cells are shared.
    #[default]
    Automatic,
    /// The dynamic side takes ownership.
    TakeOwnership,
    /// The dynamic side observes an object native code keeps alive.
    Reference,
    /// Like `Reference`, and the receiver is kept alive by the result.
    ReferenceInternal,
    /// Shared ownership with native code.
    Shared,
}

/// Keep `patient` alive at least as long as `nurse`.
///
/// Index 0 is the return value; 1.. are the receiver (for methods) followed
/// by the arguments.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct KeepAlive {
    /// The dependent.
    pub nurse: usize,
    /// The object kept alive.
    pub patient: usize,
}

/// One declared parameter.
#[derive(Debug, Clone, PartialEq)]
pub struct ParamSpec {
    /// Keyword name, if any.
    pub name: Option<String>,
    /// Accepted shape.
    pub shape: TypeShape,
    /// Display name of the type.
    pub type_name: Cow<'static, str>,
    /// Default value used when the argument is omitted.
    pub default: Option<Dynamic>,
}

impl ParamSpec {
    /// Parameter spec for `T`.
    pub fn of<T: NativeType>() -> Self {
        Self {
            name: None,
            shape: T::shape(),
            type_name: T::type_name(),
            default: None,
        }
    }

    /// Check if the parameter has a default.
    pub fn has_default(&self) -> bool {
        self.default.is_some()
    }
}

/// Return type description.
#[derive(Debug, Clone, PartialEq)]
pub struct ReturnSpec {
    /// Shape of the returned value.
    pub shape: TypeShape,
    /// Display name.
    pub type_name: Cow<'static, str>,
}

impl ReturnSpec {
    /// Return spec for `T`.
    pub fn of<T: NativeType>() -> Self {
        Self {
            shape: T::shape(),
            type_name: T::type_name(),
        }
    }
}

/// Implementation of a function entry.
#[derive(Debug, Clone)]
pub enum FunctionImpl {
    /// Native implementation.
    Native(NativeFn),
    /// No native default (pure virtual).
    Abstract,
}

/// Registry entry for one function or method candidate.
#[derive(Debug, Clone)]
pub struct FunctionEntry {
    /// Name as seen by the dynamic side.
    pub name: String,
    /// Owning class hash, for methods and constructors.
    pub owner: Option<TypeHash>,
    /// Owning class name, for signatures.
    pub owner_name: Option<String>,
    /// Declared parameters, excluding the receiver.
    pub params: Vec<ParamSpec>,
    /// Return type.
    pub returns: ReturnSpec,
    /// Function traits.
    pub flags: FunctionFlags,
    /// Return value policy.
    pub policy: ReturnPolicy,
    /// Keep-alive call policies.
    pub keep_alive: Vec<KeepAlive>,
    /// Load unit that registered the function.
    pub unit: Option<LoadUnit>,
    /// Docstring.
    pub doc: Option<String>,
    /// Implementation.
    pub implementation: FunctionImpl,
}

impl FunctionEntry {
    /// Create a free function entry.
    pub fn new(
        name: impl Into<String>,
        params: Vec<ParamSpec>,
        returns: ReturnSpec,
        native: NativeFn,
    ) -> Self {
        Self {
            name: name.into(),
            owner: None,
            owner_name: None,
            params,
            returns,
            flags: FunctionFlags::empty(),
            policy: ReturnPolicy::default(),
            keep_alive: Vec::new(),
            unit: None,
            doc: None,
            implementation: FunctionImpl::Native(native),
        }
    }

    /// Create a pure virtual method entry with no native default.
    pub fn abstract_method(
        name: impl Into<String>,
        params: Vec<ParamSpec>,
        returns: ReturnSpec,
    ) -> Self {
        Self {
            name: name.into(),
            owner: None,
            owner_name: None,
            params,
            returns,
            flags: FunctionFlags::METHOD | FunctionFlags::VIRTUAL | FunctionFlags::PURE_VIRTUAL,
            policy: ReturnPolicy::default(),
            keep_alive: Vec::new(),
            unit: None,
            doc: None,
            implementation: FunctionImpl::Abstract,
        }
    }

    /// Hash identifying this candidate's signature.
    pub fn hash(&self) -> TypeHash {
        let params: Vec<TypeHash> = self.params.iter().map(|p| p.shape.hash()).collect();
        match self.owner {
            Some(owner) if self.is_constructor() => TypeHash::from_constructor(owner, &params),
            Some(owner) => TypeHash::from_method(owner, &self.name, &params),
            None => TypeHash::from_function(&self.name, &params),
        }
    }

    /// Check if this is a method with a receiver.
    pub fn is_method(&self) -> bool {
        self.flags.contains(FunctionFlags::METHOD)
    }

    /// Check if this is a constructor.
    pub fn is_constructor(&self) -> bool {
        self.flags.contains(FunctionFlags::CONSTRUCTOR)
    }

    /// Check if the last parameter is a variadic tail.
    pub fn is_variadic(&self) -> bool {
        self.flags.contains(FunctionFlags::VARIADIC)
    }

    /// Check if the method may be overridden dynamically.
    pub fn is_virtual(&self) -> bool {
        self.flags.contains(FunctionFlags::VIRTUAL)
    }

    /// Check if the method has no native default.
    pub fn is_pure_virtual(&self) -> bool {
        matches!(self.implementation, FunctionImpl::Abstract)
    }

    /// The native implementation, if present.
    pub fn native(&self) -> Option<&NativeFn> {
        match &self.implementation {
            FunctionImpl::Native(f) => Some(f),
            FunctionImpl::Abstract => None,
        }
    }

    /// Qualified name (`Owner.name` for methods).
    pub fn qualified_name(&self) -> String {
        match &self.owner_name {
            Some(owner) => format!("{}.{}", owner, self.name),
            None => self.name.clone(),
        }
    }

    /// Human-readable signature used in diagnostics.
    ///
    /// ```text
    /// greet(name: string, times: int = 1) -> string
    /// ```
    pub fn signature(&self) -> String {
        let mut out = self.qualified_name();
        out.push('(');
        let last = self.params.len().saturating_sub(1);
        for (i, param) in self.params.iter().enumerate() {
            if i > 0 {
                out.push_str(", ");
            }
            if self.is_variadic() && i == last {
                out.push('*');
            }
            match &param.name {
                Some(name) => {
                    let _ = write!(out, "{}: {}", name, param.type_name);
                }
                None => {
                    let _ = write!(out, "arg{}: {}", i, param.type_name);
                }
            }
            if let Some(default) = &param.default {
                let _ = write!(out, " = {:?}", default);
            }
        }
        let _ = write!(out, ") -> {}", self.returns.type_name);
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn noop() -> NativeFn {
        NativeFn::from_fn(|_ctx| Ok(()))
    }

    #[test]
    fn signature_rendering() {
        let mut name = ParamSpec::of::<String>();
        name.name = Some("name".into());
        let mut times = ParamSpec::of::<i32>();
        times.name = Some("times".into());
        times.default = Some(Dynamic::Int(1));

        let entry = FunctionEntry::new("greet", vec![name, times], ReturnSpec::of::<String>(), noop());
        assert_eq!(
            entry.signature(),
            "greet(name: string, times: int = Int(1)) -> string"
        );
    }

    #[test]
    fn unnamed_params_are_numbered() {
        let entry = FunctionEntry::new(
            "add",
            vec![ParamSpec::of::<i32>(), ParamSpec::of::<i32>()],
            ReturnSpec::of::<i32>(),
            noop(),
        );
        assert_eq!(entry.signature(), "add(arg0: int, arg1: int) -> int");
    }

    #[test]
    fn overload_hashes_differ() {
        let a = FunctionEntry::new("f", vec![ParamSpec::of::<i32>()], ReturnSpec::of::<()>(), noop());
        let b = FunctionEntry::new("f", vec![ParamSpec::of::<f64>()], ReturnSpec::of::<()>(), noop());
        assert_ne!(a.hash(), b.hash());
    }

    #[test]
    fn abstract_method_is_pure_virtual() {
        let entry = FunctionEntry::abstract_method("go", vec![], ReturnSpec::of::<String>());
        assert!(entry.is_pure_virtual());
        assert!(entry.is_virtual());
        assert!(entry.native().is_none());
    }
}
