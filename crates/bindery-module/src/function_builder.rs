//! FunctionBuilder for naming arguments and attaching call policies.
//!
//! Builders wrap a [`FunctionEntry`] produced from a typed native function
//! and let the caller name its parameters, give trailing parameters default
//! values, and attach return and keep-alive policies before the entry is
//! handed to a module or class.
//!
//! ```ignore
//! module.function_with("scale", scale, |f| {
//!     f.arg("value").arg_default("by", 2.0).doc("Multiply a value.")
//! })?;
//! ```

use bindery_core::{
    Dynamic, FunctionEntry, FunctionFlags, KeepAlive, NativeType, ParamSpec, RegistrationError,
    ReturnPolicy,
};

/// Builder for one function, method or constructor candidate.
#[derive(Debug)]
pub struct FunctionBuilder {
    entry: FunctionEntry,
    /// Next parameter to receive a name from `arg`.
    cursor: usize,
    error: Option<RegistrationError>,
}

impl FunctionBuilder {
    /// Wrap an entry.
    pub fn new(entry: FunctionEntry) -> Self {
        Self {
            entry,
            cursor: 0,
            error: None,
        }
    }

    /// Name the next parameter.
    pub fn arg(mut self, name: impl Into<String>) -> Self {
        let name = name.into();
        match self.entry.params.get_mut(self.cursor) {
            Some(param) => param.name = Some(name),
            None => self.fail(format!(
                "{}: argument '{}' but only {} parameter(s)",
                self.entry.name,
                name,
                self.entry.params.len()
            )),
        }
        self.cursor += 1;
        self
    }

    /// Name the next parameter and give it a default value.
    pub fn arg_default(mut self, name: impl Into<String>, default: impl Into<Dynamic>) -> Self {
        let index = self.cursor;
        self = self.arg(name);
        if let Some(param) = self.entry.params.get_mut(index) {
            param.default = Some(default.into());
        }
        self
    }

    /// Append a declared parameter. Used for pure virtual methods, which
    /// have no native function to derive parameters from.
    pub fn param<P: NativeType>(mut self, name: impl Into<String>) -> Self {
        let mut param = ParamSpec::of::<P>();
        param.name = Some(name.into());
        self.entry.params.push(param);
        self.cursor = self.entry.params.len();
        self
    }

    /// Set the return value policy.
    pub fn policy(mut self, policy: ReturnPolicy) -> Self {
        self.entry.policy = policy;
        self
    }

    /// Keep `patient` alive at least as long as `nurse`.
    pub fn keep_alive(mut self, nurse: usize, patient: usize) -> Self {
        if nurse == patient {
            self.fail(format!(
                "{}: keep_alive({}, {}) links an argument to itself",
                self.entry.name, nurse, patient
            ));
        }
        self.entry.keep_alive.push(KeepAlive { nurse, patient });
        self
    }

    /// Collect surplus positional arguments into the last parameter.
    pub fn variadic(mut self) -> Self {
        self.entry.flags |= FunctionFlags::VARIADIC;
        self
    }

    /// Set the docstring.
    pub fn doc(mut self, doc: impl Into<String>) -> Self {
        self.entry.doc = Some(doc.into());
        self
    }

    pub(crate) fn flag(mut self, flags: FunctionFlags) -> Self {
        self.entry.flags |= flags;
        self
    }

    fn fail(&mut self, message: String) {
        if self.error.is_none() {
            self.error = Some(RegistrationError::InvalidDeclaration(message));
        }
    }

    /// Validate and produce the entry.
    pub fn build(self) -> Result<FunctionEntry, RegistrationError> {
        if let Some(error) = self.error {
            return Err(error);
        }
        let entry = self.entry;
        let invalid = |message: String| Err(RegistrationError::InvalidDeclaration(message));

        let fixed = if entry.is_variadic() {
            let Some(last) = entry.params.last() else {
                return invalid(format!("{}: variadic function without parameters", entry.name));
            };
            if last.has_default() {
                return invalid(format!("{}: variadic tail cannot have a default", entry.name));
            }
            &entry.params[..entry.params.len() - 1]
        } else {
            &entry.params[..]
        };

        if let Some(first_default) = fixed.iter().position(ParamSpec::has_default)
            && let Some(bad) = fixed[first_default..].iter().find(|p| !p.has_default())
        {
            return invalid(format!(
                "{}: parameter '{}' without a default follows one with a default",
                entry.name,
                bad.name.as_deref().unwrap_or("?")
            ));
        }

        for (i, param) in entry.params.iter().enumerate() {
            if let Some(name) = &param.name
                && entry.params[..i].iter().any(|p| p.name.as_ref() == Some(name))
            {
                return invalid(format!("{}: duplicate argument '{}'", entry.name, name));
            }
        }

        Ok(entry)
    }
}
