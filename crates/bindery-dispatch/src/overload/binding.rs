//! Matching call-site arguments to a candidate's parameters.

use std::fmt::Write as _;

use bindery_core::{Dynamic, FunctionEntry};

/// Arguments as passed at the call site.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CallArgs {
    /// Positional arguments, in order.
    pub positional: Vec<Dynamic>,
    /// Keyword arguments, in call-site order.
    pub keywords: Vec<(String, Dynamic)>,
}

impl CallArgs {
    /// Positional-only arguments.
    pub fn new(positional: Vec<Dynamic>) -> Self {
        Self {
            positional,
            keywords: Vec::new(),
        }
    }

    /// Add a keyword argument.
    pub fn with_keyword(mut self, name: impl Into<String>, value: impl Into<Dynamic>) -> Self {
        self.keywords.push((name.into(), value.into()));
        self
    }

    /// Total number of arguments.
    pub fn len(&self) -> usize {
        self.positional.len() + self.keywords.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positional.is_empty() && self.keywords.is_empty()
    }

    /// Argument types as seen at the call site, for diagnostics.
    ///
    /// ```text
    /// int, str, scale=float
    /// ```
    pub fn describe(&self) -> String {
        let mut out = String::new();
        for (i, arg) in self.positional.iter().enumerate() {
            if i > 0 {
                out.push_str(", ");
            }
            out.push_str(arg.type_name());
        }
        for (i, (name, arg)) in self.keywords.iter().enumerate() {
            if i > 0 || !self.positional.is_empty() {
                out.push_str(", ");
            }
            let _ = write!(out, "{}={}", name, arg.type_name());
        }
        out
    }
}

impl From<Vec<Dynamic>> for CallArgs {
    fn from(positional: Vec<Dynamic>) -> Self {
        Self::new(positional)
    }
}

/// Where a parameter's value comes from.
#[derive(Debug, Clone, Copy)]
pub enum BoundSlot<'a> {
    /// Passed at the call site.
    Given(&'a Dynamic),
    /// Omitted; the declared default applies.
    Default(&'a Dynamic),
    /// Extra positional arguments collected by the variadic tail.
    Variadic(&'a [Dynamic]),
}

/// Quick arity filter run before any casting.
pub fn accepts_arity(entry: &FunctionEntry, args: &CallArgs) -> bool {
    let fixed = fixed_params(entry);
    let required = entry.params[..fixed]
        .iter()
        .filter(|p| !p.has_default())
        .count();
    if args.positional.len() > fixed && !entry.is_variadic() {
        return false;
    }
    args.len() >= required && (entry.is_variadic() || args.len() <= fixed)
}

fn fixed_params(entry: &FunctionEntry) -> usize {
    if entry.is_variadic() {
        entry.params.len().saturating_sub(1)
    } else {
        entry.params.len()
    }
}

/// Bind call-site arguments to `entry`'s parameters.
///
/// Positional arguments fill parameters left to right; keywords fill the
/// parameter with the same name; anything left takes its default. Extra
/// positional arguments go to the variadic tail when there is one. Returns
/// `None` if the arguments don't fit: an unknown keyword, a parameter given
/// twice, a missing argument without default, or extras with no tail.
pub fn bind_arguments<'a>(entry: &'a FunctionEntry, args: &'a CallArgs) -> Option<Vec<BoundSlot<'a>>> {
    let fixed = fixed_params(entry);
    let (head, tail) = if args.positional.len() > fixed {
        if !entry.is_variadic() {
            return None;
        }
        args.positional.split_at(fixed)
    } else {
        (args.positional.as_slice(), &[][..])
    };

    let mut slots: Vec<Option<BoundSlot<'a>>> = head.iter().map(|v| Some(BoundSlot::Given(v))).collect();
    slots.resize(fixed, None);

    for (name, value) in &args.keywords {
        let index = entry.params[..fixed]
            .iter()
            .position(|p| p.name.as_deref() == Some(name.as_str()))?;
        if slots[index].is_some() {
            return None;
        }
        slots[index] = Some(BoundSlot::Given(value));
    }

    let mut bound = Vec::with_capacity(entry.params.len());
    for (slot, param) in slots.into_iter().zip(&entry.params) {
        bound.push(match slot {
            Some(slot) => slot,
            None => BoundSlot::Default(param.default.as_ref()?),
        });
    }
    if entry.is_variadic() {
        bound.push(BoundSlot::Variadic(tail));
    }
    Some(bound)
}
