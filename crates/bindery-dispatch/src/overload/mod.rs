//! Overload resolution.
//!
//! For each candidate in registration order:
//! 1. Filter by arity (defaults and variadic tails included)
//! 2. Bind positional, keyword and default arguments ([`bind_arguments`])
//! 3. Cast every bound argument through the caster table
//! 4. Sum the conversion costs
//!
//! The cheapest candidate wins ([`find_best_match`]).

mod binding;
mod ranking;

pub use binding::{BoundSlot, CallArgs, accepts_arity, bind_arguments};
pub use ranking::{TieBreak, find_best_match};

use bindery_core::{BindError, ConversionError, Dynamic, FunctionEntry, TypeShape};
use bindery_registry::OverloadSet;
use smallvec::SmallVec;
use tracing::trace;

use crate::caster::{CastEnv, absorb};
use crate::conversion::{Conversion, ConversionKind};

/// A viable candidate with its converted arguments.
#[derive(Debug, Clone, PartialEq)]
pub struct OverloadMatch {
    /// Position of the candidate in its overload set.
    pub index: usize,
    /// Converted arguments, one per parameter; a variadic tail is a list.
    pub args: Vec<Dynamic>,
    /// Conversion applied to each argument.
    pub conversions: SmallVec<[Conversion; 4]>,
    /// Sum of the conversion costs.
    pub total_cost: u32,
}

impl OverloadMatch {
    /// Number of arguments that needed no conversion.
    pub fn exact_count(&self) -> usize {
        self.conversions.iter().filter(|c| c.is_exact()).count()
    }
}

/// Try to match call-site arguments against one candidate.
///
/// Returns `Ok(None)` if the candidate is not viable. Only stale objects
/// produce an error.
pub fn try_match_candidate(
    index: usize,
    entry: &FunctionEntry,
    args: &CallArgs,
    env: &CastEnv<'_>,
) -> Result<Option<OverloadMatch>, ConversionError> {
    if !accepts_arity(entry, args) {
        return Ok(None);
    }
    let Some(slots) = bind_arguments(entry, args) else {
        return Ok(None);
    };

    let mut converted = Vec::with_capacity(slots.len());
    let mut conversions = SmallVec::new();
    for (slot, param) in slots.into_iter().zip(&entry.params) {
        let (value, conversion) = match slot {
            BoundSlot::Default(value) => (value.clone(), Conversion::identity()),
            BoundSlot::Given(value) => {
                let Some(cast) = absorb(env.table.to_native(value, &param.shape, env))? else {
                    return Ok(None);
                };
                (cast.value, cast.conversion)
            }
            BoundSlot::Variadic(extra) => {
                let elem = match &param.shape {
                    TypeShape::List(elem) => elem.as_ref(),
                    other => other,
                };
                let mut items = Vec::with_capacity(extra.len());
                // every collected argument ranks below any implicit conversion
                let mut cost = Conversion::COST_VAR_ARG * extra.len().max(1) as u32;
                for value in extra {
                    let Some(cast) = absorb(env.table.to_native(value, elem, env))? else {
                        return Ok(None);
                    };
                    cost += cast.conversion.cost;
                    items.push(cast.value);
                }
                let conversion = Conversion {
                    kind: ConversionKind::VarArg,
                    cost,
                    is_implicit: true,
                };
                (Dynamic::List(items), conversion)
            }
        };
        converted.push(value);
        conversions.push(conversion);
    }

    let total_cost = conversions.iter().map(|c: &Conversion| c.cost).sum();
    Ok(Some(OverloadMatch {
        index,
        args: converted,
        conversions,
        total_cost,
    }))
}

/// Resolve a call against an overload set.
///
/// Fails with `NoMatchingOverload` listing every attempted signature and the
/// call-site argument types, or `AmbiguousOverload` in strict tie mode.
#[cfg_attr(feature = "profiling", profiling::function)]
pub fn resolve(
    set: &OverloadSet,
    args: &CallArgs,
    env: &CastEnv<'_>,
    tie_break: TieBreak,
) -> Result<OverloadMatch, BindError> {
    let mut viable = Vec::new();
    for (index, entry) in set.iter().enumerate() {
        if let Some(matched) = try_match_candidate(index, entry, args, env)? {
            trace!(candidate = %entry.signature(), cost = matched.total_cost, "viable overload");
            viable.push(matched);
        }
    }

    if viable.is_empty() {
        return Err(BindError::NoMatchingOverload {
            name: set
                .get(0)
                .map(FunctionEntry::qualified_name)
                .unwrap_or_else(|| set.name().to_string()),
            args: args.describe(),
            candidates: set.signatures(),
        });
    }
    find_best_match(viable, set, tie_break)
}
