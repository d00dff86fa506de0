//! Cost-based ranking for overload resolution.
//!
//! Selects the best match from the viable candidates by total conversion
//! cost, with tie-breaking controlled by [`TieBreak`].

use bindery_core::BindError;
use bindery_registry::OverloadSet;

use super::OverloadMatch;

/// What to do when several candidates share the lowest cost.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TieBreak {
    /// The earliest registered candidate wins.
    #[default]
    FirstRegistered,
    /// Prefer the candidate with more exact matches; report
    /// `AmbiguousOverload` if that still ties.
    Strict,
}

/// Find the best match from viable candidates.
///
/// `viable` must be in registration order and non-empty.
pub fn find_best_match(
    viable: Vec<OverloadMatch>,
    set: &OverloadSet,
    tie_break: TieBreak,
) -> Result<OverloadMatch, BindError> {
    let Some(lowest) = viable.iter().map(|m| m.total_cost).min() else {
        return Err(BindError::NoMatchingOverload {
            name: set.name().to_string(),
            args: String::new(),
            candidates: set.signatures(),
        });
    };

    let mut tied: Vec<OverloadMatch> = viable
        .into_iter()
        .filter(|m| m.total_cost == lowest)
        .collect();

    if tied.len() == 1 || tie_break == TieBreak::FirstRegistered {
        // stable order, so the first tied match is the earliest registered
        return Ok(tied.swap_remove(0));
    }

    break_tie(tied).map_err(|tied| ambiguous_overload_error(&tied, set))
}

/// Try to break a tie between candidates with equal cost.
///
/// Prefers more exact matches over conversions. Returns the still-tied
/// candidates when that doesn't decide.
fn break_tie(tied: Vec<OverloadMatch>) -> Result<OverloadMatch, Vec<OverloadMatch>> {
    let most_exact = tied.iter().map(OverloadMatch::exact_count).max().unwrap_or(0);
    let mut best: Vec<OverloadMatch> = tied
        .into_iter()
        .filter(|m| m.exact_count() == most_exact)
        .collect();
    if best.len() == 1 {
        Ok(best.swap_remove(0))
    } else {
        Err(best)
    }
}

fn ambiguous_overload_error(tied: &[OverloadMatch], set: &OverloadSet) -> BindError {
    BindError::AmbiguousOverload {
        name: set.name().to_string(),
        candidates: tied
            .iter()
            .filter_map(|m| set.get(m.index))
            .map(|entry| entry.signature())
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use bindery_core::{Dynamic, FunctionEntry, NativeFn, ParamSpec, ReturnSpec, primitives};
    use smallvec::SmallVec;

    use super::*;
    use crate::conversion::{Conversion, ConversionKind};

    fn make_match(index: usize, exact: usize, widened: usize) -> OverloadMatch {
        let mut conversions: SmallVec<[Conversion; 4]> = SmallVec::new();
        for _ in 0..exact {
            conversions.push(Conversion::identity());
        }
        for _ in 0..widened {
            conversions.push(Conversion {
                kind: ConversionKind::Primitive {
                    from: primitives::INT64,
                    to: primitives::DOUBLE,
                },
                cost: Conversion::COST_INT_TO_FLOAT,
                is_implicit: true,
            });
        }
        let total_cost = conversions.iter().map(|c| c.cost).sum();
        OverloadMatch {
            index,
            args: vec![Dynamic::None; exact + widened],
            conversions,
            total_cost,
        }
    }

    fn set_of(n: usize) -> OverloadSet {
        let mut set = OverloadSet::new("f");
        for i in 0..n {
            let params = (0..=i).map(|_| ParamSpec::of::<i32>()).collect();
            set.push(FunctionEntry::new(
                "f",
                params,
                ReturnSpec::of::<()>(),
                NativeFn::from_fn(|_| Ok(())),
            ))
            .unwrap();
        }
        set
    }

    #[test]
    fn lower_cost_wins() {
        let set = set_of(2);
        let viable = vec![make_match(0, 0, 2), make_match(1, 1, 1)];
        let best = find_best_match(viable, &set, TieBreak::FirstRegistered).unwrap();
        assert_eq!(best.index, 1);
    }

    #[test]
    fn ties_go_to_first_registered() {
        let set = set_of(2);
        let viable = vec![make_match(0, 1, 1), make_match(1, 1, 1)];
        let best = find_best_match(viable, &set, TieBreak::FirstRegistered).unwrap();
        assert_eq!(best.index, 0);
    }

    #[test]
    fn strict_mode_reports_ambiguity() {
        let set = set_of(2);
        let viable = vec![make_match(0, 1, 1), make_match(1, 1, 1)];
        let err = find_best_match(viable, &set, TieBreak::Strict).unwrap_err();
        let BindError::AmbiguousOverload { name, candidates } = err else {
            panic!("expected ambiguity");
        };
        assert_eq!(name, "f");
        assert_eq!(candidates.len(), 2);
    }

    #[test]
    fn strict_mode_prefers_exact_matches() {
        let set = set_of(2);
        let mut more_exact = make_match(1, 2, 0);
        more_exact.total_cost = 5;
        let viable = vec![make_match(0, 0, 1), more_exact];
        let best = find_best_match(viable, &set, TieBreak::Strict).unwrap();
        assert_eq!(best.index, 1);
    }
}
