//! Class, object and callable parameters.

use bindery_core::{ConversionError, Dynamic, TypeShape};

use super::{Conversion, ConversionKind};
use crate::caster::{Cast, CastEnv};

/// Exact-stage caster for bound classes and `object` parameters.
///
/// An object of the parameter's class is exact; an object of a derived class
/// costs [`Conversion::COST_DERIVED_TO_BASE`]. The object is passed through
/// unchanged; the native side projects it onto the base when it borrows.
///
/// A destroyed object is a lifetime error, not a mismatch.
pub fn exact_class(
    value: &Dynamic,
    shape: &TypeShape,
    _env: &CastEnv<'_>,
) -> Result<Option<Cast>, ConversionError> {
    let Dynamic::Object(obj) = value else {
        return Ok(None);
    };
    match shape {
        TypeShape::Class { type_id, hash } => {
            let record = obj.record();
            let Some(distance) = record.distance_to(*type_id) else {
                return Ok(None);
            };
            obj.cell()?;
            let conversion = if distance == 0 {
                Conversion::identity()
            } else {
                Conversion::derived_to_base(*hash, distance)
            };
            Ok(Some(Cast {
                value: value.clone(),
                conversion,
            }))
        }
        TypeShape::Object => Ok(Some(Cast {
            value: value.clone(),
            conversion: Conversion {
                kind: ConversionKind::ToObject,
                cost: Conversion::COST_TO_OBJECT,
                is_implicit: true,
            },
        })),
        _ => Ok(None),
    }
}

/// Exact-stage caster for callables.
pub fn exact_callable(
    value: &Dynamic,
    shape: &TypeShape,
    _env: &CastEnv<'_>,
) -> Result<Option<Cast>, ConversionError> {
    Ok(match (shape, value) {
        (TypeShape::Callable, Dynamic::Callable(_)) => Some(Cast::identity(value.clone())),
        _ => None,
    })
}

/// Catch-all caster for `any` parameters.
pub fn catch_all(
    value: &Dynamic,
    shape: &TypeShape,
    _env: &CastEnv<'_>,
) -> Result<Option<Cast>, ConversionError> {
    Ok(shape.is_any().then(|| Cast {
        value: value.clone(),
        conversion: Conversion::var_arg(),
    }))
}
