//! Primitive conversions: exact matches and numeric promotion.
//!
//! Every integer arrives as `Dynamic::Int(i64)` and every float as
//! `Dynamic::Float(f64)`, so "exact" for a primitive means the value has the
//! right kind and fits the target width.

use bindery_core::{ConversionError, Dynamic, TypeHash, TypeShape, primitives};

use super::{Conversion, ConversionKind};
use crate::caster::{Cast, CastEnv};

/// Inclusive range of an integer primitive, as i128 so `u64` fits.
fn int_range(hash: TypeHash) -> Option<(i128, i128)> {
    Some(match hash {
        primitives::INT8 => (i8::MIN.into(), i8::MAX.into()),
        primitives::INT16 => (i16::MIN.into(), i16::MAX.into()),
        primitives::INT32 => (i32::MIN.into(), i32::MAX.into()),
        primitives::INT64 => (i64::MIN.into(), i64::MAX.into()),
        primitives::UINT8 => (0, u8::MAX.into()),
        primitives::UINT16 => (0, u16::MAX.into()),
        primitives::UINT32 => (0, u32::MAX.into()),
        primitives::UINT64 => (0, u64::MAX.into()),
        _ => return None,
    })
}

fn fits(value: i64, hash: TypeHash) -> bool {
    int_range(hash).is_some_and(|(lo, hi)| (lo..=hi).contains(&i128::from(value)))
}

fn fits_f32(value: f64) -> bool {
    !value.is_finite() || value.abs() <= f64::from(f32::MAX)
}

/// Wrap an integer to the target width like a native `as` cast.
///
/// Returns `None` when the wrapped value cannot be carried as `i64`
/// (negative values into `u64`).
pub fn wrap_integer(value: i64, hash: TypeHash) -> Option<i64> {
    Some(match hash {
        primitives::INT8 => i64::from(value as i8),
        primitives::INT16 => i64::from(value as i16),
        primitives::INT32 => i64::from(value as i32),
        primitives::INT64 => value,
        primitives::UINT8 => i64::from(value as u8),
        primitives::UINT16 => i64::from(value as u16),
        primitives::UINT32 => i64::from(value as u32),
        primitives::UINT64 if value >= 0 => value,
        _ => return None,
    })
}

fn primitive_of(value: &Dynamic) -> Option<TypeHash> {
    Some(match value {
        Dynamic::None => primitives::VOID,
        Dynamic::Bool(_) => primitives::BOOL,
        Dynamic::Int(_) => primitives::INT64,
        Dynamic::Float(_) => primitives::DOUBLE,
        Dynamic::Str(_) => primitives::STRING,
        _ => return None,
    })
}

/// Exact-stage caster for primitive parameters.
pub fn exact_primitive(
    value: &Dynamic,
    shape: &TypeShape,
    _env: &CastEnv<'_>,
) -> Result<Option<Cast>, ConversionError> {
    let TypeShape::Primitive(target) = shape else {
        return Ok(None);
    };
    let target = *target;
    let accepted = match value {
        Dynamic::Int(v) => fits(*v, target),
        Dynamic::Float(v) => {
            target == primitives::DOUBLE || (target == primitives::FLOAT && fits_f32(*v))
        }
        Dynamic::Bool(_) => target == primitives::BOOL,
        Dynamic::Str(_) => target == primitives::STRING,
        Dynamic::None => target == primitives::VOID,
        _ => false,
    };
    Ok(accepted.then(|| Cast::identity(value.clone())))
}

/// Promotion-stage caster for numeric parameters.
///
/// Promotions (int to float, bool to int) always apply. Lossy conversions
/// only apply with `allow_narrowing`:
/// - out-of-range integers wrap to the target width
/// - finite floats truncate toward zero, then wrap
/// - doubles that overflow `float` become infinite
pub fn promote_numeric(
    value: &Dynamic,
    shape: &TypeShape,
    env: &CastEnv<'_>,
) -> Result<Option<Cast>, ConversionError> {
    let TypeShape::Primitive(target) = shape else {
        return Ok(None);
    };
    let target = *target;
    let Some(from) = primitive_of(value) else {
        return Ok(None);
    };
    let narrowing = env.options.allow_narrowing;

    let promoted = match value {
        Dynamic::Bool(b) if primitives::is_integer(target) => {
            Some((Dynamic::Int(i64::from(*b)), Conversion::COST_BOOL_TO_INT, false))
        }
        Dynamic::Int(v) if primitives::is_float(target) => {
            Some((Dynamic::Float(*v as f64), Conversion::COST_INT_TO_FLOAT, false))
        }
        Dynamic::Int(v) if narrowing && primitives::is_integer(target) => {
            wrap_integer(*v, target).map(|w| (Dynamic::Int(w), Conversion::COST_NARROWING, true))
        }
        Dynamic::Float(v) if narrowing && v.is_finite() && primitives::is_integer(target) => {
            // `as` saturates at the i64 range before wrapping
            wrap_integer(v.trunc() as i64, target)
                .map(|w| (Dynamic::Int(w), Conversion::COST_FLOAT_TO_INT, true))
        }
        Dynamic::Float(v) if narrowing && target == primitives::FLOAT => Some((
            Dynamic::Float(f64::from(*v as f32)),
            Conversion::COST_NARROWING,
            true,
        )),
        _ => None,
    };

    Ok(promoted.map(|(value, cost, lossy)| Cast {
        value,
        conversion: Conversion {
            kind: if lossy {
                ConversionKind::Narrowing { from, to: target }
            } else {
                ConversionKind::Primitive { from, to: target }
            },
            cost,
            is_implicit: !lossy,
        },
    }))
}
