//! User-defined implicit conversions.
//!
//! A class may declare that it can be built implicitly from another type
//! (`implicitly_convertible<Source, Target>`-style). When an argument does
//! not match a class parameter any other way, the registered conversions for
//! that class are tried in registration order: the argument is cast to the
//! conversion's source shape, then the conversion's one-argument constructor
//! builds a temporary that is passed instead.
//!
//! Conversions never chain; the source cast runs with user-defined
//! conversions disabled.

use bindery_core::{CallContext, ConversionError, Dynamic, NativeError, TypeShape};
use tracing::trace;

use super::{Conversion, ConversionKind};
use crate::caster::{Cast, CastEnv, absorb};

/// User-defined-stage caster for class parameters.
pub fn find_user_conversion(
    value: &Dynamic,
    shape: &TypeShape,
    env: &CastEnv<'_>,
) -> Result<Option<Cast>, ConversionError> {
    let TypeShape::Class { type_id, hash } = shape else {
        return Ok(None);
    };

    let source_env = env.without_user_conversions();
    for conversion in env.registry.implicit_conversions(*type_id) {
        let Some(source) = absorb(env.table.to_native(value, &conversion.source, &source_env))?
        else {
            continue;
        };

        let args = [source.value];
        let mut ctx = CallContext::new(&args, env.cast());
        if let Some(reentry) = env.reentry() {
            ctx = ctx.with_reentry(reentry);
        }
        match conversion.convert.call(&mut ctx) {
            Ok(()) => {}
            Err(NativeError::Lifetime(violation)) => return Err(violation.into()),
            Err(err) => {
                // a failing constructor declines, like a mismatch
                trace!(from = %conversion.source_name, error = %err, "implicit conversion declined");
                continue;
            }
        }

        let temporary = ctx.take_return();
        if temporary.as_object().is_none() {
            continue;
        }
        trace!(from = %conversion.source_name, target = %hash, "implicit conversion");
        return Ok(Some(Cast {
            value: temporary,
            conversion: Conversion {
                kind: ConversionKind::UserDefined { target: *hash },
                cost: Conversion::COST_USER_IMPLICIT,
                is_implicit: true,
            },
        }));
    }
    Ok(None)
}
