//! Container conversions: lists, string-keyed dicts and optionals.

use std::collections::BTreeMap;

use bindery_core::{ConversionError, Dynamic, TypeShape};

use super::{Conversion, ConversionKind};
use crate::caster::{Cast, CastEnv, CastStage, absorb};

/// Exact-stage caster for containers.
///
/// - `None` into an optional is exact; any other value is cast against the
///   inner shape through the full caster chain.
/// - Lists and dicts are exact when every element is an exact match.
pub fn exact_container(
    value: &Dynamic,
    shape: &TypeShape,
    env: &CastEnv<'_>,
) -> Result<Option<Cast>, ConversionError> {
    match (shape, value) {
        (TypeShape::Optional(_), Dynamic::None) => Ok(Some(Cast::identity(Dynamic::None))),
        (TypeShape::Optional(inner), other) => absorb(env.table.to_native(other, inner, env)),
        (TypeShape::List(elem), Dynamic::List(items)) => {
            for item in items {
                if absorb(env.table.to_native_until(item, elem, env, CastStage::Exact))?
                    .is_none_or(|cast| !cast.conversion.is_exact())
                {
                    return Ok(None);
                }
            }
            Ok(Some(Cast::identity(value.clone())))
        }
        (TypeShape::Dict(elem), Dynamic::Dict(items)) => {
            for item in items.values() {
                if absorb(env.table.to_native_until(item, elem, env, CastStage::Exact))?
                    .is_none_or(|cast| !cast.conversion.is_exact())
                {
                    return Ok(None);
                }
            }
            Ok(Some(Cast::identity(value.clone())))
        }
        _ => Ok(None),
    }
}

/// Container-stage caster: converts every element through the full chain.
///
/// Costs [`Conversion::COST_CONTAINER`] plus the most expensive element
/// conversion. Fails as a whole if any element fails.
pub fn convert_container(
    value: &Dynamic,
    shape: &TypeShape,
    env: &CastEnv<'_>,
) -> Result<Option<Cast>, ConversionError> {
    match (shape, value) {
        (TypeShape::List(elem), Dynamic::List(items)) => {
            let mut out = Vec::with_capacity(items.len());
            let mut worst = 0;
            for item in items {
                let Some(cast) = absorb(env.table.to_native(item, elem, env))? else {
                    return Ok(None);
                };
                worst = worst.max(cast.conversion.cost);
                out.push(cast.value);
            }
            Ok(Some(container_cast(Dynamic::List(out), worst)))
        }
        (TypeShape::Dict(elem), Dynamic::Dict(items)) => {
            let mut out = BTreeMap::new();
            let mut worst = 0;
            for (key, item) in items {
                let Some(cast) = absorb(env.table.to_native(item, elem, env))? else {
                    return Ok(None);
                };
                worst = worst.max(cast.conversion.cost);
                out.insert(key.clone(), cast.value);
            }
            Ok(Some(container_cast(Dynamic::Dict(out), worst)))
        }
        _ => Ok(None),
    }
}

fn container_cast(value: Dynamic, element_cost: u32) -> Cast {
    Cast {
        value,
        conversion: Conversion {
            kind: ConversionKind::Container,
            cost: Conversion::COST_CONTAINER + element_cost,
            is_implicit: true,
        },
    }
}

#[cfg(test)]
mod tests {
    use bindery_core::{CastContext, primitives};
    use bindery_registry::TypeRegistry;

    use super::*;
    use crate::caster::{CastOptions, CasterTable};

    fn cast(value: Dynamic, shape: TypeShape) -> Option<Cast> {
        let registry = TypeRegistry::new();
        let table = CasterTable::builtin();
        let env = CastEnv::new(&registry, &table, CastContext::detached(), CastOptions::default());
        table.to_native(&value, &shape, &env).ok()
    }

    fn list_of(hash: bindery_core::TypeHash) -> TypeShape {
        TypeShape::List(Box::new(TypeShape::Primitive(hash)))
    }

    #[test]
    fn exact_list() {
        let value = Dynamic::List(vec![Dynamic::Int(1), Dynamic::Int(2)]);
        let cast = cast(value.clone(), list_of(primitives::INT32)).unwrap();
        assert!(cast.conversion.is_exact());
        assert_eq!(cast.value, value);
    }

    #[test]
    fn list_elements_are_promoted() {
        let value = Dynamic::List(vec![Dynamic::Int(1), Dynamic::Float(2.5)]);
        let cast = cast(value, list_of(primitives::DOUBLE)).unwrap();
        assert_eq!(cast.value, Dynamic::List(vec![Dynamic::Float(1.0), Dynamic::Float(2.5)]));
        assert_eq!(
            cast.conversion.cost,
            Conversion::COST_CONTAINER + Conversion::COST_INT_TO_FLOAT
        );
    }

    #[test]
    fn one_bad_element_rejects_the_list() {
        let value = Dynamic::List(vec![Dynamic::Int(1), Dynamic::from("x")]);
        assert!(cast(value, list_of(primitives::INT32)).is_none());
    }

    #[test]
    fn dict_values_are_converted() {
        let mut items = BTreeMap::new();
        items.insert("a".to_string(), Dynamic::Bool(true));
        let shape = TypeShape::Dict(Box::new(TypeShape::Primitive(primitives::INT64)));
        let cast = cast(Dynamic::Dict(items), shape).unwrap();
        let Dynamic::Dict(out) = cast.value else {
            panic!("expected dict");
        };
        assert_eq!(out.get("a"), Some(&Dynamic::Int(1)));
    }

    #[test]
    fn optionals() {
        let shape = TypeShape::Optional(Box::new(TypeShape::Primitive(primitives::DOUBLE)));
        assert!(cast(Dynamic::None, shape.clone()).unwrap().conversion.is_exact());
        assert_eq!(cast(Dynamic::Int(2), shape.clone()).unwrap().value, Dynamic::Float(2.0));
        assert!(cast(Dynamic::from("x"), shape).is_none());
    }
}
