//! Runtime caster table.
//!
//! The typed casters in `bindery_core::convert` are strict; they run inside
//! native functions on arguments that were already normalized. The
//! [`CasterTable`] does the normalizing: given a dynamic value and the
//! parameter's [`TypeShape`] it produces the value the native side will see,
//! together with the [`Conversion`] used for overload ranking.
//!
//! # Selection
//!
//! Casters are grouped by [`CastStage`] and tried in stage order:
//!
//! 1. `Exact` - identity matches, derived-to-base objects, `None` into optionals
//! 2. `NumericPromotion` - int to float, bool to int, narrowing when enabled
//! 3. `Container` - element-wise list and dict conversion
//! 4. `UserDefined` - registered implicit constructors
//! 5. `CatchAll` - `any` parameters
//!
//! Within a stage, casters run in priority order (lower first). The first
//! caster that accepts the value wins; later casters are never consulted.
//! Custom casters registered with [`CasterTable::register`] slot into the
//! same order and may be restricted to one target type.

use std::borrow::Cow;
use std::fmt;
use std::sync::Arc;

use bindery_core::{
    CastContext, ConversionError, Dynamic, NativeError, Reentry, ToDynamic, TypeHash, TypeShape,
};
use bindery_registry::TypeRegistry;

use crate::conversion::{
    Conversion, catch_all, convert_container, exact_callable, exact_class, exact_container,
    exact_primitive, find_user_conversion, promote_numeric,
};

/// A normalized argument and how it was obtained.
#[derive(Debug, Clone, PartialEq)]
pub struct Cast {
    /// The value handed to the native function.
    pub value: Dynamic,
    /// The conversion applied.
    pub conversion: Conversion,
}

impl Cast {
    /// The value unchanged.
    pub fn identity(value: Dynamic) -> Self {
        Self {
            value,
            conversion: Conversion::identity(),
        }
    }
}

/// Caster stages, in the order they are tried.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum CastStage {
    Exact,
    NumericPromotion,
    Container,
    UserDefined,
    CatchAll,
}

/// Numeric policy for a cast.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CastOptions {
    /// Wrap out-of-range integers and truncate floats instead of failing.
    pub allow_narrowing: bool,
}

/// Signature of a to-native caster.
///
/// Returns `Ok(None)` to decline the value. An error aborts the whole cast;
/// only stale objects should produce one.
pub type CasterFn = Arc<
    dyn Fn(&Dynamic, &TypeShape, &CastEnv<'_>) -> Result<Option<Cast>, ConversionError>
        + Send
        + Sync,
>;

/// One caster in the table.
#[derive(Clone)]
pub struct CasterEntry {
    /// Caster name, used in traces.
    pub name: Cow<'static, str>,
    /// Stage the caster runs in.
    pub stage: CastStage,
    /// Restrict the caster to one target type.
    pub target: Option<TypeHash>,
    /// Order within the stage (lower first).
    pub priority: u32,
    to_native: CasterFn,
}

impl CasterEntry {
    /// Priority of the built-in casters. Custom casters default to running
    /// before them.
    pub const BUILTIN_PRIORITY: u32 = 100;

    /// Create a caster for every target in `stage`.
    pub fn new<F>(name: impl Into<Cow<'static, str>>, stage: CastStage, f: F) -> Self
    where
        F: Fn(&Dynamic, &TypeShape, &CastEnv<'_>) -> Result<Option<Cast>, ConversionError>
            + Send
            + Sync
            + 'static,
    {
        Self {
            name: name.into(),
            stage,
            target: None,
            priority: 0,
            to_native: Arc::new(f),
        }
    }

    /// Only run for parameters of type `target`.
    pub fn for_target(mut self, target: TypeHash) -> Self {
        self.target = Some(target);
        self
    }

    /// Set the order within the stage.
    pub fn with_priority(mut self, priority: u32) -> Self {
        self.priority = priority;
        self
    }

    /// Check if the caster is consulted for `shape`.
    pub fn applies_to(&self, shape: &TypeShape) -> bool {
        self.target.is_none_or(|target| target == shape.hash())
    }

    /// Run the caster.
    pub fn to_native(
        &self,
        value: &Dynamic,
        shape: &TypeShape,
        env: &CastEnv<'_>,
    ) -> Result<Option<Cast>, ConversionError> {
        (self.to_native)(value, shape, env)
    }
}

impl fmt::Debug for CasterEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CasterEntry")
            .field("name", &self.name)
            .field("stage", &self.stage)
            .field("target", &self.target)
            .field("priority", &self.priority)
            .finish_non_exhaustive()
    }
}

/// Everything a caster may consult.
#[derive(Clone, Copy)]
pub struct CastEnv<'a> {
    /// Registry for class names and implicit conversions.
    pub registry: &'a TypeRegistry,
    /// The table, for element and source casts.
    pub table: &'a CasterTable,
    /// Numeric policy.
    pub options: CastOptions,
    cast: CastContext<'a>,
    reentry: Option<&'a dyn Reentry>,
    user_conversions: bool,
}

impl<'a> CastEnv<'a> {
    pub fn new(
        registry: &'a TypeRegistry,
        table: &'a CasterTable,
        cast: CastContext<'a>,
        options: CastOptions,
    ) -> Self {
        Self {
            registry,
            table,
            options,
            cast,
            reentry: None,
            user_conversions: true,
        }
    }

    /// Attach the dispatcher, for implicit constructors that call back.
    pub fn with_reentry(mut self, reentry: &'a dyn Reentry) -> Self {
        self.reentry = Some(reentry);
        self
    }

    /// The same environment with user-defined conversions disabled.
    ///
    /// Implicit conversions never chain: the source of one is cast without
    /// consulting others.
    pub fn without_user_conversions(&self) -> Self {
        Self {
            user_conversions: false,
            ..*self
        }
    }

    /// Check if user-defined conversions may run.
    pub fn allows_user_conversions(&self) -> bool {
        self.user_conversions
    }

    /// Caster context used to wrap temporaries.
    pub fn cast(&self) -> CastContext<'a> {
        self.cast
    }

    /// The dispatcher, if attached.
    pub fn reentry(&self) -> Option<&'a dyn Reentry> {
        self.reentry
    }

    /// Display name of a shape, with class names resolved.
    pub fn shape_name(&self, shape: &TypeShape) -> String {
        match shape {
            TypeShape::Class { hash, .. } => self
                .registry
                .lookup_hash(*hash, None)
                .map(|record| record.name.clone())
                .unwrap_or_else(|| hash.to_string()),
            TypeShape::List(elem) => format!("list[{}]", self.shape_name(elem)),
            TypeShape::Dict(elem) => format!("dict[string, {}]", self.shape_name(elem)),
            TypeShape::Optional(inner) => format!("Optional[{}]", self.shape_name(inner)),
            other => other.to_string(),
        }
    }
}

/// Ordered set of casters.
#[derive(Debug, Clone, Default)]
pub struct CasterTable {
    entries: Vec<CasterEntry>,
}

impl CasterTable {
    /// Empty table; every cast fails.
    pub fn new() -> Self {
        Self::default()
    }

    /// Table with the built-in casters for every stage.
    pub fn builtin() -> Self {
        let mut table = Self::new();
        let builtins: [(&'static str, CastStage, CasterFn); 8] = [
            ("primitive", CastStage::Exact, Arc::new(exact_primitive)),
            ("class", CastStage::Exact, Arc::new(exact_class)),
            ("callable", CastStage::Exact, Arc::new(exact_callable)),
            ("container", CastStage::Exact, Arc::new(exact_container)),
            ("numeric", CastStage::NumericPromotion, Arc::new(promote_numeric)),
            ("container", CastStage::Container, Arc::new(convert_container)),
            ("implicit", CastStage::UserDefined, Arc::new(find_user_conversion)),
            ("any", CastStage::CatchAll, Arc::new(catch_all)),
        ];
        for (name, stage, to_native) in builtins {
            table.register(CasterEntry {
                name: Cow::Borrowed(name),
                stage,
                target: None,
                priority: CasterEntry::BUILTIN_PRIORITY,
                to_native,
            });
        }
        table
    }

    /// Add a caster, keeping stage and priority order. Casters with equal
    /// stage and priority run in registration order.
    pub fn register(&mut self, entry: CasterEntry) {
        let position = self
            .entries
            .iter()
            .position(|e| (e.stage, e.priority) > (entry.stage, entry.priority))
            .unwrap_or(self.entries.len());
        self.entries.insert(position, entry);
    }

    /// Casters of one stage, in order.
    pub fn stage(&self, stage: CastStage) -> impl Iterator<Item = &CasterEntry> {
        self.entries.iter().filter(move |e| e.stage == stage)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Normalize `value` for a parameter of type `shape`.
    pub fn to_native(
        &self,
        value: &Dynamic,
        shape: &TypeShape,
        env: &CastEnv<'_>,
    ) -> Result<Cast, ConversionError> {
        self.to_native_until(value, shape, env, CastStage::CatchAll)
    }

    /// Like [`to_native`](Self::to_native), consulting only stages up to
    /// and including `last`.
    pub fn to_native_until(
        &self,
        value: &Dynamic,
        shape: &TypeShape,
        env: &CastEnv<'_>,
        last: CastStage,
    ) -> Result<Cast, ConversionError> {
        for entry in &self.entries {
            if entry.stage > last {
                break;
            }
            if !entry.applies_to(shape)
                || (entry.stage == CastStage::UserDefined && !env.allows_user_conversions())
            {
                continue;
            }
            if let Some(cast) = entry.to_native(value, shape, env)? {
                return Ok(cast);
            }
        }
        Err(ConversionError::mismatch(
            env.shape_name(shape),
            value.type_name(),
        ))
    }

    /// Convert a native value for the dynamic side.
    pub fn from_native<T: ToDynamic>(
        &self,
        value: T,
        cx: &CastContext<'_>,
    ) -> Result<Dynamic, NativeError> {
        value.to_dynamic(cx)
    }
}

/// Turn a cast result into "accepted or declined".
///
/// Mismatches decline; stale objects stay errors.
pub fn absorb(result: Result<Cast, ConversionError>) -> Result<Option<Cast>, ConversionError> {
    match result {
        Ok(cast) => Ok(Some(cast)),
        Err(ConversionError::Lifetime(violation)) => Err(ConversionError::Lifetime(violation)),
        Err(_) => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use bindery_core::primitives;

    use super::*;
    use crate::conversion::ConversionKind;

    fn cast(
        table: &CasterTable,
        value: Dynamic,
        shape: TypeShape,
        narrowing: bool,
    ) -> Result<Cast, ConversionError> {
        let registry = TypeRegistry::new();
        let options = CastOptions {
            allow_narrowing: narrowing,
        };
        let env = CastEnv::new(&registry, table, CastContext::detached(), options);
        table.to_native(&value, &shape, &env)
    }

    #[test]
    fn builtin_stages_are_ordered() {
        let table = CasterTable::builtin();
        let stages: Vec<CastStage> = table.entries.iter().map(|e| e.stage).collect();
        let mut sorted = stages.clone();
        sorted.sort();
        assert_eq!(stages, sorted);
        assert_eq!(table.stage(CastStage::Exact).count(), 4);
    }

    #[test]
    fn exact_before_promotion() {
        let table = CasterTable::builtin();
        let exact = cast(&table, Dynamic::Int(3), TypeShape::Primitive(primitives::INT32), false)
            .unwrap();
        assert!(exact.conversion.is_exact());

        let promoted = cast(&table, Dynamic::Int(3), TypeShape::Primitive(primitives::DOUBLE), false)
            .unwrap();
        assert_eq!(promoted.value, Dynamic::Float(3.0));
        assert_eq!(promoted.conversion.cost, Conversion::COST_INT_TO_FLOAT);
    }

    #[test]
    fn mismatch_names_the_target() {
        let table = CasterTable::builtin();
        let err = cast(&table, Dynamic::from("x"), TypeShape::Primitive(primitives::INT32), false)
            .unwrap_err();
        assert_eq!(err, ConversionError::mismatch("int", "str"));
    }

    #[test]
    fn empty_table_rejects_everything() {
        let table = CasterTable::new();
        assert!(cast(&table, Dynamic::Int(1), TypeShape::Any, false).is_err());
    }

    #[test]
    fn custom_caster_runs_first_for_its_target() {
        let mut table = CasterTable::builtin();
        table.register(
            CasterEntry::new("str-to-int", CastStage::Exact, |value, _shape, _env| {
                Ok(value
                    .as_str()
                    .and_then(|s| s.parse::<i64>().ok())
                    .map(|v| Cast {
                        value: Dynamic::Int(v),
                        conversion: Conversion {
                            kind: ConversionKind::Custom {
                                caster: "str-to-int".into(),
                            },
                            cost: Conversion::COST_CUSTOM,
                            is_implicit: true,
                        },
                    }))
            })
            .for_target(primitives::INT64),
        );

        let parsed = cast(&table, Dynamic::from("42"), TypeShape::Primitive(primitives::INT64), false)
            .unwrap();
        assert_eq!(parsed.value, Dynamic::Int(42));

        // other targets are untouched
        assert!(cast(&table, Dynamic::from("42"), TypeShape::Primitive(primitives::INT32), false).is_err());
    }

    #[test]
    fn absorb_keeps_lifetime_errors() {
        let stale = Err(ConversionError::Lifetime(
            bindery_core::LifetimeViolation::UnknownHandle { handle: 1 },
        ));
        assert!(absorb(stale).is_err());
        assert_eq!(absorb(Err(ConversionError::mismatch("int", "str"))), Ok(None));
    }
}
