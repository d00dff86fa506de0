//! Binding metadata for one native type.

use std::any::{Any, TypeId};
use std::fmt;
use std::sync::Arc;

use bitflags::bitflags;

use crate::{NativeType, TypeHash};

/// Hook run on the native object right before it is destroyed.
pub type DestructorHook = Arc<dyn Fn(&mut dyn Any) + Send + Sync>;

/// Converts a reference to a derived object into a reference to one base.
pub type UpcastFn = Arc<dyn for<'a> Fn(&'a dyn Any) -> Option<&'a dyn Any> + Send + Sync>;

/// Mutable counterpart of [`UpcastFn`].
pub type UpcastMutFn =
    Arc<dyn for<'a> Fn(&'a mut dyn Any) -> Option<&'a mut dyn Any> + Send + Sync>;

bitflags! {
    /// Per-type binding flags.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct TypeFlags: u32 {
        /// Registered per load unit instead of globally.
        const MODULE_LOCAL = 1 << 0;
        /// Instances accept arbitrary dynamic attributes.
        const DYNAMIC_ATTR = 1 << 1;
        /// The class declares virtual methods.
        const HAS_VIRTUALS = 1 << 2;
        /// The class cannot be subclassed on the dynamic side.
        const FINAL = 1 << 3;
    }
}

/// How instances created by the binding are held.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum HolderKind {
    /// Unique ownership; the last wrapper destroys the object.
    #[default]
    Owning,
    /// Shared ownership with native code.
    Shared,
    /// Non-owning; the destructor hook never runs.
    Raw,
}

/// Identifies an independently loaded extension module.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LoadUnit(TypeHash);

impl LoadUnit {
    /// Create a load unit key from the unit's name.
    pub fn new(name: &str) -> Self {
        LoadUnit(TypeHash::from_name(name))
    }

    /// The raw key.
    pub fn hash(self) -> TypeHash {
        self.0
    }
}

/// A link from a derived type to one of its bases.
#[derive(Clone)]
pub struct BaseLink {
    /// The base type's record.
    pub record: Arc<TypeRecord>,
    upcast: UpcastFn,
    upcast_mut: UpcastMutFn,
}

impl BaseLink {
    /// Link `D` to base `B` through field projections.
    pub fn new<D: Any, B: Any>(
        record: Arc<TypeRecord>,
        up: fn(&D) -> &B,
        up_mut: fn(&mut D) -> &mut B,
    ) -> Self {
        BaseSpec::new(up, up_mut).link(record)
    }

    /// Apply the upcast to a derived object.
    pub fn upcast<'a>(&self, value: &'a dyn Any) -> Option<&'a dyn Any> {
        (self.upcast)(value)
    }

    /// Apply the mutable upcast to a derived object.
    pub fn upcast_mut<'a>(&self, value: &'a mut dyn Any) -> Option<&'a mut dyn Any> {
        (self.upcast_mut)(value)
    }
}

/// A base declared by native type, before its record is resolved.
///
/// Builders collect these; the registry turns them into [`BaseLink`]s once
/// the base record is known.
#[derive(Clone)]
pub struct BaseSpec {
    /// Native identity of the base.
    pub type_id: TypeId,
    /// Rust name of the base, for diagnostics.
    pub rust_name: &'static str,
    upcast: UpcastFn,
    upcast_mut: UpcastMutFn,
}

impl BaseSpec {
    /// Declare `B` as a base of `D` through field projections.
    pub fn new<D: Any, B: Any>(up: fn(&D) -> &B, up_mut: fn(&mut D) -> &mut B) -> Self {
        Self {
            type_id: TypeId::of::<B>(),
            rust_name: std::any::type_name::<B>(),
            upcast: erase_ref(move |any| any.downcast_ref::<D>().map(|d| up(d) as &dyn Any)),
            upcast_mut: erase_mut(move |any| {
                any.downcast_mut::<D>().map(|d| up_mut(d) as &mut dyn Any)
            }),
        }
    }

    /// Attach the resolved base record.
    pub fn link(&self, record: Arc<TypeRecord>) -> BaseLink {
        BaseLink {
            record,
            upcast: Arc::clone(&self.upcast),
            upcast_mut: Arc::clone(&self.upcast_mut),
        }
    }
}

impl fmt::Debug for BaseSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BaseSpec")
            .field("base", &self.rust_name)
            .finish_non_exhaustive()
    }
}

impl fmt::Debug for BaseLink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BaseLink")
            .field("base", &self.record.name)
            .finish_non_exhaustive()
    }
}

fn erase_ref<F>(f: F) -> UpcastFn
where
    F: for<'a> Fn(&'a dyn Any) -> Option<&'a dyn Any> + Send + Sync + 'static,
{
    Arc::new(f)
}

fn erase_mut<F>(f: F) -> UpcastMutFn
where
    F: for<'a> Fn(&'a mut dyn Any) -> Option<&'a mut dyn Any> + Send + Sync + 'static,
{
    Arc::new(f)
}

/// Binding metadata for a native type.
///
/// Created once per native type (per load unit for module-local types) and
/// immutable once registered.
#[derive(Clone)]
pub struct TypeRecord {
    /// Native identity.
    pub type_id: TypeId,
    /// Rust type name, for diagnostics.
    pub rust_name: &'static str,
    /// Exposed name.
    pub name: String,
    /// Hash of the exposed name.
    pub hash: TypeHash,
    /// `size_of` the native type.
    pub size: usize,
    /// `align_of` the native type.
    pub align: usize,
    /// Default holder for instances created by constructors.
    pub holder: HolderKind,
    /// Ordered base links; the first listed base has priority.
    pub bases: Vec<BaseLink>,
    /// Type flags.
    pub flags: TypeFlags,
    /// Owning load unit for module-local records.
    pub unit: Option<LoadUnit>,
    destructor: Option<DestructorHook>,
}

impl TypeRecord {
    /// Create a record for `T` using its [`NativeType`] identity.
    pub fn of<T: NativeType>() -> Self {
        Self::named::<T>(T::type_name().into_owned())
    }

    /// Create a record for `T` under an explicit exposed name.
    pub fn named<T: Any>(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            type_id: TypeId::of::<T>(),
            rust_name: std::any::type_name::<T>(),
            hash: TypeHash::from_name(&name),
            name,
            size: std::mem::size_of::<T>(),
            align: std::mem::align_of::<T>(),
            holder: HolderKind::default(),
            bases: Vec::new(),
            flags: TypeFlags::empty(),
            unit: None,
            destructor: None,
        }
    }

    /// Set the holder kind.
    pub fn with_holder(mut self, holder: HolderKind) -> Self {
        self.holder = holder;
        self
    }

    /// Add flags.
    pub fn with_flags(mut self, flags: TypeFlags) -> Self {
        self.flags |= flags;
        self
    }

    /// Append a base link.
    pub fn with_base(mut self, base: BaseLink) -> Self {
        self.bases.push(base);
        self
    }

    /// Install a destructor hook.
    pub fn with_destructor(mut self, hook: DestructorHook) -> Self {
        self.destructor = Some(hook);
        self
    }

    /// Scope the record to a load unit (marks it module-local).
    pub fn in_unit(mut self, unit: LoadUnit) -> Self {
        self.unit = Some(unit);
        self.flags |= TypeFlags::MODULE_LOCAL;
        self
    }

    /// The destructor hook, if any.
    pub fn destructor(&self) -> Option<&DestructorHook> {
        self.destructor.as_ref()
    }

    /// Check if the record is module-local.
    pub fn is_module_local(&self) -> bool {
        self.flags.contains(TypeFlags::MODULE_LOCAL)
    }

    /// Check if this record is `target` or derives from it.
    pub fn is_a(&self, target: TypeId) -> bool {
        self.upcast_path(target).is_some()
    }

    /// Find the chain of base links leading to `target`.
    ///
    /// Depth-first in listed base order, so the first listed base wins when
    /// the target is reachable through several paths. An empty path means the
    /// record is the target itself.
    pub fn upcast_path(&self, target: TypeId) -> Option<Vec<&BaseLink>> {
        if self.type_id == target {
            return Some(Vec::new());
        }
        for link in &self.bases {
            if let Some(mut rest) = link.record.upcast_path(target) {
                rest.insert(0, link);
                return Some(rest);
            }
        }
        None
    }

    /// Project a reference to this record's type onto `target`.
    pub fn cast_ref<'v>(&self, value: &'v dyn Any, target: TypeId) -> Option<&'v dyn Any> {
        let path = self.upcast_path(target)?;
        path.into_iter()
            .try_fold(value, |current, link| link.upcast(current))
    }

    /// Project a mutable reference to this record's type onto `target`.
    pub fn cast_mut<'v>(
        &self,
        value: &'v mut dyn Any,
        target: TypeId,
    ) -> Option<&'v mut dyn Any> {
        let path = self.upcast_path(target)?;
        path.into_iter()
            .try_fold(value, |current, link| link.upcast_mut(current))
    }

    /// Number of inheritance steps to `target`, if reachable.
    pub fn distance_to(&self, target: TypeId) -> Option<usize> {
        self.upcast_path(target).map(|p| p.len())
    }
}

impl fmt::Debug for TypeRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypeRecord")
            .field("name", &self.name)
            .field("rust_name", &self.rust_name)
            .field("hash", &self.hash)
            .field("holder", &self.holder)
            .field("bases", &self.bases)
            .field("flags", &self.flags)
            .field("unit", &self.unit)
            .finish_non_exhaustive()
    }
}
