//! Dynamic-side wrappers around native objects.
//!
//! An [`ObjectRef`] is what the dynamic side holds. Cloning it is cheap;
//! dropping the last clone is the dynamic runtime collecting the wrapper,
//! which releases the underlying [`InstanceHandle`].

use std::any::{Any, TypeId};
use std::fmt;
use std::marker::PhantomData;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::{Mutex, RwLock};
use rustc_hash::FxHashMap;
use tracing::warn;

use crate::entries::{TypeFlags, TypeRecord};
use crate::error::LifetimeViolation;
use crate::native_error::NativeError;
use crate::NativeType;

use super::lifetime::new_cell;
use super::{
    Dynamic, DynamicClass, InstanceHandle, LifetimeManager, LifetimeTag, NativeCell,
    ReleaseOutcome,
};

struct ObjectInner {
    handle: InstanceHandle,
    manager: Arc<LifetimeManager>,
    class: RwLock<Option<Arc<DynamicClass>>>,
    keep_alive: Mutex<Vec<ObjectRef>>,
    attrs: RwLock<FxHashMap<String, Dynamic>>,
    released: AtomicBool,
}

impl Drop for ObjectInner {
    fn drop(&mut self) {
        if self.released.swap(true, Ordering::AcqRel) {
            return;
        }
        if let Err(violation) = self.manager.release(&self.handle) {
            warn!(%violation, "release on wrapper collection failed");
        }
    }
}

/// The dynamic side's reference to a native object.
#[derive(Clone)]
pub struct ObjectRef {
    inner: Arc<ObjectInner>,
}

impl ObjectRef {
    /// Adopt `cell` into `manager` and wrap the resulting handle.
    ///
    /// With `keep_alive_of`, the new wrapper keeps that object alive.
    pub fn adopt(
        manager: &Arc<LifetimeManager>,
        cell: NativeCell,
        record: Arc<TypeRecord>,
        tag: LifetimeTag,
        keep_alive_of: Option<&ObjectRef>,
    ) -> Self {
        let handle = manager.adopt(cell, record, tag, keep_alive_of.map(|o| o.handle()));
        let obj = ObjectRef {
            inner: Arc::new(ObjectInner {
                handle,
                manager: Arc::clone(manager),
                class: RwLock::new(None),
                keep_alive: Mutex::new(Vec::new()),
                attrs: RwLock::new(FxHashMap::default()),
                released: AtomicBool::new(false),
            }),
        };
        if let Some(patient) = keep_alive_of {
            obj.keep_alive(patient.clone());
        }
        obj
    }

    /// Move `value` into a new cell owned by the dynamic side.
    pub fn new_owned<T: Any + Send + Sync>(
        manager: &Arc<LifetimeManager>,
        record: Arc<TypeRecord>,
        value: T,
    ) -> Self {
        Self::adopt(manager, new_cell(value), record, LifetimeTag::Owning, None)
    }

    /// The instance handle.
    pub fn handle(&self) -> &InstanceHandle {
        &self.inner.handle
    }

    /// The bound type record.
    pub fn record(&self) -> &Arc<TypeRecord> {
        self.inner.handle.record()
    }

    /// Exposed name of the bound type.
    pub fn type_name(&self) -> &str {
        &self.record().name
    }

    /// Name of the dynamic subclass if there is one, else of the bound type.
    pub fn class_name(&self) -> String {
        match self.dynamic_class() {
            Some(class) => class.name().to_string(),
            None => self.type_name().to_string(),
        }
    }

    /// The lifetime manager this object belongs to.
    pub fn manager(&self) -> &Arc<LifetimeManager> {
        &self.inner.manager
    }

    /// Get the native cell, failing if the object was destroyed.
    pub fn cell(&self) -> Result<NativeCell, LifetimeViolation> {
        self.inner.manager.get(&self.inner.handle)
    }

    /// Check if the object is `T` or derives from it.
    pub fn is_instance_of(&self, type_id: TypeId) -> bool {
        self.record().is_a(type_id)
    }

    /// Borrow the object as `T` (the bound type or one of its bases).
    pub fn with<T: Any, R>(&self, f: impl FnOnce(&T) -> R) -> Result<R, NativeError> {
        let cell = self.cell()?;
        let guard = cell.try_read().ok_or_else(|| {
            NativeError::runtime(format!(
                "'{}' instance is already mutably borrowed",
                self.type_name()
            ))
        })?;
        let target = self
            .record()
            .cast_ref(&**guard, TypeId::of::<T>())
            .and_then(|any| any.downcast_ref::<T>())
            .ok_or_else(|| self.not_a::<T>())?;
        Ok(f(target))
    }

    /// Mutably borrow the object as `T`.
    pub fn with_mut<T: Any, R>(&self, f: impl FnOnce(&mut T) -> R) -> Result<R, NativeError> {
        let cell = self.cell()?;
        let mut guard = cell.try_write().ok_or_else(|| {
            NativeError::runtime(format!("'{}' instance is already borrowed", self.type_name()))
        })?;
        let target = self
            .record()
            .cast_mut(&mut **guard, TypeId::of::<T>())
            .and_then(|any| any.downcast_mut::<T>())
            .ok_or_else(|| self.not_a::<T>())?;
        Ok(f(target))
    }

    fn not_a<T>(&self) -> NativeError {
        NativeError::invalid_this(format!(
            "'{}' is not a {}",
            self.type_name(),
            std::any::type_name::<T>()
        ))
    }

    /// The dynamic subclass this instance was created from, if any.
    pub fn dynamic_class(&self) -> Option<Arc<DynamicClass>> {
        self.inner.class.read().clone()
    }

    /// Attach a dynamic subclass.
    pub fn set_dynamic_class(&self, class: Arc<DynamicClass>) {
        *self.inner.class.write() = Some(class);
    }

    /// Keep `patient` alive for as long as this wrapper lives.
    pub fn keep_alive(&self, patient: ObjectRef) {
        if patient.ptr_eq(self) {
            return;
        }
        let mut edges = self.inner.keep_alive.lock();
        if !edges.iter().any(|e| e.ptr_eq(&patient)) {
            edges.push(patient);
        }
    }

    /// Number of objects this wrapper keeps alive.
    pub fn keep_alive_count(&self) -> usize {
        self.inner.keep_alive.lock().len()
    }

    /// Check if arbitrary attributes may be stored on the instance.
    pub fn allows_dynamic_attrs(&self) -> bool {
        self.record().flags.contains(TypeFlags::DYNAMIC_ATTR) || self.dynamic_class().is_some()
    }

    /// Read a dynamic attribute.
    pub fn get_attr(&self, name: &str) -> Option<Dynamic> {
        self.inner.attrs.read().get(name).cloned()
    }

    /// Store a dynamic attribute.
    pub fn set_attr(&self, name: impl Into<String>, value: Dynamic) {
        self.inner.attrs.write().insert(name.into(), value);
    }

    /// Release the handle now instead of on collection.
    ///
    /// Releasing twice is a [`LifetimeViolation::DoubleRelease`].
    pub fn release(&self) -> Result<ReleaseOutcome, LifetimeViolation> {
        self.inner.released.store(true, Ordering::Release);
        self.inner.manager.release(&self.inner.handle)
    }

    /// Identity comparison.
    pub fn ptr_eq(&self, other: &ObjectRef) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// Number of live clones of this wrapper.
    pub fn wrapper_count(&self) -> usize {
        Arc::strong_count(&self.inner)
    }

    /// Create a non-owning back reference.
    pub fn downgrade(&self) -> WeakObjectRef {
        WeakObjectRef {
            inner: Arc::downgrade(&self.inner),
        }
    }
}

impl fmt::Debug for ObjectRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObjectRef")
            .field("type", &self.type_name())
            .field("handle", &self.handle().id())
            .field("tag", &self.handle().tag())
            .finish()
    }
}

/// Weak back reference that does not keep the wrapper alive.
///
/// Use for parent links so native/dynamic cycles can be collected.
#[derive(Clone, Default)]
pub struct WeakObjectRef {
    inner: Weak<ObjectInner>,
}

impl WeakObjectRef {
    /// Upgrade to a strong reference if the wrapper is still alive.
    pub fn upgrade(&self) -> Option<ObjectRef> {
        self.inner.upgrade().map(|inner| ObjectRef { inner })
    }
}

impl fmt::Debug for WeakObjectRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "WeakObjectRef(alive: {})", self.inner.strong_count() > 0)
    }
}

/// A typed view of a bound object, accepted wherever `T` or a subclass is.
pub struct Instance<T> {
    obj: ObjectRef,
    _marker: PhantomData<fn() -> T>,
}

impl<T: NativeType> Instance<T> {
    /// Wrap an object known to be a `T`.
    pub fn new(obj: ObjectRef) -> Option<Self> {
        obj.is_instance_of(TypeId::of::<T>()).then_some(Self {
            obj,
            _marker: PhantomData,
        })
    }

    /// The underlying object.
    pub fn object(&self) -> &ObjectRef {
        &self.obj
    }

    /// Unwrap into the underlying object.
    pub fn into_object(self) -> ObjectRef {
        self.obj
    }

    /// Borrow as `T`.
    pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> Result<R, NativeError> {
        self.obj.with::<T, R>(f)
    }

    /// Mutably borrow as `T`.
    pub fn with_mut<R>(&self, f: impl FnOnce(&mut T) -> R) -> Result<R, NativeError> {
        self.obj.with_mut::<T, R>(f)
    }

    /// Clone the value out.
    pub fn get(&self) -> Result<T, NativeError>
    where
        T: Clone,
    {
        self.with(T::clone)
    }
}

impl<T> Clone for Instance<T> {
    fn clone(&self) -> Self {
        Self {
            obj: self.obj.clone(),
            _marker: PhantomData,
        }
    }
}

impl<T> fmt::Debug for Instance<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Instance").field(&self.obj).finish()
    }
}

/// A native object shared between native code and the dynamic side.
///
/// Returning a `Shared<T>` hands out shared ownership; native code keeps its
/// own clone and sees every mutation made through the dynamic side.
pub struct Shared<T> {
    cell: NativeCell,
    _marker: PhantomData<fn() -> T>,
}

impl<T: Any + Send + Sync> Shared<T> {
    /// Allocate a new shared object.
    pub fn new(value: T) -> Self {
        Self {
            cell: new_cell(value),
            _marker: PhantomData,
        }
    }

    /// Wrap an existing cell if it holds a `T`.
    pub fn from_cell(cell: NativeCell) -> Option<Self> {
        let holds_t = cell.read().is::<T>();
        holds_t.then_some(Self {
            cell,
            _marker: PhantomData,
        })
    }

    /// Borrow the value.
    pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> Option<R> {
        let guard = self.cell.read();
        guard.downcast_ref::<T>().map(f)
    }

    /// Mutably borrow the value.
    pub fn with_mut<R>(&self, f: impl FnOnce(&mut T) -> R) -> Option<R> {
        let mut guard = self.cell.write();
        guard.downcast_mut::<T>().map(f)
    }

    /// The underlying cell.
    pub fn cell(&self) -> &NativeCell {
        &self.cell
    }

    /// Unwrap into the underlying cell.
    pub fn into_cell(self) -> NativeCell {
        self.cell
    }

    /// Identity comparison.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.cell, &other.cell)
    }

    /// Number of strong owners (native clones plus dynamic-side holders).
    pub fn owner_count(&self) -> usize {
        Arc::strong_count(&self.cell)
    }
}

impl<T> Clone for Shared<T> {
    fn clone(&self) -> Self {
        Self {
            cell: Arc::clone(&self.cell),
            _marker: PhantomData,
        }
    }
}

impl<T> fmt::Debug for Shared<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Shared")
            .field("type", &std::any::type_name::<T>())
            .field("owners", &Arc::strong_count(&self.cell))
            .finish()
    }
}
