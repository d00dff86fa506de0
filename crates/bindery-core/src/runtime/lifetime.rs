//! Object lifetime management across the boundary.
//!
//! Native objects live in [`NativeCell`]s. When a cell crosses to the dynamic
//! side it is adopted by the [`LifetimeManager`], which hands out an
//! [`InstanceHandle`] tagged with how the dynamic side holds the object:
//!
//! - `Owning`: the dynamic side owns it; releasing the handle runs the
//!   destructor hook and drops the object, exactly once.
//! - `Reference`: native code owns it; releasing is a no-op.
//! - `Shared`: ownership is shared; the object is destroyed when the last
//!   shared handle is released.
//!
//! Storage is a generational slot arena: a freed slot bumps its generation, so
//! stale handles are detected instead of aliasing a new object.

use std::any::Any;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::{Mutex, RwLock};
use rustc_hash::FxHashMap;
use smallvec::SmallVec;
use tracing::{debug, warn};

use crate::entries::{HolderKind, TypeRecord};
use crate::error::LifetimeViolation;
use crate::TypeHash;

use super::BoundaryLock;

/// Shared storage for one native object.
pub type NativeCell = Arc<RwLock<Box<dyn Any + Send + Sync>>>;

type WeakCell = Weak<RwLock<Box<dyn Any + Send + Sync>>>;

/// Allocate a cell holding `value`.
pub fn new_cell<T: Any + Send + Sync>(value: T) -> NativeCell {
    Arc::new(RwLock::new(Box::new(value)))
}

fn cell_address(cell: &NativeCell) -> usize {
    Arc::as_ptr(cell) as *const () as usize
}

static NEXT_MANAGER_ID: AtomicU64 = AtomicU64::new(1);

/// How the dynamic side holds an adopted object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LifetimeTag {
    /// Exclusive ownership.
    Owning,
    /// Non-owning view of a native-owned object.
    Reference,
    /// Shared ownership.
    Shared,
}

impl LifetimeTag {
    fn is_owner(self) -> bool {
        !matches!(self, LifetimeTag::Reference)
    }
}

/// Per-slot lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotState {
    /// The object is alive.
    Live,
    /// The destructor hook is running.
    PendingDestroy,
    /// The object is gone; remaining handles are stale.
    Destroyed,
}

/// Result of releasing a handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReleaseOutcome {
    /// The handle was non-owning; nothing was destroyed.
    Released,
    /// A shared owner went away; others remain.
    Decremented {
        /// Owners still holding the object.
        remaining: usize,
    },
    /// The object was destroyed.
    Destroyed,
}

/// A dynamic-side claim on a native object.
#[derive(Debug, Clone)]
pub struct InstanceHandle {
    id: u64,
    manager: u64,
    index: u32,
    generation: u32,
    tag: LifetimeTag,
    record: Arc<TypeRecord>,
    keep_alive_of: Option<u64>,
}

impl InstanceHandle {
    /// Unique handle id.
    pub fn id(&self) -> u64 {
        self.id
    }

    /// The lifetime tag.
    pub fn tag(&self) -> LifetimeTag {
        self.tag
    }

    /// The adopted object's type record.
    pub fn record(&self) -> &Arc<TypeRecord> {
        &self.record
    }

    /// Name-level identity of the adopted object's type.
    pub fn type_hash(&self) -> TypeHash {
        self.record.hash
    }

    /// Handle id this instance depends on, if any.
    pub fn keep_alive_of(&self) -> Option<u64> {
        self.keep_alive_of
    }
}

enum CellRef {
    Strong(NativeCell),
    Weak(WeakCell),
}

impl CellRef {
    fn holds(&self, cell: &NativeCell) -> bool {
        match self {
            CellRef::Strong(c) => Arc::ptr_eq(c, cell),
            CellRef::Weak(w) => w.upgrade().is_some_and(|c| Arc::ptr_eq(&c, cell)),
        }
    }
}

struct Slot {
    generation: u32,
    state: SlotState,
    cell: Option<CellRef>,
    address: usize,
    owners: usize,
    handles: SmallVec<[u64; 2]>,
}

#[derive(Clone, Copy)]
struct HandleEntry {
    index: u32,
    generation: u32,
    tag: LifetimeTag,
}

#[derive(Default)]
struct Heap {
    slots: Vec<Slot>,
    free_list: Vec<u32>,
    by_address: FxHashMap<usize, u32>,
    live_handles: FxHashMap<u64, HandleEntry>,
    next_id: u64,
}

impl Heap {
    fn free_slot(&mut self, index: u32) {
        let slot = &mut self.slots[index as usize];
        slot.cell = None;
        slot.state = SlotState::Destroyed;
        slot.generation = slot.generation.wrapping_add(1);
        if self.by_address.get(&slot.address) == Some(&index) {
            self.by_address.remove(&slot.address);
        }
        self.free_list.push(index);
    }
}

/// Tracks every native object visible to the dynamic side.
pub struct LifetimeManager {
    id: u64,
    heap: Mutex<Heap>,
    boundary: Arc<BoundaryLock>,
}

impl LifetimeManager {
    /// Create a manager whose destructor hooks run under `boundary`.
    pub fn new(boundary: Arc<BoundaryLock>) -> Self {
        Self {
            id: NEXT_MANAGER_ID.fetch_add(1, Ordering::Relaxed),
            heap: Mutex::new(Heap {
                next_id: 1,
                ..Heap::default()
            }),
            boundary,
        }
    }

    /// The boundary lock destructors run under.
    pub fn boundary(&self) -> &Arc<BoundaryLock> {
        &self.boundary
    }

    /// Adopt a native cell, returning a new handle.
    ///
    /// A cell that is already live joins its existing slot, so the same
    /// native object is never tracked twice.
    pub fn adopt(
        &self,
        cell: NativeCell,
        record: Arc<TypeRecord>,
        tag: LifetimeTag,
        keep_alive_of: Option<&InstanceHandle>,
    ) -> InstanceHandle {
        let address = cell_address(&cell);
        let mut heap = self.heap.lock();
        let id = heap.next_id;
        heap.next_id += 1;

        let existing = heap.by_address.get(&address).copied().filter(|&index| {
            let slot = &heap.slots[index as usize];
            slot.state == SlotState::Live && slot.cell.as_ref().is_some_and(|c| c.holds(&cell))
        });

        let index = match existing {
            Some(index) => {
                let slot = &mut heap.slots[index as usize];
                slot.handles.push(id);
                if tag.is_owner() {
                    slot.owners += 1;
                    if matches!(slot.cell, Some(CellRef::Weak(_))) {
                        slot.cell = Some(CellRef::Strong(cell));
                    }
                }
                index
            }
            None => {
                let cell_ref = if tag.is_owner() {
                    CellRef::Strong(cell)
                } else {
                    CellRef::Weak(Arc::downgrade(&cell))
                };
                let slot = Slot {
                    generation: 0,
                    state: SlotState::Live,
                    cell: Some(cell_ref),
                    address,
                    owners: usize::from(tag.is_owner()),
                    handles: SmallVec::from_elem(id, 1),
                };
                let index = match heap.free_list.pop() {
                    Some(index) => {
                        let generation = heap.slots[index as usize].generation;
                        heap.slots[index as usize] = Slot { generation, ..slot };
                        index
                    }
                    None => {
                        heap.slots.push(slot);
                        (heap.slots.len() - 1) as u32
                    }
                };
                heap.by_address.insert(address, index);
                index
            }
        };

        let generation = heap.slots[index as usize].generation;
        heap.live_handles.insert(
            id,
            HandleEntry {
                index,
                generation,
                tag,
            },
        );
        debug!(
            handle = id,
            slot = index,
            type_name = %record.name,
            ?tag,
            joined = existing.is_some(),
            "adopted instance"
        );

        InstanceHandle {
            id,
            manager: self.id,
            index,
            generation,
            tag,
            record,
            keep_alive_of: keep_alive_of.map(|h| h.id),
        }
    }

    fn check_owner(&self, heap: &Heap, handle: &InstanceHandle) -> Result<(), LifetimeViolation> {
        if handle.manager != self.id || handle.id == 0 || handle.id >= heap.next_id {
            warn!(handle = handle.id, "unknown instance handle");
            return Err(LifetimeViolation::UnknownHandle { handle: handle.id });
        }
        Ok(())
    }

    fn use_after_destroy(handle: &InstanceHandle) -> LifetimeViolation {
        warn!(handle = handle.id, type_name = %handle.record.name, "use after destroy");
        LifetimeViolation::UseAfterDestroy {
            handle: handle.id,
            type_name: handle.record.name.clone(),
        }
    }

    /// Get the native cell behind a live handle.
    pub fn get(&self, handle: &InstanceHandle) -> Result<NativeCell, LifetimeViolation> {
        let heap = self.heap.lock();
        self.check_owner(&heap, handle)?;
        let Some(entry) = heap.live_handles.get(&handle.id) else {
            return Err(Self::use_after_destroy(handle));
        };
        let slot = &heap.slots[entry.index as usize];
        if slot.generation != entry.generation || slot.state != SlotState::Live {
            return Err(Self::use_after_destroy(handle));
        }
        match &slot.cell {
            Some(CellRef::Strong(cell)) => Ok(Arc::clone(cell)),
            Some(CellRef::Weak(weak)) => weak.upgrade().ok_or_else(|| Self::use_after_destroy(handle)),
            None => Err(Self::use_after_destroy(handle)),
        }
    }

    /// Lifecycle state of the handle's slot, or `None` once the handle is released.
    pub fn state(&self, handle: &InstanceHandle) -> Option<SlotState> {
        let heap = self.heap.lock();
        let entry = heap.live_handles.get(&handle.id)?;
        let slot = &heap.slots[entry.index as usize];
        (slot.generation == entry.generation).then_some(slot.state)
    }

    /// Release a handle according to its lifetime tag.
    pub fn release(&self, handle: &InstanceHandle) -> Result<ReleaseOutcome, LifetimeViolation> {
        let (outcome, doomed) = {
            let mut heap = self.heap.lock();
            self.check_owner(&heap, handle)?;
            let Some(entry) = heap.live_handles.remove(&handle.id) else {
                warn!(handle = handle.id, type_name = %handle.record.name, "double release");
                return Err(LifetimeViolation::DoubleRelease { handle: handle.id });
            };

            let slot = &mut heap.slots[entry.index as usize];
            if slot.generation != entry.generation {
                return Ok(ReleaseOutcome::Released);
            }
            slot.handles.retain(|h| *h != handle.id);

            let mut doomed = None;
            let outcome = match entry.tag {
                LifetimeTag::Reference => ReleaseOutcome::Released,
                LifetimeTag::Owning | LifetimeTag::Shared => {
                    slot.owners = slot.owners.saturating_sub(1);
                    let destroy = entry.tag == LifetimeTag::Owning || slot.owners == 0;
                    if destroy && slot.state == SlotState::Live {
                        slot.state = SlotState::PendingDestroy;
                        if let Some(CellRef::Strong(cell)) = slot.cell.take() {
                            doomed = Some(cell);
                        }
                        ReleaseOutcome::Destroyed
                    } else if destroy {
                        ReleaseOutcome::Released
                    } else {
                        ReleaseOutcome::Decremented {
                            remaining: slot.owners,
                        }
                    }
                }
            };

            let address = slot.address;
            let pending = slot.state == SlotState::PendingDestroy;
            let empty = slot.handles.is_empty();
            if pending && heap.by_address.get(&address) == Some(&entry.index) {
                heap.by_address.remove(&address);
            }
            if empty && !pending {
                heap.free_slot(entry.index);
            }
            (outcome, doomed.map(|cell| (cell, entry)))
        };

        debug!(handle = handle.id, type_name = %handle.record.name, ?outcome, "released instance");

        if let Some((cell, entry)) = doomed {
            self.destroy(cell, handle);
            let mut heap = self.heap.lock();
            let slot = &mut heap.slots[entry.index as usize];
            if slot.generation == entry.generation {
                slot.state = SlotState::Destroyed;
                if slot.handles.is_empty() {
                    heap.free_slot(entry.index);
                }
            }
        }
        Ok(outcome)
    }

    // Runs outside the heap mutex so a destructor may re-enter the manager.
    fn destroy(&self, cell: NativeCell, handle: &InstanceHandle) {
        let record = &handle.record;
        let run_hook = match record.holder {
            HolderKind::Raw => false,
            HolderKind::Owning | HolderKind::Shared => {
                handle.tag == LifetimeTag::Owning || Arc::strong_count(&cell) == 1
            }
        };
        if let Some(hook) = record.destructor().filter(|_| run_hook) {
            let _boundary = self.boundary.acquire();
            let mut value = cell.write();
            hook(&mut **value);
        }
        debug!(handle = handle.id, type_name = %record.name, "destroyed instance");
        drop(cell);
    }

    /// Number of slots holding a live object.
    pub fn live_objects(&self) -> usize {
        self.heap
            .lock()
            .slots
            .iter()
            .filter(|s| s.state == SlotState::Live && s.cell.is_some())
            .count()
    }

    /// Number of unreleased handles.
    pub fn live_handles(&self) -> usize {
        self.heap.lock().live_handles.len()
    }

    /// Number of unreleased handles sharing `handle`'s object.
    pub fn handles_for(&self, handle: &InstanceHandle) -> usize {
        let heap = self.heap.lock();
        heap.live_handles
            .get(&handle.id)
            .map(|entry| heap.slots[entry.index as usize].handles.len())
            .unwrap_or(0)
    }
}

impl std::fmt::Debug for LifetimeManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let heap = self.heap.lock();
        f.debug_struct("LifetimeManager")
            .field("id", &self.id)
            .field("slot_count", &heap.slots.len())
            .field("free_count", &heap.free_list.len())
            .field("live_handles", &heap.live_handles.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entries::DestructorHook;
    use std::sync::atomic::AtomicUsize;

    struct Probe(u32);

    fn manager() -> LifetimeManager {
        LifetimeManager::new(Arc::new(BoundaryLock::new()))
    }

    fn counting_record(holder: HolderKind, counter: Arc<AtomicUsize>) -> Arc<TypeRecord> {
        let hook: DestructorHook = Arc::new(move |_obj: &mut dyn Any| {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        Arc::new(
            TypeRecord::named::<Probe>("Probe")
                .with_holder(holder)
                .with_destructor(hook),
        )
    }

    #[test]
    fn owning_release_destroys_once() {
        let hits = Arc::new(AtomicUsize::new(0));
        let record = counting_record(HolderKind::Owning, Arc::clone(&hits));
        let mgr = manager();

        let handle = mgr.adopt(new_cell(Probe(1)), record, LifetimeTag::Owning, None);
        assert_eq!(mgr.release(&handle), Ok(ReleaseOutcome::Destroyed));
        assert_eq!(hits.load(Ordering::SeqCst), 1);

        assert_eq!(
            mgr.release(&handle),
            Err(LifetimeViolation::DoubleRelease { handle: handle.id() })
        );
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn reference_release_is_noop() {
        let hits = Arc::new(AtomicUsize::new(0));
        let record = counting_record(HolderKind::Owning, Arc::clone(&hits));
        let mgr = manager();
        let cell = new_cell(Probe(2));

        let handle = mgr.adopt(Arc::clone(&cell), record, LifetimeTag::Reference, None);
        assert_eq!(mgr.release(&handle), Ok(ReleaseOutcome::Released));
        assert_eq!(hits.load(Ordering::SeqCst), 0);
        assert_eq!(Arc::strong_count(&cell), 1);
    }

    #[test]
    fn shared_destroys_on_last_release() {
        let hits = Arc::new(AtomicUsize::new(0));
        let record = counting_record(HolderKind::Shared, Arc::clone(&hits));
        let mgr = manager();
        let cell = new_cell(Probe(3));

        let a = mgr.adopt(Arc::clone(&cell), Arc::clone(&record), LifetimeTag::Shared, None);
        let b = mgr.adopt(Arc::clone(&cell), record, LifetimeTag::Shared, None);
        assert_eq!(mgr.handles_for(&a), 2);
        drop(cell);

        assert_eq!(mgr.release(&a), Ok(ReleaseOutcome::Decremented { remaining: 1 }));
        assert_eq!(hits.load(Ordering::SeqCst), 0);
        assert_eq!(mgr.release(&b), Ok(ReleaseOutcome::Destroyed));
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn shared_hook_skipped_while_native_holds_cell() {
        let hits = Arc::new(AtomicUsize::new(0));
        let record = counting_record(HolderKind::Shared, Arc::clone(&hits));
        let mgr = manager();
        let cell = new_cell(Probe(4));

        let handle = mgr.adopt(Arc::clone(&cell), record, LifetimeTag::Shared, None);
        assert_eq!(mgr.release(&handle), Ok(ReleaseOutcome::Destroyed));
        assert_eq!(hits.load(Ordering::SeqCst), 0);
        assert_eq!(Arc::strong_count(&cell), 1);
    }

    #[test]
    fn access_after_destroy_is_violation() {
        let mgr = manager();
        let record = Arc::new(TypeRecord::named::<Probe>("Probe"));
        let cell = new_cell(Probe(5));

        let owner = mgr.adopt(Arc::clone(&cell), Arc::clone(&record), LifetimeTag::Owning, None);
        let view = mgr.adopt(cell, record, LifetimeTag::Reference, None);
        assert!(mgr.get(&view).is_ok());

        mgr.release(&owner).unwrap();
        assert_eq!(mgr.state(&view), Some(SlotState::Destroyed));
        assert!(matches!(
            mgr.get(&view),
            Err(LifetimeViolation::UseAfterDestroy { .. })
        ));
        assert_eq!(mgr.release(&view), Ok(ReleaseOutcome::Released));
    }

    #[test]
    fn reference_to_dropped_native_object() {
        let mgr = manager();
        let record = Arc::new(TypeRecord::named::<Probe>("Probe"));
        let cell = new_cell(Probe(6));
        let handle = mgr.adopt(Arc::clone(&cell), record, LifetimeTag::Reference, None);
        drop(cell);
        assert!(matches!(
            mgr.get(&handle),
            Err(LifetimeViolation::UseAfterDestroy { .. })
        ));
    }

    #[test]
    fn handles_from_other_manager_are_unknown() {
        let a = manager();
        let b = manager();
        let record = Arc::new(TypeRecord::named::<Probe>("Probe"));
        let handle = a.adopt(new_cell(Probe(7)), record, LifetimeTag::Owning, None);
        assert_eq!(
            b.release(&handle),
            Err(LifetimeViolation::UnknownHandle { handle: handle.id() })
        );
    }

    #[test]
    fn slots_are_reused_with_new_generation() {
        let mgr = manager();
        let record = Arc::new(TypeRecord::named::<Probe>("Probe"));
        let first = mgr.adopt(new_cell(Probe(8)), Arc::clone(&record), LifetimeTag::Owning, None);
        mgr.release(&first).unwrap();
        let second = mgr.adopt(new_cell(Probe(9)), record, LifetimeTag::Owning, None);

        assert_eq!(first.index, second.index);
        assert_ne!(first.generation, second.generation);
        assert_eq!(mgr.live_objects(), 1);
        assert!(mgr.get(&first).is_err());
    }

    #[test]
    fn raw_holder_skips_hook() {
        let hits = Arc::new(AtomicUsize::new(0));
        let record = counting_record(HolderKind::Raw, Arc::clone(&hits));
        let mgr = manager();
        let handle = mgr.adopt(new_cell(Probe(10)), record, LifetimeTag::Owning, None);
        assert_eq!(mgr.release(&handle), Ok(ReleaseOutcome::Destroyed));
        assert_eq!(hits.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn keep_alive_target_is_recorded() {
        let mgr = manager();
        let record = Arc::new(TypeRecord::named::<Probe>("Probe"));
        let parent = mgr.adopt(new_cell(Probe(11)), Arc::clone(&record), LifetimeTag::Owning, None);
        let child = mgr.adopt(new_cell(Probe(12)), record, LifetimeTag::Owning, Some(&parent));
        assert_eq!(child.keep_alive_of(), Some(parent.id()));
    }
}
