//! The re-entrant boundary lock.
//!
//! Exactly one thread may be "inside" the boundary at a time. A thread that
//! already holds the lock may enter again (a native call that calls back into
//! a dynamic override, which calls native code again). Native code releases the
//! lock around blocking work with [`BoundaryLock::allow_threads`].

use std::thread::{self, ThreadId};

use parking_lot::{Condvar, Mutex};
use tracing::trace;

#[derive(Debug, Default)]
struct LockState {
    owner: Option<ThreadId>,
    depth: usize,
}

/// Re-entrant lock guarding every boundary crossing.
#[derive(Debug, Default)]
pub struct BoundaryLock {
    state: Mutex<LockState>,
    released: Condvar,
}

impl BoundaryLock {
    /// Create an unheld lock.
    pub fn new() -> Self {
        Self::default()
    }

    /// Enter the boundary, blocking while another thread holds it.
    pub fn acquire(&self) -> BoundaryGuard<'_> {
        let me = thread::current().id();
        let mut state = self.state.lock();
        loop {
            match state.owner {
                None => {
                    state.owner = Some(me);
                    state.depth = 1;
                    break;
                }
                Some(owner) if owner == me => {
                    state.depth += 1;
                    break;
                }
                Some(_) => self.released.wait(&mut state),
            }
        }
        trace!(depth = state.depth, "boundary acquired");
        BoundaryGuard { lock: self }
    }

    /// Check if the calling thread currently holds the lock.
    pub fn is_held_by_current_thread(&self) -> bool {
        self.state.lock().owner == Some(thread::current().id())
    }

    /// Current re-entrancy depth of the holder (0 when unheld).
    pub fn depth(&self) -> usize {
        self.state.lock().depth
    }

    /// Run `f` with the lock fully released, then restore the previous depth.
    ///
    /// If the calling thread does not hold the lock, `f` simply runs.
    pub fn allow_threads<R>(&self, f: impl FnOnce() -> R) -> R {
        let me = thread::current().id();
        let saved = {
            let mut state = self.state.lock();
            if state.owner == Some(me) {
                let saved = state.depth;
                state.owner = None;
                state.depth = 0;
                Some(saved)
            } else {
                None
            }
        };
        let Some(saved) = saved else {
            return f();
        };
        self.released.notify_all();
        trace!(saved_depth = saved, "boundary released for blocking work");

        let _restore = Restore { lock: self, depth: saved };
        f()
    }

    fn release_one(&self) {
        let mut state = self.state.lock();
        state.depth = state.depth.saturating_sub(1);
        if state.depth == 0 {
            state.owner = None;
            drop(state);
            self.released.notify_one();
        }
    }

    fn reacquire(&self, depth: usize) {
        let me = thread::current().id();
        let mut state = self.state.lock();
        while state.owner.is_some() {
            self.released.wait(&mut state);
        }
        state.owner = Some(me);
        state.depth = depth;
    }
}

/// Proof that the current thread is inside the boundary.
#[must_use = "the boundary is released when the guard is dropped"]
pub struct BoundaryGuard<'a> {
    lock: &'a BoundaryLock,
}

impl Drop for BoundaryGuard<'_> {
    fn drop(&mut self) {
        self.lock.release_one();
    }
}

// Reacquires on the way out of `allow_threads`, including on unwind.
struct Restore<'a> {
    lock: &'a BoundaryLock,
    depth: usize,
}

impl Drop for Restore<'_> {
    fn drop(&mut self) {
        self.lock.reacquire(self.depth);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::time::Duration;

    #[test]
    fn reentrant_acquire() {
        let lock = BoundaryLock::new();
        let outer = lock.acquire();
        {
            let _inner = lock.acquire();
            assert_eq!(lock.depth(), 2);
        }
        assert_eq!(lock.depth(), 1);
        drop(outer);
        assert_eq!(lock.depth(), 0);
        assert!(!lock.is_held_by_current_thread());
    }

    #[test]
    fn allow_threads_restores_depth() {
        let lock = BoundaryLock::new();
        let _a = lock.acquire();
        let _b = lock.acquire();
        let inside = lock.allow_threads(|| lock.is_held_by_current_thread());
        assert!(!inside);
        assert_eq!(lock.depth(), 2);
        assert!(lock.is_held_by_current_thread());
    }

    #[test]
    fn allow_threads_without_lock_runs() {
        let lock = BoundaryLock::new();
        assert_eq!(lock.allow_threads(|| 7), 7);
        assert_eq!(lock.depth(), 0);
    }

    #[test]
    fn other_thread_enters_during_allow_threads() {
        let lock = Arc::new(BoundaryLock::new());
        let entered = Arc::new(AtomicBool::new(false));
        let _guard = lock.acquire();

        lock.allow_threads(|| {
            let lock2 = Arc::clone(&lock);
            let entered2 = Arc::clone(&entered);
            std::thread::spawn(move || {
                let _g = lock2.acquire();
                entered2.store(true, Ordering::SeqCst);
            })
            .join()
            .unwrap();
        });

        assert!(entered.load(Ordering::SeqCst));
        assert!(lock.is_held_by_current_thread());
    }

    #[test]
    fn second_thread_waits_for_release() {
        let lock = Arc::new(BoundaryLock::new());
        let guard = lock.acquire();
        let flag = Arc::new(AtomicBool::new(false));

        let handle = {
            let lock = Arc::clone(&lock);
            let flag = Arc::clone(&flag);
            std::thread::spawn(move || {
                let _g = lock.acquire();
                flag.store(true, Ordering::SeqCst);
            })
        };

        std::thread::sleep(Duration::from_millis(20));
        assert!(!flag.load(Ordering::SeqCst));
        drop(guard);
        handle.join().unwrap();
        assert!(flag.load(Ordering::SeqCst));
    }
}
