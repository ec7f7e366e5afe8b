//! Concurrency primitives: the parallel-region flag and per-thread slot
//! tables.

use std::cell::UnsafeCell;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::RwLock;
use std::thread::ThreadId;

static PARALLEL_REGIONS: AtomicUsize = AtomicUsize::new(0);

/// Whether any [`ParallelRegion`] guard is currently alive in the process.
///
/// Single-thread-only checkpoints use this to detect misuse; it is also the
/// precondition check of checkpoint construction. Drivers that run tapir
/// work on their own thread pools are expected to hold a guard for the
/// lifetime of the pool.
#[inline]
pub fn in_parallel() -> bool {
    PARALLEL_REGIONS.load(Ordering::Relaxed) > 0
}

/// RAII guard marking a region of parallel execution.
///
/// The crate's own rayon helpers enter one; tests use it as a concurrency
/// detector double.
pub struct ParallelRegion(());

impl ParallelRegion {
    pub fn enter() -> Self {
        PARALLEL_REGIONS.fetch_add(1, Ordering::Relaxed);
        ParallelRegion(())
    }
}

impl Drop for ParallelRegion {
    fn drop(&mut self) {
        PARALLEL_REGIONS.fetch_sub(1, Ordering::Relaxed);
    }
}

/// A lazily-populated table of per-thread slots owned by one object.
///
/// `lookup_or_insert` is the only operation: it resolves the calling
/// thread's slot, allocating it on first access (idempotent thereafter).
/// There is no locking around slot *contents*; the map lock covers only
/// the lookup/insert itself. Each slot is keyed by the creating thread's
/// id, and the caller contract forbids dereferencing another thread's
/// pointer.
pub(crate) struct ThreadSlots<T> {
    slots: RwLock<HashMap<ThreadId, Box<UnsafeCell<T>>>>,
}

impl<T: Default> ThreadSlots<T> {
    pub(crate) fn new() -> Self {
        ThreadSlots {
            slots: RwLock::new(HashMap::new()),
        }
    }

    /// Pointer to the calling thread's slot, allocated on first use.
    ///
    /// The pointer stays valid until the table is dropped (slots are boxed,
    /// so rehashing never moves them). Callers must only dereference it on
    /// the thread that obtained it.
    pub(crate) fn lookup_or_insert(&self) -> *mut T {
        let id = std::thread::current().id();
        if let Some(slot) = self.slots.read().unwrap().get(&id) {
            return slot.get();
        }
        let mut map = self.slots.write().unwrap();
        map.entry(id).or_insert_with(Default::default).get()
    }

    /// Number of threads that have allocated a slot.
    #[allow(dead_code)]
    pub(crate) fn len(&self) -> usize {
        self.slots.read().unwrap().len()
    }
}

// SAFETY: every slot is written and read only by the thread whose id keys
// it, so handing the table across threads cannot alias mutable state.
unsafe impl<T: Send> Send for ThreadSlots<T> {}
unsafe impl<T: Send> Sync for ThreadSlots<T> {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn region_guard_nests() {
        assert!(!in_parallel());
        {
            let _outer = ParallelRegion::enter();
            assert!(in_parallel());
            {
                let _inner = ParallelRegion::enter();
                assert!(in_parallel());
            }
            assert!(in_parallel());
        }
        assert!(!in_parallel());
    }

    #[test]
    fn slots_are_per_thread() {
        let table: ThreadSlots<u32> = ThreadSlots::new();
        let p1 = table.lookup_or_insert();
        let p2 = table.lookup_or_insert();
        assert_eq!(p1, p2);
        unsafe { *p1 = 7 };

        let p1_addr = p1 as usize;
        std::thread::scope(|s| {
            let table = &table;
            s.spawn(move || {
                let q = table.lookup_or_insert();
                assert_ne!(q as usize, p1_addr);
                // Fresh slot, default value.
                assert_eq!(unsafe { *q }, 0);
            });
        });
        assert_eq!(unsafe { *p1 }, 7);
        assert_eq!(table.len(), 2);
    }
}
