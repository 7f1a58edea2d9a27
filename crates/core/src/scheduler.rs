//! The thread scheduler: a bijection between `(process, thread)` and core
//! slots (spec.md C8).
//!
//! A trace's `NewThread`/`ThreadFinishing` messages drive allocation and
//! deallocation of the fixed pool of core slots. Allocation is first-fit:
//! the lowest-numbered free slot is handed out. One coarse mutex guards the
//! whole pool — thread (de)allocation is rare relative to memory
//! references, so there is nothing to gain from finer-grained locking here
//! (unlike the per-set locking the cache banks need).

use std::sync::Mutex;

use crate::common::error::{CoreError, Result, ThreadId};

/// Allocates and tracks core slots for live threads.
#[derive(Debug)]
pub struct ThreadScheduler {
    num_cores: usize,
    slots: Mutex<Vec<Option<ThreadId>>>,
}

impl ThreadScheduler {
    /// Creates a scheduler over `num_cores` slots, all initially free.
    #[must_use]
    pub fn new(num_cores: usize) -> Self {
        Self {
            num_cores,
            slots: Mutex::new(vec![None; num_cores]),
        }
    }

    /// Allocates the lowest-numbered free slot to `thread`.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::PoolExhausted`] if every slot is occupied.
    ///
    /// # Panics
    ///
    /// Panics if the pool's mutex is poisoned.
    pub fn alloc(&self, thread: ThreadId) -> Result<usize> {
        let mut slots = self.slots.lock().expect("thread scheduler mutex poisoned");
        let free = slots
            .iter()
            .position(Option::is_none)
            .ok_or(CoreError::PoolExhausted(thread))?;
        slots[free] = Some(thread);
        Ok(free)
    }

    /// Frees the slot occupied by `thread`, if any; a no-op if the thread
    /// holds no slot.
    ///
    /// # Panics
    ///
    /// Panics if the pool's mutex is poisoned.
    pub fn dealloc(&self, thread: ThreadId) {
        let mut slots = self.slots.lock().expect("thread scheduler mutex poisoned");
        if let Some(slot) = slots.iter().position(|s| *s == Some(thread)) {
            slots[slot] = None;
        }
    }

    /// The slot currently occupied by `thread`, if any.
    ///
    /// # Panics
    ///
    /// Panics if the pool's mutex is poisoned.
    #[must_use]
    pub fn slot_of(&self, thread: ThreadId) -> Option<usize> {
        let slots = self.slots.lock().expect("thread scheduler mutex poisoned");
        slots.iter().position(|s| *s == Some(thread))
    }

    /// Number of slots currently occupied.
    ///
    /// # Panics
    ///
    /// Panics if the pool's mutex is poisoned.
    #[must_use]
    pub fn occupied(&self) -> usize {
        let slots = self.slots.lock().expect("thread scheduler mutex poisoned");
        slots.iter().filter(|s| s.is_some()).count()
    }

    /// Total slot count.
    #[must_use]
    pub const fn capacity(&self) -> usize {
        self.num_cores
    }

    /// Every currently-occupied `(slot, thread)` pair, ordered by slot
    /// number, for the report's thread-to-core mapping section.
    ///
    /// # Panics
    ///
    /// Panics if the pool's mutex is poisoned.
    #[must_use]
    pub fn mapping(&self) -> Vec<(usize, ThreadId)> {
        let slots = self.slots.lock().expect("thread scheduler mutex poisoned");
        slots
            .iter()
            .enumerate()
            .filter_map(|(slot, thread)| thread.map(|t| (slot, t)))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use proptest::prelude::*;

    use super::ThreadScheduler;
    use crate::common::error::{CoreError, ThreadId};

    #[test]
    fn allocates_lowest_free_slot_first() {
        let scheduler = ThreadScheduler::new(4);
        assert_eq!(scheduler.alloc(ThreadId::new(1, 0)).unwrap(), 0);
        assert_eq!(scheduler.alloc(ThreadId::new(1, 1)).unwrap(), 1);
    }

    #[test]
    fn dealloc_frees_the_slot_for_reuse() {
        let scheduler = ThreadScheduler::new(2);
        scheduler.alloc(ThreadId::new(1, 0)).unwrap();
        scheduler.alloc(ThreadId::new(1, 1)).unwrap();
        scheduler.dealloc(ThreadId::new(1, 0));
        assert_eq!(scheduler.alloc(ThreadId::new(1, 2)).unwrap(), 0);
    }

    #[test]
    fn exhausted_pool_reports_the_blocking_thread() {
        let scheduler = ThreadScheduler::new(1);
        scheduler.alloc(ThreadId::new(1, 0)).unwrap();
        let err = scheduler.alloc(ThreadId::new(1, 1)).unwrap_err();
        assert_eq!(err, CoreError::PoolExhausted(ThreadId::new(1, 1)));
    }

    #[test]
    fn slot_of_reflects_current_allocation() {
        let scheduler = ThreadScheduler::new(2);
        let thread = ThreadId::new(2, 0);
        assert_eq!(scheduler.slot_of(thread), None);
        scheduler.alloc(thread).unwrap();
        assert_eq!(scheduler.slot_of(thread), Some(0));
    }

    #[test]
    fn mapping_lists_only_occupied_slots() {
        let scheduler = ThreadScheduler::new(3);
        let a = ThreadId::new(1, 0);
        let b = ThreadId::new(2, 0);
        scheduler.alloc(a).unwrap();
        scheduler.alloc(b).unwrap();
        assert_eq!(scheduler.mapping(), vec![(0, a), (1, b)]);
    }

    proptest! {
        /// After any sequence of alloc/dealloc calls, the scheduler's
        /// occupancy exactly mirrors the set of threads a reference model
        /// believes are currently allocated: same count, same thread
        /// identities, no slot shared by two threads (spec.md §8 property 7).
        #[test]
        fn occupancy_matches_the_process_thread_to_slot_map(
            ops in prop::collection::vec((prop::bool::ANY, 0u32..6), 0..200),
        ) {
            let num_cores = 4;
            let scheduler = ThreadScheduler::new(num_cores);
            let mut model: HashSet<ThreadId> = HashSet::new();

            for (is_alloc, id) in ops {
                let thread = ThreadId::new(1, id);
                if is_alloc {
                    if !model.contains(&thread) && model.len() < num_cores {
                        scheduler.alloc(thread).unwrap();
                        model.insert(thread);
                    }
                } else if model.remove(&thread) {
                    scheduler.dealloc(thread);
                }
            }

            let mapping = scheduler.mapping();
            let mapped_threads: HashSet<ThreadId> = mapping.iter().map(|(_, t)| *t).collect();
            let mapped_slots: HashSet<usize> = mapping.iter().map(|(slot, _)| *slot).collect();

            prop_assert_eq!(mapped_threads, model.clone());
            prop_assert_eq!(mapping.len(), mapped_slots.len());
            prop_assert_eq!(scheduler.occupied(), model.len());
            for thread in &model {
                prop_assert!(scheduler.slot_of(*thread).is_some());
            }
        }
    }
}
