//! Translation Lookaside Buffer.
//!
//! A private, per-core, set-associative cache of virtual-to-physical page
//! mappings (spec.md §4.6). It decomposes addresses exactly like a data
//! cache bank, just with `page_size` in place of `block_size` and a mapped
//! frame number carried alongside the tag instead of a dirty bit.
//!
//! Entries are matched on `(owner_process, tag)`, the same process-scoped
//! geometry a data bank uses (spec.md §4.3): two processes resident on the
//! same core and touching the same virtual page must not hit each other's
//! mapping.

use std::sync::Mutex;

use crate::common::addr::{self, Decomposed};
use crate::common::error::{CoreError, Result};

#[derive(Debug, Clone, Copy)]
struct TlbEntry {
    tag: u64,
    owner_process: u32,
    frame: u64,
    valid: bool,
    last_used: u64,
}

impl TlbEntry {
    const fn empty() -> Self {
        Self {
            tag: 0,
            owner_process: 0,
            frame: 0,
            valid: false,
            last_used: 0,
        }
    }
}

/// A per-core TLB.
#[derive(Debug)]
pub struct Tlb {
    num_sets: usize,
    page_size: usize,
    sets: Vec<Mutex<Vec<TlbEntry>>>,
}

impl Tlb {
    /// Creates a new TLB.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::ConfigurationInvalid`] if `num_sets` is not a
    /// power of two or either dimension is zero.
    pub fn new(num_sets: usize, num_ways: usize, page_size: usize) -> Result<Self> {
        if num_sets == 0 || num_ways == 0 || page_size == 0 {
            return Err(CoreError::ConfigurationInvalid(
                "tlb dimensions must be nonzero".into(),
            ));
        }
        if !num_sets.is_power_of_two() {
            return Err(CoreError::ConfigurationInvalid(format!(
                "tlb num_sets {num_sets} is not a power of two"
            )));
        }
        Ok(Self {
            num_sets,
            page_size,
            sets: (0..num_sets)
                .map(|_| Mutex::new(vec![TlbEntry::empty(); num_ways]))
                .collect(),
        })
    }

    fn decompose(&self, vaddr: u64) -> Decomposed {
        addr::decompose(vaddr, self.page_size, self.num_sets)
    }

    /// Looks up `vaddr` issued by `owner_process`, returning the mapped
    /// physical frame if resident.
    ///
    /// # Panics
    ///
    /// Panics if the set's storage mutex is poisoned.
    pub fn lookup(&self, owner_process: u32, vaddr: u64, time: u64) -> Option<u64> {
        let d = self.decompose(vaddr);
        let mut set = self.sets[d.index as usize].lock().expect("tlb set poisoned");
        let entry = set
            .iter_mut()
            .find(|e| e.valid && e.tag == d.tag && e.owner_process == owner_process)?;
        entry.last_used = time;
        Some(entry.frame)
    }

    /// Installs a `(owner_process, vaddr) -> frame` mapping, evicting the
    /// LRU entry in its set if full.
    ///
    /// # Panics
    ///
    /// Panics if the set's storage mutex is poisoned.
    pub fn insert(&self, owner_process: u32, vaddr: u64, frame: u64, time: u64) {
        let d = self.decompose(vaddr);
        let mut set = self.sets[d.index as usize].lock().expect("tlb set poisoned");

        let victim = set
            .iter()
            .position(|e| !e.valid)
            .unwrap_or_else(|| {
                set.iter()
                    .enumerate()
                    .min_by_key(|(_, e)| e.last_used)
                    .map(|(way, _)| way)
                    .unwrap_or(0)
            });

        set[victim] = TlbEntry {
            tag: d.tag,
            owner_process,
            frame,
            valid: true,
            last_used: time,
        };
    }

    /// Invalidates every entry (used on a page-table change that could
    /// stale out existing mappings).
    ///
    /// # Panics
    ///
    /// Panics if any set's storage mutex is poisoned.
    pub fn flush(&self) {
        for set_lock in &self.sets {
            let mut set = set_lock.lock().expect("tlb set poisoned");
            for entry in set.iter_mut() {
                entry.valid = false;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::Tlb;

    #[test]
    fn miss_then_insert_then_hit() {
        let tlb = Tlb::new(4, 2, 4096).unwrap();
        assert!(tlb.lookup(1, 0, 0).is_none());
        tlb.insert(1, 0, 42, 1);
        assert_eq!(tlb.lookup(1, 0, 2), Some(42));
    }

    #[test]
    fn flush_clears_all_entries() {
        let tlb = Tlb::new(4, 2, 4096).unwrap();
        tlb.insert(1, 0, 1, 1);
        tlb.flush();
        assert!(tlb.lookup(1, 0, 2).is_none());
    }

    #[test]
    fn eviction_is_lru_by_timestamp() {
        let tlb = Tlb::new(1, 2, 4096).unwrap();
        tlb.insert(1, 0, 1, 1);
        tlb.insert(1, 4096, 2, 5);
        tlb.insert(1, 8192, 3, 10); // must evict the vaddr-0 mapping (oldest)
        assert!(tlb.lookup(1, 0, 11).is_none());
        assert_eq!(tlb.lookup(1, 4096, 11), Some(2));
    }

    #[test]
    fn two_processes_on_the_same_vaddr_do_not_alias() {
        let tlb = Tlb::new(4, 2, 4096).unwrap();
        tlb.insert(1, 0, 7, 1);
        assert!(tlb.lookup(2, 0, 2).is_none());
        tlb.insert(2, 0, 9, 2);
        assert_eq!(tlb.lookup(1, 0, 3), Some(7));
        assert_eq!(tlb.lookup(2, 0, 3), Some(9));
    }
}
