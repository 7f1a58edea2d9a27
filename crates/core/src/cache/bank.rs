//! A single set-associative cache bank.
//!
//! Every level of the hierarchy — private L1s, a shared L2, the TLB, the
//! directory — is built from the same bank shape (spec.md §4.3): fixed
//! number of sets, fixed associativity, LRU-by-timestamp replacement. What
//! differs between levels is only geometry (set count, block size) and
//! what the coherence engine does with a bank's hit/miss/eviction result.
//!
//! Each set carries two separate lock gates, `up` and `down`, in addition
//! to the mutex that actually guards its line storage. A miss walking up
//! the hierarchy (core -> L1 -> L2 -> directory) holds a set's `up` gate
//! for the duration of its walk; inclusion fan-out walking back down
//! (directory invalidate/share -> L2 -> L1) holds the same set's `down`
//! gate. Taking `up` before `down` everywhere (never the reverse) is what
//! keeps an upward miss and a downward invalidation from deadlocking on
//! each other's sets.

use std::sync::{Mutex, MutexGuard};

use crate::common::addr::{self, Decomposed};
use crate::common::error::{CoreError, Result};

use super::line::{CacheLine, LineState};

/// The outcome of a coherence-state change at the target line.
#[derive(Debug, Clone, Copy)]
pub struct AccessResult {
    /// Whether the target line was resident and already in a state that
    /// satisfies the access (so this is not a miss for caching purposes,
    /// even if a coherence transition is still required).
    pub hit: bool,
    /// The set index touched.
    pub set_index: usize,
    /// State the line was found in prior to any transition this access
    /// may now trigger.
    pub prior_state: LineState,
}

/// A line evicted to make room for a new one, carried up or down the
/// hierarchy so its coherence state can be resolved at the next level.
#[derive(Debug, Clone, Copy)]
pub struct Evicted {
    /// Reconstructed address of the evicted block.
    pub addr: u64,
    /// State the line held at eviction (tells the caller whether a
    /// writeback is required).
    pub state: LineState,
    /// Process that last touched the evicted line.
    pub owner_process: u32,
}

/// An RAII guard held for the duration of an upward miss walk through one
/// set. Dropping it releases the gate.
#[must_use]
pub struct UpGuard<'a>(#[allow(dead_code)] MutexGuard<'a, ()>);

/// An RAII guard held for the duration of a downward inclusion fan-out
/// through one set. Dropping it releases the gate.
#[must_use]
pub struct DownGuard<'a>(#[allow(dead_code)] MutexGuard<'a, ()>);

/// A set-associative cache bank.
#[derive(Debug)]
pub struct Bank {
    num_sets: usize,
    num_ways: usize,
    block_size: usize,
    sets: Vec<Mutex<Vec<CacheLine>>>,
    up_gates: Vec<Mutex<()>>,
    down_gates: Vec<Mutex<()>>,
}

impl Bank {
    /// Creates a new bank with `num_sets` sets of `num_ways` lines each,
    /// addressed in `block_size`-byte blocks.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::ConfigurationInvalid`] if `num_sets` is not a
    /// power of two, or either dimension is zero.
    pub fn new(num_sets: usize, num_ways: usize, block_size: usize) -> Result<Self> {
        if num_sets == 0 || num_ways == 0 || block_size == 0 {
            return Err(CoreError::ConfigurationInvalid(
                "bank dimensions must be nonzero".into(),
            ));
        }
        if !num_sets.is_power_of_two() {
            return Err(CoreError::ConfigurationInvalid(format!(
                "bank num_sets {num_sets} is not a power of two"
            )));
        }
        Ok(Self {
            num_sets,
            num_ways,
            block_size,
            sets: (0..num_sets)
                .map(|_| Mutex::new(vec![CacheLine::empty(); num_ways]))
                .collect(),
            up_gates: (0..num_sets).map(|_| Mutex::new(())).collect(),
            down_gates: (0..num_sets).map(|_| Mutex::new(())).collect(),
        })
    }

    fn decompose(&self, addr: u64) -> Decomposed {
        addr::decompose(addr, self.block_size, self.num_sets)
    }

    /// Acquires the upward gate for the set `addr` maps to.
    ///
    /// # Panics
    ///
    /// Panics if the gate mutex is poisoned.
    pub fn lock_up(&self, addr: u64) -> UpGuard<'_> {
        let idx = self.decompose(addr).index as usize;
        UpGuard(self.up_gates[idx].lock().expect("bank up-gate poisoned"))
    }

    /// Acquires the downward gate for the set `addr` maps to.
    ///
    /// # Panics
    ///
    /// Panics if the gate mutex is poisoned.
    pub fn lock_down(&self, addr: u64) -> DownGuard<'_> {
        let idx = self.decompose(addr).index as usize;
        DownGuard(self.down_gates[idx].lock().expect("bank down-gate poisoned"))
    }

    /// Probes the bank for `(addr, owner_process)`, reporting whether it's
    /// resident and in what state, without changing anything.
    ///
    /// `owner_process = None` matches any resident line for `addr`
    /// regardless of which process installed it; core-driven accesses
    /// should always pass `Some(reference.owner_process)` so two processes
    /// touching the same tag on the same core don't alias to each other's
    /// line (spec.md §4.3). Protocol-driven lookups that act on a physical
    /// address without a specific process in mind (inclusion fan-out,
    /// peer snoops) pass `None`.
    ///
    /// # Panics
    ///
    /// Panics if the set's storage mutex is poisoned.
    pub fn probe(&self, addr: u64, owner_process: Option<u32>) -> AccessResult {
        let d = self.decompose(addr);
        let set_index = d.index as usize;
        let set = self.sets[set_index].lock().expect("bank set poisoned");
        let prior_state = set
            .iter()
            .find(|line| line.matches(d.tag, owner_process))
            .map_or(LineState::Invalid, |line| line.state);
        AccessResult {
            hit: prior_state.readable(),
            set_index,
            prior_state,
        }
    }

    /// Updates the state of a resident line (a coherence transition on a
    /// hit), bumping its LRU timestamp.
    ///
    /// `owner_process = Some(p)` both restricts the match to that process's
    /// line and records `p` as the line's owner (the normal core-driven
    /// case: a process transitioning the very line it just probed).
    /// `owner_process = None` matches any process's resident line and
    /// leaves its recorded owner untouched — used by protocol-driven
    /// downgrades (e.g. a directory share) that change state without a
    /// process of their own to attribute the line to.
    ///
    /// # Panics
    ///
    /// Panics if the set's storage mutex is poisoned.
    pub fn transition(&self, addr: u64, new_state: LineState, time: u64, owner_process: Option<u32>) {
        let d = self.decompose(addr);
        let mut set = self.sets[d.index as usize]
            .lock()
            .expect("bank set poisoned");
        if let Some(line) = set.iter_mut().find(|line| line.matches(d.tag, owner_process)) {
            line.state = new_state;
            line.last_used = time;
            if let Some(owner) = owner_process {
                line.owner_process = owner;
            }
        }
    }

    /// Installs a new line for `addr`, evicting the least-recently-used
    /// line in its set if the set is full. Returns the evicted line, if
    /// any, so its coherence state can be resolved by the caller.
    ///
    /// Only reached once a caller's own `probe` has already established a
    /// miss under the same `owner_process`, so there is no resident line
    /// to search for here — `owner_process` is only the new line's owner.
    ///
    /// # Panics
    ///
    /// Panics if the set's storage mutex is poisoned.
    pub fn replace(
        &self,
        addr: u64,
        new_state: LineState,
        time: u64,
        owner_process: u32,
    ) -> Option<Evicted> {
        let d = self.decompose(addr);
        let mut set = self.sets[d.index as usize]
            .lock()
            .expect("bank set poisoned");

        let victim_way = set
            .iter()
            .position(|line| !line.is_valid())
            .unwrap_or_else(|| {
                set.iter()
                    .enumerate()
                    .min_by_key(|(_, line)| line.last_used)
                    .map(|(way, _)| way)
                    .unwrap_or(0)
            });

        let victim = set[victim_way];
        let evicted = victim.is_valid().then(|| Evicted {
            addr: addr::compose(victim.tag, d.index, self.block_size, self.num_sets),
            state: victim.state,
            owner_process: victim.owner_process,
        });

        set[victim_way] = CacheLine {
            tag: d.tag,
            state: new_state,
            last_used: time,
            owner_process,
        };

        evicted
    }

    /// Invalidates `addr` if resident, returning its state before
    /// invalidation (so the caller knows whether a writeback is owed).
    ///
    /// Always protocol-driven (a snoop or a directory-forwarded
    /// invalidate), so it matches on tag alone — the caller is evicting
    /// whatever private copy lives at that address, not one process's in
    /// particular.
    ///
    /// # Panics
    ///
    /// Panics if the set's storage mutex is poisoned.
    pub fn invalidate(&self, addr: u64) -> Option<LineState> {
        let d = self.decompose(addr);
        let mut set = self.sets[d.index as usize]
            .lock()
            .expect("bank set poisoned");
        let line = set.iter_mut().find(|line| line.matches(d.tag, None))?;
        let prior = line.state;
        *line = CacheLine::empty();
        Some(prior)
    }

    /// Flushes every resident line in the bank, returning the ones that
    /// require a writeback.
    ///
    /// # Panics
    ///
    /// Panics if any set's storage mutex is poisoned.
    pub fn flush_all(&self) -> Vec<Evicted> {
        let mut out = Vec::new();
        for (set_index, set_lock) in self.sets.iter().enumerate() {
            let mut set = set_lock.lock().expect("bank set poisoned");
            for line in set.iter_mut() {
                if line.is_valid() {
                    if line.state.dirty() {
                        out.push(Evicted {
                            addr: addr::compose(
                                line.tag,
                                set_index as u64,
                                self.block_size,
                                self.num_sets,
                            ),
                            state: line.state,
                            owner_process: line.owner_process,
                        });
                    }
                    *line = CacheLine::empty();
                }
            }
        }
        out
    }

    /// Number of sets in this bank.
    #[must_use]
    pub const fn num_sets(&self) -> usize {
        self.num_sets
    }

    /// Associativity of this bank.
    #[must_use]
    pub const fn num_ways(&self) -> usize {
        self.num_ways
    }
}

#[cfg(test)]
mod tests {
    use super::{Bank, LineState};

    #[test]
    fn miss_then_install_then_hit() {
        let bank = Bank::new(4, 2, 64).unwrap();
        assert!(!bank.probe(0, Some(7)).hit);
        bank.replace(0, LineState::Exclusive, 1, 7);
        let result = bank.probe(0, Some(7));
        assert!(result.hit);
        assert_eq!(result.prior_state, LineState::Exclusive);
    }

    #[test]
    fn a_different_process_does_not_alias_to_the_same_tag() {
        let bank = Bank::new(4, 2, 64).unwrap();
        bank.replace(0, LineState::Exclusive, 1, 7);
        assert!(bank.probe(0, Some(7)).hit);
        assert!(!bank.probe(0, Some(9)).hit);
        assert!(bank.probe(0, None).hit);
    }

    #[test]
    fn eviction_returns_none_until_set_is_full() {
        let bank = Bank::new(1, 2, 64).unwrap();
        assert!(bank.replace(0, LineState::Shared, 1, 0).is_none());
        assert!(bank.replace(64, LineState::Shared, 2, 0).is_none());
        // Third distinct block in the same set must evict one of the first two.
        let evicted = bank.replace(128, LineState::Shared, 3, 0);
        assert!(evicted.is_some());
    }

    #[test]
    fn lru_victim_is_the_one_with_smallest_timestamp() {
        let bank = Bank::new(1, 2, 64).unwrap();
        bank.replace(0, LineState::Shared, 1, 0);
        bank.replace(64, LineState::Shared, 5, 0);
        // addr 0 (timestamp 1) is older than addr 64 (timestamp 5).
        let evicted = bank.replace(128, LineState::Shared, 10, 0).unwrap();
        assert_eq!(evicted.addr, 0);
    }

    #[test]
    fn invalidate_clears_a_resident_line() {
        let bank = Bank::new(4, 2, 64).unwrap();
        bank.replace(0, LineState::Modified, 1, 0);
        let prior = bank.invalidate(0);
        assert_eq!(prior, Some(LineState::Modified));
        assert!(!bank.probe(0, None).hit);
    }

    #[test]
    fn flush_all_reports_only_dirty_lines() {
        let bank = Bank::new(2, 2, 64).unwrap();
        bank.replace(0, LineState::Shared, 1, 0); // clean
        bank.replace(64, LineState::Modified, 2, 0); // dirty, different set (index 1)
        let flushed = bank.flush_all();
        assert_eq!(flushed.len(), 1);
        assert_eq!(flushed[0].addr, 64);
    }

    #[test]
    fn rejects_non_power_of_two_set_count() {
        assert!(Bank::new(3, 2, 64).is_err());
    }
}
