//! The directory (or shared-LLC) bank: per-line sharer tracking on top of
//! the same set-associative, LRU-by-timestamp storage every bank uses.
//!
//! Two sharer-set representations are supported, selected by
//! `system.protocol_type` (spec.md §4.5.2):
//! - `FULL_MAP`: an exact bitset over private-cache ids, one bit per
//!   sharer, never degrades.
//! - `LIMITED_PTR`: a fixed-width list of sharer ids. Once it overflows,
//!   the line's tracking degrades to [`LineState::Broadcast`] and the
//!   directory starts broadcasting every future coherence event that
//!   touches the line to all caches rather than the (no longer exactly
//!   known) sharer set.
//!
//! Like [`super::bank::Bank`], each set carries an `up`/`down` gate pair
//! alongside its storage mutex: `up` held for the request that walks into
//! the directory from a private-level miss, `down` held while the
//! directory fans an invalidate or downgrade back out to sharers.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard};

use crate::common::addr::{self, Decomposed};
use crate::common::error::{CoreError, Result};
use crate::config::ProtocolType;

use super::line::LineState;

/// An RAII guard held for the duration of a request entering the directory
/// from below (a private-level miss walking up to the home node). Dropping
/// it releases the gate. Mirrors [`super::bank::UpGuard`] for the directory
/// bank, which isn't a [`super::bank::Bank`] itself.
#[must_use]
pub struct DirUpGuard<'a>(#[allow(dead_code)] MutexGuard<'a, ()>);

/// An RAII guard held for the duration of a fan-out the directory issues
/// downward to current sharers (invalidate or downgrade). Dropping it
/// releases the gate.
#[must_use]
pub struct DirDownGuard<'a>(#[allow(dead_code)] MutexGuard<'a, ()>);

/// The set of private caches holding a shared copy of a line.
#[derive(Debug, Clone)]
pub enum SharerSet {
    /// Exact bitset, one bit per private-cache id.
    FullMap(u64),
    /// Fixed-capacity explicit list; `None` once overflowed (the line is
    /// then tracked as [`LineState::Broadcast`] instead).
    LimitedPtr {
        /// Currently-tracked sharer ids, capped at `capacity`.
        sharers: Vec<usize>,
        /// Maximum number of sharers this representation can track exactly.
        capacity: usize,
    },
}

impl SharerSet {
    fn new(protocol: ProtocolType, max_sharers: usize) -> Self {
        match protocol {
            ProtocolType::FullMap => Self::FullMap(0),
            ProtocolType::LimitedPtr => Self::LimitedPtr {
                sharers: Vec::with_capacity(max_sharers),
                capacity: max_sharers,
            },
        }
    }

    fn clear(&mut self) {
        match self {
            Self::FullMap(bits) => *bits = 0,
            Self::LimitedPtr { sharers, .. } => sharers.clear(),
        }
    }

    /// Adds `sharer` to the set. Returns `true` if the set overflowed its
    /// capacity as a result (only possible for `LimitedPtr`).
    fn add(&mut self, sharer: usize) -> bool {
        match self {
            Self::FullMap(bits) => {
                *bits |= 1 << (sharer % 64);
                false
            }
            Self::LimitedPtr { sharers, capacity } => {
                if sharers.contains(&sharer) {
                    return false;
                }
                if sharers.len() >= *capacity {
                    return true;
                }
                sharers.push(sharer);
                false
            }
        }
    }

    fn remove(&mut self, sharer: usize) {
        match self {
            Self::FullMap(bits) => *bits &= !(1 << (sharer % 64)),
            Self::LimitedPtr { sharers, .. } => sharers.retain(|&s| s != sharer),
        }
    }

    /// The sharer ids currently tracked. For `FullMap`, decodes the bitset
    /// against `num_sharers` (the number of private caches in the system).
    #[must_use]
    pub fn members(&self, num_sharers: usize) -> Vec<usize> {
        match self {
            Self::FullMap(bits) => (0..num_sharers.min(64))
                .filter(|i| bits & (1 << i) != 0)
                .collect(),
            Self::LimitedPtr { sharers, .. } => sharers.clone(),
        }
    }
}

/// A single directory-tracked line.
#[derive(Debug, Clone)]
struct DirLine {
    tag: u64,
    state: LineState,
    sharers: SharerSet,
    last_used: u64,
}

impl DirLine {
    fn empty(protocol: ProtocolType, max_sharers: usize) -> Self {
        Self {
            tag: 0,
            state: LineState::Invalid,
            sharers: SharerSet::new(protocol, max_sharers),
            last_used: 0,
        }
    }

    fn is_valid(&self) -> bool {
        !matches!(self.state, LineState::Invalid)
    }
}

/// Outcome of a directory lookup or transition: the line's state and its
/// sharer set, as of the moment the caller observed it.
#[derive(Debug, Clone)]
pub struct DirectoryResult {
    /// Coherence state of the line at the directory.
    pub state: LineState,
    /// Current sharer ids (meaningless if `state == Invalid`).
    pub sharers: Vec<usize>,
    /// Block-aligned address reconstructed from the tag (used on eviction).
    pub addr: u64,
}

/// The directory bank (or a shared-LLC bank, when `system.shared_llc` is
/// set — the only difference is that [`LineState::Valid`] is reachable).
#[derive(Debug)]
pub struct DirectoryBank {
    num_sets: usize,
    block_size: usize,
    num_ways: usize,
    protocol: ProtocolType,
    max_sharers: usize,
    sets: Vec<Mutex<Vec<DirLine>>>,
    up_gates: Vec<Mutex<()>>,
    down_gates: Vec<Mutex<()>>,
    /// Number of distinct directory entries whose sharer set has overflowed
    /// `max_sharers` and degraded to [`LineState::Broadcast`] (spec.md §8's
    /// testable broadcast-accounting property).
    total_num_broadcast: AtomicU64,
}

impl DirectoryBank {
    /// Creates a new directory bank.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::ConfigurationInvalid`] under the same
    /// conditions as [`super::bank::Bank::new`].
    pub fn new(
        num_sets: usize,
        num_ways: usize,
        block_size: usize,
        protocol: ProtocolType,
        max_sharers: usize,
    ) -> Result<Self> {
        if num_sets == 0 || num_ways == 0 || block_size == 0 {
            return Err(CoreError::ConfigurationInvalid(
                "directory bank dimensions must be nonzero".into(),
            ));
        }
        if !num_sets.is_power_of_two() {
            return Err(CoreError::ConfigurationInvalid(format!(
                "directory bank num_sets {num_sets} is not a power of two"
            )));
        }
        Ok(Self {
            num_sets,
            block_size,
            num_ways,
            protocol,
            max_sharers,
            sets: (0..num_sets)
                .map(|_| {
                    Mutex::new(vec![
                        DirLine::empty(protocol, max_sharers);
                        num_ways
                    ])
                })
                .collect(),
            up_gates: (0..num_sets).map(|_| Mutex::new(())).collect(),
            down_gates: (0..num_sets).map(|_| Mutex::new(())).collect(),
            total_num_broadcast: AtomicU64::new(0),
        })
    }

    fn decompose(&self, addr: u64) -> Decomposed {
        addr::decompose(addr, self.block_size, self.num_sets)
    }

    /// Acquires the upward gate for the set `addr` maps to, for the
    /// duration of one request entering the directory from a private-level
    /// miss.
    ///
    /// # Panics
    ///
    /// Panics if the gate mutex is poisoned.
    pub fn lock_up(&self, addr: u64) -> DirUpGuard<'_> {
        let idx = self.decompose(addr).index as usize;
        DirUpGuard(self.up_gates[idx].lock().expect("directory up-gate poisoned"))
    }

    /// Acquires the downward gate for the set `addr` maps to, for the
    /// duration of a directory-initiated fan-out (invalidate or downgrade)
    /// to current sharers.
    ///
    /// # Panics
    ///
    /// Panics if the gate mutex is poisoned.
    pub fn lock_down(&self, addr: u64) -> DirDownGuard<'_> {
        let idx = self.decompose(addr).index as usize;
        DirDownGuard(self.down_gates[idx].lock().expect("directory down-gate poisoned"))
    }

    /// Looks up `addr` without modifying anything.
    ///
    /// # Panics
    ///
    /// Panics if the set's storage mutex is poisoned.
    pub fn probe(&self, addr: u64) -> DirectoryResult {
        let d = self.decompose(addr);
        let set = self.sets[d.index as usize].lock().expect("directory set poisoned");
        set.iter()
            .find(|line| line.is_valid() && line.tag == d.tag)
            .map_or(
                DirectoryResult {
                    state: LineState::Invalid,
                    sharers: Vec::new(),
                    addr,
                },
                |line| DirectoryResult {
                    state: line.state,
                    sharers: line.sharers.members(self.max_sharers),
                    addr,
                },
            )
    }

    /// Adds `sharer` to `addr`'s sharer set, installing the line (evicting
    /// an LRU victim if necessary) if it isn't already tracked. Returns the
    /// resulting state — which may be [`LineState::Broadcast`] if a
    /// `LIMITED_PTR` line's sharer list just overflowed.
    ///
    /// # Panics
    ///
    /// Panics if the set's storage mutex is poisoned.
    pub fn add_sharer(&self, addr: u64, sharer: usize, time: u64) -> LineState {
        let d = self.decompose(addr);
        let mut set = self.sets[d.index as usize].lock().expect("directory set poisoned");

        let way = set.iter().position(|line| line.is_valid() && line.tag == d.tag);
        let way = way.unwrap_or_else(|| {
            let victim = set
                .iter()
                .position(|line| !line.is_valid())
                .unwrap_or_else(|| {
                    set.iter()
                        .enumerate()
                        .min_by_key(|(_, line)| line.last_used)
                        .map(|(way, _)| way)
                        .unwrap_or(0)
                });
            set[victim] = DirLine::empty(self.protocol, self.max_sharers);
            set[victim].tag = d.tag;
            set[victim].state = LineState::Shared;
            victim
        });

        let line = &mut set[way];
        line.last_used = time;
        let overflowed = line.sharers.add(sharer);
        if overflowed {
            // Count the broadcast only on the transition into `Broadcast`,
            // not on every subsequent sharer added to an already-degraded
            // line, so the total matches the number of distinct directory
            // entries that overflowed (spec.md §8).
            if line.state != LineState::Broadcast {
                self.total_num_broadcast.fetch_add(1, Ordering::Relaxed);
            }
            line.state = LineState::Broadcast;
        } else if !matches!(line.state, LineState::Modified | LineState::Broadcast) {
            line.state = LineState::Shared;
        }
        line.state
    }

    /// Transitions `addr` to `Modified`, owned solely by `owner`, clearing
    /// any other tracked sharers.
    ///
    /// # Panics
    ///
    /// Panics if the set's storage mutex is poisoned.
    pub fn set_modified(&self, addr: u64, owner: usize, time: u64) {
        let d = self.decompose(addr);
        let mut set = self.sets[d.index as usize].lock().expect("directory set poisoned");
        if let Some(line) = set.iter_mut().find(|line| line.is_valid() && line.tag == d.tag) {
            line.sharers.clear();
            line.sharers.add(owner);
            line.state = LineState::Modified;
            line.last_used = time;
        }
    }

    /// Removes `sharer` from `addr`'s tracked set. If no sharers remain,
    /// the line is invalidated entirely.
    ///
    /// # Panics
    ///
    /// Panics if the set's storage mutex is poisoned.
    pub fn remove_sharer(&self, addr: u64, sharer: usize) {
        let d = self.decompose(addr);
        let mut set = self.sets[d.index as usize].lock().expect("directory set poisoned");
        if let Some(line) = set.iter_mut().find(|line| line.is_valid() && line.tag == d.tag) {
            line.sharers.remove(sharer);
            if line.sharers.members(self.max_sharers).is_empty()
                && !matches!(line.state, LineState::Broadcast)
            {
                line.state = LineState::Invalid;
            }
        }
    }

    /// Number of sets in this directory bank.
    #[must_use]
    pub const fn num_sets(&self) -> usize {
        self.num_sets
    }

    /// Associativity of this directory bank.
    #[must_use]
    pub const fn num_ways(&self) -> usize {
        self.num_ways
    }

    /// Number of distinct directory entries that have degraded to
    /// [`LineState::Broadcast`] since this bank was created.
    #[must_use]
    pub fn total_num_broadcast(&self) -> u64 {
        self.total_num_broadcast.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::{DirectoryBank, LineState};
    use crate::config::ProtocolType;

    #[test]
    fn full_map_tracks_exact_sharer_set() {
        let dir = DirectoryBank::new(4, 2, 64, ProtocolType::FullMap, 8).unwrap();
        dir.add_sharer(0, 1, 1);
        dir.add_sharer(0, 2, 2);
        let result = dir.probe(0);
        assert_eq!(result.state, LineState::Shared);
        assert_eq!(result.sharers.len(), 2);
    }

    #[test]
    fn broadcast_is_counted_once_per_overflowing_line() {
        let dir = DirectoryBank::new(4, 2, 64, ProtocolType::LimitedPtr, 2).unwrap();
        dir.add_sharer(0, 1, 1);
        dir.add_sharer(0, 2, 2);
        dir.add_sharer(0, 3, 3); // overflow #1
        dir.add_sharer(0, 4, 4); // already Broadcast, shouldn't recount
        assert_eq!(dir.total_num_broadcast(), 1);
    }

    #[test]
    fn limited_ptr_degrades_to_broadcast_on_overflow() {
        let dir = DirectoryBank::new(4, 2, 64, ProtocolType::LimitedPtr, 2).unwrap();
        dir.add_sharer(0, 1, 1);
        dir.add_sharer(0, 2, 2);
        let state = dir.add_sharer(0, 3, 3);
        assert_eq!(state, LineState::Broadcast);
    }

    #[test]
    fn set_modified_clears_prior_sharers() {
        let dir = DirectoryBank::new(4, 2, 64, ProtocolType::FullMap, 8).unwrap();
        dir.add_sharer(0, 1, 1);
        dir.add_sharer(0, 2, 2);
        dir.set_modified(0, 3, 3);
        let result = dir.probe(0);
        assert_eq!(result.state, LineState::Modified);
        assert_eq!(result.sharers, vec![3]);
    }

    #[test]
    fn removing_the_last_sharer_invalidates_the_line() {
        let dir = DirectoryBank::new(4, 2, 64, ProtocolType::FullMap, 8).unwrap();
        dir.add_sharer(0, 1, 1);
        dir.remove_sharer(0, 1);
        assert_eq!(dir.probe(0).state, LineState::Invalid);
    }
}
