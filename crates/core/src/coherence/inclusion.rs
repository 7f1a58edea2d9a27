//! Inclusion-property helpers shared by both protocol engines.
//!
//! spec.md §4.5.3 requires that a block invalidated or downgraded anywhere
//! in the hierarchy is invalidated or downgraded at every private level a
//! core holds it at, not just the level that triggered the transition —
//! otherwise a core could keep servicing reads or writes out of an L1 line
//! whose backing L2/directory entry no longer reflects reality. These
//! helpers walk every private level for one core in one call so neither
//! protocol engine has to remember to do it manually at each call site.
//!
//! Each level visited here is a downward fan-out (directory/bus -> L2 ->
//! L1), so every step holds that bank's `down` gate (spec.md §5) rather
//! than its `up` gate, which is reserved for the upward miss walk in
//! `bus_mesi.rs`/`directory_mesi.rs`.

use crate::cache::{Hierarchy, LineState};

/// Invalidates `addr` at every private level `core_id` has access to,
/// returning the most "severe" state observed (`Modified` if any level had
/// it, `Shared`/`Exclusive` otherwise, `Invalid` if the core held nothing).
///
/// Used both when a bus snoop invalidates a peer's copy and when a
/// directory forwards an invalidate to a sharer.
pub fn invalidate_children(hierarchy: &Hierarchy, num_private_levels: usize, core_id: usize, addr: u64) -> LineState {
    let mut worst = LineState::Invalid;
    for level in 0..num_private_levels {
        let bank = hierarchy.bank_for(level, core_id);
        let _down = bank.lock_down(addr);
        if let Some(prior) = bank.invalidate(addr) {
            if prior.dirty() || !worst.dirty() {
                worst = pick_more_severe(worst, prior);
            }
        }
    }
    worst
}

fn pick_more_severe(a: LineState, b: LineState) -> LineState {
    fn rank(s: LineState) -> u8 {
        match s {
            LineState::Invalid => 0,
            LineState::Shared | LineState::Valid => 1,
            LineState::Exclusive => 2,
            LineState::Broadcast => 2,
            LineState::Modified => 3,
        }
    }
    if rank(a) >= rank(b) { a } else { b }
}

/// Downgrades `addr` to `Shared` at every private level `core_id` holds it
/// at (used when a second reader arrives and an existing owner must give
/// up exclusive/modified access). Returns `true` if any level held the
/// line in `Modified` (so the caller knows a writeback must be charged).
pub fn share_children(hierarchy: &Hierarchy, num_private_levels: usize, core_id: usize, addr: u64, time: u64) -> bool {
    let mut was_dirty = false;
    for level in 0..num_private_levels {
        let bank = hierarchy.bank_for(level, core_id);
        let _down = bank.lock_down(addr);
        let result = bank.probe(addr, None);
        if result.hit {
            was_dirty |= result.prior_state.dirty();
            bank.transition(addr, LineState::Shared, time, None);
        }
    }
    was_dirty
}

/// Installs `addr` at every private level `core_id` has access to, in
/// `new_state`. Returns every eviction triggered along the way, tagged with
/// the level it happened at, so the caller can resolve writebacks and
/// attribute eviction/writeback counters to the right level.
///
/// A level that already holds `addr` (e.g. a core upgrading its own `S`
/// line to `M`) is updated in place via `transition` rather than `replace`:
/// `replace` has no way to notice an already-resident tag and would
/// otherwise install a second copy of the same block in a different way of
/// the same set.
pub fn fill_children(
    hierarchy: &Hierarchy,
    num_private_levels: usize,
    core_id: usize,
    addr: u64,
    new_state: LineState,
    time: u64,
    owner_process: u32,
) -> Vec<(usize, crate::cache::Evicted)> {
    let mut evictions = Vec::new();
    for level in 0..num_private_levels {
        let bank = hierarchy.bank_for(level, core_id);
        let _down = bank.lock_down(addr);
        if bank.probe(addr, Some(owner_process)).hit {
            bank.transition(addr, new_state, time, Some(owner_process));
        } else if let Some(evicted) = bank.replace(addr, new_state, time, owner_process) {
            evictions.push((level, evicted));
        }
    }
    evictions
}

#[cfg(test)]
mod tests {
    use super::{fill_children, invalidate_children, share_children};
    use crate::cache::{Hierarchy, LineState};
    use crate::config::CacheLevelConfig;

    fn hierarchy() -> Hierarchy {
        let configs = vec![CacheLevelConfig {
            level: 0,
            share: 1,
            access_time: 1,
            size: 4096,
            block_size: 64,
            num_ways: 2,
        }];
        Hierarchy::new(&configs, 4).unwrap()
    }

    #[test]
    fn fill_then_invalidate_round_trips() {
        let h = hierarchy();
        fill_children(&h, 1, 0, 0, LineState::Modified, 1, 3);
        let prior = invalidate_children(&h, 1, 0, 0);
        assert_eq!(prior, LineState::Modified);
        assert!(!h.bank_for(0, 0).probe(0, None).hit);
    }

    #[test]
    fn share_downgrades_modified_and_reports_dirty() {
        let h = hierarchy();
        fill_children(&h, 1, 0, 0, LineState::Modified, 1, 3);
        let was_dirty = share_children(&h, 1, 0, 0, 2);
        assert!(was_dirty);
        let after = h.bank_for(0, 0).probe(0, None);
        assert_eq!(after.prior_state, LineState::Shared);
        // Downgrading doesn't touch who owns the line.
        assert!(h.bank_for(0, 0).probe(0, Some(3)).hit);
    }

    #[test]
    fn invalidating_a_cold_line_is_a_no_op() {
        let h = hierarchy();
        let prior = invalidate_children(&h, 1, 0, 99);
        assert_eq!(prior, LineState::Invalid);
    }
}
