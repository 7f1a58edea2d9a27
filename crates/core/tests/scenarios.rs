//! End-to-end scenarios against the default 4-core, 2-level, 2-D mesh
//! configuration: a cold miss through to DRAM, a repeated local hit, a
//! second reader forcing a share, a writer forcing an invalidation, an L1
//! capacity eviction with a dirty writeback, and sharer-list overflow
//! degrading a line to broadcast.

use coresim_core::cache::LineState;
use coresim_core::coherence::DirectoryMesi;
use coresim_core::common::reference::{InsMem, RefKind};
use coresim_core::config::{Config, ProtocolType};

fn default_directory_config() -> Config {
    let mut cfg = Config::default();
    cfg.system.tlb_enable = false;
    cfg
}

#[test]
fn cold_read_misses_through_every_private_level_to_dram() {
    let cfg = default_directory_config();
    let engine = DirectoryMesi::new(&cfg).unwrap();

    let delay = engine.access(0, InsMem::new(RefKind::Read, 1, 0x1000), 0);

    // L1 access_time (1) + L2 access_time (8) + DRAM (100) is a lower bound;
    // directory access and network transit only add to it.
    assert!(delay >= 1 + 8 + 100);
    assert_eq!(engine.level_counters(0).misses(), 1);
    assert_eq!(engine.level_counters(1).misses(), 1);
}

#[test]
fn repeated_read_hits_purely_in_l1() {
    let cfg = default_directory_config();
    let engine = DirectoryMesi::new(&cfg).unwrap();

    let first = engine.access(0, InsMem::new(RefKind::Read, 1, 0x1000), 0);
    let second = engine.access(0, InsMem::new(RefKind::Read, 1, 0x1000), first);

    assert_eq!(second, 1);
    assert_eq!(engine.level_counters(0).misses(), 1);
}

#[test]
fn a_second_readers_arrival_downgrades_the_first_to_shared() {
    let cfg = default_directory_config();
    let engine = DirectoryMesi::new(&cfg).unwrap();
    let addr = 0x1000;

    engine.access(0, InsMem::new(RefKind::Read, 1, addr), 0);
    engine.access(1, InsMem::new(RefKind::Read, 2, addr), 50);

    assert_eq!(engine.hierarchy().bank_for(0, 0).probe(addr, None).prior_state, LineState::Shared);
    assert_eq!(engine.hierarchy().bank_for(1, 0).probe(addr, None).prior_state, LineState::Shared);
    assert_eq!(engine.hierarchy().bank_for(0, 1).probe(addr, None).prior_state, LineState::Shared);

    let dir = engine.directory_for(addr).probe(addr);
    assert_eq!(dir.state, LineState::Shared);
    let mut sharers = dir.sharers;
    sharers.sort_unstable();
    assert_eq!(sharers, vec![0, 1]);
}

#[test]
fn a_write_upgrade_invalidates_the_other_sharer() {
    let cfg = default_directory_config();
    let engine = DirectoryMesi::new(&cfg).unwrap();
    let addr = 0x1000;

    engine.access(0, InsMem::new(RefKind::Read, 1, addr), 0);
    engine.access(1, InsMem::new(RefKind::Read, 2, addr), 50);
    engine.access(0, InsMem::new(RefKind::Write, 1, addr), 100);

    assert!(!engine.hierarchy().bank_for(0, 1).probe(addr, None).hit);
    assert!(!engine.hierarchy().bank_for(1, 1).probe(addr, None).hit);

    let dir = engine.directory_for(addr).probe(addr);
    assert_eq!(dir.state, LineState::Modified);
    assert_eq!(dir.sharers, vec![0]);
}

#[test]
fn a_fifth_block_in_the_same_l1_set_evicts_the_dirty_first_one_with_a_writeback() {
    let cfg = default_directory_config();
    let engine = DirectoryMesi::new(&cfg).unwrap();

    // L1: 32 KiB / 4-way / 64 B blocks -> 128 sets. Addresses spaced by
    // (num_sets * block_size) all land in set 0 with distinct tags.
    let stride = 128 * 64;
    let addrs: Vec<u64> = (0..5).map(|k| (k as u64) * stride as u64).collect();

    // First block is written so it's resident Modified when evicted.
    engine.access(0, InsMem::new(RefKind::Write, 1, addrs[0]), 0);
    for (i, addr) in addrs[1..4].iter().enumerate() {
        engine.access(0, InsMem::new(RefKind::Read, 1, *addr), 10 + i as u64);
    }
    // Fifth distinct block forces an eviction in the 4-way set.
    engine.access(0, InsMem::new(RefKind::Read, 1, addrs[4]), 100);

    assert!(engine.level_counters(0).evictions() >= 1);
    assert!(engine.level_counters(0).writebacks() >= 1);
    assert!(!engine.hierarchy().bank_for(0, 0).probe(addrs[0], None).hit);
}

#[test]
fn sharer_overflow_degrades_to_broadcast_and_counts_once() {
    let mut cfg = default_directory_config();
    cfg.system.num_cores = 4;
    cfg.system.protocol_type = ProtocolType::LimitedPtr;
    cfg.system.max_num_sharers = 2;
    let engine = DirectoryMesi::new(&cfg).unwrap();
    let addr = 0x2000;

    engine.access(0, InsMem::new(RefKind::Read, 1, addr), 0);
    engine.access(1, InsMem::new(RefKind::Read, 2, addr), 10);
    engine.access(2, InsMem::new(RefKind::Read, 3, addr), 20);

    assert_eq!(engine.directory_for(addr).probe(addr).state, LineState::Broadcast);
    assert_eq!(engine.total_num_broadcast(), 1);

    // A fourth core's write must fan out to every core, not just the
    // truncated sharer list the limited-pointer representation kept.
    engine.access(3, InsMem::new(RefKind::Write, 4, addr), 30);
    assert!(!engine.hierarchy().bank_for(0, 0).probe(addr, None).hit);
    assert!(!engine.hierarchy().bank_for(0, 1).probe(addr, None).hit);
    assert!(!engine.hierarchy().bank_for(0, 2).probe(addr, None).hit);
}

#[test]
fn a_clean_eviction_still_drops_the_core_from_the_sharer_set() {
    let cfg = default_directory_config();
    let engine = DirectoryMesi::new(&cfg).unwrap();

    // L1: 32 KiB / 4-way / 64 B blocks -> 128 sets, so addresses spaced by
    // (num_sets * block_size) land in the same set with distinct tags.
    let stride = 128 * 64;
    let addrs: Vec<u64> = (0..5).map(|k| (k as u64) * stride as u64).collect();

    // Every block is only ever read, so each L1 eviction along the way is
    // clean, never dirty.
    for (i, addr) in addrs.iter().enumerate() {
        engine.access(0, InsMem::new(RefKind::Read, 1, *addr), i as u64);
    }

    // addrs[0] was evicted from L1 by the fifth distinct block in the same
    // set; it must no longer be tracked as a sharer of core 0's block, even
    // though the eviction was clean.
    let dir = engine.directory_for(addrs[0]).probe(addrs[0]);
    assert!(!dir.sharers.contains(&0));
}

#[test]
fn two_processes_on_the_same_core_do_not_alias_to_each_others_line() {
    let cfg = default_directory_config();
    let engine = DirectoryMesi::new(&cfg).unwrap();
    let addr = 0x1000;

    engine.access(0, InsMem::new(RefKind::Write, 1, addr), 0);
    // A different process touching the same physical address on the same
    // core must still go through the directory, not silently hit on
    // process 1's resident line.
    let delay = engine.access(0, InsMem::new(RefKind::Read, 2, addr), 10);
    assert!(delay >= 1 + 8);

    // Both processes now hold their own private copy of the same tag.
    assert!(engine.hierarchy().bank_for(0, 0).probe(addr, Some(1)).hit);
    assert!(engine.hierarchy().bank_for(0, 0).probe(addr, Some(2)).hit);
}
