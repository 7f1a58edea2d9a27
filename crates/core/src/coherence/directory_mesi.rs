//! Directory-based MESI.
//!
//! Each core walks its own private levels first; a miss there sends a
//! request over the mesh to that address's home directory bank — one bank
//! colocated with every network node, not a single centralized bank
//! (spec.md line 47) — which resolves sharer-set bookkeeping and, when
//! necessary, fans invalidate/downgrade messages out to current sharers *in
//! parallel* (spec.md §4.5.2's "parallel pipelined fan-out": every forwarded
//! message is sent before any reply is awaited, so total forwarding delay is
//! the slowest single round trip, not the sum of all of them) before
//! replying to the requester.

use crate::cache::{DirectoryBank, Hierarchy, LevelCounters, LineState};
use crate::common::error::Result;
use crate::common::reference::InsMem;
use crate::config::Config;
use crate::interconnect::Network;

use super::inclusion::{fill_children, invalidate_children, share_children};

/// `ceil(log2(n))`, the number of bits needed to enumerate `n` distinct
/// values; `0` for `n <= 1`.
fn ceil_log2(n: usize) -> u32 {
    if n <= 1 {
        0
    } else {
        (n - 1).ilog2() + 1
    }
}

/// The network node hosting the directory bank responsible for `addr`
/// (spec.md §4.5.2): `⌊(addr / block_size) mod 2^⌈log2(num_cores)⌉⌋`,
/// clamped into range for a `num_cores` that isn't itself a power of two.
fn home_node(addr: u64, block_size: usize, num_cores: usize) -> usize {
    let block = addr / block_size as u64;
    let modulus = 1u64 << ceil_log2(num_cores);
    (block % modulus).min(num_cores as u64 - 1) as usize
}

/// The directory-based coherence engine.
#[derive(Debug)]
pub struct DirectoryMesi {
    hierarchy: Hierarchy,
    /// One directory bank per network node (spec.md line 47's distributed
    /// design), selected per access by [`home_node`].
    directories: Vec<DirectoryBank>,
    /// Access/miss/eviction/writeback counters for the directory/shared-LLC
    /// level, which sits outside `hierarchy` and so isn't covered by its
    /// per-level counters. Aggregated across every bank in `directories`.
    directory_counters: LevelCounters,
    network: Network,
    num_cores: usize,
    num_private_levels: usize,
    directory_access_time: u64,
    dram_access_time: u64,
    packet_bytes: usize,
    block_size: usize,
}

impl DirectoryMesi {
    /// Builds a directory-based engine. Every entry in `config.cache` is a
    /// private level (the directory itself, configured separately in
    /// `config.directory`, is the shared point of truth).
    ///
    /// # Errors
    ///
    /// Propagates [`crate::common::error::CoreError::ConfigurationInvalid`].
    pub fn new(config: &Config) -> Result<Self> {
        let num_cores = config.system.num_cores;
        let hierarchy = Hierarchy::new(&config.cache, num_cores)?;
        let num_sets = config.directory.num_sets()?;
        let directories = (0..num_cores)
            .map(|_| {
                DirectoryBank::new(
                    num_sets,
                    config.directory.num_ways,
                    config.directory.block_size,
                    config.system.protocol_type,
                    config.system.max_num_sharers,
                )
            })
            .collect::<Result<Vec<_>>>()?;
        // One directory bank colocated with every core's network node.
        let network = Network::new(&config.network, num_cores);

        Ok(Self {
            num_private_levels: hierarchy.num_levels(),
            hierarchy,
            directories,
            directory_counters: LevelCounters::new(),
            network,
            num_cores,
            directory_access_time: config.directory.access_time,
            dram_access_time: config.system.dram_access_time,
            packet_bytes: config.directory.block_size,
            block_size: config.directory.block_size,
        })
    }

    fn home_node(&self, addr: u64) -> usize {
        home_node(addr, self.block_size, self.num_cores)
    }

    /// The access/miss/eviction/writeback counters for private level
    /// `level`.
    #[must_use]
    pub fn level_counters(&self, level: usize) -> &LevelCounters {
        self.hierarchy.counters(level)
    }

    /// Access/miss/eviction/writeback counters for the directory.
    #[must_use]
    pub const fn directory_counters(&self) -> &LevelCounters {
        &self.directory_counters
    }

    /// Total number of directory entries that have degraded to a broadcast
    /// sharer representation since this engine was created, summed across
    /// every distributed bank.
    #[must_use]
    pub fn total_num_broadcast(&self) -> u64 {
        self.directories.iter().map(DirectoryBank::total_num_broadcast).sum()
    }

    /// Number of private cache levels feeding into the directory.
    #[must_use]
    pub fn num_private_levels(&self) -> usize {
        self.num_private_levels
    }

    /// The interconnect carrying requests between cores and the home
    /// directory bank.
    #[must_use]
    pub const fn network(&self) -> &Network {
        &self.network
    }

    /// The private cache levels feeding into the directory, for tests and
    /// reporting that need to inspect a specific core's line state directly.
    #[must_use]
    pub const fn hierarchy(&self) -> &Hierarchy {
        &self.hierarchy
    }

    /// The directory bank responsible for `addr`.
    #[must_use]
    pub fn directory_for(&self, addr: u64) -> &DirectoryBank {
        &self.directories[self.home_node(addr)]
    }

    /// Services one reference from `core_id`, returning the total delay.
    ///
    /// # Panics
    ///
    /// Panics only if the network's node bounds are violated, which cannot
    /// happen for a `core_id` within `0..num_cores`.
    pub fn access(&self, core_id: usize, reference: InsMem, time: u64) -> u64 {
        let addr = reference.addr;
        let mut delay = 0;

        for level in 0..self.num_private_levels {
            let bank = self.hierarchy.bank_for(level, core_id);
            let counters = self.hierarchy.counters(level);
            counters.record_access();
            delay += self.hierarchy.access_time(level);
            let _up = bank.lock_up(addr);
            let result = bank.probe(addr, Some(reference.owner_process));
            let sufficient = if reference.is_write() {
                result.prior_state.writable()
            } else {
                result.prior_state.readable()
            };
            if sufficient {
                if reference.is_write() && result.prior_state != LineState::Modified {
                    delay += self.request_directory_upgrade(core_id, addr, time + delay);
                    // See bus_mesi.rs's equivalent branch: every private
                    // level already holding this block must be brought to
                    // `Modified`, not just the one that served this access.
                    for (ev_level, evicted) in fill_children(
                        &self.hierarchy,
                        self.num_private_levels,
                        core_id,
                        addr,
                        LineState::Modified,
                        time,
                        reference.owner_process,
                    ) {
                        self.hierarchy.counters(ev_level).record_eviction();
                        if evicted.state.dirty() {
                            self.hierarchy.counters(ev_level).record_writeback();
                            delay += self.dram_access_time;
                        }
                        self.directories[self.home_node(evicted.addr)].remove_sharer(evicted.addr, core_id);
                    }
                } else {
                    bank.transition(addr, result.prior_state, time, Some(reference.owner_process));
                }
                return delay;
            }
            counters.record_miss();
        }

        // Miss at every private level: go to addr's home directory.
        let home = self.home_node(addr);
        let directory = &self.directories[home];
        delay += self
            .network
            .transmit(core_id, home, time, self.packet_bytes)
            .unwrap_or(0);
        delay += self.directory_access_time;
        self.directory_counters.record_access();

        let _dir_up = directory.lock_up(addr);
        let probe = directory.probe(addr);
        let fanout = self.fanout_targets(&probe);
        let new_state = if reference.is_write() {
            delay += self.forward_invalidations(home, &fanout, core_id, addr, time + delay);
            if probe.state == LineState::Invalid {
                self.directory_counters.record_miss();
                delay += self.dram_access_time;
            }
            directory.set_modified(addr, core_id, time);
            LineState::Modified
        } else if probe.state == LineState::Invalid {
            self.directory_counters.record_miss();
            delay += self.dram_access_time;
            directory.add_sharer(addr, core_id, time);
            LineState::Exclusive
        } else if probe.state == LineState::Modified || probe.state == LineState::Exclusive {
            // A second reader arriving at a line held `M` or `E` by a single
            // owner must downgrade that owner's private copy to `S` before
            // the line can be shared (spec.md §8 scenario S3).
            delay += self.forward_downgrade(home, &fanout, core_id, addr, time + delay);
            directory.add_sharer(addr, core_id, time);
            LineState::Shared
        } else {
            directory.add_sharer(addr, core_id, time);
            LineState::Shared
        };
        drop(_dir_up);

        delay += self
            .network
            .transmit(home, core_id, time + delay, self.packet_bytes)
            .unwrap_or(0);

        for (level, evicted) in fill_children(
            &self.hierarchy,
            self.num_private_levels,
            core_id,
            addr,
            new_state,
            time,
            reference.owner_process,
        ) {
            self.hierarchy.counters(level).record_eviction();
            if evicted.state.dirty() {
                self.hierarchy.counters(level).record_writeback();
                delay += self.dram_access_time;
            }
            // A core is a sharer as long as any private level still holds
            // the block; once the last one evicts it, it must drop out of
            // the block's sharer set regardless of whether the evicted copy
            // was clean or dirty (spec.md §8 testable property #2).
            self.directories[self.home_node(evicted.addr)].remove_sharer(evicted.addr, core_id);
        }

        delay
    }

    /// Upgrades an existing Shared copy to Modified: invalidates every
    /// other sharer, in parallel, then updates the directory.
    fn request_directory_upgrade(&self, core_id: usize, addr: u64, time: u64) -> u64 {
        let home = self.home_node(addr);
        let directory = &self.directories[home];
        let mut delay = self
            .network
            .transmit(core_id, home, time, self.packet_bytes)
            .unwrap_or(0);
        let _dir_up = directory.lock_up(addr);
        let probe = directory.probe(addr);
        let fanout = self.fanout_targets(&probe);
        delay += self.forward_invalidations(home, &fanout, core_id, addr, time + delay);
        directory.set_modified(addr, core_id, time);
        delay
    }

    /// The cores a coherence message for this line must reach. A
    /// `LIMITED_PTR` line that has degraded to [`LineState::Broadcast`] no
    /// longer has an exact sharer list (it stopped growing once it hit
    /// capacity), so every core in the system is a potential holder and must
    /// be fanned out to; otherwise only the tracked sharers are.
    fn fanout_targets(&self, probe: &crate::cache::DirectoryResult) -> Vec<usize> {
        if probe.state == LineState::Broadcast {
            (0..self.num_cores).collect()
        } else {
            probe.sharers.clone()
        }
    }

    /// Sends an invalidate to every sharer other than `requester`, in
    /// parallel: the `i`-th fanned-out message's header injection starts
    /// `i * header_flits` cycles after the first, and the delay charged is
    /// the max over all parallel round trips, not their sum (spec.md
    /// §4.5.2's pipelined fan-out).
    fn forward_invalidations(&self, home: usize, sharers: &[usize], requester: usize, addr: u64, time: u64) -> u64 {
        let stagger = self.network.header_flits() as u64;
        let mut max_delay = 0;
        for (i, &sharer) in sharers.iter().filter(|&&s| s != requester).enumerate() {
            let start = time + i as u64 * stagger;
            let out = self.network.transmit(home, sharer, start, self.packet_bytes).unwrap_or(0);
            invalidate_children(&self.hierarchy, self.num_private_levels, sharer, addr);
            let back = self.network.transmit(sharer, home, start + out, self.packet_bytes).unwrap_or(0);
            max_delay = max_delay.max(i as u64 * stagger + out + back);
        }
        max_delay
    }

    /// Sends a downgrade (Modified -> Shared) to the current owner so a new
    /// reader can be serviced; same pipelined-fan-out shape as
    /// [`Self::forward_invalidations`].
    fn forward_downgrade(&self, home: usize, sharers: &[usize], requester: usize, addr: u64, time: u64) -> u64 {
        let stagger = self.network.header_flits() as u64;
        let mut max_delay = 0;
        for (i, &owner) in sharers.iter().filter(|&&s| s != requester).enumerate() {
            let start = time + i as u64 * stagger;
            let out = self.network.transmit(home, owner, start, self.packet_bytes).unwrap_or(0);
            share_children(&self.hierarchy, self.num_private_levels, owner, addr, time);
            let back = self.network.transmit(owner, home, start + out, self.packet_bytes).unwrap_or(0);
            max_delay = max_delay.max(i as u64 * stagger + out + back);
        }
        max_delay
    }
}

#[cfg(test)]
mod tests {
    use super::DirectoryMesi;
    use crate::common::reference::{InsMem, RefKind};
    use crate::config::Config;

    fn small_config() -> Config {
        let mut cfg = Config::default();
        cfg.system.num_cores = 2;
        cfg.system.tlb_enable = false;
        cfg
    }

    #[test]
    fn cold_read_pays_directory_and_dram_delay() {
        let cfg = small_config();
        let engine = DirectoryMesi::new(&cfg).unwrap();
        let delay = engine.access(0, InsMem::new(RefKind::Read, 1, 0x1000), 0);
        assert!(delay > 0);
    }

    #[test]
    fn second_local_read_is_cheaper_than_the_first() {
        let cfg = small_config();
        let engine = DirectoryMesi::new(&cfg).unwrap();
        let first = engine.access(0, InsMem::new(RefKind::Read, 1, 0x1000), 0);
        let second = engine.access(0, InsMem::new(RefKind::Read, 1, 0x1000), 10);
        assert!(second < first);
    }

    #[test]
    fn a_same_core_write_upgrade_propagates_to_every_private_level() {
        let cfg = small_config();
        let engine = DirectoryMesi::new(&cfg).unwrap();
        engine.access(0, InsMem::new(RefKind::Read, 1, 0x1000), 0);
        engine.access(0, InsMem::new(RefKind::Write, 1, 0x1000), 10);
        for level in 0..engine.num_private_levels() {
            let state = engine.hierarchy().bank_for(level, 0).probe(0x1000, Some(1)).prior_state;
            assert_eq!(state, crate::cache::LineState::Modified, "level {level} was left stale");
        }
    }

    #[test]
    fn a_write_from_a_second_core_forces_the_first_to_miss_again() {
        let cfg = small_config();
        let engine = DirectoryMesi::new(&cfg).unwrap();
        engine.access(0, InsMem::new(RefKind::Read, 1, 0x1000), 0);
        engine.access(1, InsMem::new(RefKind::Write, 2, 0x1000), 10);
        let after = engine.access(0, InsMem::new(RefKind::Read, 1, 0x1000), 20);
        assert!(after > 0);
    }

    #[test]
    fn limited_ptr_sharer_overflow_still_resolves_requests() {
        let mut cfg = small_config();
        cfg.system.num_cores = 4;
        cfg.system.protocol_type = crate::config::ProtocolType::LimitedPtr;
        cfg.system.max_num_sharers = 2;
        let engine = DirectoryMesi::new(&cfg).unwrap();
        for core in 0..4 {
            let delay = engine.access(core, InsMem::new(RefKind::Read, 1, 0x1000), core as u64);
            assert!(delay > 0);
        }
    }
}
