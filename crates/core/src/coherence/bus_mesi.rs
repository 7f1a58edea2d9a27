//! Bus-snoop MESI.
//!
//! Every core's private levels are walked first; a miss at the last
//! private level snoops every peer's copy directly (there is no directory
//! to consult, so the only way to know whether another core holds the
//! block is to ask all of them) and then falls through to the shared LLC.
//! Contention for the snoop broadcast and the LLC access is modeled by a
//! single shared [`Link`] standing in for the bus (spec.md §4.5.1).

use crate::cache::{Bank, Hierarchy, LevelCounters, LineState};
use crate::common::error::Result;
use crate::common::reference::InsMem;
use crate::config::Config;
use crate::interconnect::Link;

use super::inclusion::{fill_children, invalidate_children, share_children};

/// The bus-snoop coherence engine.
#[derive(Debug)]
pub struct BusMesi {
    hierarchy: Hierarchy,
    llc: Bank,
    /// Access/miss/eviction/writeback counters for the shared LLC, which
    /// sits outside `hierarchy` and so isn't covered by its per-level
    /// counters.
    llc_counters: LevelCounters,
    bus: Link,
    num_cores: usize,
    num_private_levels: usize,
    llc_access_time: u64,
    dram_access_time: u64,
    bus_payload_bytes: usize,
}

impl BusMesi {
    /// Builds a bus-snoop engine from `config`. The last entry in
    /// `config.cache` is treated as the shared LLC level (`share ==
    /// num_cores`); everything above it is private per-core.
    ///
    /// # Errors
    ///
    /// Propagates [`crate::common::error::CoreError::ConfigurationInvalid`].
    pub fn new(config: &Config) -> Result<Self> {
        let num_cores = config.system.num_cores;
        let private_levels = &config.cache[..config.cache.len() - 1];
        let llc_config = config.cache.last().expect("at least one cache level");

        let hierarchy = Hierarchy::new(private_levels, num_cores)?;
        let llc = Bank::new(llc_config.num_sets()?, llc_config.num_ways, llc_config.block_size)?;

        Ok(Self {
            num_private_levels: hierarchy.num_levels(),
            hierarchy,
            llc,
            llc_counters: LevelCounters::new(),
            bus: Link::new(config.network.data_width, config.system.bus_latency),
            num_cores,
            llc_access_time: llc_config.access_time,
            dram_access_time: config.system.dram_access_time,
            bus_payload_bytes: llc_config.block_size,
        })
    }

    /// The access/miss/eviction/writeback counters for the private level
    /// closest to the cores (level `0` through the last private level).
    #[must_use]
    pub fn level_counters(&self, level: usize) -> &LevelCounters {
        self.hierarchy.counters(level)
    }

    /// Access/miss/eviction/writeback counters for the shared LLC.
    #[must_use]
    pub const fn llc_counters(&self) -> &LevelCounters {
        &self.llc_counters
    }

    /// Total bus contention (queueing delay) charged so far.
    #[must_use]
    pub fn bus_contention(&self) -> u64 {
        self.bus.total_contention()
    }

    /// Number of private cache levels above the shared LLC.
    #[must_use]
    pub fn num_private_levels(&self) -> usize {
        self.num_private_levels
    }

    /// The private cache levels feeding into the bus, for tests and
    /// reporting that need to inspect a specific core's line state directly.
    #[must_use]
    pub const fn hierarchy(&self) -> &Hierarchy {
        &self.hierarchy
    }

    /// The shared last-level cache bank itself.
    #[must_use]
    pub const fn llc(&self) -> &Bank {
        &self.llc
    }

    /// Services one reference from `core_id`, returning the total delay.
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
                    delay += self.snoop_invalidate_peers(core_id, addr, time);
                    // The writer may already hold the block at other
                    // private levels too (e.g. filled into both L1 and L2
                    // on an earlier cold read); every one of them must be
                    // brought to `Modified`, not just the level that
                    // satisfied this access, or inclusion breaks the
                    // moment a stale level is later consulted or evicted.
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
                            delay += self.llc_access_time;
                        }
                    }
                } else {
                    bank.transition(addr, result.prior_state, time, Some(reference.owner_process));
                }
                return delay;
            }
            counters.record_miss();
        }

        // Miss in every private level: resolve via the bus.
        delay += self.bus.transmit(time, self.bus_payload_bytes);

        let new_state = if reference.is_write() {
            delay += self.snoop_invalidate_peers(core_id, addr, time);
            LineState::Modified
        } else {
            let any_peer_had_it = self.snoop_share_peers(core_id, addr, time);
            if any_peer_had_it {
                LineState::Shared
            } else {
                LineState::Exclusive
            }
        };

        delay += self.llc_access_time;
        self.llc_counters.record_access();
        // The LLC is shared by every core and process; it tracks one
        // physical copy of the block, not a per-process private one, so it
        // is probed and transitioned by address alone.
        let _llc_up = self.llc.lock_up(addr);
        let llc_result = self.llc.probe(addr, None);
        if !llc_result.hit {
            self.llc_counters.record_miss();
            delay += self.dram_access_time;
            if let Some(evicted) = self.llc.replace(addr, LineState::Valid, time, reference.owner_process) {
                self.llc_counters.record_eviction();
                if evicted.state.dirty() {
                    self.llc_counters.record_writeback();
                    delay += self.dram_access_time;
                }
            }
        } else {
            self.llc.transition(addr, LineState::Valid, time, None);
        }
        drop(_llc_up);

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
                delay += self.llc_access_time;
            }
        }

        delay
    }

    fn snoop_invalidate_peers(&self, requester: usize, addr: u64, time: u64) -> u64 {
        let mut max_delay = 0;
        for peer in 0..self.num_cores {
            if peer == requester {
                continue;
            }
            let prior = invalidate_children(&self.hierarchy, self.num_private_levels, peer, addr);
            if prior.dirty() {
                max_delay = max_delay.max(self.bus.transmit(time, self.bus_payload_bytes));
            }
        }
        max_delay
    }

    fn snoop_share_peers(&self, requester: usize, addr: u64, time: u64) -> bool {
        let mut any = false;
        for peer in 0..self.num_cores {
            if peer == requester {
                continue;
            }
            if share_children(&self.hierarchy, self.num_private_levels, peer, addr, time) {
                any = true;
            }
            let bank = self.hierarchy.bank_for(self.num_private_levels - 1, peer);
            let _down = bank.lock_down(addr);
            if bank.probe(addr, None).hit {
                any = true;
            }
        }
        any
    }
}
