//! The cache hierarchy: levels of banks, with each level's banks shared by
//! a fixed number of cores (spec.md §4.3's "cache bank" contract repeated
//! level over level).
//!
//! A level's `share` factor (from [`CacheLevelConfig`]) says how many
//! core-adjacent banks below it feed into one bank at this level: `share
//! == 1` is a private per-core level (one bank per core, like an L1);
//! `share == num_cores` is a single bank shared by everyone (like a
//! monolithic L2). Levels in between model per-cluster sharing. Bank
//! indices are derived by simple division rather than stored as an
//! explicit tree, since the mapping from core id to bank id at any level is
//! a pure function of the share factors above it.

use crate::common::error::Result;
use crate::config::CacheLevelConfig;

use super::bank::Bank;
use super::counters::LevelCounters;

/// The private/shared cache levels below the directory.
#[derive(Debug)]
pub struct Hierarchy {
    /// `levels[l]` holds the banks at level `l`, indexed by `bank_id`.
    levels: Vec<Vec<Bank>>,
    /// `share factor` per level, mirrored from configuration for the
    /// `parent_bank`/`bank_for_core` index arithmetic.
    share: Vec<usize>,
    /// One counter set per level, summed across that level's banks; the
    /// protocol increments these, never the banks themselves (spec.md §4.3).
    counters: Vec<LevelCounters>,
    /// Per-level access latency, mirrored from configuration; charged by the
    /// coherence engine on every probe at that level regardless of hit/miss.
    access_time: Vec<u64>,
}

impl Hierarchy {
    /// Builds every level's banks from `configs`, one entry per level,
    /// ordered closest-to-core first.
    ///
    /// # Errors
    ///
    /// Propagates [`crate::common::error::CoreError::ConfigurationInvalid`]
    /// from [`Bank::new`] if any level's geometry doesn't form a valid
    /// power-of-two set count.
    pub fn new(configs: &[CacheLevelConfig], num_cores: usize) -> Result<Self> {
        let mut levels = Vec::with_capacity(configs.len());
        let mut share = Vec::with_capacity(configs.len());
        let mut counters = Vec::with_capacity(configs.len());
        let mut access_time = Vec::with_capacity(configs.len());

        for config in configs {
            let num_banks = num_cores.div_ceil(config.share.max(1));
            let num_sets = config.num_sets()?;
            let mut banks = Vec::with_capacity(num_banks);
            for _ in 0..num_banks {
                banks.push(Bank::new(num_sets, config.num_ways, config.block_size)?);
            }
            levels.push(banks);
            share.push(config.share.max(1));
            counters.push(LevelCounters::new());
            access_time.push(config.access_time);
        }

        Ok(Self {
            levels,
            share,
            counters,
            access_time,
        })
    }

    /// Number of levels in this hierarchy.
    #[must_use]
    pub fn num_levels(&self) -> usize {
        self.levels.len()
    }

    /// The bank id at `level` that serves core `core_id`.
    #[must_use]
    pub fn bank_for_core(&self, level: usize, core_id: usize) -> usize {
        core_id / self.share[level]
    }

    /// Returns the bank at `level`/`bank_id`.
    #[must_use]
    pub fn bank(&self, level: usize, bank_id: usize) -> &Bank {
        &self.levels[level][bank_id]
    }

    /// Returns the bank at `level` serving `core_id` directly.
    #[must_use]
    pub fn bank_for(&self, level: usize, core_id: usize) -> &Bank {
        self.bank(level, self.bank_for_core(level, core_id))
    }

    /// Whether `level` is the last private/shared level before the
    /// directory is reached.
    #[must_use]
    pub fn is_last_level(&self, level: usize) -> bool {
        level + 1 == self.levels.len()
    }

    /// The access/miss/eviction/writeback counters for `level`, summed
    /// across every bank at that level.
    #[must_use]
    pub fn counters(&self, level: usize) -> &LevelCounters {
        &self.counters[level]
    }

    /// The configured access latency for `level`, charged on every probe
    /// there regardless of hit/miss.
    #[must_use]
    pub fn access_time(&self, level: usize) -> u64 {
        self.access_time[level]
    }
}

#[cfg(test)]
mod tests {
    use super::Hierarchy;
    use crate::config::CacheLevelConfig;

    fn configs() -> Vec<CacheLevelConfig> {
        vec![
            CacheLevelConfig {
                level: 0,
                share: 1,
                access_time: 1,
                size: 4096,
                block_size: 64,
                num_ways: 2,
            },
            CacheLevelConfig {
                level: 1,
                share: 4,
                access_time: 8,
                size: 8192,
                block_size: 64,
                num_ways: 2,
            },
        ]
    }

    #[test]
    fn private_level_has_one_bank_per_core() {
        let hierarchy = Hierarchy::new(&configs(), 4).unwrap();
        assert_eq!(hierarchy.bank_for_core(0, 0), 0);
        assert_eq!(hierarchy.bank_for_core(0, 3), 3);
    }

    #[test]
    fn shared_level_maps_every_core_to_bank_zero() {
        let hierarchy = Hierarchy::new(&configs(), 4).unwrap();
        for core in 0..4 {
            assert_eq!(hierarchy.bank_for_core(1, core), 0);
        }
    }

    #[test]
    fn last_level_is_correctly_identified() {
        let hierarchy = Hierarchy::new(&configs(), 4).unwrap();
        assert!(!hierarchy.is_last_level(0));
        assert!(hierarchy.is_last_level(1));
    }
}
