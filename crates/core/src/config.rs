//! Configuration for the uncore simulator.
//!
//! This module defines the configuration record tree recognised by the core
//! (spec.md §6): simulator-wide knobs, the system/protocol choice, the
//! network, and a level-by-level description of the cache hierarchy, the
//! directory, and the TLB. Configuration is supplied as JSON (the CLI's
//! choice of wire format — spec.md leaves format at the caller's discretion
//! and explicitly keeps XML parsing out of core scope) and validated once,
//! before simulation starts; a bad configuration is always fatal
//! (`CoreError::ConfigurationInvalid`), never a retryable condition.

use serde::Deserialize;

use crate::common::error::{CoreError, Result};

/// Default configuration constants.
///
/// These mirror the example configuration spec.md §8 uses for its
/// end-to-end scenarios (4 cores, 2 levels, 32 KiB/4-way L1, 256 KiB/8-way
/// L2, 100-cycle DRAM, 2-D mesh with unit router/link/header delay).
mod defaults {
    pub const MAX_MSG_SIZE: usize = 4096;
    pub const NUM_RECV_THREADS: usize = 4;
    pub const THREAD_SYNC_INTERVAL: u64 = 1000;
    pub const PROC_SYNC_INTERVAL: u64 = 10_000;
    pub const SYSCALL_COST: u64 = 100;
    pub const WARMUP_REFS: u64 = 0;

    pub const MAX_NUM_SHARERS: usize = 8;
    pub const PAGE_SIZE: usize = 4096;
    pub const CPI_NONMEM: u64 = 1;
    pub const DRAM_ACCESS_TIME: u64 = 100;
    pub const NUM_LEVELS: usize = 2;
    pub const NUM_CORES: usize = 4;
    pub const FREQ_GHZ: f64 = 2.0;
    pub const BUS_LATENCY: u64 = 1;
    pub const PAGE_MISS_DELAY: u64 = 30;

    pub const DATA_WIDTH: usize = 8;
    pub const HEADER_FLITS: usize = 1;
    pub const ROUTER_DELAY: u64 = 1;
    pub const LINK_DELAY: u64 = 1;
    pub const INJECT_DELAY: u64 = 1;

    pub const L1_ACCESS_TIME: u64 = 1;
    pub const L1_SIZE: usize = 32 * 1024;
    pub const L1_WAYS: usize = 4;
    pub const L2_ACCESS_TIME: u64 = 8;
    pub const L2_SIZE: usize = 256 * 1024;
    pub const L2_WAYS: usize = 8;
    pub const BLOCK_SIZE: usize = 64;

    pub const DIRECTORY_ACCESS_TIME: u64 = 10;
    pub const DIRECTORY_SIZE: usize = 1024 * 1024;
    pub const DIRECTORY_WAYS: usize = 16;

    pub const TLB_ACCESS_TIME: u64 = 1;
    pub const TLB_SIZE: usize = 64;
    pub const TLB_WAYS: usize = 4;
}

/// Coherence substrate: whether the LLC is backed by a per-node directory
/// reached over the network, or a shared bus all cores snoop directly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SysType {
    /// Home-node directory, reached over the interconnect (`mesi_directory`).
    #[default]
    Directory,
    /// Shared bus, snooped by every LLC slice (`mesi_bus`).
    Bus,
}

/// Sharer-set representation used by the directory/shared-LLC.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ProtocolType {
    /// Exact sharer set (a bitset over LLC banks); never degrades to `B`.
    #[default]
    FullMap,
    /// Fixed-width sharer list; overflow degrades the line to `B` and
    /// forces future coherence events at that line to broadcast.
    #[serde(alias = "LimitedPointer")]
    LimitedPtr,
}

/// Network mesh dimensionality.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum NetType {
    /// 2-D mesh, width `ceil(sqrt(N))`, XY dimension-order routing.
    #[default]
    Mesh2D,
    /// 3-D mesh, width `ceil(cbrt(N))`, XYZ dimension-order routing.
    Mesh3D,
}

/// Root configuration structure.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Simulator-wide knobs (batching, sync intervals, warm-up).
    pub simulator: SimulatorConfig,
    /// System/protocol choice and global hierarchy parameters.
    pub system: SystemConfig,
    /// Interconnect (mesh topology and per-hop/per-link timing).
    pub network: NetworkConfig,
    /// Per-level cache configuration, L1 first, LLC-adjacent level last.
    /// Must have exactly `system.num_levels` entries.
    #[serde(default = "Config::default_cache_levels")]
    pub cache: Vec<CacheLevelConfig>,
    /// Directory (or shared-LLC) bank configuration.
    #[serde(default = "CacheLevelConfig::default_directory")]
    pub directory: CacheLevelConfig,
    /// TLB configuration (ignored when `system.tlb_enable` is false).
    #[serde(default = "CacheLevelConfig::default_tlb")]
    pub tlb: CacheLevelConfig,
}

impl Config {
    fn default_cache_levels() -> Vec<CacheLevelConfig> {
        vec![
            CacheLevelConfig::default_l1(),
            CacheLevelConfig::default_l2(),
        ]
    }

    /// Validates cross-field invariants that a `Deserialize` impl alone
    /// cannot express: level count matches `num_levels`, all sizes are
    /// powers of two, and sharer limits are sane.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::ConfigurationInvalid`] describing the first
    /// violation found.
    pub fn validate(&self) -> Result<()> {
        if self.system.num_levels == 0 {
            return Err(CoreError::ConfigurationInvalid(
                "system.num_levels must be at least 1".into(),
            ));
        }
        if self.cache.len() != self.system.num_levels {
            return Err(CoreError::ConfigurationInvalid(format!(
                "cache has {} levels but system.num_levels is {}",
                self.cache.len(),
                self.system.num_levels
            )));
        }
        if self.system.num_cores == 0 {
            return Err(CoreError::ConfigurationInvalid(
                "system.num_cores must be at least 1".into(),
            ));
        }
        for level in &self.cache {
            level.validate()?;
        }
        self.directory.validate()?;
        if self.system.tlb_enable {
            self.tlb.validate()?;
        }
        if self.system.protocol_type == ProtocolType::LimitedPtr && self.system.max_num_sharers == 0
        {
            return Err(CoreError::ConfigurationInvalid(
                "system.max_num_sharers must be at least 1 under LIMITED_PTR".into(),
            ));
        }
        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            simulator: SimulatorConfig::default(),
            system: SystemConfig::default(),
            network: NetworkConfig::default(),
            cache: Self::default_cache_levels(),
            directory: CacheLevelConfig::default_directory(),
            tlb: CacheLevelConfig::default_tlb(),
        }
    }
}

/// Simulator-wide, protocol-independent settings.
#[derive(Debug, Clone, Deserialize)]
pub struct SimulatorConfig {
    /// Maximum size, in bytes, of a batched inter-process message (external
    /// transport concern; carried here only because it is a recognised
    /// configuration option, per spec.md §6).
    #[serde(default = "SimulatorConfig::default_max_msg_size")]
    pub max_msg_size: usize,
    /// Number of receiver threads driving reference batches concurrently.
    #[serde(default = "SimulatorConfig::default_num_recv_threads")]
    pub num_recv_threads: usize,
    /// Cycles between thread synchronization checkpoints.
    #[serde(default = "SimulatorConfig::default_thread_sync_interval")]
    pub thread_sync_interval: u64,
    /// Cycles between process synchronization checkpoints.
    #[serde(default = "SimulatorConfig::default_proc_sync_interval")]
    pub proc_sync_interval: u64,
    /// Fixed cost, in cycles, billed for a syscall-classed reference.
    #[serde(default = "SimulatorConfig::default_syscall_cost")]
    pub syscall_cost: u64,
    /// Number of references per core to run before hierarchy statistics
    /// start counting (cold-start warm-up, not present in spec.md's
    /// distillation but standard in PriME-derived simulators).
    #[serde(default = "SimulatorConfig::default_warmup_refs")]
    pub warmup_refs: u64,
}

impl SimulatorConfig {
    fn default_max_msg_size() -> usize {
        defaults::MAX_MSG_SIZE
    }
    fn default_num_recv_threads() -> usize {
        defaults::NUM_RECV_THREADS
    }
    fn default_thread_sync_interval() -> u64 {
        defaults::THREAD_SYNC_INTERVAL
    }
    fn default_proc_sync_interval() -> u64 {
        defaults::PROC_SYNC_INTERVAL
    }
    fn default_syscall_cost() -> u64 {
        defaults::SYSCALL_COST
    }
    fn default_warmup_refs() -> u64 {
        defaults::WARMUP_REFS
    }
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        Self {
            max_msg_size: defaults::MAX_MSG_SIZE,
            num_recv_threads: defaults::NUM_RECV_THREADS,
            thread_sync_interval: defaults::THREAD_SYNC_INTERVAL,
            proc_sync_interval: defaults::PROC_SYNC_INTERVAL,
            syscall_cost: defaults::SYSCALL_COST,
            warmup_refs: defaults::WARMUP_REFS,
        }
    }
}

/// System and protocol-level configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct SystemConfig {
    /// Bus-snoop vs. directory coherence substrate.
    #[serde(default)]
    pub sys_type: SysType,
    /// Full-map vs. limited-pointer sharer tracking.
    #[serde(default)]
    pub protocol_type: ProtocolType,
    /// Sharer budget before a `LIMITED_PTR` line degrades to broadcast.
    #[serde(default = "SystemConfig::default_max_num_sharers")]
    pub max_num_sharers: usize,
    /// Page size in bytes, used by the TLB/page-table address decomposition.
    #[serde(default = "SystemConfig::default_page_size")]
    pub page_size: usize,
    /// Whether references are translated through the TLB/page table before
    /// entering the coherence engine.
    #[serde(default = "SystemConfig::default_tlb_enable")]
    pub tlb_enable: bool,
    /// Whether the LLC is a shared cache (extra `V` state) rather than a
    /// pure directory.
    #[serde(default)]
    pub shared_llc: bool,
    /// Whether the emitted report includes per-set/per-line detail.
    #[serde(default)]
    pub verbose_report: bool,
    /// Fixed cost, in cycles, billed per non-memory instruction.
    #[serde(default = "SystemConfig::default_cpi_nonmem")]
    pub cpi_nonmem: u64,
    /// Fixed DRAM access latency in cycles.
    #[serde(default = "SystemConfig::default_dram_access_time")]
    pub dram_access_time: u64,
    /// Number of cache levels below (and including) the LLC-adjacent level.
    #[serde(default = "SystemConfig::default_num_levels")]
    pub num_levels: usize,
    /// Number of core slots (and L1 banks).
    #[serde(default = "SystemConfig::default_num_cores")]
    pub num_cores: usize,
    /// Nominal core frequency in GHz (report-only; does not affect timing).
    #[serde(default = "SystemConfig::default_freq")]
    pub freq: f64,
    /// Bus access latency in cycles, used only when `sys_type == BUS`.
    #[serde(default = "SystemConfig::default_bus_latency")]
    pub bus_latency: u64,
    /// Fixed cost, in cycles, billed on a TLB miss in addition to the page
    /// table walk itself.
    #[serde(default = "SystemConfig::default_page_miss_delay")]
    pub page_miss_delay: u64,
}

impl SystemConfig {
    fn default_max_num_sharers() -> usize {
        defaults::MAX_NUM_SHARERS
    }
    fn default_page_size() -> usize {
        defaults::PAGE_SIZE
    }
    fn default_tlb_enable() -> bool {
        true
    }
    fn default_cpi_nonmem() -> u64 {
        defaults::CPI_NONMEM
    }
    fn default_dram_access_time() -> u64 {
        defaults::DRAM_ACCESS_TIME
    }
    fn default_num_levels() -> usize {
        defaults::NUM_LEVELS
    }
    fn default_num_cores() -> usize {
        defaults::NUM_CORES
    }
    fn default_freq() -> f64 {
        defaults::FREQ_GHZ
    }
    fn default_bus_latency() -> u64 {
        defaults::BUS_LATENCY
    }
    fn default_page_miss_delay() -> u64 {
        defaults::PAGE_MISS_DELAY
    }
}

impl Default for SystemConfig {
    fn default() -> Self {
        Self {
            sys_type: SysType::default(),
            protocol_type: ProtocolType::default(),
            max_num_sharers: defaults::MAX_NUM_SHARERS,
            page_size: defaults::PAGE_SIZE,
            tlb_enable: true,
            shared_llc: false,
            verbose_report: false,
            cpi_nonmem: defaults::CPI_NONMEM,
            dram_access_time: defaults::DRAM_ACCESS_TIME,
            num_levels: defaults::NUM_LEVELS,
            num_cores: defaults::NUM_CORES,
            freq: defaults::FREQ_GHZ,
            bus_latency: defaults::BUS_LATENCY,
            page_miss_delay: defaults::PAGE_MISS_DELAY,
        }
    }
}

/// Interconnect (mesh network) configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct NetworkConfig {
    /// 2-D or 3-D mesh.
    #[serde(default)]
    pub net_type: NetType,
    /// Bytes transferred per flit.
    #[serde(default = "NetworkConfig::default_data_width")]
    pub data_width: usize,
    /// Flits consumed by a packet header.
    #[serde(default = "NetworkConfig::default_header_flits")]
    pub header_flits: usize,
    /// Fixed per-hop router delay in cycles.
    #[serde(default = "NetworkConfig::default_router_delay")]
    pub router_delay: u64,
    /// Fixed per-hop link propagation delay in cycles (before queueing).
    #[serde(default = "NetworkConfig::default_link_delay")]
    pub link_delay: u64,
    /// Fixed injection delay charged once at the sender.
    #[serde(default = "NetworkConfig::default_inject_delay")]
    pub inject_delay: u64,
}

impl NetworkConfig {
    fn default_data_width() -> usize {
        defaults::DATA_WIDTH
    }
    fn default_header_flits() -> usize {
        defaults::HEADER_FLITS
    }
    fn default_router_delay() -> u64 {
        defaults::ROUTER_DELAY
    }
    fn default_link_delay() -> u64 {
        defaults::LINK_DELAY
    }
    fn default_inject_delay() -> u64 {
        defaults::INJECT_DELAY
    }
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            net_type: NetType::default(),
            data_width: defaults::DATA_WIDTH,
            header_flits: defaults::HEADER_FLITS,
            router_delay: defaults::ROUTER_DELAY,
            link_delay: defaults::LINK_DELAY,
            inject_delay: defaults::INJECT_DELAY,
        }
    }
}

/// Configuration shared by every cache-shaped bank: a data cache level, the
/// directory/shared-LLC bank, and the TLB.
#[derive(Debug, Clone, Deserialize)]
pub struct CacheLevelConfig {
    /// Level number (0 = closest to the core); informational, used for
    /// report labeling.
    pub level: usize,
    /// Number of child banks each bank at this level aggregates (the
    /// "sharing factor"); 1 for a private L1, `num_cores` for a single LLC
    /// slice shared by everyone.
    pub share: usize,
    /// Access latency in cycles, charged on every probe at this level
    /// regardless of hit/miss.
    pub access_time: u64,
    /// Total bank size in bytes.
    pub size: usize,
    /// Block size in bytes (page size, for the TLB).
    pub block_size: usize,
    /// Associativity.
    pub num_ways: usize,
}

impl CacheLevelConfig {
    fn default_l1() -> Self {
        Self {
            level: 0,
            share: 1,
            access_time: defaults::L1_ACCESS_TIME,
            size: defaults::L1_SIZE,
            block_size: defaults::BLOCK_SIZE,
            num_ways: defaults::L1_WAYS,
        }
    }

    fn default_l2() -> Self {
        Self {
            level: 1,
            // Private per core, like L1: spec.md's example scenarios need a
            // miss to clear both private levels before reaching the shared
            // directory, so the only bank with `share == num_cores` is
            // `default_directory` below.
            share: 1,
            access_time: defaults::L2_ACCESS_TIME,
            size: defaults::L2_SIZE,
            block_size: defaults::BLOCK_SIZE,
            num_ways: defaults::L2_WAYS,
        }
    }

    fn default_directory() -> Self {
        Self {
            level: defaults::NUM_LEVELS,
            share: defaults::NUM_CORES,
            access_time: defaults::DIRECTORY_ACCESS_TIME,
            size: defaults::DIRECTORY_SIZE,
            block_size: defaults::BLOCK_SIZE,
            num_ways: defaults::DIRECTORY_WAYS,
        }
    }

    fn default_tlb() -> Self {
        Self {
            level: 0,
            share: 1,
            access_time: defaults::TLB_ACCESS_TIME,
            size: defaults::TLB_SIZE * defaults::PAGE_SIZE,
            block_size: defaults::PAGE_SIZE,
            num_ways: defaults::TLB_WAYS,
        }
    }

    /// Number of sets implied by `size / (block_size * num_ways)`.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::ConfigurationInvalid`] if any dimension is zero
    /// or the resulting set count is not a power of two (the address
    /// decomposition in `common::addr` requires it).
    pub fn num_sets(&self) -> Result<usize> {
        self.validate()?;
        Ok(self.size / (self.block_size * self.num_ways))
    }

    fn validate(&self) -> Result<()> {
        if self.size == 0 || self.block_size == 0 || self.num_ways == 0 {
            return Err(CoreError::ConfigurationInvalid(format!(
                "cache level {}: size, block_size, and num_ways must all be nonzero",
                self.level
            )));
        }
        if !self.block_size.is_power_of_two() {
            return Err(CoreError::ConfigurationInvalid(format!(
                "cache level {}: block_size {} is not a power of two",
                self.level, self.block_size
            )));
        }
        let num_lines = self.size / self.block_size;
        if num_lines % self.num_ways != 0 {
            return Err(CoreError::ConfigurationInvalid(format!(
                "cache level {}: size/block_size ({num_lines}) is not a multiple of num_ways ({})",
                self.level, self.num_ways
            )));
        }
        let num_sets = num_lines / self.num_ways;
        if !num_sets.is_power_of_two() {
            return Err(CoreError::ConfigurationInvalid(format!(
                "cache level {}: implied set count {num_sets} is not a power of two",
                self.level
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::{Config, ProtocolType};

    #[test]
    fn default_config_validates() {
        Config::default().validate().expect("default config must be valid");
    }

    #[test]
    fn mismatched_level_count_is_rejected() {
        let mut cfg = Config::default();
        cfg.system.num_levels = 3;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn non_power_of_two_sets_is_rejected() {
        let mut cfg = Config::default();
        cfg.cache[0].num_ways = 3;
        cfg.cache[0].size = 3 * 64 * 5; // 5 sets, not a power of two
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn limited_ptr_requires_nonzero_sharer_budget() {
        let mut cfg = Config::default();
        cfg.system.protocol_type = ProtocolType::LimitedPtr;
        cfg.system.max_num_sharers = 0;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn deserializes_from_json_like_the_cli_would_feed_it() {
        let json = r#"{
            "simulator": {},
            "system": { "sys_type": "DIRECTORY", "protocol_type": "LIMITED_PTR", "max_num_sharers": 2 },
            "network": { "net_type": "MESH_2D" },
            "cache": [
                { "level": 0, "share": 1, "access_time": 1, "size": 32768, "block_size": 64, "num_ways": 4 },
                { "level": 1, "share": 4, "access_time": 8, "size": 262144, "block_size": 64, "num_ways": 8 }
            ],
            "directory": { "level": 2, "share": 4, "access_time": 10, "size": 1048576, "block_size": 64, "num_ways": 16 },
            "tlb": { "level": 0, "share": 1, "access_time": 1, "size": 262144, "block_size": 4096, "num_ways": 4 }
        }"#;
        let cfg: Config = serde_json::from_str(json).expect("valid json");
        cfg.validate().expect("valid config");
        assert_eq!(cfg.system.max_num_sharers, 2);
        assert_eq!(cfg.system.protocol_type, ProtocolType::LimitedPtr);
    }
}
