//! Address translation: per-core TLBs backed by a single shared page table
//! (spec.md C4/C5).

/// The system-wide flat page table.
pub mod page_table;

/// Per-core translation lookaside buffer.
pub mod tlb;

pub use page_table::PageTable;
pub use tlb::Tlb;

use crate::common::error::Result;
use crate::config::{Config, SystemConfig};

/// Owns one TLB per core plus the single shared page table, and resolves a
/// virtual address to a physical one, reporting whether the TLB was hit and
/// the delay incurred.
#[derive(Debug)]
pub struct Mmu {
    tlbs: Vec<Tlb>,
    page_table: PageTable,
    enabled: bool,
    tlb_access_time: u64,
    page_miss_delay: u64,
    page_size: usize,
}

/// The result of a single address translation.
#[derive(Debug, Clone, Copy)]
pub struct Translation {
    /// The resolved physical address.
    pub phys_addr: u64,
    /// Whether the TLB satisfied the lookup without a page-table walk.
    pub tlb_hit: bool,
    /// Total delay incurred by the translation (`tlb_access_time`, plus
    /// `page_miss_delay` on a miss).
    pub delay: u64,
}

impl Mmu {
    /// Builds an MMU sized for `config.system.num_cores` cores.
    ///
    /// # Errors
    ///
    /// Propagates [`crate::common::error::CoreError::ConfigurationInvalid`]
    /// from [`Tlb::new`].
    pub fn new(config: &Config) -> Result<Self> {
        let SystemConfig {
            num_cores,
            tlb_enable,
            page_miss_delay,
            ..
        } = config.system;

        let tlb_cfg = &config.tlb;
        let num_sets = tlb_cfg.num_sets()?;
        let mut tlbs = Vec::with_capacity(num_cores);
        for _ in 0..num_cores {
            tlbs.push(Tlb::new(num_sets, tlb_cfg.num_ways, config.system.page_size)?);
        }

        Ok(Self {
            tlbs,
            page_table: PageTable::new(config.system.page_size),
            enabled: tlb_enable,
            tlb_access_time: tlb_cfg.access_time,
            page_miss_delay,
            page_size: config.system.page_size,
        })
    }

    /// Translates `vaddr` issued by `owner_process` on `core_id`.
    ///
    /// # Panics
    ///
    /// Panics if `core_id` is out of range for the configured core count.
    pub fn translate(&self, core_id: usize, owner_process: u32, vaddr: u64, time: u64) -> Translation {
        if !self.enabled {
            return Translation {
                phys_addr: vaddr,
                tlb_hit: true,
                delay: 0,
            };
        }

        let page_bits = self.page_size.trailing_zeros();
        let tlb = &self.tlbs[core_id];
        if let Some(frame) = tlb.lookup(owner_process, vaddr, time) {
            let offset = vaddr & (self.page_size as u64 - 1);
            return Translation {
                phys_addr: (frame << page_bits) | offset,
                tlb_hit: true,
                delay: self.tlb_access_time,
            };
        }

        let phys_addr = self.page_table.translate(owner_process, vaddr);
        tlb.insert(owner_process, vaddr, phys_addr >> page_bits, time);
        Translation {
            phys_addr,
            tlb_hit: false,
            delay: self.tlb_access_time + self.page_miss_delay,
        }
    }

    /// The shared page table backing every core's translations.
    #[must_use]
    pub const fn page_table(&self) -> &PageTable {
        &self.page_table
    }
}

#[cfg(test)]
mod tests {
    use super::Mmu;
    use crate::config::Config;

    #[test]
    fn disabled_tlb_is_a_pass_through() {
        let mut cfg = Config::default();
        cfg.system.tlb_enable = false;
        let mmu = Mmu::new(&cfg).unwrap();
        let t = mmu.translate(0, 1, 0xABCD, 0);
        assert_eq!(t.phys_addr, 0xABCD);
        assert!(t.tlb_hit);
        assert_eq!(t.delay, 0);
    }

    #[test]
    fn repeated_translation_hits_the_tlb() {
        let cfg = Config::default();
        let mmu = Mmu::new(&cfg).unwrap();
        let first = mmu.translate(0, 1, 0x1000, 0);
        assert!(!first.tlb_hit);
        let second = mmu.translate(0, 1, 0x1000, 1);
        assert!(second.tlb_hit);
        assert_eq!(first.phys_addr, second.phys_addr);
    }

    #[test]
    fn two_processes_on_the_same_core_get_distinct_translations() {
        let cfg = Config::default();
        let mmu = Mmu::new(&cfg).unwrap();
        let a = mmu.translate(0, 1, 0x1000, 0);
        let b = mmu.translate(0, 2, 0x1000, 1);
        assert_ne!(a.phys_addr, b.phys_addr);
        assert!(!b.tlb_hit);
    }
}
