//! The uncore dispatcher: the single entry point a driver calls per
//! reference (spec.md C9). It wires address translation, the coherence
//! engine, and non-memory instruction billing behind one `access` call so
//! nothing upstream has to know whether the system is bus- or
//! directory-coherent, or whether the TLB is even enabled.

use crate::coherence::CoherenceEngine;
use crate::common::error::Result;
use crate::common::reference::InsMem;
use crate::config::Config;
use crate::mmu::Mmu;

/// The uncore: MMU plus coherence engine, billed per reference.
#[derive(Debug)]
pub struct Uncore {
    mmu: Mmu,
    coherence: CoherenceEngine,
    cpi_nonmem: u64,
}

impl Uncore {
    /// Builds the uncore for `config`.
    ///
    /// # Errors
    ///
    /// Propagates [`crate::common::error::CoreError::ConfigurationInvalid`]
    /// from the MMU or coherence engine.
    pub fn new(config: &Config) -> Result<Self> {
        Ok(Self {
            mmu: Mmu::new(config)?,
            coherence: CoherenceEngine::new(config)?,
            cpi_nonmem: config.system.cpi_nonmem,
        })
    }

    /// Services one memory reference issued by `core_id` at `issue_time`
    /// (a virtual address in `reference.addr`). Returns the total delay:
    /// translation plus whatever the coherence engine charges.
    pub fn access(&self, core_id: usize, reference: InsMem, issue_time: u64) -> u64 {
        let translation = self.mmu.translate(core_id, reference.owner_process, reference.addr, issue_time);
        let physical = reference.with_addr(translation.phys_addr);
        translation.delay + self.coherence.access(core_id, physical, issue_time + translation.delay)
    }

    /// Bills a non-memory instruction at the fixed `cpi_nonmem` rate
    /// (spec.md's ambient accounting for instructions that never reach the
    /// coherence engine at all).
    #[must_use]
    pub const fn bill_nonmem(&self, count: u64) -> u64 {
        count * self.cpi_nonmem
    }

    /// The coherence engine backing this uncore, for statistics reporting.
    #[must_use]
    pub const fn coherence(&self) -> &CoherenceEngine {
        &self.coherence
    }

    /// The address-translation unit backing this uncore, for statistics
    /// reporting.
    #[must_use]
    pub const fn mmu(&self) -> &Mmu {
        &self.mmu
    }
}
