//! The coherence engine: bus-snoop and directory-based MESI, dispatched on
//! `system.sys_type` (spec.md C7/§4.5).

/// Bus-snoop MESI engine.
pub mod bus_mesi;

/// Directory-based MESI engine.
pub mod directory_mesi;

/// Inclusion-property helpers shared by both engines.
pub mod inclusion;

pub use bus_mesi::BusMesi;
pub use directory_mesi::DirectoryMesi;

use crate::common::error::Result;
use crate::common::reference::InsMem;
use crate::config::{Config, SysType};

/// The coherence engine for one simulated system: exactly one of the two
/// protocols, selected once at construction time from `config.system.sys_type`.
#[derive(Debug)]
pub enum CoherenceEngine {
    /// Bus-snoop MESI.
    Bus(BusMesi),
    /// Directory-based MESI.
    Directory(DirectoryMesi),
}

impl CoherenceEngine {
    /// Builds the coherence engine configured protocol.
    ///
    /// # Errors
    ///
    /// Propagates [`crate::common::error::CoreError::ConfigurationInvalid`]
    /// from whichever engine is selected.
    pub fn new(config: &Config) -> Result<Self> {
        match config.system.sys_type {
            SysType::Bus => Ok(Self::Bus(BusMesi::new(config)?)),
            SysType::Directory => Ok(Self::Directory(DirectoryMesi::new(config)?)),
        }
    }

    /// Services one reference from `core_id`, returning the total delay in
    /// cycles.
    pub fn access(&self, core_id: usize, reference: InsMem, time: u64) -> u64 {
        match self {
            Self::Bus(engine) => engine.access(core_id, reference, time),
            Self::Directory(engine) => engine.access(core_id, reference, time),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::CoherenceEngine;
    use crate::common::reference::{InsMem, RefKind};
    use crate::config::{Config, SysType};

    #[test]
    fn dispatches_to_the_configured_protocol() {
        let mut bus_cfg = Config::default();
        bus_cfg.system.sys_type = SysType::Bus;
        bus_cfg.system.num_cores = 2;
        let bus_engine = CoherenceEngine::new(&bus_cfg).unwrap();
        assert!(matches!(bus_engine, CoherenceEngine::Bus(_)));

        let mut dir_cfg = Config::default();
        dir_cfg.system.sys_type = SysType::Directory;
        dir_cfg.system.num_cores = 2;
        let dir_engine = CoherenceEngine::new(&dir_cfg).unwrap();
        assert!(matches!(dir_engine, CoherenceEngine::Directory(_)));
    }

    #[test]
    fn both_protocols_service_a_cold_access() {
        for sys_type in [SysType::Bus, SysType::Directory] {
            let mut cfg = Config::default();
            cfg.system.sys_type = sys_type;
            cfg.system.num_cores = 2;
            let engine = CoherenceEngine::new(&cfg).unwrap();
            let delay = engine.access(0, InsMem::new(RefKind::Read, 1, 0x4000), 0);
            assert!(delay > 0);
        }
    }
}
