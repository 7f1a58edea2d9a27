//! Coherent cache hierarchy, interconnect, and thread scheduler for a
//! trace-driven, cycle-approximate many-core simulator.
//!
//! This crate implements the uncore subsystem described by the project's
//! design: a multi-level inclusive cache hierarchy, two coherence
//! protocols (bus-snoop MESI and directory-based MESI, with an optional
//! limited-pointer/broadcast degradation), a contended on-chip
//! interconnect, a TLB/page-table translation layer, a fixed-latency DRAM
//! model, and the thread scheduler that binds incoming reference streams
//! to core slots. It does not include a front-end instrumentation tool,
//! an inter-process transport, or a trace format of its own opinion — the
//! `sim` module and the `coresim` CLI binary supply a concrete one so the
//! workspace runs end to end.
//!
//! 1. **Common:** addresses, the `InsMem` reference type, and error kinds.
//! 2. **Config:** the JSON-deserializable configuration record tree.
//! 3. **Queue:** analytical queueing-delay models for contended resources.
//! 4. **Interconnect:** contended links and the mesh network built from them.
//! 5. **Cache:** set-associative banks, the multi-level hierarchy, and the directory.
//! 6. **Coherence:** the bus-MESI and directory-MESI protocol engines.
//! 7. **MMU:** per-core TLBs backed by a shared page table.
//! 8. **Scheduler:** the `(process, thread) -> core slot` allocator.
//! 9. **Dispatcher:** `Uncore`, the single entry point per memory reference.
//! 10. **Sim:** trace parsing, the top-level `Simulator`, and report rendering.
//! 11. **Stats:** simulation-wide reference counters.

/// Common types shared across the uncore subsystem: addresses, the
/// `InsMem` reference type, and error kinds.
pub mod common;
/// The JSON-deserializable configuration record tree.
pub mod config;
/// The coherence engine: bus-snoop and directory-based MESI.
pub mod coherence;
/// The cache subsystem: lines, banks, the multi-level hierarchy, and the directory.
pub mod cache;
/// The uncore dispatcher: the single entry point invoked per reference.
pub mod dispatcher;
/// The on-chip interconnect: contended links and the mesh network.
pub mod interconnect;
/// Address translation: per-core TLBs backed by a shared page table.
pub mod mmu;
/// Analytical queueing models for contended resources.
pub mod queue;
/// The thread scheduler: a bijection between `(process, thread)` and core slots.
pub mod scheduler;
/// Simulation: trace parsing, the top-level `Simulator`, and report rendering.
pub mod sim;
/// Simulation-wide statistics collection.
pub mod stats;

/// Root configuration type; use `Config::default()` or deserialize from JSON.
pub use crate::config::Config;
/// The uncore dispatcher: MMU plus coherence engine, billed per reference.
pub use crate::dispatcher::Uncore;
/// Textual report renderer over a simulator's statistics.
pub use crate::sim::report::Report;
/// Top-level simulator; owns the uncore, the thread scheduler, and statistics.
pub use crate::sim::simulator::Simulator;
