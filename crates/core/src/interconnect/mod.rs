//! The on-chip interconnect: contended links and the mesh network that ties
//! cores, cache banks, and the directory together (spec.md C2/C3).

/// A single contended link (or shared bus segment): a queueing model plus a
/// fixed propagation delay.
pub mod link;

/// The mesh network: topology, dimension-order routing, and packet framing.
pub mod network;

/// Aggregate traffic counters for the network.
pub mod stats;

pub use link::Link;
pub use network::Network;
pub use stats::NetworkStats;
