//! Aggregate interconnect traffic counters.
//!
//! spec.md §6's report output lists, for the network: access count, total
//! distance, and the router/link/inject/contention delay components
//! separately (plus their average) — so a reader can tell whether a slow
//! simulation is network-bound on hop count, router occupancy, or link
//! queueing. [`Network::transmit`](super::network::Network::transmit)
//! records one call here per packet sent.

use std::sync::atomic::{AtomicU64, Ordering};

/// Running totals of network traffic, updated from any core's access path
/// concurrently. Counters are independent atomics rather than one struct
/// behind a mutex, since each is updated in isolation and no two need to be
/// read consistently with each other.
#[derive(Debug, Default)]
pub struct NetworkStats {
    packets_sent: AtomicU64,
    bytes_sent: AtomicU64,
    total_hops: AtomicU64,
    total_router_delay: AtomicU64,
    total_link_delay: AtomicU64,
    total_inject_delay: AtomicU64,
    total_contention_delay: AtomicU64,
}

impl NetworkStats {
    /// Creates a zeroed counter set.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            packets_sent: AtomicU64::new(0),
            bytes_sent: AtomicU64::new(0),
            total_hops: AtomicU64::new(0),
            total_router_delay: AtomicU64::new(0),
            total_link_delay: AtomicU64::new(0),
            total_inject_delay: AtomicU64::new(0),
            total_contention_delay: AtomicU64::new(0),
        }
    }

    /// Records one packet of `bytes` traversing `hops` links, broken down
    /// into its delay components.
    #[allow(clippy::too_many_arguments)]
    pub fn record(
        &self,
        bytes: u64,
        hops: u64,
        router_delay: u64,
        link_delay: u64,
        inject_delay: u64,
        contention_delay: u64,
    ) {
        self.packets_sent.fetch_add(1, Ordering::Relaxed);
        self.bytes_sent.fetch_add(bytes, Ordering::Relaxed);
        self.total_hops.fetch_add(hops, Ordering::Relaxed);
        self.total_router_delay.fetch_add(router_delay, Ordering::Relaxed);
        self.total_link_delay.fetch_add(link_delay, Ordering::Relaxed);
        self.total_inject_delay.fetch_add(inject_delay, Ordering::Relaxed);
        self.total_contention_delay
            .fetch_add(contention_delay, Ordering::Relaxed);
    }

    /// Total packets sent so far.
    #[must_use]
    pub fn packets_sent(&self) -> u64 {
        self.packets_sent.load(Ordering::Relaxed)
    }

    /// Total bytes transferred so far.
    #[must_use]
    pub fn bytes_sent(&self) -> u64 {
        self.bytes_sent.load(Ordering::Relaxed)
    }

    /// Total hops (mesh distance) traveled by every packet sent so far.
    #[must_use]
    pub fn total_distance(&self) -> u64 {
        self.total_hops.load(Ordering::Relaxed)
    }

    /// Sum of per-hop router delay across every packet sent.
    #[must_use]
    pub fn total_router_delay(&self) -> u64 {
        self.total_router_delay.load(Ordering::Relaxed)
    }

    /// Sum of per-hop link propagation delay across every packet sent.
    #[must_use]
    pub fn total_link_delay(&self) -> u64 {
        self.total_link_delay.load(Ordering::Relaxed)
    }

    /// Sum of injection delay across every packet sent.
    #[must_use]
    pub fn total_inject_delay(&self) -> u64 {
        self.total_inject_delay.load(Ordering::Relaxed)
    }

    /// Sum of queueing (contention) delay across every packet sent.
    #[must_use]
    pub fn total_contention_delay(&self) -> u64 {
        self.total_contention_delay.load(Ordering::Relaxed)
    }

    /// Average hop count per packet, or `0.0` if no packets were sent.
    #[must_use]
    pub fn average_hops(&self) -> f64 {
        let packets = self.packets_sent();
        if packets == 0 {
            0.0
        } else {
            self.total_hops.load(Ordering::Relaxed) as f64 / packets as f64
        }
    }

    /// Average total delay per packet, or `0.0` if no packets were sent.
    #[must_use]
    pub fn average_delay(&self) -> f64 {
        let packets = self.packets_sent();
        if packets == 0 {
            0.0
        } else {
            let total = self.total_router_delay() as f64
                + self.total_link_delay() as f64
                + self.total_inject_delay() as f64
                + self.total_contention_delay() as f64;
            total / packets as f64
        }
    }
}

#[cfg(test)]
mod tests {
    use super::NetworkStats;

    #[test]
    fn empty_stats_report_zero_average() {
        let stats = NetworkStats::new();
        assert_eq!(stats.average_hops(), 0.0);
        assert_eq!(stats.average_delay(), 0.0);
    }

    #[test]
    fn recorded_traffic_accumulates() {
        let stats = NetworkStats::new();
        stats.record(64, 3, 3, 3, 1, 0);
        stats.record(128, 5, 5, 5, 1, 2);
        assert_eq!(stats.packets_sent(), 2);
        assert_eq!(stats.bytes_sent(), 192);
        assert_eq!(stats.average_hops(), 4.0);
        assert!((stats.average_delay() - 10.0).abs() < f64::EPSILON);
    }
}
