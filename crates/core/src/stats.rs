//! Simulation-wide statistics collection.
//!
//! Counters are independent atomics updated from any core's access path
//! concurrently, mirroring [`crate::interconnect::stats::NetworkStats`]:
//! each one is consistent on its own, and nothing here needs a
//! cross-counter read to be atomic as a group.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

/// Running totals over the whole simulation.
#[derive(Debug)]
pub struct SimStats {
    start_time: Instant,
    references: AtomicU64,
    reads: AtomicU64,
    writes: AtomicU64,
    nonmem_instructions: AtomicU64,
    total_delay: AtomicU64,
    warmup_skipped: AtomicU64,
}

impl Default for SimStats {
    fn default() -> Self {
        Self::new()
    }
}

impl SimStats {
    /// Creates a zeroed counter set, with the clock for host-time reporting
    /// started now.
    #[must_use]
    pub fn new() -> Self {
        Self {
            start_time: Instant::now(),
            references: AtomicU64::new(0),
            reads: AtomicU64::new(0),
            writes: AtomicU64::new(0),
            nonmem_instructions: AtomicU64::new(0),
            total_delay: AtomicU64::new(0),
            warmup_skipped: AtomicU64::new(0),
        }
    }

    /// Records one serviced memory reference.
    pub fn record_reference(&self, is_write: bool, delay: u64) {
        self.references.fetch_add(1, Ordering::Relaxed);
        if is_write {
            self.writes.fetch_add(1, Ordering::Relaxed);
        } else {
            self.reads.fetch_add(1, Ordering::Relaxed);
        }
        self.total_delay.fetch_add(delay, Ordering::Relaxed);
    }

    /// Records `count` non-memory instructions billed in one batch.
    pub fn record_nonmem(&self, count: u64) {
        self.nonmem_instructions.fetch_add(count, Ordering::Relaxed);
    }

    /// Records that one reference was skipped for statistics purposes
    /// because it fell inside the configured warm-up window.
    pub fn record_warmup_skip(&self) {
        self.warmup_skipped.fetch_add(1, Ordering::Relaxed);
    }

    /// Total references serviced (including those skipped for warm-up).
    #[must_use]
    pub fn references(&self) -> u64 {
        self.references.load(Ordering::Relaxed)
    }

    /// Total reads serviced.
    #[must_use]
    pub fn reads(&self) -> u64 {
        self.reads.load(Ordering::Relaxed)
    }

    /// Total writes serviced.
    #[must_use]
    pub fn writes(&self) -> u64 {
        self.writes.load(Ordering::Relaxed)
    }

    /// Total non-memory instructions billed.
    #[must_use]
    pub fn nonmem_instructions(&self) -> u64 {
        self.nonmem_instructions.load(Ordering::Relaxed)
    }

    /// Sum of per-reference delay, in simulated cycles.
    #[must_use]
    pub fn total_delay(&self) -> u64 {
        self.total_delay.load(Ordering::Relaxed)
    }

    /// Mean per-reference delay, or `0.0` if no references were serviced.
    #[must_use]
    pub fn mean_delay(&self) -> f64 {
        let refs = self.references();
        if refs == 0 {
            0.0
        } else {
            self.total_delay() as f64 / refs as f64
        }
    }

    /// References skipped for statistics purposes during warm-up.
    #[must_use]
    pub fn warmup_skipped(&self) -> u64 {
        self.warmup_skipped.load(Ordering::Relaxed)
    }

    /// Wall-clock time elapsed since this counter set was created.
    #[must_use]
    pub fn host_seconds(&self) -> f64 {
        self.start_time.elapsed().as_secs_f64()
    }
}

#[cfg(test)]
mod tests {
    use super::SimStats;

    #[test]
    fn empty_stats_report_zero_mean_delay() {
        let stats = SimStats::new();
        assert_eq!(stats.mean_delay(), 0.0);
    }

    #[test]
    fn recorded_references_accumulate_by_kind() {
        let stats = SimStats::new();
        stats.record_reference(false, 10);
        stats.record_reference(true, 20);
        stats.record_reference(false, 6);
        assert_eq!(stats.references(), 3);
        assert_eq!(stats.reads(), 2);
        assert_eq!(stats.writes(), 1);
        assert_eq!(stats.total_delay(), 36);
        assert!((stats.mean_delay() - 12.0).abs() < f64::EPSILON);
    }

    #[test]
    fn warmup_skips_are_tracked_separately_from_references() {
        let stats = SimStats::new();
        stats.record_warmup_skip();
        stats.record_warmup_skip();
        assert_eq!(stats.warmup_skipped(), 2);
        assert_eq!(stats.references(), 0);
    }
}
