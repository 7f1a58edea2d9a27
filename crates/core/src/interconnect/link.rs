//! A single contended link.
//!
//! Used two ways: as a mesh hop between adjacent routers, and as the whole
//! interconnect when `system.sys_type == BUS` (spec.md §4.2's bus variant,
//! one shared link every core and the LLC contend for). Either way the
//! contract is the same: hand the link a packet's size and arrival time,
//! get back how long until it clears the link, queueing included.
//!
//! Grounded in the teacher's `Bus::calculate_transit_time` (fixed latency
//! plus `ceil(bytes / width)` transfer cycles), generalized so the fixed
//! part comes from a pluggable [`QueueModel`] instead of being a constant.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use crate::queue::{HistoryQueueModel, QueueModel};

/// Size of the moving-average window backing a link's default
/// [`HistoryQueueModel`] (spec.md §4.1: "the history-tree variant is the
/// default").
const DEFAULT_HISTORY_WINDOW: usize = 64;

/// A contended point-to-point (or shared-bus) link.
///
/// Wrapped in a `Mutex` rather than requiring `&mut self` because every
/// core's uncore access path reaches the same link concurrently; grounded
/// in the teacher test harness's `Arc<Mutex<MockBusDevice>>` pattern for
/// sharing a single simulated device across threads.
#[derive(Debug)]
pub struct Link {
    queue: Mutex<Box<dyn QueueModel + Send>>,
    /// Data transferred per cycle, in bytes.
    data_width: usize,
    /// Fixed propagation delay charged on every transit, in addition to
    /// queueing.
    propagation_delay: u64,
    /// Running total of queueing delay charged by this link, tracked
    /// separately from propagation so a bus variant can report contention
    /// on its own (spec.md §6's `total_bus_contention`).
    total_contention: AtomicU64,
}

impl Link {
    /// Creates a new link backed by the default [`HistoryQueueModel`]
    /// (spec.md §4.1 names the history-tree variant the default queueing
    /// model for a contended resource).
    #[must_use]
    pub fn new(data_width: usize, propagation_delay: u64) -> Self {
        Self {
            queue: Mutex::new(Box::new(HistoryQueueModel::new(DEFAULT_HISTORY_WINDOW))),
            data_width: data_width.max(1),
            propagation_delay,
            total_contention: AtomicU64::new(0),
        }
    }

    /// Creates a new link backed by the given queueing model.
    #[must_use]
    pub fn with_model(
        model: Box<dyn QueueModel + Send>,
        data_width: usize,
        propagation_delay: u64,
    ) -> Self {
        Self {
            queue: Mutex::new(model),
            data_width: data_width.max(1),
            propagation_delay,
            total_contention: AtomicU64::new(0),
        }
    }

    /// Transmits `bytes` across this link, arriving at `time`.
    ///
    /// Returns the total delay (queueing plus propagation plus transfer
    /// time) before the packet clears the far end. Transfer time is
    /// `ceil(bytes / data_width)` cycles.
    ///
    /// # Panics
    ///
    /// Panics if the link's mutex is poisoned by a prior panic on another
    /// thread; this mirrors the rest of the crate's "a poisoned lock means
    /// the simulation is already corrupt" stance.
    pub fn transmit(&self, time: u64, bytes: usize) -> u64 {
        self.transmit_breakdown(time, bytes).1
    }

    /// Same as [`Self::transmit`], but additionally returns the queueing
    /// (contention) component on its own, for callers that report it
    /// separately from propagation/transfer delay.
    ///
    /// # Panics
    ///
    /// Panics under the same condition as [`Self::transmit`].
    pub fn transmit_breakdown(&self, time: u64, bytes: usize) -> (u64, u64) {
        let transfer_cycles = bytes.div_ceil(self.data_width) as u64;
        let processing_time = self.propagation_delay + transfer_cycles;
        let queue_delay = {
            let mut queue = self.queue.lock().expect("link queue mutex poisoned");
            queue.compute_delay(time, processing_time)
        };
        self.total_contention.fetch_add(queue_delay, Ordering::Relaxed);
        (queue_delay, queue_delay + processing_time)
    }

    /// Total queueing delay charged by this link since creation.
    #[must_use]
    pub fn total_contention(&self) -> u64 {
        self.total_contention.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::Link;

    #[test]
    fn single_transit_pays_propagation_and_transfer_only() {
        let link = Link::new(8, 2);
        // 16 bytes at width 8 = 2 transfer cycles, plus 2 propagation.
        assert_eq!(link.transmit(0, 16), 4);
    }

    #[test]
    fn concurrent_transits_queue_behind_each_other() {
        let link = Link::new(8, 1);
        let first = link.transmit(0, 8);
        let second = link.transmit(0, 8);
        assert!(second > first);
    }

    #[test]
    fn partial_flit_rounds_up() {
        let link = Link::new(8, 0);
        // 9 bytes at width 8 needs 2 transfer cycles, not 1.
        assert_eq!(link.transmit(0, 9), 2);
    }
}
