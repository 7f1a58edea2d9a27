//! Analytical queueing models for contended resources.
//!
//! spec.md's C1 calls for two variants of the same contract: given the time
//! a packet arrives at a contended resource and how long it takes to
//! service, return how long the packet must additionally wait behind
//! whatever is already queued there. Both variants are driven through the
//! same trait so a [`crate::interconnect::link::Link`] or a cache bank's
//! queueing front end can be generic over which one backs it.

/// History-tree queueing model: tracks a short window of recent service
/// completions and folds them into a moving average (spec.md §4.1,
/// grounded in PriME's `QueueModelBasic`).
pub mod history;

/// Simple queueing model: a single "busy until" watermark (spec.md §4.1).
pub mod simple;

pub use history::HistoryQueueModel;
pub use simple::SimpleQueueModel;

/// A model of queueing delay at a single contended resource.
///
/// Implementors are not required to be thread-safe on their own; callers
/// that share a model across threads wrap it in a `Mutex` (see
/// `interconnect::link::Link`).
pub trait QueueModel {
    /// Computes the additional delay, in cycles, that a packet arriving at
    /// `time` and requiring `processing_time` cycles of service must wait
    /// before it can begin being serviced, given everything queued ahead of
    /// it. Returns `0` if the resource is idle at `time`.
    ///
    /// Calling this advances the model's internal notion of "busy until":
    /// two calls at the same `time` are not independent, the second
    /// observes the first's effect on the queue.
    fn compute_delay(&mut self, time: u64, processing_time: u64) -> u64;
}

#[cfg(test)]
mod contract_tests {
    use super::{HistoryQueueModel, QueueModel, SimpleQueueModel};

    fn idle_resource_adds_no_delay(mut model: impl QueueModel) {
        assert_eq!(model.compute_delay(0, 10), 0);
        assert_eq!(model.compute_delay(1000, 5), 0);
    }

    #[test]
    fn simple_model_idle_adds_no_delay() {
        idle_resource_adds_no_delay(SimpleQueueModel::new());
    }

    #[test]
    fn history_model_idle_adds_no_delay() {
        idle_resource_adds_no_delay(HistoryQueueModel::new(64));
    }

    fn back_to_back_requests_queue(mut model: impl QueueModel) {
        let first = model.compute_delay(0, 10);
        assert_eq!(first, 0);
        // Second packet arrives while the first is still being serviced.
        let second = model.compute_delay(5, 10);
        assert!(second > 0, "overlapping request should see queueing delay");
    }

    #[test]
    fn simple_model_queues_overlapping_requests() {
        back_to_back_requests_queue(SimpleQueueModel::new());
    }

    #[test]
    fn history_model_queues_overlapping_requests() {
        back_to_back_requests_queue(HistoryQueueModel::new(64));
    }
}
