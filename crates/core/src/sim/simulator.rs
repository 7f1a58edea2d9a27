//! The top-level simulator: binds a trace's control and memory-reference
//! records to the thread scheduler and the uncore dispatcher (spec.md §6).
//!
//! One [`Simulator`] owns everything a trace replay needs: the [`Uncore`]
//! (address translation plus coherence engine), the [`ThreadScheduler`]
//! (the `(process, thread) -> core slot` bijection), and simulation-wide
//! [`SimStats`]. [`Simulator::submit`] is the single entry point a driver
//! calls per trace line, mirroring the teacher's one-call-per-tick shape
//! but keyed on trace records instead of clock cycles.

use std::sync::atomic::{AtomicU64, Ordering};

use crate::common::error::{Result, ThreadId};
use crate::config::Config;
use crate::dispatcher::Uncore;
use crate::scheduler::ThreadScheduler;
use crate::stats::SimStats;

use super::trace::{self, TraceRecord};

/// Owns the uncore, the thread scheduler, and simulation-wide statistics,
/// and drives a trace one record at a time.
#[derive(Debug)]
pub struct Simulator {
    uncore: Uncore,
    scheduler: ThreadScheduler,
    stats: SimStats,
    config: Config,
    warmup_refs: u64,
    /// Per-core-slot local cycle counter, advanced by every delay charged
    /// to that core so successive references from the same thread see
    /// realistic queueing against one another.
    core_clocks: Vec<AtomicU64>,
}

impl Simulator {
    /// Builds a simulator from `config`, validating it first.
    ///
    /// # Errors
    ///
    /// Propagates [`crate::common::error::CoreError::ConfigurationInvalid`]
    /// from [`Config::validate`] or from building the uncore.
    pub fn new(config: Config) -> Result<Self> {
        config.validate()?;
        let num_cores = config.system.num_cores;
        let uncore = Uncore::new(&config)?;
        Ok(Self {
            uncore,
            scheduler: ThreadScheduler::new(num_cores),
            stats: SimStats::new(),
            warmup_refs: config.simulator.warmup_refs,
            core_clocks: (0..num_cores).map(|_| AtomicU64::new(0)).collect(),
            config,
        })
    }

    /// Parses and services one JSON-lines trace record.
    ///
    /// Returns the total delay charged for the record (`0` for scheduler
    /// control messages that carry no memory references), or `-1` if the
    /// line is malformed, names a thread with no allocated core slot, or
    /// the thread scheduler's pool is exhausted on a `new_thread` record
    /// (spec.md §6's reference-response contract).
    pub fn submit(&self, line: &str) -> i32 {
        match trace::parse_line(line) {
            Ok(record) => self.dispatch(&record),
            Err(_) => -1,
        }
    }

    fn dispatch(&self, record: &TraceRecord) -> i32 {
        match *record {
            TraceRecord::ProcessStarting { .. }
            | TraceRecord::ProcessFinishing { .. }
            | TraceRecord::InterProcessBarrier
            | TraceRecord::ProgramExiting => 0,
            TraceRecord::NewThread { process, thread } => {
                match self.scheduler.alloc(ThreadId::new(process, thread)) {
                    Ok(_slot) => 0,
                    Err(_) => -1,
                }
            }
            TraceRecord::ThreadFinishing { process, thread } => {
                self.scheduler.dealloc(ThreadId::new(process, thread));
                0
            }
            TraceRecord::MemRequests {
                process,
                thread,
                nonmem_instructions,
                ref refs,
            } => self.service_batch(ThreadId::new(process, thread), nonmem_instructions, refs),
        }
    }

    fn service_batch(
        &self,
        thread: ThreadId,
        nonmem_instructions: u64,
        refs: &[trace::RefRecord],
    ) -> i32 {
        let Some(core_id) = self.scheduler.slot_of(thread) else {
            return -1;
        };

        let mut total_delay = 0u64;
        if nonmem_instructions > 0 {
            let nonmem_delay = self.uncore.bill_nonmem(nonmem_instructions);
            self.core_clocks[core_id].fetch_add(nonmem_delay, Ordering::Relaxed);
            self.stats.record_nonmem(nonmem_instructions);
            total_delay += nonmem_delay;
        }

        for record in refs {
            let ins_mem = record.into_ins_mem();
            let time = self.core_clocks[core_id].load(Ordering::Relaxed);
            let delay = self.uncore.access(core_id, ins_mem, time);
            self.core_clocks[core_id].fetch_add(delay, Ordering::Relaxed);
            total_delay += delay;

            if self.stats.references() >= self.warmup_refs {
                self.stats.record_reference(ins_mem.is_write(), delay);
            } else {
                self.stats.record_warmup_skip();
            }
        }

        total_delay.try_into().unwrap_or(i32::MAX)
    }

    /// The uncore this simulator drives (MMU plus coherence engine), for
    /// statistics reporting.
    #[must_use]
    pub const fn uncore(&self) -> &Uncore {
        &self.uncore
    }

    /// The thread scheduler this simulator drives, for statistics reporting.
    #[must_use]
    pub const fn scheduler(&self) -> &ThreadScheduler {
        &self.scheduler
    }

    /// Simulation-wide reference statistics collected so far.
    #[must_use]
    pub const fn stats(&self) -> &SimStats {
        &self.stats
    }

    /// The configuration this simulator was built from.
    #[must_use]
    pub const fn config(&self) -> &Config {
        &self.config
    }
}

#[cfg(test)]
mod tests {
    use super::Simulator;
    use crate::config::Config;

    fn small_config() -> Config {
        let mut cfg = Config::default();
        cfg.system.num_cores = 2;
        cfg.system.tlb_enable = false;
        cfg
    }

    #[test]
    fn control_messages_cost_nothing() {
        let sim = Simulator::new(small_config()).unwrap();
        assert_eq!(sim.submit(r#"{"type":"process_starting","process":1}"#), 0);
        assert_eq!(sim.submit(r#"{"type":"program_exiting"}"#), 0);
    }

    #[test]
    fn mem_requests_before_new_thread_are_rejected() {
        let sim = Simulator::new(small_config()).unwrap();
        let line = r#"{"type":"mem_requests","process":1,"thread":0,"refs":[
            {"kind":"read","owner_process":1,"addr":4096}
        ]}"#;
        assert_eq!(sim.submit(line), -1);
    }

    #[test]
    fn a_registered_threads_memory_references_are_billed() {
        let sim = Simulator::new(small_config()).unwrap();
        assert_eq!(sim.submit(r#"{"type":"new_thread","process":1,"thread":0}"#), 0);
        let line = r#"{"type":"mem_requests","process":1,"thread":0,"refs":[
            {"kind":"read","owner_process":1,"addr":4096}
        ]}"#;
        assert!(sim.submit(line) > 0);
        assert_eq!(sim.stats().references(), 1);
    }

    #[test]
    fn thread_finishing_frees_its_slot_for_reuse() {
        let sim = Simulator::new(small_config()).unwrap();
        sim.submit(r#"{"type":"new_thread","process":1,"thread":0}"#);
        sim.submit(r#"{"type":"new_thread","process":1,"thread":1}"#);
        sim.submit(r#"{"type":"thread_finishing","process":1,"thread":0}"#);
        assert_eq!(sim.submit(r#"{"type":"new_thread","process":2,"thread":0}"#), 0);
    }

    #[test]
    fn malformed_lines_are_rejected() {
        let sim = Simulator::new(small_config()).unwrap();
        assert_eq!(sim.submit("not json"), -1);
    }

    #[test]
    fn thread_pool_exhaustion_is_reported() {
        let sim = Simulator::new(small_config()).unwrap();
        sim.submit(r#"{"type":"new_thread","process":1,"thread":0}"#);
        sim.submit(r#"{"type":"new_thread","process":1,"thread":1}"#);
        assert_eq!(sim.submit(r#"{"type":"new_thread","process":1,"thread":2}"#), -1);
    }
}
