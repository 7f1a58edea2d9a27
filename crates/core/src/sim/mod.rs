//! Driving a trace through the uncore: wire-format parsing, the top-level
//! [`Simulator`] that binds a trace to the scheduler and the uncore
//! dispatcher, and textual report rendering (spec.md §6's external
//! interfaces).

/// JSON-lines trace record parsing.
pub mod trace;

/// The top-level simulator: owns the uncore, the thread scheduler, and
/// simulation-wide statistics, and drives one trace record at a time.
pub mod simulator;

/// Textual report rendering over a finished simulation's statistics.
pub mod report;

pub use report::Report;
pub use simulator::Simulator;
pub use trace::TraceRecord;
