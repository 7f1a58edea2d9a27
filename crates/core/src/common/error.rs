//! Structural failure modes of the uncore core.
//!
//! The protocol itself never fails transiently: queue delay, contention, and
//! coherence transitions always produce a result. The errors here are the
//! ones spec.md §7 calls fatal or pool-exhaustion: malformed configuration,
//! scheduler overflow, and internal invariant violations. Nothing in this
//! crate retries; the external driver is expected to abort and, if it wants
//! to continue, replay a fresh trace.

use thiserror::Error;

/// The crate's `Result` alias, used throughout the uncore core.
pub type Result<T> = std::result::Result<T, CoreError>;

/// Structural errors raised by the uncore core.
///
/// `ConfigurationInvalid` is raised before simulation starts and is always
/// fatal. `PoolExhausted` is raised per-reference when the thread scheduler
/// cannot allocate a core slot; the caller is expected to surface it as a
/// negative delay and abort. `InvariantViolation` covers both internal
/// assertion failures and the degenerate case of a negative computed delay
/// (spec.md's `NegativeDelay`, folded in here since both are treated as
/// fatal protocol-composition bugs rather than anything recoverable).
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CoreError {
    /// A configuration option was missing, out of range, or ill-typed.
    #[error("invalid configuration: {0}")]
    ConfigurationInvalid(String),

    /// The thread scheduler has no free core slot to allocate.
    #[error("thread scheduler pool exhausted: no free core slot for {0:?}")]
    PoolExhausted(ThreadId),

    /// An internal invariant was violated: an out-of-range set index, an
    /// impossible protocol state, or a delay computation that went negative.
    #[error("invariant violation: {0}")]
    InvariantViolation(String),
}

/// A `(process id, thread id)` pair identifying a trace's originating thread.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ThreadId {
    /// Owning process id, as carried on every `InsMem` reference.
    pub process: u32,
    /// Thread id within that process.
    pub thread: u32,
}

impl ThreadId {
    /// Creates a new thread identifier.
    #[must_use]
    pub const fn new(process: u32, thread: u32) -> Self {
        Self { process, thread }
    }
}
