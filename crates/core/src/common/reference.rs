//! The `InsMem` memory reference and the external message tagged union.

use super::error::ThreadId;

/// The kind of a memory reference.
///
/// `Writeback` is a synthetic reference the coherence engine issues to
/// itself when an eviction cascades into a dirty write to the level above;
/// it never originates from the trace.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RefKind {
    /// A load.
    Read,
    /// A store.
    Write,
    /// A dirty-eviction writeback, synthesized by the coherence engine.
    Writeback,
}

/// A single memory reference handed to the uncore core.
///
/// Immutable once constructed: nothing in the core ever mutates a reference
/// after it's accepted. `owner_process` identifies the sharer/owner for
/// coherence bookkeeping (directory sharer sets are keyed on cache-bank
/// index, but lines additionally record which process last touched them,
/// for reporting).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct InsMem {
    /// Read, write, or a synthesized writeback.
    pub kind: RefKind,
    /// The process that issued this reference.
    pub owner_process: u32,
    /// The address touched (virtual on entry, physical once past the MMU).
    pub addr: u64,
}

impl InsMem {
    /// Creates a new reference.
    #[must_use]
    pub const fn new(kind: RefKind, owner_process: u32, addr: u64) -> Self {
        Self {
            kind,
            owner_process,
            addr,
        }
    }

    /// Returns a copy of this reference with `addr` replaced.
    ///
    /// Used by the MMU/TLB translation step, which must not mutate the
    /// caller's reference but needs to hand the coherence engine a physical
    /// address in its place.
    #[must_use]
    pub const fn with_addr(self, addr: u64) -> Self {
        Self { addr, ..self }
    }

    /// Whether this reference is a write for coherence purposes (a store or
    /// a writeback both require exclusive/modified access at the target).
    #[must_use]
    pub const fn is_write(self) -> bool {
        matches!(self.kind, RefKind::Write | RefKind::Writeback)
    }
}

/// A non-memory control message carried by a reference batch (spec.md §6).
///
/// These drive the thread scheduler and simulator lifecycle rather than the
/// coherence engine; a batch header tagged with one of these carries no
/// `InsMem` records.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MessageKind {
    /// A process is starting; no scheduler action required until its first
    /// thread appears.
    ProcessStarting,
    /// A process is finishing; all of its threads should be deallocated.
    ProcessFinishing,
    /// An inter-process barrier was reached.
    InterProcessBarriers,
    /// A new thread was created and needs a core slot.
    NewThread(ThreadId),
    /// A thread finished and its core slot should be freed.
    ThreadFinishing(ThreadId),
    /// The whole program is exiting.
    ProgramExiting,
    /// A batch of ordinary memory references follows.
    MemRequests,
}
