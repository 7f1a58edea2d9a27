//! Cache line state and the per-line record every bank stores.

/// MESI coherence state of a single cache line.
///
/// `Broadcast` is the directory-only degraded state a `LIMITED_PTR` line
/// enters once its sharer list overflows (spec.md §4.5.2): from that point
/// on, every coherence event touching the line is broadcast to all sharers
/// rather than targeted, until the line is invalidated back to `Invalid`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LineState {
    /// Not present / not valid.
    Invalid,
    /// Present, clean, possibly shared with other caches.
    Shared,
    /// Present, clean, held by exactly this cache.
    Exclusive,
    /// Present, dirty, held by exactly this cache.
    Modified,
    /// Directory-only: the line is resident in a shared LLC and globally
    /// valid regardless of how many private caches also hold it.
    Valid,
    /// Directory-only: the sharer set overflowed a `LIMITED_PTR` budget.
    Broadcast,
}

impl LineState {
    /// Whether a line in this state satisfies a read without further
    /// coherence action.
    #[must_use]
    pub const fn readable(self) -> bool {
        !matches!(self, Self::Invalid)
    }

    /// Whether a line in this state satisfies a write without further
    /// coherence action (i.e. is held exclusively or already modified).
    #[must_use]
    pub const fn writable(self) -> bool {
        matches!(self, Self::Exclusive | Self::Modified)
    }

    /// Whether this line must be written back on eviction.
    #[must_use]
    pub const fn dirty(self) -> bool {
        matches!(self, Self::Modified)
    }
}

/// A single resident line in a cache bank.
#[derive(Debug, Clone, Copy)]
pub struct CacheLine {
    /// Tag identifying which block this line holds, meaningless if
    /// `state == Invalid`.
    pub tag: u64,
    /// Current MESI state.
    pub state: LineState,
    /// Logical timestamp of last access, used for LRU victim selection.
    pub last_used: u64,
    /// The process id that installed this line. Part of a core-driven
    /// access's match key alongside `tag` (spec.md §4.3): two processes
    /// touching the same physical tag on the same core do not alias to
    /// each other's line.
    pub owner_process: u32,
}

impl CacheLine {
    /// An empty, invalid line.
    #[must_use]
    pub const fn empty() -> Self {
        Self {
            tag: 0,
            state: LineState::Invalid,
            last_used: 0,
            owner_process: 0,
        }
    }

    /// Whether this line is currently resident (not `Invalid`).
    #[must_use]
    pub const fn is_valid(self) -> bool {
        !matches!(self.state, LineState::Invalid)
    }

    /// Whether this line is the resident match for `(tag, owner_process)`.
    ///
    /// `owner_process = None` matches on tag alone regardless of which
    /// process installed the line — used by protocol-driven invalidation
    /// and downgrade, which target a physical address without knowing (or
    /// caring) which process currently owns the private copy being acted
    /// on.
    #[must_use]
    pub fn matches(self, tag: u64, owner_process: Option<u32>) -> bool {
        self.is_valid() && self.tag == tag && owner_process.map_or(true, |p| self.owner_process == p)
    }
}

impl Default for CacheLine {
    fn default() -> Self {
        Self::empty()
    }
}
