//! Trace wire format: JSON-lines records, one per line, decoded into the
//! crate's internal [`InsMem`]/[`MessageKind`] types.
//!
//! spec.md leaves the external trace format at the driver's discretion and
//! explicitly excludes XML parsing from the core; JSON-lines is this
//! implementation's choice, since `serde_json` is already load-bearing for
//! configuration (spec.md §6).

use serde::Deserialize;

use crate::common::error::{CoreError, Result, ThreadId};
use crate::common::reference::{InsMem, MessageKind, RefKind};

/// The read/write tag on the wire; `Writeback` never appears in a trace
/// since it's synthesized internally by the coherence engine.
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RefKindWire {
    /// A load.
    Read,
    /// A store.
    Write,
}

impl From<RefKindWire> for RefKind {
    fn from(value: RefKindWire) -> Self {
        match value {
            RefKindWire::Read => Self::Read,
            RefKindWire::Write => Self::Write,
        }
    }
}

/// One memory reference as it appears in a trace file.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct RefRecord {
    /// Read or write.
    pub kind: RefKindWire,
    /// Owning process id.
    pub owner_process: u32,
    /// Virtual address touched.
    pub addr: u64,
}

impl RefRecord {
    /// Converts this wire record into the internal reference type.
    #[must_use]
    pub fn into_ins_mem(self) -> InsMem {
        InsMem::new(self.kind.into(), self.owner_process, self.addr)
    }
}

/// One line of a trace file: either a scheduler control message or a batch
/// of ordinary memory references.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TraceRecord {
    /// A process is starting.
    ProcessStarting {
        /// The starting process's id.
        process: u32,
    },
    /// A process is finishing.
    ProcessFinishing {
        /// The finishing process's id.
        process: u32,
    },
    /// An inter-process barrier was reached.
    InterProcessBarrier,
    /// A new thread was created.
    NewThread {
        /// Owning process id.
        process: u32,
        /// Thread id within the process.
        thread: u32,
    },
    /// A thread finished.
    ThreadFinishing {
        /// Owning process id.
        process: u32,
        /// Thread id within the process.
        thread: u32,
    },
    /// The whole program is exiting.
    ProgramExiting,
    /// A batch of ordinary memory references, all issued by one thread.
    MemRequests {
        /// Issuing thread.
        process: u32,
        /// Issuing thread.
        thread: u32,
        /// Non-memory instructions to bill at `cpi_nonmem` before this
        /// batch's memory references are serviced.
        #[serde(default)]
        nonmem_instructions: u64,
        /// The references themselves.
        refs: Vec<RefRecord>,
    },
}

impl TraceRecord {
    /// The kind of control message this record represents, for records
    /// that aren't `MemRequests` (which carries its own references instead
    /// of a bare tag).
    #[must_use]
    pub fn message_kind(&self) -> Option<MessageKind> {
        match *self {
            Self::ProcessStarting { .. } => Some(MessageKind::ProcessStarting),
            Self::ProcessFinishing { .. } => Some(MessageKind::ProcessFinishing),
            Self::InterProcessBarrier => Some(MessageKind::InterProcessBarriers),
            Self::NewThread { process, thread } => {
                Some(MessageKind::NewThread(ThreadId::new(process, thread)))
            }
            Self::ThreadFinishing { process, thread } => {
                Some(MessageKind::ThreadFinishing(ThreadId::new(process, thread)))
            }
            Self::ProgramExiting => Some(MessageKind::ProgramExiting),
            Self::MemRequests { .. } => None,
        }
    }
}

/// Parses one JSON-lines trace record.
///
/// # Errors
///
/// Returns [`CoreError::InvariantViolation`] if `line` is not valid JSON or
/// doesn't match any [`TraceRecord`] variant.
pub fn parse_line(line: &str) -> Result<TraceRecord> {
    serde_json::from_str(line)
        .map_err(|e| CoreError::InvariantViolation(format!("malformed trace record: {e}")))
}
