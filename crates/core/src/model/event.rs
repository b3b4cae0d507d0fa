use stracy_protocol::{ProcessId, SyscallRecord, TraceEvent};

/// An ingested syscall event. Immutable once it reaches the bucket store.
#[derive(Debug, Clone, PartialEq)]
pub struct Event {
    pub pid: ProcessId,
    /// Timestamp in nanoseconds.
    pub ts: u64,
    pub args: SyscallRecord,
    pub failed: bool,
}

impl Event {
    pub fn new(pid: impl Into<ProcessId>, ts: u64, args: SyscallRecord) -> Self {
        Self {
            pid: pid.into(),
            ts,
            args,
            failed: false,
        }
    }
}

impl From<TraceEvent> for Event {
    fn from(raw: TraceEvent) -> Self {
        let failed = raw.failed();
        Self {
            pid: raw.pid,
            ts: raw.ts,
            args: raw.args,
            failed,
        }
    }
}
