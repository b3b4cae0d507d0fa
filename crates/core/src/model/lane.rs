use std::collections::HashMap;

use stracy_protocol::ProcessId;

/// A lane is the fundamental layout primitive: one column of the timeline
/// holding every event of one process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Lane {
    pub pid: ProcessId,
    /// Column index, 0 for the first process ever seen.
    pub column: usize,
}

/// Notification that a new column exists and needs a header cell.
pub type LaneHeader = Lane;

/// Maps process ids to permanent column indices in first-seen order.
///
/// Columns are only ever appended, so a process keeps its horizontal
/// position for the whole session.
#[derive(Debug, Default)]
pub struct LaneRegistry {
    order: Vec<ProcessId>,
    columns: HashMap<ProcessId, usize>,
    pending_headers: Vec<LaneHeader>,
}

impl LaneRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Column of `pid`, registering it at the end if unseen.
    pub fn ensure_lane(&mut self, pid: ProcessId) -> usize {
        if let Some(&column) = self.columns.get(&pid) {
            return column;
        }
        let column = self.order.len();
        self.order.push(pid);
        self.columns.insert(pid, column);
        self.pending_headers.push(Lane { pid, column });
        log::debug!("lane {column} assigned to pid {pid}");
        column
    }

    pub fn column_of(&self, pid: ProcessId) -> Option<usize> {
        self.columns.get(&pid).copied()
    }

    /// Process ids in column order.
    pub fn pids(&self) -> &[ProcessId] {
        &self.order
    }

    pub fn lanes(&self) -> impl Iterator<Item = Lane> + '_ {
        self.order
            .iter()
            .enumerate()
            .map(|(column, &pid)| Lane { pid, column })
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Header notifications for lanes registered since the last drain.
    pub fn drain_headers(&mut self) -> Vec<LaneHeader> {
        std::mem::take(&mut self.pending_headers)
    }
}
