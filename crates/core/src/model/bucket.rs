use std::collections::{BTreeMap, HashMap};

use stracy_protocol::ProcessId;

use super::event::Event;
use super::lane::LaneRegistry;

/// `floor(ts / bucket_width)`.
pub type BucketIndex = u64;

/// Events of one time window, grouped per process in arrival order.
#[derive(Debug, Default)]
pub struct Bucket {
    lanes: HashMap<ProcessId, Vec<Event>>,
}

impl Bucket {
    pub fn events(&self, pid: ProcessId) -> &[Event] {
        self.lanes.get(&pid).map_or(&[], Vec::as_slice)
    }

    pub fn is_empty(&self) -> bool {
        self.lanes.values().all(Vec::is_empty)
    }
}

/// Sparse, append-only mapping from bucket index to per-lane event lists.
///
/// Buckets are never removed and their lists only grow.
#[derive(Debug)]
pub struct BucketStore {
    bucket_width_ns: u64,
    buckets: BTreeMap<BucketIndex, Bucket>,
}

impl BucketStore {
    /// `bucket_width_ns` must be positive; [`TimelineConfig::validate`]
    /// guards this for configured sessions.
    ///
    /// [`TimelineConfig::validate`]: crate::config::TimelineConfig::validate
    pub fn new(bucket_width_ns: u64) -> Self {
        Self {
            bucket_width_ns: bucket_width_ns.max(1),
            buckets: BTreeMap::new(),
        }
    }

    pub fn bucket_width_ns(&self) -> u64 {
        self.bucket_width_ns
    }

    /// Bucket index for a timestamp, without touching the store.
    pub fn index_for(&self, ts: u64) -> BucketIndex {
        ts / self.bucket_width_ns
    }

    /// Append `event` to its bucket, creating the bucket and lane list on
    /// first use. Returns the bucket index.
    pub fn append(&mut self, event: Event) -> BucketIndex {
        let index = self.index_for(event.ts);
        self.buckets
            .entry(index)
            .or_default()
            .lanes
            .entry(event.pid)
            .or_default()
            .push(event);
        index
    }

    /// Make sure a bucket exists at `index`, empty if it had no events.
    pub fn ensure(&mut self, index: BucketIndex) -> &Bucket {
        self.buckets.entry(index).or_default()
    }

    pub fn bucket(&self, index: BucketIndex) -> Option<&Bucket> {
        self.buckets.get(&index)
    }

    /// Events of `pid` in bucket `index`, in arrival order. Empty if either
    /// is unknown.
    pub fn events_for(&self, index: BucketIndex, pid: ProcessId) -> &[Event] {
        self.buckets.get(&index).map_or(&[], |b| b.events(pid))
    }

    /// Largest event count of any registered lane in bucket `index`.
    pub fn max_lane_len(&self, index: BucketIndex, lanes: &LaneRegistry) -> usize {
        let Some(bucket) = self.buckets.get(&index) else {
            return 0;
        };
        lanes
            .pids()
            .iter()
            .map(|&pid| bucket.events(pid).len())
            .max()
            .unwrap_or(0)
    }

    /// Number of buckets, including the empty ones created for contiguity.
    pub fn len(&self) -> usize {
        self.buckets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stracy_protocol::SyscallRecord;

    fn event(pid: u32, ts: u64) -> Event {
        Event::new(pid, ts, SyscallRecord::default())
    }

    #[test]
    fn buckets_by_time_window() {
        let mut store = BucketStore::new(10_000_000);
        assert_eq!(store.append(event(1, 0)), 0);
        assert_eq!(store.append(event(2, 9_999_999)), 0);
        assert_eq!(store.append(event(1, 10_000_000)), 1);
        assert_eq!(store.events_for(0, ProcessId(1)).len(), 1);
        assert_eq!(store.events_for(0, ProcessId(2)).len(), 1);
        assert_eq!(store.events_for(1, ProcessId(1)).len(), 1);
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn arrival_order_within_lane() {
        let mut store = BucketStore::new(100);
        store.append(event(1, 50));
        store.append(event(1, 10));
        let ts: Vec<u64> = store.events_for(0, ProcessId(1)).iter().map(|e| e.ts).collect();
        assert_eq!(ts, vec![50, 10]);
    }

    #[test]
    fn reads_are_idempotent() {
        let mut store = BucketStore::new(100);
        store.append(event(1, 5));
        let first = store.events_for(0, ProcessId(1)).to_vec();
        let second = store.events_for(0, ProcessId(1)).to_vec();
        assert_eq!(first, second);
        assert!(store.events_for(7, ProcessId(1)).is_empty());
        assert!(store.events_for(0, ProcessId(9)).is_empty());
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn max_lane_len_scans_registered_lanes() {
        let mut lanes = LaneRegistry::new();
        let mut store = BucketStore::new(100);
        for pid in [1, 2, 3] {
            lanes.ensure_lane(ProcessId(pid));
        }
        for _ in 0..3 {
            store.append(event(2, 1));
        }
        store.append(event(3, 1));
        assert_eq!(store.max_lane_len(0, &lanes), 3);
        assert_eq!(store.max_lane_len(5, &lanes), 0);
    }

    #[test]
    fn ensure_creates_empty_bucket() {
        let mut store = BucketStore::new(100);
        assert!(store.ensure(4).is_empty());
        assert_eq!(store.len(), 1);
        assert!(store.events_for(4, ProcessId(1)).is_empty());
    }
}
