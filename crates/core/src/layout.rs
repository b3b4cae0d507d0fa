use std::ops::RangeInclusive;

use thiserror::Error;

use crate::config::TimelineConfig;
use crate::model::{BucketIndex, BucketStore, LaneRegistry};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum LayoutError {
    #[error("bucket {index} is settled and cannot be re-laid out")]
    Settled { index: BucketIndex },
    #[error("bucket {index} does not follow bucket {last}")]
    Gap { index: BucketIndex, last: BucketIndex },
}

/// Incremental vertical layout of the bucket rows.
///
/// Rows are contiguous from the first bucket. Only the last row is open:
/// it is recomputed as events land in it and becomes settled as soon as the
/// next row is appended (or the layout is sealed). Top offsets are kept as
/// a prefix sum so visibility is a binary search, never a re-measure.
#[derive(Debug)]
pub struct LayoutEngine {
    row_height: u32,
    min_cell_height: u32,
    border_height: u32,
    first: Option<BucketIndex>,
    heights: Vec<u32>,
    tops: Vec<u64>,
    sealed: bool,
}

impl LayoutEngine {
    pub fn new(config: &TimelineConfig) -> Self {
        Self {
            row_height: config.row_height,
            min_cell_height: config.min_cell_height,
            border_height: config.border_height,
            first: None,
            heights: Vec::new(),
            tops: Vec::new(),
            sealed: false,
        }
    }

    /// `max(row_height * max_lane_len, min_cell_height) + border_height`.
    pub fn height_for(&self, max_lane_len: usize) -> u32 {
        let rows = u32::try_from(max_lane_len).unwrap_or(u32::MAX);
        self.row_height
            .saturating_mul(rows)
            .max(self.min_cell_height)
            .saturating_add(self.border_height)
    }

    /// Recompute the height of bucket `index` from its current contents.
    ///
    /// `index` must be the open bucket or the one right after it; appending
    /// settles the previous row.
    pub fn recompute(
        &mut self,
        index: BucketIndex,
        store: &BucketStore,
        lanes: &LaneRegistry,
    ) -> Result<u32, LayoutError> {
        let height = self.height_for(store.max_lane_len(index, lanes));
        let Some(last) = self.last_index() else {
            self.first = Some(index);
            self.heights.push(height);
            self.tops.push(0);
            return Ok(height);
        };

        if self.sealed || index < last {
            return Err(LayoutError::Settled { index });
        }
        if index == last {
            if let Some(h) = self.heights.last_mut() {
                *h = height;
            }
        } else if index == last + 1 {
            let top = self.total_height();
            self.tops.push(top);
            self.heights.push(height);
        } else {
            return Err(LayoutError::Gap { index, last });
        }
        Ok(height)
    }

    /// Settle the open row. Nothing can be recomputed afterwards.
    pub fn seal(&mut self) {
        self.sealed = true;
    }

    pub fn is_sealed(&self) -> bool {
        self.sealed
    }

    pub fn last_index(&self) -> Option<BucketIndex> {
        self.first
            .map(|first| first + self.heights.len() as u64 - 1)
    }

    /// The row still accepting recomputes, if any.
    pub fn open_index(&self) -> Option<BucketIndex> {
        if self.sealed { None } else { self.last_index() }
    }

    pub fn is_settled(&self, index: BucketIndex) -> bool {
        self.slot(index).is_some() && self.open_index() != Some(index)
    }

    pub fn len(&self) -> usize {
        self.heights.len()
    }

    pub fn is_empty(&self) -> bool {
        self.heights.is_empty()
    }

    pub fn height_of(&self, index: BucketIndex) -> Option<u32> {
        self.slot(index).map(|i| self.heights[i])
    }

    pub fn top_of(&self, index: BucketIndex) -> Option<u64> {
        self.slot(index).map(|i| self.tops[i])
    }

    pub fn total_height(&self) -> u64 {
        match (self.tops.last(), self.heights.last()) {
            (Some(&top), Some(&h)) => top + u64::from(h),
            _ => 0,
        }
    }

    /// Buckets intersecting `[top - margin, top + height + margin)`.
    pub fn visible_range(
        &self,
        top: u64,
        height: u64,
        margin: u64,
    ) -> Option<RangeInclusive<BucketIndex>> {
        let first = self.first?;
        let start = top.saturating_sub(margin);
        let end = top.saturating_add(height).saturating_add(margin);
        if end <= start || start >= self.total_height() {
            return None;
        }
        let lo = self.tops.partition_point(|&t| t <= start).checked_sub(1)?;
        let hi = self.tops.partition_point(|&t| t < end).checked_sub(1)?;
        Some(first + lo as u64..=first + hi as u64)
    }

    fn slot(&self, index: BucketIndex) -> Option<usize> {
        let offset = index.checked_sub(self.first?)?;
        let slot = usize::try_from(offset).ok()?;
        (slot < self.heights.len()).then_some(slot)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Event;
    use stracy_protocol::{ProcessId, SyscallRecord};

    fn reference_config() -> TimelineConfig {
        TimelineConfig {
            bucket_width_ns: 100,
            row_height: 24,
            min_cell_height: 5,
            border_height: 1,
            ..TimelineConfig::default()
        }
    }

    fn fill(store: &mut BucketStore, lanes: &mut LaneRegistry, pid: u32, ts: u64, n: usize) {
        lanes.ensure_lane(ProcessId(pid));
        for _ in 0..n {
            store.append(Event::new(pid, ts, SyscallRecord::default()));
        }
    }

    #[test]
    fn height_follows_the_busiest_lane() {
        let config = reference_config();
        let mut layout = LayoutEngine::new(&config);
        let mut store = BucketStore::new(config.bucket_width_ns);
        let mut lanes = LaneRegistry::new();
        fill(&mut store, &mut lanes, 1, 0, 0);
        fill(&mut store, &mut lanes, 2, 0, 3);
        fill(&mut store, &mut lanes, 3, 0, 1);
        assert_eq!(layout.recompute(0, &store, &lanes), Ok(73));
    }

    #[test]
    fn empty_bucket_gets_minimum_height() {
        let config = reference_config();
        let mut layout = LayoutEngine::new(&config);
        let mut store = BucketStore::new(config.bucket_width_ns);
        let lanes = LaneRegistry::new();
        store.ensure(3);
        assert_eq!(layout.recompute(3, &store, &lanes), Ok(6));
    }

    #[test]
    fn open_row_is_recomputed_and_settles_on_append() {
        let config = reference_config();
        let mut layout = LayoutEngine::new(&config);
        let mut store = BucketStore::new(config.bucket_width_ns);
        let mut lanes = LaneRegistry::new();

        fill(&mut store, &mut lanes, 1, 0, 1);
        assert_eq!(layout.recompute(0, &store, &lanes), Ok(25));
        fill(&mut store, &mut lanes, 1, 0, 1);
        assert_eq!(layout.recompute(0, &store, &lanes), Ok(49));
        assert_eq!(layout.open_index(), Some(0));

        store.ensure(1);
        assert_eq!(layout.recompute(1, &store, &lanes), Ok(6));
        assert!(layout.is_settled(0));
        assert_eq!(
            layout.recompute(0, &store, &lanes),
            Err(LayoutError::Settled { index: 0 })
        );
        assert_eq!(layout.top_of(1), Some(49));
        assert_eq!(layout.total_height(), 55);
    }

    #[test]
    fn gaps_are_rejected() {
        let config = reference_config();
        let mut layout = LayoutEngine::new(&config);
        let store = BucketStore::new(config.bucket_width_ns);
        let lanes = LaneRegistry::new();
        layout.recompute(0, &store, &lanes).unwrap();
        assert_eq!(
            layout.recompute(2, &store, &lanes),
            Err(LayoutError::Gap { index: 2, last: 0 })
        );
    }

    #[test]
    fn sealed_layout_rejects_recompute() {
        let config = reference_config();
        let mut layout = LayoutEngine::new(&config);
        let store = BucketStore::new(config.bucket_width_ns);
        let lanes = LaneRegistry::new();
        layout.recompute(5, &store, &lanes).unwrap();
        layout.seal();
        assert_eq!(layout.open_index(), None);
        assert!(layout.is_settled(5));
        assert!(layout.recompute(6, &store, &lanes).is_err());
    }

    #[test]
    fn visible_range_by_prefix_offsets() {
        let config = reference_config();
        let mut layout = LayoutEngine::new(&config);
        let mut store = BucketStore::new(config.bucket_width_ns);
        let mut lanes = LaneRegistry::new();
        // rows: 10 -> 25px, 11 -> 6px, 12 -> 49px, 13 -> 25px
        fill(&mut store, &mut lanes, 1, 1000, 1);
        layout.recompute(10, &store, &lanes).unwrap();
        store.ensure(11);
        layout.recompute(11, &store, &lanes).unwrap();
        fill(&mut store, &mut lanes, 1, 1200, 2);
        layout.recompute(12, &store, &lanes).unwrap();
        fill(&mut store, &mut lanes, 1, 1300, 1);
        layout.recompute(13, &store, &lanes).unwrap();

        assert_eq!(layout.total_height(), 105);
        assert_eq!(layout.visible_range(0, 20, 0), Some(10..=10));
        assert_eq!(layout.visible_range(24, 10, 0), Some(10..=12));
        assert_eq!(layout.visible_range(60, 10, 0), Some(12..=12));
        assert_eq!(layout.visible_range(60, 10, 30), Some(11..=13));
        assert_eq!(layout.visible_range(200, 10, 0), None);
    }

    #[test]
    fn empty_layout_has_no_visible_range() {
        let layout = LayoutEngine::new(&reference_config());
        assert_eq!(layout.visible_range(0, 100, 0), None);
        assert_eq!(layout.total_height(), 0);
    }
}
