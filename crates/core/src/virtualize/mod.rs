pub mod visibility;

use stracy_protocol::EventFragment;
use thiserror::Error;

use crate::model::{BucketIndex, BucketStore, LaneRegistry};
use crate::render::{ArgumentRenderer, render_event};

pub use visibility::{IntersectionVisibility, ScrollVisibility, VisibilityChange, VisibilitySource};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum MaterializeError {
    #[error("no placeholder for bucket {0}")]
    MissingPlaceholder(BucketIndex),
}

/// Content state of a placeholder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Materialization {
    /// Height reserved, no content built.
    #[default]
    Unmaterialized,
    /// Content built from the bucket store.
    Materialized,
    /// Materialized content that has since been extended with new events.
    UpdatedInPlace,
}

impl Materialization {
    pub fn has_content(self) -> bool {
        !matches!(self, Self::Unmaterialized)
    }
}

/// Rendered events of one lane within one bucket.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LaneCell {
    pub fragments: Vec<EventFragment>,
}

impl LaneCell {
    /// Number of events of this lane already rendered.
    pub fn rendered(&self) -> usize {
        self.fragments.len()
    }
}

#[derive(Debug, Default)]
pub struct Placeholder {
    state: Materialization,
    /// Cells in lane column order.
    cells: Vec<LaneCell>,
    /// Set while the bucket has no events; hidden buckets are never
    /// materialized and only contribute their minimum height.
    hidden: bool,
    observed: bool,
    visible: bool,
}

impl Placeholder {
    pub fn state(&self) -> Materialization {
        self.state
    }

    pub fn cells(&self) -> &[LaneCell] {
        &self.cells
    }

    pub fn is_hidden(&self) -> bool {
        self.hidden
    }

    pub fn is_visible(&self) -> bool {
        self.visible
    }

    pub fn fragment_count(&self) -> usize {
        self.cells.iter().map(LaneCell::rendered).sum()
    }
}

/// Owns one placeholder per bucket, contiguous from the first bucket.
///
/// A placeholder's content (one [`EventFragment`] per event, grouped in
/// lane cells) is only built once the bucket is near the viewport, extended
/// in place while the bucket keeps filling, and optionally dropped again
/// when it scrolls away. The [`BucketStore`] stays the single source of
/// truth, so content can be rebuilt at any time.
#[derive(Debug, Default)]
pub struct VirtualizationController {
    first: Option<BucketIndex>,
    placeholders: Vec<Placeholder>,
}

impl VirtualizationController {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create the placeholder for `index` (and any missing ones before it).
    /// Indices before the first placeholder are ignored.
    pub fn ensure_placeholder(&mut self, index: BucketIndex) {
        let Some(first) = self.first else {
            self.first = Some(index);
            self.placeholders.push(Placeholder {
                hidden: true,
                ..Placeholder::default()
            });
            return;
        };
        let Some(offset) = index.checked_sub(first) else {
            log::error!("placeholder {index} precedes first bucket {first}");
            return;
        };
        let needed = usize::try_from(offset).unwrap_or(usize::MAX).saturating_add(1);
        while self.placeholders.len() < needed {
            self.placeholders.push(Placeholder {
                hidden: true,
                ..Placeholder::default()
            });
        }
    }

    pub fn placeholder(&self, index: BucketIndex) -> Option<&Placeholder> {
        self.slot(index).map(|i| &self.placeholders[i])
    }

    pub fn state_of(&self, index: BucketIndex) -> Option<Materialization> {
        self.placeholder(index).map(Placeholder::state)
    }

    pub fn len(&self) -> usize {
        self.placeholders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.placeholders.is_empty()
    }

    /// Re-read the bucket's event count and flip `hidden` accordingly.
    /// Returns `true` exactly once: the first time the placeholder becomes
    /// eligible and should be handed to the visibility source.
    pub fn update_eligibility(&mut self, index: BucketIndex, store: &BucketStore) -> bool {
        let eligible = store.bucket(index).is_some_and(|b| !b.is_empty());
        let Some(placeholder) = self.slot(index).map(|i| &mut self.placeholders[i]) else {
            return false;
        };
        placeholder.hidden = !eligible;
        if eligible && !placeholder.observed {
            placeholder.observed = true;
            return true;
        }
        false
    }

    pub fn set_visible(&mut self, index: BucketIndex, visible: bool) {
        if let Some(i) = self.slot(index) {
            self.placeholders[i].visible = visible;
        }
    }

    /// Build (or extend) the content of bucket `index`.
    ///
    /// Only the events beyond what each lane cell already holds are
    /// rendered, so calling this again without new events renders nothing.
    /// Returns the number of fragments added.
    pub fn materialize<R: ArgumentRenderer + ?Sized>(
        &mut self,
        index: BucketIndex,
        store: &BucketStore,
        lanes: &LaneRegistry,
        renderer: &R,
    ) -> Result<usize, MaterializeError> {
        let slot = self
            .slot(index)
            .ok_or(MaterializeError::MissingPlaceholder(index))?;
        let placeholder = &mut self.placeholders[slot];
        if placeholder.hidden {
            return Ok(0);
        }

        if placeholder.cells.len() < lanes.len() {
            placeholder.cells.resize_with(lanes.len(), LaneCell::default);
        }
        let mut added = 0;
        for (cell, &pid) in placeholder.cells.iter_mut().zip(lanes.pids()) {
            let events = store.events_for(index, pid);
            for event in events.iter().skip(cell.rendered()) {
                cell.fragments.push(render_event(renderer, event));
                added += 1;
            }
        }

        placeholder.state = match placeholder.state {
            Materialization::Unmaterialized => {
                log::debug!("bucket {index} materialized ({added} fragments)");
                Materialization::Materialized
            }
            _ if added > 0 => Materialization::UpdatedInPlace,
            state => state,
        };
        Ok(added)
    }

    /// Extend a bucket that already has content; untouched otherwise.
    pub fn refresh<R: ArgumentRenderer + ?Sized>(
        &mut self,
        index: BucketIndex,
        store: &BucketStore,
        lanes: &LaneRegistry,
        renderer: &R,
    ) -> Result<usize, MaterializeError> {
        match self.state_of(index) {
            None => Err(MaterializeError::MissingPlaceholder(index)),
            Some(state) if state.has_content() => self.materialize(index, store, lanes, renderer),
            Some(_) => Ok(0),
        }
    }

    /// Drop the content of bucket `index`. It can be materialized again
    /// later from the bucket store. Returns whether anything was dropped.
    pub fn evict(&mut self, index: BucketIndex) -> bool {
        let Some(i) = self.slot(index) else {
            return false;
        };
        let placeholder = &mut self.placeholders[i];
        if !placeholder.state.has_content() {
            return false;
        }
        placeholder.cells = Vec::new();
        placeholder.state = Materialization::Unmaterialized;
        log::debug!("bucket {index} evicted");
        true
    }

    fn slot(&self, index: BucketIndex) -> Option<usize> {
        let offset = index.checked_sub(self.first?)?;
        let slot = usize::try_from(offset).ok()?;
        (slot < self.placeholders.len()).then_some(slot)
    }
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;

    use super::*;
    use crate::model::Event;
    use stracy_protocol::{Arg, Fragment, ProcessId, SyscallRecord};

    struct Fixture {
        store: BucketStore,
        lanes: LaneRegistry,
        controller: VirtualizationController,
    }

    impl Fixture {
        fn new() -> Self {
            Self {
                store: BucketStore::new(100),
                lanes: LaneRegistry::new(),
                controller: VirtualizationController::new(),
            }
        }

        fn push(&mut self, pid: u32, ts: u64, syscall: &str) -> BucketIndex {
            self.lanes.ensure_lane(ProcessId(pid));
            let index = self.store.append(Event::new(
                pid,
                ts,
                SyscallRecord {
                    syscall: syscall.into(),
                    args: vec![Arg::plain(syscall)],
                    result: None,
                },
            ));
            self.controller.ensure_placeholder(index);
            self.controller.update_eligibility(index, &self.store);
            index
        }
    }

    fn counting(calls: &Cell<usize>) -> impl Fn(&Arg) -> Fragment + '_ {
        move |arg: &Arg| {
            calls.set(calls.get() + 1);
            Fragment::Text(format!("{arg:?}"))
        }
    }

    fn syscalls(cell: &LaneCell) -> Vec<&str> {
        cell.fragments.iter().map(|f| f.syscall.as_str()).collect()
    }

    #[test]
    fn materialize_twice_adds_nothing() {
        let mut fx = Fixture::new();
        fx.push(1, 0, "open");
        fx.push(2, 1, "read");
        let calls = Cell::new(0);
        let renderer = counting(&calls);

        let added = fx.controller.materialize(0, &fx.store, &fx.lanes, &renderer);
        assert_eq!(added, Ok(2));
        assert_eq!(fx.controller.materialize(0, &fx.store, &fx.lanes, &renderer), Ok(0));
        assert_eq!(calls.get(), 2);
        assert_eq!(fx.controller.state_of(0), Some(Materialization::Materialized));
        assert_eq!(fx.controller.placeholder(0).map(Placeholder::fragment_count), Some(2));
    }

    #[test]
    fn new_events_are_appended_in_place() {
        let mut fx = Fixture::new();
        fx.push(1, 0, "open");
        let calls = Cell::new(0);
        let renderer = counting(&calls);
        fx.controller.materialize(0, &fx.store, &fx.lanes, &renderer).unwrap();
        let before = fx.controller.placeholder(0).unwrap().cells()[0].fragments[0].clone();

        fx.push(1, 10, "read");
        fx.push(1, 20, "close");
        fx.push(3, 30, "write");
        let added = fx.controller.refresh(0, &fx.store, &fx.lanes, &renderer);
        assert_eq!(added, Ok(3));
        assert_eq!(calls.get(), 4);

        let placeholder = fx.controller.placeholder(0).unwrap();
        assert_eq!(placeholder.state(), Materialization::UpdatedInPlace);
        assert_eq!(syscalls(&placeholder.cells()[0]), vec!["open", "read", "close"]);
        assert_eq!(syscalls(&placeholder.cells()[1]), vec!["write"]);
        assert_eq!(placeholder.cells()[0].fragments[0], before);
    }

    #[test]
    fn refresh_leaves_unmaterialized_buckets_alone() {
        let mut fx = Fixture::new();
        fx.push(1, 0, "open");
        let calls = Cell::new(0);
        assert_eq!(fx.controller.refresh(0, &fx.store, &fx.lanes, &counting(&calls)), Ok(0));
        assert_eq!(calls.get(), 0);
        assert_eq!(fx.controller.state_of(0), Some(Materialization::Unmaterialized));
    }

    #[test]
    fn empty_buckets_are_hidden_and_never_materialized() {
        let mut fx = Fixture::new();
        fx.push(1, 0, "open");
        fx.store.ensure(1);
        fx.controller.ensure_placeholder(1);
        assert!(!fx.controller.update_eligibility(1, &fx.store));
        let calls = Cell::new(0);
        assert_eq!(fx.controller.materialize(1, &fx.store, &fx.lanes, &counting(&calls)), Ok(0));
        let placeholder = fx.controller.placeholder(1).unwrap();
        assert!(placeholder.is_hidden());
        assert_eq!(placeholder.state(), Materialization::Unmaterialized);
    }

    #[test]
    fn eligibility_is_reported_once() {
        let mut fx = Fixture::new();
        fx.lanes.ensure_lane(ProcessId(1));
        fx.store.append(Event::new(1, 0, SyscallRecord::default()));
        fx.controller.ensure_placeholder(0);
        assert!(fx.controller.update_eligibility(0, &fx.store));
        assert!(!fx.controller.update_eligibility(0, &fx.store));
    }

    #[test]
    fn missing_placeholder_is_an_error() {
        let fx = Fixture::new();
        let mut controller = VirtualizationController::new();
        let calls = Cell::new(0);
        assert_eq!(
            controller.materialize(4, &fx.store, &fx.lanes, &counting(&calls)),
            Err(MaterializeError::MissingPlaceholder(4))
        );
    }

    #[test]
    fn evicted_bucket_rematerializes_without_loss() {
        let mut fx = Fixture::new();
        fx.push(1, 0, "open");
        fx.push(1, 1, "read");
        let calls = Cell::new(0);
        let renderer = counting(&calls);
        fx.controller.materialize(0, &fx.store, &fx.lanes, &renderer).unwrap();
        assert!(fx.controller.evict(0));
        assert!(!fx.controller.evict(0));
        assert_eq!(fx.controller.state_of(0), Some(Materialization::Unmaterialized));
        assert_eq!(fx.controller.placeholder(0).map(Placeholder::fragment_count), Some(0));

        fx.push(1, 2, "close");
        assert_eq!(fx.controller.materialize(0, &fx.store, &fx.lanes, &renderer), Ok(3));
        let cell = &fx.controller.placeholder(0).unwrap().cells()[0];
        assert_eq!(syscalls(cell), vec!["open", "read", "close"]);
    }

    #[test]
    fn placeholders_stay_contiguous() {
        let mut controller = VirtualizationController::new();
        controller.ensure_placeholder(5);
        controller.ensure_placeholder(9);
        controller.ensure_placeholder(7);
        controller.ensure_placeholder(2);
        assert_eq!(controller.len(), 5);
        assert!(controller.placeholder(2).is_none());
        assert!(controller.placeholder(8).is_some());
    }
}
