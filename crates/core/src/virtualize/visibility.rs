use std::collections::BTreeSet;
use std::time::{Duration, Instant};

use crate::config::TimelineConfig;
use crate::layout::LayoutEngine;
use crate::model::BucketIndex;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VisibilityChange {
    /// The placeholder came within the pre-render window.
    Entered(BucketIndex),
    /// The placeholder left it.
    Left(BucketIndex),
}

/// Tells the controller which buckets are near the viewport.
///
/// How that is detected is up to the implementation: sampling the scroll
/// position against the layout ([`ScrollVisibility`]) or forwarding
/// per-placeholder intersection reports from the host
/// ([`IntersectionVisibility`]).
pub trait VisibilitySource {
    /// Start watching a placeholder that now has content to show.
    fn observe(&mut self, index: BucketIndex);

    /// Changes since the last poll. Never blocks.
    fn poll(&mut self, layout: &LayoutEngine, now: Instant) -> Vec<VisibilityChange>;

    /// Drop pending samples and watched placeholders. Nothing is reported
    /// after this.
    fn cancel(&mut self);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct ScrollSample {
    top: u64,
    height: u64,
}

/// Debounced scroll-position sampling against the cumulative layout.
///
/// Each new position restarts the quiet period; repeating the pending
/// position does not. A sample is only resolved once `debounce` has passed
/// without a different one. Newly observed
/// placeholders trigger an immediate re-evaluation of the last resolved
/// sample so a live tail materializes without waiting for a scroll.
#[derive(Debug)]
pub struct ScrollVisibility {
    debounce: Duration,
    margin: u64,
    pending: Option<(ScrollSample, Instant)>,
    current: Option<ScrollSample>,
    observed: BTreeSet<BucketIndex>,
    visible: BTreeSet<BucketIndex>,
    dirty: bool,
    cancelled: bool,
}

impl ScrollVisibility {
    pub fn new(debounce: Duration, margin: u64) -> Self {
        Self {
            debounce,
            margin,
            pending: None,
            current: None,
            observed: BTreeSet::new(),
            visible: BTreeSet::new(),
            dirty: false,
            cancelled: false,
        }
    }

    pub fn from_config(config: &TimelineConfig) -> Self {
        Self::new(
            Duration::from_millis(config.scroll_debounce_ms),
            u64::from(config.prerender_margin),
        )
    }

    /// Record the viewport's scroll offset and height.
    pub fn sample(&mut self, top: u64, height: u64, now: Instant) {
        if self.cancelled {
            return;
        }
        let sample = ScrollSample { top, height };
        match self.pending {
            Some((pending, _)) if pending == sample => {}
            None if self.current == Some(sample) => {}
            _ => self.pending = Some((sample, now)),
        }
    }

    /// Move to a position set by the host itself (following the tail,
    /// jumping to the top). Skips the debounce.
    pub fn jump_to(&mut self, top: u64, height: u64) {
        if self.cancelled {
            return;
        }
        let sample = ScrollSample { top, height };
        self.pending = None;
        if self.current != Some(sample) {
            self.current = Some(sample);
            self.dirty = true;
        }
    }

    /// Force the next poll to re-evaluate (e.g. after a resize).
    pub fn invalidate(&mut self) {
        self.dirty = true;
    }

    pub fn is_visible(&self, index: BucketIndex) -> bool {
        self.visible.contains(&index)
    }
}

impl VisibilitySource for ScrollVisibility {
    fn observe(&mut self, index: BucketIndex) {
        if self.cancelled {
            return;
        }
        self.observed.insert(index);
        self.dirty = true;
    }

    fn poll(&mut self, layout: &LayoutEngine, now: Instant) -> Vec<VisibilityChange> {
        if self.cancelled {
            return Vec::new();
        }
        if let Some((sample, at)) = self.pending
            && now.duration_since(at) >= self.debounce
        {
            self.pending = None;
            self.current = Some(sample);
            self.dirty = true;
        }
        if !std::mem::take(&mut self.dirty) {
            return Vec::new();
        }
        let Some(sample) = self.current else {
            return Vec::new();
        };

        let next: BTreeSet<BucketIndex> = layout
            .visible_range(sample.top, sample.height, self.margin)
            .map(|range| self.observed.range(range).copied().collect())
            .unwrap_or_default();

        let mut changes: Vec<VisibilityChange> = self
            .visible
            .difference(&next)
            .map(|&i| VisibilityChange::Left(i))
            .collect();
        changes.extend(
            next.difference(&self.visible)
                .map(|&i| VisibilityChange::Entered(i)),
        );
        self.visible = next;
        changes
    }

    fn cancel(&mut self) {
        self.cancelled = true;
        self.pending = None;
        self.observed.clear();
        self.visible.clear();
    }
}

/// Visibility driven by host intersection callbacks, one report per
/// placeholder crossing the (margin-extended) viewport edge.
#[derive(Debug, Default)]
pub struct IntersectionVisibility {
    observed: BTreeSet<BucketIndex>,
    intersecting: BTreeSet<BucketIndex>,
    queue: Vec<VisibilityChange>,
    cancelled: bool,
}

impl IntersectionVisibility {
    pub fn new() -> Self {
        Self::default()
    }

    /// Host callback. Reports for placeholders that are not observed are
    /// ignored.
    pub fn report(&mut self, index: BucketIndex, intersecting: bool) {
        if self.cancelled || !self.observed.contains(&index) {
            log::trace!("ignoring intersection report for unobserved bucket {index}");
            return;
        }
        if intersecting {
            if self.intersecting.insert(index) {
                self.queue.push(VisibilityChange::Entered(index));
            }
        } else if self.intersecting.remove(&index) {
            self.queue.push(VisibilityChange::Left(index));
        }
    }

    /// Placeholders the host should attach intersection watchers to.
    pub fn observed(&self) -> impl Iterator<Item = BucketIndex> + '_ {
        self.observed.iter().copied()
    }
}

impl VisibilitySource for IntersectionVisibility {
    fn observe(&mut self, index: BucketIndex) {
        if !self.cancelled {
            self.observed.insert(index);
        }
    }

    fn poll(&mut self, _layout: &LayoutEngine, _now: Instant) -> Vec<VisibilityChange> {
        std::mem::take(&mut self.queue)
    }

    fn cancel(&mut self) {
        self.cancelled = true;
        self.observed.clear();
        self.intersecting.clear();
        self.queue.clear();
    }
}
