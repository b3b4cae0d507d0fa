use std::time::Instant;

use stracy_protocol::TraceEvent;
use thiserror::Error;

use crate::config::TimelineConfig;
use crate::layout::LayoutEngine;
use crate::model::{BucketIndex, BucketStore, Event, LaneHeader, LaneRegistry};
use crate::render::ArgumentRenderer;
use crate::transport::{StreamHandler, TransportError};
use crate::virtualize::{
    MaterializeError, VirtualizationController, VisibilityChange, VisibilitySource,
};

/// Gaps wider than this many buckets are filled but logged, since every
/// skipped window still costs a bucket, a placeholder and a layout row.
const WIDE_GAP_BUCKETS: u64 = 10_000;

#[derive(Debug, Error)]
pub enum IngestError {
    #[error("malformed event: {0}")]
    Malformed(#[from] serde_json::Error),
    #[error("event for bucket {index} arrived after bucket {current}")]
    OutOfOrder {
        index: BucketIndex,
        current: BucketIndex,
    },
    #[error("session is finalized")]
    Finalized,
}

/// Counters for what happened to incoming messages.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SessionStats {
    pub ingested: u64,
    pub malformed: u64,
    pub out_of_order: u64,
    pub after_finalize: u64,
}

fn is_wide_gap(from: BucketIndex, to: BucketIndex) -> bool {
    to.saturating_sub(from) > WIDE_GAP_BUCKETS
}

/// The state behind a single timeline view.
///
/// Owns the lane registry, bucket store, layout and placeholders for as
/// long as the view lives. Events are applied in delivery order as discrete
/// steps; nothing here blocks or spawns.
pub struct IngestionSession<V, R> {
    config: TimelineConfig,
    lanes: LaneRegistry,
    buckets: BucketStore,
    layout: LayoutEngine,
    controller: VirtualizationController,
    visibility: V,
    renderer: R,
    min_bucket: Option<BucketIndex>,
    current_bucket: Option<BucketIndex>,
    finalized: bool,
    stats: SessionStats,
}

impl<V: VisibilitySource, R: ArgumentRenderer> IngestionSession<V, R> {
    pub fn new(config: TimelineConfig, visibility: V, renderer: R) -> Self {
        Self {
            lanes: LaneRegistry::new(),
            buckets: BucketStore::new(config.bucket_width_ns),
            layout: LayoutEngine::new(&config),
            controller: VirtualizationController::new(),
            visibility,
            renderer,
            min_bucket: None,
            current_bucket: None,
            finalized: false,
            stats: SessionStats::default(),
            config,
        }
    }

    /// Decode and ingest one serialized event.
    ///
    /// Malformed, out-of-order and post-finalize events are logged and
    /// dropped; the session keeps going either way.
    pub fn on_event(&mut self, raw: &str) -> Result<BucketIndex, IngestError> {
        if self.finalized {
            return Err(self.reject_finalized());
        }
        let event: TraceEvent = serde_json::from_str(raw).map_err(|err| {
            log::warn!("dropping malformed event: {err}");
            self.stats.malformed += 1;
            IngestError::from(err)
        })?;
        self.accept(Event::from(event))
    }

    /// Ingest an already decoded event.
    pub fn ingest(&mut self, event: Event) -> Result<BucketIndex, IngestError> {
        if self.finalized {
            return Err(self.reject_finalized());
        }
        self.accept(event)
    }

    fn accept(&mut self, event: Event) -> Result<BucketIndex, IngestError> {
        let index = self.buckets.index_for(event.ts);
        if let Some(current) = self.current_bucket
            && index < current
        {
            log::warn!(
                "dropping out-of-order event from pid {} (bucket {index} < current {current})",
                event.pid
            );
            self.stats.out_of_order += 1;
            return Err(IngestError::OutOfOrder { index, current });
        }

        let from = self.current_bucket.unwrap_or(index);
        if is_wide_gap(from, index) {
            log::warn!(
                "event from pid {} jumps {} buckets ahead ({from} -> {index}); filling the gap",
                event.pid,
                index - from
            );
        }

        self.lanes.ensure_lane(event.pid);
        self.buckets.append(event);
        self.min_bucket.get_or_insert(index);

        for slot in from..=index {
            self.adjust_placeholder(slot);
        }
        self.current_bucket = Some(index);
        self.stats.ingested += 1;
        Ok(index)
    }

    /// Bring bucket `index` up to date: bucket, placeholder, height,
    /// eligibility, and in-place extension of existing content.
    fn adjust_placeholder(&mut self, index: BucketIndex) {
        self.buckets.ensure(index);
        self.controller.ensure_placeholder(index);
        if let Err(err) = self.layout.recompute(index, &self.buckets, &self.lanes) {
            log::error!("layout out of sync: {err}");
        }
        if self.controller.update_eligibility(index, &self.buckets) {
            self.visibility.observe(index);
        }
        match self
            .controller
            .refresh(index, &self.buckets, &self.lanes, &self.renderer)
        {
            Ok(0) => {}
            Ok(added) => log::debug!("bucket {index} extended by {added} fragments"),
            Err(err) => log::error!("{err}"),
        }
    }

    fn reject_finalized(&mut self) -> IngestError {
        log::warn!("dropping event: session already finalized");
        self.stats.after_finalize += 1;
        IngestError::Finalized
    }

    /// Terminal transition shared by a clean finish and a transport
    /// failure. Idempotent.
    ///
    /// The current bucket gets its final adjustment and the layout is
    /// sealed; no trailing bucket is created.
    pub fn finalize(&mut self) {
        if self.finalized {
            return;
        }
        if let Some(current) = self.current_bucket {
            self.adjust_placeholder(current);
        }
        self.layout.seal();
        self.finalized = true;
        log::info!(
            "session finalized: {} events, {} buckets, {} lanes",
            self.stats.ingested,
            self.buckets.len(),
            self.lanes.len()
        );
    }

    /// Apply pending visibility changes: build content for buckets that
    /// came near the viewport, evict the ones that left (if enabled).
    /// Returns the number of changes applied.
    pub fn refresh_visibility(&mut self, now: Instant) -> usize {
        let changes = self.visibility.poll(&self.layout, now);
        for &change in &changes {
            match change {
                VisibilityChange::Entered(index) => {
                    self.controller.set_visible(index, true);
                    if let Err(err) = self.controller.materialize(
                        index,
                        &self.buckets,
                        &self.lanes,
                        &self.renderer,
                    ) {
                        log::error!("{err}");
                    }
                }
                VisibilityChange::Left(index) => {
                    self.controller.set_visible(index, false);
                    if self.config.evict_offscreen {
                        self.controller.evict(index);
                    }
                }
            }
        }
        changes.len()
    }

    /// Materialize a bucket directly, bypassing the visibility source.
    pub fn materialize(&mut self, index: BucketIndex) -> Result<usize, MaterializeError> {
        self.controller
            .materialize(index, &self.buckets, &self.lanes, &self.renderer)
            .inspect_err(|err| log::error!("{err}"))
    }

    /// Stop visibility tracking and drop every registry.
    pub fn teardown(mut self) {
        self.visibility.cancel();
        log::debug!("session torn down");
    }

    /// Header notifications for lanes registered since the last call.
    pub fn drain_headers(&mut self) -> Vec<LaneHeader> {
        self.lanes.drain_headers()
    }

    pub fn config(&self) -> &TimelineConfig {
        &self.config
    }

    pub fn lanes(&self) -> &LaneRegistry {
        &self.lanes
    }

    pub fn buckets(&self) -> &BucketStore {
        &self.buckets
    }

    pub fn layout(&self) -> &LayoutEngine {
        &self.layout
    }

    pub fn controller(&self) -> &VirtualizationController {
        &self.controller
    }

    pub fn visibility(&self) -> &V {
        &self.visibility
    }

    pub fn visibility_mut(&mut self) -> &mut V {
        &mut self.visibility
    }

    pub fn min_bucket(&self) -> Option<BucketIndex> {
        self.min_bucket
    }

    pub fn current_bucket(&self) -> Option<BucketIndex> {
        self.current_bucket
    }

    pub fn is_finalized(&self) -> bool {
        self.finalized
    }

    pub fn stats(&self) -> SessionStats {
        self.stats
    }
}

impl<V: VisibilitySource, R: ArgumentRenderer> StreamHandler for IngestionSession<V, R> {
    fn on_event(&mut self, raw: &str) {
        // Inherent `on_event` logs and counts failures.
        let _ = Self::on_event(self, raw);
    }

    fn on_finish(&mut self) {
        self.finalize();
    }

    fn on_error(&mut self, err: TransportError) {
        log::warn!("event stream failed: {err}");
        self.finalize();
    }
}
