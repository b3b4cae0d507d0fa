use std::time::Instant;

use crate::render::ArgumentRenderer;
use crate::session::IngestionSession;
use crate::transport::{CancelHandle, PumpStatus, Subscription, Transport};
use crate::virtualize::VisibilitySource;

/// A timeline view bound to a live stream: one subscription feeding one
/// ingestion session. Hosts call [`LiveTimeline::tick`] from their frame
/// loop.
pub struct LiveTimeline<T: Transport, V, R> {
    subscription: Subscription<T>,
    cancel: CancelHandle,
    session: IngestionSession<V, R>,
}

impl<T, V, R> LiveTimeline<T, V, R>
where
    T: Transport,
    V: VisibilitySource,
    R: ArgumentRenderer,
{
    pub fn new(transport: T, session: IngestionSession<V, R>) -> Self {
        let (subscription, cancel) = Subscription::subscribe(transport);
        Self {
            subscription,
            cancel,
            session,
        }
    }

    /// Deliver up to `budget` pending messages, then apply visibility
    /// changes. Never blocks.
    pub fn tick(&mut self, now: Instant, budget: usize) -> PumpStatus {
        let status = self.subscription.pump(&mut self.session, budget);
        self.session.refresh_visibility(now);
        status
    }

    pub fn session(&self) -> &IngestionSession<V, R> {
        &self.session
    }

    pub fn session_mut(&mut self) -> &mut IngestionSession<V, R> {
        &mut self.session
    }

    /// Handle that stops the subscription from elsewhere on this thread.
    pub fn cancel_handle(&self) -> CancelHandle {
        self.cancel.clone()
    }

    /// Close the transport, stop visibility tracking and drop all state.
    pub fn teardown(mut self) {
        self.subscription.cancel();
        self.session.teardown();
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::config::TimelineConfig;
    use crate::render::DefaultArgumentRenderer;
    use crate::transport::ChannelTransport;
    use crate::virtualize::{Materialization, ScrollVisibility};
    use stracy_protocol::StreamMessage;

    fn raw(pid: u32, ts: u64) -> StreamMessage {
        StreamMessage::Event(format!(r#"{{"pid":{pid},"ts":{ts},"args":{{"Syscall":"read"}}}}"#))
    }

    #[test]
    fn tick_ingests_and_materializes_the_tail() {
        let (tx, rx) = crossbeam_channel::unbounded();
        let config = TimelineConfig::default();
        let visibility = ScrollVisibility::new(Duration::ZERO, 0);
        let session = IngestionSession::new(config, visibility, DefaultArgumentRenderer::default());
        let mut live = LiveTimeline::new(ChannelTransport::new(rx), session);

        let now = Instant::now();
        live.session_mut().visibility_mut().sample(0, 600, now);
        tx.send(raw(1, 0)).unwrap();
        tx.send(raw(2, 10_000_000)).unwrap();
        assert_eq!(live.tick(now, 16), PumpStatus::Open(2));
        assert_eq!(live.session().controller().state_of(0), Some(Materialization::Materialized));
        assert_eq!(live.session().controller().state_of(1), Some(Materialization::Materialized));

        tx.send(StreamMessage::Finish).unwrap();
        assert_eq!(live.tick(now, 16), PumpStatus::Done);
        assert!(live.session().is_finalized());
        live.teardown();
    }

    #[test]
    fn cancelled_stream_does_not_finalize() {
        let (tx, rx) = crossbeam_channel::unbounded();
        let session = IngestionSession::new(
            TimelineConfig::default(),
            ScrollVisibility::new(Duration::ZERO, 0),
            DefaultArgumentRenderer::default(),
        );
        let mut live = LiveTimeline::new(ChannelTransport::new(rx), session);
        tx.send(raw(1, 0)).unwrap();
        live.cancel_handle().cancel();
        assert_eq!(live.tick(Instant::now(), 16), PumpStatus::Done);
        assert!(live.session().buckets().is_empty());
        assert!(!live.session().is_finalized());
        assert!(tx.send(raw(1, 1)).is_err());
    }
}
