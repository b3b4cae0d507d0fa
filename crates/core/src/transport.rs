use std::cell::Cell;
use std::rc::Rc;

use crossbeam_channel::{Receiver, TryRecvError};
use stracy_protocol::StreamMessage;
use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TransportError {
    #[error("producer reported: {0}")]
    Remote(String),
    #[error("stream closed without a finish signal")]
    Disconnected,
}

/// Result of asking a transport for its next message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportPoll {
    Message(StreamMessage),
    /// Nothing available right now.
    Pending,
    /// The channel is gone.
    Closed,
}

/// A push channel of stream messages, polled without blocking.
pub trait Transport {
    fn try_next(&mut self) -> TransportPoll;
    /// Release the channel. Called at most once by [`Subscription`].
    fn close(&mut self);
}

/// Receiver side of the live stream.
pub trait StreamHandler {
    fn on_event(&mut self, raw: &str);
    fn on_finish(&mut self);
    fn on_error(&mut self, err: TransportError);
}

/// Synchronous, idempotent cancellation of a [`Subscription`].
#[derive(Debug, Clone, Default)]
pub struct CancelHandle(Rc<Cell<bool>>);

impl CancelHandle {
    pub fn cancel(&self) {
        self.0.set(true);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.get()
    }
}

/// Outcome of one [`Subscription::pump`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PumpStatus {
    /// Delivered this many messages; more may follow.
    Open(usize),
    /// The stream reached its terminal state (finished, failed or cancelled).
    Done,
}

/// A live subscription: pulls messages from a transport and dispatches them
/// to a [`StreamHandler`] in delivery order.
pub struct Subscription<T: Transport> {
    transport: T,
    cancel: CancelHandle,
    closed: bool,
}

impl<T: Transport> Subscription<T> {
    pub fn subscribe(transport: T) -> (Self, CancelHandle) {
        let cancel = CancelHandle::default();
        let subscription = Self {
            transport,
            cancel: cancel.clone(),
            closed: false,
        };
        (subscription, cancel)
    }

    /// Deliver up to `budget` messages to `handler` without blocking.
    pub fn pump<H: StreamHandler + ?Sized>(&mut self, handler: &mut H, budget: usize) -> PumpStatus {
        let mut delivered = 0;
        while delivered < budget {
            if self.cancel.is_cancelled() {
                self.close();
            }
            if self.closed {
                return PumpStatus::Done;
            }
            match self.transport.try_next() {
                TransportPoll::Pending => break,
                TransportPoll::Message(StreamMessage::Event(raw)) => handler.on_event(&raw),
                TransportPoll::Message(StreamMessage::Finish) => {
                    self.close();
                    handler.on_finish();
                }
                TransportPoll::Message(StreamMessage::Error(message)) => {
                    self.close();
                    handler.on_error(TransportError::Remote(message));
                }
                TransportPoll::Closed => {
                    self.close();
                    handler.on_error(TransportError::Disconnected);
                }
            }
            delivered += 1;
        }
        if self.closed {
            PumpStatus::Done
        } else {
            PumpStatus::Open(delivered)
        }
    }

    /// Cancel and close the transport right away. Safe to call repeatedly.
    pub fn cancel(&mut self) {
        self.cancel.cancel();
        self.close();
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    fn close(&mut self) {
        if !self.closed {
            self.closed = true;
            self.transport.close();
            log::debug!("transport closed");
        }
    }
}

/// [`Transport`] over a crossbeam channel fed by a producer thread.
pub struct ChannelTransport {
    receiver: Option<Receiver<StreamMessage>>,
}

impl ChannelTransport {
    pub fn new(receiver: Receiver<StreamMessage>) -> Self {
        Self {
            receiver: Some(receiver),
        }
    }
}

impl Transport for ChannelTransport {
    fn try_next(&mut self) -> TransportPoll {
        let Some(receiver) = &self.receiver else {
            return TransportPoll::Closed;
        };
        match receiver.try_recv() {
            Ok(message) => TransportPoll::Message(message),
            Err(TryRecvError::Empty) => TransportPoll::Pending,
            Err(TryRecvError::Disconnected) => TransportPoll::Closed,
        }
    }

    fn close(&mut self) {
        self.receiver = None;
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;

    use super::*;

    #[derive(Default)]
    struct Recorder {
        events: Vec<String>,
        finished: usize,
        errors: Vec<TransportError>,
    }

    impl StreamHandler for Recorder {
        fn on_event(&mut self, raw: &str) {
            self.events.push(raw.to_string());
        }
        fn on_finish(&mut self) {
            self.finished += 1;
        }
        fn on_error(&mut self, err: TransportError) {
            self.errors.push(err);
        }
    }

    struct Scripted {
        script: VecDeque<TransportPoll>,
        closes: Rc<Cell<usize>>,
    }

    impl Scripted {
        fn new(script: Vec<TransportPoll>) -> (Self, Rc<Cell<usize>>) {
            let closes = Rc::new(Cell::new(0));
            let transport = Self {
                script: script.into(),
                closes: closes.clone(),
            };
            (transport, closes)
        }
    }

    impl Transport for Scripted {
        fn try_next(&mut self) -> TransportPoll {
            self.script.pop_front().unwrap_or(TransportPoll::Pending)
        }
        fn close(&mut self) {
            self.closes.set(self.closes.get() + 1);
        }
    }

    fn event(raw: &str) -> TransportPoll {
        TransportPoll::Message(StreamMessage::Event(raw.into()))
    }

    #[test]
    fn delivers_in_order_until_finish() {
        let (transport, closes) = Scripted::new(vec![
            event("a"),
            event("b"),
            TransportPoll::Message(StreamMessage::Finish),
            event("late"),
        ]);
        let (mut sub, _cancel) = Subscription::subscribe(transport);
        let mut rec = Recorder::default();
        assert_eq!(sub.pump(&mut rec, 100), PumpStatus::Done);
        assert_eq!(rec.events, vec!["a", "b"]);
        assert_eq!(rec.finished, 1);
        assert_eq!(closes.get(), 1);
        assert_eq!(sub.pump(&mut rec, 100), PumpStatus::Done);
        assert_eq!(rec.events.len(), 2);
    }

    #[test]
    fn budget_bounds_one_pump() {
        let (transport, _) = Scripted::new(vec![event("a"), event("b"), event("c")]);
        let (mut sub, _cancel) = Subscription::subscribe(transport);
        let mut rec = Recorder::default();
        assert_eq!(sub.pump(&mut rec, 2), PumpStatus::Open(2));
        assert_eq!(sub.pump(&mut rec, 2), PumpStatus::Open(1));
        assert_eq!(rec.events, vec!["a", "b", "c"]);
    }

    #[test]
    fn remote_error_and_disconnect_finalize() {
        let (transport, closes) = Scripted::new(vec![TransportPoll::Message(
            StreamMessage::Error("boom".into()),
        )]);
        let (mut sub, _cancel) = Subscription::subscribe(transport);
        let mut rec = Recorder::default();
        assert_eq!(sub.pump(&mut rec, 10), PumpStatus::Done);
        assert_eq!(rec.errors, vec![TransportError::Remote("boom".into())]);
        assert_eq!(closes.get(), 1);

        let (transport, _) = Scripted::new(vec![event("a"), TransportPoll::Closed]);
        let (mut sub, _cancel) = Subscription::subscribe(transport);
        let mut rec = Recorder::default();
        sub.pump(&mut rec, 10);
        assert_eq!(rec.errors, vec![TransportError::Disconnected]);
    }

    #[test]
    fn cancel_is_synchronous_and_idempotent() {
        let (transport, closes) = Scripted::new(vec![event("a"), event("b")]);
        let (mut sub, cancel) = Subscription::subscribe(transport);
        let mut rec = Recorder::default();
        cancel.cancel();
        cancel.cancel();
        assert_eq!(sub.pump(&mut rec, 10), PumpStatus::Done);
        sub.cancel();
        assert!(rec.events.is_empty());
        assert_eq!(rec.finished, 0);
        assert!(rec.errors.is_empty());
        assert_eq!(closes.get(), 1);
    }

    #[test]
    fn channel_transport() {
        let (tx, rx) = crossbeam_channel::unbounded();
        let mut transport = ChannelTransport::new(rx);
        assert_eq!(transport.try_next(), TransportPoll::Pending);
        tx.send(StreamMessage::Finish).unwrap();
        assert_eq!(
            transport.try_next(),
            TransportPoll::Message(StreamMessage::Finish)
        );
        drop(tx);
        assert_eq!(transport.try_next(), TransportPoll::Closed);
        transport.close();
        assert_eq!(transport.try_next(), TransportPoll::Closed);
    }
}
