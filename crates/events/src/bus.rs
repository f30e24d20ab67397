//! Per-task progress log with replaying fan-out.
//!
//! A [`ProgressBus`] keeps every [`ProgressEvent`] a task has produced and
//! the set of live subscribers. New subscribers first receive the whole log,
//! then every later event, in order. Once the bus is closed no further
//! subscribers are registered and existing ones see their stream end after
//! the backlog drains.
//!
//! The bus itself is not synchronised; [`crate::registry::TaskRegistry`]
//! holds it under its lock so that replay and registration happen atomically
//! with respect to concurrent publishes.

use std::collections::HashMap;

use hourglass_core::protocol::ProgressEvent;
use tokio::sync::mpsc;

/// Channel sender half delivering events to one subscriber.
pub type EventSender = mpsc::UnboundedSender<ProgressEvent>;

/// Receiving half handed to a subscriber.
pub type EventReceiver = mpsc::UnboundedReceiver<ProgressEvent>;

/// Identifies a subscriber within one bus.
pub type SubscriberId = u64;

// ---------------------------------------------------------------------------
// Subscription
// ---------------------------------------------------------------------------

/// A live (or already finished) view of a task's events.
#[derive(Debug)]
pub struct Subscription {
    pub id: SubscriberId,
    pub receiver: EventReceiver,
}

// ---------------------------------------------------------------------------
// ProgressBus
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
pub struct ProgressBus {
    log: Vec<ProgressEvent>,
    subscribers: HashMap<SubscriberId, EventSender>,
    next_id: SubscriberId,
    closed: bool,
}

impl ProgressBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `event` to the log and push it to every live subscriber.
    ///
    /// Subscribers whose receiver is gone are dropped. Events published
    /// after [`close`](Self::close) are ignored.
    pub fn publish(&mut self, event: ProgressEvent) {
        if self.closed {
            tracing::debug!(event = event.name(), "Event after close ignored");
            return;
        }
        self.subscribers
            .retain(|_, sender| sender.send(event.clone()).is_ok());
        self.log.push(event);
    }

    /// Replay the log into a fresh channel and, unless the bus is closed,
    /// keep the channel registered for live delivery.
    pub fn subscribe(&mut self) -> Subscription {
        let (tx, rx) = mpsc::unbounded_channel();
        for event in &self.log {
            // The receiver is still in hand, so this cannot fail.
            let _ = tx.send(event.clone());
        }

        let id = self.next_id;
        self.next_id += 1;
        if !self.closed {
            self.subscribers.insert(id, tx);
        }
        Subscription { id, receiver: rx }
    }

    /// Remove a subscriber. Unknown ids are ignored.
    pub fn unsubscribe(&mut self, id: SubscriberId) {
        self.subscribers.remove(&id);
    }

    /// Stop accepting events and end every live subscription.
    pub fn close(&mut self) {
        self.closed = true;
        self.subscribers.clear();
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Number of subscribers whose receiver is still alive.
    pub fn live_subscribers(&self) -> usize {
        self.subscribers.values().filter(|s| !s.is_closed()).count()
    }

    pub fn log(&self) -> &[ProgressEvent] {
        &self.log
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
