//! # Change Event Bus
//!
//! Fan-out point between the store and its observers. Every event is handed,
//! synchronously and in publication order, to each listener registered at
//! publish time. There is no filtering, persistence or backpressure: listener
//! queues are unbounded and the publisher never waits on a listener.

mod event;
pub use event::*;


use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::mpsc;
use tracing::trace;

use crate::metrics::BUS_EVENTS_PUBLISHED;

pub type EventListener = mpsc::UnboundedReceiver<ChangeEvent>;

#[derive(Clone, Default)]
pub struct EventBus {
    listeners: Arc<Mutex<Vec<mpsc::UnboundedSender<ChangeEvent>>>>,
    published: Arc<AtomicU64>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a listener. Dropping the receiver unregisters it on the
    /// next publish.
    pub fn subscribe(&self) -> EventListener {
        let (tx, rx) = mpsc::unbounded_channel();
        self.listeners.lock().push(tx);
        rx
    }

    /// Delivers `event` to every live listener and returns how many got it.
    pub fn publish(
        &self,
        event: ChangeEvent,
    ) -> usize {
        self.published.fetch_add(1, Ordering::Relaxed);
        BUS_EVENTS_PUBLISHED.with_label_values(&[event.kind.as_str()]).inc();

        let mut listeners = self.listeners.lock();
        listeners.retain(|tx| tx.send(event.clone()).is_ok());

        trace!(topic = event.topic(), receivers = listeners.len(), "Event published");
        listeners.len()
    }

    pub fn listener_count(&self) -> usize {
        let mut listeners = self.listeners.lock();
        listeners.retain(|tx| !tx.is_closed());
        listeners.len()
    }

    pub fn events_published(&self) -> u64 {
        self.published.load(Ordering::Relaxed)
    }
}
