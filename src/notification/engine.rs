use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use parking_lot::Mutex;
use serde_json::Value;
use tokio::sync::mpsc;
use tokio::sync::watch;
use tracing::debug;
use tracing::info;
use tracing::trace;

use super::record_matches;
use super::resource_matches;
use super::session::Session;
use super::Grain;
use super::Subscription;
use super::SubscriptionRegistry;
use super::SubscriptionSpec;
use crate::generate_id;
use crate::metrics::ACTIVE_CONNECTIONS;
use crate::ChangeEvent;
use crate::ChangeRecord;
use crate::EventListener;
use crate::Result;
use crate::StoreHandle;

struct Binding {
    id: u64,
    records: mpsc::UnboundedSender<Vec<ChangeRecord>>,
}

struct EngineInner {
    /// Query service instance id, stamped on every grain
    source_id: String,
    store: StoreHandle,
    subscriptions: SubscriptionRegistry,
    /// Live connections by subscription id
    connections: DashMap<String, Vec<Binding>>,
    next_connection: AtomicU64,
    /// Taken by `run`
    events: Mutex<Option<EventListener>>,
}

/// Matches store changes against subscriptions and feeds connections.
#[derive(Clone)]
pub struct NotificationEngine {
    inner: Arc<EngineInner>,
}

/// An open delivery channel. Dropping `guard` closes it.
pub struct Connection {
    pub subscription: Subscription,
    pub grains: mpsc::UnboundedReceiver<Grain>,
    pub guard: ConnectionGuard,
}

/// Unbinds a connection on drop. The last connection of a non-persistent
/// subscription takes the subscription with it.
pub struct ConnectionGuard {
    subscription_id: String,
    connection_id: u64,
    inner: Arc<EngineInner>,
}

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        let inner = &self.inner;
        let now_unbound = inner
            .connections
            .remove_if_mut(&self.subscription_id, |_, bindings| {
                bindings.retain(|b| b.id != self.connection_id);
                bindings.is_empty()
            })
            .is_some();
        ACTIVE_CONNECTIONS.dec();
        trace!(subscription = %self.subscription_id, connection = self.connection_id, "Connection closed");

        if now_unbound {
            if let Ok(subscription) = inner.subscriptions.get(&self.subscription_id) {
                if !subscription.persist {
                    inner.subscriptions.remove(&self.subscription_id);
                    debug!(id = %self.subscription_id, "Non-persistent subscription lost its last connection");
                }
            }
        }
    }
}

impl NotificationEngine {
    /// Registers on the store's bus immediately; events are dispatched once
    /// `run` is polled.
    pub fn new(
        store: StoreHandle,
        ws_base: impl Into<String>,
    ) -> Self {
        let events = store.bus().subscribe();
        Self {
            inner: Arc::new(EngineInner {
                source_id: generate_id(),
                store,
                subscriptions: SubscriptionRegistry::new(ws_base),
                connections: DashMap::new(),
                next_connection: AtomicU64::new(1),
                events: Mutex::new(Some(events)),
            }),
        }
    }

    pub fn source_id(&self) -> &str {
        &self.inner.source_id
    }

    /// Validates `request` and creates or reuses a subscription.
    pub fn create_subscription(
        &self,
        request: &Value,
    ) -> Result<(Subscription, bool)> {
        let spec = SubscriptionSpec::from_value(request)?;
        Ok(self.inner.subscriptions.create(spec))
    }

    pub fn subscriptions(&self) -> Vec<Subscription> {
        self.inner.subscriptions.list()
    }

    pub fn subscription(
        &self,
        id: &str,
    ) -> Result<Subscription> {
        self.inner.subscriptions.get(id)
    }

    /// Deletes a persistent subscription. Open connections stay bound until
    /// they close.
    pub fn delete_subscription(
        &self,
        id: &str,
    ) -> Result<()> {
        self.inner.subscriptions.delete(id)?;
        Ok(())
    }

    /// Opens a delivery channel for subscription `id`. The first grain holds
    /// every stored resource of the collection that matches the filter.
    pub fn connect(
        &self,
        id: &str,
    ) -> Result<Connection> {
        let subscription = self.inner.subscriptions.get(id)?;
        let connection_id = self.inner.next_connection.fetch_add(1, Ordering::Relaxed);
        let (records_tx, records_rx) = mpsc::unbounded_channel();
        let (grains_tx, grains_rx) = mpsc::unbounded_channel();

        self.inner.connections.entry(id.to_string()).or_default().push(Binding {
            id: connection_id,
            records: records_tx,
        });
        ACTIVE_CONNECTIONS.inc();
        let guard = ConnectionGuard {
            subscription_id: id.to_string(),
            connection_id,
            inner: self.inner.clone(),
        };

        let snapshot = self.inner.store.snapshot();
        let initial: Vec<ChangeRecord> = snapshot
            .resources(subscription.kind())
            .filter(|r| resource_matches(&subscription.params, r))
            .cloned()
            .map(ChangeRecord::unchanged)
            .collect();

        let session = Session {
            source_id: self.inner.source_id.clone(),
            subscription_id: subscription.id.clone(),
            kind: subscription.kind(),
            min_interval: Duration::from_millis(subscription.max_update_rate_ms),
            inbound: records_rx,
            outbound: grains_tx,
        };
        debug!(subscription = %id, connection = connection_id, initial = initial.len(), "Connection opened");
        tokio::spawn(session.run(initial));

        Ok(Connection {
            subscription,
            grains: grains_rx,
            guard,
        })
    }

    pub fn connection_count(
        &self,
        id: &str,
    ) -> usize {
        self.inner.connections.get(id).map(|b| b.len()).unwrap_or(0)
    }

    /// Dispatches bus events until `shutdown` fires. Only the first call
    /// does any work.
    pub async fn run(
        self,
        mut shutdown: watch::Receiver<()>,
    ) -> Result<()> {
        let Some(mut events) = self.inner.events.lock().take() else {
            debug!("Notification dispatcher already running");
            return Ok(());
        };
        info!(source_id = %self.inner.source_id, "Notification dispatcher started");

        loop {
            tokio::select! {
                _ = shutdown.changed() => {
                    info!("Notification dispatcher shutting down");
                    break;
                }
                event = events.recv() => match event {
                    Some(event) => self.dispatch(&event),
                    None => break,
                },
            }
        }
        Ok(())
    }

    /// Hands the matching records of `event` to every connection of every
    /// subscription on its topic.
    pub(crate) fn dispatch(
        &self,
        event: &ChangeEvent,
    ) {
        for subscription in self.inner.subscriptions.for_kind(event.kind) {
            let matched: Vec<ChangeRecord> = event
                .data
                .iter()
                .filter(|record| record_matches(&subscription.params, record))
                .cloned()
                .collect();
            if matched.is_empty() {
                continue;
            }

            if let Some(bindings) = self.inner.connections.get(&subscription.id) {
                for binding in bindings.iter() {
                    // A closed session is unbound by its guard
                    let _ = binding.records.send(matched.clone());
                }
                trace!(subscription = %subscription.id, connections = bindings.len(), topic = event.topic(), "Event matched");
            }
        }
    }
}
