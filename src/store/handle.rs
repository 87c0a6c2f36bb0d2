//! Serialized access to the store.
//!
//! ## Key Design Points
//! - **Single writer**: one actor task owns the current snapshot and applies
//!   mutation requests strictly in arrival order, so request *N+1* always
//!   validates against the snapshot produced by request *N*.
//! - **Lock-free reads**: every applied mutation swaps the new snapshot into an
//!   [`ArcSwap`]; readers take an `Arc<Store>` and keep it as long as they like.
//! - **Ordered events**: the change event for a mutation is published on the
//!   bus before the caller is answered and before the next request is taken,
//!   so events appear in exactly the order the mutations were applied.

use std::sync::Arc;

use arc_swap::ArcSwap;
use tokio::sync::mpsc;
use tokio::sync::oneshot;
use tracing::debug;
use tracing::info;

use super::DeleteOutcome;
use super::ListQuery;
use super::Page;
use super::PutOutcome;
use super::Store;
use crate::metrics::STORE_MUTATIONS;
use crate::Error;
use crate::EventBus;
use crate::Resource;
use crate::ResourceKind;
use crate::Result;
use crate::StoreError;

enum StoreCommand {
    Put {
        resource: Resource,
        reply: oneshot::Sender<Result<PutOutcome>>,
    },
    Delete {
        kind: ResourceKind,
        id: String,
        reply: oneshot::Sender<Result<DeleteOutcome>>,
    },
}

/// Cloneable handle to a running store actor.
#[derive(Clone)]
pub struct StoreHandle {
    commands: mpsc::UnboundedSender<StoreCommand>,
    snapshot: Arc<ArcSwap<Store>>,
    bus: EventBus,
}

impl StoreHandle {
    /// Spawns the actor owning `initial`. The actor stops once every handle
    /// is dropped.
    pub fn spawn(
        initial: Store,
        bus: EventBus,
    ) -> Self {
        let (commands, rx) = mpsc::unbounded_channel();
        let snapshot = Arc::new(ArcSwap::from_pointee(initial));

        let actor = StoreActor {
            commands: rx,
            snapshot: snapshot.clone(),
            bus: bus.clone(),
        };
        tokio::spawn(actor.run());

        Self {
            commands,
            snapshot,
            bus,
        }
    }

    pub async fn put(
        &self,
        resource: impl Into<Resource>,
    ) -> Result<PutOutcome> {
        let (reply, rx) = oneshot::channel();
        self.send(StoreCommand::Put {
            resource: resource.into(),
            reply,
        })?;
        rx.await.map_err(|_| StoreError::Unavailable("store dropped the request".into()))?
    }

    pub async fn delete(
        &self,
        kind: ResourceKind,
        id: &str,
    ) -> Result<DeleteOutcome> {
        let (reply, rx) = oneshot::channel();
        self.send(StoreCommand::Delete {
            kind,
            id: id.to_string(),
            reply,
        })?;
        rx.await.map_err(|_| StoreError::Unavailable("store dropped the request".into()))?
    }

    /// Latest applied snapshot
    pub fn snapshot(&self) -> Arc<Store> {
        self.snapshot.load_full()
    }

    pub fn get(
        &self,
        id: &str,
        kind: Option<ResourceKind>,
    ) -> Result<Resource> {
        self.snapshot.load().get(id, kind).cloned()
    }

    pub fn list(
        &self,
        kind: ResourceKind,
        query: &ListQuery,
    ) -> Result<Page> {
        self.snapshot.load().list(kind, query)
    }

    /// Bus the store publishes its change events on
    pub fn bus(&self) -> &EventBus {
        &self.bus
    }

    fn send(
        &self,
        command: StoreCommand,
    ) -> Result<()> {
        self.commands
            .send(command)
            .map_err(|_| StoreError::Unavailable("store actor stopped".into()).into())
    }
}

struct StoreActor {
    commands: mpsc::UnboundedReceiver<StoreCommand>,
    snapshot: Arc<ArcSwap<Store>>,
    bus: EventBus,
}

impl StoreActor {
    async fn run(mut self) {
        debug!("Store actor started");
        while let Some(command) = self.commands.recv().await {
            match command {
                StoreCommand::Put { resource, reply } => {
                    let _ = reply.send(self.apply_put(resource));
                }
                StoreCommand::Delete { kind, id, reply } => {
                    let _ = reply.send(self.apply_delete(kind, &id));
                }
            }
        }
        info!("Store actor stopped");
    }

    fn apply_put(
        &self,
        resource: Resource,
    ) -> Result<PutOutcome> {
        let kind = resource.kind();
        let current = self.snapshot.load();
        match current.put(resource) {
            Ok((next, outcome)) => {
                self.snapshot.store(Arc::new(next));
                record(kind, "put", "ok");
                self.bus.publish(outcome.event());
                Ok(outcome)
            }
            Err(e) => {
                debug!(%kind, error = %e, "Put rejected");
                record(kind, "put", outcome_label(&e));
                Err(e)
            }
        }
    }

    fn apply_delete(
        &self,
        kind: ResourceKind,
        id: &str,
    ) -> Result<DeleteOutcome> {
        let current = self.snapshot.load();
        match current.delete(kind, id) {
            Ok((next, outcome)) => {
                self.snapshot.store(Arc::new(next));
                record(kind, "delete", "ok");
                self.bus.publish(outcome.event());
                Ok(outcome)
            }
            Err(e) => {
                debug!(%kind, %id, error = %e, "Delete rejected");
                record(kind, "delete", outcome_label(&e));
                Err(e)
            }
        }
    }
}

fn record(
    kind: ResourceKind,
    operation: &str,
    outcome: &str,
) {
    STORE_MUTATIONS.with_label_values(&[kind.as_str(), operation, outcome]).inc();
}

fn outcome_label(e: &Error) -> &'static str {
    match e {
        Error::Store(StoreError::Validation(_)) => "invalid",
        Error::Store(StoreError::Conflict { .. }) => "conflict",
        Error::Store(StoreError::Reference { .. }) => "reference",
        Error::Store(StoreError::NotFound { .. }) => "not_found",
        _ => "error",
    }
}
