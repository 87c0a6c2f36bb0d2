use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use tokio::sync::watch;
use tokio::time::Instant;
use tracing::debug;
use tracing::info;
use tracing::warn;

use crate::metrics::NODES_EXPIRED;
use crate::utils::time::get_now_as_u64;
use crate::Error;
use crate::Identified;
use crate::RegistryConfig;
use crate::Resource;
use crate::ResourceKind;
use crate::Result;
use crate::Store;
use crate::StoreError;
use crate::StoreHandle;

/// Last heartbeat per node
#[derive(Debug, Default, Clone)]
pub struct HealthTracker {
    last_seen: Arc<DashMap<String, Instant>>,
}

impl HealthTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn touch(
        &self,
        node_id: &str,
    ) {
        self.last_seen.insert(node_id.to_string(), Instant::now());
    }

    pub fn forget(
        &self,
        node_id: &str,
    ) {
        self.last_seen.remove(node_id);
    }

    pub fn last_seen(
        &self,
        node_id: &str,
    ) -> Option<Instant> {
        self.last_seen.get(node_id).map(|t| *t)
    }

    /// Records a heartbeat for a registered node and returns the health
    /// timestamp in seconds.
    pub fn heartbeat(
        &self,
        store: &Store,
        node_id: &str,
    ) -> Result<u64> {
        store.get(node_id, Some(ResourceKind::Node))?;
        self.touch(node_id);
        Ok(get_now_as_u64())
    }

    /// Nodes stored but silent for longer than `expiry`. Nodes not yet
    /// tracked start being tracked now.
    pub fn expired(
        &self,
        store: &Store,
        expiry: Duration,
    ) -> Vec<String> {
        let now = Instant::now();
        let mut expired = vec![];
        let mut present = HashSet::new();

        for node in store.resources(ResourceKind::Node) {
            let id = node.id();
            present.insert(id.to_string());
            let seen = *self.last_seen.entry(id.to_string()).or_insert(now);
            if now.duration_since(seen) > expiry {
                expired.push(id.to_string());
            }
        }

        self.last_seen.retain(|id, _| present.contains(id));
        expired
    }
}

/// Everything registered below `node_id`, leaves first, then the node.
pub fn node_subtree(
    store: &Store,
    node_id: &str,
) -> Vec<(ResourceKind, String)> {
    let devices: HashSet<String> =
        owned_ids(store, ResourceKind::Device, |r| matches!(r, Resource::Device(d) if d.node_id == node_id))
            .into_iter()
            .collect();
    let sources: HashSet<String> = owned_ids(store, ResourceKind::Source, |r| {
        matches!(r, Resource::Source(s) if devices.contains(&s.device_id))
    })
    .into_iter()
    .collect();
    let flows = owned_ids(store, ResourceKind::Flow, |r| {
        matches!(r, Resource::Flow(f) if sources.contains(&f.source_id))
    });
    let senders = owned_ids(store, ResourceKind::Sender, |r| {
        matches!(r, Resource::Sender(s) if devices.contains(&s.device_id))
    });
    let receivers = owned_ids(store, ResourceKind::Receiver, |r| {
        matches!(r, Resource::Receiver(rx) if devices.contains(&rx.device_id))
    });

    let mut plan = vec![];
    plan.extend(receivers.into_iter().map(|id| (ResourceKind::Receiver, id)));
    plan.extend(senders.into_iter().map(|id| (ResourceKind::Sender, id)));
    plan.extend(flows.into_iter().map(|id| (ResourceKind::Flow, id)));
    plan.extend(sources.into_iter().map(|id| (ResourceKind::Source, id)));
    plan.extend(devices.into_iter().map(|id| (ResourceKind::Device, id)));
    plan.push((ResourceKind::Node, node_id.to_string()));
    plan
}

fn owned_ids(
    store: &Store,
    kind: ResourceKind,
    owned: impl Fn(&Resource) -> bool,
) -> Vec<String> {
    store.resources(kind).filter(|r| owned(r)).map(|r| r.id().to_string()).collect()
}

/// Periodically expires silent nodes.
pub struct NodeReaper {
    store: StoreHandle,
    tracker: HealthTracker,
    expiry: Duration,
    interval: Duration,
}

impl NodeReaper {
    pub fn new(
        store: StoreHandle,
        tracker: HealthTracker,
        config: &RegistryConfig,
    ) -> Self {
        Self {
            store,
            tracker,
            expiry: config.health_expiry(),
            interval: config.reap_interval(),
        }
    }

    pub async fn run(
        self,
        mut shutdown: watch::Receiver<()>,
    ) -> Result<()> {
        let mut ticker = tokio::time::interval(self.interval);
        info!(expiry = ?self.expiry, interval = ?self.interval, "Node reaper started");

        loop {
            tokio::select! {
                _ = shutdown.changed() => {
                    info!("Node reaper shutting down");
                    break;
                }
                _ = ticker.tick() => self.reap().await,
            }
        }
        Ok(())
    }

    pub async fn reap(&self) {
        let snapshot = self.store.snapshot();
        for node_id in self.tracker.expired(&snapshot, self.expiry) {
            warn!(node = %node_id, "Node missed its heartbeats, removing it");
            for (kind, id) in node_subtree(&self.store.snapshot(), &node_id) {
                match self.store.delete(kind, &id).await {
                    Ok(_) => debug!(%kind, %id, "Expired resource removed"),
                    // Already gone
                    Err(Error::Store(StoreError::NotFound { .. })) => {}
                    Err(e) => warn!(%kind, %id, error = %e, "Failed to remove expired resource"),
                }
            }
            self.tracker.forget(&node_id);
            NODES_EXPIRED.inc();
        }
    }
}
