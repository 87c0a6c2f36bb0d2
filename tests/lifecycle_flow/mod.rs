use std::sync::Arc;

use async_trait::async_trait;
use nmos_ledger::Candidate;
use nmos_ledger::CandidateStream;
use nmos_ledger::DiscoveryConfig;
use nmos_ledger::EventBus;
use nmos_ledger::HttpRegistryClient;
use nmos_ledger::RegistrationLifecycle;
use nmos_ledger::RegistrationStatus;
use nmos_ledger::Resource;
use nmos_ledger::ResourceKind;
use nmos_ledger::Result;
use nmos_ledger::ServiceAdvertisement;
use nmos_ledger::ServiceDiscovery;
use nmos_ledger::Store;
use nmos_ledger::StoreHandle;
use tokio::sync::mpsc;
use tokio::sync::watch;

use crate::common::chain;
use crate::common::start_registry;
use crate::common::wait_until;

/// Always finds the one registry it was given.
struct StaticDiscovery {
    url: String,
}

#[async_trait]
impl ServiceDiscovery for StaticDiscovery {
    async fn advertise(
        &self,
        _advertisement: ServiceAdvertisement,
    ) -> Result<()> {
        Ok(())
    }

    async fn browse(
        &self,
        _service_type: &str,
    ) -> Result<CandidateStream> {
        let (tx, rx) = mpsc::unbounded_channel();
        let _ = tx.send(Candidate {
            name: "registry._nmos-registration._tcp.local.".into(),
            url: self.url.clone(),
            priority: 100,
        });
        Ok(rx)
    }

    async fn stop_browse(
        &self,
        _service_type: &str,
    ) -> Result<()> {
        Ok(())
    }
}

fn fast_timings() -> DiscoveryConfig {
    DiscoveryConfig {
        settle_window_ms: 100,
        watchdog_ms: 2_000,
        reset_delay_ms: 200,
        heartbeat_interval_ms: 200,
        heartbeat_timeout_ms: 150,
        request_timeout_ms: 500,
        ..DiscoveryConfig::default()
    }
}

#[tokio::test]
async fn node_finds_registry_and_stays_in_step() {
    let registry = start_registry(|_| {}).await;
    let chain = chain("live");
    let seed: [Resource; 3] = [chain.device.clone().into(), chain.source.clone().into(), chain.flow.clone().into()];
    let store = seed
        .into_iter()
        .try_fold(Store::for_node(chain.node.clone()), |store, resource| {
            store.put(resource).map(|(next, _)| next)
        })
        .unwrap();
    let node_store = StoreHandle::spawn(store, EventBus::new());

    let lifecycle = RegistrationLifecycle::new(
        fast_timings(),
        ServiceAdvertisement::new("_nmos-node._tcp.local.", "live", 3000),
        Arc::new(StaticDiscovery {
            url: registry.base_url(),
        }),
        Arc::new(HttpRegistryClient::new()),
        node_store.clone(),
    );
    let view = lifecycle.watch();
    let (node_shutdown_tx, node_shutdown_rx) = watch::channel(());
    let task = tokio::spawn(lifecycle.run(node_shutdown_rx));

    assert!(wait_until(|| {
        let view = view.clone();
        async move { view.borrow().status == RegistrationStatus::Registered }
    })
    .await);
    assert_eq!(view.borrow().registry.as_deref(), Some(registry.base_url().as_str()));

    let remote = registry.ledger.store().clone();
    assert!(remote.get(&chain.flow.id, Some(ResourceKind::Flow)).is_ok());

    // Later changes are forwarded
    node_store.put(chain.sender.clone()).await.unwrap();
    let sender_id = chain.sender.id.clone();
    assert!(wait_until(|| {
        let remote = remote.clone();
        let id = sender_id.clone();
        async move { remote.get(&id, Some(ResourceKind::Sender)).is_ok() }
    })
    .await);
    let device = remote.get(&chain.device.id, Some(ResourceKind::Device)).unwrap();
    assert_eq!(device.as_device().unwrap().senders, vec![chain.sender.id.clone()]);

    // Heartbeats keep the registry tracking the node
    assert!(registry.ledger.tracker().unwrap().last_seen(&chain.node.id).is_some());

    // Losing the registry takes the node out of Registered
    registry.shutdown().await;
    assert!(wait_until(|| {
        let view = view.clone();
        async move { view.borrow().status != RegistrationStatus::Registered }
    })
    .await);

    node_shutdown_tx.send(()).unwrap();
    task.await.unwrap().unwrap();
}
