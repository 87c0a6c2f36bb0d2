use std::collections::VecDeque;
use std::future::Future;
use std::sync::Arc;

use tokio::sync::watch;
use tokio::time::timeout;
use tokio::time::Instant;
use tracing::debug;
use tracing::error;
use tracing::info;
use tracing::warn;

use super::Action;
use super::Candidate;
use super::CandidateStream;
use super::LifecycleEvent;
use super::RegistrationState;
use super::RegistrationStatus;
use super::RegistryClient;
use super::ServiceAdvertisement;
use super::ServiceDiscovery;
use crate::metrics::HEARTBEATS_SENT;
use crate::metrics::REGISTRATION_RESETS;
use crate::utils::time::fire_at;
use crate::ChangeEvent;
use crate::DiscoveryConfig;
use crate::EventListener;
use crate::Identified;
use crate::RegistrationError;
use crate::Resource;
use crate::ResourceKind;
use crate::Result;
use crate::Store;
use crate::StoreError;
use crate::StoreHandle;

/// What the lifecycle currently reports
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RegistrationView {
    pub status: RegistrationStatus,
    /// Base URL of the selected registry
    pub registry: Option<String>,
}

#[derive(Debug, Default)]
struct Timers {
    settle: Option<Instant>,
    watchdog: Option<Instant>,
    reset: Option<Instant>,
    heartbeat: Option<Instant>,
}

/// Drives a [`RegistrationState`] for one node store.
pub struct RegistrationLifecycle<D, C>
where
    D: ServiceDiscovery,
    C: RegistryClient,
{
    config: DiscoveryConfig,
    advertisement: ServiceAdvertisement,
    discovery: Arc<D>,
    client: Arc<C>,
    store: StoreHandle,

    state: RegistrationState,
    timers: Timers,
    candidates: Option<CandidateStream>,
    events: EventListener,
    view_tx: watch::Sender<RegistrationView>,
}

impl<D, C> RegistrationLifecycle<D, C>
where
    D: ServiceDiscovery,
    C: RegistryClient,
{
    /// The bus listener is registered here, so changes made after
    /// construction are seen once registered.
    pub fn new(
        config: DiscoveryConfig,
        advertisement: ServiceAdvertisement,
        discovery: Arc<D>,
        client: Arc<C>,
        store: StoreHandle,
    ) -> Self {
        let (view_tx, _) = watch::channel(RegistrationView::default());
        let events = store.bus().subscribe();
        Self {
            config,
            advertisement,
            discovery,
            client,
            store,
            state: RegistrationState::new(),
            timers: Timers::default(),
            candidates: None,
            events,
            view_tx,
        }
    }

    pub fn watch(&self) -> watch::Receiver<RegistrationView> {
        self.view_tx.subscribe()
    }

    /// Runs until `shutdown` fires, even in the middle of a push. Registry
    /// failures are absorbed.
    pub async fn run(
        mut self,
        mut shutdown: watch::Receiver<()>,
    ) -> Result<()> {
        info!(service = %self.config.registration_service, "Registration lifecycle started");

        tokio::select! {
            _ = shutdown.changed() => info!("Registration lifecycle shutting down"),
            _ = self.drive() => {}
        }

        self.stop_browsing().await;
        Ok(())
    }

    async fn drive(&mut self) {
        self.dispatch(LifecycleEvent::Start).await;

        loop {
            tokio::select! {
                candidate = next_candidate(&mut self.candidates) => match candidate {
                    Some(candidate) => self.dispatch(LifecycleEvent::CandidateFound(candidate)).await,
                    None => self.candidates = None,
                },
                _ = fire_at(self.timers.settle) => {
                    self.timers.settle = None;
                    self.dispatch(LifecycleEvent::SettleElapsed).await;
                }
                _ = fire_at(self.timers.watchdog) => {
                    self.timers.watchdog = None;
                    self.dispatch(LifecycleEvent::WatchdogFired).await;
                }
                _ = fire_at(self.timers.reset) => {
                    self.timers.reset = None;
                    self.dispatch(LifecycleEvent::ResetTimerFired).await;
                }
                _ = fire_at(self.timers.heartbeat) => {
                    self.timers.heartbeat = None;
                    let event = self.heartbeat().await;
                    self.dispatch(event).await;
                }
                Some(change) = self.events.recv() => {
                    if let Some(event) = self.forward(change).await {
                        self.dispatch(event).await;
                    }
                }
            }
        }
    }

    /// Feeds `event` to the state machine and performs the resulting
    /// actions, including any follow-up events they raise.
    async fn dispatch(
        &mut self,
        event: LifecycleEvent,
    ) {
        let mut actions: VecDeque<Action> = self.state.handle(event).into();
        self.publish_view();
        while let Some(action) = actions.pop_front() {
            if let Some(next) = self.perform(action).await {
                actions.extend(self.state.handle(next));
                self.publish_view();
            }
        }
    }

    async fn perform(
        &mut self,
        action: Action,
    ) -> Option<LifecycleEvent> {
        let now = Instant::now();
        match action {
            Action::Advertise => {
                if let Err(e) = self.discovery.advertise(self.advertisement.clone()).await {
                    error!(error = %e, "Failed to advertise node");
                }
                None
            }
            Action::Browse => {
                match self.discovery.browse(&self.config.registration_service).await {
                    Ok(stream) => self.candidates = Some(stream),
                    // The watchdog will retry
                    Err(e) => error!(error = %e, "Failed to browse for registries"),
                }
                None
            }
            Action::StopBrowse => {
                self.stop_browsing().await;
                None
            }
            Action::ArmSettle => {
                self.timers.settle = Some(now + self.config.settle_window());
                None
            }
            Action::ArmWatchdog => {
                self.timers.watchdog = Some(now + self.config.watchdog());
                None
            }
            Action::DisarmDiscoveryTimers => {
                self.timers.settle = None;
                self.timers.watchdog = None;
                None
            }
            Action::Synchronize(registry) => Some(match self.synchronize(&registry).await {
                Ok(()) => LifecycleEvent::SyncCompleted,
                Err(e) => LifecycleEvent::SyncFailed(e.to_string()),
            }),
            Action::ScheduleHeartbeat => {
                self.timers.heartbeat = Some(now + self.config.heartbeat_interval());
                None
            }
            Action::CancelHeartbeat => {
                self.timers.heartbeat = None;
                None
            }
            Action::ArmReset => {
                REGISTRATION_RESETS.inc();
                self.timers.reset = Some(now + self.config.reset_delay());
                None
            }
        }
    }

    async fn stop_browsing(&mut self) {
        if self.candidates.take().is_some() {
            if let Err(e) = self.discovery.stop_browse(&self.config.registration_service).await {
                debug!(error = %e, "Failed to stop browsing");
            }
        }
    }

    /// Pushes the whole node store. Change events queued so far are
    /// superseded by the snapshot and dropped.
    async fn synchronize(
        &mut self,
        registry: &str,
    ) -> Result<()> {
        while self.events.try_recv().is_ok() {}

        let snapshot = self.store.snapshot();
        let plan = sync_plan(&snapshot)?;
        info!(%registry, resources = plan.len(), "Synchronizing with registry");

        for resource in &plan {
            self.bounded("register", self.client.register(registry, resource)).await?;
        }
        Ok(())
    }

    /// Awaits one registry request for at most the configured request timeout.
    async fn bounded(
        &self,
        operation: &'static str,
        request: impl Future<Output = Result<()>>,
    ) -> Result<()> {
        let limit = self.config.request_timeout();
        timeout(limit, request)
            .await
            .map_err(|_| RegistrationError::RequestTimeout { operation, limit })?
    }

    async fn heartbeat(&self) -> LifecycleEvent {
        let Some(registry) = self.state.registry() else {
            return LifecycleEvent::HeartbeatFailed("no registry selected".into());
        };
        let Some(node_id) = self.store.snapshot().local_node_id().map(str::to_string) else {
            return LifecycleEvent::HeartbeatFailed("store has no self node".into());
        };

        let limit = self.config.heartbeat_timeout();
        let outcome = match timeout(limit, self.client.heartbeat(registry, &node_id)).await {
            Ok(result) => result,
            Err(_) => Err(RegistrationError::HeartbeatTimeout(limit).into()),
        };

        match outcome {
            Ok(()) => {
                HEARTBEATS_SENT.with_label_values(&["ok"]).inc();
                LifecycleEvent::HeartbeatSucceeded
            }
            Err(e) => {
                HEARTBEATS_SENT.with_label_values(&["failed"]).inc();
                LifecycleEvent::HeartbeatFailed(e.to_string())
            }
        }
    }

    /// Sends one store change to the registry. Changes raised while not
    /// registered are dropped; the next synchronization covers them.
    async fn forward(
        &self,
        change: ChangeEvent,
    ) -> Option<LifecycleEvent> {
        if !self.state.is_registered() {
            return None;
        }
        let registry = self.state.registry()?;

        for record in &change.data {
            let result = match &record.post {
                Some(resource) => {
                    let resource = outbound(resource);
                    self.bounded("register", self.client.register(registry, &resource)).await
                }
                None => {
                    self.bounded("deregister", self.client.deregister(registry, change.kind, &record.path))
                        .await
                }
            };
            if let Err(e) = result {
                warn!(topic = change.topic(), path = %record.path, error = %e, "Forwarding failed");
                return Some(LifecycleEvent::ForwardFailed(e.to_string()));
            }
        }
        None
    }

    fn publish_view(&self) {
        let view = RegistrationView {
            status: self.state.status(),
            registry: self.state.registry().map(str::to_string),
        };
        self.view_tx.send_if_modified(|current| {
            if *current == view {
                return false;
            }
            *current = view;
            true
        });
    }
}

/// Devices travel without their derived lists; the registry rebuilds them
/// as senders and receivers arrive.
fn outbound(resource: &Resource) -> Resource {
    match resource {
        Resource::Device(device) => device.stripped().into(),
        other => other.clone(),
    }
}

/// Resources to push on registration: the node itself, then every other
/// kind in dependency order.
pub fn sync_plan(store: &Store) -> Result<Vec<Resource>> {
    let node = store
        .self_node()
        .ok_or_else(|| StoreError::Validation("registration needs a node store".into()))?;

    let mut plan: Vec<Resource> = vec![node.clone().into()];
    for kind in ResourceKind::ALL.into_iter().skip(1) {
        plan.extend(store.resources(kind).map(outbound));
    }
    debug!(node = node.id(), resources = plan.len(), "Sync plan built");
    Ok(plan)
}

async fn next_candidate(stream: &mut Option<CandidateStream>) -> Option<Candidate> {
    match stream {
        Some(stream) => stream.recv().await,
        None => std::future::pending().await,
    }
}
